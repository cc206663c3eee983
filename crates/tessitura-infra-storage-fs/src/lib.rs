use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tessitura_ports::storage::{SettingsDto, StorageError, StoragePort};

const SETTINGS_FILE: &str = "settings.json";
/// Overrides the settings directory, mainly for scripted runs.
pub const CONFIG_DIR_ENV: &str = "TESSITURA_CONFIG_DIR";

/// Settings persisted as pretty JSON under a base directory.
///
/// A settings file that cannot be used (bad JSON, or values the analysis
/// cannot run with) is moved aside to `settings.json.bad` so the next save
/// starts clean, and the load reports the reason.
pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// `$TESSITURA_CONFIG_DIR` when set, else `<config dir>/Tessitura`.
    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        dirs_next::config_dir()
            .map(|base| base.join("Tessitura"))
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE)
    }

    pub fn quarantine_path(&self) -> PathBuf {
        self.base_dir.join(format!("{SETTINGS_FILE}.bad"))
    }

    fn parse_settings(data: &[u8]) -> Result<SettingsDto, StorageError> {
        let settings: SettingsDto =
            serde_json::from_slice(data).map_err(|e| StorageError::Serde(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn quarantine(&self, path: &Path, reason: &StorageError) {
        let target = self.quarantine_path();
        match fs::rename(path, &target) {
            Ok(()) => tracing::warn!(
                error = %reason,
                moved_to = %target.display(),
                "unusable settings file moved aside"
            ),
            Err(err) => tracing::warn!(
                error = %reason,
                rename_error = %err,
                "unusable settings file could not be moved aside"
            ),
        }
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to the working directory for settings");
            PathBuf::from(".")
        });
        Self { base_dir }
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        let path = self.settings_path();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(SettingsDto::default());
            }
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };

        Self::parse_settings(&data).map_err(|err| {
            self.quarantine(&path, &err);
            err
        })
    }

    /// Refuses settings that would not load back, then writes next to the
    /// target and renames over it so a crash mid-write keeps the old file.
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        s.validate()?;
        fs::create_dir_all(&self.base_dir).map_err(|e| StorageError::Io(e.to_string()))?;

        let path = self.settings_path();
        let data = serde_json::to_vec_pretty(s).map_err(|e| StorageError::Serde(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::Io(e.to_string()))?;

        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}
