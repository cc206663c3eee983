use serde::Serialize;
use std::fs;
use std::path::Path;
use tessitura_domain_eval::{NoteMatch, ScoreBreakdown};
use tessitura_domain_pitch::UserNote;
use tessitura_ports::storage::{SettingsDto, StorageError};
use tessitura_ports::types::AudioInputDevice;

#[derive(Serialize)]
struct AppVersion {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct PlatformInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct DeviceSnapshot<'a> {
    audio_inputs: &'a [AudioInputDevice],
}

#[derive(Serialize)]
struct SessionReport<'a> {
    user_notes: &'a [UserNote],
    matches: &'a [NoteMatch],
    breakdown: ScoreBreakdown,
    dropped_samples: u64,
}

pub struct DiagnosticsInput<'a> {
    pub settings: &'a SettingsDto,
    pub audio_inputs: &'a [AudioInputDevice],
    pub user_notes: &'a [UserNote],
    pub matches: &'a [NoteMatch],
    pub breakdown: ScoreBreakdown,
    pub dropped_samples: u64,
}

pub fn export_diagnostics(dir: &Path, input: &DiagnosticsInput<'_>) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::Io(e.to_string()))?;

    let app_version = AppVersion {
        name: "Tessitura".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let platform = PlatformInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    };

    write_json(&dir.join("app_version.json"), &app_version)?;
    write_json(&dir.join("platform.json"), &platform)?;
    write_json(&dir.join("settings.json"), input.settings)?;
    write_json(
        &dir.join("device_snapshot.json"),
        &DeviceSnapshot {
            audio_inputs: input.audio_inputs,
        },
    )?;
    write_json(
        &dir.join("session_report.json"),
        &SessionReport {
            user_notes: input.user_notes,
            matches: input.matches,
            breakdown: input.breakdown,
            dropped_samples: input.dropped_samples,
        },
    )?;

    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
    fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
}
