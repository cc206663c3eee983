use crate::lrc_import::parse_lrc;
use crate::melody_csv::{parse_melody_csv, MelodyParseError};
use crate::model::{Song, SongMeta};
use serde::Deserialize;
use std::path::Path;

const AUDIO_CANDIDATES: [&str; 3] = ["audio.wav", "audio.ogg", "audio.mp3"];
const LYRICS_FILE: &str = "lyrics.lrc";
const MELODY_FILE: &str = "melody.csv";
const META_FILE: &str = "meta.json";

#[derive(thiserror::Error, Debug)]
pub enum SongLoadError {
    #[error("missing file: {0}")]
    MissingFile(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("melody: {0}")]
    Melody(#[from] MelodyParseError),
    #[error("meta: {0}")]
    Meta(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetaFile {
    title: Option<String>,
    artist: Option<String>,
    audio_offset_s: f64,
}

/// Loads a song folder: backing audio, `lyrics.lrc`, `melody.csv` and an
/// optional `meta.json`.
pub fn load_song_dir(root: &Path) -> Result<Song, SongLoadError> {
    let audio_path = AUDIO_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| SongLoadError::MissingFile(AUDIO_CANDIDATES.join("/")))?;

    let lyrics_text = read_required(&root.join(LYRICS_FILE))?;
    let melody_text = read_required(&root.join(MELODY_FILE))?;

    let meta_path = root.join(META_FILE);
    let meta_file = if meta_path.is_file() {
        let data = std::fs::read(&meta_path).map_err(|e| SongLoadError::Io(e.to_string()))?;
        serde_json::from_slice::<MetaFile>(&data).map_err(|e| SongLoadError::Meta(e.to_string()))?
    } else {
        MetaFile::default()
    };

    let title = meta_file.title.unwrap_or_else(|| dir_name(root));

    Ok(Song {
        root: root.to_path_buf(),
        audio_path,
        meta: SongMeta {
            title,
            artist: meta_file.artist,
            audio_offset_s: meta_file.audio_offset_s,
        },
        lyrics: parse_lrc(&lyrics_text),
        melody: parse_melody_csv(&melody_text)?,
    })
}

fn read_required(path: &Path) -> Result<String, SongLoadError> {
    if !path.is_file() {
        return Err(SongLoadError::MissingFile(path.display().to_string()));
    }
    std::fs::read_to_string(path).map_err(|e| SongLoadError::Io(e.to_string()))
}

fn dir_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}
