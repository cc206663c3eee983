use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One note of the reference melody, in seconds and fractional MIDI semitones.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNote {
    pub start_s: f64,
    pub duration_s: f64,
    pub midi: f64,
}

impl ReferenceNote {
    pub fn new(start_s: f64, duration_s: f64, midi: f64) -> Self {
        Self {
            start_s,
            duration_s,
            midi,
        }
    }

    pub fn end_s(&self) -> f64 {
        self.start_s + self.duration_s
    }
}

/// Reference notes sorted by start time. Sorted once here and never again.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Melody {
    notes: Vec<ReferenceNote>,
}

impl Melody {
    pub fn new(mut notes: Vec<ReferenceNote>) -> Self {
        notes.sort_by(|a, b| a.start_s.total_cmp(&b.start_s));
        Self { notes }
    }

    pub fn notes(&self) -> &[ReferenceNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// End of the last sounding note, 0 for an empty melody.
    pub fn duration_s(&self) -> f64 {
        self.notes
            .iter()
            .map(ReferenceNote::end_s)
            .fold(0.0, f64::max)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub time_s: f64,
    pub text: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Lyrics {
    lines: Vec<LyricLine>,
}

impl Lyrics {
    pub fn new(mut lines: Vec<LyricLine>) -> Self {
        lines.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        Self { lines }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    /// Line being sung at `time_s` and the one after it. Before the first
    /// timestamp there is no current line and the first line is next.
    pub fn current_and_next(&self, time_s: f64) -> (Option<&LyricLine>, Option<&LyricLine>) {
        let idx = self.lines.partition_point(|line| line.time_s <= time_s);
        let current = idx.checked_sub(1).and_then(|i| self.lines.get(i));
        (current, self.lines.get(idx))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongMeta {
    pub title: String,
    pub artist: Option<String>,
    /// Shift between the backing track and the lyric/melody timeline.
    pub audio_offset_s: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Song {
    pub root: PathBuf,
    pub audio_path: PathBuf,
    pub meta: SongMeta,
    pub lyrics: Lyrics,
    pub melody: Melody,
}

impl Song {
    pub fn duration_s(&self) -> f64 {
        self.melody.duration_s()
    }
}
