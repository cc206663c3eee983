use serde::{Deserialize, Serialize};
use tessitura_domain_eval::ScoreBreakdown;
use tessitura_domain_pitch::UserNote;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    Finished,
}

/// Session output for the display side, drained once per control-loop tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    SessionStateUpdated { state: SessionState },
    NotesUpdated { latest: UserNote, total_notes: usize },
    ScoreUpdated { breakdown: ScoreBreakdown },
    LyricsUpdated {
        current: Option<String>,
        next: Option<String>,
    },
    CaptureOverflow { dropped_samples: u64 },
    FinalScore { breakdown: ScoreBreakdown },
}
