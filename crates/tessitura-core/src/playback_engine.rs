use parking_lot::Mutex;
use std::time::Instant;
use tessitura_ports::playback::{PlaybackError, PlaybackPort};

struct WallClockState {
    started_at: Option<Instant>,
    stopped: bool,
}

/// Silent playback that reports wall-clock time since `play`. Used when no
/// audio backend plays the backing track (headless runs, tests).
pub struct WallClockPlayback {
    length_s: Option<f64>,
    state: Mutex<WallClockState>,
}

impl WallClockPlayback {
    pub fn new(length_s: Option<f64>) -> Self {
        Self {
            length_s,
            state: Mutex::new(WallClockState {
                started_at: None,
                stopped: false,
            }),
        }
    }
}

impl PlaybackPort for WallClockPlayback {
    fn play(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.started_at = Some(Instant::now());
        state.stopped = false;
        Ok(())
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        if state.started_at.is_none() {
            return Err(PlaybackError::NotLoaded("playback never started".to_string()));
        }
        state.stopped = true;
        Ok(())
    }

    fn position_s(&self) -> Option<f64> {
        let state = self.state.lock();
        if state.stopped {
            return None;
        }
        state.started_at.map(|start| start.elapsed().as_secs_f64())
    }

    fn is_finished(&self) -> bool {
        let state = self.state.lock();
        if state.stopped {
            return true;
        }
        match (state.started_at, self.length_s) {
            (Some(start), Some(length)) => start.elapsed().as_secs_f64() >= length,
            _ => false,
        }
    }
}
