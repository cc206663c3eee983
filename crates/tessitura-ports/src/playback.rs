#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("nothing loaded: {0}")]
    NotLoaded(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Backing-track playback as seen by the session loop.
///
/// Thread model: every method is called from the control loop, never from the
/// capture callback, so implementations may lock internally.
pub trait PlaybackPort: Send + Sync {
    fn play(&self) -> Result<(), PlaybackError>;
    fn stop(&self) -> Result<(), PlaybackError>;

    /// Current playback position in seconds, `None` when the backend cannot
    /// report one right now (not started, device glitch).
    fn position_s(&self) -> Option<f64>;

    fn is_finished(&self) -> bool;
}
