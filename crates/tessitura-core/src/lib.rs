pub mod capture;
pub mod clock;
pub mod diagnostics;
pub mod ipc;
pub mod playback_engine;
pub mod session;

pub use capture::*;
pub use clock::*;
pub use diagnostics::*;
pub use ipc::*;
pub use playback_engine::*;
pub use session::*;
