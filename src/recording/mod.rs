//! Recording module: live capture sessions and the recorded step model.

pub mod session;
pub mod step;

pub use session::{RecordingSession, RecordingSessionManager, SessionInfo, SessionStatus};
pub use step::{Action, Step};
