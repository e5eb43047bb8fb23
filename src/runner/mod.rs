//! Playback runner: replays saved scripts against a browser driver and
//! tracks per-step and aggregate results.

pub mod executor;
pub mod registry;
pub mod schema;

pub use executor::PlaybackRunner;
pub use registry::RunRegistry;
pub use schema::{AiAnalysis, PlaybackResult, RunStatus, StepResult, StepStatus};
