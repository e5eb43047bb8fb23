pub mod api;
pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod recording;
pub mod runner;
pub mod script;
pub mod state;

pub use error::{Result, TestflowError};
