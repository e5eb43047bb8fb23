//! Persisted script data structures.

use crate::recording::Step;
use serde::{Deserialize, Serialize};

/// A saved, named, ordered sequence of recorded steps, owned by a project.
///
/// Wire names are camelCase to match the persisted layout; the `steps` array
/// keeps submission order exactly and round-trips byte-for-byte through
/// save, export and re-import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub project_id: String,
    pub name: String,
    /// Free-text grouping within a project.
    pub module: String,
    pub steps: Vec<Step>,
    /// Unix milliseconds.
    pub created_at: u64,
}
