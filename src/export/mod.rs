//! Exporter: pure, deterministic transforms from a saved script to an
//! executable automation artifact. One strategy per target format behind a
//! common seam; adding a format means adding a strategy module, nothing
//! in the session or store changes.

pub mod java;
pub mod python;
pub mod side;

use crate::error::{Result, TestflowError};
use crate::recording::{Action, Step};
use crate::script::Script;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Selenium IDE interchange bundle (.side).
    Side,
    /// selenium-java test class.
    Java,
    /// selenium-python test module.
    Python,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] =
        [ExportFormat::Side, ExportFormat::Java, ExportFormat::Python];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Side => "side",
            ExportFormat::Java => "java",
            ExportFormat::Python => "py",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Side => "application/json",
            ExportFormat::Java | ExportFormat::Python => "text/plain; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = TestflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "side" => Ok(ExportFormat::Side),
            "java" => Ok(ExportFormat::Java),
            "python" => Ok(ExportFormat::Python),
            other => Err(TestflowError::Config(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExportFormat::Side => "side",
            ExportFormat::Java => "java",
            ExportFormat::Python => "python",
        })
    }
}

/// A rendered export. Derived, never persisted; regenerated on request.
#[derive(Debug, Clone, Serialize)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub file_name: String,
    pub content: String,
}

/// Render `script` into the requested format.
///
/// Deterministic: identical input yields byte-identical output, so callers
/// may diff or cache artifacts freely.
pub fn export(script: &Script, format: ExportFormat) -> Result<ExportArtifact> {
    let content = match format {
        ExportFormat::Side => side::render(script)?,
        ExportFormat::Java => java::render(script)?,
        ExportFormat::Python => python::render(script)?,
    };

    Ok(ExportArtifact {
        format,
        file_name: format!("{}.{}", script.id, format.extension()),
        content,
    })
}

/// Reject any step whose action this build cannot render. Silent omission
/// would corrupt test fidelity, so the first offender fails the whole export
/// with its index.
pub(crate) fn check_supported(steps: &[Step]) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        if let Action::Other(name) = &step.action {
            return Err(TestflowError::UnsupportedAction {
                index,
                action: name.clone(),
            });
        }
    }
    Ok(())
}

/// Split a free-form script name into identifier words.
fn words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// PascalCase identifier for a script name, guarded against empty names and
/// leading digits (e.g. "Login Flow" -> "LoginFlow").
pub(crate) fn pascal_identifier(name: &str) -> String {
    let mut out = String::new();
    for word in words(name) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.is_empty() {
        out.push_str("Recorded");
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, 'T');
    }
    out
}

/// snake_case identifier for a script name (e.g. "Login Flow" -> "login_flow").
pub(crate) fn snake_identifier(name: &str) -> String {
    let mut out = words(name).join("_");
    if out.is_empty() {
        out.push_str("recorded");
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, 't');
    }
    out
}

/// camelCase identifier for a script name (e.g. "Login Flow" -> "loginFlow").
pub(crate) fn camel_identifier(name: &str) -> String {
    let pascal = pascal_identifier(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => pascal,
    }
}

/// First navigate target in the script, used as the suite base url.
pub(crate) fn base_url(script: &Script) -> &str {
    script
        .steps
        .iter()
        .find(|s| s.action == Action::Navigate)
        .and_then(|s| s.url.as_deref())
        .unwrap_or("")
}
