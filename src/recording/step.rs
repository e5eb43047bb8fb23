//! Recorded step model: the canonical representation of one browser
//! interaction, shared by capture, persistence, export and playback.

use crate::error::{Result, TestflowError};
use serde::{Deserialize, Serialize};

/// Kind of recorded interaction.
///
/// Serialized as a lowercase string. Unknown strings survive deserialization
/// as `Other` so a hand-edited or imported script can still be loaded; the
/// exporter and runner reject `Other` with the offending step index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Click,
    Type,
    Navigate,
    Scroll,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Click => "click",
            Action::Type => "type",
            Action::Navigate => "navigate",
            Action::Scroll => "scroll",
            Action::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.as_str() {
            "click" => Action::Click,
            "type" => Action::Type,
            "navigate" => Action::Navigate,
            "scroll" => Action::Scroll,
            _ => Action::Other(s),
        }
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        a.as_str().to_string()
    }
}

/// One recorded browser interaction.
///
/// Field names match the capture wire format exactly so the step array
/// round-trips through save, export and re-import unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Capture time in milliseconds. Non-decreasing within a session.
    pub timestamp: u64,
}

impl Step {
    pub fn click(selector: impl Into<String>, timestamp: u64) -> Self {
        Self {
            action: Action::Click,
            selector: Some(selector.into()),
            url: None,
            value: None,
            timestamp,
        }
    }

    pub fn type_into(
        selector: impl Into<String>,
        value: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            action: Action::Type,
            selector: Some(selector.into()),
            url: None,
            value: Some(value.into()),
            timestamp,
        }
    }

    pub fn navigate(url: impl Into<String>, timestamp: u64) -> Self {
        Self {
            action: Action::Navigate,
            selector: None,
            url: Some(url.into()),
            value: None,
            timestamp,
        }
    }

    pub fn scroll(selector: impl Into<String>, timestamp: u64) -> Self {
        Self {
            action: Action::Scroll,
            selector: Some(selector.into()),
            url: None,
            value: None,
            timestamp,
        }
    }

    /// Validate the action/field invariant: `navigate` carries a url and
    /// nothing else, every other known action carries a selector, `type`
    /// additionally carries a value. The capture boundary calls this before
    /// a step ever enters a session buffer.
    pub fn validate(&self) -> Result<()> {
        let non_empty = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

        match &self.action {
            Action::Navigate => {
                if !non_empty(&self.url) {
                    return Err(TestflowError::InvalidStep(
                        "navigate requires a non-empty url".to_string(),
                    ));
                }
                if self.selector.is_some() {
                    return Err(TestflowError::InvalidStep(
                        "navigate must not carry a selector".to_string(),
                    ));
                }
            }
            Action::Click | Action::Scroll | Action::Type => {
                if !non_empty(&self.selector) {
                    return Err(TestflowError::InvalidStep(format!(
                        "{} requires a non-empty selector",
                        self.action
                    )));
                }
                if self.url.is_some() {
                    return Err(TestflowError::InvalidStep(format!(
                        "{} must not carry a url",
                        self.action
                    )));
                }
                if self.action == Action::Type && !non_empty(&self.value) {
                    return Err(TestflowError::InvalidStep(
                        "type requires a non-empty value".to_string(),
                    ));
                }
            }
            Action::Other(name) => {
                return Err(TestflowError::InvalidStep(format!(
                    "unknown action '{}'",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Validating constructor used at the capture/import boundary.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}
