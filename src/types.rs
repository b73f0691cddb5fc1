use serde::{Deserialize, Serialize};
use std::fmt;

/// One actionable element as reported by the in-page extractor.
///
/// `index` is only meaningful for the snapshot that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub index: usize,
    pub selector: String,
    pub role: String,
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub in_viewport: bool,
}

fn default_true() -> bool {
    true
}

/// A single decision emitted by the decision provider.
///
/// Wire format: `{"type": "click", "target": 3, "reason": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click {
        target: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "type")]
    TypeText {
        target: i64,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    PressKey {
        // Missing key is an execution-time failure, not a protocol one.
        #[serde(default)]
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    AskUser {
        #[serde(default, alias = "text")]
        reason: String,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl Action {
    pub fn reason(&self) -> Option<&str> {
        match self {
            Action::Click { reason, .. }
            | Action::TypeText { reason, .. }
            | Action::Navigate { reason, .. }
            | Action::PressKey { reason, .. }
            | Action::Wait { reason }
            | Action::Done { reason } => reason.as_deref(),
            Action::AskUser { reason } => Some(reason),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Action::Done { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { target, .. } => write!(f, "click {target}"),
            Action::TypeText { target, text, .. } => {
                write!(f, "type \"{}\" into {target}", snippet(text, TYPED_TEXT_SNIPPET_CHARS))
            }
            Action::Navigate { url, .. } => write!(f, "navigate to {url}"),
            Action::PressKey {
                key,
                target: Some(target),
                ..
            } => write!(f, "press key {key} on {target}"),
            Action::PressKey { key, .. } => write!(f, "press key {key}"),
            Action::Wait { .. } => write!(f, "wait"),
            Action::AskUser { reason } => write!(f, "ask user: {reason}"),
            Action::Done { .. } => write!(f, "done"),
        }
    }
}

/// Truncate to `max` characters, marking the cut with "...".
pub fn snippet(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// One executed step as remembered by the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub observation: String,
}

/// Hard cap on the number of elements in one snapshot.
pub const MAX_SNAPSHOT_ELEMENTS: usize = 130;
pub const ELEMENT_NAME_MAX_CHARS: usize = 100;
pub const HISTORY_CAPACITY: usize = 10;
pub const MAX_STEPS_PER_TASK: usize = 25;
pub const TYPED_TEXT_SNIPPET_CHARS: usize = 30;
