//! Error taxonomy for the perceive / ground / act loop.
//!
//! Everything below [`AgentError`] is recovered by the loop into an
//! observation string. Only [`AgentError`] terminates a run.

use std::time::Duration;
use thiserror::Error;

/// The page could not be perceived.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PerceptionError {
    #[error("page not ready: document body unavailable after {0:?}")]
    PageNotReady(Duration),

    #[error("element extraction failed: {0}")]
    Evaluate(String),

    #[error("element extraction returned malformed data: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroundingError {
    #[error("invalid target index {index} (snapshot has {len} elements)")]
    IndexOutOfRange { index: i64, len: usize },
}

/// Failures of a single concrete interaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("element {index} ({selector}) did not become visible within {timeout:?}")]
    VisibilityTimeout {
        index: usize,
        selector: String,
        timeout: Duration,
    },

    #[error("click on element {index} failed even with force: {reason}")]
    ClickFailed { index: usize, reason: String },

    #[error("could not fill element {index}: {reason}")]
    FillFailed { index: usize, reason: String },

    #[error("press_key requires a non-empty 'key'")]
    MissingKey,

    #[error("key press {key:?} failed: {reason}")]
    KeyPressFailed { key: String, reason: String },

    #[error("{0}")]
    NavigationFailed(String),
}

/// Raised by the safety gate.
///
/// The gate is a best-effort keyword interlock, not a security boundary:
/// destructive controls without a matching word pass through, and harmless
/// controls that happen to contain one are stopped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SafetyAbort {
    #[error("action declined by user ({reason})")]
    UserDeclined { reason: String },
}

/// Everything that can end a single step without ending the loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error(transparent)]
    Perception(#[from] PerceptionError),

    #[error(transparent)]
    Grounding(#[from] GroundingError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Safety(#[from] SafetyAbort),

    /// Not a failure: the decision asked to hand control to a human.
    #[error("user input required: {0}")]
    UserInputRequired(String),
}

impl StepError {
    pub fn is_user_input_required(&self) -> bool {
        matches!(self, StepError::UserInputRequired(_))
    }
}

/// The decision provider did not yield a usable next action.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision request failed: {0}")]
    Transport(String),

    #[error("decision API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed decision: {0}")]
    Protocol(String),
}

/// Conditions that stop the loop.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("perception failed {attempts} times in a row: {last}")]
    PerceptionExhausted {
        attempts: usize,
        last: PerceptionError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
