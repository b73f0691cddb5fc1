//! Perception, grounding, execution and safety for an LLM-driven browser agent.
//!
//! The loop in [`agent`] perceives the current page as an indexed [`ground::Snapshot`],
//! asks a [`brain::DecisionProvider`] for one [`types::Action`], grounds its target
//! against a fresh snapshot, passes it through the [`safety::SafetyGate`] and reports
//! what changed back into a bounded [`history::HistoryBuffer`].

pub mod agent;
pub mod brain;
pub mod config;
pub mod dom;
pub mod error;
pub mod execute;
pub mod ground;
pub mod hands;
pub mod history;
pub mod observe;
pub mod page;
pub mod prompt;
pub mod safety;
pub mod types;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentEvent, EventSink, RunOutcome};
pub use brain::{Brain, DecisionProvider};
pub use config::{Config, Timings};
pub use error::{AgentError, ConfigError, DecisionError, StepError};
pub use execute::{Executor, SearchHeuristic};
pub use ground::Snapshot;
pub use hands::{BrowserSession, ChromePage};
pub use page::{ClickMode, Page};
pub use safety::{ConsoleOperator, Operator, SafetyGate};
pub use types::{Action, Element};
