//! The perceive → decide → act → observe loop.

use tracing::{info, warn};

use crate::brain::DecisionProvider;
use crate::config::AgentConfig;
use crate::dom::capture_snapshot;
use crate::error::{AgentError, StepError};
use crate::execute::Executor;
use crate::history::HistoryBuffer;
use crate::observe::{PageMark, summarize};
use crate::page::Page;
use crate::prompt::build_prompt;
use crate::safety::Operator;
use crate::types::{Action, MAX_STEPS_PER_TASK};

/// Progress reports for whoever is watching the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Thinking { step: usize },
    Step { number: usize, description: String },
    StepError { message: String },
    Observation { text: String },
    InputRequired { question: String },
    TaskComplete { summary: Option<String> },
    TaskError { message: String },
}

pub trait EventSink {
    fn emit(&mut self, event: AgentEvent);
}

impl<F: FnMut(AgentEvent)> EventSink for F {
    fn emit(&mut self, event: AgentEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The decision provider answered `done`.
    Completed { steps: usize, summary: Option<String> },
    StepLimit { steps: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFlow {
    Continue,
    Finished(Option<String>),
}

pub struct Agent<'a, P: Page + ?Sized, D, O> {
    executor: Executor<'a, P>,
    brain: D,
    operator: O,
    max_steps: usize,
    max_perception_failures: usize,
    perception_failures: usize,
}

impl<'a, P, D, O> Agent<'a, P, D, O>
where
    P: Page + ?Sized,
    D: DecisionProvider,
    O: Operator,
{
    pub fn new(executor: Executor<'a, P>, brain: D, operator: O) -> Self {
        let defaults = AgentConfig::default();
        Self {
            executor,
            brain,
            operator,
            max_steps: MAX_STEPS_PER_TASK,
            max_perception_failures: defaults.max_perception_failures,
            perception_failures: 0,
        }
    }

    pub fn with_limits(mut self, limits: &AgentConfig) -> Self {
        self.max_steps = limits.max_steps;
        self.max_perception_failures = limits.max_perception_failures.max(1);
        self
    }

    pub fn brain(&self) -> &D {
        &self.brain
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    /// Drive the loop until `done`, the step limit, or a fatal error.
    pub fn run<E: EventSink>(
        &mut self,
        goal: &str,
        events: &mut E,
    ) -> Result<RunOutcome, AgentError> {
        let mut history = HistoryBuffer::new();
        self.perception_failures = 0;
        let mut steps = 0;

        loop {
            if steps >= self.max_steps {
                warn!(steps, "step limit reached");
                events.emit(AgentEvent::TaskError {
                    message: format!("Reached maximum step limit ({})", self.max_steps),
                });
                return Ok(RunOutcome::StepLimit { steps });
            }

            match self.step(goal, &mut history, steps + 1, events) {
                Ok(StepFlow::Continue) => steps += 1,
                Ok(StepFlow::Finished(summary)) => {
                    info!(steps, "task complete");
                    events.emit(AgentEvent::TaskComplete {
                        summary: summary.clone(),
                    });
                    return Ok(RunOutcome::Completed { steps, summary });
                }
                Err(e) => {
                    events.emit(AgentEvent::TaskError {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }
    }

    /// One iteration. Step-level failures end up in `history`; only a
    /// missing decision or exhausted perception is returned as an error.
    pub fn step<E: EventSink>(
        &mut self,
        goal: &str,
        history: &mut HistoryBuffer,
        number: usize,
        events: &mut E,
    ) -> Result<StepFlow, AgentError> {
        let page = self.executor.page();
        let timings = *self.executor.timings();

        let snapshot = match capture_snapshot(page, &timings) {
            Ok(snapshot) => {
                self.perception_failures = 0;
                snapshot
            }
            Err(err) => {
                self.perception_failures += 1;
                warn!(attempt = self.perception_failures, "perception failed: {}", err);
                if self.perception_failures >= self.max_perception_failures {
                    return Err(AgentError::PerceptionExhausted {
                        attempts: self.perception_failures,
                        last: err,
                    });
                }
                let observation = format!("ERROR: {err}");
                events.emit(AgentEvent::StepError {
                    message: err.to_string(),
                });
                history.push("perceive page", observation);
                return Ok(StepFlow::Continue);
            }
        };

        events.emit(AgentEvent::Thinking { step: number });
        let prompt = build_prompt(goal, &snapshot, history);
        drop(snapshot);

        let action = self.brain.next_action(&prompt)?;
        let description = action.to_string();
        info!(step = number, action = %description, "executing");
        events.emit(AgentEvent::Step {
            number,
            description: description.clone(),
        });

        if let Action::Done { reason } = &action {
            return Ok(StepFlow::Finished(reason.clone()));
        }

        let before = PageMark::capture(page);
        let outcome = self.executor.execute(&action, &mut self.operator);
        let observation = match outcome {
            Err(StepError::UserInputRequired(question)) => self.ask_operator(&question, events),
            outcome => {
                if let Err(err) = &outcome {
                    warn!(step = number, "step failed: {}", err);
                    events.emit(AgentEvent::StepError {
                        message: err.to_string(),
                    });
                }
                summarize(page, &before, &outcome, &timings)
            }
        };

        events.emit(AgentEvent::Observation {
            text: observation.clone(),
        });
        history.push(description, observation);
        Ok(StepFlow::Continue)
    }

    fn ask_operator<E: EventSink>(&mut self, question: &str, events: &mut E) -> String {
        events.emit(AgentEvent::InputRequired {
            question: question.to_string(),
        });
        match self.operator.ask(question) {
            Some(answer) => format!("User answered: {answer}"),
            None => format!("ERROR: user input required: {question} (no answer given)"),
        }
    }
}
