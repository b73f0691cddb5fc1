//! Applies one decided action to the live page.
//!
//! Each action is a single-shot transition. Targeted actions re-read the page
//! and ground their index against that fresh snapshot immediately before
//! touching anything, then pass through the safety gate.

use tracing::{info, warn};

use crate::config::{SearchConfig, Timings, settle};
use crate::dom::capture_snapshot;
use crate::error::{ExecutionError, SafetyAbort, StepError};
use crate::page::{ClickMode, Page};
use crate::safety::{Operator, SafetyGate};
use crate::types::{Action, Element};

/// Decides whether typing into a field should be followed by Enter.
///
/// Name/role keyword matching: misses search boxes labelled in other
/// languages and fires on non-search fields that mention a term. Replace the
/// terms, or disable it, when a site needs something else.
#[derive(Debug, Clone)]
pub struct SearchHeuristic {
    terms: Vec<String>,
    enabled: bool,
}

pub const SEARCH_TERMS: &[&str] = &["search", "поиск", "найти", "искать"];

impl Default for SearchHeuristic {
    fn default() -> Self {
        Self::with_terms(SEARCH_TERMS.iter().copied())
    }
}

impl SearchHeuristic {
    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            terms: Vec::new(),
            enabled: false,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        if !config.submit_on_enter {
            return Self::disabled();
        }
        Self::with_terms(
            SEARCH_TERMS
                .iter()
                .map(|t| t.to_string())
                .chain(config.extra_terms.iter().cloned()),
        )
    }

    pub fn matches(&self, el: &Element) -> bool {
        if !self.enabled {
            return false;
        }
        let role = el.role.to_lowercase();
        let name = el.name.to_lowercase();
        role == "searchbox"
            || self
                .terms
                .iter()
                .any(|t| name.contains(t.as_str()) || role.contains(t.as_str()))
    }
}

pub struct Executor<'a, P: Page + ?Sized> {
    page: &'a P,
    timings: Timings,
    gate: SafetyGate,
    search: SearchHeuristic,
}

impl<'a, P: Page + ?Sized> Executor<'a, P> {
    pub fn new(page: &'a P, timings: Timings) -> Self {
        Self {
            page,
            timings,
            gate: SafetyGate::default(),
            search: SearchHeuristic::default(),
        }
    }

    pub fn with_gate(mut self, gate: SafetyGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_search_heuristic(mut self, search: SearchHeuristic) -> Self {
        self.search = search;
        self
    }

    pub fn page(&self) -> &'a P {
        self.page
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Run `action` against the page. `Done` is a no-op here; the loop stops on it.
    pub fn execute<O: Operator + ?Sized>(
        &self,
        action: &Action,
        operator: &mut O,
    ) -> Result<(), StepError> {
        match action {
            Action::Click { target, .. } => {
                let el = self.ground_and_gate(action, *target, operator)?;
                self.click(&el)
            }
            Action::TypeText { target, text, .. } => {
                let el = self.ground_and_gate(action, *target, operator)?;
                self.type_text(&el, text)
            }
            Action::Navigate { url, .. } => self.navigate(url),
            Action::PressKey { key, target, .. } => {
                if key.trim().is_empty() {
                    return Err(ExecutionError::MissingKey.into());
                }
                if let Some(target) = target {
                    self.ground_and_gate(action, *target, operator)?;
                }
                self.press_key(key)
            }
            Action::Wait { .. } => {
                settle(self.timings.wait_action);
                Ok(())
            }
            Action::AskUser { reason } => Err(StepError::UserInputRequired(reason.clone())),
            Action::Done { .. } => Ok(()),
        }
    }

    /// Fresh snapshot, index lookup, then the destructive-action check.
    fn ground_and_gate<O: Operator + ?Sized>(
        &self,
        action: &Action,
        target: i64,
        operator: &mut O,
    ) -> Result<Element, StepError> {
        let snapshot = capture_snapshot(self.page, &self.timings)?;
        let el = snapshot.ground(target)?.clone();

        if SafetyGate::applies_to(action) {
            if let Some(hit) = self.gate.check(&el) {
                let reason = hit.describe(&el);
                warn!(%reason, "destructive-looking action needs confirmation");
                if !operator.confirm(&action.to_string(), &reason) {
                    return Err(SafetyAbort::UserDeclined { reason }.into());
                }
                info!("action confirmed by user");
            }
        }
        Ok(el)
    }

    fn scroll_to(&self, el: &Element) {
        if let Err(e) = self.page.scroll_into_view(&el.selector) {
            warn!(index = el.index, "could not scroll element into view: {:#}", e);
        }
        settle(self.timings.scroll_settle);
    }

    fn wait_visible(&self, el: &Element) -> Result<(), StepError> {
        self.page
            .wait_visible(&el.selector, self.timings.visibility)
            .map_err(|_| {
                ExecutionError::VisibilityTimeout {
                    index: el.index,
                    selector: el.selector.clone(),
                    timeout: self.timings.visibility,
                }
                .into()
            })
    }

    fn click(&self, el: &Element) -> Result<(), StepError> {
        info!(
            index = el.index,
            selector = %el.selector,
            name = %el.name,
            role = %el.role,
            in_viewport = el.in_viewport,
            "clicking element"
        );
        self.scroll_to(el);
        self.wait_visible(el)?;

        if let Err(e) = self
            .page
            .click(&el.selector, ClickMode::Pointer, self.timings.click)
        {
            warn!("plain click failed, retrying with force: {:#}", e);
            self.page
                .click(&el.selector, ClickMode::Forced, self.timings.click)
                .map_err(|e| ExecutionError::ClickFailed {
                    index: el.index,
                    reason: format!("{e:#}"),
                })?;
        }

        settle(self.timings.click_settle);
        Ok(())
    }

    fn type_text(&self, el: &Element, text: &str) -> Result<(), StepError> {
        let fill_failed = |e: anyhow::Error| ExecutionError::FillFailed {
            index: el.index,
            reason: format!("{e:#}"),
        };

        self.scroll_to(el);
        self.wait_visible(el)?;

        self.page
            .click(&el.selector, ClickMode::Pointer, self.timings.click)
            .map_err(fill_failed)?;
        if let Err(e) = self.page.fill(&el.selector, "") {
            warn!(index = el.index, "could not clear field: {:#}", e);
        }
        self.page.fill(&el.selector, text).map_err(fill_failed)?;

        if self.search.matches(el) {
            settle(self.timings.submit_delay);
            self.page
                .press_key("Enter")
                .map_err(|e| ExecutionError::KeyPressFailed {
                    key: "Enter".to_string(),
                    reason: format!("{e:#}"),
                })?;
            info!(index = el.index, "submitted search field with Enter");
        }

        settle(self.timings.scroll_settle);
        Ok(())
    }

    fn navigate(&self, url: &str) -> Result<(), StepError> {
        self.page
            .goto(url, self.timings.navigation)
            .map_err(|e| ExecutionError::NavigationFailed(format!("{e:#}")))?;
        settle(self.timings.navigation_settle);
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<(), StepError> {
        self.page
            .press_key(key)
            .map_err(|e| ExecutionError::KeyPressFailed {
                key: key.to_string(),
                reason: format!("{e:#}"),
            })?;
        settle(self.timings.click_settle);
        Ok(())
    }
}
