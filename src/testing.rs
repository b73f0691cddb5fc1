//! Scripted stand-ins for the browser and the decision provider.

use anyhow::{Result, anyhow};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use crate::brain::DecisionProvider;
use crate::dom::{DOM_LOADED_JS, EXTRACT_ELEMENTS_JS, READY_JS};
use crate::error::DecisionError;
use crate::observe::{RESULT_HEADINGS_JS, VISIBLE_TEXT_JS};
use crate::page::{ClickMode, Page};
use crate::safety::Operator;
use crate::types::{Action, Element};

pub(crate) fn element(index: usize, selector: &str, role: &str, name: &str) -> Element {
    Element {
        index,
        selector: selector.to_string(),
        role: role.to_string(),
        name: name.to_string(),
        disabled: false,
        visible: true,
        in_viewport: true,
    }
}

#[derive(Default)]
pub(crate) struct FakePage {
    pub elements: RefCell<Vec<Element>>,
    pub not_ready: Cell<bool>,
    /// `document.readyState` stays at `loading`.
    pub loading: Cell<bool>,
    pub load_checks: Cell<usize>,
    pub url: RefCell<String>,
    pub title: RefCell<String>,
    pub body_text: RefCell<String>,
    pub headings: RefCell<Vec<String>>,
    pub hidden: Cell<bool>,
    pub scroll_fails: Cell<bool>,
    pub pointer_click_fails: Cell<bool>,
    pub forced_click_fails: Cell<bool>,
    pub fill_fails: Cell<bool>,
    pub navigation_error: RefCell<Option<String>>,
    /// URL and title the page switches to after a successful click.
    pub click_leads_to: RefCell<Option<(String, String)>>,
    pub snapshots: Cell<usize>,
    calls: RefCell<Vec<String>>,
}

impl FakePage {
    pub fn new(url: &str, title: &str) -> Self {
        let page = Self::default();
        *page.url.borrow_mut() = url.to_string();
        *page.title.borrow_mut() = title.to_string();
        page
    }

    pub fn with_elements(self, elements: Vec<Element>) -> Self {
        *self.elements.borrow_mut() = elements;
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        *self.body_text.borrow_mut() = text.to_string();
        self
    }

    /// Every interaction (everything except reads), in order.
    pub fn interactions(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl Page for FakePage {
    fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("goto:{url}"));
        if let Some(err) = self.navigation_error.borrow().clone() {
            return Err(anyhow!(err));
        }
        *self.url.borrow_mut() = url.to_string();
        *self.title.borrow_mut() = format!("Title of {url}");
        Ok(())
    }

    fn evaluate(&self, script: &str) -> Result<Value> {
        if script == READY_JS {
            return Ok(Value::Bool(!self.not_ready.get()));
        }
        if script == DOM_LOADED_JS {
            self.load_checks.set(self.load_checks.get() + 1);
            return Ok(Value::Bool(!self.loading.get()));
        }
        if script == EXTRACT_ELEMENTS_JS {
            self.snapshots.set(self.snapshots.get() + 1);
            let json = serde_json::to_string(&*self.elements.borrow())?;
            return Ok(Value::String(json));
        }
        if script == VISIBLE_TEXT_JS {
            return Ok(Value::String(self.body_text.borrow().clone()));
        }
        if script == RESULT_HEADINGS_JS {
            let json = serde_json::to_string(&*self.headings.borrow())?;
            return Ok(Value::String(json));
        }
        Err(anyhow!("unexpected script"))
    }

    fn scroll_into_view(&self, selector: &str) -> Result<()> {
        self.record(format!("scroll:{selector}"));
        if self.scroll_fails.get() {
            return Err(anyhow!("node is detached"));
        }
        Ok(())
    }

    fn wait_visible(&self, selector: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("wait_visible:{selector}"));
        if self.hidden.get() {
            return Err(anyhow!("timed out"));
        }
        Ok(())
    }

    fn click(&self, selector: &str, mode: ClickMode, _timeout: Duration) -> Result<()> {
        let failing = match mode {
            ClickMode::Pointer => {
                self.record(format!("click:{selector}"));
                self.pointer_click_fails.get()
            }
            ClickMode::Forced => {
                self.record(format!("force_click:{selector}"));
                self.forced_click_fails.get()
            }
        };
        if failing {
            return Err(anyhow!("element is covered by another element"));
        }
        if let Some((url, title)) = self.click_leads_to.borrow().clone() {
            *self.url.borrow_mut() = url;
            *self.title.borrow_mut() = title;
        }
        Ok(())
    }

    fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.record(format!("fill:{selector}:{text}"));
        if self.fill_fails.get() && !text.is_empty() {
            return Err(anyhow!("element is not editable"));
        }
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<()> {
        self.record(format!("press:{key}"));
        Ok(())
    }

    fn url(&self) -> String {
        self.url.borrow().clone()
    }

    fn title(&self) -> Result<String> {
        Ok(self.title.borrow().clone())
    }
}

/// Hands out queued actions, then fails with a protocol error.
pub(crate) struct ScriptedBrain {
    actions: VecDeque<Action>,
    pub prompts: Vec<String>,
}

impl ScriptedBrain {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions: actions.into(),
            prompts: Vec::new(),
        }
    }
}

impl DecisionProvider for ScriptedBrain {
    fn next_action(&mut self, prompt: &str) -> Result<Action, DecisionError> {
        self.prompts.push(prompt.to_string());
        self.actions
            .pop_front()
            .ok_or_else(|| DecisionError::Protocol("empty decision payload".to_string()))
    }
}

/// Answers every confirmation and question from fixed values.
pub(crate) struct ScriptedOperator {
    pub approve: bool,
    pub answer: Option<String>,
    pub confirmations: Vec<String>,
    pub questions: Vec<String>,
}

impl ScriptedOperator {
    pub fn approving(approve: bool) -> Self {
        Self {
            approve,
            answer: None,
            confirmations: Vec::new(),
            questions: Vec::new(),
        }
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, action: &str, reason: &str) -> bool {
        self.confirmations.push(format!("{action} | {reason}"));
        self.approve
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        self.questions.push(question.to_string());
        self.answer.clone()
    }
}
