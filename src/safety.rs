//! Confirmation interlock for actions that look destructive.
//!
//! Matching is a case-insensitive substring test over the target element's
//! name, role and selector. It catches the obvious "Buy now" and "Удалить"
//! buttons and nothing more; see [`SafetyAbort`](crate::error::SafetyAbort).

use std::io::{BufRead, Write};

use crate::types::{Action, Element};

/// Built-in destructive vocabulary (English and Russian).
pub const DESTRUCTIVE_TERMS: &[&str] = &[
    "purchase",
    "buy",
    "checkout",
    "confirm",
    "delete",
    "remove",
    "submit order",
    "place order",
    "pay",
    "оплатить",
    "купить",
    "заказать",
    "оформить",
    "подтвердить",
    "удалить",
    "удаление",
];

/// Why the gate stopped an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateMatch {
    pub term: String,
    pub field: &'static str,
}

impl GateMatch {
    pub fn describe(&self, el: &Element) -> String {
        format!(
            "element {} {} contains {:?} (name={:?}, role={:?})",
            el.index, self.field, self.term, el.name, el.role
        )
    }
}

#[derive(Debug, Clone)]
pub struct SafetyGate {
    terms: Vec<String>,
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::with_terms(DESTRUCTIVE_TERMS.iter().copied())
    }
}

impl SafetyGate {
    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// The built-in vocabulary plus `extra`.
    pub fn extended<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut gate = Self::default();
        gate.terms.extend(
            extra
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty()),
        );
        gate
    }

    /// Only element-targeted clicks, typing and key presses are inspected.
    pub fn applies_to(action: &Action) -> bool {
        matches!(
            action,
            Action::Click { .. } | Action::TypeText { .. } | Action::PressKey { .. }
        )
    }

    pub fn check(&self, el: &Element) -> Option<GateMatch> {
        let fields = [
            ("name", el.name.to_lowercase()),
            ("role", el.role.to_lowercase()),
            ("selector", el.selector.to_lowercase()),
        ];
        self.terms.iter().find_map(|term| {
            fields
                .iter()
                .find(|(_, value)| value.contains(term.as_str()))
                .map(|(field, _)| GateMatch {
                    term: term.clone(),
                    field: *field,
                })
        })
    }
}

/// The human on the other side of the loop.
pub trait Operator {
    /// Ask for an explicit yes before a gated action runs.
    fn confirm(&mut self, action: &str, reason: &str) -> bool;

    /// Ask a free-form question; `None` when there is no answer.
    fn ask(&mut self, question: &str) -> Option<String>;
}

/// Talks to the operator over a line-oriented reader and writer.
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl ConsoleOperator<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn confirm(&mut self, action: &str, reason: &str) -> bool {
        let _ = writeln!(self.output, "\n⚠️  Potentially destructive action!");
        let _ = writeln!(self.output, "Action: {action}");
        let _ = writeln!(self.output, "Reason: {reason}");
        let _ = write!(self.output, "Proceed? (y/n): ");
        let _ = self.output.flush();

        self.read_line()
            .map(|answer| is_affirmative(&answer))
            .unwrap_or(false)
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        let _ = writeln!(self.output, "\n❓ The agent needs your input: {question}");
        let _ = write!(self.output, "> ");
        let _ = self.output.flush();

        self.read_line().filter(|answer| !answer.is_empty())
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "д" | "да"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::element;
    use std::io::Cursor;

    #[test]
    fn fires_on_localized_name() {
        let gate = SafetyGate::default();
        let hit = gate.check(&element(0, "button.btn", "button", "Удалить")).unwrap();
        assert_eq!(hit.term, "удалить");
        assert_eq!(hit.field, "name");
    }

    #[test]
    fn matches_role_and_selector_case_insensitively() {
        let gate = SafetyGate::default();
        let hit = gate
            .check(&element(2, "#CheckoutButton", "button", "Continue"))
            .unwrap();
        assert_eq!(hit.field, "selector");
        assert_eq!(hit.term, "checkout");

        let gate = SafetyGate::with_terms(["menuitemradio"]);
        assert!(gate.check(&element(0, "li", "MenuItemRadio", "Dark")).is_some());
    }

    #[test]
    fn ignores_unrelated_elements() {
        let gate = SafetyGate::default();
        for el in [
            element(0, "#q", "searchbox", "Search"),
            element(1, "nav > a:nth-child(2)", "a", "About us"),
            element(2, "#login", "button", "Sign in"),
        ] {
            assert_eq!(gate.check(&el), None, "{el:?}");
        }
    }

    #[test]
    fn custom_vocabulary_replaces_or_extends() {
        let only = SafetyGate::with_terms(["launch"]);
        assert!(only.check(&element(0, "#go", "button", "Launch rocket")).is_some());
        assert!(only.check(&element(0, "#x", "button", "Delete")).is_none());

        let extended = SafetyGate::extended(["Transfer", "  "]);
        assert!(extended.check(&element(0, "#t", "button", "Transfer funds")).is_some());
        assert!(extended.check(&element(0, "#x", "button", "Delete")).is_some());
    }

    #[test]
    fn console_operator_requires_explicit_yes() {
        let mut out = Vec::new();
        let mut op = ConsoleOperator::new(Cursor::new("n\n"), &mut out);
        assert!(!op.confirm("click 0", "element 0 name contains \"удалить\""));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Reason: element 0 name contains"));

        let mut op = ConsoleOperator::new(Cursor::new("Да\n"), Vec::new());
        assert!(op.confirm("click 0", "r"));

        let mut op = ConsoleOperator::new(Cursor::new(""), Vec::new());
        assert!(!op.confirm("click 0", "r"));
    }

    #[test]
    fn console_operator_ask_reads_one_line() {
        let mut op = ConsoleOperator::new(Cursor::new("123456\nrest\n"), Vec::new());
        assert_eq!(op.ask("SMS code?").as_deref(), Some("123456"));

        let mut op = ConsoleOperator::new(Cursor::new("\n"), Vec::new());
        assert_eq!(op.ask("SMS code?"), None);
    }
}
