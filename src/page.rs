use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

/// How a click is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// Real mouse events at the element's centre, subject to hit-testing.
    Pointer,
    /// `element.click()` from script; ignores overlays.
    Forced,
}

/// The browser operations the loop needs from a page.
///
/// Selectors are CSS. Every call that may wait takes an explicit bound.
pub trait Page {
    /// Navigate and wait until the document has finished parsing.
    fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a JavaScript expression and return its primitive value.
    fn evaluate(&self, script: &str) -> Result<Value>;

    fn scroll_into_view(&self, selector: &str) -> Result<()>;

    /// Wait until the first match of `selector` is rendered and visible.
    fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()>;

    fn click(&self, selector: &str, mode: ClickMode, timeout: Duration) -> Result<()>;

    /// Replace the value of a focused field with `text`; an empty string clears it.
    fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// Send a key to whatever currently has focus.
    fn press_key(&self, key: &str) -> Result<()>;

    fn url(&self) -> String;

    fn title(&self) -> Result<String>;

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
