use anyhow::{Context, Result, anyhow, bail};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::BrowserConfig;
use crate::dom::DOM_LOADED_JS;
use crate::page::{ClickMode, Page};

const POLL: Duration = Duration::from_millis(100);

const IS_VISIBLE_FN: &str = r#"function () {
  const s = getComputedStyle(this);
  if (s.display === 'none' || s.visibility === 'hidden' || s.opacity === '0') return false;
  const r = this.getBoundingClientRect();
  return r.width > 0 && r.height > 0;
}"#;

const FORCE_CLICK_FN: &str = "function () { this.click(); }";

const CLEAR_FN: &str = r#"function () {
  this.focus();
  if ('value' in this) {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
  } else if (this.isContentEditable) {
    this.textContent = '';
  }
}"#;

/// Browser session owned by the loop for its whole lifetime.
pub struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(config: &BrowserConfig, user_data_dir: Option<std::path::PathBuf>) -> Result<Self> {
        // 1. Attach to a running Chrome if one was configured
        if let Some(url) = &config.attach_url {
            info!(%url, "attaching to existing Chrome");
            let browser = Browser::connect(url.clone())
                .map_err(|e| anyhow!("could not attach to Chrome at {}: {}", url, e))?;

            let existing = {
                let tabs = browser.get_tabs();
                let tabs = tabs
                    .lock()
                    .map_err(|_| anyhow!("Chrome tab list is poisoned"))?;
                tabs.first().cloned()
            };
            let tab = match existing {
                Some(tab) => tab,
                None => browser.new_tab()?,
            };
            return Ok(Self {
                _browser: browser,
                tab,
            });
        }

        // 2. Launch our own, with a persistent profile so logins survive
        if let Some(dir) = &user_data_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("could not create profile dir {}", dir.display()))?;
        }

        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            user_data_dir,
            window_size: Some((config.viewport.width, config.viewport.height)),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        info!(headless = config.headless, "launching Chrome");
        let browser =
            Browser::new(options).map_err(|e| anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    pub fn page(&self) -> ChromePage {
        ChromePage {
            tab: self.tab.clone(),
        }
    }
}

/// [`Page`] over a headless_chrome tab.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    fn find(&self, selector: &str, timeout: Duration) -> Result<Element<'_>> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .with_context(|| format!("element {selector:?} not found"))
    }

    fn poll_until<F>(&self, timeout: Duration, mut ready: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(POLL);
        }
    }
}

impl Page for ChromePage {
    fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("navigation to {url} failed"))?;
        let parsed = self.poll_until(timeout, || {
            matches!(self.evaluate(DOM_LOADED_JS), Ok(Value::Bool(true)))
        });
        if !parsed {
            bail!("navigation to {url} did not reach DOMContentLoaded within {timeout:?}");
        }
        Ok(())
    }

    fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self.tab.evaluate(script, false)?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn scroll_into_view(&self, selector: &str) -> Result<()> {
        self.tab.find_element(selector)?.scroll_into_view()?;
        Ok(())
    }

    fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        let visible = self.poll_until(timeout, || {
            self.tab
                .find_element(selector)
                .and_then(|el| el.call_js_fn(IS_VISIBLE_FN, vec![], false))
                .map(|obj| obj.value.and_then(|v| v.as_bool()).unwrap_or(false))
                .unwrap_or(false)
        });
        if !visible {
            bail!("element {selector:?} not visible after {timeout:?}");
        }
        Ok(())
    }

    fn click(&self, selector: &str, mode: ClickMode, timeout: Duration) -> Result<()> {
        let el = self.find(selector, timeout)?;
        match mode {
            ClickMode::Pointer => {
                el.click()?;
            }
            ClickMode::Forced => {
                debug!(%selector, "dispatching forced click");
                el.call_js_fn(FORCE_CLICK_FN, vec![], false)?;
            }
        }
        Ok(())
    }

    fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let el = self.tab.find_element(selector)?;
        el.call_js_fn(CLEAR_FN, vec![], false)?;
        if !text.is_empty() {
            self.tab.type_str(text)?;
        }
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<()> {
        self.tab.press_key(key)?;
        Ok(())
    }

    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn title(&self) -> Result<String> {
        Ok(self.tab.get_title()?)
    }

    fn close(&self) -> Result<()> {
        self.tab.close(true)?;
        Ok(())
    }
}
