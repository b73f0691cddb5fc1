//! Runtime settings.
//!
//! Loaded from an optional YAML file, then overridden from the environment
//! (after `.env` is read by the binary).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::MAX_STEPS_PER_TASK;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub timeouts: TimeoutConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub safety: SafetyConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub chrome_path: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    /// DevTools websocket URL of an already running Chrome to attach to.
    pub attach_url: Option<String>,
    pub start_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport: Viewport::default(),
            chrome_path: None,
            user_data_dir: None,
            attach_url: None,
            start_url: "https://example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 900,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub page_ready_ms: u64,
    pub visibility_ms: u64,
    pub click_ms: u64,
    pub navigation_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page_ready_ms: 15_000,
            visibility_ms: 10_000,
            click_ms: 10_000,
            navigation_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_steps: usize,
    pub max_perception_failures: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: MAX_STEPS_PER_TASK,
            max_perception_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Added to the built-in destructive vocabulary.
    pub extra_terms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub submit_on_enter: bool,
    pub extra_terms: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            submit_on_enter: true,
            extra_terms: Vec::new(),
        }
    }
}

impl Config {
    /// Read `path` if given, otherwise the default location if it exists,
    /// otherwise start from defaults. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(raw) = get("BROWSER_HEADLESS") {
            self.browser.headless = parse_bool("BROWSER_HEADLESS", &raw)?;
        }
        if let Some(dir) = get("BROWSER_USER_DATA_DIR") {
            self.browser.user_data_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = get("BROWSER_CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Profile directory for a launched Chrome.
    pub fn user_data_dir(&self) -> Option<PathBuf> {
        self.browser
            .user_data_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("dom-pilot").join("profile")))
    }

    pub fn timings(&self) -> Timings {
        Timings {
            page_ready: Duration::from_millis(self.timeouts.page_ready_ms),
            visibility: Duration::from_millis(self.timeouts.visibility_ms),
            click: Duration::from_millis(self.timeouts.click_ms),
            navigation: Duration::from_millis(self.timeouts.navigation_ms),
            ..Timings::default()
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dom-pilot").join("config.yml"))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Every bounded wait and fixed settle delay used by the loop.
///
/// Delays are constants, never adaptive, so a step's timing is reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub page_ready: Duration,
    pub visibility: Duration,
    pub click: Duration,
    pub navigation: Duration,
    /// Bound on waiting for DOMContentLoaded before observing a step.
    pub load_state: Duration,
    pub scroll_settle: Duration,
    pub click_settle: Duration,
    pub submit_delay: Duration,
    pub navigation_settle: Duration,
    pub wait_action: Duration,
    pub post_step_settle: Duration,
    pub poll: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            page_ready: Duration::from_secs(15),
            visibility: Duration::from_secs(10),
            click: Duration::from_secs(10),
            navigation: Duration::from_secs(15),
            load_state: Duration::from_secs(10),
            scroll_settle: Duration::from_millis(300),
            click_settle: Duration::from_millis(500),
            submit_delay: Duration::from_millis(300),
            navigation_settle: Duration::from_millis(1500),
            wait_action: Duration::from_millis(2000),
            post_step_settle: Duration::from_millis(1200),
            poll: Duration::from_millis(100),
        }
    }
}

impl Timings {
    /// No delays at all; for driving the loop against a scripted page.
    pub fn immediate() -> Self {
        Self {
            page_ready: Duration::ZERO,
            visibility: Duration::ZERO,
            click: Duration::ZERO,
            navigation: Duration::ZERO,
            load_state: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            click_settle: Duration::ZERO,
            submit_delay: Duration::ZERO,
            navigation_settle: Duration::ZERO,
            wait_action: Duration::ZERO,
            post_step_settle: Duration::ZERO,
            poll: Duration::ZERO,
        }
    }
}

/// Sleep for a fixed delay; zero is a no-op.
pub fn settle(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_config_uses_reference_timeouts() {
        let config = Config::from_yaml("").unwrap();
        let t = config.timings();
        assert_eq!(t.page_ready, Duration::from_secs(15));
        assert_eq!(t.visibility, Duration::from_secs(10));
        assert_eq!(t.navigation, Duration::from_secs(15));
        assert_eq!(config.agent.max_steps, MAX_STEPS_PER_TASK);
        assert!(config.search.submit_on_enter);
    }

    #[test]
    fn loads_partial_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "browser:\n  headless: true\n  viewport:\n    width: 800\ntimeouts:\n  visibility_ms: 2500\nsafety:\n  extra_terms: [\"transfer\"]"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.browser.headless);
        assert_eq!(config.browser.viewport.width, 800);
        assert_eq!(config.browser.viewport.height, 900);
        assert_eq!(config.timings().visibility, Duration::from_millis(2500));
        assert_eq!(config.safety.extra_terms, vec!["transfer".to_string()]);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("BROWSER_HEADLESS", "1"),
            ("LLM_MODEL", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert!(config.browser.headless);
        assert_eq!(config.llm.model, LlmConfig::default().model);
    }

    #[test]
    fn rejects_garbage_bool() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "BROWSER_HEADLESS").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BROWSER_HEADLESS", .. }));
    }
}
