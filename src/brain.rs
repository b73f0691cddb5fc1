use reqwest::Client;
use serde_json::json;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{ConfigError, DecisionError};
use crate::prompt::SYSTEM_PROMPT;
use crate::types::Action;

/// Turns a rendered prompt into the next action. One blocking call per step.
pub trait DecisionProvider {
    fn next_action(&mut self, prompt: &str) -> Result<Action, DecisionError>;
}

/// Parse the raw model output into exactly one well-formed action.
pub fn parse_decision(content: &str) -> Result<Action, DecisionError> {
    // Strip possible markdown fences the LLM might add
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if cleaned.is_empty() {
        return Err(DecisionError::Protocol("empty decision payload".to_string()));
    }

    let action: Action = serde_json::from_str(cleaned)
        .map_err(|e| DecisionError::Protocol(format!("{e} in {cleaned:?}")))?;
    validate(&action)?;
    Ok(action)
}

fn validate(action: &Action) -> Result<(), DecisionError> {
    match action {
        Action::Navigate { url, .. } if url.trim().is_empty() => Err(DecisionError::Protocol(
            "navigate requires a non-empty 'url'".to_string(),
        )),
        _ => Ok(()),
    }
}

/// OpenAI-compatible chat completions client.
pub struct Brain {
    client: Client,
    api_key: String,
    config: LlmConfig,
    runtime: Handle,
}

impl Brain {
    /// Must be called from inside a tokio runtime; requests are driven on it.
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            config: config.clone(),
            runtime: Handle::current(),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, DecisionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.config.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": prompt},
                ],
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
                "response_format": {"type": "json_object"},
            }))
            .send()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body);
            warn!(status = status.as_u16(), %message, "decision API error");
            return Err(DecisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json_resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        json_resp["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecisionError::Protocol(format!("no content in response: {json_resp}")))
    }
}

/// `error.message` from a JSON error body, otherwise the body itself.
fn api_error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    match parsed.as_ref().and_then(|v| v["error"]["message"].as_str()) {
        Some(message) => message.to_string(),
        None if body.trim().is_empty() => "Unknown API error".to_string(),
        None => body.trim().to_string(),
    }
}

impl DecisionProvider for Brain {
    fn next_action(&mut self, prompt: &str) -> Result<Action, DecisionError> {
        let content = self.runtime.block_on(self.complete(prompt))?;
        debug!(%content, "model replied");
        parse_decision(&content)
    }
}
