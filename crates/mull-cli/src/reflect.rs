//! The generation collaborator: one bounded HTTP call per pass.
//!
//! Posts a composed prompt to an Ollama-style `/api/generate` endpoint and
//! returns the trimmed response text. Bad status, timeout, and a missing
//! or blank `response` field all surface as the same "generation failed"
//! error; the pass simply stays due until a later poll succeeds.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::json;

use mull_core::{Inquiry, build_prompt};

use crate::config::LlmConfig;

pub struct Generator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl Generator {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Compose the prompt for one pass and run it through the backend.
    pub async fn run_pass(
        &self,
        inquiry: &Inquiry,
        pass_number: u8,
        instruction: &str,
    ) -> Result<String> {
        let prompt = build_prompt(inquiry, pass_number, instruction);
        self.generate(&prompt).await
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            },
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .context("generation failed: request did not complete")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("generation failed: backend returned {status}");
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .context("generation failed: invalid response body")?;

        match payload
            .get("response")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(text) => Ok(text.to_string()),
            None => bail!("generation failed: response missing text"),
        }
    }
}
