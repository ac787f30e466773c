use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::VllmProviderConfig;
use super::openai::OpenAiProvider;
use super::utils::{check_context_length_error, openai_response_to_message};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const VLLM_HOST: &str = "http://localhost:8001";
pub const VLLM_MODEL: &str = "Qwen/Qwen3-14B";

/// Client for a vLLM server started with an OpenAI-compatible frontend
/// (`--enable-auto-tool-choice`); speaks the same chat-completions protocol
/// as the OpenAI provider but without auth.
pub struct VllmProvider {
    client: Client,
    config: VllmProviderConfig,
}

impl VllmProvider {
    pub fn new(config: VllmProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self.client.post(&url).json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            _ => Err(anyhow!(
                "Request failed: {}\nPayload: {}",
                response.status(),
                payload
            )),
        }
    }
}

#[async_trait]
impl Provider for VllmProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let payload = OpenAiProvider::build_payload(
            &self.config.model,
            system,
            messages,
            tools,
            self.config.temperature,
            self.config.max_tokens,
            self.config.stop.as_deref(),
        )?;

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            if let Some(err) = check_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("Inference server error: {}", error));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = OpenAiProvider::get_usage(&response)?;

        Ok((message, usage))
    }
}
