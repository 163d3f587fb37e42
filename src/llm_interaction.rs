use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::constants::{DEFAULT_COMPLETION_TIMEOUT_SECS, WARNING_MARKER};
use crate::prompt::PromptRequest;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat API request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("chat API response contained no message content")]
    EmptyResponse,
}

// Structures matching the OpenAI-style /chat/completions response
#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatCompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    referer: String,
    title: String,
    timeout: Duration,
}

impl ChatCompletionClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
            timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Sends `request` once and returns the trimmed text of the first choice.
    #[instrument(skip_all, fields(model = %request.model, turns = request.messages.len()))]
    pub async fn complete(&self, request: &PromptRequest) -> Result<String, CompletionError> {
        let url = self.completions_url();
        debug!(%url, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Chat API request failed");
            return Err(CompletionError::Status { status, body });
        }

        let completion = response.json::<CompletionResponse>().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)?;

        debug!(chars = content.len(), "Received chat completion");
        Ok(content.trim().to_string())
    }

    /// Like `complete`, but folds any failure into a displayable reply so the
    /// chat keeps going.
    pub async fn complete_or_warning(&self, request: &PromptRequest) -> String {
        match self.complete(request).await {
            Ok(reply) => reply,
            Err(e) => warning_reply(&e),
        }
    }
}

pub fn warning_reply(error: &CompletionError) -> String {
    format!("{} Error: {}", WARNING_MARKER, error)
}
