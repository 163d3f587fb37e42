use std::fmt;
use std::time::Duration;

use clap::Args;
use reqwest::Client;

use crate::chat::{ConversationController, ViewEvent};
use crate::constants::{
    DEFAULT_APP_TITLE, DEFAULT_CHAT_MODEL, DEFAULT_COMPLETION_TIMEOUT_SECS, DEFAULT_GEOCODE_URL,
    DEFAULT_OPENROUTER_URL, DEFAULT_REFERER,
};
use crate::llm_interaction::ChatCompletionClient;
use crate::location::LocationResolver;
use crate::prompt::PromptAssembler;

/// Process-wide settings. Both API keys are required; clap refuses to start
/// without them.
#[derive(Args, Clone)]
pub struct Config {
    /// OpenRouteService API key used for geocoding.
    #[arg(long, env = "ORS_API_KEY", hide_env_values = true)]
    pub ors_api_key: String,

    /// OpenRouter API key used for chat completions.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: String,

    /// Base URL of the geocoding service.
    #[arg(long, env = "GEOCODE_URL", default_value = DEFAULT_GEOCODE_URL)]
    pub geocode_url: String,

    /// Base URL of the chat-completion service.
    #[arg(long, env = "OPENROUTER_URL", default_value = DEFAULT_OPENROUTER_URL)]
    pub openrouter_url: String,

    /// Model identifier sent with every completion request.
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub model: String,

    /// Value of the HTTP-Referer header sent to the chat API.
    #[arg(long, env = "APP_REFERER", default_value = DEFAULT_REFERER)]
    pub referer: String,

    /// Value of the X-Title header sent to the chat API.
    #[arg(long, env = "APP_TITLE", default_value = DEFAULT_APP_TITLE)]
    pub title: String,

    /// Seconds to wait for a chat completion before giving up.
    #[arg(long, env = "COMPLETION_TIMEOUT_SECS", default_value_t = DEFAULT_COMPLETION_TIMEOUT_SECS)]
    pub completion_timeout_secs: u64,
}

impl Config {
    pub fn resolver(&self, http: Client) -> LocationResolver {
        LocationResolver::new(http, &self.geocode_url, &self.ors_api_key)
    }

    pub fn completion_client(&self, http: Client) -> ChatCompletionClient {
        ChatCompletionClient::new(
            http,
            &self.openrouter_url,
            &self.openrouter_api_key,
            &self.referer,
            &self.title,
        )
        .with_timeout(Duration::from_secs(self.completion_timeout_secs))
    }

    pub fn assembler(&self) -> PromptAssembler {
        PromptAssembler::new(&self.model)
    }

    pub fn controller(
        &self,
        http: Client,
    ) -> (
        ConversationController,
        tokio::sync::mpsc::UnboundedReceiver<ViewEvent>,
    ) {
        ConversationController::new(
            self.resolver(http.clone()),
            self.completion_client(http),
            self.assembler(),
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("ors_api_key", &"<redacted>")
            .field("openrouter_api_key", &"<redacted>")
            .field("geocode_url", &self.geocode_url)
            .field("openrouter_url", &self.openrouter_url)
            .field("model", &self.model)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("completion_timeout_secs", &self.completion_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_defaults_and_debug_redaction() {
        let cli = TestCli::try_parse_from([
            "test",
            "--ors-api-key",
            "ors-secret",
            "--openrouter-api-key",
            "or-secret",
        ])
        .unwrap();

        assert_eq!(cli.config.assembler().model(), DEFAULT_CHAT_MODEL);
        assert_eq!(cli.config.completion_timeout_secs, DEFAULT_COMPLETION_TIMEOUT_SECS);
        let debug = format!("{:?}", cli.config);
        assert!(!debug.contains("ors-secret"));
        assert!(!debug.contains("or-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
