use serde::Serialize;

use crate::constants::{
    DEFAULT_CHAT_MODEL, HISTORY_WINDOW, MAX_TOKENS, SYSTEM_INSTRUCTIONS, TEMPERATURE,
};
use crate::conversation::Turn;
use crate::location::LocationContext;

/// Body of one chat-completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl PromptRequest {
    pub fn system_turn(&self) -> Option<&Turn> {
        self.messages.first()
    }
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    model: String,
}

impl PromptAssembler {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Builds the system turn followed by the last `HISTORY_WINDOW` turns of
    /// `history`, oldest first.
    pub fn assemble(&self, history: &[Turn], location: Option<&LocationContext>) -> PromptRequest {
        let mut instructions = SYSTEM_INSTRUCTIONS.to_string();
        if let Some(location) = location {
            instructions.push_str(&location.annotation());
        }

        let start = history.len().saturating_sub(HISTORY_WINDOW);
        let mut messages = Vec::with_capacity(1 + history.len() - start);
        messages.push(Turn::system(instructions));
        messages.extend_from_slice(&history[start..]);

        PromptRequest {
            model: self.model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_MODEL)
    }
}
