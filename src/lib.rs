pub mod chat;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod llm_interaction;
pub mod location;
pub mod markdown;
pub mod prompt;
pub mod web_server;
