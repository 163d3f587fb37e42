// Fixed values shared by the prompt assembler, the API clients and the UI.
// Anything an operator may want to override lives in `config.rs` instead.

use std::time::Duration;

pub const DEFAULT_GEOCODE_URL: &str = "https://api.openrouteservice.org";
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "openai/gpt-3.5-turbo";
pub const DEFAULT_REFERER: &str = "http://localhost:8501";
pub const DEFAULT_APP_TITLE: &str = "Gardening Assistant";
pub const DEFAULT_PORT: u16 = 8501;

/// Geocoding lookups give up after this long and fall back to "no location".
pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;

pub const GREETING: &str =
    "Hello! I'm your Gardening Assistant. 🌱 How can I help with your plants today?";

pub const SYSTEM_INSTRUCTIONS: &str = "You are an expert gardening assistant. Provide:\n\
- Plant care advice\n\
- Pest/disease solutions\n\
- Seasonal gardening tips\n\
- Soil management recommendations";

/// Number of most recent turns forwarded to the model after the system turn.
pub const HISTORY_WINDOW: usize = 5;
pub const TEMPERATURE: f64 = 0.7;
pub const MAX_TOKENS: u32 = 500;

/// Prefix of assistant turns that stand in for a failed completion.
pub const WARNING_MARKER: &str = "⚠️";
pub const LOCATION_ERROR_MARKER: &str = "🌍";

pub const PLACEHOLDER_ZONE: &str = "8b";

pub const PAGE_TITLE: &str = "🌻 Smart Gardening Assistant";
pub const PAGE_CAPTION: &str = "Your AI-powered gardening expert";
pub const BUSY_LABEL: &str = "🌱 Growing answers...";
