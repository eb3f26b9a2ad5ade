/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    pub openai_api_key: String,
    pub chat_model: String,
    /// Length of every generated conversation, in turns.
    pub max_turns: u32,
}

impl CoreConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let max_turns_str = std::env::var("MAX_TURNS").unwrap_or_else(|_| "20".to_string());
        let max_turns = max_turns_str
            .parse::<u32>()
            .ok()
            .filter(|n| (2..=100).contains(n))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MAX_TURNS".to_string(),
                    format!("'{max_turns_str}' is not a turn count between 2 and 100"),
                )
            })?;

        Ok(Self {
            openai_api_key,
            chat_model,
            max_turns,
        })
    }
}
