use crate::error::{env_error, AppResult, Error};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use toml;

/// Default day-window bounds used when the user record carries none
pub const DEFAULT_WAKE_TIME: &str = "07:00";
pub const DEFAULT_SLEEP_TIME: &str = "23:00";

/// How title-addressed updates resolve duplicate titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TitleMatch {
    /// Update only the first matching event
    #[default]
    FirstMatch,
    /// Update every matching event
    AllMatches,
}

impl TitleMatch {
    fn from_env(value: &str) -> AppResult<Self> {
        match value {
            "first-match" => Ok(TitleMatch::FirstMatch),
            "all-matches" => Ok(TitleMatch::AllMatches),
            other => Err(Error::Config(format!(
                "Invalid TITLE_MATCH value: {} (expected first-match or all-matches)",
                other
            ))),
        }
    }
}

/// Main configuration structure for the application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// User whose calendar this process operates on
    pub user_id: String,
    /// Redis connection URL for the document store
    pub redis_url: String,
    /// Gemini API key for the completion service
    pub gemini_api_key: String,
    /// Gemini model name
    pub gemini_model: String,
    /// Timezone for day windows and display times
    pub timezone: String,
    /// Start of the schedulable day (HH:MM)
    pub wake_time: String,
    /// End of the schedulable day (HH:MM)
    pub sleep_time: String,
    /// Upper bound on one completion-service call, in seconds
    pub completion_timeout_secs: u64,
    /// Duplicate-title resolution policy for title-addressed updates
    pub title_match: TitleMatch,
    /// Re-sort parsed entries and drop overlapping ones before applying
    pub strict_overlap_check: bool,
    /// Optional calendar feed for one-shot imports
    pub calendar_feed_url: Option<String>,
    /// Bearer token for the calendar feed
    pub calendar_feed_token: Option<String>,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        // Required environment variables
        let user_id = env::var("USER_ID").map_err(|_| env_error("USER_ID"))?;
        let gemini_api_key = env::var("GEMINI_API_KEY").map_err(|_| env_error("GEMINI_API_KEY"))?;

        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| String::from("gemini-2.5-pro-exp-03-25"));

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| String::from("redis://127.0.0.1:6379"));

        // Default timezone
        let timezone = env::var("TIMEZONE").unwrap_or_else(|_| String::from("UTC"));

        let wake_time = env::var("WAKE_TIME").unwrap_or_else(|_| String::from(DEFAULT_WAKE_TIME));
        let sleep_time =
            env::var("SLEEP_TIME").unwrap_or_else(|_| String::from(DEFAULT_SLEEP_TIME));

        let completion_timeout_secs = match env::var("COMPLETION_TIMEOUT_SECS") {
            Ok(value) => value.parse::<u64>().map_err(|_| {
                Error::Config(format!("Invalid COMPLETION_TIMEOUT_SECS value: {}", value))
            })?,
            Err(_) => 60,
        };

        let title_match = match env::var("TITLE_MATCH") {
            Ok(value) => TitleMatch::from_env(&value)?,
            Err(_) => TitleMatch::default(),
        };

        let strict_overlap_check = match env::var("STRICT_OVERLAP_CHECK") {
            Ok(value) => value != "false" && value != "0",
            Err(_) => true,
        };

        let calendar_feed_url = env::var("CALENDAR_FEED_URL").ok();
        let calendar_feed_token = env::var("CALENDAR_FEED_TOKEN").ok();

        // Initialize default components
        let mut components = HashMap::new();
        components.insert("events".to_string(), true);
        components.insert("scheduler".to_string(), true);

        // Load components configuration from file if it exists
        if let Ok(content) = fs::read_to_string("config/components.toml") {
            if let Ok(file_components) = toml::from_str::<HashMap<String, bool>>(&content) {
                // Merge with defaults
                for (key, value) in file_components {
                    components.insert(key, value);
                }
            }
        }

        Ok(Config {
            user_id,
            redis_url,
            gemini_api_key,
            gemini_model,
            timezone,
            wake_time,
            sleep_time,
            completion_timeout_secs,
            title_match,
            strict_overlap_check,
            calendar_feed_url,
            calendar_feed_token,
            components,
        })
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }

    /// Update component enabled status
    #[allow(dead_code)]
    pub fn set_component_enabled(&mut self, name: &str, enabled: bool) -> AppResult<()> {
        self.components.insert(name.to_string(), enabled);
        self.save_components()
    }

    /// Save component configuration to file
    #[allow(dead_code)]
    fn save_components(&self) -> AppResult<()> {
        // Create config directory if it doesn't exist
        if !Path::new("config").exists() {
            fs::create_dir("config")?;
        }

        let toml_str = toml::to_string(&self.components)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write("config/components.toml", toml_str)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_match_from_env() {
        assert_eq!(
            TitleMatch::from_env("first-match").unwrap(),
            TitleMatch::FirstMatch
        );
        assert_eq!(
            TitleMatch::from_env("all-matches").unwrap(),
            TitleMatch::AllMatches
        );
        assert!(TitleMatch::from_env("everything").is_err());
    }
}
