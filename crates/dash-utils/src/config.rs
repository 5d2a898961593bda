//! Process-level configuration

use serde::{Deserialize, Serialize};

/// Environment variable selecting the deployment environment
pub const ENV_VAR: &str = "DASH_ENV";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (development, production, etc.)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "stockdash".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration, overriding defaults from the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(env) = std::env::var(ENV_VAR) {
            if !env.trim().is_empty() {
                config.environment = env.trim().to_string();
            }
        }
        config
    }

    /// Whether this is a production deployment
    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "prod" | "production")
    }
}
