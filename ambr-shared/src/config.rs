use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// A decision write with no response inside this bound rolls back.
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_status_refresh_secs")]
    pub status_refresh_secs: u64,
    #[serde(default = "default_daily_swipe_allowance")]
    pub daily_swipe_allowance: u32,
    #[serde(default = "default_prefs_path")]
    pub prefs_path: String,
}

fn default_api_base_url() -> String { "http://localhost:8000/api".into() }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_decision_timeout_secs() -> u64 { 8 }
fn default_poll_interval_secs() -> u64 { 5 }
fn default_status_refresh_secs() -> u64 { 60 }
fn default_daily_swipe_allowance() -> u32 { 50 }
fn default_prefs_path() -> String { "ambr-prefs.json".into() }

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AMBR").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|_| Self::default()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.status_refresh_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            decision_timeout_secs: default_decision_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            status_refresh_secs: default_status_refresh_secs(),
            daily_swipe_allowance: default_daily_swipe_allowance(),
            prefs_path: default_prefs_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_product_rules() {
        let config = AppConfig::default();
        assert_eq!(config.daily_swipe_allowance, 50);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.decision_timeout() < config.request_timeout());
    }
}
