use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::hook::HookOptions;
use crate::platform::telegram::DEFAULT_BASE_URL;
use crate::webhook::header_map;

/// Shared HTTP settings for feed fetches and webhooks
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            feed_base_url: default_feed_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn build_client(&self) -> Result<Client, ConfigError> {
        Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .map_err(ConfigError::HttpClient)
    }
}

/// One cron-triggered webhook job.
///
/// Field names also accept the capitalized keys of older JSON schedule files
/// (`Channel`, `Spec`, `Timeout`, `URL`, `Filter`).
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleEntry {
    #[serde(alias = "Channel")]
    pub channel: String,
    /// Cron expression, 5 fields (minute first) or 6 fields (second first)
    #[serde(alias = "Spec", alias = "cron")]
    pub spec: String,
    /// Run budget of each firing, in minutes
    #[serde(alias = "Timeout")]
    pub timeout: u64,
    #[serde(alias = "URL", alias = "Url")]
    pub url: String,
    #[serde(alias = "Filter", default)]
    pub filter: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub auth_user: String,
    #[serde(default)]
    pub auth_pass: String,
    #[serde(default)]
    pub upper: bool,
    #[serde(default)]
    pub trim: bool,
}

impl ScheduleEntry {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.saturating_mul(60))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.is_empty() {
            return Err(ConfigError::MissingParameter("channel"));
        }
        if self.spec.trim().is_empty() {
            return Err(ConfigError::MissingParameter("spec"));
        }
        if self.url.is_empty() {
            return Err(ConfigError::MissingParameter("url"));
        }
        if self.spec.trim_start().starts_with("@every") {
            return Err(ConfigError::UnsupportedSchedule {
                channel: self.channel.clone(),
                spec: self.spec.clone(),
            });
        }
        if self.timeout == 0 {
            return Err(ConfigError::InvalidTimeout {
                channel: self.channel.clone(),
            });
        }
        Ok(())
    }

    pub fn hook_options(&self) -> Result<HookOptions, ConfigError> {
        Ok(HookOptions {
            url: self.url.clone(),
            method: self.method.clone(),
            data: self.data.clone(),
            filter: self.filter.clone(),
            headers: header_map(&self.headers)?,
            auth_user: self.auth_user.clone(),
            auth_pass: self.auth_pass.clone(),
            upper: self.upper,
            trim: self.trim,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(rename = "schedule", alias = "schedules", default)]
    pub schedules: Vec<ScheduleEntry>,
}

/// JSON schedule files are either a bare list of entries or a full config.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonSchedule {
    Entries(Vec<ScheduleEntry>),
    Full(ScheduleConfig),
}

fn default_feed_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("tghook/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let parsed: JsonSchedule =
            serde_json::from_str(content).context("Invalid JSON schedule")?;
        Ok(match parsed {
            JsonSchedule::Entries(schedules) => Self {
                http: HttpConfig::default(),
                poll_interval_ms: default_poll_interval_ms(),
                schedules,
            },
            JsonSchedule::Full(config) => config,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML schedule")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedules.is_empty() {
            return Err(ConfigError::MissingParameter("schedule"));
        }
        for entry in &self.schedules {
            entry.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_json_array() {
        let json = r#"[
            {"Channel": "news", "Spec": "*/5 * * * *", "Timeout": 3, "URL": "http://localhost/a", "Filter": "btc (\\d+)"},
            {"channel": "alerts", "spec": "0 0 * * * *", "timeout": 1, "url": "http://localhost/b"}
        ]"#;

        let config = ScheduleConfig::from_json(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.schedules.len(), 2);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        let first = &config.schedules[0];
        assert_eq!(first.channel, "news");
        assert_eq!(first.filter, r"btc (\d+)");
        assert_eq!(first.timeout(), Duration::from_secs(180));
        assert_eq!(first.method, "GET");
        assert_eq!(config.schedules[1].filter, "");
    }

    #[test]
    fn test_toml_with_http_section() {
        let toml = r#"
            poll_interval_ms = 250

            [http]
            request_timeout_secs = 5

            [[schedule]]
            channel = "news"
            spec = "0 */10 * * * *"
            timeout = 9
            url = "http://localhost/hook"
            filter = "(\\w+)"
            method = "POST"
            data = "v=$1"
            upper = true

            [schedule.headers]
            "X-Token" = "abc"
        "#;

        let config = ScheduleConfig::from_toml(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.http.request_timeout_secs, 5);
        assert_eq!(config.http.feed_base_url, "https://t.me");

        let options = config.schedules[0].hook_options().unwrap();
        assert_eq!(options.method, "POST");
        assert_eq!(options.data, "v=$1");
        assert!(options.upper);
        assert_eq!(options.headers.get("x-token").unwrap().to_str().unwrap(), "abc");
    }

    #[test]
    fn test_validation_errors() {
        let json = r#"[{"channel": "news", "spec": "* * * * *", "timeout": 0, "url": "http://x"}]"#;
        let config = ScheduleConfig::from_json(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout { .. })
        ));

        let json = r#"[{"channel": "", "spec": "* * * * *", "timeout": 1, "url": "http://x"}]"#;
        let config = ScheduleConfig::from_json(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingParameter("channel"))
        ));

        let config = ScheduleConfig::from_json("[]").unwrap();
        assert!(config.validate().is_err());

        let json = r#"[{"channel": "news", "spec": "@every 5m", "timeout": 1, "url": "http://x"}]"#;
        let config = ScheduleConfig::from_json(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedSchedule { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("tghook-config-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"Channel": "news", "Spec": "* * * * *", "Timeout": 1, "URL": "http://localhost"}]"#,
        )
        .unwrap();

        let config = ScheduleConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.schedules[0].channel, "news");
    }

    #[test]
    fn test_http_client_builds() {
        HttpConfig::default().build_client().unwrap();
    }
}
