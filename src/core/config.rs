use crate::core::SyncError;
use dotenv::dotenv;
use std::env;
use tracing::{info, warn};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: Option<String>,
    pub backend_key: Option<String>,
    pub realtime_enabled: bool,
    pub request_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub app_env: String,
    /// Malformed values that were replaced by their default
    pub warnings: Vec<String>,
}

/// URL and access key of the hosted backend
#[derive(Debug, Clone)]
pub struct Credentials {
    pub url: String,
    pub key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_key: None,
            realtime_enabled: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            app_env: "development".to_string(),
            warnings: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from the environment, reading `.env` first.
    ///
    /// Nothing here is fatal: missing credentials degrade the connector and
    /// malformed values fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config {
            backend_url: non_empty(var("SUPABASE_URL")),
            backend_key: non_empty(var("SUPABASE_ANON_KEY")),
            ..Config::default()
        };

        if let Some(raw) = var("REALTIME_ENABLED") {
            match parse_bool(&raw) {
                Some(enabled) => config.realtime_enabled = enabled,
                None => config.warnings.push(format!(
                    "Invalid REALTIME_ENABLED: expected true/false, got {raw:?}; using true"
                )),
            }
        }

        config.request_timeout_secs = config.secs(
            var("REQUEST_TIMEOUT_SECS"),
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );
        config.heartbeat_interval_secs = config.secs(
            var("HEARTBEAT_INTERVAL_SECS"),
            "HEARTBEAT_INTERVAL_SECS",
            DEFAULT_HEARTBEAT_INTERVAL_SECS,
        );
        config.reconnect_delay_secs = config.secs(
            var("RECONNECT_DELAY_SECS"),
            "RECONNECT_DELAY_SECS",
            DEFAULT_RECONNECT_DELAY_SECS,
        );

        if let Some(app_env) = non_empty(var("APP_ENV")) {
            config.app_env = app_env;
        }
        config
    }

    /// Whole seconds, at least 1; anything else is recorded and replaced by
    /// `default`
    fn secs(&mut self, raw: Option<String>, name: &str, default: u64) -> u64 {
        let Some(raw) = raw else {
            return default;
        };
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                self.warnings.push(format!(
                    "Invalid {name}: must be a positive number of seconds, got {raw:?}; using {default}"
                ));
                default
            }
        }
    }

    /// Credentials, or the configuration error describing what is missing
    pub fn credentials(&self) -> Result<Credentials, SyncError> {
        match (&self.backend_url, &self.backend_key) {
            (Some(url), Some(key)) => Ok(Credentials {
                url: url.clone(),
                key: key.clone(),
            }),
            (url, key) => Err(SyncError::Configuration(format!(
                "Missing backend environment variables (SUPABASE_URL missing: {}, SUPABASE_ANON_KEY missing: {})",
                url.is_none(),
                key.is_none()
            ))),
        }
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }

    /// Logs the configuration with secrets hidden
    pub fn log_summary(&self) {
        info!(
            environment = %self.app_env,
            backend = %self.backend_url.as_deref().map(Self::mask_url).unwrap_or_else(|| "MISSING".to_string()),
            key = if self.backend_key.is_some() { "set" } else { "MISSING" },
            realtime = self.realtime_enabled,
            request_timeout_secs = self.request_timeout_secs,
            "Backend configuration"
        );
        for warning in &self.warnings {
            warn!("{}", SyncError::Configuration(warning.clone()));
        }
        if let Err(e) = self.credentials() {
            warn!("{e}");
        }
    }

    /// Keeps scheme and the last label of the host, hides the project ref
    fn mask_url(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => {
                    let tail = host.split_once('.').map(|(_, rest)| rest).unwrap_or("");
                    if tail.is_empty() {
                        format!("{}://***", parsed.scheme())
                    } else {
                        format!("{}://***.{}", parsed.scheme(), tail)
                    }
                }
                None => "***".to_string(),
            },
            Err(_) => "***".to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
