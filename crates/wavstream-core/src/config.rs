use crate::error::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub tls: Option<TlsConfig>,

    #[serde(default)]
    pub postprocess: PostprocessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Language/domain hint sent as the first text frame.
    #[serde(default)]
    pub lang_tag: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            port: default_server_port(),
            lang_tag: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_samples_per_message")]
    pub samples_per_message: usize,

    #[serde(default = "default_seconds_per_message")]
    pub seconds_per_message: f64,

    #[serde(default = "default_final_result_timeout_secs")]
    pub final_result_timeout_secs: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            samples_per_message: default_samples_per_message(),
            seconds_per_message: default_seconds_per_message(),
            final_result_timeout_secs: default_final_result_timeout_secs(),
        }
    }
}

impl StreamConfig {
    pub fn message_delay(&self) -> Duration {
        Duration::from_secs_f64(self.seconds_per_message)
    }

    pub fn final_result_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.final_result_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TlsConfig {
    pub ca_file: Option<PathBuf>,

    pub cert_file: Option<PathBuf>,

    pub key_file: Option<PathBuf>,

    #[serde(default)]
    pub accept_invalid_hostnames: bool,
}

impl TlsConfig {
    pub fn is_mutual(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostprocessConfig {
    #[serde(default = "default_silence_token")]
    pub silence_token: String,

    #[serde(default = "default_punctuation")]
    pub punctuation: String,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            silence_token: default_silence_token(),
            punctuation: default_punctuation(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_server_addr() -> String {
    "localhost".to_string()
}

fn default_server_port() -> u16 {
    6006
}

fn default_samples_per_message() -> usize {
    8000
}

fn default_seconds_per_message() -> f64 {
    0.06
}

fn default_final_result_timeout_secs() -> f64 {
    60.0
}

fn default_silence_token() -> String {
    "<sil>".to_string()
}

/// ASCII punctuation plus the CJK marks the recognizer emits.
pub fn default_punctuation() -> String {
    r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~“”？，！【】（）、。：；’‘……￥·"##.to_string()
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if let Some(first_missing) = errors.into_iter().next() {
        return Err(ConfigError::EnvVarNotFound(first_missing));
    }

    Ok(result)
}

impl ClientConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: ClientConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Reject values that would only fail later, mid-exchange.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.samples_per_message == 0 {
            return Err(ConfigError::Invalid {
                field: "stream.samples_per_message",
                reason: "must be greater than zero".to_string(),
            });
        }
        check_seconds("stream.seconds_per_message", self.stream.seconds_per_message)?;
        check_seconds(
            "stream.final_result_timeout_secs",
            self.stream.final_result_timeout_secs,
        )?;
        if self.stream.final_result_timeout_secs == 0.0 {
            return Err(ConfigError::Invalid {
                field: "stream.final_result_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if let Some(tls) = &self.tls {
            if tls.cert_file.is_some() != tls.key_file.is_some() {
                return Err(ConfigError::Invalid {
                    field: "tls",
                    reason: "cert_file and key_file must be given together".to_string(),
                });
            }
            if tls.is_mutual() && tls.ca_file.is_none() {
                return Err(ConfigError::Invalid {
                    field: "tls.ca_file",
                    reason: "required when a client certificate is configured".to_string(),
                });
            }
        }
        Ok(())
    }

    /// `ws://` or `wss://` URL for the configured server.
    pub fn server_url(&self) -> String {
        let scheme = if self.tls.is_some() { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.server.addr, self.server.port)
    }
}

fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("expected a non-negative number of seconds, got {value}"),
        });
    }
    Ok(())
}
