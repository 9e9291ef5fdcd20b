//! Service configuration, read from a TOML file at start-up.
//!
//! The file is located through `GRAMMAR_CONFIG` (default `grammar.toml`). A missing file
//! means every setting takes its default. The API key itself never lives in the file: it is
//! read from the environment variable named by `gemini.api_key_env`.

use std::env::var;
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::gemini::wire::GenerationConfig;

const DEFAULT_CONFIG_PATH: &str = "grammar.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9090".into(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, String> {
        self.bind
            .parse()
            .map_err(|e| format!("Invalid bind address {}: {e}", self.bind))
    }

    /// `(certificate, private key)` PEM paths, when both are configured
    pub fn tls(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key_env: String,
    /// Tried in order until one answers
    pub models: Vec<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            models: [
                "models/gemini-2.5-flash",
                "models/gemini-2.5-pro",
                "models/gemini-2.5-pro-preview-06-05",
                "models/gemini-2.5-pro-preview-05-06",
                "models/gemini-2.5-pro-preview-03-25",
                "models/gemini-pro",
                "gemini-pro",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            temperature: 0.3,
            max_output_tokens: 2000,
            request_timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reads the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, String> {
        match var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_owned()),
            _ => Err(format!(
                "{} environment variable not present",
                self.api_key_env
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Where unauthenticated users are sent
    pub login_url: String,
    pub sessions: Vec<SessionEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_url: "/".into(),
            sessions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionEntry {
    pub user: String,
    /// Base64 SHA-512 of the session token
    pub token_hash: String,
    pub expires: Option<DateTime<Utc>>,
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, String> {
        toml::from_str(source).map_err(|e| format!("Could not parse configuration: {e}"))
    }

    /// Loads the configuration file, then applies the `BIND_ADDR` override
    pub fn load() -> Result<Self, String> {
        let path = var("GRAMMAR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

        let mut config = match read_to_string(&path) {
            Ok(source) => {
                info!("Loading configuration from {path}");
                Self::from_toml(&source)?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{path} not found, using default configuration");
                Self::default()
            }
            Err(e) => return Err(format!("Could not read {path}: {e}")),
        };

        if let Ok(bind) = var("BIND_ADDR") {
            config.server.bind = bind;
        }

        if config.gemini.models.is_empty() {
            return Err("gemini.models must name at least one model".into());
        }

        Ok(config)
    }
}
