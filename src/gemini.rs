//! Client for the hosted generation API. The correction handler only sees the
//! [`GenerativeClient`] trait, so tests can script the API's behavior.

use async_trait::async_trait;
use thiserror::Error;

pub mod client;
#[cfg(test)]
pub mod testing;
pub mod wire;

pub use client::HttpGeminiClient;
pub use wire::{GenerateContentRequest, GenerateContentResponse, ModelInfo};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to send request to {model}: {source}")]
    Http {
        model: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{model} returned {status}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },
    #[error("Failed to parse response from {model}: {reason}")]
    Decode { model: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Runs one generation request against `model`
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ClientError>;

    /// Lists the models visible to the configured API key
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError>;
}
