use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::gemini::wire::ListModelsResponse;
use crate::gemini::{
    ClientError, GenerateContentRequest, GenerateContentResponse, GenerativeClient, ModelInfo,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const LISTING: &str = "model listing";

/// [`GenerativeClient`] backed by the Gemini REST API.
///
/// The API key is attached to every request as the `x-goog-api-key` header.
pub struct HttpGeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeminiClient {
    pub fn new(
        api_key: &str,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| ClientError::Build(format!("Invalid API key header value: {e}")))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model_path(model))
    }

    fn models_url(&self) -> String {
        format!("{}/models?pageSize=100", self.base_url)
    }
}

/// Model ids may be given with or without the `models/` prefix
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_owned()
    } else {
        format!("models/{model}")
    }
}

async fn read_body(model: &str, response: reqwest::Response) -> Result<String, ClientError> {
    let status = response.status();
    let body = response.text().await.map_err(|source| ClientError::Http {
        model: model.to_owned(),
        source,
    })?;

    if !status.is_success() {
        return Err(ClientError::Status {
            model: model.to_owned(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

#[async_trait]
impl GenerativeClient for HttpGeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ClientError> {
        let url = self.generate_url(model);
        debug!("Sending generateContent request to {url}");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                model: model.to_owned(),
                source,
            })?;

        let body = read_body(model, response).await?;
        debug!("{model} replied with {} bytes", body.len());

        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            model: model.to_owned(),
            reason: e.to_string(),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let response = self
            .client
            .get(self.models_url())
            .send()
            .await
            .map_err(|source| ClientError::Http {
                model: LISTING.to_owned(),
                source,
            })?;

        let body = read_body(LISTING, response).await?;
        let listing: ListModelsResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode {
                model: LISTING.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(listing.models)
    }
}
