//! Runs a grammar check against the generation API.
//!
//! The configured models are tried in order until one answers. The answer is then checked
//! for safety blocks and truncation, its text is pulled out, and the JSON object inside it
//! is parsed into a [`CorrectionResult`]. Replies that are not valid JSON still produce a
//! result, built from the raw text, with [`CorrectionOutcome::parsing_trouble`] set.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gemini::wire::{
    FinishReason, GenerationConfig, SafetySetting, default_safety_settings,
};
use crate::gemini::{GenerateContentRequest, GenerateContentResponse, GenerativeClient};
use crate::model::correction_result::CorrectionResult;
use crate::validation::ResolvedText;

pub mod extract;
pub mod prompt;

use extract::Parsed;

/// How many model names are listed when every candidate failed
const LISTED_MODELS: usize = 5;

pub const PARSING_TROUBLE: &str =
    "Received response but had trouble parsing it. Showing raw output.";

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("Please provide some text to check.")]
    EmptyText,
    #[error("{}", exhausted_message(.last_error, .available))]
    ModelsExhausted {
        last_error: Option<String>,
        available: Option<Vec<String>>,
    },
    #[error("Content was blocked by safety filters. Please try with different text.")]
    Blocked,
    #[error("Response was not completed. Finish reason: {0}")]
    Incomplete(FinishReason),
    #[error("No candidates in response.")]
    NoCandidates,
    #[error("Response does not contain valid content.")]
    NoContent,
}

impl CorrectionError {
    /// The user can fix this by changing their input; the API was never called
    pub fn is_user_error(&self) -> bool {
        matches!(self, CorrectionError::EmptyText)
    }
}

fn exhausted_message(last_error: &Option<String>, available: &Option<Vec<String>>) -> String {
    let last = last_error.as_deref().unwrap_or("no models configured");
    match available {
        Some(models) => format!(
            "Failed to use any available model. Last error: {last}. Available models: {}",
            models.join(", ")
        ),
        None => format!(
            "Failed to use any available model. Last error: {last}. Please check your API key."
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionOutcome {
    pub result: CorrectionResult,
    /// The model that produced the answer
    pub model: String,
    /// The reply could not be parsed and `result` wraps the raw text
    pub parsing_trouble: bool,
}

pub struct CorrectionHandler {
    client: Arc<dyn GenerativeClient>,
    models: Vec<String>,
    generation: GenerationConfig,
    safety: Vec<SafetySetting>,
}

impl CorrectionHandler {
    pub fn new(
        client: Arc<dyn GenerativeClient>,
        models: Vec<String>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            client,
            models,
            generation,
            safety: default_safety_settings(),
        }
    }

    pub async fn check(&self, text: &ResolvedText) -> Result<CorrectionOutcome, CorrectionError> {
        if text.as_str().trim().is_empty() {
            return Err(CorrectionError::EmptyText);
        }

        let request = GenerateContentRequest::from_prompt(
            prompt::build_prompt(text.as_str()),
            self.generation,
            self.safety.clone(),
        );
        debug!("Prompt built for {} chars of text", text.as_str().len());

        let (model, response) = self.generate(&request).await?;
        ensure_completed(&response)?;

        let reply = reply_text(&response)?;
        debug!("Extracted {} chars of reply text from {model}", reply.len());

        let outcome = match extract::parse_reply(&reply) {
            Parsed::Structured(result) => CorrectionOutcome {
                result,
                model,
                parsing_trouble: false,
            },
            Parsed::Fallback(result) => CorrectionOutcome {
                result,
                model,
                parsing_trouble: true,
            },
        };

        Ok(outcome)
    }

    /// Tries each model in order and returns the first non-empty answer
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<(String, GenerateContentResponse), CorrectionError> {
        let mut last_error = None;

        for model in &self.models {
            match self.client.generate_content(model, request).await {
                Ok(response) if !response.is_empty() => {
                    info!("{model} answered the grammar check");
                    return Ok((model.clone(), response));
                }
                Ok(_) => {
                    warn!("{model} returned an empty response");
                    last_error = Some(format!("{model} returned an empty response"));
                }
                Err(e) => {
                    warn!("{e}");
                    last_error = Some(e.to_string());
                }
            }
        }

        let available = self.available_models().await;
        Err(CorrectionError::ModelsExhausted {
            last_error,
            available,
        })
    }

    /// Best effort: `None` when the listing itself fails
    async fn available_models(&self) -> Option<Vec<String>> {
        match self.client.list_models().await {
            Ok(models) => Some(
                models
                    .into_iter()
                    .filter(|m| m.supports_generate_content())
                    .take(LISTED_MODELS)
                    .map(|m| m.name)
                    .collect(),
            ),
            Err(e) => {
                warn!("Could not list available models: {e}");
                None
            }
        }
    }
}

fn ensure_completed(response: &GenerateContentResponse) -> Result<(), CorrectionError> {
    if let Some(reason) = response.prompt_block_reason() {
        warn!("Prompt was blocked: {reason}");
        return Err(CorrectionError::Blocked);
    }

    let Some(reason) = response.candidates.first().and_then(|c| c.finish_reason) else {
        return Ok(());
    };

    if reason.is_blocked() {
        warn!("Candidate was blocked: {reason}");
        Err(CorrectionError::Blocked)
    } else if !reason.is_complete() {
        Err(CorrectionError::Incomplete(reason))
    } else {
        Ok(())
    }
}

fn reply_text(response: &GenerateContentResponse) -> Result<String, CorrectionError> {
    let text = match response.text() {
        Some(text) => text,
        None => {
            let candidate = response
                .candidates
                .first()
                .ok_or(CorrectionError::NoCandidates)?;
            let parts = candidate
                .content
                .as_ref()
                .map(|c| &c.parts)
                .ok_or(CorrectionError::NoContent)?;

            parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        }
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(CorrectionError::NoContent);
    }

    Ok(text.to_owned())
}
