//! In-memory [`GenerativeClient`] whose replies are scripted per model

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::gemini::{
    ClientError, GenerateContentRequest, GenerateContentResponse, GenerativeClient, ModelInfo,
};

pub enum Reply {
    /// Raw `generateContent` JSON body
    Body(String),
    /// Non-2xx status from the API
    Status(u16),
}

#[derive(Default)]
pub struct ScriptedClient {
    replies: HashMap<String, Reply>,
    listing: Option<Vec<ModelInfo>>,
    pub calls: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub listings: Mutex<usize>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, model: &str, reply: Reply) -> Self {
        self.replies.insert(model.to_owned(), reply);
        self
    }

    /// Shorthand for a single-candidate reply that finished normally
    pub fn text(self, model: &str, text: &str) -> Self {
        self.reply(model, Reply::Body(text_body(text, "STOP")))
    }

    /// `(name, supports generateContent)` pairs returned by `list_models`
    pub fn listing(mut self, models: &[(&str, bool)]) -> Self {
        self.listing = Some(
            models
                .iter()
                .map(|(name, generates)| ModelInfo {
                    name: name.to_string(),
                    supported_generation_methods: if *generates {
                        vec!["generateContent".to_string(), "countTokens".to_string()]
                    } else {
                        vec!["embedContent".to_string()]
                    },
                })
                .collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn text_body(text: &str, finish_reason: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": finish_reason,
            "index": 0
        }]
    })
    .to_string()
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ClientError> {
        self.calls.lock().unwrap().push(model.to_owned());
        if let Some(prompt) = request.prompt() {
            self.prompts.lock().unwrap().push(prompt.to_owned());
        }

        match self.replies.get(model) {
            Some(Reply::Body(body)) => Ok(serde_json::from_str(body).unwrap()),
            Some(Reply::Status(status)) => Err(ClientError::Status {
                model: model.to_owned(),
                status: *status,
                body: "scripted failure".to_owned(),
            }),
            None => Err(ClientError::Status {
                model: model.to_owned(),
                status: 404,
                body: format!("{model} is not found"),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        *self.listings.lock().unwrap() += 1;
        self.listing.clone().ok_or_else(|| ClientError::Status {
            model: "model listing".to_owned(),
            status: 403,
            body: "API key not valid".to_owned(),
        })
    }
}
