use std::sync::LazyLock;

use regex::Regex;

use crate::model::correction_result::CorrectionResult;

// Greedy and dot-matches-newline: from the first `{` to the last `}`
static JSON_SPAN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());

/// The part of the model's reply that should hold the JSON object, or the whole reply
/// when no braces are present
pub fn json_span(text: &str) -> &str {
    JSON_SPAN
        .as_ref()
        .and_then(|re| re.find(text))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

/// Result of interpreting the model's reply
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Structured(CorrectionResult),
    /// The reply was not a usable JSON object; the raw text is wrapped instead
    Fallback(CorrectionResult),
}

/// Pulls the [`CorrectionResult`] out of the model's reply, falling back to the raw text
pub fn parse_reply(reply: &str) -> Parsed {
    let payload = json_span(reply);

    match serde_json::from_str::<CorrectionResult>(payload) {
        Ok(result) => Parsed::Structured(result),
        Err(e) => {
            tracing::warn!("Could not parse model reply as JSON: {e}");
            Parsed::Fallback(CorrectionResult::raw(payload))
        }
    }
}
