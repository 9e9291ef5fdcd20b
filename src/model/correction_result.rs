use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const FALLBACK_SUGGESTION: &str = "Could not parse response. Showing raw output.";
pub const FALLBACK_SUMMARY: &str =
    "Response received but could not be parsed into structured format.";

/// The structured grammar check returned by the model.
///
/// Every field tolerates being absent or `null` in the model's JSON, in which case it
/// takes its default. `overall_score` additionally accepts floats and numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionResult {
    #[serde(deserialize_with = "null_as_default")]
    pub corrected_text: String,
    #[serde(deserialize_with = "null_as_default")]
    pub errors: Vec<GrammarIssue>,
    #[serde(deserialize_with = "lenient_score")]
    pub overall_score: u8,
    #[serde(deserialize_with = "null_as_default")]
    pub suggestions: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
}

/// One mistake found in the text, with the model's fix and reasoning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarIssue {
    #[serde(deserialize_with = "null_as_default")]
    pub original: String,
    #[serde(deserialize_with = "null_as_default")]
    pub corrected: String,
    #[serde(deserialize_with = "null_as_default")]
    pub explanation: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error_type: String,
}

impl CorrectionResult {
    /// Wraps unparseable model output so it can still be shown to the user
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            corrected_text: text.into(),
            errors: Vec::new(),
            overall_score: 0,
            suggestions: vec![FALLBACK_SUGGESTION.to_string()],
            summary: FALLBACK_SUMMARY.to_string(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let score = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };

    Ok(score
        .filter(|s| s.is_finite())
        .map(|s| s.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0))
}
