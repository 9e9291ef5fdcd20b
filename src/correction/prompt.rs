/// Builds the instruction sent to the model for one grammar check.
///
/// The model is asked for a single JSON object matching [`CorrectionResult`]'s shape.
///
/// [`CorrectionResult`]: crate::model::correction_result::CorrectionResult
pub fn build_prompt(text: &str) -> String {
    format!(
        r#"You are an expert English grammar and writing assistant. Analyze the following text and provide a comprehensive grammar check.

TEXT TO CHECK:
{text}

Please provide your analysis in the following JSON format:
{{
    "corrected_text": "The fully corrected version of the text",
    "errors": [
        {{
            "original": "the incorrect phrase or sentence",
            "corrected": "the corrected version",
            "explanation": "brief explanation of the error",
            "error_type": "grammar/spelling/punctuation/style"
        }}
    ],
    "overall_score": 85,
    "suggestions": [
        "General suggestion for improvement",
        "Another suggestion"
    ],
    "summary": "Brief summary of the main issues found and overall quality"
}}

IMPORTANT: Return ONLY valid JSON, no additional text before or after."#
    )
}
