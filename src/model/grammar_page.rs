use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::correction_result::CorrectionResult;
use crate::validation::{FormErrors, MAX_UPLOAD_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Static description of a form input, so the frontend can render the form
#[derive(Debug, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub widget: &'static str,
    pub placeholder: Option<&'static str>,
    pub accept: Option<&'static str>,
    pub help_text: &'static str,
    pub required: bool,
}

pub static GRAMMAR_FIELDS: [FieldDescriptor; 2] = [
    FieldDescriptor {
        name: "text_input",
        label: "Text Input",
        widget: "textarea",
        placeholder: Some("Paste your text here to check grammar..."),
        accept: None,
        help_text: "Enter your text directly or upload a file below",
        required: false,
    },
    FieldDescriptor {
        name: "file_upload",
        label: "Upload Text File",
        widget: "file",
        placeholder: None,
        accept: Some(".txt"),
        help_text: "Upload a .txt file (optional if you enter text above)",
        required: false,
    },
];

#[derive(Debug, Serialize)]
pub struct FormState {
    pub text_input: String,
    pub file_name: Option<String>,
    pub max_upload_bytes: usize,
    pub errors: BTreeMap<&'static str, Vec<String>>,
    pub fields: &'static [FieldDescriptor],
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            text_input: String::new(),
            file_name: None,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            errors: BTreeMap::new(),
            fields: &GRAMMAR_FIELDS,
        }
    }
}

/// Everything the grammar page shows after a request: the echoed form, the checked text,
/// the correction (if any) and the transient notices.
#[derive(Debug, Default, Serialize)]
pub struct GrammarPage {
    pub form: FormState,
    pub original_text: Option<String>,
    pub results: Option<CorrectionResult>,
    pub messages: Vec<Notice>,
}

impl GrammarPage {
    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    /// Attaches validation failures to the form and mirrors each one as an error notice
    pub fn form_errors(&mut self, errors: FormErrors) {
        for (field, message) in errors.iter() {
            self.error(format!("{field}: {message}"));
        }
        self.form.errors = errors.into_map();
    }

    fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.messages.push(Notice {
            level,
            message: message.into(),
        });
    }
}
