//! Validation of the grammar form. A submission either resolves to the one text that gets
//! checked, or yields the field-scoped errors to show back to the user.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::submission::{Submission, UploadedFile};

/// Uploads larger than this many bytes are rejected
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// Key for errors that belong to the whole form rather than one input
pub const FORM_WIDE: &str = "__all__";
pub const TEXT_FIELD: &str = "text_input";
pub const FILE_FIELD: &str = "file_upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please either enter text in the text area or upload a .txt file.")]
    MissingInput,
    #[error("The submitted file is empty.")]
    EmptyFile,
    #[error("Please upload a .txt file only.")]
    InvalidFileType,
    #[error("File size should not exceed 1MB.")]
    FileTooLarge,
    #[error("File must be a valid UTF-8 text file.")]
    InvalidEncoding,
}

impl ValidationError {
    /// The form input this error is reported against
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingInput => FORM_WIDE,
            ValidationError::EmptyFile
            | ValidationError::InvalidFileType
            | ValidationError::FileTooLarge
            | ValidationError::InvalidEncoding => FILE_FIELD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: Vec<ValidationError>,
}

impl FormErrors {
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, error: ValidationError) -> bool {
        self.errors.contains(&error)
    }

    /// `(field, message)` pairs in the order the errors were found
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, String)> + '_ {
        self.errors.iter().map(|e| (e.field(), e.to_string()))
    }

    pub fn into_map(self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for error in self.errors {
            map.entry(error.field()).or_default().push(error.to_string());
        }
        map
    }
}

impl From<ValidationError> for FormErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// The text that will be sent for correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText(String);

impl ResolvedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates a submission and picks the text to check.
///
/// Typed text (trimmed) wins over an uploaded file, but an uploaded file is still
/// validated when both are present.
pub fn validate(submission: Submission) -> Result<ResolvedText, FormErrors> {
    let mut errors = FormErrors::default();

    let text = submission
        .text_input
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    // An empty upload fails on its own field and then counts as no upload at all
    let file = match submission.file_upload {
        Some(file) if file.size() == 0 => {
            errors.push(ValidationError::EmptyFile);
            None
        }
        other => other,
    };

    if text.is_none() && file.is_none() {
        errors.push(ValidationError::MissingInput);
        return Err(errors);
    }

    let file_content = match file.as_ref().map(read_upload) {
        Some(Ok(content)) => Some(content),
        Some(Err(e)) => {
            errors.push(e);
            None
        }
        None => None,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    text.map(str::to_owned)
        .or(file_content)
        .map(ResolvedText)
        .ok_or_else(|| ValidationError::MissingInput.into())
}

fn read_upload(file: &UploadedFile) -> Result<String, ValidationError> {
    if !file.name.ends_with(".txt") {
        return Err(ValidationError::InvalidFileType);
    }

    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge);
    }

    std::str::from_utf8(&file.data)
        .map(str::to_owned)
        .map_err(|_| ValidationError::InvalidEncoding)
}
