use axum::body::Bytes;

/// A `.txt` upload as received from the multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub data: Bytes,
    size: usize,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len(),
            data,
        }
    }

    /// An upload of `size` bytes of which only the leading `data` was kept
    pub fn truncated(name: impl Into<String>, data: impl Into<Bytes>, size: usize) -> Self {
        Self {
            size,
            ..Self::new(name, data)
        }
    }

    /// Size of the upload as sent, which may exceed `data.len()`
    pub fn size(&self) -> usize {
        self.size
    }
}

/// The raw grammar form, before validation
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub text_input: Option<String>,
    pub file_upload: Option<UploadedFile>,
}
