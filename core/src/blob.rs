//! Boundary with the external blob store.
//!
//! Only the declared file name, declared content type and size are checked
//! here; the bytes are handed to the store untouched.

use crate::error::{LibraryError, Result};
use crate::model::type_enum::BlobKind;
use async_trait::async_trait;
use std::path::Path;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];

pub const MAX_AUDIO_SIZE: usize = 50 * 1024 * 1024;
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

impl BlobKind {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            BlobKind::Audio => AUDIO_EXTENSIONS,
            BlobKind::Image => IMAGE_EXTENSIONS,
        }
    }

    pub fn max_size(&self) -> usize {
        match self {
            BlobKind::Audio => MAX_AUDIO_SIZE,
            BlobKind::Image => MAX_IMAGE_SIZE,
        }
    }
}

pub fn validate(kind: BlobKind, field: &str, upload: &Upload) -> Result<()> {
    let ext = upload.extension().unwrap_or_default();
    if !kind.extensions().contains(&ext.as_str()) {
        return Err(LibraryError::validation(
            field,
            format!(
                "File extension \"{}\" is not allowed. Allowed extensions are: {}.",
                ext,
                kind.extensions().join(", ")
            ),
        ));
    }

    if upload.size() > kind.max_size() {
        let msg = match kind {
            BlobKind::Audio => "Audio file size cannot exceed 50MB.",
            BlobKind::Image => "Image file size cannot exceed 5MB.",
        };
        return Err(LibraryError::validation(field, msg));
    }

    if let (BlobKind::Image, Some(ct)) = (kind, upload.content_type.as_deref()) {
        if !IMAGE_CONTENT_TYPES.contains(&ct) {
            return Err(LibraryError::validation(
                field,
                "Only JPEG, PNG, and GIF images are allowed.",
            ));
        }
    }
    Ok(())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the upload and return a retrievable reference.
    async fn put(&self, kind: BlobKind, upload: Upload) -> Result<String>;
}

/// Validate, then hand off to the store.
pub async fn store(
    store: &dyn BlobStore,
    kind: BlobKind,
    field: &str,
    upload: Upload,
) -> Result<String> {
    validate(kind, field, &upload)?;
    store.put(kind, upload).await
}
