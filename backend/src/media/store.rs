use async_trait::async_trait;
use mlib_core::blob::{BlobStore, Upload};
use mlib_core::model::type_enum::BlobKind;
use mlib_core::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Blob store backed by a directory; references are paths relative to it.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_name(kind: BlobKind) -> &'static str {
        match kind {
            BlobKind::Audio => "songs",
            BlobKind::Image => "images",
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, kind: BlobKind, upload: Upload) -> Result<String> {
        let dir_name = Self::dir_name(kind);
        let file_name = match upload.extension() {
            Some(ext) => format!("{}.{}", Uuid::new_v4().simple(), ext),
            None => Uuid::new_v4().simple().to_string(),
        };

        let dir = self.root.join(dir_name);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), &upload.data).await?;

        let reference = format!("{}/{}", dir_name, file_name);
        tracing::debug!(
            "stored {} blob {} ({} bytes, from {})",
            kind,
            reference,
            upload.size(),
            upload.file_name
        );
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_writes_under_kind_dir() {
        let root = std::env::temp_dir().join(format!("mlib-blob-{}", Uuid::new_v4()));
        let store = LocalBlobStore::new(&root);
        let reference = store
            .put(
                BlobKind::Audio,
                Upload {
                    file_name: "Airbag.MP3".to_string(),
                    content_type: None,
                    data: b"ID3".to_vec(),
                },
            )
            .await
            .unwrap();

        assert!(reference.starts_with("songs/"));
        assert!(reference.ends_with(".mp3"));
        let data = tokio::fs::read(store.root().join(&reference)).await.unwrap();
        assert_eq!(data, b"ID3");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
