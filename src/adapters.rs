//! Binary-local capability adapters.
//!
//! Production deployments swap these at the wiring edge: the blob store for
//! an object-storage client, the extractor for a layout-OCR provider, the
//! in-process bus for a broker. The core never sees the difference.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use doc_base::{BlobStore, DocumentExtractor, ExtractedDocument, PortError};

/// Blob store over a local directory; blob keys are relative paths.
pub struct FsBlobStore {
    base_dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, PortError> {
        // Keys must stay inside the base directory.
        let relative = Path::new(key);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(PortError::InputRejected(format!("invalid blob key: {key}")));
        }

        let path = self.base_dir.join(relative);
        debug!(?path, "reading blob");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PortError::InputRejected(format!("blob {key} not found")))
            }
            Err(e) => Err(PortError::Transient(format!("blob read failed: {e}"))),
        }
    }
}

/// Placeholder extractor for binary formats when no layout provider is
/// configured. Text-family documents never reach it (they are extracted
/// locally by the ingestion worker).
pub struct UnconfiguredExtractor;

#[async_trait]
impl DocumentExtractor for UnconfiguredExtractor {
    async fn extract(&self, _bytes: &[u8], mime: &str) -> Result<ExtractedDocument, PortError> {
        Err(PortError::InputRejected(format!(
            "no document extractor configured for {mime}"
        )))
    }
}
