//! Ingestion pipeline errors with per-stage failure reasons.

use thiserror::Error;

use doc_base::PortError;

/// The pipeline stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchBlob,
    Extract,
    Vision,
    BuildTree,
    Summarize,
    GenerateQa,
    Chunk,
    EmbedStore,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchBlob => "fetch_blob",
            Stage::Extract => "extract",
            Stage::Vision => "vision",
            Stage::BuildTree => "build_tree",
            Stage::Summarize => "summarize",
            Stage::GenerateQa => "generate_qa",
            Stage::Chunk => "chunk",
            Stage::EmbedStore => "embed_store",
        }
    }
}

/// Terminal failure of one ingestion job.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A pipeline stage surfaced a port failure.
    #[error("stage {stage} failed: {source}", stage = .stage.as_str())]
    Stage {
        stage: Stage,
        #[source]
        source: PortError,
    },

    /// The job payload could not be decoded.
    #[error("malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl IngestError {
    pub fn stage(stage: Stage) -> impl FnOnce(PortError) -> IngestError {
        move |source| IngestError::Stage { stage, source }
    }

    /// Stable failure reason recorded in the Document row.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Stage { stage, source } => match (stage, source) {
                (Stage::Extract, PortError::Transient(_)) => "extract_timeout",
                (Stage::EmbedStore, PortError::RateLimited(_)) => "embed_rate_limited",
                (Stage::EmbedStore, PortError::Storage(_)) => "storage_error",
                (stage, _) => stage.as_str(),
            },
            IngestError::Payload(_) => "malformed_job",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_reasons_are_stable() {
        let e = IngestError::Stage {
            stage: Stage::Extract,
            source: PortError::Transient("deadline exceeded".into()),
        };
        assert_eq!(e.reason(), "extract_timeout");

        let e = IngestError::Stage {
            stage: Stage::EmbedStore,
            source: PortError::RateLimited("429".into()),
        };
        assert_eq!(e.reason(), "embed_rate_limited");

        let e = IngestError::Stage {
            stage: Stage::EmbedStore,
            source: PortError::Storage("acked 3 of 5".into()),
        };
        assert_eq!(e.reason(), "storage_error");

        let e = IngestError::Stage {
            stage: Stage::Summarize,
            source: PortError::Transient("boom".into()),
        };
        assert_eq!(e.reason(), "summarize");
    }
}
