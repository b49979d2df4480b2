//! Canonical data model and capability ports for the docqa backend.
//!
//! This crate is the leaf of the workspace: it holds the structs that flow
//! between the ingestion and query workers, the port traits every external
//! collaborator is reached through, the shared error taxonomy, and the
//! in-process job bus used when no external broker is wired in.
//!
//! Adapters (`ai-llm-service`, `vector-store`, `meta-store`) implement the
//! ports; the workers consume them as trait objects so tests can substitute
//! deterministic fakes.

pub mod errors;
pub mod job_bus;
pub mod json_repair;
pub mod ports;
pub mod structs;

pub use errors::PortError;
pub use job_bus::{Delivery, JobBus, MemoryJobBus};
pub use ports::{
    BlobStore, Chat, ChatRequest, DocumentExtractor, Embedder, LanguageTagger, MetaStore,
    VectorIndex, VisionDescriber,
};
pub use structs::chunk::{
    Chunk, ChunkMetadata, CollectionKind, LanguageProfile, SummaryLevel, TokenCountMethod,
    VectorRecord,
};
pub use structs::document::{DocumentRecord, DocumentStatus, IngestOutcome};
pub use structs::extract::{BlockKind, ExtractedBlock, ExtractedDocument, ImageRegion};
pub use structs::jobs::{IngestJob, QueryJob, INGESTION_QUEUE, QUERY_QUEUE};
pub use structs::qa::{QaKind, QaPair};
pub use structs::query::{
    AgentDecision, AgentEvaluation, ChunkResult, Citation, DebugData, DebugTiming, IterationDebug,
    QueryRecord, SearchSources,
};
pub use structs::search::RetrievedChunk;
pub use structs::settings::RuntimeSettings;
pub use structs::summary::{DocumentSummaries, SectionSummary, SummaryMethod};
pub use structs::tree::{DocumentTree, NodeKind, TreeNode};
