//! Document ingestion worker.
//!
//! Consumes ingestion jobs from the bus and drives each document through the
//! eight-stage pipeline: blob fetch, structure extraction, image description,
//! tree building, summarization, Q&A synthesis, chunking, and embed+store.
//! The Document row in the meta store is the single source of truth for
//! progress; this worker is its only writer.

pub mod consumer;
pub mod errors;
pub mod pipeline;
pub mod prompts;

pub use consumer::IngestWorker;
pub use errors::{IngestError, Stage};
