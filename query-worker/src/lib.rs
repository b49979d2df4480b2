//! Agentic query worker.
//!
//! Consumes query jobs and answers them over the vector corpus: embed the
//! query, run hybrid retrieval with reciprocal-rank fusion across the three
//! collections, rerank, let the evaluator decide whether to answer or to
//! refine/expand, and finally generate a grounded answer with citations.
//! Every iteration is captured in the debug record when the job asks for it.

pub mod consumer;
pub mod debug;
pub mod pipeline;

pub use consumer::QueryWorker;
