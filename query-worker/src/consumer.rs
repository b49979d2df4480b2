//! Query job consumer: the bounded agentic loop.
//!
//! Per iteration: embed the current query, retrieve, rerank, evaluate. The
//! evaluator decides whether to answer, rewrite the query, or widen the
//! search; iterations are strictly sequential and hard-capped. The final
//! answer is generated from the last iteration's reranked context, and the
//! result (or the failure) is persisted with its debug capture.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use doc_base::{
    AgentDecision, AgentEvaluation, Chat, Citation, DebugData, DebugTiming, Embedder,
    IterationDebug, JobBus, MetaStore, PortError, QueryJob, QueryRecord, RuntimeSettings,
    VectorIndex, QUERY_QUEUE,
};

use crate::debug;
use crate::pipeline::agent::AgentEvaluator;
use crate::pipeline::generator::{AnswerGenerator, GeneratedAnswer};
use crate::pipeline::hybrid::HybridRetriever;
use crate::pipeline::reranker::{RerankedChunk, Reranker};

/// A single iteration slower than this logs a warning; it is never aborted.
const ITERATION_SOFT_BUDGET_MS: u64 = 30_000;

/// Query worker wired to its capability ports.
pub struct QueryWorker {
    embedder: Arc<dyn Embedder>,
    retriever: HybridRetriever,
    reranker: Reranker,
    evaluator: AgentEvaluator,
    generator: AnswerGenerator,
    meta: Arc<dyn MetaStore>,
}

impl QueryWorker {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn Chat>,
        meta: Arc<dyn MetaStore>,
    ) -> Self {
        Self {
            embedder,
            retriever: HybridRetriever::new(index),
            reranker: Reranker::new(chat.clone()),
            evaluator: AgentEvaluator::new(chat.clone()),
            generator: AnswerGenerator::new(chat, meta.clone()),
            meta,
        }
    }

    /// Consumes the query queue until the bus closes.
    pub async fn run(&self, bus: &dyn JobBus) {
        info!("query worker started, waiting for jobs");
        loop {
            let delivery = match bus.next_delivery(QUERY_QUEUE).await {
                Ok(Some(d)) => d,
                Ok(None) => {
                    info!("query queue closed, stopping worker");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "bus receive failed");
                    continue;
                }
            };

            match serde_json::from_slice::<QueryJob>(delivery.payload()) {
                Ok(job) => {
                    info!(
                        query_id = %job.query_id,
                        correlation_id = %job.correlation_id,
                        "received query job"
                    );
                    self.process_job(&job).await;
                }
                Err(e) => {
                    error!(error = %e, "malformed query job payload");
                }
            }
            delivery.ack();
        }
    }

    /// Processes one query end-to-end and persists the result. Never
    /// propagates: a failed query is persisted with a null answer and the
    /// debug capture up to the failing iteration.
    pub async fn process_job(&self, job: &QueryJob) {
        let started = Instant::now();
        let mut iterations: Vec<IterationDebug> = Vec::new();
        let mut timing = DebugTiming::default();

        let outcome = self
            .answer(job, &mut iterations, &mut timing)
            .await;
        timing.total_ms = elapsed_ms(started);

        let record = match outcome {
            Ok((generated, confidence)) => {
                info!(
                    query_id = %job.query_id,
                    iterations = iterations.len(),
                    total_ms = timing.total_ms,
                    "query answered"
                );
                self.record(job, Some(generated), Some(confidence), None, iterations, timing)
            }
            Err(e) => {
                error!(query_id = %job.query_id, error = %e, "query failed");
                self.record(job, None, None, Some(e.to_string()), iterations, timing)
            }
        };

        if let Err(e) = self.meta.put_query_result(&record).await {
            error!(query_id = %job.query_id, error = %e, "cannot persist query result");
        }
    }

    fn record(
        &self,
        job: &QueryJob,
        generated: Option<GeneratedAnswer>,
        confidence: Option<f64>,
        error_message: Option<String>,
        iterations: Vec<IterationDebug>,
        timing: DebugTiming,
    ) -> QueryRecord {
        let (answer, citations) = match generated {
            Some(g) => (Some(g.answer), g.citations),
            None => (None, Vec::<Citation>::new()),
        };
        QueryRecord {
            query_id: job.query_id,
            query_text: job.query_text.clone(),
            answer,
            confidence_score: confidence,
            citations,
            total_time_ms: timing.total_ms,
            iteration_count: iterations.len(),
            error_message,
            debug_data: job.debug_mode.then(|| DebugData { iterations, timing }),
        }
    }

    async fn answer(
        &self,
        job: &QueryJob,
        iterations: &mut Vec<IterationDebug>,
        timing: &mut DebugTiming,
    ) -> Result<(GeneratedAnswer, f64), PortError> {
        let settings = RuntimeSettings::load(self.meta.as_ref()).await?;
        let max_iterations = settings.max_agent_iterations.max(1);

        let mut current_query = job.query_text.clone();
        let mut top_k = settings.default_top_k;
        // An empty filter means "no filter", not "match nothing".
        let mut document_filter: Option<Vec<Uuid>> = job
            .document_filter
            .clone()
            .filter(|ids| !ids.is_empty());

        let mut final_context: Vec<RerankedChunk> = Vec::new();
        let mut last_evaluation: Option<AgentEvaluation> = None;

        for iteration in 1..=max_iterations {
            let iteration_start = Instant::now();

            let t = Instant::now();
            let vectors = self
                .embedder
                .embed(std::slice::from_ref(&current_query))
                .await?;
            let embedding = vectors.into_iter().next().ok_or_else(|| {
                PortError::Storage("embedder returned no vector for the query".into())
            })?;
            timing.embedding_ms += elapsed_ms(t);

            let t = Instant::now();
            let retrieval = self
                .retriever
                .search(
                    &current_query,
                    &embedding,
                    top_k,
                    settings.rrf_k,
                    document_filter.as_deref(),
                )
                .await?;
            timing.search_ms += elapsed_ms(t);

            let t = Instant::now();
            let rerank = self
                .reranker
                .rerank(&current_query, &retrieval.candidates, settings.default_rerank_top)
                .await;
            timing.rerank_ms += elapsed_ms(t);

            let t = Instant::now();
            let mut evaluation = self
                .evaluator
                .evaluate(&current_query, &rerank.ranked, iteration, max_iterations)
                .await?;
            timing.agent_ms += elapsed_ms(t);

            if rerank.fallback {
                if !evaluation.reasoning.is_empty() {
                    evaluation.reasoning.push_str("; ");
                }
                evaluation.reasoning.push_str("rerank_fallback");
            }

            let duration_ms = elapsed_ms(iteration_start);
            if duration_ms > ITERATION_SOFT_BUDGET_MS {
                warn!(iteration, duration_ms, "iteration exceeded its soft time budget");
            }

            iterations.push(IterationDebug {
                iteration_number: iteration,
                query_used: current_query.clone(),
                search_sources: retrieval.sources,
                chunks_before_rerank: debug::before_rerank(
                    &retrieval.candidates,
                    settings.default_rerank_top,
                ),
                chunks_after_rerank: debug::after_rerank(&rerank.ranked),
                agent_evaluation: evaluation.clone(),
                duration_ms,
            });

            final_context = rerank.ranked;
            let decision = evaluation.decision;
            let refined = evaluation.refined_query.clone();
            last_evaluation = Some(evaluation);

            match decision {
                AgentDecision::Proceed => break,
                AgentDecision::RefineQuery => match refined {
                    Some(query) => {
                        info!(iteration, refined_query = %query, "refining query");
                        current_query = query;
                    }
                    // A refinement without a query is a proceed.
                    None => break,
                },
                AgentDecision::ExpandSearch => {
                    top_k = (top_k * 2).min(4 * settings.default_top_k);
                    if document_filter.take().is_some() {
                        warn!(iteration, "expand_search cleared the document filter");
                    }
                    info!(iteration, top_k, "expanding search scope");
                }
            }
        }

        let t = Instant::now();
        let generated = self
            .generator
            .generate(&job.query_text, &final_context)
            .await?;
        timing.generation_ms = elapsed_ms(t);

        let confidence = last_evaluation.map(|e| e.confidence).unwrap_or(0.0);
        Ok((generated, confidence))
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
