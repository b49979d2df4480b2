//! Ingestion job consumer: the eight-stage pipeline driver.
//!
//! One job is processed at a time (bus prefetch is one per handler). The
//! handler is idempotent on `document_id`: re-processing a completed
//! document deletes its prior vectors before the new set is written, so
//! readers observe either the old set or the new set, never a mix. Messages
//! are acknowledged whether the job succeeded or failed; failure is recorded
//! on the Document row, not by redelivery.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doc_base::{
    BlobStore, Chat, Chunk, ChunkMetadata, CollectionKind, DocumentExtractor, DocumentSummaries,
    Embedder, IngestJob, IngestOutcome, JobBus, LanguageTagger, MetaStore, PortError, QaPair,
    RuntimeSettings, SummaryLevel, VectorIndex, VectorRecord, VisionDescriber, INGESTION_QUEUE,
};

use crate::errors::{IngestError, Stage};
use crate::pipeline::{chunker::Chunker, qa_generator::QaGenerator, summarizer::Summarizer};
use crate::pipeline::{text_processor, tree_builder};

/// Embedding request batch size.
const EMBED_BATCH: usize = 50;

/// Ingestion worker wired to its capability ports.
pub struct IngestWorker {
    blob: Arc<dyn BlobStore>,
    extractor: Arc<dyn DocumentExtractor>,
    vision: Option<Arc<dyn VisionDescriber>>,
    chat: Arc<dyn Chat>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    meta: Arc<dyn MetaStore>,
    tagger: Arc<dyn LanguageTagger>,
}

impl IngestWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        blob: Arc<dyn BlobStore>,
        extractor: Arc<dyn DocumentExtractor>,
        vision: Option<Arc<dyn VisionDescriber>>,
        chat: Arc<dyn Chat>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        meta: Arc<dyn MetaStore>,
        tagger: Arc<dyn LanguageTagger>,
    ) -> Self {
        Self {
            blob,
            extractor,
            vision,
            chat,
            embedder,
            index,
            meta,
            tagger,
        }
    }

    /// Consumes the ingestion queue until the bus closes.
    pub async fn run(&self, bus: &dyn JobBus) {
        info!("ingestion worker started, waiting for jobs");
        loop {
            let delivery = match bus.next_delivery(INGESTION_QUEUE).await {
                Ok(Some(d)) => d,
                Ok(None) => {
                    info!("ingestion queue closed, stopping worker");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "bus receive failed");
                    continue;
                }
            };

            match serde_json::from_slice::<IngestJob>(delivery.payload()) {
                Ok(job) => {
                    info!(
                        document_id = %job.document_id,
                        correlation_id = %job.correlation_id,
                        "received ingestion job"
                    );
                    self.process_job(&job).await;
                }
                Err(e) => {
                    // A payload that cannot be decoded would poison-loop on
                    // redelivery; log and drop it.
                    error!(error = %e, "malformed ingestion job payload");
                }
            }
            delivery.ack();
        }
    }

    /// Processes one job end-to-end, recording success or failure on the
    /// Document row. Never propagates: the caller always acks.
    pub async fn process_job(&self, job: &IngestJob) {
        let started_at = Utc::now();
        if let Err(e) = self.meta.mark_processing(job.document_id, started_at).await {
            error!(document_id = %job.document_id, error = %e, "cannot mark document processing");
            return;
        }

        match self.run_pipeline(job).await {
            Ok(mut outcome) => {
                outcome.processing_time_seconds =
                    (outcome.completed_at - started_at).num_milliseconds() as f64 / 1000.0;
                if let Err(e) = self.meta.mark_completed(job.document_id, &outcome).await {
                    error!(document_id = %job.document_id, error = %e, "cannot mark document completed");
                    return;
                }
                info!(
                    document_id = %job.document_id,
                    chunk_count = outcome.chunk_count,
                    qa_pairs = outcome.qa_pairs_count,
                    seconds = outcome.processing_time_seconds,
                    "document ingested"
                );
            }
            Err(e) => {
                error!(document_id = %job.document_id, error = %e, "ingestion failed");
                let message = format!("{}: {e}", e.reason());
                if let Err(mark_err) = self
                    .meta
                    .mark_failed(job.document_id, &message, Utc::now())
                    .await
                {
                    error!(document_id = %job.document_id, error = %mark_err, "cannot mark document failed");
                }
            }
        }
    }

    async fn run_pipeline(&self, job: &IngestJob) -> Result<IngestOutcome, IngestError> {
        let settings = RuntimeSettings::load(self.meta.as_ref())
            .await
            .map_err(IngestError::stage(Stage::FetchBlob))?;

        let document = self
            .meta
            .document(job.document_id)
            .await
            .map_err(IngestError::stage(Stage::FetchBlob))?
            .ok_or_else(|| IngestError::Stage {
                stage: Stage::FetchBlob,
                source: PortError::InputRejected(format!(
                    "document {} not found",
                    job.document_id
                )),
            })?;

        // Stage 1: fetch the blob.
        debug!("[1/8] fetching blob {}", job.blob_key);
        let bytes = self
            .blob
            .get(&job.blob_key)
            .await
            .map_err(IngestError::stage(Stage::FetchBlob))?;

        // Stage 2: structure extraction. Text-family documents are handled
        // locally; everything else goes through the extractor port.
        debug!("[2/8] extracting structure ({})", document.mime_type);
        let extracted = if text_processor::supports(&document.mime_type) {
            text_processor::process(&bytes, &document.mime_type)
                .map_err(IngestError::stage(Stage::Extract))?
        } else {
            self.extractor
                .extract(&bytes, &document.mime_type)
                .await
                .map_err(IngestError::stage(Stage::Extract))?
        };

        // Stage 3: image descriptions (skipped without a vision port or
        // without images; a failed caption skips that image only).
        debug!(
            "[3/8] describing {} image regions",
            extracted.image_regions.len()
        );
        let captions = self.describe_images(&extracted.image_regions).await;

        // Stage 4: build the tree.
        debug!("[4/8] building document tree");
        let tree = tree_builder::build(&document.filename, &document.mime_type, &extracted, &captions);

        // Stage 5: summarize.
        debug!("[5/8] summarizing");
        let summarizer = Summarizer::new(self.chat.clone(), settings.clone());
        let summaries = summarizer
            .summarize(&tree)
            .await
            .map_err(IngestError::stage(Stage::Summarize))?;

        // Stage 6: Q&A synthesis.
        debug!("[6/8] generating Q&A pairs");
        let qa_generator = QaGenerator::new(self.chat.clone(), settings.prompt_qa.clone());
        let qa_pairs = qa_generator
            .generate(&tree, settings.qa_pairs_per_document)
            .await
            .map_err(IngestError::stage(Stage::GenerateQa))?;

        // Stage 7: chunking, then materialize summary and Q&A chunks.
        debug!("[7/8] chunking");
        let chunker = Chunker::new(settings.clone());
        let mut chunks = chunker
            .chunk(&tree, job.document_id, self.tagger.as_ref(), Some(self.chat.as_ref()))
            .await
            .map_err(IngestError::stage(Stage::Chunk))?;
        chunks.extend(self.summary_chunks(job.document_id, &summaries));
        chunks.extend(self.qa_chunks(job.document_id, &qa_pairs));

        // Stage 8: embed and store atomically per document.
        debug!("[8/8] embedding and storing {} chunks", chunks.len());
        self.embed_and_store(job.document_id, &chunks)
            .await
            .map_err(IngestError::stage(Stage::EmbedStore))?;

        let doc_profile = self.tagger.analyze(&tree.full_text());
        let qa_count = chunks
            .iter()
            .filter(|c| c.collection() == CollectionKind::Qa)
            .count();

        Ok(IngestOutcome {
            chunk_count: chunks.len() as u32,
            vector_count: chunks.len() as u32,
            qa_pairs_count: qa_count as u32,
            detected_languages: doc_profile.languages.clone(),
            primary_language: (doc_profile.primary_language != "unknown")
                .then(|| doc_profile.primary_language.clone()),
            summary: summaries.document_summary.clone(),
            completed_at: Utc::now(),
            processing_time_seconds: 0.0,
        })
    }

    /// Captions image regions keyed by reading order. Disabled vision or a
    /// failed caption narrows the result instead of failing the stage.
    async fn describe_images(
        &self,
        regions: &[doc_base::ImageRegion],
    ) -> HashMap<usize, String> {
        let mut captions = HashMap::new();
        let Some(vision) = &self.vision else {
            if !regions.is_empty() {
                debug!("vision disabled, skipping {} image regions", regions.len());
            }
            return captions;
        };

        for region in regions {
            match vision.describe(&region.bytes).await {
                Ok(caption) if !caption.trim().is_empty() => {
                    captions.insert(region.reading_order, caption);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        reading_order = region.reading_order,
                        error = %e,
                        "image description failed, skipping region"
                    );
                }
            }
        }
        captions
    }

    /// One summary chunk per document plus one per section summary.
    fn summary_chunks(&self, doc_id: Uuid, summaries: &DocumentSummaries) -> Vec<Chunk> {
        let mut out = Vec::new();

        if !summaries.document_summary.trim().is_empty() {
            out.push(self.language_tagged(Chunk {
                chunk_id: Uuid::new_v4(),
                doc_id,
                content: summaries.document_summary.clone(),
                hierarchy_path: Vec::new(),
                page_number: None,
                language: String::new(),
                is_multilingual: false,
                languages: Vec::new(),
                language_distribution: Default::default(),
                metadata: ChunkMetadata::Summary {
                    level: SummaryLevel::Document,
                },
            }));
        }

        for section in &summaries.section_summaries {
            if section.summary.trim().is_empty() {
                continue;
            }
            out.push(self.language_tagged(Chunk {
                chunk_id: Uuid::new_v4(),
                doc_id,
                content: section.summary.clone(),
                hierarchy_path: vec![section.title.clone()],
                page_number: None,
                language: String::new(),
                is_multilingual: false,
                languages: Vec::new(),
                language_distribution: Default::default(),
                metadata: ChunkMetadata::Summary {
                    level: SummaryLevel::Section,
                },
            }));
        }
        out
    }

    /// One chunk per Q&A pair, content rendered as `Q: ...\nA: ...`.
    fn qa_chunks(&self, doc_id: Uuid, pairs: &[QaPair]) -> Vec<Chunk> {
        pairs
            .iter()
            .map(|pair| {
                self.language_tagged(Chunk {
                    chunk_id: Uuid::new_v4(),
                    doc_id,
                    content: format!("Q: {}\nA: {}", pair.question, pair.answer),
                    hierarchy_path: Vec::new(),
                    page_number: None,
                    language: String::new(),
                    is_multilingual: false,
                    languages: Vec::new(),
                    language_distribution: Default::default(),
                    metadata: ChunkMetadata::Qa {
                        question: pair.question.clone(),
                        answer: pair.answer.clone(),
                        question_type: pair.kind,
                    },
                })
            })
            .collect()
    }

    fn language_tagged(&self, chunk: Chunk) -> Chunk {
        let profile = self.tagger.analyze(&chunk.content);
        chunk.with_language(&profile)
    }

    /// Replace-then-insert: prior vectors for the document are deleted from
    /// all collections before the first new record is written, then all new
    /// records are upserted and the acknowledged count is checked.
    async fn embed_and_store(&self, doc_id: Uuid, chunks: &[Chunk]) -> Result<(), PortError> {
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        for batch in texts.chunks(EMBED_BATCH) {
            embeddings.extend(self.embedder.embed(batch).await?);
        }
        if embeddings.len() != chunks.len() {
            return Err(PortError::Storage(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        for collection in CollectionKind::ALL {
            self.index.delete_by_doc(collection, doc_id).await?;
        }

        let mut per_collection: HashMap<CollectionKind, Vec<VectorRecord>> = HashMap::new();
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            per_collection
                .entry(chunk.collection())
                .or_default()
                .push(VectorRecord {
                    embedding,
                    chunk: chunk.clone(),
                });
        }

        let mut acked = 0usize;
        for collection in CollectionKind::ALL {
            if let Some(records) = per_collection.remove(&collection) {
                acked += self.index.upsert(collection, records).await?;
            }
        }
        if acked != chunks.len() {
            return Err(PortError::Storage(format!(
                "vector upsert acknowledged {acked} of {} records",
                chunks.len()
            )));
        }
        Ok(())
    }
}
