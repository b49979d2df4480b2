//! End-to-end ingestion pipeline tests over deterministic port fakes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use doc_base::{
    BlobStore, Chat, ChatRequest, ChunkMetadata, CollectionKind, DocumentExtractor,
    DocumentRecord, DocumentStatus, Embedder, ExtractedDocument, IngestJob, IngestOutcome,
    MetaStore, PortError, QueryRecord, RetrievedChunk, VectorIndex, VectorRecord,
};
use ingest_worker::IngestWorker;

/* ----------------------------- fakes ----------------------------- */

struct MemoryBlob {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlob {
    fn with(key: &str, bytes: &[u8]) -> Self {
        Self {
            blobs: Mutex::new(HashMap::from([(key.to_string(), bytes.to_vec())])),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl BlobStore for MemoryBlob {
    async fn get(&self, key: &str) -> Result<Vec<u8>, PortError> {
        self.blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::InputRejected(format!("blob {key} missing")))
    }
}

/// Extractor fake for non-text formats; tests here only use text MIME types,
/// so this port must never be called.
struct PanicExtractor;

#[async_trait]
impl DocumentExtractor for PanicExtractor {
    async fn extract(&self, _: &[u8], mime: &str) -> Result<ExtractedDocument, PortError> {
        panic!("extractor port called for text document ({mime})");
    }
}

/// Chat fake: JSON-mode calls get a Q&A envelope, everything else a summary.
struct ScriptedChat {
    fail: bool,
}

#[async_trait]
impl Chat for ScriptedChat {
    async fn complete(&self, req: ChatRequest<'_>) -> Result<String, PortError> {
        if self.fail {
            return Err(PortError::Transient("chat unavailable".into()));
        }
        if req.json_mode {
            Ok(r#"{"qa_pairs": [
                {"question": "What does the document say?", "answer": "Hello world.", "type": "overview"},
                {"question": "Is this a test?", "answer": "Yes.", "type": "factual"}
            ]}"#
            .to_string())
        } else {
            Ok("A short greeting document used for testing.".to_string())
        }
    }
}

struct HashEmbedder {
    dim: usize,
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PortError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; self.dim];
                for (i, b) in t.bytes().enumerate() {
                    v[i % self.dim] += b as f32 / 255.0;
                }
                v
            })
            .collect())
    }
}

#[derive(Default)]
struct MemoryIndex {
    records: Mutex<HashMap<CollectionKind, HashMap<Uuid, VectorRecord>>>,
}

impl MemoryIndex {
    fn count_for_doc(&self, doc_id: Uuid) -> usize {
        let records = self.records.lock().unwrap();
        records
            .values()
            .flat_map(|m| m.values())
            .filter(|r| r.chunk.doc_id == doc_id)
            .count()
    }

    fn chunk_ids_for_doc(&self, doc_id: Uuid) -> Vec<Uuid> {
        let records = self.records.lock().unwrap();
        let mut ids: Vec<Uuid> = records
            .values()
            .flat_map(|m| m.values())
            .filter(|r| r.chunk.doc_id == doc_id)
            .map(|r| r.chunk.chunk_id)
            .collect();
        ids.sort();
        ids
    }

    fn text_chunk_contents(&self, doc_id: Uuid) -> Vec<String> {
        let records = self.records.lock().unwrap();
        records
            .get(&CollectionKind::Chunks)
            .map(|m| {
                m.values()
                    .filter(|r| r.chunk.doc_id == doc_id)
                    .map(|r| r.chunk.content.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(
        &self,
        collection: CollectionKind,
        records: Vec<VectorRecord>,
    ) -> Result<usize, PortError> {
        let mut store = self.records.lock().unwrap();
        let entry = store.entry(collection).or_default();
        let count = records.len();
        for record in records {
            entry.insert(record.chunk.chunk_id, record);
        }
        Ok(count)
    }

    async fn delete_by_doc(
        &self,
        collection: CollectionKind,
        doc_id: Uuid,
    ) -> Result<(), PortError> {
        let mut store = self.records.lock().unwrap();
        if let Some(entry) = store.get_mut(&collection) {
            entry.retain(|_, r| r.chunk.doc_id != doc_id);
        }
        Ok(())
    }

    async fn dense_search(
        &self,
        _collection: CollectionKind,
        _vector: &[f32],
        _top_k: usize,
        _filter: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>, PortError> {
        Ok(Vec::new())
    }

    async fn lexical_search(
        &self,
        _collection: CollectionKind,
        _text: &str,
        _top_k: usize,
        _filter: Option<&[Uuid]>,
    ) -> Result<Vec<RetrievedChunk>, PortError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct MemoryMeta {
    documents: Mutex<HashMap<Uuid, DocumentRecord>>,
    status_log: Mutex<Vec<DocumentStatus>>,
}

impl MemoryMeta {
    fn with_pending(id: Uuid, filename: &str, mime: &str) -> Self {
        let meta = Self::default();
        meta.documents.lock().unwrap().insert(
            id,
            DocumentRecord {
                id,
                filename: filename.to_string(),
                file_size_bytes: 0,
                mime_type: mime.to_string(),
                status: DocumentStatus::Pending,
                uploaded_at: Utc::now(),
                processing_started_at: None,
                processing_completed_at: None,
                processing_time_seconds: None,
                chunk_count: 0,
                vector_count: 0,
                qa_pairs_count: 0,
                detected_languages: Vec::new(),
                primary_language: None,
                summary: None,
                error_message: None,
            },
        );
        meta
    }

    fn snapshot(&self, id: Uuid) -> DocumentRecord {
        self.documents.lock().unwrap().get(&id).unwrap().clone()
    }

    fn transitions(&self) -> Vec<DocumentStatus> {
        self.status_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetaStore for MemoryMeta {
    async fn document(&self, id: Uuid) -> Result<Option<DocumentRecord>, PortError> {
        Ok(self.documents.lock().unwrap().get(&id).cloned())
    }

    async fn mark_processing(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<(), PortError> {
        let mut docs = self.documents.lock().unwrap();
        let doc = docs
            .get_mut(&id)
            .ok_or_else(|| PortError::Storage("unknown document".into()))?;
        if doc.status == DocumentStatus::Processing {
            return Err(PortError::Storage("already processing".into()));
        }
        doc.status = DocumentStatus::Processing;
        doc.processing_started_at = Some(started_at);
        doc.error_message = None;
        self.status_log.lock().unwrap().push(doc.status);
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, outcome: &IngestOutcome) -> Result<(), PortError> {
        let mut docs = self.documents.lock().unwrap();
        let doc = docs
            .get_mut(&id)
            .ok_or_else(|| PortError::Storage("unknown document".into()))?;
        if doc.status != DocumentStatus::Processing {
            return Err(PortError::Storage("not processing".into()));
        }
        doc.status = DocumentStatus::Completed;
        doc.processing_completed_at = Some(outcome.completed_at);
        doc.processing_time_seconds = Some(outcome.processing_time_seconds);
        doc.chunk_count = outcome.chunk_count;
        doc.vector_count = outcome.vector_count;
        doc.qa_pairs_count = outcome.qa_pairs_count;
        doc.detected_languages = outcome.detected_languages.clone();
        doc.primary_language = outcome.primary_language.clone();
        doc.summary = Some(outcome.summary.clone());
        self.status_log.lock().unwrap().push(doc.status);
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        let mut docs = self.documents.lock().unwrap();
        let doc = docs
            .get_mut(&id)
            .ok_or_else(|| PortError::Storage("unknown document".into()))?;
        if doc.status != DocumentStatus::Processing {
            return Err(PortError::Storage("not processing".into()));
        }
        doc.status = DocumentStatus::Failed;
        doc.processing_completed_at = Some(completed_at);
        doc.error_message = Some(error_message.to_string());
        self.status_log.lock().unwrap().push(doc.status);
        Ok(())
    }

    async fn put_query_result(&self, _record: &QueryRecord) -> Result<(), PortError> {
        Ok(())
    }

    async fn setting(&self, _key: &str) -> Result<Option<serde_json::Value>, PortError> {
        Ok(None)
    }

    async fn put_setting(&self, _key: &str, _value: serde_json::Value) -> Result<(), PortError> {
        Ok(())
    }
}

/* ----------------------------- helpers ----------------------------- */

struct Harness {
    worker: IngestWorker,
    meta: Arc<MemoryMeta>,
    index: Arc<MemoryIndex>,
    blob: Arc<MemoryBlob>,
    doc_id: Uuid,
}

fn harness(content: &[u8], filename: &str, mime: &str, chat_fails: bool) -> Harness {
    let doc_id = Uuid::new_v4();
    let blob = Arc::new(MemoryBlob::with("blob-key", content));
    let meta = Arc::new(MemoryMeta::with_pending(doc_id, filename, mime));
    let index = Arc::new(MemoryIndex::default());

    let worker = IngestWorker::new(
        blob.clone(),
        Arc::new(PanicExtractor),
        None,
        Arc::new(ScriptedChat { fail: chat_fails }),
        Arc::new(HashEmbedder { dim: 8 }),
        index.clone(),
        meta.clone(),
        Arc::new(ingest_worker::pipeline::language::ScriptLanguageTagger),
    );

    Harness {
        worker,
        meta,
        index,
        blob,
        doc_id,
    }
}

fn job(doc_id: Uuid) -> IngestJob {
    IngestJob {
        document_id: doc_id,
        blob_key: "blob-key".into(),
        correlation_id: "corr".into(),
        enqueued_at: Utc::now(),
    }
}

/* ----------------------------- tests ----------------------------- */

#[tokio::test]
async fn small_text_document_completes() {
    let h = harness(
        b"Hello world. This is a test.",
        "hello.txt",
        "text/plain",
        false,
    );
    h.worker.process_job(&job(h.doc_id)).await;

    let doc = h.meta.snapshot(h.doc_id);
    assert_eq!(doc.status, DocumentStatus::Completed);
    // 1 text chunk + 1 document summary + 2 Q&A pairs.
    assert_eq!(doc.chunk_count, 4);
    assert_eq!(doc.vector_count, doc.chunk_count);
    assert_eq!(doc.qa_pairs_count, 2);
    assert_eq!(doc.primary_language.as_deref(), Some("en"));
    assert!(doc.summary.as_deref().unwrap_or("").contains("greeting"));
    assert!(doc.processing_time_seconds.is_some());

    // Vector store agrees with the counters.
    assert_eq!(h.index.count_for_doc(h.doc_id), doc.chunk_count as usize);
    let texts = h.index.text_chunk_contents(h.doc_id);
    assert_eq!(texts, vec!["Hello world. This is a test.".to_string()]);
}

#[tokio::test]
async fn chat_failure_marks_document_failed_without_partial_storage() {
    let h = harness(b"Some content to summarize.", "doc.txt", "text/plain", true);
    h.worker.process_job(&job(h.doc_id)).await;

    let doc = h.meta.snapshot(h.doc_id);
    assert_eq!(doc.status, DocumentStatus::Failed);
    let message = doc.error_message.unwrap();
    assert!(message.starts_with("summarize:"), "got: {message}");
    // Counters untouched, nothing stored.
    assert_eq!(doc.chunk_count, 0);
    assert_eq!(h.index.count_for_doc(h.doc_id), 0);
}

#[tokio::test]
async fn missing_blob_fails_with_fetch_stage() {
    let h = harness(b"x", "doc.txt", "text/plain", false);
    let mut j = job(h.doc_id);
    j.blob_key = "nope".into();
    h.worker.process_job(&j).await;

    let doc = h.meta.snapshot(h.doc_id);
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.error_message.unwrap().starts_with("fetch_blob:"));
}

#[tokio::test]
async fn zero_paragraph_document_completes_empty() {
    let h = harness(b"", "empty.txt", "text/plain", false);
    h.worker.process_job(&job(h.doc_id)).await;

    let doc = h.meta.snapshot(h.doc_id);
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert_eq!(doc.chunk_count, 0);
    assert_eq!(doc.qa_pairs_count, 0);
    assert_eq!(doc.summary.as_deref(), Some(""));
    assert_eq!(h.index.count_for_doc(h.doc_id), 0);
}

#[tokio::test]
async fn reingest_replaces_prior_vectors() {
    let h = harness(
        b"First version of the body. It has a couple of sentences.",
        "doc.txt",
        "text/plain",
        false,
    );
    h.worker.process_job(&job(h.doc_id)).await;
    let first_ids = h.index.chunk_ids_for_doc(h.doc_id);
    let first_count = h.index.count_for_doc(h.doc_id);
    assert!(first_count > 0);

    // Modified content, same document id.
    h.blob.put(
        "blob-key",
        b"Second version, rewritten entirely.\n\nWith an extra paragraph now.",
    );
    h.worker.process_job(&job(h.doc_id)).await;

    let doc = h.meta.snapshot(h.doc_id);
    assert_eq!(doc.status, DocumentStatus::Completed);

    // Exactly the new set remains; every id is fresh.
    let second_ids = h.index.chunk_ids_for_doc(h.doc_id);
    assert_eq!(second_ids.len(), doc.chunk_count as usize);
    assert!(first_ids.iter().all(|id| !second_ids.contains(id)));
}

#[tokio::test]
async fn status_transitions_follow_the_lattice() {
    let h = harness(b"Body text here.", "doc.txt", "text/plain", false);
    h.worker.process_job(&job(h.doc_id)).await;
    assert_eq!(
        h.meta.transitions(),
        vec![DocumentStatus::Processing, DocumentStatus::Completed]
    );

    let h = harness(b"Body text here.", "doc.txt", "text/plain", true);
    h.worker.process_job(&job(h.doc_id)).await;
    assert_eq!(
        h.meta.transitions(),
        vec![DocumentStatus::Processing, DocumentStatus::Failed]
    );
}

#[tokio::test]
async fn multilingual_content_is_tagged_per_chunk() {
    let h = harness(
        "שלום my name is דוד and I live in ירושלים".as_bytes(),
        "mixed.txt",
        "text/plain",
        false,
    );
    h.worker.process_job(&job(h.doc_id)).await;

    let doc = h.meta.snapshot(h.doc_id);
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert_eq!(doc.detected_languages, vec!["he".to_string(), "en".to_string()]);

    let records = h.index.records.lock().unwrap();
    let text_chunk = records[&CollectionKind::Chunks]
        .values()
        .find(|r| r.chunk.doc_id == h.doc_id)
        .unwrap();
    assert_eq!(text_chunk.chunk.language, "en");
    assert!(text_chunk.chunk.is_multilingual);
    assert_eq!(
        text_chunk.chunk.languages,
        vec!["he".to_string(), "en".to_string()]
    );
    let sum: f64 = text_chunk.chunk.language_distribution.values().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(matches!(
        text_chunk.chunk.metadata,
        ChunkMetadata::TextChunk { .. }
    ));
}
