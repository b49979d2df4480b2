//! Worker host: boots the shared services and runs the ingestion and query
//! consumers until shutdown.
//!
//! The control plane lives elsewhere; it enqueues jobs on the bus and owns
//! the HTTP surface. This binary wires concrete adapters (Qdrant, Postgres,
//! the LLM profile service, a local blob directory) into the workers.

mod adapters;

use std::{error::Error, sync::Arc};

use tracing::Level;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use ai_llm_service::{
    config::default_config,
    health_service,
    ports::{ProfileChat, ProfileEmbedder, ProfileVision},
    service_profiles::{ChatProfile, LlmServiceProfiles},
    telemetry,
};
use doc_base::{Chat, Embedder, MemoryJobBus, VisionDescriber};
use ingest_worker::pipeline::language::ScriptLanguageTagger;
use ingest_worker::IngestWorker;
use meta_store::PgMetaStore;
use query_worker::QueryWorker;
use vector_store::{VectorStore, VectorStoreConfig};

use crate::adapters::{FsBlobStore, UnconfiguredExtractor};

/// Concurrent query handlers per worker process; documents run one at a time.
const QUERY_HANDLERS: usize = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file.
    // Fails if .env file not found, not readable or invalid.
    dotenvy::dotenv()?;

    init_tracing();

    let fast = default_config::config_chat_fast()?;
    let slow = default_config::config_chat_slow()?;
    let embedding = default_config::config_embedding()?;
    let vision = default_config::config_vision()?;

    let health_targets = vec![fast.clone(), embedding.clone()];
    let svc = Arc::new(LlmServiceProfiles::new(fast, Some(slow), embedding, vision)?);

    let statuses = health_service::check_many(&health_targets, 10).await;
    for status in &statuses {
        tracing::info!(
            model = %status.model,
            reachable = status.reachable,
            latency_ms = status.latency_ms,
            "llm profile probe"
        );
    }

    let embedding_dim = env_usize("EMBEDDING_DIM", 3072);
    let qdrant_url =
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".into());
    let mut store_cfg = VectorStoreConfig::new_default(qdrant_url, embedding_dim);
    store_cfg.qdrant_api_key = std::env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty());
    let index = Arc::new(VectorStore::new(store_cfg)?);
    index.ensure_collections().await?;

    let database_url = std::env::var("DATABASE_URL")?;
    let meta = Arc::new(PgMetaStore::connect(&database_url).await?);
    meta.ensure_schema().await?;

    let blob_dir = std::env::var("BLOB_DIR").unwrap_or_else(|_| "./blobs".into());
    let blob = Arc::new(FsBlobStore::new(blob_dir));

    let chat_slow: Arc<dyn Chat> = Arc::new(ProfileChat::new(svc.clone(), ChatProfile::Slow));
    let chat_fast: Arc<dyn Chat> = Arc::new(ProfileChat::new(svc.clone(), ChatProfile::Fast));
    let embedder: Arc<dyn Embedder> = Arc::new(ProfileEmbedder::new(svc.clone(), embedding_dim, 4));
    let vision_port: Option<Arc<dyn VisionDescriber>> = svc
        .vision_enabled()
        .then(|| Arc::new(ProfileVision::new(svc.clone())) as Arc<dyn VisionDescriber>);

    let bus = Arc::new(MemoryJobBus::new());

    let ingest = Arc::new(IngestWorker::new(
        blob,
        Arc::new(UnconfiguredExtractor),
        vision_port,
        chat_slow,
        embedder.clone(),
        index.clone(),
        meta.clone(),
        Arc::new(ScriptLanguageTagger),
    ));
    let query = Arc::new(QueryWorker::new(embedder, index, chat_fast, meta));

    let mut handles = Vec::new();
    {
        let ingest = ingest.clone();
        let bus = bus.clone();
        handles.push(tokio::spawn(async move { ingest.run(bus.as_ref()).await }));
    }
    for _ in 0..QUERY_HANDLERS {
        let query = query.clone();
        let bus = bus.clone();
        handles.push(tokio::spawn(async move { query.run(bus.as_ref()).await }));
    }

    shutdown_signal().await;
    tracing::info!("shutdown requested, draining workers");
    bus.close();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

fn init_tracing() {
    // Global filter at info, raised to debug for the LLM service crate.
    let filter = telemetry::env_filter_with_level("info", Level::DEBUG);

    let fmt_all = fmt::layer();

    // Crate-scoped layer: span durations and source locations for every
    // provider call.
    let llm_layer = telemetry::layer::<_>()
        .with_filter(Targets::new().with_target(telemetry::TARGET_PREFIX, Level::DEBUG));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_all)
        .with(llm_layer)
        .init();
}

/// Graceful shutdown on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // If even listening for Ctrl+C fails, just log to stderr.
        eprintln!("failed to listen for shutdown signal: {e}");
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
