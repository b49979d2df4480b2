//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind a small API,
//! using the modern builder-based client (`qdrant_client::Qdrant`).

use qdrant_client::qdrant::{
    CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance,
    FieldType, Filter, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::trace;

use crate::config::VectorStoreConfig;
use crate::errors::VectorStoreError;

/// A minimal facade over the Qdrant client to keep the rest of the code
/// decoupled.
pub struct QdrantFacade {
    client: Qdrant,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    ///
    /// # Errors
    /// Returns `VectorStoreError::Config` for invalid cfg or wraps client
    /// init failures as `VectorStoreError::Qdrant`.
    pub fn new(cfg: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        Ok(Self { client })
    }

    /// Ensures the collection exists with the provided vector size, cosine
    /// distance, a full-text index on `content` and a keyword index on
    /// `doc_id`.
    pub async fn ensure_collection(
        &self,
        collection: &str,
        dim: usize,
    ) -> Result<(), VectorStoreError> {
        trace!("qdrant_facade::ensure_collection name={collection} size={dim}");

        match self.client.collection_info(collection).await {
            Ok(_) => {
                trace!("qdrant_facade::ensure_collection already exists");
                return Ok(());
            }
            Err(err) => {
                // Proceed to create; the original error is likely NotFound.
                trace!("qdrant_facade::collection_info miss: {}", err);
            }
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        // Payload indexes: full-text recall over content, equality over doc_id.
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(collection, "content", FieldType::Text)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::Qdrant(format!("create_field_index[content]: {e}")))?;
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(collection, "doc_id", FieldType::Keyword)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::Qdrant(format!("create_field_index[doc_id]: {e}")))?;

        trace!("qdrant_facade::ensure_collection created");
        Ok(())
    }

    /// Upserts a batch of points and waits for completion. Returns the number
    /// of points sent.
    pub async fn upsert_points(
        &self,
        collection: &str,
        points: Vec<PointStruct>,
    ) -> Result<usize, VectorStoreError> {
        trace!("qdrant_facade::upsert_points count={}", points.len());
        if points.is_empty() {
            return Ok(0);
        }
        let count = points.len();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        Ok(count)
    }

    /// Deletes every point matching the filter, waiting for completion.
    pub async fn delete_by_filter(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<(), VectorStoreError> {
        trace!("qdrant_facade::delete_by_filter collection={collection}");
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;
        Ok(())
    }

    /// Performs a similarity search and returns `(score, payload)` tuples.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        top_k: u64,
        filter: Option<Filter>,
    ) -> Result<Vec<(f32, serde_json::Value)>, VectorStoreError> {
        trace!("qdrant_facade::search collection={collection} top_k={top_k}");

        let mut builder = SearchPointsBuilder::new(collection, vector, top_k).with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for r in res.result.into_iter() {
            let score = r.score;
            // `payload` is `HashMap<String, qdrant::Value>`; convert to JSON
            // since the rest of our code expects `serde_json::Value`.
            let payload = r
                .payload
                .into_iter()
                .map(|(k, v)| (k, v.into_json()))
                .collect::<serde_json::Map<_, _>>();
            out.push((score, serde_json::Value::Object(payload)));
        }
        trace!("qdrant_facade::search hits={}", out.len());
        Ok(out)
    }

    /// Scrolls points matching a filter, returning payloads only.
    pub async fn scroll(
        &self,
        collection: &str,
        filter: Filter,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, VectorStoreError> {
        trace!("qdrant_facade::scroll collection={collection} limit={limit}");

        let builder = ScrollPointsBuilder::new(collection)
            .filter(filter)
            .with_payload(true)
            .with_vectors(false)
            .limit(limit);

        let res = self
            .client
            .scroll(builder)
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        let out = res
            .result
            .into_iter()
            .map(|p| {
                let payload = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(payload)
            })
            .collect::<Vec<_>>();
        trace!("qdrant_facade::scroll hits={}", out.len());
        Ok(out)
    }
}
