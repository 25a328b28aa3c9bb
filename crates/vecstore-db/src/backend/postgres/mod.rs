//! PostgreSQL + pgvector collection backend.

mod client;

pub use client::{PgRecord, PgVectorClient};

use async_trait::async_trait;
use tracing::{debug, trace};
use vecstore_core::collection::{require_finite, require_ids, require_items};
use vecstore_core::filter::{validate_collection_name, validate_filters};
use vecstore_core::vector::collect_ids;
use vecstore_core::{
    CollectionInfo, MetadataFilter, StoreError, StoreResult, Vector, VectorCollection,
    VectorSearchRequest, VectorSearchResponse, VectorSearchSettings,
};

pub(crate) const BACKEND: &str = "postgres";

/// Vector collection stored in a pgvector table.
///
/// `add` upserts: an existing id is replaced. Emptiness is not supported.
#[derive(Debug, Clone)]
pub struct PostgresVectorCollection {
    info: CollectionInfo,
    client: PgVectorClient,
}

impl PostgresVectorCollection {
    pub fn new(client: PgVectorClient, info: CollectionInfo) -> StoreResult<Self> {
        validate_collection_name(&info.name)?;
        Ok(Self { info, client })
    }

    pub fn client(&self) -> &PgVectorClient {
        &self.client
    }

    fn table(&self) -> &str {
        &self.info.name
    }
}

#[async_trait]
impl VectorCollection for PostgresVectorCollection {
    fn info(&self) -> &CollectionInfo {
        &self.info
    }

    async fn add(&self, items: &[Vector]) -> StoreResult<Vec<String>> {
        require_items(items)?;
        require_finite(items)?;
        debug!("Upserting {} vectors into '{}'", items.len(), self.table());

        for item in items {
            self.client.upsert(self.table(), item).await?;
        }

        Ok(collect_ids(items))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Vector>> {
        let record = self.client.get_record_by_id(self.table(), id, false).await?;
        Ok(record.map(|r| r.into_vector()))
    }

    async fn delete(&self, ids: &[String]) -> StoreResult<bool> {
        require_ids(ids)?;
        let removed = self.client.delete_batch(self.table(), ids).await?;
        debug!("Deleted {} of {} ids from '{}'", removed, ids.len(), self.table());
        Ok(true)
    }

    async fn is_empty(&self) -> StoreResult<bool> {
        Err(StoreError::unsupported("is_empty", BACKEND))
    }

    async fn search(
        &self,
        request: &VectorSearchRequest,
        settings: &VectorSearchSettings,
    ) -> StoreResult<VectorSearchResponse> {
        settings.validate()?;
        let query = request.query_embedding()?;

        trace!(
            "Searching '{}', limit={}, strategy={}",
            self.table(),
            settings.number_of_results,
            settings.distance_strategy
        );

        let records = self
            .client
            .get_with_distance(
                self.table(),
                query,
                settings.number_of_results,
                settings.distance_strategy,
                settings.score_threshold,
            )
            .await?;

        Ok(VectorSearchResponse::new(
            records.into_iter().map(PgRecord::into_vector).collect(),
        ))
    }

    async fn search_by_metadata(&self, filters: &MetadataFilter) -> StoreResult<Vec<Vector>> {
        validate_filters(filters)?;
        trace!(
            "Searching '{}' by {} metadata keys",
            self.table(),
            filters.len()
        );

        let records = self
            .client
            .get_records_by_metadata(self.table(), filters)
            .await?;
        Ok(records.into_iter().map(PgRecord::into_vector).collect())
    }
}
