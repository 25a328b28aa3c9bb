//! Integration tests for the MongoDB backend.
//!
//! Needs an Atlas deployment (or local Atlas image) with a vector search
//! index on `embedding` (2 dimensions, cosine) for the collection named by
//! `VECSTORE_MONGODB_COLLECTION`:
//!
//! ```text
//! VECSTORE_MONGODB_URI=mongodb://localhost:27017/?directConnection=true \
//! VECSTORE_MONGODB_DATABASE=vecstore \
//! VECSTORE_MONGODB_COLLECTION=vectors \
//! VECSTORE_MONGODB_INDEX=vector_index \
//!     cargo test -p vecstore-db --test mongodb_collection -- --ignored
//! ```

#![cfg(feature = "mongodb")]

use anyhow::{Context, Result};
use std::time::Duration;
use vecstore_core::{
    CollectionInfo, MetadataFilter, Vector, VectorCollection, VectorSearchRequest,
    VectorSearchSettings,
};
use vecstore_db::MongoVectorCollection;

fn env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} is not set", name))
}

async fn collection() -> Result<MongoVectorCollection> {
    let name = std::env::var("VECSTORE_MONGODB_COLLECTION").unwrap_or_else(|_| "vectors".into());
    let collection = MongoVectorCollection::connect(
        &env("VECSTORE_MONGODB_URI")?,
        &env("VECSTORE_MONGODB_DATABASE")?,
        CollectionInfo::new(name),
        env("VECSTORE_MONGODB_INDEX")?,
    )
    .await?;
    Ok(collection)
}

fn item(id: &str, embedding: Vec<f32>) -> Vector {
    Vector::with_id(id, format!("text {}", id)).with_embedding(embedding)
}

fn ids(items: &[Vector]) -> Vec<String> {
    items.iter().map(|v| v.id.clone()).collect()
}

#[tokio::test]
#[ignore] // Requires MongoDB with a vector search index
async fn test_round_trip() -> Result<()> {
    let collection = collection().await?;
    let vector = item("mongo-rt", vec![0.5, 0.5]).with_metadata("lang", "en");

    collection.add(std::slice::from_ref(&vector)).await?;
    let stored = collection.get("mongo-rt").await?.context("document exists")?;
    assert_eq!(stored, vector);

    collection.delete(&ids(&[vector])).await?;
    assert!(collection.get("mongo-rt").await?.is_none());
    Ok(())
}

#[tokio::test]
#[ignore] // Requires MongoDB with a vector search index
async fn test_add_without_embedding() -> Result<()> {
    let collection = collection().await?;
    let vector = Vector::with_id("mongo-bare", "no embedding").with_metadata("lang", "en");

    collection.add(std::slice::from_ref(&vector)).await?;
    let stored = collection.get("mongo-bare").await?.context("document exists")?;
    assert_eq!(stored, vector);
    assert!(stored.embedding.is_none());

    collection.delete(&ids(&[vector])).await?;
    Ok(())
}

#[tokio::test]
#[ignore] // Requires MongoDB with a vector search index
async fn test_search_and_metadata() -> Result<()> {
    let collection = collection().await?;
    let items = vec![
        item("mongo-x", vec![1.0, 0.0]).with_metadata("group", "search-test"),
        item("mongo-y", vec![0.0, 1.0]).with_metadata("group", "search-test"),
        item("mongo-near-x", vec![0.9, 0.1]).with_metadata("group", "search-test"),
    ];
    collection.add(&items).await?;

    // Atlas indexes asynchronously.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let response = collection
        .search(
            &VectorSearchRequest::new(vec![1.0, 0.0]),
            &VectorSearchSettings::new().with_number_of_results(2),
        )
        .await?;
    let found: Vec<&str> = response.items.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(found, vec!["mongo-x", "mongo-near-x"]);
    assert!(response.items.iter().all(|v| v.embedding.is_none()));

    let mut filters = MetadataFilter::new();
    filters.insert("group".to_string(), "search-test".into());
    let grouped = collection.search_by_metadata(&filters).await?;
    assert_eq!(grouped.len(), 3);
    assert!(!collection.is_empty().await?);

    collection.delete(&ids(&items)).await?;
    Ok(())
}
