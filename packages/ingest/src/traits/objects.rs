//! Object storage trait.

use async_trait::async_trait;

use crate::error::Result;

/// Binary blob storage addressed by key.
///
/// `put` returns the public URL the stored object is reachable at; that URL
/// is what gets persisted on catalog records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<String>;
}
