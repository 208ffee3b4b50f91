use crate::{AssetIdentifier, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Read access to the versioned metadata document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run an aggregation pipeline verbatim and return the result documents.
    async fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Value>>;

    /// Retrieve documents matching a filter, up to `limit`.
    async fn retrieve(&self, filter: &Value, limit: usize) -> Result<Vec<Value>>;

    /// Resolve an asset identifier to at most one document.
    ///
    /// For `Unknown` identifiers the name lookup runs first, then the id
    /// lookup.
    async fn fetch_asset(&self, identifier: &AssetIdentifier) -> Result<Option<Value>> {
        if identifier.tries_name() {
            let records = self
                .retrieve(&json!({"name": identifier.value()}), 1)
                .await?;
            if let Some(record) = records.into_iter().next() {
                return Ok(Some(record));
            }
        }
        if identifier.tries_id() {
            let records = self
                .retrieve(&json!({"_id": identifier.value()}), 1)
                .await?;
            if let Some(record) = records.into_iter().next() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// Source of per-subject procedures documents.
#[async_trait]
pub trait ProcedureSource: Send + Sync {
    /// Fetch the procedures document for one subject, or `None` if the
    /// subject has no record upstream.
    async fn procedures_for_subject(&self, subject_id: &str) -> Result<Option<Value>>;
}
