//! Write-through caching in front of the metadata service.
//!
//! A cold procedures fetch takes 30-40 seconds upstream, so every
//! successful response is written to the disk cache keyed by subject id and
//! served from there on later calls.

use async_trait::async_trait;
use metatools_cache::DiskCache;
use metatools_core::{ProcedureSource, Result};
use serde_json::Value;
use tracing::{info, warn};

pub struct CachedProceduresFetcher<S> {
    upstream: S,
    cache: DiskCache,
}

impl<S: ProcedureSource> CachedProceduresFetcher<S> {
    pub fn new(upstream: S, cache: DiskCache) -> Self {
        Self { upstream, cache }
    }

    pub fn cache(&self) -> &DiskCache {
        &self.cache
    }

    /// Cache-first lookup. A hit skips upstream entirely; a miss fetches
    /// upstream and writes the response through before returning it.
    pub async fn fetch(&self, subject_id: &str) -> Result<Option<Value>> {
        if let Some(cached) = self.cache.get(subject_id).await {
            return Ok(Some(cached));
        }

        info!(subject_id, "cache miss, fetching procedures upstream");
        let fetched = self.upstream.procedures_for_subject(subject_id).await?;

        if let Some(ref value) = fetched {
            // cache write failure is not fatal, the data is already in hand
            if let Err(e) = self.cache.put(subject_id, value).await {
                warn!(subject_id, error = %e, "failed to write cache entry");
            }
        }
        Ok(fetched)
    }
}

#[async_trait]
impl<S: ProcedureSource> ProcedureSource for CachedProceduresFetcher<S> {
    async fn procedures_for_subject(&self, subject_id: &str) -> Result<Option<Value>> {
        self.fetch(subject_id).await
    }
}
