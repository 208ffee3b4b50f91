use metatools_cache::DiskCache;
use metatools_core::{DocumentStore, ProcedureSource, Result, Settings};
use metatools_docdb::DocDbClient;
use metatools_service::{CachedProceduresFetcher, MetadataServiceClient};
use metatools_upgrade::{NativeUpgrader, SchemaUpgrader};
use std::sync::Arc;

/// Everything the handlers need, constructed once at startup and injected.
#[derive(Clone)]
pub struct AppState {
    /// v1 document store (`metadata_index`).
    pub store: Arc<dyn DocumentStore>,
    /// v2 document store (`metadata_index_v2`).
    pub store_v2: Arc<dyn DocumentStore>,
    /// Cached procedures source backed by the metadata service.
    pub procedures: Arc<dyn ProcedureSource>,
    pub upgrader: Arc<dyn SchemaUpgrader>,
    pub default_limit: usize,
}

impl AppState {
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::new();
        let store = DocDbClient::with_http(
            http.clone(),
            &settings.docdb_host,
            &settings.database,
            &settings.collection,
        );
        let store_v2 = DocDbClient::with_http(
            http.clone(),
            &settings.docdb_host,
            &settings.database_v2,
            &settings.collection,
        );
        let service = MetadataServiceClient::with_http(http, &settings.service_url);
        let cache = DiskCache::open(settings.cache_dir.clone(), settings.cache_ttl).await?;

        Ok(Self {
            store: Arc::new(store),
            store_v2: Arc::new(store_v2),
            procedures: Arc::new(CachedProceduresFetcher::new(service, cache)),
            upgrader: Arc::new(NativeUpgrader::new()),
            default_limit: settings.default_limit,
        })
    }

    /// Assemble a state from pre-built components. Useful for tests and for
    /// swapping the upgrade engine.
    pub fn with_components(
        store: Arc<dyn DocumentStore>,
        store_v2: Arc<dyn DocumentStore>,
        procedures: Arc<dyn ProcedureSource>,
        upgrader: Arc<dyn SchemaUpgrader>,
        default_limit: usize,
    ) -> Self {
        Self {
            store,
            store_v2,
            procedures,
            upgrader,
            default_limit,
        }
    }
}
