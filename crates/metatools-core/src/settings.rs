use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration shared by the server and the CLI.
///
/// Constructed explicitly (usually from CLI flags) and passed into each
/// client; there are no module-level singletons.
#[derive(Debug, Clone)]
pub struct Settings {
    /// DocDB REST API host.
    pub docdb_host: String,
    /// v1 metadata database name.
    pub database: String,
    /// v2 metadata database name.
    pub database_v2: String,
    /// Collection holding asset records.
    pub collection: String,
    /// Base URL of the AIND metadata service.
    pub service_url: String,
    /// Root directory for the procedures disk cache.
    pub cache_dir: PathBuf,
    /// Optional staleness bound for cache entries. `None` means entries
    /// never expire.
    pub cache_ttl: Option<Duration>,
    /// Result limit applied when a query is a bare filter object.
    pub default_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docdb_host: "api.allenneuraldynamics.org".to_string(),
            database: "metadata_index".to_string(),
            database_v2: "metadata_index_v2".to_string(),
            collection: "data_assets".to_string(),
            service_url: "http://aind-metadata-service".to_string(),
            cache_dir: PathBuf::from(".cache/procedures"),
            cache_ttl: None,
            default_limit: 100,
        }
    }
}
