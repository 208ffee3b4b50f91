use async_trait::async_trait;
use metatools_core::{MetaError, ProcedureSource, Result};
use serde_json::Value;
use tracing::{debug, info};

/// Client for the AIND metadata service, which serves per-subject
/// procedure records from the upstream lab systems.
///
/// The service answers 406 for records that fail its own validation but
/// often still includes the data payload; those responses are treated as
/// success-with-warnings.
#[derive(Debug, Clone)]
pub struct MetadataServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the procedures record for one subject. Slow upstream (tens of
    /// seconds); callers go through `CachedProceduresFetcher` where
    /// repeated lookups are expected.
    pub async fn get_procedures(&self, subject_id: &str) -> Result<Option<Value>> {
        let url = format!("{}/procedures/{}", self.base_url, subject_id);
        debug!(%url, "fetching procedures from metadata service");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MetaError::Upstream(format!("metadata service request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            200 | 406 => {
                let body: Value = response.json().await.map_err(|e| {
                    MetaError::Upstream(format!("metadata service returned malformed JSON: {}", e))
                })?;
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                match body.get("data") {
                    Some(data) if !data.is_null() => {
                        if status.as_u16() == 406 {
                            info!(subject_id, message, "metadata service returned data with validation warnings");
                        }
                        Ok(Some(data.clone()))
                    }
                    _ if status.as_u16() == 200 => Ok(None),
                    _ => Err(MetaError::Upstream(format!(
                        "metadata service returned {} with no data: {}",
                        status, message
                    ))),
                }
            }
            404 => Ok(None),
            _ => Err(MetaError::Upstream(format!(
                "metadata service returned {} for subject {}",
                status, subject_id
            ))),
        }
    }
}

#[async_trait]
impl ProcedureSource for MetadataServiceClient {
    async fn procedures_for_subject(&self, subject_id: &str) -> Result<Option<Value>> {
        self.get_procedures(subject_id).await
    }
}
