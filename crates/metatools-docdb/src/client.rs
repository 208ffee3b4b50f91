use async_trait::async_trait;
use metatools_core::{DocumentStore, MetaError, Result};
use serde_json::{json, Value};
use tracing::debug;

/// Client for one database/collection of the DocDB REST API.
///
/// Constructed explicitly and passed into handlers; two instances (v1 and
/// v2 databases) usually share the same underlying `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct DocDbClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
    collection: String,
}

impl DocDbClient {
    pub fn new(host: &str, database: &str, collection: &str) -> Self {
        Self::with_http(reqwest::Client::new(), host, database, collection)
    }

    pub fn with_http(
        http: reqwest::Client,
        host: &str,
        database: &str,
        collection: &str,
    ) -> Self {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host)
        };
        Self {
            http,
            base_url,
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/v1/{}/{}/{}",
            self.base_url, self.database, self.collection, operation
        )
    }

    async fn post_for_records(&self, url: &str, body: Value) -> Result<Vec<Value>> {
        debug!(%url, "docdb request");
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MetaError::Upstream(format!("docdb request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetaError::Upstream(format!(
                "docdb returned {} for {}",
                status, url
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| MetaError::Upstream(format!("docdb returned malformed JSON: {}", e)))?;

        match payload {
            Value::Array(records) => Ok(records),
            // some deployments wrap the records
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(records)) => Ok(records),
                _ => Err(MetaError::Upstream(
                    "docdb response was not a record list".to_string(),
                )),
            },
            _ => Err(MetaError::Upstream(
                "docdb response was not a record list".to_string(),
            )),
        }
    }
}

#[async_trait]
impl DocumentStore for DocDbClient {
    async fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Value>> {
        self.post_for_records(&self.endpoint("aggregate"), json!({"pipeline": pipeline}))
            .await
    }

    async fn retrieve(&self, filter: &Value, limit: usize) -> Result<Vec<Value>> {
        self.post_for_records(
            &self.endpoint("retrieve"),
            json!({"filter_query": filter, "limit": limit}),
        )
        .await
    }
}
