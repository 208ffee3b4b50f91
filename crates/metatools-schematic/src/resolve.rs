//! Three-stage procedures lookup for a subject: the v2 document database,
//! then the v1 database, then the (slow, cached) metadata service. A stage
//! error is logged and the next stage tried; only a miss everywhere is a
//! final `None`.

use metatools_core::{DocumentStore, ProcedureSource, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

pub struct ProcedureResolver<'a> {
    store_v2: &'a dyn DocumentStore,
    store_v1: &'a dyn DocumentStore,
    service: &'a dyn ProcedureSource,
}

impl<'a> ProcedureResolver<'a> {
    pub fn new(
        store_v2: &'a dyn DocumentStore,
        store_v1: &'a dyn DocumentStore,
        service: &'a dyn ProcedureSource,
    ) -> Self {
        Self {
            store_v2,
            store_v1,
            service,
        }
    }

    pub async fn procedures_for_subject(&self, subject_id: &str) -> Result<Option<Value>> {
        for (stage, store) in [(1, self.store_v2), (2, self.store_v1)] {
            match query_store(store, subject_id).await {
                Ok(Some(procedures)) => {
                    info!(subject_id, stage, "found procedures record in document store");
                    return Ok(Some(procedures));
                }
                Ok(None) => {}
                Err(e) => warn!(subject_id, stage, error = %e, "document store stage failed"),
            }
        }

        // stage 3: the metadata service knows subjects that have not run an
        // experiment yet
        match self.service.procedures_for_subject(subject_id).await {
            Ok(Some(procedures)) => {
                info!(subject_id, stage = 3, "found procedures via metadata service");
                Ok(Some(procedures))
            }
            Ok(None) => {
                info!(subject_id, "no procedures record found in any source");
                Ok(None)
            }
            Err(e) => {
                warn!(subject_id, stage = 3, error = %e, "metadata service stage failed");
                Ok(None)
            }
        }
    }
}

async fn query_store(store: &dyn DocumentStore, subject_id: &str) -> Result<Option<Value>> {
    let pipeline = vec![
        json!({"$match": {"subject.subject_id": subject_id}}),
        json!({"$project": {"procedures": 1, "subject.subject_id": 1}}),
        json!({"$limit": 1}),
    ];
    let records = store.aggregate(&pipeline).await?;
    Ok(records
        .into_iter()
        .next()
        .and_then(|mut record| match record.get_mut("procedures") {
            Some(procedures) if !procedures.is_null() => Some(procedures.take()),
            _ => None,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubStore {
        response: Result<Vec<Value>>,
    }

    impl StubStore {
        fn with(records: Vec<Value>) -> Self {
            Self {
                response: Ok(records),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(metatools_core::MetaError::Upstream("boom".to_string())),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for StubStore {
        async fn aggregate(&self, _pipeline: &[Value]) -> Result<Vec<Value>> {
            match &self.response {
                Ok(records) => Ok(records.clone()),
                Err(_) => Err(metatools_core::MetaError::Upstream("boom".to_string())),
            }
        }

        async fn retrieve(&self, _filter: &Value, _limit: usize) -> Result<Vec<Value>> {
            Ok(vec![])
        }
    }

    struct StubService {
        procedures: Option<Value>,
    }

    #[async_trait]
    impl ProcedureSource for StubService {
        async fn procedures_for_subject(&self, _subject_id: &str) -> Result<Option<Value>> {
            Ok(self.procedures.clone())
        }
    }

    #[tokio::test]
    async fn v2_store_wins_when_it_has_a_record() {
        let v2 = StubStore::with(vec![json!({"procedures": {"from": "v2"}})]);
        let v1 = StubStore::with(vec![json!({"procedures": {"from": "v1"}})]);
        let service = StubService {
            procedures: Some(json!({"from": "service"})),
        };
        let resolver = ProcedureResolver::new(&v2, &v1, &service);

        let found = resolver.procedures_for_subject("767891").await.unwrap();
        assert_eq!(found, Some(json!({"from": "v2"})));
    }

    #[tokio::test]
    async fn falls_back_to_v1_then_service() {
        let v2 = StubStore::with(vec![]);
        let v1 = StubStore::with(vec![json!({"procedures": {"from": "v1"}})]);
        let service = StubService {
            procedures: Some(json!({"from": "service"})),
        };
        let resolver = ProcedureResolver::new(&v2, &v1, &service);
        assert_eq!(
            resolver.procedures_for_subject("s").await.unwrap(),
            Some(json!({"from": "v1"}))
        );

        let v2 = StubStore::with(vec![]);
        let v1 = StubStore::with(vec![]);
        let resolver = ProcedureResolver::new(&v2, &v1, &service);
        assert_eq!(
            resolver.procedures_for_subject("s").await.unwrap(),
            Some(json!({"from": "service"}))
        );
    }

    #[tokio::test]
    async fn stage_errors_do_not_abort_the_search() {
        let v2 = StubStore::failing();
        let v1 = StubStore::with(vec![json!({"procedures": {"from": "v1"}})]);
        let service = StubService { procedures: None };
        let resolver = ProcedureResolver::new(&v2, &v1, &service);

        assert_eq!(
            resolver.procedures_for_subject("s").await.unwrap(),
            Some(json!({"from": "v1"}))
        );
    }

    #[tokio::test]
    async fn record_without_procedures_counts_as_miss() {
        let v2 = StubStore::with(vec![json!({"subject": {"subject_id": "s"}})]);
        let v1 = StubStore::with(vec![json!({"procedures": null})]);
        let service = StubService { procedures: None };
        let resolver = ProcedureResolver::new(&v2, &v1, &service);

        assert_eq!(resolver.procedures_for_subject("s").await.unwrap(), None);
    }
}
