//! Applying a plan to the collection.
//!
//! Mutations within a phase may overlap, bounded by `max_in_flight`. The
//! delete phase starts only once every upsert has completed, so a record is
//! never removed while the records replacing it are still pending.
use crate::errors::SyncError;
use crate::metrics_defs::{DELETE_FAILURES, RECORDS_DELETED, RECORDS_UPSERTED, UPSERT_FAILURES};
use crate::plan::ReconciliationPlan;
use remote_settings::{ClientError, RemoteSettingsClient};
use shared::counter;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub upserted: usize,
    pub upsert_failures: usize,
    pub deleted: usize,
    pub delete_failures: usize,
    pub hashes: usize,
}

#[derive(Default)]
struct PhaseTally {
    succeeded: usize,
    failed: usize,
}

/// Runs `op` on every item, at most `max_in_flight` at a time, starting them
/// in order.
///
/// Individual `Ok(false)` results are counted and the phase carries on. The
/// first `Err` stops the phase; dropping the set aborts anything still
/// running.
async fn run_phase<T, F, Fut>(
    items: Vec<T>,
    max_in_flight: usize,
    op: F,
) -> Result<PhaseTally, SyncError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<bool, ClientError>> + Send + 'static,
{
    let max_in_flight = max_in_flight.max(1);
    let mut join_set = JoinSet::new();
    let mut tally = PhaseTally::default();

    let mut record = |result: Result<Result<bool, ClientError>, JoinError>| -> Result<(), SyncError> {
        match result?? {
            true => tally.succeeded += 1,
            false => tally.failed += 1,
        }
        Ok(())
    };

    for item in items {
        while join_set.len() >= max_in_flight {
            if let Some(result) = join_set.join_next().await {
                record(result)?;
            }
        }
        join_set.spawn(op(item));
    }

    while let Some(result) = join_set.join_next().await {
        record(result)?;
    }

    Ok(tally)
}

/// Applies `plan`: all upserts, then all deletes.
pub async fn apply_plan(
    client: Arc<RemoteSettingsClient>,
    plan: ReconciliationPlan,
    max_in_flight: usize,
) -> Result<SyncSummary, SyncError> {
    let hashes = plan.total_hashes();
    let ReconciliationPlan { upserts, deletes } = plan;

    tracing::info!(
        upserts = upserts.len(),
        deletes = deletes.len(),
        max_in_flight,
        "Applying plan"
    );

    let upserted = run_phase(upserts, max_in_flight, |upsert| {
        let client = Arc::clone(&client);
        async move {
            client
                .upsert(&upsert.id, &upsert.description, &upsert.hashes)
                .await
        }
    })
    .await?;

    counter!(RECORDS_UPSERTED).increment(upserted.succeeded as u64);
    counter!(UPSERT_FAILURES).increment(upserted.failed as u64);

    let deleted = run_phase(deletes, max_in_flight, |record| {
        let client = Arc::clone(&client);
        async move { client.delete(&record).await }
    })
    .await?;

    counter!(RECORDS_DELETED).increment(deleted.succeeded as u64);
    counter!(DELETE_FAILURES).increment(deleted.failed as u64);

    Ok(SyncSummary {
        upserted: upserted.succeeded,
        upsert_failures: upserted.failed,
        deleted: deleted.succeeded,
        delete_failures: deleted.failed,
        hashes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Upsert;
    use remote_settings::{CollectionConfig, RemoteRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RECORDS_PATH: &str = "/v1/buckets/main-workspace/collections/crash-reports-ondemand/records";

    fn client_for(server: &MockServer, dry_run: bool) -> Arc<RemoteSettingsClient> {
        let url = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
        let mut config = CollectionConfig::new(url, "Bearer token");
        config.dry_run = dry_run;
        Arc::new(RemoteSettingsClient::new(&config).unwrap())
    }

    fn upsert(id: &str, hashes: &[&str]) -> Upsert {
        Upsert {
            id: id.into(),
            description: format!("gpu (win nightly): {id}"),
            hashes: hashes.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_upserts_complete_before_deletes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(format!("^{RECORDS_PATH}/id-00[0-2]$")))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(20)))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex(format!("^{RECORDS_PATH}/id-00[3-4]$")))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let plan = ReconciliationPlan {
            upserts: vec![upsert("id-000", &["a"]), upsert("id-001", &["b", "c"]), upsert("id-002", &[])],
            deletes: vec![
                RemoteRecord::new("id-003", "old", vec![]),
                RemoteRecord::new("id-004", "old", vec![]),
            ],
        };

        let summary = apply_plan(client_for(&server, false), plan, 4).await.unwrap();
        assert_eq!(
            summary,
            SyncSummary {
                upserted: 3,
                upsert_failures: 0,
                deleted: 2,
                delete_failures: 0,
                hashes: 3,
            }
        );

        let requests = server.received_requests().await.unwrap();
        let methods: Vec<_> = requests.iter().map(|r| r.method.as_str().to_string()).collect();
        let last_put = methods.iter().rposition(|m| m == "PUT").unwrap();
        let first_delete = methods.iter().position(|m| m == "DELETE").unwrap();
        assert!(last_put < first_delete, "delete issued before upserts finished: {methods:?}");
    }

    #[tokio::test]
    async fn test_sequential_apply_keeps_plan_order() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let plan = ReconciliationPlan {
            upserts: (0..5).map(|i| upsert(&format!("id-{i:03}"), &["h"])).collect(),
            deletes: vec![],
        };

        apply_plan(client_for(&server, false), plan, 1).await.unwrap();

        let paths: Vec<_> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().rsplit('/').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(paths, vec!["id-000", "id-001", "id-002", "id-003", "id-004"]);
    }

    #[tokio::test]
    async fn test_individual_failures_do_not_abort() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("{RECORDS_PATH}/id-000")))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("{RECORDS_PATH}/id-001")))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{RECORDS_PATH}/id-002")))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let plan = ReconciliationPlan {
            upserts: vec![upsert("id-000", &["a"]), upsert("id-001", &["b"])],
            deletes: vec![RemoteRecord::new("id-002", "old", vec![])],
        };

        let summary = apply_plan(client_for(&server, false), plan, 1).await.unwrap();
        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.upsert_failures, 1);
        assert_eq!(summary.deleted, 0);
        assert_eq!(summary.delete_failures, 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_fatal() {
        // Nothing listens on this port.
        let url = Url::parse("http://127.0.0.1:9/v1/").unwrap();
        let client = Arc::new(RemoteSettingsClient::new(&CollectionConfig::new(url, "Bearer t")).unwrap());

        let plan = ReconciliationPlan {
            upserts: vec![upsert("id-000", &["a"])],
            deletes: vec![RemoteRecord::new("id-001", "old", vec![])],
        };

        let result = apply_plan(client, plan, 1).await;
        assert!(matches!(result, Err(SyncError::Client(ClientError::Request(_)))));
    }

    #[tokio::test]
    async fn test_in_flight_limit() {
        let limit = 2;
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tally = run_phase((0..8).collect(), limit, |_: usize| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(true)
            }
        })
        .await
        .unwrap();

        assert_eq!(tally.succeeded, 8);
        assert!(peak.load(Ordering::SeqCst) <= limit);
    }

    #[tokio::test]
    async fn test_dry_run_apply_sends_nothing() {
        let server = MockServer::start().await;

        let plan = ReconciliationPlan {
            upserts: vec![upsert("id-000", &["a", "b"])],
            deletes: vec![RemoteRecord::new("id-001", "old", vec![])],
        };

        let summary = apply_plan(client_for(&server, true), plan, 1).await.unwrap();
        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.hashes, 2);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
