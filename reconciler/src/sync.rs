use crate::apply::{SyncSummary, apply_plan};
use crate::errors::SyncError;
use crate::finalize::{Environment, finalize};
use crate::gate::should_proceed;
use crate::metrics_defs::{HASHES_SELECTED, SYNC_DURATION, SYNC_SKIPPED};
use crate::plan::compute_plan;
use remote_settings::RemoteSettingsClient;
use shared::marker::Marker;
use shared::{counter, histogram};
use signatures::SignatureSource;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub force_update: bool,
    pub environment: Option<Environment>,
    pub max_in_flight: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            force_update: false,
            environment: None,
            max_in_flight: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing upstream changed since the collection was last modified.
    UpToDate { marker: Option<Marker> },
    Synced(SyncSummary),
}

/// One reconciliation run against the collection.
///
/// The collection is read first, since its modification time feeds the
/// freshness check. The target state is only built when that check passes.
pub async fn sync(
    client: Arc<RemoteSettingsClient>,
    source: &dyn SignatureSource,
    options: &SyncOptions,
) -> Result<SyncOutcome, SyncError> {
    let start = Instant::now();

    let snapshot = client.fetch_all().await?;
    tracing::info!(
        records = snapshot.records.len(),
        marker = snapshot.marker.as_ref().map(Marker::as_header_value),
        "Fetched existing records"
    );

    if !should_proceed(source, snapshot.marker.as_ref(), options.force_update).await? {
        let marker = snapshot.marker;
        tracing::info!(
            "No changes necessary: crash ids not modified since last update ({})",
            marker.as_ref().map(Marker::as_header_value).unwrap_or_default()
        );
        counter!(SYNC_SKIPPED).increment(1);
        histogram!(SYNC_DURATION).record(start.elapsed().as_secs_f64());
        return Ok(SyncOutcome::UpToDate { marker });
    }

    tracing::info!(source = source.name(), "Building target state");
    let groups = source.load().await?;
    let plan = compute_plan(groups.iter(), &snapshot.records)?;

    if plan.upserts.is_empty() && !snapshot.records.is_empty() {
        tracing::warn!(
            records = snapshot.records.len(),
            "Target state is empty, every record in the collection will be deleted"
        );
    }

    tracing::info!("Selected {} hashes", plan.total_hashes());
    tracing::debug!(
        unchanged = plan.unchanged(&snapshot.records),
        "Records already up to date"
    );
    histogram!(HASHES_SELECTED).record(plan.total_hashes() as f64);

    let summary = apply_plan(Arc::clone(&client), plan, options.max_in_flight).await?;
    tracing::info!(
        upserted = summary.upserted,
        upsert_failures = summary.upsert_failures,
        deleted = summary.deleted,
        delete_failures = summary.delete_failures,
        "Crash id lists synced"
    );

    finalize(&client, options.environment).await;

    histogram!(SYNC_DURATION).record(start.elapsed().as_secs_f64());
    Ok(SyncOutcome::Synced(summary))
}

/// Removes every record from the collection, then publishes the change.
pub async fn purge(
    client: &RemoteSettingsClient,
    environment: Option<Environment>,
) -> Result<(), SyncError> {
    if !client.delete_all().await? {
        return Err(SyncError::TeardownFailed);
    }
    tracing::info!("Deleted all records from {}", client.collection_endpoint());

    finalize(client, environment).await;
    Ok(())
}
