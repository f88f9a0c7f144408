//! Metrics definitions for the reconciler.

use shared::metrics_defs::{MetricDef, MetricType};

pub const RECORDS_UPSERTED: MetricDef = MetricDef {
    name: "reconciler.records.upserted",
    metric_type: MetricType::Counter,
    description: "Number of records created or updated",
};

pub const UPSERT_FAILURES: MetricDef = MetricDef {
    name: "reconciler.records.upsert_failed",
    metric_type: MetricType::Counter,
    description: "Number of record upserts the server did not accept",
};

pub const RECORDS_DELETED: MetricDef = MetricDef {
    name: "reconciler.records.deleted",
    metric_type: MetricType::Counter,
    description: "Number of stale records deleted",
};

pub const DELETE_FAILURES: MetricDef = MetricDef {
    name: "reconciler.records.delete_failed",
    metric_type: MetricType::Counter,
    description: "Number of record deletions the server did not accept",
};

pub const SYNC_SKIPPED: MetricDef = MetricDef {
    name: "reconciler.sync.skipped",
    metric_type: MetricType::Counter,
    description: "Number of runs that found no new upstream data",
};

pub const HASHES_SELECTED: MetricDef = MetricDef {
    name: "reconciler.sync.hashes",
    metric_type: MetricType::Histogram,
    description: "Number of hashes in the target state",
};

pub const SYNC_DURATION: MetricDef = MetricDef {
    name: "reconciler.sync.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a sync in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    RECORDS_UPSERTED,
    UPSERT_FAILURES,
    RECORDS_DELETED,
    DELETE_FAILURES,
    SYNC_SKIPPED,
    HASHES_SELECTED,
    SYNC_DURATION,
];
