//! Metrics definitions for the remote settings client.

use shared::metrics_defs::{MetricDef, MetricType};

pub const MUTATION_SUCCEEDED: MetricDef = MetricDef {
    name: "remote_settings.mutation.succeeded",
    metric_type: MetricType::Counter,
    description: "Number of mutations the server accepted",
};

pub const MUTATION_FAILED: MetricDef = MetricDef {
    name: "remote_settings.mutation.failed",
    metric_type: MetricType::Counter,
    description: "Number of mutations answered with an unexpected status",
};

pub const MUTATION_DRY_RUN: MetricDef = MetricDef {
    name: "remote_settings.mutation.dry_run",
    metric_type: MetricType::Counter,
    description: "Number of mutations skipped because dry-run mode is enabled",
};

pub const RECORDS_FETCHED: MetricDef = MetricDef {
    name: "remote_settings.records.fetched",
    metric_type: MetricType::Gauge,
    description: "Number of records present in the collection before syncing",
};

pub const ALL_METRICS: &[MetricDef] = &[
    MUTATION_SUCCEEDED,
    MUTATION_FAILED,
    MUTATION_DRY_RUN,
    RECORDS_FETCHED,
];
