//! Metrics definitions for the signature sources.

use shared::metrics_defs::{MetricDef, MetricType};

pub const ARCHIVE_NOT_MODIFIED: MetricDef = MetricDef {
    name: "signatures.archive.not_modified",
    metric_type: MetricType::Counter,
    description: "Number of conditional archive fetches answered with 304",
};

pub const ARCHIVE_BYTES: MetricDef = MetricDef {
    name: "signatures.archive.bytes",
    metric_type: MetricType::Histogram,
    description: "Size of the downloaded crash id archive in bytes",
};

pub const ROWS_LOADED: MetricDef = MetricDef {
    name: "signatures.rows.loaded",
    metric_type: MetricType::Histogram,
    description: "Number of signature rows read from an exported query result",
};

pub const ALL_METRICS: &[MetricDef] = &[ARCHIVE_NOT_MODIFIED, ARCHIVE_BYTES, ROWS_LOADED];
