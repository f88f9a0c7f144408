pub mod marker;
pub mod metrics_defs;
