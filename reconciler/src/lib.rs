pub mod apply;
pub mod errors;
pub mod finalize;
pub mod gate;
pub mod metrics_defs;
pub mod plan;
pub mod sync;

pub use apply::{SyncSummary, apply_plan};
pub use errors::SyncError;
pub use finalize::{Environment, UnknownEnvironment, finalize};
pub use gate::should_proceed;
pub use plan::{ReconciliationPlan, Upsert, compute_plan};
pub use sync::{SyncOptions, SyncOutcome, purge, sync};
