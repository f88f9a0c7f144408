pub mod auth;
pub mod client;
pub mod dry_run;
pub mod metrics_defs;
pub mod mutation;
pub mod types;

pub use client::{ClientError, CollectionConfig, RemoteSettingsClient};
pub use dry_run::{DryRunnable, Execute};
pub use mutation::Mutation;
pub use types::{RemoteRecord, Snapshot};
