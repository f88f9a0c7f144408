use remote_settings::ClientError;
use signatures::SourceError;

/// Errors that abort a run. Mutations applied before the error stay applied.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("remote collection error: {0}")]
    Client(#[from] ClientError),

    #[error("target state error: {0}")]
    Source(#[from] SourceError),

    #[error("bulk deletion of records failed")]
    TeardownFailed,

    #[error("mutation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
