//! Dry-run decorator for collection mutations.
//!
//! Any [`Execute`] implementation can be wrapped in [`DryRunnable`]. The
//! wrapper logs what is about to happen and either delegates to the inner
//! executor or, in dry-run mode, reports success without touching it.
use crate::client::ClientError;
use crate::metrics_defs::MUTATION_DRY_RUN;
use crate::mutation::Mutation;
use async_trait::async_trait;
use shared::counter;

#[async_trait]
pub trait Execute: Send + Sync {
    /// Applies the mutation. `Ok(false)` means the server answered with a
    /// recognized status outside the accepted set.
    async fn execute(&self, mutation: &Mutation) -> Result<bool, ClientError>;
}

pub struct DryRunnable<E> {
    inner: E,
    dry_run: bool,
}

impl<E> DryRunnable<E> {
    pub fn new(inner: E, dry_run: bool) -> Self {
        DryRunnable { inner, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[async_trait]
impl<E: Execute> Execute for DryRunnable<E> {
    async fn execute(&self, mutation: &Mutation) -> Result<bool, ClientError> {
        if self.dry_run {
            tracing::info!("[DRY_RUN] {mutation}");
            counter!(MUTATION_DRY_RUN, "kind" => mutation.kind()).increment(1);
            return Ok(true);
        }

        tracing::info!("{mutation}");
        self.inner.execute(mutation).await
    }
}
