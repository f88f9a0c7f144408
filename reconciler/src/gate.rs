use shared::marker::Marker;
use signatures::{SignatureSource, SourceError};

/// Decides whether a run has anything to do.
///
/// Forced runs and first runs always proceed without asking the source.
/// Otherwise the source's freshness check decides. This must be called before
/// the source builds the target state.
pub async fn should_proceed<S>(
    source: &S,
    last_applied: Option<&Marker>,
    force_update: bool,
) -> Result<bool, SourceError>
where
    S: SignatureSource + ?Sized,
{
    if force_update {
        tracing::debug!("Update forced, skipping freshness check");
        return Ok(true);
    }

    let Some(marker) = last_applied else {
        tracing::debug!("Collection has no modification time, treating as first run");
        return Ok(true);
    };

    let fresh = source.new_data_since(marker).await?;
    tracing::debug!(source = source.name(), %marker, fresh, "Checked upstream freshness");
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signatures::{SignatureGroups, StaticGroups};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        fresh: bool,
        checks: AtomicUsize,
        loads: AtomicUsize,
    }

    impl FakeSource {
        fn new(fresh: bool) -> Self {
            FakeSource {
                fresh,
                checks: AtomicUsize::new(0),
                loads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SignatureSource for FakeSource {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn new_data_since(&self, _marker: &Marker) -> Result<bool, SourceError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.fresh)
        }

        async fn load(&self) -> Result<Box<dyn SignatureGroups>, SourceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StaticGroups::default()))
        }
    }

    fn marker() -> Marker {
        Marker::parse("Wed, 21 Oct 2015 07:28:00 GMT").unwrap()
    }

    #[tokio::test]
    async fn test_force_update_skips_check() {
        let source = FakeSource::new(false);
        assert!(should_proceed(&source, Some(&marker()), true).await.unwrap());
        assert_eq!(source.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_run_proceeds() {
        let source = FakeSource::new(false);
        assert!(should_proceed(&source, None, false).await.unwrap());
        assert_eq!(source.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_defers_to_source() {
        let stale = FakeSource::new(false);
        assert!(!should_proceed(&stale, Some(&marker()), false).await.unwrap());
        assert_eq!(stale.checks.load(Ordering::SeqCst), 1);

        let fresh = FakeSource::new(true);
        assert!(should_proceed(&fresh, Some(&marker()), false).await.unwrap());

        // The gate never builds the target state.
        assert_eq!(stale.loads.load(Ordering::SeqCst), 0);
        assert_eq!(fresh.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_works_with_trait_objects() {
        let source: Box<dyn SignatureSource> = Box::new(FakeSource::new(true));
        assert!(should_proceed(source.as_ref(), Some(&marker()), false).await.unwrap());
    }
}
