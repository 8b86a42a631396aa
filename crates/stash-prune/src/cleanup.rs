//! Hand-off to the history cleaner
//!
//! Which finished Jobs to keep is the cleaner's business; the executor only
//! tells it when a new run was started and which request must be spared.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use tracing::warn;

use stash_common::crd::Prune;
use stash_common::{Error, JobKind};

/// Removes old runs of a job kind in a namespace
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistoryCleaner: Send + Sync {
    /// Clean up old `kind` runs in `namespace`, never touching `exclude`
    async fn cleanup(
        &self,
        kind: JobKind,
        namespace: &str,
        exclude: &ObjectRef<Prune>,
    ) -> Result<(), Error>;
}

/// Ask the cleaner to trim prune history around `prune`
///
/// Failures are logged and swallowed; the run itself already succeeded.
pub async fn cleanup_old_prunes(cleaner: &dyn HistoryCleaner, prune: &Prune) {
    let namespace = prune.namespace().unwrap_or_default();
    let exclude = ObjectRef::from_obj(prune);

    if let Err(e) = cleaner.cleanup(JobKind::Prune, &namespace, &exclude).await {
        warn!(
            prune = %prune.name_any(),
            namespace = %namespace,
            error = %e,
            "could not clean up old prunes"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_common::crd::PruneSpec;

    fn prune() -> Prune {
        let mut prune = Prune::new("nightly", PruneSpec::default());
        prune.metadata.namespace = Some("backups".to_string());
        prune
    }

    #[tokio::test]
    async fn passes_kind_namespace_and_request() {
        let mut cleaner = MockHistoryCleaner::new();
        cleaner
            .expect_cleanup()
            .withf(|kind, namespace, exclude| {
                *kind == JobKind::Prune
                    && namespace == "backups"
                    && exclude.name == "nightly"
                    && exclude.namespace.as_deref() == Some("backups")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        cleanup_old_prunes(&cleaner, &prune()).await;
    }

    #[tokio::test]
    async fn cleaner_errors_are_swallowed() {
        let mut cleaner = MockHistoryCleaner::new();
        cleaner
            .expect_cleanup()
            .times(1)
            .returning(|_, _, _| Err(Error::internal("list failed")));

        cleanup_old_prunes(&cleaner, &prune()).await;
    }
}
