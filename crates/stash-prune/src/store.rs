//! Job persistence and create-or-update
//!
//! [`create_or_update`] does a single read and at most one write. Updates
//! carry the fetched `resourceVersion`, so a concurrent writer makes the
//! store reject ours with a conflict instead of being silently overwritten.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::debug;

use stash_common::Error;

/// What a create-or-update did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// The Job did not exist and was created
    Created,
    /// The Job existed and differed; it was replaced
    Updated,
    /// The Job already matched; nothing was written
    Unchanged,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Read and write access to batch Jobs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a Job, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Job>, Error>;

    /// Create a Job
    async fn create(&self, namespace: &str, job: &Job) -> Result<Job, Error>;

    /// Replace a Job; `job` must carry the `resourceVersion` it was read at
    async fn replace(&self, namespace: &str, name: &str, job: &Job) -> Result<Job, Error>;
}

/// [`JobStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeJobStore {
    client: Client,
}

impl KubeJobStore {
    /// Create a store wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl JobStore for KubeJobStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Job>, Error> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(Error::from_store)
    }

    async fn create(&self, namespace: &str, job: &Job) -> Result<Job, Error> {
        self.api(namespace)
            .create(&PostParams::default(), job)
            .await
            .map_err(Error::from_store)
    }

    async fn replace(&self, namespace: &str, name: &str, job: &Job) -> Result<Job, Error> {
        self.api(namespace)
            .replace(name, &PostParams::default(), job)
            .await
            .map_err(Error::from_store)
    }
}

/// Ensure the Job `namespace/name` matches what `mutate` makes of it
///
/// `mutate` receives the fetched Job, or a fresh draft carrying only name and
/// namespace. It must not change either.
pub async fn create_or_update<F>(
    store: &dyn JobStore,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<(Job, OperationResult), Error>
where
    F: FnOnce(&mut Job) -> Result<(), Error>,
{
    match store.get(namespace, name).await? {
        None => {
            let mut job = Job {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            mutate(&mut job)?;
            check_identity(&job, namespace, name)?;

            debug!(job = %name, namespace = %namespace, "creating job");
            let created = store.create(namespace, &job).await?;
            Ok((created, OperationResult::Created))
        }
        Some(current) => {
            let mut job = current.clone();
            mutate(&mut job)?;
            check_identity(&job, namespace, name)?;

            if job == current {
                return Ok((current, OperationResult::Unchanged));
            }

            debug!(job = %name, namespace = %namespace, "replacing job");
            let updated = store.replace(namespace, name, &job).await?;
            Ok((updated, OperationResult::Updated))
        }
    }
}

fn check_identity(job: &Job, namespace: &str, name: &str) -> Result<(), Error> {
    if job.metadata.name.as_deref() != Some(name)
        || job.metadata.namespace.as_deref() != Some(namespace)
    {
        return Err(Error::internal_with_context(
            "create_or_update",
            format!("mutate changed the identity of job {namespace}/{name}"),
        ));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryJobStore;
    use super::*;
    use kube::ResourceExt;

    fn label(value: &'static str) -> impl FnOnce(&mut Job) -> Result<(), Error> {
        move |job: &mut Job| {
            job.labels_mut()
                .insert("stash.dev/test".to_string(), value.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn creates_then_leaves_unchanged() {
        let store = MemoryJobStore::new();

        let (job, result) = create_or_update(&store, "backups", "prune-nightly", label("a"))
            .await
            .unwrap();
        assert_eq!(result, OperationResult::Created);
        assert_eq!(job.name_any(), "prune-nightly");
        assert_eq!(job.namespace().as_deref(), Some("backups"));

        let (_, result) = create_or_update(&store, "backups", "prune-nightly", label("a"))
            .await
            .unwrap();
        assert_eq!(result, OperationResult::Unchanged);
        assert_eq!(store.writes(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn differing_job_is_replaced() {
        let store = MemoryJobStore::new();
        create_or_update(&store, "backups", "prune-nightly", label("a"))
            .await
            .unwrap();

        let (job, result) = create_or_update(&store, "backups", "prune-nightly", label("b"))
            .await
            .unwrap();
        assert_eq!(result, OperationResult::Updated);
        assert_eq!(
            job.labels().get("stash.dev/test").map(String::as_str),
            Some("b")
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn server_defaults_are_applied_on_create() {
        let store = MemoryJobStore::with_server_defaults();
        let (job, _) = create_or_update(&store, "backups", "prune-nightly", |job: &mut Job| {
            let spec = job.spec.get_or_insert_with(Default::default);
            spec.template.spec = Some(k8s_openapi::api::core::v1::PodSpec {
                containers: vec![Default::default()],
                ..Default::default()
            });
            Ok(())
        })
        .await
        .unwrap();

        let pod = job.spec.as_ref().and_then(|s| s.template.spec.as_ref()).unwrap();
        assert_eq!(pod.dns_policy.as_deref(), Some("ClusterFirst"));
        assert_eq!(pod.containers[0].resources, Some(Default::default()));
        assert_eq!(store.job("backups", "prune-nightly"), Some(job));
    }

    #[tokio::test]
    async fn mutate_error_prevents_any_write() {
        let store = MemoryJobStore::new();
        let err = create_or_update(&store, "backups", "prune-nightly", |_| {
            Err(Error::configuration("bad"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn renaming_in_mutate_is_rejected() {
        let store = MemoryJobStore::new();
        let err = create_or_update(&store, "backups", "prune-nightly", |job| {
            job.metadata.name = Some("other".to_string());
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Internal { .. }));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn stale_resource_version_is_a_conflict() {
        let store = MemoryJobStore::new();
        create_or_update(&store, "backups", "prune-nightly", label("a"))
            .await
            .unwrap();
        let stale = store.job("backups", "prune-nightly").unwrap();

        store.bump("backups", "prune-nightly");

        let mut changed = stale.clone();
        changed
            .labels_mut()
            .insert("stash.dev/test".to_string(), "b".to_string());
        let err = store
            .replace("backups", "prune-nightly", &changed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let mut store = MockJobStore::new();
        store.expect_get().returning(|_, _| {
            Err(Error::from_store(kube::Error::Api(
                kube::error::ErrorResponse {
                    status: "Failure".to_string(),
                    message: "forbidden".to_string(),
                    reason: "Forbidden".to_string(),
                    code: 403,
                },
            )))
        });
        store.expect_create().never();

        let err = create_or_update(&store, "backups", "prune-nightly", label("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Kube { .. }));
    }
}
