//! Base Job template
//!
//! The base template owns the Job's shape: labels, owner reference, backoff
//! and restart policy, the requested service account, and the single job
//! container. It resets the parts the
//! mutator appends to (env, envFrom, mounts, pod volumes) so applying it to a
//! Job fetched from the API server starts from the same point as a fresh
//! draft. Fields the server defaulted are left untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use stash_common::crd::Prune;
use stash_common::{
    Error, JobKind, OperatorConfig, JOB_TYPE_LABEL, MANAGED_LABEL, OWNED_BY_LABEL,
};

/// Restart policy of job pods
pub const RESTART_POLICY: &str = "OnFailure";

/// Applies the base template of a job kind onto a Job draft
#[cfg_attr(test, automock)]
pub trait JobTemplateBuilder: Send + Sync {
    /// Shape `job` for `kind`, owned by `prune`
    fn apply_base(&self, job: &mut Job, kind: JobKind, prune: &Prune) -> Result<(), Error>;
}

/// Template built from the operator configuration
#[derive(Clone, Debug)]
pub struct BaseJobBuilder {
    config: Arc<OperatorConfig>,
}

impl BaseJobBuilder {
    /// Create a builder over `config`
    pub fn new(config: Arc<OperatorConfig>) -> Self {
        Self { config }
    }
}

/// Labels every Job of `kind` created for `owner` carries
pub fn base_labels(kind: JobKind, owner: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_LABEL.to_string(), "true".to_string()),
        (JOB_TYPE_LABEL.to_string(), kind.to_string()),
        (OWNED_BY_LABEL.to_string(), owner.to_string()),
    ])
}

impl JobTemplateBuilder for BaseJobBuilder {
    fn apply_base(&self, job: &mut Job, kind: JobKind, prune: &Prune) -> Result<(), Error> {
        let labels = base_labels(kind, &prune.name_any());

        job.labels_mut().extend(labels.clone());
        // Only objects read from the API server have a uid to own by
        if let Some(owner) = prune.controller_owner_ref(&()) {
            job.metadata.owner_references = Some(vec![owner]);
        }

        let spec = job.spec.get_or_insert_with(JobSpec::default);
        spec.backoff_limit = Some(self.config.backoff_limit);

        spec.template
            .metadata
            .get_or_insert_with(ObjectMeta::default)
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels);

        let pod = spec.template.spec.get_or_insert_with(PodSpec::default);
        pod.restart_policy = Some(RESTART_POLICY.to_string());
        pod.service_account_name = prune.spec.service_account_name.clone();
        pod.volumes = None;

        pod.containers.truncate(1);
        if pod.containers.is_empty() {
            pod.containers.push(Container::default());
        }
        let container = &mut pod.containers[0];
        container.name = kind.to_string();
        container.image = Some(self.config.image.clone());
        container.command = Some(self.config.command.clone());
        // The API server stores absent resources as `{}`
        container.resources = Some(prune.spec.resources.clone().unwrap_or_default());
        container.env = None;
        container.env_from = None;
        container.volume_mounts = None;

        Ok(())
    }
}
