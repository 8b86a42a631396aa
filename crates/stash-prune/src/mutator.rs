//! Composes a prune Job onto a draft
//!
//! All derived values are computed before the draft is touched, so a
//! malformed request leaves the draft as it was.

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use kube::ResourceExt;

use stash_common::crd::Prune;
use stash_common::{Error, JobKind, OperatorConfig, EXCLUSIVE_LABEL};

use crate::args::build_args;
use crate::retention::{retention_env, DefaultEnvSource};
use crate::template::JobTemplateBuilder;
use crate::tls::{tls_volume_mounts, tls_volumes};

/// Turn `job` into the prune Job for `prune`
///
/// Applying this to its own output yields the same Job.
pub fn mutate_job(
    job: &mut Job,
    prune: &Prune,
    config: &OperatorConfig,
    builder: &dyn JobTemplateBuilder,
    defaults: &dyn DefaultEnvSource,
) -> Result<(), Error> {
    let env = retention_env(prune, config, defaults)?;
    let mounts = tls_volume_mounts(prune.spec.backend.as_ref(), &config.pod_var_dir);
    let volumes = tls_volumes(prune.spec.volumes.as_deref());
    let args = build_args(prune, config);

    builder.apply_base(job, JobKind::Prune, prune)?;

    job.labels_mut()
        .insert(EXCLUSIVE_LABEL.to_string(), "true".to_string());

    let pod = pod_spec_mut(job)?;
    pod.volumes.get_or_insert_with(Vec::new).extend(volumes);

    if pod.service_account_name.as_deref().unwrap_or_default().is_empty() {
        pod.service_account_name = Some(config.service_account.clone());
    }

    let container = first_container_mut(pod)?;
    container.env.get_or_insert_with(Vec::new).extend(env);
    if let Some(env_from) = &prune.spec.env_from {
        container
            .env_from
            .get_or_insert_with(Vec::new)
            .extend(env_from.iter().cloned());
    }
    container
        .volume_mounts
        .get_or_insert_with(Vec::new)
        .extend(mounts);
    container.args = Some(args);

    Ok(())
}

fn pod_spec_mut(job: &mut Job) -> Result<&mut PodSpec, Error> {
    job.spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
        .ok_or_else(|| Error::internal_with_context("mutator", "template produced no pod spec"))
}

fn first_container_mut(pod: &mut PodSpec) -> Result<&mut Container, Error> {
    pod.containers
        .first_mut()
        .ok_or_else(|| Error::internal_with_context("mutator", "template produced no container"))
}
