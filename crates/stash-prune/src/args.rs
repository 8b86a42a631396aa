//! Job identity and container arguments
//!
//! The argument layout is consumed by the restic wrapper inside the job
//! container; token order matters:
//! `-varDir <dir> -prune [--tag <t>]... [TLS flags]`

use kube::ResourceExt;

use stash_common::crd::Prune;
use stash_common::{Error, JobKind, OperatorConfig};

/// Deterministic Job name: `<kind>-<request name>`
pub fn job_name(kind: JobKind, prune: &Prune) -> Result<String, Error> {
    let name = prune.name_any();
    if name.is_empty() {
        return Err(Error::internal_with_context(
            "identity",
            "request has no name",
        ));
    }
    Ok(format!("{}-{}", kind, name))
}

/// One `--tag <tag>` pair per tag, in input order
pub fn tag_args(tags: &[String]) -> Vec<String> {
    tags.iter()
        .flat_map(|tag| ["--tag".to_string(), tag.clone()])
        .collect()
}

/// Full argument vector for the prune container
pub fn build_args(prune: &Prune, config: &OperatorConfig) -> Vec<String> {
    let mut args = vec![
        "-varDir".to_string(),
        config.pod_var_dir.clone(),
        "-prune".to_string(),
    ];

    if !prune.spec.retention.tags.is_empty() {
        args.extend(tag_args(&prune.spec.retention.tags));
    }

    if let Some(tls) = prune
        .spec
        .backend
        .as_ref()
        .and_then(|b| b.tls_options.as_ref())
    {
        args.extend(tls.args());
    }

    args
}
