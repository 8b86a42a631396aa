//! Work-dir and TLS material mounts
//!
//! Every job container gets the `stash-dir` mount at the pod var dir, backed
//! by an emptyDir volume. Backends may add mounts carrying certificates; the
//! volumes they reference come from the request's `volumes`.

use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, Volume, VolumeMount};

use stash_common::crd::{Backend, RunnableVolumeSpec};

/// Name of the work-dir volume and mount
pub const WORK_DIR_VOLUME: &str = "stash-dir";

/// Mode the API server fills in for Secret and ConfigMap volumes (0644)
pub const DEFAULT_VOLUME_MODE: i32 = 0o644;

/// Container mounts: backend mounts in order, then the work-dir mount
pub fn tls_volume_mounts(backend: Option<&Backend>, pod_var_dir: &str) -> Vec<VolumeMount> {
    let mut mounts: Vec<VolumeMount> = backend
        .and_then(|b| b.volume_mounts.clone())
        .unwrap_or_default();

    mounts.push(VolumeMount {
        name: WORK_DIR_VOLUME.to_string(),
        mount_path: pod_var_dir.to_string(),
        ..Default::default()
    });
    mounts
}

/// Pod volumes: the work-dir emptyDir, then the request volumes
pub fn tls_volumes(volumes: Option<&[RunnableVolumeSpec]>) -> Vec<Volume> {
    let mut out = vec![Volume {
        name: WORK_DIR_VOLUME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }];

    out.extend(volumes.unwrap_or_default().iter().map(to_pod_volume));
    out
}

fn to_pod_volume(spec: &RunnableVolumeSpec) -> Volume {
    let secret = spec.secret.clone().map(|mut s| {
        s.default_mode.get_or_insert(DEFAULT_VOLUME_MODE);
        s
    });
    let config_map = spec.config_map.clone().map(|mut c| {
        c.default_mode.get_or_insert(DEFAULT_VOLUME_MODE);
        c
    });

    Volume {
        name: spec.name.clone(),
        persistent_volume_claim: spec.persistent_volume_claim.clone(),
        secret,
        config_map,
        ..Default::default()
    }
}
