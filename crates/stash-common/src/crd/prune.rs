//! Prune CRD types
//!
//! A `Prune` asks for snapshots in a restic repository to be forgotten and
//! pruned according to a retention policy. Each Prune maps to exactly one
//! batch Job named `prune-<name>`.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EnvFromSource, PersistentVolumeClaimVolumeSource,
    ResourceRequirements, SecretVolumeSource,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::backend::Backend;
use super::types::Condition;

/// Daily snapshots kept when the policy leaves `keepDaily` unset
pub const DEFAULT_KEEP_DAILY: i32 = 14;

/// Which snapshots survive a prune
///
/// Counts of zero or less mean "not set". `keepDaily` is the exception: it
/// falls back to [`DEFAULT_KEEP_DAILY`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Keep the last n snapshots
    #[serde(default)]
    pub keep_last: i32,
    /// Keep the last n hourly snapshots
    #[serde(default)]
    pub keep_hourly: i32,
    /// Keep the last n daily snapshots
    #[serde(default)]
    pub keep_daily: i32,
    /// Keep the last n weekly snapshots
    #[serde(default)]
    pub keep_weekly: i32,
    /// Keep the last n monthly snapshots
    #[serde(default)]
    pub keep_monthly: i32,
    /// Keep the last n yearly snapshots
    #[serde(default)]
    pub keep_yearly: i32,
    /// Always keep snapshots carrying any of these tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keep_tags: Vec<String>,
    /// Only consider snapshots carrying these tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A pod volume made available to the job
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunnableVolumeSpec {
    /// Volume name, referenced by volume mounts
    pub name: String,
    /// Mount a PersistentVolumeClaim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,
    /// Mount a Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
    /// Mount a ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,
}

/// Retention/pruning request against a restic repository
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "stash.dev",
    version = "v1alpha1",
    kind = "Prune",
    plural = "prunes",
    namespaced,
    status = "PruneStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PruneSpec {
    /// Retention policy applied by the prune
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Repository to prune
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,

    /// Extra pod volumes (e.g., TLS material referenced by backend mounts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<RunnableVolumeSpec>>,

    /// Extra env sources appended to the job container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_from: Option<Vec<EnvFromSource>>,

    /// Service account the job runs as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Compute resources of the job container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Status of a Prune
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PruneStatus {
    /// Kubernetes-style conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation last acted upon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
