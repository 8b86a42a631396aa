//! Operator-wide configuration
//!
//! Built once at startup (the binary fills it from flags and env vars) and
//! handed to every component by reference. Nothing reads configuration from
//! globals.

use crate::crd::SecretKeyRef;

/// Default working directory mounted into job pods
pub const DEFAULT_POD_VAR_DIR: &str = "/stash";

/// Default Prometheus push gateway URL
pub const DEFAULT_PROM_URL: &str = "http://127.0.0.1/";

/// Default service account for job pods
pub const DEFAULT_SERVICE_ACCOUNT: &str = "pod-executor";

/// Default job container image
pub const DEFAULT_IMAGE: &str = "ghcr.io/stash-dev/stash:latest";

/// Default job container entrypoint
pub const DEFAULT_COMMAND: &[&str] = &["stash", "restic"];

/// Default retries before a job is marked failed
pub const DEFAULT_BACKOFF_LIMIT: i32 = 6;

/// Immutable operator configuration
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Working directory inside job pods (`-varDir`)
    pub pod_var_dir: String,
    /// Prometheus push gateway URL passed as `PROM_URL`
    pub prom_url: String,
    /// Service account used when neither the request nor the template sets one
    pub service_account: String,
    /// Job container image
    pub image: String,
    /// Job container entrypoint
    pub command: Vec<String>,
    /// Job backoff limit
    pub backoff_limit: i32,
    /// Optional statistics webhook passed as `STATS_URL`
    pub global_stats_url: Option<String>,
    /// Endpoint of the cluster-wide default S3 repository
    pub global_s3_endpoint: Option<String>,
    /// Bucket of the cluster-wide default S3 repository
    pub global_s3_bucket: Option<String>,
    /// Secret holding the default repository password
    pub global_repo_password: Option<SecretKeyRef>,
    /// Secret holding the default S3 access key id
    pub global_access_key_id: Option<SecretKeyRef>,
    /// Secret holding the default S3 secret access key
    pub global_secret_access_key: Option<SecretKeyRef>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            pod_var_dir: DEFAULT_POD_VAR_DIR.to_string(),
            prom_url: DEFAULT_PROM_URL.to_string(),
            service_account: DEFAULT_SERVICE_ACCOUNT.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            command: DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect(),
            backoff_limit: DEFAULT_BACKOFF_LIMIT,
            global_stats_url: None,
            global_s3_endpoint: None,
            global_s3_bucket: None,
            global_repo_password: None,
            global_access_key_id: None,
            global_secret_access_key: None,
        }
    }
}

impl OperatorConfig {
    /// Repository string of the cluster-wide default, when both endpoint and bucket are set
    pub fn global_repository(&self) -> Option<String> {
        match (&self.global_s3_endpoint, &self.global_s3_bucket) {
            (Some(endpoint), Some(bucket)) if !endpoint.is_empty() && !bucket.is_empty() => Some(
                format!("s3:{}/{}", endpoint.trim_end_matches('/'), bucket),
            ),
            _ => None,
        }
    }
}
