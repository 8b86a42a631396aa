//! Custom Resource Definitions for Stash
//!
//! - [`Prune`]: retention policy plus storage backend, reconciled into a prune Job
//! - [`Backend`]: restic repository location, credentials and TLS options
//! - [`Condition`]: Kubernetes-style status conditions shared by all requests

mod backend;
mod prune;
mod types;

pub use backend::{
    AzureSpec, B2Spec, Backend, GcsSpec, LocalSpec, RestServerSpec, S3Spec, SecretKeyRef,
    StorageTarget, SwiftSpec, TlsOptions,
};
pub use prune::{
    Prune, PruneSpec, PruneStatus, RetentionPolicy, RunnableVolumeSpec, DEFAULT_KEEP_DAILY,
};
pub use types::{set_condition, Condition, ConditionReason, ConditionStatus, ConditionType};
