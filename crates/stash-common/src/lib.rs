//! Common types for Stash: CRDs, errors, configuration and utilities

#![deny(missing_docs)]

pub mod config;
pub mod crd;
pub mod env;
pub mod error;
pub mod kind;
pub mod telemetry;

pub use config::OperatorConfig;
pub use error::Error;
pub use kind::{JobConfig, JobKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for all Stash custom resources
pub const API_GROUP: &str = "stash.dev";

/// Label marking a Job that must not run concurrently with other exclusive jobs
pub const EXCLUSIVE_LABEL: &str = "stash.dev/exclusive";

/// Label marking every Job managed by Stash
pub const MANAGED_LABEL: &str = "stash.dev/managed";

/// Label carrying the job kind (prune, backup, ...)
pub const JOB_TYPE_LABEL: &str = "stash.dev/type";

/// Label carrying the name of the request that produced a Job
pub const OWNED_BY_LABEL: &str = "stash.dev/owned-by";

/// Env var holding the serialized repository location
pub const RESTIC_REPOSITORY_ENV: &str = "RESTIC_REPOSITORY";

/// Env var holding the repository password (always a secret reference)
pub const RESTIC_PASSWORD_ENV: &str = "RESTIC_PASSWORD";

/// Env var holding the Prometheus push gateway URL
pub const PROM_URL_ENV: &str = "PROM_URL";

/// Env var holding the global statistics webhook URL
pub const STATS_URL_ENV: &str = "STATS_URL";
