//! Job kinds and the generic job payload
//!
//! Controllers hand executors a [`JobConfig`]: a kind tag plus the untyped
//! object that triggered the run. Executors resolve the concrete request type
//! with [`JobConfig::resolve`], which checks the tag before parsing.

use std::str::FromStr;

use kube::api::DynamicObject;
use kube::Resource;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Kind of maintenance job Stash can run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Copy snapshots to another repository
    Archive,
    /// Take a snapshot
    Backup,
    /// Verify repository integrity
    Check,
    /// Forget and prune snapshots according to a retention policy
    Prune,
    /// Restore a snapshot
    Restore,
}

impl JobKind {
    /// Lowercase name used in job names and labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Backup => "backup",
            Self::Check => "check",
            Self::Prune => "prune",
            Self::Restore => "restore",
        }
    }

    /// Whether jobs of this kind must not overlap with other exclusive jobs
    /// on the same repository
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Prune | Self::Check | Self::Archive)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    /// Accepts both the lowercase form and the CRD kind (`prune`, `Prune`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "archive" => Ok(Self::Archive),
            "backup" => Ok(Self::Backup),
            "check" => Ok(Self::Check),
            "prune" => Ok(Self::Prune),
            "restore" => Ok(Self::Restore),
            _ => Err(Error::serialization(format!("unknown job kind '{s}'"))),
        }
    }
}

/// Untyped job payload handed from a controller to an executor
#[derive(Clone, Debug)]
pub struct JobConfig {
    /// Kind tag of the payload
    pub kind: JobKind,
    /// The request object as fetched from the API server
    pub object: DynamicObject,
}

impl JobConfig {
    /// Build a config from a dynamic object, reading the kind from its type meta
    pub fn new(object: DynamicObject) -> Result<Self, Error> {
        let kind = object
            .types
            .as_ref()
            .map(|t| t.kind.as_str())
            .ok_or_else(|| Error::serialization("object has no type information"))?
            .parse()?;
        Ok(Self { kind, object })
    }

    /// Resolve the payload into its concrete type
    ///
    /// Fails with [`Error::KindMismatch`] when the tag is not `expected`.
    pub fn resolve<K>(self, expected: JobKind) -> Result<K, Error>
    where
        K: Resource + DeserializeOwned,
    {
        if self.kind != expected {
            return Err(Error::KindMismatch {
                expected,
                actual: self.kind.to_string(),
            });
        }
        self.object
            .try_parse::<K>()
            .map_err(|e| Error::serialization(format!("failed to parse {expected}: {e}")))
    }
}
