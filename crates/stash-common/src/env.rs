//! Ordered, key-unique set of container env vars
//!
//! Entries keep insertion order so rendered Jobs are stable across
//! reconciles. Values are either literals or secret references.

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource};
use thiserror::Error;

/// Keys of a default env set that collided with already-present entries
///
/// Non-fatal: the merge has already been applied when this is returned.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("default env vars ignored, already set: {}", keys.join(", "))]
pub struct EnvMergeConflict {
    /// The colliding keys, in the order they were encountered
    pub keys: Vec<String>,
}

/// Insertion-ordered env vars with unique names
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvVarSet {
    vars: Vec<EnvVar>,
}

impl EnvVarSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a literal value, replacing any entry with the same name in place
    pub fn set_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.upsert(EnvVar {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        });
    }

    /// Set a value resolved at container start, replacing any entry with the same name in place
    pub fn set_source(&mut self, name: impl Into<String>, source: EnvVarSource) {
        self.upsert(EnvVar {
            name: name.into(),
            value: None,
            value_from: Some(source),
        });
    }

    /// Whether an entry with `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.vars.iter().any(|v| v.name == name)
    }

    /// Entry with `name`, if any
    pub fn get(&self, name: &str) -> Option<&EnvVar> {
        self.vars.iter().find(|v| v.name == name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.vars.iter()
    }

    /// Merge `defaults` into this set, first writer wins.
    ///
    /// Keys already present are never overwritten. Every skipped key is
    /// reported in the returned [`EnvMergeConflict`].
    pub fn merge(&mut self, defaults: EnvVarSet) -> Result<(), EnvMergeConflict> {
        let mut collisions = Vec::new();
        for var in defaults.vars {
            if self.contains(&var.name) {
                collisions.push(var.name);
            } else {
                self.vars.push(var);
            }
        }
        if collisions.is_empty() {
            Ok(())
        } else {
            Err(EnvMergeConflict { keys: collisions })
        }
    }

    /// Consume the set into container env vars
    pub fn into_vars(self) -> Vec<EnvVar> {
        self.vars
    }

    fn upsert(&mut self, var: EnvVar) {
        match self.vars.iter_mut().find(|v| v.name == var.name) {
            Some(existing) => *existing = var,
            None => self.vars.push(var),
        }
    }
}
