//! Status conditions on Prune requests

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};

use stash_common::crd::{
    set_condition, Condition, ConditionReason, ConditionStatus, ConditionType, Prune,
};
use stash_common::Error;

/// Records the outcome of an execution on the request
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConditionSink: Send + Sync {
    /// Set condition `type_` to False
    async fn set_condition_false(
        &self,
        prune: &Prune,
        type_: ConditionType,
        reason: ConditionReason,
        message: String,
    ) -> Result<(), Error>;

    /// Set `Ready=True` with reason `Started`
    async fn set_started(&self, prune: &Prune, message: String) -> Result<(), Error>;
}

/// [`ConditionSink`] patching the Prune status subresource
#[derive(Clone)]
pub struct KubeConditionSink {
    client: Client,
}

impl KubeConditionSink {
    /// Create a sink wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn patch(&self, prune: &Prune, condition: Condition) -> Result<(), Error> {
        let namespace = prune.namespace().unwrap_or_default();
        let api: Api<Prune> = Api::namespaced(self.client.clone(), &namespace);
        let patch = condition_patch(prune, condition);

        api.patch_status(
            &prune.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ConditionSink for KubeConditionSink {
    async fn set_condition_false(
        &self,
        prune: &Prune,
        type_: ConditionType,
        reason: ConditionReason,
        message: String,
    ) -> Result<(), Error> {
        self.patch(
            prune,
            Condition::new(type_, ConditionStatus::False, reason, message),
        )
        .await
    }

    async fn set_started(&self, prune: &Prune, message: String) -> Result<(), Error> {
        self.patch(
            prune,
            Condition::new(
                ConditionType::Ready,
                ConditionStatus::True,
                ConditionReason::Started,
                message,
            ),
        )
        .await
    }
}

/// Merge patch upserting `condition` into the request's current conditions
///
/// A merge patch replaces lists wholesale, so the full list is sent.
pub fn condition_patch(prune: &Prune, condition: Condition) -> serde_json::Value {
    let mut conditions = prune
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    set_condition(&mut conditions, condition);

    serde_json::json!({
        "status": {
            "conditions": conditions,
            "observedGeneration": prune.metadata.generation,
        }
    })
}
