//! Prune executor
//!
//! One call to [`Executor::execute`] is one reconcile of a Prune request:
//! ensure the prune Job exists and matches the request, record the outcome
//! as a `Ready` condition, and on success let the history cleaner trim old
//! runs. Retries are the caller's business.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use stash_common::crd::{ConditionReason, ConditionType, Prune};
use stash_common::{Error, JobConfig, JobKind, OperatorConfig};

use crate::args::job_name;
use crate::cleanup::{cleanup_old_prunes, HistoryCleaner};
use crate::mutator::mutate_job;
use crate::retention::{ConfigDefaultEnv, DefaultEnvSource};
use crate::status::{ConditionSink, KubeConditionSink};
use crate::store::{create_or_update, JobStore, KubeJobStore, OperationResult};
use crate::template::{BaseJobBuilder, JobTemplateBuilder};

/// A runnable maintenance job
#[async_trait]
pub trait Executor: Send + Sync {
    /// Kind of job this executor runs
    fn kind(&self) -> JobKind;

    /// Whether the job must not overlap with other exclusive jobs
    fn exclusive(&self) -> bool;

    /// Ensure the job exists for the current request
    async fn execute(&self, cancel: &CancellationToken) -> Result<(), Error>;
}

/// Collaborators shared by prune executors
pub struct PruneContext {
    /// Job persistence
    pub store: Arc<dyn JobStore>,
    /// Status condition sink
    pub status: Arc<dyn ConditionSink>,
    /// History cleaner invoked after a successful run
    pub cleaner: Arc<dyn HistoryCleaner>,
    /// Base Job template
    pub template: Arc<dyn JobTemplateBuilder>,
    /// Namespace-scoped default env
    pub defaults: Arc<dyn DefaultEnvSource>,
    /// Operator configuration
    pub config: Arc<OperatorConfig>,
}

impl PruneContext {
    /// Context talking to the Kubernetes API, with config-derived template and defaults
    pub fn new(
        client: Client,
        cleaner: Arc<dyn HistoryCleaner>,
        config: Arc<OperatorConfig>,
    ) -> Self {
        Self {
            store: Arc::new(KubeJobStore::new(client.clone())),
            status: Arc::new(KubeConditionSink::new(client)),
            cleaner,
            template: Arc::new(BaseJobBuilder::new(config.clone())),
            defaults: Arc::new(ConfigDefaultEnv::new(config.clone())),
            config,
        }
    }
}

/// Executor turning a Prune request into its prune Job
pub struct PruneExecutor {
    prune: Prune,
    ctx: Arc<PruneContext>,
}

impl PruneExecutor {
    /// Build an executor from a generic job payload
    ///
    /// Fails with [`Error::KindMismatch`] unless the payload is a Prune.
    pub fn new(config: JobConfig, ctx: Arc<PruneContext>) -> Result<Self, Error> {
        let prune = config.resolve::<Prune>(JobKind::Prune)?;
        Ok(Self::for_prune(prune, ctx))
    }

    /// Build an executor for an already typed request
    pub fn for_prune(prune: Prune, ctx: Arc<PruneContext>) -> Self {
        Self { prune, ctx }
    }

    /// The request this executor acts on
    pub fn prune(&self) -> &Prune {
        &self.prune
    }

    async fn ensure_job(&self) -> Result<(Job, OperationResult), Error> {
        let name = job_name(JobKind::Prune, &self.prune)?;
        let namespace = self.prune.namespace().unwrap_or_default();
        let ctx = &self.ctx;

        create_or_update(ctx.store.as_ref(), &namespace, &name, |job| {
            mutate_job(
                job,
                &self.prune,
                &ctx.config,
                ctx.template.as_ref(),
                ctx.defaults.as_ref(),
            )
        })
        .await
    }

    async fn report_failure(&self, err: &Error) {
        let message = format!("could not create job: {err}");
        if let Err(e) = self
            .ctx
            .status
            .set_condition_false(
                &self.prune,
                ConditionType::Ready,
                ConditionReason::CreationFailed,
                message,
            )
            .await
        {
            warn!(error = %e, "failed to set CreationFailed condition");
        }
    }

    async fn report_started(&self, job: &Job) {
        let message = format!(
            "the job '{}/{}' was created",
            job.namespace().unwrap_or_default(),
            job.name_any()
        );
        if let Err(e) = self.ctx.status.set_started(&self.prune, message).await {
            warn!(error = %e, "failed to set Started condition");
        }
    }
}

#[async_trait]
impl Executor for PruneExecutor {
    fn kind(&self) -> JobKind {
        JobKind::Prune
    }

    fn exclusive(&self) -> bool {
        self.kind().is_exclusive()
    }

    #[instrument(
        skip(self, cancel),
        fields(prune = %self.prune.name_any(), namespace = %self.prune.namespace().unwrap_or_default())
    )]
    async fn execute(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("prune execution cancelled");
                return Err(Error::Cancelled);
            }
            result = self.ensure_job() => result,
        };

        match result {
            Ok((job, op)) => {
                info!(job = %job.name_any(), result = %op, "prune job reconciled");
                self.report_started(&job).await;
                cleanup_old_prunes(self.ctx.cleaner.as_ref(), &self.prune).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "could not create prune job");
                self.report_failure(&e).await;
                Err(e)
            }
        }
    }
}
