//! Prune executor for Stash
//!
//! Reconciles a `Prune` request into one exclusive batch Job:
//! - [`args`]: deterministic job name and container argument vector
//! - [`retention`]: retention policy and backend to container env
//! - [`tls`]: work-dir and TLS volume mounts plus pod volumes
//! - [`template`]: base Job template (labels, owner, container shape)
//! - [`mutator`]: composes the above onto a Job draft
//! - [`store`]: create-or-update against the API server
//! - [`status`]: status conditions on the request
//! - [`cleanup`]: hand-off to the history cleaner
//! - [`executor`]: the `PruneExecutor` tying it together

pub mod args;
pub mod cleanup;
pub mod executor;
pub mod mutator;
pub mod retention;
pub mod status;
pub mod store;
pub mod template;
pub mod tls;

pub use executor::{Executor, PruneContext, PruneExecutor};
pub use store::{create_or_update, OperationResult};
