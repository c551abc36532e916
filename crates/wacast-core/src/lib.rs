//! Wacast Core - Campaign dispatch and reconciliation
//!
//! This crate provides the dispatch-and-reconciliation core: the worker
//! that submits one message with bounded retries, the reconciler that
//! applies provider delivery callbacks idempotently, and the campaign
//! aggregate that stays consistent under both update paths.

pub mod campaign;
pub mod dispatch;
pub mod provider;
pub mod queue;
pub mod reconcile;

pub use campaign::{CampaignError, CampaignManager};
pub use dispatch::{DispatchOutcome, DispatchWorker};
pub use provider::{
    build_components, CloudApiClient, PayloadError, ProviderClient, ProviderError,
    ProviderErrorKind, SendRequest,
};
pub use queue::QueueManager;
pub use reconcile::{plan_transition, ReconcileOutcome, Transition, WebhookReconciler};
