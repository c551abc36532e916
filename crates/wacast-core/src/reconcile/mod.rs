//! Reconcile Module - Idempotent application of provider delivery
//! callbacks

mod reconciler;

pub use reconciler::{plan_transition, ReconcileOutcome, Transition, WebhookReconciler};
