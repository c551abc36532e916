//! Queue Module - Durable task queue for dispatch and reconcile work

mod manager;

pub use manager::QueueManager;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wacast_storage::repository::JobRepository;

/// Queue name for message send tasks
pub const DISPATCH_QUEUE: &str = "dispatch";

/// Queue name for webhook reconciliation tasks
pub const RECONCILE_QUEUE: &str = "reconcile";

/// Task payload: send one message record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJob {
    pub message_record_id: Uuid,
}

/// Task payload: apply one stored webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileJob {
    pub webhook_event_id: Uuid,
}

/// Enqueue a dispatch task for one message record
pub async fn enqueue_dispatch(
    repo: &JobRepository,
    message_record_id: Uuid,
    scheduled_at: DateTime<Utc>,
    max_attempts: i32,
) -> Result<Uuid> {
    let payload = serde_json::to_value(DispatchJob { message_record_id })?;
    let id = repo
        .enqueue(DISPATCH_QUEUE, &payload, scheduled_at, max_attempts)
        .await?;
    Ok(id)
}

/// Enqueue a reconcile task for one stored webhook event
pub async fn enqueue_reconcile(
    repo: &JobRepository,
    webhook_event_id: Uuid,
    max_attempts: i32,
) -> Result<Uuid> {
    let payload = serde_json::to_value(ReconcileJob { webhook_event_id })?;
    let id = repo
        .enqueue(RECONCILE_QUEUE, &payload, Utc::now(), max_attempts)
        .await?;
    Ok(id)
}
