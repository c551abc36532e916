//! Webhook Reconciler - Applies provider delivery callbacks to message
//! records, forward-only and idempotently

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wacast_storage::db::DatabasePool;
use wacast_storage::models::{MessageStatus, WebhookEventType};
use wacast_storage::repository::{MessageRecordRepository, WebhookEventRepository};

use crate::campaign::CampaignManager;

/// Outcome of reconciling one webhook event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Event applied against a matching record
    Applied,
    /// Event was already processed; nothing done
    Duplicate,
    /// No matching record (or unusable event); acknowledged anyway
    Unmatched,
}

/// Planned effect of one event against a record's current status
///
/// `status` is `None` when the event does not move the record forward;
/// the stamp flags mark which timestamps the event may backfill either
/// way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: Option<MessageStatus>,
    pub stamp_sent: bool,
    pub stamp_delivered: bool,
    pub stamp_read: bool,
    pub stamp_failed: bool,
}

/// Decide what one event does to a record in `current` status
///
/// The status advances only when the event's target outranks the
/// current status, so no event sequence can move a record backward and
/// `Read`/`Failed` are final. A `delivered` event backfills `sent_at`
/// and a `read` event backfills `delivered_at`, covering callbacks that
/// raced ahead of earlier stages.
pub fn plan_transition(current: MessageStatus, event: WebhookEventType) -> Transition {
    let target = event.target_status();
    let status = (target.rank() > current.rank()).then_some(target);

    let (stamp_sent, stamp_delivered, stamp_read, stamp_failed) = match event {
        WebhookEventType::MessageSent => (true, false, false, false),
        WebhookEventType::MessageDelivered => (true, true, false, false),
        WebhookEventType::MessageRead => (false, true, true, false),
        WebhookEventType::MessageFailed => (false, false, false, true),
    };

    Transition {
        status,
        stamp_sent,
        stamp_delivered,
        stamp_read,
        stamp_failed,
    }
}

/// Webhook Reconciler
pub struct WebhookReconciler {
    event_repo: WebhookEventRepository,
    record_repo: MessageRecordRepository,
    campaign_manager: Arc<CampaignManager>,
}

impl WebhookReconciler {
    /// Create a new webhook reconciler
    pub fn new(db_pool: DatabasePool, campaign_manager: Arc<CampaignManager>) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            event_repo: WebhookEventRepository::new(pool.clone()),
            record_repo: MessageRecordRepository::new(pool),
            campaign_manager,
        }
    }

    /// Apply one stored webhook event
    ///
    /// Fully idempotent: already-processed events short-circuit, and the
    /// record update is a single rank-guarded write, so replaying any
    /// event leaves the record exactly as one processing left it.
    pub async fn reconcile(&self, event_id: Uuid) -> Result<ReconcileOutcome> {
        let event = self
            .event_repo
            .get(event_id)
            .await?
            .ok_or_else(|| anyhow!("Webhook event {} not found", event_id))?;

        if event.processed {
            debug!("Event {} already processed, skipping", event_id);
            return Ok(ReconcileOutcome::Duplicate);
        }

        let Some(event_type) = event.event_type_enum() else {
            // Unknown event types are stored for audit but cannot be
            // applied; acknowledge so they are not redelivered forever.
            warn!(
                "Event {} has unknown type {:?}, acknowledging",
                event_id, event.event_type
            );
            self.event_repo.mark_processed(event_id).await?;
            return Ok(ReconcileOutcome::Unmatched);
        };

        let Some(record) = self
            .record_repo
            .get_by_provider_message_id(&event.provider_message_id)
            .await?
        else {
            // An event for a message this system never recorded is not
            // an error worth retrying.
            debug!(
                "No record for provider message {}, acknowledging event {}",
                event.provider_message_id, event_id
            );
            self.event_repo.mark_processed(event_id).await?;
            return Ok(ReconcileOutcome::Unmatched);
        };

        let current = record
            .status_enum()
            .ok_or_else(|| anyhow!("Record {} has invalid status {}", record.id, record.status))?;

        let plan = plan_transition(current, event_type);
        let now = Utc::now();
        let failure_reason = match event_type {
            WebhookEventType::MessageFailed => event.failure_reason(),
            _ => None,
        };

        self.record_repo
            .apply_transition(
                record.id,
                event_type.target_status(),
                plan.stamp_sent.then_some(now),
                plan.stamp_delivered.then_some(now),
                plan.stamp_read.then_some(now),
                plan.stamp_failed.then_some(now),
                failure_reason.as_deref(),
            )
            .await?;

        match plan.status {
            Some(status) => info!(
                "Record {} advanced {} -> {} by event {}",
                record.id, current, status, event_id
            ),
            None => debug!(
                "Event {} does not move record {} forward from {}",
                event_id, record.id, current
            ),
        }

        self.campaign_manager
            .check_completion(record.campaign_id)
            .await?;

        // Acknowledged even when the status write was a no-op, so a
        // redelivered copy short-circuits at the top.
        self.event_repo.mark_processed(event_id).await?;

        Ok(ReconcileOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use MessageStatus::*;
    use WebhookEventType::*;

    #[test]
    fn test_forward_transitions_apply() {
        assert_eq!(plan_transition(Pending, MessageSent).status, Some(Sent));
        assert_eq!(
            plan_transition(Sent, MessageDelivered).status,
            Some(Delivered)
        );
        assert_eq!(plan_transition(Delivered, MessageRead).status, Some(Read));
        assert_eq!(plan_transition(Sent, MessageFailed).status, Some(Failed));
        assert_eq!(plan_transition(Pending, MessageFailed).status, Some(Failed));
    }

    #[test]
    fn test_skipped_stages_still_advance() {
        // A delivered callback racing ahead of the dispatch worker's
        // own `sent` write still lands, and stamps the missing sent_at.
        let plan = plan_transition(Pending, MessageDelivered);
        assert_eq!(plan.status, Some(Delivered));
        assert!(plan.stamp_sent);
        assert!(plan.stamp_delivered);

        let plan = plan_transition(Pending, MessageRead);
        assert_eq!(plan.status, Some(Read));
        assert!(plan.stamp_delivered);
        assert!(plan.stamp_read);
    }

    #[test]
    fn test_backward_transitions_skipped() {
        assert_eq!(plan_transition(Read, MessageDelivered).status, None);
        assert_eq!(plan_transition(Delivered, MessageSent).status, None);
        assert_eq!(plan_transition(Sent, MessageSent).status, None);
        assert_eq!(plan_transition(Read, MessageSent).status, None);
    }

    #[test]
    fn test_terminal_states_are_final() {
        // Read and Failed share the top rank: neither displaces the other
        assert_eq!(plan_transition(Read, MessageFailed).status, None);
        assert_eq!(plan_transition(Failed, MessageRead).status, None);
        assert_eq!(plan_transition(Failed, MessageDelivered).status, None);
    }

    #[test]
    fn test_late_failure_still_stamps() {
        // Ignored for status purposes, but the timestamp is still
        // recorded if unset.
        let plan = plan_transition(Read, MessageFailed);
        assert_eq!(plan.status, None);
        assert!(plan.stamp_failed);
    }

    #[test]
    fn test_replay_is_stable() {
        // Re-planning from the state a transition produced yields no
        // further status movement for the same event.
        for event in [MessageSent, MessageDelivered, MessageRead, MessageFailed] {
            let first = plan_transition(Pending, event);
            if let Some(reached) = first.status {
                let replay = plan_transition(reached, event);
                assert_eq!(replay.status, None, "replaying {:?} must not move", event);
            }
        }
    }

    #[test]
    fn test_full_lifecycle_scenario() {
        // Pending -> Sent -> Delivered -> Read, each step forward-only
        let mut status = Pending;
        for (event, expected) in [
            (MessageSent, Sent),
            (MessageDelivered, Delivered),
            (MessageRead, Read),
        ] {
            let plan = plan_transition(status, event);
            assert_eq!(plan.status, Some(expected));
            status = expected;
        }

        // late duplicate delivered: no change
        assert_eq!(plan_transition(status, MessageDelivered).status, None);
    }

    #[test]
    fn test_rank_is_non_decreasing_for_all_pairs() {
        let statuses = [Pending, Sent, Delivered, Read, Failed];
        let events = [MessageSent, MessageDelivered, MessageRead, MessageFailed];

        for current in statuses {
            for event in events {
                let plan = plan_transition(current, event);
                if let Some(next) = plan.status {
                    assert!(
                        next.rank() > current.rank(),
                        "{:?} -> {:?} via {:?} went backward",
                        current,
                        next,
                        event
                    );
                }
            }
        }
    }
}
