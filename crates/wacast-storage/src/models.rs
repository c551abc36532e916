//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use wacast_common::types::{
    CampaignId, ContactId, MessageRecordId, SenderNumberId, TemplateId, TemplateVariable,
    WebhookEventId,
};

/// Per-recipient message status
///
/// Ordered by `rank()`: a record only ever moves to a higher rank, and
/// `Read`/`Failed` share the top rank so neither can displace the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Position in the forward-only state machine
    pub fn rank(&self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 3,
        }
    }

    /// Whether no further transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered | MessageStatus::Read | MessageStatus::Failed
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Read => write!(f, "read"),
            MessageStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            _ => Err(format!("Invalid message status: {}", s)),
        }
    }
}

/// Message record model - one recipient's send attempt and its lifecycle
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageRecordId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub sender_number_id: SenderNumberId,
    pub template_id: TemplateId,
    /// Provider-assigned id, set after a successful submission; the
    /// reconciliation join key for inbound webhook events
    pub provider_message_id: Option<String>,
    /// Ordered `[{"name": .., "value": ..}]` array captured at enqueue time
    pub rendered_variables: serde_json::Value,
    pub status: String,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Get status enum
    pub fn status_enum(&self) -> Option<MessageStatus> {
        self.status.parse().ok()
    }

    /// Get the rendered variables as a vector
    pub fn variables(&self) -> Vec<TemplateVariable> {
        serde_json::from_value(self.rendered_variables.clone()).unwrap_or_default()
    }
}

/// Create message record input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRecord {
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub sender_number_id: SenderNumberId,
    pub template_id: TemplateId,
    pub rendered_variables: Vec<TemplateVariable>,
}

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Pending => write!(f, "pending"),
            CampaignStatus::Processing => write!(f, "processing"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CampaignStatus::Pending),
            "processing" => Ok(CampaignStatus::Processing),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Campaign model - one bulk-send operation
///
/// The counter columns are derived state: they are always overwritten
/// wholesale from a scan of `message_records`, never incremented, so the
/// dispatch and reconcile paths cannot race each other on them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub template_id: TemplateId,
    pub sender_number_id: SenderNumberId,
    pub status: String,
    pub total_messages: i32,
    pub sent_count: i32,
    pub delivered_count: i32,
    pub read_count: i32,
    pub failed_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub template_id: TemplateId,
    pub sender_number_id: SenderNumberId,
}

/// Per-status record counts for one campaign, from a single scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignCounts {
    pub total: i64,
    pub pending: i64,
    pub sent: i64,
    pub delivered: i64,
    pub read: i64,
    pub failed: i64,
}

impl CampaignCounts {
    /// Records in a terminal status (Delivered, Read, or Failed)
    pub fn terminal(&self) -> i64 {
        self.delivered + self.read + self.failed
    }

    /// Completion holds when at least one record exists and all are terminal
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.terminal() == self.total
    }
}

/// Campaign statistics exposed to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: CampaignId,
    pub status: String,
    pub total_messages: i32,
    pub sent_count: i32,
    pub delivered_count: i32,
    pub read_count: i32,
    pub failed_count: i32,
    pub delivery_percentage: f64,
    pub failure_percentage: f64,
}

/// Percentage of `count` over `total`, rounded to 2 decimals, 0 when empty
pub fn percentage(count: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Webhook event type reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    MessageSent,
    MessageDelivered,
    MessageRead,
    MessageFailed,
}

impl WebhookEventType {
    /// The message status this event moves a record toward
    pub fn target_status(&self) -> MessageStatus {
        match self {
            WebhookEventType::MessageSent => MessageStatus::Sent,
            WebhookEventType::MessageDelivered => MessageStatus::Delivered,
            WebhookEventType::MessageRead => MessageStatus::Read,
            WebhookEventType::MessageFailed => MessageStatus::Failed,
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookEventType::MessageSent => write!(f, "message_sent"),
            WebhookEventType::MessageDelivered => write!(f, "message_delivered"),
            WebhookEventType::MessageRead => write!(f, "message_read"),
            WebhookEventType::MessageFailed => write!(f, "message_failed"),
        }
    }
}

impl std::str::FromStr for WebhookEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message_sent" => Ok(WebhookEventType::MessageSent),
            "message_delivered" => Ok(WebhookEventType::MessageDelivered),
            "message_read" => Ok(WebhookEventType::MessageRead),
            "message_failed" => Ok(WebhookEventType::MessageFailed),
            _ => Err(format!("Invalid webhook event type: {}", s)),
        }
    }
}

/// Webhook event model - one inbound provider callback, stored before
/// processing for replay and audit
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    pub event_type: String,
    pub provider_message_id: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Get event type enum
    pub fn event_type_enum(&self) -> Option<WebhookEventType> {
        self.event_type.parse().ok()
    }

    /// Failure reason carried by the provider payload, if any
    pub fn failure_reason(&self) -> Option<String> {
        self.payload
            .get("error")
            .and_then(|e| e.get("message"))
            .or_else(|| self.payload.get("reason"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Create webhook event input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWebhookEvent {
    pub event_type: WebhookEventType,
    pub provider_message_id: String,
    pub payload: serde_json::Value,
}

/// Contact model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: Option<String>,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Message template model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: TemplateId,
    pub name: String,
    pub language: String,
    /// Provider review status; only "approved" templates are sendable
    pub status: String,
    /// Structural parts (header/body/footer/buttons) as declared at the
    /// provider, used to rebuild outgoing payloads
    pub components: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageTemplate {
    /// Whether the template may be used for sending
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

/// Sending number model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SenderNumber {
    pub id: SenderNumberId,
    pub display_number: String,
    /// Provider-side id the send endpoint is addressed to
    pub provider_number_id: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job queue model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: uuid::Uuid,
    pub queue: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_status_roundtrip() {
        for s in ["pending", "sent", "delivered", "read", "failed"] {
            let status: MessageStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("bounced".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_status_rank_ordering() {
        assert!(MessageStatus::Pending.rank() < MessageStatus::Sent.rank());
        assert!(MessageStatus::Sent.rank() < MessageStatus::Delivered.rank());
        assert!(MessageStatus::Delivered.rank() < MessageStatus::Read.rank());
        // Read and Failed share the top rank: neither displaces the other
        assert_eq!(MessageStatus::Read.rank(), MessageStatus::Failed.rank());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::Delivered.is_terminal());
        assert!(MessageStatus::Read.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
    }

    #[test]
    fn test_campaign_counts_completion() {
        let mut counts = CampaignCounts {
            total: 3,
            sent: 1,
            delivered: 1,
            failed: 1,
            ..Default::default()
        };
        // {Delivered, Failed, Sent} is not complete
        assert!(!counts.is_complete());

        counts.sent = 0;
        counts.read = 1;
        assert!(counts.is_complete());

        let empty = CampaignCounts::default();
        assert!(!empty.is_complete());
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_webhook_event_type_roundtrip() {
        for s in [
            "message_sent",
            "message_delivered",
            "message_read",
            "message_failed",
        ] {
            let ty: WebhookEventType = s.parse().unwrap();
            assert_eq!(ty.to_string(), s);
        }
        assert!("message_opened".parse::<WebhookEventType>().is_err());
    }

    #[test]
    fn test_failure_reason_extraction() {
        let event = WebhookEvent {
            id: uuid::Uuid::new_v4(),
            event_type: "message_failed".to_string(),
            provider_message_id: "wamid.1".to_string(),
            payload: serde_json::json!({"error": {"code": 131026, "message": "Recipient unreachable"}}),
            processed: false,
            processed_at: None,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(
            event.failure_reason().as_deref(),
            Some("Recipient unreachable")
        );
    }
}
