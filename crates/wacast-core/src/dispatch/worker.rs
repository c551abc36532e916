//! Dispatch Worker - Sends one message record through the provider and
//! applies the outcome

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use wacast_common::types::PhoneNumber;
use wacast_storage::db::DatabasePool;
use wacast_storage::models::{Contact, MessageRecord, MessageStatus, MessageTemplate, SenderNumber};
use wacast_storage::repository::{
    ContactRepository, MessageRecordRepository, SenderNumberRepository, TemplateRepository,
};

use crate::campaign::CampaignManager;
use crate::provider::{build_components, ProviderClient, SendRequest};

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Provider accepted the message; record advanced to `sent`
    Sent,
    /// Record was not `pending`; duplicate task, nothing done
    Skipped,
    /// Terminal failure recorded
    Failed,
    /// Transient failure; the same task should run again after the delay
    Retry { delay_secs: i64 },
}

/// Exponential backoff for send retries: `base * 2^(attempt-1)`, capped
/// at one hour
pub fn retry_delay(base_secs: i64, attempt: i32) -> Duration {
    let exp = attempt.saturating_sub(1).clamp(0, 30) as u32;
    let factor = 2_i64.saturating_pow(exp);
    Duration::seconds(base_secs.saturating_mul(factor).min(3600))
}

/// Whether a failed attempt earns another try
///
/// `retry_count` is the record's counter after this failure was
/// recorded; once it reaches the configured maximum the record is
/// terminal and never retried again.
fn should_retry(transient: bool, retry_count: i32, max_retries: i32) -> bool {
    transient && retry_count < max_retries
}

/// Dispatch Worker
pub struct DispatchWorker {
    record_repo: MessageRecordRepository,
    contact_repo: ContactRepository,
    template_repo: TemplateRepository,
    sender_repo: SenderNumberRepository,
    provider: Arc<dyn ProviderClient>,
    campaign_manager: Arc<CampaignManager>,
    max_retries: i32,
    retry_base_secs: i64,
}

impl DispatchWorker {
    /// Create a new dispatch worker
    pub fn new(
        db_pool: DatabasePool,
        provider: Arc<dyn ProviderClient>,
        campaign_manager: Arc<CampaignManager>,
        max_retries: i32,
        retry_base_secs: i64,
    ) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            record_repo: MessageRecordRepository::new(pool.clone()),
            contact_repo: ContactRepository::new(pool.clone()),
            template_repo: TemplateRepository::new(pool.clone()),
            sender_repo: SenderNumberRepository::new(pool),
            provider,
            campaign_manager,
            max_retries,
            retry_base_secs,
        }
    }

    /// Send one message record
    ///
    /// A no-op unless the record is currently `pending`, so duplicate
    /// task deliveries are harmless. The record is marked `sent` only
    /// after the provider call returns success, never before.
    pub async fn dispatch(&self, record_id: Uuid) -> Result<DispatchOutcome> {
        let Some(record) = self.record_repo.get(record_id).await? else {
            warn!("Dispatch task for unknown record {}", record_id);
            return Ok(DispatchOutcome::Skipped);
        };

        if record.status_enum() != Some(MessageStatus::Pending) {
            debug!(
                "Record {} is {}, skipping duplicate dispatch",
                record_id, record.status
            );
            return Ok(DispatchOutcome::Skipped);
        }

        let request = match self.build_request(&record).await? {
            Ok(request) => request,
            Err(reason) => {
                // Missing relation or unapproved template: a
                // configuration error, terminal without retry.
                error!("Record {} not sendable: {}", record_id, reason);
                self.record_repo.mark_failed(record_id, &reason).await?;
                self.campaign_manager
                    .check_completion(record.campaign_id)
                    .await?;
                return Ok(DispatchOutcome::Failed);
            }
        };

        match self.provider.send_template(&request).await {
            Ok(provider_message_id) => {
                info!(
                    "Record {} submitted as {}",
                    record_id, provider_message_id
                );
                self.record_repo
                    .mark_sent(record_id, &provider_message_id)
                    .await?;
                self.campaign_manager
                    .check_completion(record.campaign_id)
                    .await?;
                Ok(DispatchOutcome::Sent)
            }
            Err(e) => {
                let new_retry_count = record.retry_count + 1;
                if should_retry(e.is_transient(), new_retry_count, self.max_retries) {
                    warn!(
                        "Record {} send failed (attempt {}): {}",
                        record_id, new_retry_count, e
                    );
                    self.record_repo
                        .record_attempt_failure(record_id, &e.to_string())
                        .await?;
                    let delay = retry_delay(self.retry_base_secs, new_retry_count);
                    Ok(DispatchOutcome::Retry {
                        delay_secs: delay.num_seconds(),
                    })
                } else {
                    error!(
                        "Record {} failed terminally after {} attempts: {}",
                        record_id, new_retry_count, e
                    );
                    self.record_repo
                        .mark_failed(record_id, &e.to_string())
                        .await?;
                    self.campaign_manager
                        .check_completion(record.campaign_id)
                        .await?;
                    Ok(DispatchOutcome::Failed)
                }
            }
        }
    }

    /// Resolve the record's references and build the provider request
    ///
    /// The inner `Err` is a human-readable configuration failure that
    /// terminates the record; the outer error is infrastructure.
    async fn build_request(
        &self,
        record: &MessageRecord,
    ) -> Result<std::result::Result<SendRequest, String>> {
        let contact = self.contact_repo.get(record.contact_id).await?;
        let template = self.template_repo.get(record.template_id).await?;
        let sender = self.sender_repo.get(record.sender_number_id).await?;

        let (contact, template, sender): (Contact, MessageTemplate, SenderNumber) =
            match (contact, template, sender) {
                (Some(c), Some(t), Some(s)) => (c, t, s),
                (contact, template, sender) => {
                    let mut missing = Vec::new();
                    if contact.is_none() {
                        missing.push("contact");
                    }
                    if template.is_none() {
                        missing.push("template");
                    }
                    if sender.is_none() {
                        missing.push("sender number");
                    }
                    return Ok(Err(format!("Missing {}", missing.join(", "))));
                }
            };

        if !template.is_approved() {
            return Ok(Err(format!(
                "Template {} is {}, not approved",
                template.name, template.status
            )));
        }

        if !sender.active {
            return Ok(Err(format!(
                "Sending number {} is inactive",
                sender.display_number
            )));
        }

        let Some(phone) = PhoneNumber::parse(&contact.phone) else {
            return Ok(Err(format!(
                "Contact {} has invalid phone {:?}",
                contact.id, contact.phone
            )));
        };

        let components = match build_components(&template.components, &record.variables()) {
            Ok(components) => components,
            Err(e) => return Ok(Err(e.to_string())),
        };

        Ok(Ok(SendRequest {
            provider_number_id: sender.provider_number_id,
            to: phone.to_string(),
            template_name: template.name,
            language: template.language,
            components,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(retry_delay(30, 1), Duration::seconds(30));
        assert_eq!(retry_delay(30, 2), Duration::seconds(60));
        assert_eq!(retry_delay(30, 3), Duration::seconds(120));
    }

    #[test]
    fn test_retry_delay_capped() {
        assert_eq!(retry_delay(30, 10), Duration::seconds(3600));
        assert_eq!(retry_delay(30, 100), Duration::seconds(3600));
    }

    #[test]
    fn test_retry_bound() {
        let max = 3;
        // attempts 1 and 2 retry, attempt 3 exhausts the budget
        assert!(should_retry(true, 1, max));
        assert!(should_retry(true, 2, max));
        assert!(!should_retry(true, 3, max));
        assert!(!should_retry(true, 4, max));
    }

    #[test]
    fn test_permanent_failures_never_retry() {
        assert!(!should_retry(false, 1, 3));
        assert!(!should_retry(false, 0, 3));
    }

    #[test]
    fn test_zero_budget_fails_immediately() {
        assert!(!should_retry(true, 1, 0));
    }
}
