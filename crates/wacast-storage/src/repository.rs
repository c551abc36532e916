//! Repository layer for data access

pub mod campaigns;
pub mod contacts;
pub mod jobs;
pub mod message_records;
pub mod sender_numbers;
pub mod templates;
pub mod webhook_events;

pub use campaigns::CampaignRepository;
pub use contacts::ContactRepository;
pub use jobs::JobRepository;
pub use message_records::MessageRecordRepository;
pub use sender_numbers::SenderNumberRepository;
pub use templates::TemplateRepository;
pub use webhook_events::WebhookEventRepository;
