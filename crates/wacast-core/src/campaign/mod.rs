//! Campaign Module - Lifecycle, derived counters, completion checking

mod manager;

pub use manager::{CampaignError, CampaignManager};
