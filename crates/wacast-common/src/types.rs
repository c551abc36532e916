//! Common types for Wacast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for message records
pub type MessageRecordId = Uuid;

/// Unique identifier for contacts
pub type ContactId = Uuid;

/// Unique identifier for message templates
pub type TemplateId = Uuid;

/// Unique identifier for sending numbers
pub type SenderNumberId = Uuid;

/// Unique identifier for webhook events
pub type WebhookEventId = Uuid;

/// Phone number in E.164 form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse a phone number from a string
    ///
    /// Accepts a leading `+` followed by 8 to 15 digits.
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('+')?;
        if digits.len() < 8 || digits.len() > 15 {
            return None;
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self(s.to_string()))
    }

    /// Get the number as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::Validation("Invalid phone number".to_string()))
    }
}

/// One rendered template variable, captured at enqueue time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    pub value: String,
}

impl TemplateVariable {
    /// Create a new template variable
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_phone_number_parse() {
        let phone = PhoneNumber::parse("+14155550123").unwrap();
        assert_eq!(phone.as_str(), "+14155550123");
        assert_eq!(phone.to_string(), "+14155550123");
    }

    #[test]
    fn test_phone_number_invalid() {
        assert!(PhoneNumber::parse("14155550123").is_none());
        assert!(PhoneNumber::parse("+123").is_none());
        assert!(PhoneNumber::parse("+1415555abcd").is_none());
        assert!(PhoneNumber::parse("+12345678901234567").is_none());
    }

    #[test]
    fn test_template_variable_roundtrip() {
        let var = TemplateVariable::new("customer_name", "Ana");
        let json = serde_json::to_string(&var).unwrap();
        let back: TemplateVariable = serde_json::from_str(&json).unwrap();
        assert_eq!(var, back);
    }
}
