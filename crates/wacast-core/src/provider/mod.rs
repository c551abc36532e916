//! Provider Module - Outbound messaging API adapter

mod client;
mod payload;

pub use client::{CloudApiClient, ProviderClient, ProviderError, ProviderErrorKind, SendRequest};
pub use payload::{build_components, PayloadError};
