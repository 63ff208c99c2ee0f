//! Inbound release webhooks.
//!
//! - [`signature`]: HMAC-SHA256 verification of the raw body
//! - [`payload`]: the subset of the `release` event the watcher reads

pub mod payload;
pub mod signature;

pub use payload::{ReleaseEvent, ReleasePayload, RepositoryPayload};
pub use signature::{
    SIGNATURE_HEADER, SignatureError, WebhookSecret, format_signature_header,
    parse_signature_header,
};
