//! Transactional sending for Mailgate
//!
//! Hands messages to Amazon SES through its regional SMTP interface and
//! synthesizes identifiers for drafts that are kept locally.

mod client;
mod error;

pub use client::{
    build_lettre_message, parse_smtp_message_id, DraftReceipt, MessageBody, OutgoingMessage,
    SendReceipt, SesClient, SesConfig, DEFAULT_FROM_ADDRESS,
};
pub use error::{SesError, SesResult};
