//! Core gateway logic for Mailgate
//!
//! Routes reads to the mailbox provider and sends to the transactional
//! sender, normalizes what comes back, and keeps the local mail record log.

mod compose;
mod error;
mod gateway;
mod model;
pub mod normalize;
mod provider;
mod store;

pub use compose::{ComposeRequest, OutgoingMail, Recipients};
pub use error::{CoreError, CoreResult};
pub use gateway::{DraftListing, MailGateway, SubmitOutcome, UnreadListing, DEFAULT_LIMIT};
pub use model::{Draft, MailRecord, Message, Participant, RecordKind, Source};
pub use provider::{MailSender, MailboxApi};
pub use store::RecordStore;
