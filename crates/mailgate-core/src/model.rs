//! Normalized shapes handed to callers and the persisted mail record

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A mailbox participant. `name` is omitted when the provider has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl Participant {
    pub fn new(name: Option<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.filter(|n| !n.trim().is_empty()),
            email: email.into(),
        }
    }
}

/// Which backend produced an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Local,
    Zoho,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Local => "local",
            Source::Zoho => "zoho",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "local" => Ok(Source::Local),
            "zoho" => Ok(Source::Zoho),
            other => Err(CoreError::Validation(format!(
                "Unknown drafts source: {} (expected local or zoho)",
                other
            ))),
        }
    }
}

/// A mailbox message in the one shape every provider is reduced to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub subject: Option<String>,
    pub from: Vec<Participant>,
    pub to: Vec<Participant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Participant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Participant>,
    /// ISO-8601, UTC
    pub received_time: Option<String>,
    pub snippet: Option<String>,
    pub has_attachments: bool,
    pub is_unread: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub source: Source,
}

/// A draft, whether kept locally or in the provider's Drafts folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    pub subject: Option<String>,
    pub to: Vec<Participant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Participant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Participant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub is_html: bool,
    /// ISO-8601, UTC
    pub created_at: Option<String>,
    pub status: String,
    pub source: Source,
}

/// Kind of a persisted record; fixed when the record is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Draft,
    Sent,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Draft => "draft",
            RecordKind::Sent => "sent",
        }
    }

    /// Status written alongside a record of this kind
    pub fn status(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for RecordKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "draft" => Ok(RecordKind::Draft),
            "sent" => Ok(RecordKind::Sent),
            other => Err(CoreError::DatabaseError(format!("Unknown record kind: {}", other))),
        }
    }
}

/// Append-only log entry for a message this system sent or drafted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailRecord {
    pub id: String,
    pub kind: RecordKind,
    /// Provider message id, for sent mail
    pub message_id: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl MailRecord {
    /// Record for a draft saved under `draft_id`
    pub fn draft(draft_id: impl Into<String>, mail: &crate::OutgoingMail, created_at: DateTime<Utc>) -> Self {
        Self {
            id: draft_id.into(),
            kind: RecordKind::Draft,
            message_id: None,
            to: mail.to.clone(),
            cc: mail.cc.clone(),
            bcc: mail.bcc.clone(),
            subject: mail.subject.clone(),
            body: mail.body.clone(),
            is_html: mail.is_html,
            created_at,
            sent_at: None,
            status: RecordKind::Draft.status().to_string(),
        }
    }

    /// Record for mail accepted by the sender as `message_id`
    pub fn sent(
        id: impl Into<String>,
        message_id: impl Into<String>,
        mail: &crate::OutgoingMail,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: RecordKind::Sent,
            message_id: Some(message_id.into()),
            to: mail.to.clone(),
            cc: mail.cc.clone(),
            bcc: mail.bcc.clone(),
            subject: mail.subject.clone(),
            body: mail.body.clone(),
            is_html: mail.is_html,
            created_at: sent_at,
            sent_at: Some(sent_at),
            status: RecordKind::Sent.status().to_string(),
        }
    }
}
