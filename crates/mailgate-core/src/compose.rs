//! Inbound compose requests and their validation

use crate::{CoreError, CoreResult};
use mailgate_ses::{MessageBody, OutgoingMessage};
use serde::Deserialize;

const MISSING_FIELDS: &str = "Missing required fields: to, subject, body";

/// One address or a list of addresses
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    fn into_vec(self) -> Vec<String> {
        let all = match self {
            Recipients::One(address) => vec![address],
            Recipients::Many(addresses) => addresses,
        };
        all.into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// Body of `POST /email` as the caller sent it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    #[serde(default)]
    pub to: Option<Recipients>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_draft: Option<bool>,
    #[serde(default)]
    pub is_html: Option<bool>,
    #[serde(default)]
    pub cc: Option<Recipients>,
    #[serde(default)]
    pub bcc: Option<Recipients>,
}

/// A compose request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub is_draft: bool,
}

impl ComposeRequest {
    /// Check required fields. Runs before any provider is contacted.
    pub fn validate(self) -> CoreResult<OutgoingMail> {
        let to = self.to.map(Recipients::into_vec).unwrap_or_default();
        let subject = self.subject.filter(|s| !s.is_empty());
        let body = self.body.filter(|b| !b.is_empty());

        let (subject, body) = match (to.is_empty(), subject, body) {
            (false, Some(subject), Some(body)) => (subject, body),
            _ => return Err(CoreError::Validation(MISSING_FIELDS.to_string())),
        };

        Ok(OutgoingMail {
            to,
            cc: self.cc.map(Recipients::into_vec).unwrap_or_default(),
            bcc: self.bcc.map(Recipients::into_vec).unwrap_or_default(),
            subject,
            body,
            is_html: self.is_html.unwrap_or(false),
            is_draft: self.is_draft.unwrap_or(false),
        })
    }
}

impl OutgoingMail {
    /// Provider-native message with exactly one body representation
    pub fn to_message(&self) -> OutgoingMessage {
        let mut message =
            OutgoingMessage::new(self.subject.clone(), MessageBody::new(self.body.clone(), self.is_html));
        message.to = self.to.clone();
        message.cc = self.cc.clone();
        message.bcc = self.bcc.clone();
        message
    }
}
