//! Reduce provider-native items and local records to the canonical shapes

use crate::model::{Draft, MailRecord, Message, Participant, Source};
use chrono::{DateTime, SecondsFormat, Utc};
use mailgate_zoho::{parse_address_text, ZohoAddressList, ZohoMessage};
use tracing::debug;

/// Canonical timestamp text: RFC 3339, UTC, millisecond precision
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts epoch milliseconds or RFC 3339. Anything else yields `None`.
pub fn iso_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    } else {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    };

    if parsed.is_none() {
        debug!("Dropping unparseable timestamp {:?}", raw);
    }
    parsed.map(format_timestamp)
}

fn participants(list: &ZohoAddressList) -> Vec<Participant> {
    list.iter()
        .filter(|a| !a.address.trim().is_empty())
        .map(|a| Participant::new(a.name.clone(), a.address.trim()))
        .collect()
}

/// Stored addresses may carry a display name (`Bob <bob@x.com>`)
fn stored_participants(addresses: &[String]) -> Vec<Participant> {
    addresses
        .iter()
        .flat_map(|a| parse_address_text(a))
        .map(|a| Participant::new(a.name, a.address))
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// An unread message from a search listing. Content is attached later.
pub fn unread_message(msg: &ZohoMessage) -> Message {
    Message {
        id: msg.message_id.clone(),
        subject: msg.subject.clone(),
        from: participants(&msg.from_address),
        to: participants(&msg.to_address),
        cc: participants(&msg.cc_address),
        bcc: Vec::new(),
        received_time: msg.received_time.as_deref().and_then(iso_timestamp),
        snippet: non_empty(msg.preview()),
        has_attachments: msg.has_attachment,
        // the listing was filtered on unread
        is_unread: msg.is_unread.unwrap_or(true),
        content: None,
        content_type: None,
        source: Source::Zoho,
    }
}

/// A message from the provider's Drafts folder
pub fn zoho_draft(msg: &ZohoMessage) -> Draft {
    Draft {
        id: msg.message_id.clone(),
        subject: msg.subject.clone(),
        to: participants(&msg.to_address),
        cc: participants(&msg.cc_address),
        bcc: Vec::new(),
        body: None,
        snippet: non_empty(msg.preview()),
        is_html: false,
        created_at: msg.received_time.as_deref().and_then(iso_timestamp),
        status: "draft".to_string(),
        source: Source::Zoho,
    }
}

/// A locally recorded draft
pub fn record_draft(record: &MailRecord) -> Draft {
    Draft {
        id: record.id.clone(),
        subject: Some(record.subject.clone()),
        to: stored_participants(&record.to),
        cc: stored_participants(&record.cc),
        bcc: stored_participants(&record.bcc),
        body: Some(record.body.clone()),
        snippet: None,
        is_html: record.is_html,
        created_at: Some(format_timestamp(record.created_at)),
        status: record.status.clone(),
        source: Source::Local,
    }
}
