//! Routes each operation to the backend that owns it and normalizes the results

use crate::model::{Draft, MailRecord, Message, Source};
use crate::normalize;
use crate::provider::{MailSender, MailboxApi};
use crate::store::RecordStore;
use crate::{ComposeRequest, CoreError, CoreResult};
use futures::future::join_all;
use mailgate_auth::Clock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Page size when the caller gives none
pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct UnreadListing {
    pub emails: Vec<Message>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftListing {
    pub drafts: Vec<Draft>,
    pub count: usize,
    pub source: Source,
}

/// What `submit` did with a compose request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent { email_id: String, message_id: String },
    Draft { draft_id: String },
}

fn log_failure<T>(operation: &str, result: CoreResult<T>) -> CoreResult<T> {
    if let Err(e) = &result {
        error!(operation = operation, "Gateway operation failed: {}", e);
    }
    result
}

/// Reads go to the mailbox, sends and drafts go to the sender, and every
/// send or draft is logged in the record store.
pub struct MailGateway {
    mailbox: Arc<dyn MailboxApi>,
    sender: Arc<dyn MailSender>,
    store: RecordStore,
    clock: Arc<dyn Clock>,
}

impl MailGateway {
    pub fn new(
        mailbox: Arc<dyn MailboxApi>,
        sender: Arc<dyn MailSender>,
        store: RecordStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mailbox,
            sender,
            store,
            clock,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Unread messages, optionally with their bodies
    pub async fn list_unread(&self, limit: u32, with_content: bool) -> CoreResult<UnreadListing> {
        log_failure("list_unread", self.fetch_unread(limit, with_content).await)
    }

    async fn fetch_unread(&self, limit: u32, with_content: bool) -> CoreResult<UnreadListing> {
        let raw = self.mailbox.list_unread(limit).await?;
        let mut emails: Vec<Message> = raw
            .iter()
            .take(limit as usize)
            .map(normalize::unread_message)
            .collect();

        if with_content && !emails.is_empty() {
            emails = self.attach_content(emails).await;
        }

        info!("Listed {} unread emails", emails.len());
        Ok(UnreadListing {
            count: emails.len(),
            emails,
        })
    }

    /// Fetch bodies concurrently. A failed fetch leaves that message without
    /// content; order is preserved.
    async fn attach_content(&self, emails: Vec<Message>) -> Vec<Message> {
        join_all(emails.into_iter().map(|mut email| async move {
            match self.mailbox.message_detail(&email.id).await {
                Ok(detail) => {
                    email.content = detail.content;
                    email.content_type = detail.content_type;
                }
                Err(e) => warn!("Error fetching content for email {}: {}", email.id, e),
            }
            email
        }))
        .await
    }

    /// Drafts from the local record store or from the mailbox provider
    pub async fn list_drafts(&self, source: Source, limit: u32, offset: u32) -> CoreResult<DraftListing> {
        let result = match source {
            Source::Local => self
                .store
                .list_drafts(limit)
                .await
                .map(|records| records.iter().map(normalize::record_draft).collect()),
            Source::Zoho => self.mailbox.list_drafts(limit, offset).await.map(|drafts| {
                drafts
                    .iter()
                    .take(limit as usize)
                    .map(normalize::zoho_draft)
                    .collect()
            }),
        };

        let drafts: Vec<Draft> = log_failure("list_drafts", result)?;
        Ok(DraftListing {
            count: drafts.len(),
            drafts,
            source,
        })
    }

    /// Send a message or save it as a draft
    pub async fn submit(&self, request: ComposeRequest) -> CoreResult<SubmitOutcome> {
        let mail = request.validate()?;

        let result = if mail.is_draft {
            self.save_draft(&mail).await
        } else {
            self.send(&mail).await
        };
        log_failure("submit", result)
    }

    async fn save_draft(&self, mail: &crate::OutgoingMail) -> CoreResult<SubmitOutcome> {
        let record = self.sender.save_draft(mail).await?;
        self.store.append(&record).await?;

        info!("Saved draft {}", record.id);
        Ok(SubmitOutcome::Draft { draft_id: record.id })
    }

    async fn send(&self, mail: &crate::OutgoingMail) -> CoreResult<SubmitOutcome> {
        let message_id = self.sender.send(mail).await?;

        let email_id = Uuid::new_v4().to_string();
        let record = MailRecord::sent(email_id.clone(), message_id.clone(), mail, self.clock.now());
        self.store.append(&record).await?;

        info!("Sent email {} (provider id {})", email_id, message_id);
        Ok(SubmitOutcome::Sent { email_id, message_id })
    }

    /// Mark a mailbox message as read
    pub async fn mark_read(&self, message_id: &str) -> CoreResult<()> {
        if message_id.trim().is_empty() {
            return Err(CoreError::Validation("Missing email id".to_string()));
        }
        log_failure("mark_read", self.mailbox.mark_read(message_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordKind;
    use crate::OutgoingMail;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use mailgate_auth::ManualClock;
    use mailgate_zoho::{ZohoMessage, ZohoMessageContent};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMailbox {
        unread: Vec<ZohoMessage>,
        drafts: Vec<ZohoMessage>,
        failing_detail: Option<String>,
        calls: AtomicUsize,
        marked: Mutex<Vec<String>>,
        fail_listing: bool,
    }

    fn zoho(id: &str) -> ZohoMessage {
        serde_json::from_value(json!({
            "messageId": id,
            "subject": format!("Subject {}", id),
            "fromAddress": [{ "address": "alice@example.com" }],
            "receivedTime": "1700000000000"
        }))
        .unwrap()
    }

    #[async_trait]
    impl MailboxApi for FakeMailbox {
        async fn list_unread(&self, _limit: u32) -> CoreResult<Vec<ZohoMessage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing {
                return Err(CoreError::MailboxProvider {
                    status: Some(503),
                    message: "unavailable".into(),
                });
            }
            Ok(self.unread.clone())
        }

        async fn message_detail(&self, message_id: &str) -> CoreResult<ZohoMessageContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_detail.as_deref() == Some(message_id) {
                return Err(CoreError::MailboxProvider {
                    status: Some(500),
                    message: "boom".into(),
                });
            }
            Ok(ZohoMessageContent {
                content: Some(format!("body of {}", message_id)),
                content_type: Some("text/html".into()),
            })
        }

        async fn list_drafts(&self, _limit: u32, _offset: u32) -> CoreResult<Vec<ZohoMessage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.drafts.clone())
        }

        async fn mark_read(&self, message_id: &str) -> CoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.marked.lock().unwrap().push(message_id.to_string());
            Ok(())
        }
    }

    struct FakeSender {
        clock: Arc<ManualClock>,
        sends: AtomicUsize,
        drafts: AtomicUsize,
        reject: bool,
    }

    #[async_trait]
    impl MailSender for FakeSender {
        async fn send(&self, _mail: &OutgoingMail) -> CoreResult<String> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(CoreError::Send("Email address is not verified".into()));
            }
            Ok("ses-message-1".to_string())
        }

        async fn save_draft(&self, mail: &OutgoingMail) -> CoreResult<MailRecord> {
            let n = self.drafts.fetch_add(1, Ordering::SeqCst);
            let now = self.clock.now();
            Ok(MailRecord::draft(
                format!("draft-{}-{:08x}", now.timestamp_millis(), n),
                mail,
                now,
            ))
        }
    }

    struct Harness {
        gateway: MailGateway,
        mailbox: Arc<FakeMailbox>,
        sender: Arc<FakeSender>,
        clock: Arc<ManualClock>,
    }

    async fn harness(mailbox: FakeMailbox, reject_sends: bool) -> Harness {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mailbox = Arc::new(mailbox);
        let sender = Arc::new(FakeSender {
            clock: clock.clone(),
            sends: AtomicUsize::new(0),
            drafts: AtomicUsize::new(0),
            reject: reject_sends,
        });
        let store = RecordStore::open_memory("emails").await.unwrap();
        let gateway = MailGateway::new(mailbox.clone(), sender.clone(), store, clock.clone());
        Harness {
            gateway,
            mailbox,
            sender,
            clock,
        }
    }

    fn compose(value: serde_json::Value) -> ComposeRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_unread_without_content_skips_detail_calls() {
        let h = harness(
            FakeMailbox {
                unread: vec![zoho("1"), zoho("2")],
                ..Default::default()
            },
            false,
        )
        .await;

        let listing = h.gateway.list_unread(10, false).await.unwrap();
        assert_eq!(listing.count, 2);
        assert!(listing.emails.iter().all(|m| m.content.is_none()));
        assert_eq!(h.mailbox.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unread_content_failure_is_isolated() {
        let h = harness(
            FakeMailbox {
                unread: vec![zoho("1"), zoho("2"), zoho("3")],
                failing_detail: Some("2".into()),
                ..Default::default()
            },
            false,
        )
        .await;

        let listing = h.gateway.list_unread(10, true).await.unwrap();
        let ids: Vec<&str> = listing.emails.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(listing.count, 3);
        assert_eq!(listing.emails[0].content.as_deref(), Some("body of 1"));
        assert_eq!(listing.emails[1].content, None);
        assert_eq!(listing.emails[2].content.as_deref(), Some("body of 3"));
    }

    #[tokio::test]
    async fn test_unread_respects_limit() {
        let h = harness(
            FakeMailbox {
                unread: vec![zoho("1"), zoho("2"), zoho("3")],
                ..Default::default()
            },
            false,
        )
        .await;

        let listing = h.gateway.list_unread(2, false).await.unwrap();
        assert_eq!(listing.count, 2);
    }

    #[tokio::test]
    async fn test_unread_listing_failure_propagates() {
        let h = harness(
            FakeMailbox {
                fail_listing: true,
                ..Default::default()
            },
            false,
        )
        .await;

        let err = h.gateway.list_unread(10, true).await.unwrap_err();
        assert!(matches!(err, CoreError::MailboxProvider { status: Some(503), .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_provider_call() {
        let h = harness(FakeMailbox::default(), false).await;

        let err = h
            .gateway
            .submit(compose(json!({ "subject": "x", "body": "y" })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: to, subject, body");
        assert_eq!(err.status_code(), 400);
        assert_eq!(h.sender.sends.load(Ordering::SeqCst), 0);
        assert_eq!(h.sender.drafts.load(Ordering::SeqCst), 0);
        assert_eq!(h.gateway.store().count(RecordKind::Draft).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_saved_draft_is_listed_locally() {
        let h = harness(FakeMailbox::default(), false).await;

        let outcome = h
            .gateway
            .submit(compose(json!({
                "to": "a@example.com",
                "subject": "Plan",
                "body": "<p>hi</p>",
                "isHtml": true,
                "isDraft": true
            })))
            .await
            .unwrap();
        let draft_id = match outcome {
            SubmitOutcome::Draft { draft_id } => draft_id,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(h.sender.sends.load(Ordering::SeqCst), 0);

        let listing = h.gateway.list_drafts(Source::Local, 10, 0).await.unwrap();
        assert_eq!(listing.count, 1);
        assert_eq!(listing.source, Source::Local);
        let draft = &listing.drafts[0];
        assert_eq!(draft.id, draft_id);
        assert_eq!(draft.subject.as_deref(), Some("Plan"));
        assert!(draft.is_html);
        assert_eq!(draft.to[0].email, "a@example.com");
    }

    #[tokio::test]
    async fn test_local_drafts_newest_first() {
        let h = harness(FakeMailbox::default(), false).await;

        for subject in ["first", "second"] {
            h.gateway
                .submit(compose(json!({
                    "to": ["a@example.com"],
                    "subject": subject,
                    "body": "b",
                    "isDraft": true
                })))
                .await
                .unwrap();
            h.clock.advance(chrono::Duration::seconds(1));
        }

        let listing = h.gateway.list_drafts(Source::Local, 10, 0).await.unwrap();
        let subjects: Vec<_> = listing.drafts.iter().map(|d| d.subject.clone().unwrap()).collect();
        assert_eq!(subjects, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_send_records_exactly_one_sent_entry() {
        let h = harness(FakeMailbox::default(), false).await;

        let outcome = h
            .gateway
            .submit(compose(json!({
                "to": "a@example.com",
                "subject": "Hi",
                "body": "plain"
            })))
            .await
            .unwrap();

        match outcome {
            SubmitOutcome::Sent { email_id, message_id } => {
                assert_eq!(message_id, "ses-message-1");
                assert!(Uuid::parse_str(&email_id).is_ok());

                let sent = h.gateway.store().list(RecordKind::Sent, 10).await.unwrap();
                assert_eq!(sent.len(), 1);
                assert_eq!(sent[0].id, email_id);
                assert_eq!(sent[0].message_id.as_deref(), Some("ses-message-1"));
                assert_eq!(sent[0].sent_at, Some(h.clock.now()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.gateway.store().count(RecordKind::Draft).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_send_records_nothing() {
        let h = harness(FakeMailbox::default(), true).await;

        let err = h
            .gateway
            .submit(compose(json!({ "to": "a@example.com", "subject": "Hi", "body": "b" })))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Send(_)));
        assert_eq!(h.gateway.store().count(RecordKind::Sent).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zoho_drafts_and_mark_read() {
        let h = harness(
            FakeMailbox {
                drafts: vec![zoho("d1"), zoho("d2")],
                ..Default::default()
            },
            false,
        )
        .await;

        let listing = h.gateway.list_drafts(Source::Zoho, 1, 0).await.unwrap();
        assert_eq!(listing.count, 1);
        assert_eq!(listing.drafts[0].source, Source::Zoho);

        h.gateway.mark_read("m1").await.unwrap();
        assert_eq!(*h.mailbox.marked.lock().unwrap(), vec!["m1".to_string()]);
        assert!(matches!(
            h.gateway.mark_read(" ").await,
            Err(CoreError::Validation(_))
        ));
    }

    struct StaticSecrets;

    #[async_trait]
    impl mailgate_auth::SecretBackend for StaticSecrets {
        async fn fetch(&self, _secret_id: &str) -> mailgate_auth::AuthResult<String> {
            Ok(json!({ "emailFrom": "me@example.com" }).to_string())
        }
    }

    #[tokio::test]
    async fn test_draft_with_partial_recipient_is_saved_through_ses() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let secrets = Arc::new(mailgate_auth::SecretStore::new(
            Arc::new(StaticSecrets),
            "test",
            clock.clone(),
        ));
        let ses = mailgate_ses::SesClient::new(mailgate_ses::SesConfig::default(), secrets, clock.clone());
        let store = RecordStore::open_memory("emails").await.unwrap();
        let gateway = MailGateway::new(Arc::new(FakeMailbox::default()), Arc::new(ses), store, clock);

        let outcome = gateway
            .submit(compose(json!({
                "to": "bob",
                "subject": "Unfinished",
                "body": "fill in later",
                "isDraft": true
            })))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Draft { .. }));

        let listing = gateway.list_drafts(Source::Local, 10, 0).await.unwrap();
        assert_eq!(listing.drafts[0].to[0].email, "bob");
    }
}
