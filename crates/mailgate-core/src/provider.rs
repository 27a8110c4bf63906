//! Seams between the gateway and the concrete mailbox and sender clients

use crate::model::MailRecord;
use crate::{CoreResult, OutgoingMail};
use async_trait::async_trait;
use mailgate_ses::SesClient;
use mailgate_zoho::{ZohoMailClient, ZohoMessage, ZohoMessageContent};

/// Read side: the hosted mailbox
#[async_trait]
pub trait MailboxApi: Send + Sync {
    async fn list_unread(&self, limit: u32) -> CoreResult<Vec<ZohoMessage>>;

    async fn message_detail(&self, message_id: &str) -> CoreResult<ZohoMessageContent>;

    async fn list_drafts(&self, limit: u32, offset: u32) -> CoreResult<Vec<ZohoMessage>>;

    async fn mark_read(&self, message_id: &str) -> CoreResult<()>;
}

/// Write side: the transactional sender
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send and return the provider's message id
    async fn send(&self, mail: &OutgoingMail) -> CoreResult<String>;

    /// Produce the draft record for `mail`; persisting it is up to the caller
    async fn save_draft(&self, mail: &OutgoingMail) -> CoreResult<MailRecord>;
}

#[async_trait]
impl MailboxApi for ZohoMailClient {
    async fn list_unread(&self, limit: u32) -> CoreResult<Vec<ZohoMessage>> {
        Ok(ZohoMailClient::list_unread(self, limit).await?)
    }

    async fn message_detail(&self, message_id: &str) -> CoreResult<ZohoMessageContent> {
        Ok(ZohoMailClient::message_detail(self, message_id).await?)
    }

    async fn list_drafts(&self, limit: u32, offset: u32) -> CoreResult<Vec<ZohoMessage>> {
        Ok(ZohoMailClient::list_drafts(self, limit, offset).await?)
    }

    async fn mark_read(&self, message_id: &str) -> CoreResult<()> {
        Ok(ZohoMailClient::mark_read(self, message_id).await?)
    }
}

#[async_trait]
impl MailSender for SesClient {
    async fn send(&self, mail: &OutgoingMail) -> CoreResult<String> {
        let receipt = SesClient::send(self, &mail.to_message()).await?;
        Ok(receipt.message_id)
    }

    async fn save_draft(&self, mail: &OutgoingMail) -> CoreResult<MailRecord> {
        let receipt = SesClient::save_draft(self, &mail.to_message()).await?;
        Ok(MailRecord::draft(receipt.draft_id, mail, receipt.created_at))
    }
}
