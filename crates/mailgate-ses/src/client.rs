//! SES SMTP client implementation

use crate::{SesError, SesResult};
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox, SinglePart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mailgate_auth::secrets::keys;
use mailgate_auth::{Clock, SecretStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Sender used when the credential bundle does not name a verified address
pub const DEFAULT_FROM_ADDRESS: &str = "no-reply@yourdomain.com";

/// The one body representation a message carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Html(String),
}

impl MessageBody {
    pub fn new(content: impl Into<String>, is_html: bool) -> Self {
        if is_html {
            MessageBody::Html(content.into())
        } else {
            MessageBody::Text(content.into())
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, MessageBody::Html(_))
    }

    pub fn content(&self) -> &str {
        match self {
            MessageBody::Text(s) | MessageBody::Html(s) => s,
        }
    }
}

/// Email message to send
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// From address; the configured sender is used when unset
    pub from: Option<String>,
    /// To addresses
    pub to: Vec<String>,
    /// CC addresses
    pub cc: Vec<String>,
    /// BCC addresses
    pub bcc: Vec<String>,
    /// Subject line
    pub subject: String,
    pub body: MessageBody,
}

impl OutgoingMessage {
    /// Create a new message builder
    pub fn new(subject: impl Into<String>, body: MessageBody) -> Self {
        Self {
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            body,
        }
    }

    /// Override the from address
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Add a To recipient
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add a CC recipient
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a BCC recipient
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Identifier and creation instant of a saved draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReceipt {
    pub draft_id: String,
    pub created_at: DateTime<Utc>,
}

/// SES SMTP endpoint settings
#[derive(Debug, Clone)]
pub struct SesConfig {
    pub region: String,
    pub port: u16,
    pub timeout: Duration,
}

impl SesConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            port: 587,
            timeout: Duration::from_secs(30),
        }
    }

    /// Regional SMTP interface host
    pub fn smtp_host(&self) -> String {
        format!("email-smtp.{}.amazonaws.com", self.region)
    }
}

impl Default for SesConfig {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

/// Transactional sender backed by SES
pub struct SesClient {
    config: SesConfig,
    secrets: Arc<SecretStore>,
    clock: Arc<dyn Clock>,
}

impl SesClient {
    pub fn new(config: SesConfig, secrets: Arc<SecretStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            secrets,
            clock,
        }
    }

    /// The verified sender address from the credential bundle
    pub async fn from_address(&self) -> SesResult<String> {
        let secrets = self.secrets.get_secrets().await?;
        Ok(secrets
            .get(keys::EMAIL_FROM)
            .unwrap_or(DEFAULT_FROM_ADDRESS)
            .to_string())
    }

    /// Send a message and return the provider's message id
    pub async fn send(&self, message: &OutgoingMessage) -> SesResult<SendReceipt> {
        let secrets = self.secrets.get_secrets().await?;
        let from = match &message.from {
            Some(from) => from.clone(),
            None => secrets
                .get(keys::EMAIL_FROM)
                .unwrap_or(DEFAULT_FROM_ADDRESS)
                .to_string(),
        };
        let username = secrets.require(keys::SES_SMTP_USERNAME)?.to_string();
        let password = secrets.require(keys::SES_SMTP_PASSWORD)?.to_string();

        let local_id = Uuid::new_v4().to_string();
        let email = build_lettre_message(message, &from, &format!("<{}@mailgate>", local_id))?;

        let host = self.config.smtp_host();
        info!("Sending email via SES SMTP ({}) to {} recipient(s)", host, message.to.len());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
            .map_err(|e| SesError::ConnectionFailed(e.to_string()))?
            .port(self.config.port)
            .credentials(Credentials::new(username, password))
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .timeout(Some(self.config.timeout))
            .build();

        let response = transport.send(email).await.map_err(|e| {
            error!("Error sending email via SES: {}", e);
            SesError::SendFailed(e.to_string())
        })?;

        let lines: Vec<String> = response.message().map(|line| line.to_string()).collect();
        let message_id = parse_smtp_message_id(&lines).unwrap_or(local_id);

        info!("Email sent successfully, message id {}", message_id);
        Ok(SendReceipt { message_id })
    }

    /// Save a draft.
    ///
    /// Drafts are not stored at SES and may hold incomplete recipients;
    /// addresses are only checked when the message is sent.
    pub async fn save_draft(&self, message: &OutgoingMessage) -> SesResult<DraftReceipt> {
        let created_at = self.clock.now();
        let suffix = Uuid::new_v4().simple().to_string();
        let draft_id = format!("draft-{}-{}", created_at.timestamp_millis(), &suffix[..8]);

        debug!("Synthesized draft {}", draft_id);
        Ok(DraftReceipt {
            draft_id,
            created_at,
        })
    }
}

/// Pull the message id out of an SES `250 Ok <id>` reply
pub fn parse_smtp_message_id(lines: &[String]) -> Option<String> {
    lines.iter().find_map(|line| {
        let (status, rest) = line.trim().split_once(char::is_whitespace)?;
        if !status.eq_ignore_ascii_case("ok") {
            return None;
        }
        rest.split_whitespace().next().map(str::to_string)
    })
}

fn parse_mailbox(address: &str) -> SesResult<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| SesError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Build a lettre Message with exactly one body part
pub fn build_lettre_message(
    msg: &OutgoingMessage,
    from: &str,
    message_id: &str,
) -> SesResult<Message> {
    if msg.to.is_empty() {
        return Err(SesError::InvalidAddress("no recipients".to_string()));
    }

    let mut builder = Message::builder()
        .from(parse_mailbox(from)?)
        .subject(&msg.subject)
        .message_id(Some(message_id.to_string()));

    for to in &msg.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &msg.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    for bcc in &msg.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }

    let content_type = match msg.body {
        MessageBody::Html(_) => ContentType::TEXT_HTML,
        MessageBody::Text(_) => ContentType::TEXT_PLAIN,
    };

    builder
        .singlepart(
            SinglePart::builder()
                .header(content_type)
                .body(msg.body.content().to_string()),
        )
        .map_err(|e| SesError::MessageBuildError(e.to_string()))
}
