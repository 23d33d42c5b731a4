//! SMTP mailer — authenticated session, HTML body, inline attachments.

use async_trait::async_trait;
use duemail_core::config::{MailConfig, RecipientHeader, TlsMode};
use duemail_core::error::{DueMailError, Result};
use duemail_core::traits::Mailer;
use duemail_core::types::{Attachment, RenderedMessage};
use lettre::message::header::ContentType;
use lettre::message::{Attachment as InlinePart, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

const DEFAULT_DISPLAY_NAME: &str = "Overdue Reminder";

/// Mail dispatcher over an authenticated SMTP session.
pub struct SmtpMailer {
    config: MailConfig,
    host: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the transport. Does not connect; see [`SmtpMailer::verify`].
    pub fn new(config: &MailConfig) -> Result<Self> {
        let host = config.resolve_host()?;
        let port = config.resolve_port();

        let builder = match config.tls {
            TlsMode::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
                .map_err(|e| DueMailError::Mail(format!("SMTP relay: {e}")))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
                .map_err(|e| DueMailError::Mail(format!("SMTP relay: {e}")))?,
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host),
        };
        let builder = builder.port(port);
        let transport = if config.password.is_empty() {
            builder.build()
        } else {
            let creds = Credentials::new(config.login().to_string(), config.password.clone());
            builder.credentials(creds).build()
        };

        tracing::debug!("📮 SMTP transport ready: {host}:{port} ({:?})", config.tls);
        Ok(Self {
            config: config.clone(),
            host,
            transport,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Open a connection and authenticate, so bad credentials surface
    /// before any data is queried.
    pub async fn verify(&self) -> Result<()> {
        match self.transport.test_connection().await {
            Ok(true) => {
                tracing::info!("📧 SMTP connected: {} via {}", self.config.email, self.host);
                Ok(())
            }
            Ok(false) => Err(DueMailError::Mail(format!(
                "SMTP server {} did not accept the connection",
                self.host
            ))),
            Err(e) => Err(DueMailError::Mail(format!("SMTP connect {}: {e}", self.host))),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: &RenderedMessage) -> Result<()> {
        let email = build_message(&self.config, message).await?;
        self.transport
            .send(email)
            .await
            .map_err(|e| DueMailError::Mail(format!("SMTP send: {e}")))?;
        tracing::debug!("📤 SMTP accepted '{}'", message.subject);
        Ok(())
    }
}

/// Assemble the MIME message for one branch.
pub async fn build_message(config: &MailConfig, message: &RenderedMessage) -> Result<Message> {
    let from_name = config.display_name.as_deref().unwrap_or(DEFAULT_DISPLAY_NAME);
    let from: Mailbox = format!("{from_name} <{}>", config.email)
        .parse()
        .map_err(|e| DueMailError::Mail(format!("Invalid from: {e}")))?;

    let mut builder = Message::builder().from(from).subject(message.subject.clone());
    for address in &message.recipients {
        let mailbox: Mailbox = address
            .parse()
            .map_err(|e| DueMailError::Mail(format!("Invalid recipient '{address}': {e}")))?;
        builder = match config.recipient_header {
            RecipientHeader::Cc => builder.cc(mailbox),
            RecipientHeader::To => builder.to(mailbox),
        };
    }

    let mut body = MultiPart::related().singlepart(SinglePart::html(message.html_body.clone()));
    for attachment in &config.attachments {
        body = body.singlepart(inline_part(attachment).await?);
    }

    builder
        .multipart(body)
        .map_err(|e| DueMailError::Mail(format!("Build email: {e}")))
}

async fn inline_part(attachment: &Attachment) -> Result<SinglePart> {
    let bytes = tokio::fs::read(&attachment.path).await.map_err(|e| {
        DueMailError::Mail(format!(
            "Attachment {}: {e}",
            attachment.path.display()
        ))
    })?;
    let mime = mime_guess::from_path(&attachment.path).first_or_octet_stream();
    let content_type = ContentType::parse(mime.essence_str())
        .map_err(|e| DueMailError::Mail(format!("Content type {mime}: {e}")))?;
    Ok(InlinePart::new_inline(attachment.content_id.clone()).body(bytes, content_type))
}
