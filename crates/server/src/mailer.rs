//! Outbound mail: a transport trait over SMTP plus the quote dispatch flow
//! (reload detail, render the PDF, gather supplementary attachments, send
//! one multipart message to every recipient).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MessagePart, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{info, warn};

use quotedesk_core::config::MailConfig;
use quotedesk_core::domain::attachment::AttachmentKind;
use quotedesk_core::ServiceError;
use quotedesk_db::repositories::{
    AttachmentRepository, ClientRepository, QuoteRepository, SqlAttachmentRepository,
    SqlClientRepository, SqlQuoteRepository,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::pdf::render_quote_pdf;
use crate::storage::StorageError;

const QUOTE_EMAIL_TEMPLATE: &str = include_str!("../../../templates/email/quote.html.tera");

#[derive(Debug, Error)]
pub enum MailError {
    #[error("address error: {0}")]
    Address(String),
    #[error("message building error: {0}")]
    Message(String),
    #[error("smtp error: {0}")]
    Smtp(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Clone, Debug)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError>;
}

/// Lettre-backed SMTP implementation.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let from = config
            .from_address
            .parse()
            .map_err(|error| MailError::Address(format!("mail.from_address: {error}")))?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port);

        if config.use_tls {
            let tls = TlsParameters::new(config.smtp_host.clone())
                .map_err(|error| MailError::Config(format!("tls setup: {error}")))?;
            builder = builder.tls(Tls::Required(tls));
        } else {
            builder = builder.tls(Tls::None);
        }

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            ));
        }

        Ok(Self { transport: builder.build(), from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(&email.subject);
        for recipient in &email.to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|error| MailError::Address(format!("recipient `{recipient}`: {error}")))?;
            builder = builder.to(mailbox);
        }

        let mut multipart = MultiPart::mixed().singlepart(SinglePart::html(email.html.clone()));
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|error| {
                MailError::Message(format!(
                    "bad content type `{}`: {error}",
                    attachment.content_type
                ))
            })?;
            multipart = multipart.singlepart(
                MessagePart::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }

        let message = builder
            .multipart(multipart)
            .map_err(|error| MailError::Message(error.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|error| MailError::Smtp(error.to_string()))
    }
}

/// Drops messages on the floor; used when no SMTP host is configured.
pub struct NoopMailer;

#[async_trait]
impl MailTransport for NoopMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        warn!(
            event_name = "mail.dropped",
            subject = %email.subject,
            recipients = email.to.len(),
            "smtp is not configured, dropping outbound message"
        );
        Ok(())
    }
}

/// Result of one dispatch, echoed to the caller.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SendOutcome {
    pub quote_id: i64,
    pub recipients: Vec<String>,
    pub attachments_included: Vec<String>,
    pub attachments_skipped: Vec<String>,
}

/// Render the quote, gather supplementary attachments under `filter`, and
/// hand one message to the transport. Missing attachment files are skipped
/// with a warning; a transport failure fails the whole operation.
pub async fn dispatch_quote_email(
    state: &AppState,
    quote_id: i64,
    explicit_recipients: Option<Vec<String>>,
    filter: Option<AttachmentKind>,
) -> Result<SendOutcome, ApiError> {
    let detail = SqlQuoteRepository::new(state.db_pool.clone())
        .detail(quote_id)
        .await?
        .ok_or_else(|| ApiError(ServiceError::not_found("quote")))?;

    let pdf_bytes = render_quote_pdf(&detail)
        .map_err(|error| ApiError(ServiceError::Render(error.to_string())))?;

    let recipients = match explicit_recipients.filter(|list| !list.is_empty()) {
        Some(list) => list,
        None => {
            // Primary address plus the client's alternate recipient list.
            let mut list = vec![detail.client.email.clone()];
            let alternates = SqlClientRepository::new(state.db_pool.clone())
                .list_emails(detail.client.id)
                .await?;
            for alternate in alternates {
                if !list.contains(&alternate.email) {
                    list.push(alternate.email);
                }
            }
            list
        }
    };

    // The quote PDF is the primary attachment; supplementary files follow.
    let mut attachments = vec![EmailAttachment {
        filename: format!("quote_{}.pdf", detail.id),
        content_type: "application/pdf".to_string(),
        data: pdf_bytes,
    }];

    let mut included = Vec::new();
    let mut skipped = Vec::new();
    if let Some(filter) = filter {
        let candidates = SqlAttachmentRepository::new(state.db_pool.clone())
            .list_active_by_kind(filter)
            .await?;
        for candidate in candidates {
            match state.files.read(&candidate.url).await {
                Ok(data) => {
                    let filename = stored_filename(&candidate.url, &candidate.name);
                    attachments.push(EmailAttachment {
                        content_type: guess_content_type(&filename).to_string(),
                        filename,
                        data,
                    });
                    included.push(candidate.name);
                }
                Err(StorageError::Missing(_)) => {
                    warn!(
                        event_name = "mail.attachment.missing",
                        attachment_id = candidate.id,
                        url = %candidate.url,
                        "attachment file is gone, sending without it"
                    );
                    skipped.push(candidate.name);
                }
                Err(error) => {
                    warn!(
                        event_name = "mail.attachment.unreadable",
                        attachment_id = candidate.id,
                        error = %error,
                        "attachment file could not be read, sending without it"
                    );
                    skipped.push(candidate.name);
                }
            }
        }
    }

    let html = quote_email_html(&detail.client.fullname, detail.id)
        .map_err(|error| ApiError(ServiceError::Send(format!("email template: {error}"))))?;

    let email = OutboundEmail {
        to: recipients.clone(),
        subject: format!("Quote No. {}", detail.id),
        html,
        attachments,
    };

    state
        .mailer
        .send(email)
        .await
        .map_err(|error| ApiError(ServiceError::Send(error.to_string())))?;

    info!(
        event_name = "mail.quote.sent",
        quote_id,
        recipients = recipients.len(),
        included = included.len(),
        skipped = skipped.len(),
        "quote email dispatched"
    );

    Ok(SendOutcome {
        quote_id,
        recipients,
        attachments_included: included,
        attachments_skipped: skipped,
    })
}

fn quote_email_html(client_name: &str, quote_id: i64) -> Result<String, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template("quote_email.html", QUOTE_EMAIL_TEMPLATE)?;

    let mut context = Context::new();
    context.insert("client_name", client_name);
    context.insert("quote_id", &quote_id);
    tera.render("quote_email.html", &context)
}

/// Human-facing filename for a stored attachment: the stored name without
/// its uuid prefix, falling back to the record name.
fn stored_filename(url: &str, record_name: &str) -> String {
    let tail = url.rsplit('/').next().unwrap_or_default();
    match tail.split_once('_') {
        Some((_, original)) if !original.is_empty() => original.to_string(),
        _ => record_name.to_string(),
    }
}

fn guess_content_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
