use crate::config::{Config, ConfigError};
use crate::evaluate::AlertReport;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

pub const ALERT_SUBJECT: &str = "System Alert: Resource Usage Exceeded";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("could not build the alert email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AllSafe,
    Notified { alerts: usize },
}

/// Sends the whole report in one call, or nothing when it is empty.
/// A failed send is returned as is; the report is not kept anywhere.
pub async fn dispatch<N>(report: AlertReport, notifier: &N) -> Result<Outcome, NotifyError>
where
    N: Notifier + ?Sized,
{
    if report.is_empty() {
        return Ok(Outcome::AllSafe);
    }

    let alerts = report.len();
    notifier.send(ALERT_SUBJECT, &report.body()).await?;
    Ok(Outcome::Notified { alerts })
}

/// Plain-auth SMTP submission with opportunistic STARTTLS.
#[derive(Clone)]
pub struct SmtpNotifier {
    host: String,
    port: u16,
    from: Mailbox,
    to: Mailbox,
    username: String,
    password: String,
}

impl SmtpNotifier {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            host: cfg.smtp_host.trim().to_string(),
            port: cfg.port()?,
            from: mailbox("from_email", &cfg.from_email)?,
            to: mailbox("to_email", &cfg.to_email)?,
            username: cfg.from_email.trim().to_string(),
            password: cfg.email_password.clone(),
        })
    }

    fn message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        Ok(Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?)
    }
}

fn mailbox(field: &str, value: &str) -> Result<Mailbox, ConfigError> {
    value
        .trim()
        .parse::<Address>()
        .map(|address| Mailbox::new(None, address))
        .map_err(|err| ConfigError::Validation(format!("{field} '{value}': {err}")))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = self.message(subject, body)?;

        let tls = TlsParameters::new(self.host.clone())?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            .port(self.port)
            .tls(Tls::Opportunistic(tls))
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .build();

        mailer.send(email).await?;

        info!(host = %self.host, port = self.port, to = %self.to, "alert email sent");
        println!("Alert email sent successfully!");
        Ok(())
    }
}

/// Prints what would have been mailed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        println!("Subject: {subject}\n\n{body}");
        info!("dry run, alert email not sent");
        Ok(())
    }
}
