//! Outbound email via lettre, switched between an SMTP relay and a local
//! file outbox by configuration.

use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{config::MailConfig, errors::AppError};

#[derive(Clone)]
pub struct Mailer {
    transport: Arc<MailTransport>,
    from: String,
    base_url: String,
}

enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl Mailer {
    pub fn new(config: &MailConfig, base_url: &str) -> Result<Self, AppError> {
        let (transport, from) = match config {
            MailConfig::Smtp {
                host,
                port,
                from,
                username,
                password,
            } => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(AppError::transport)?
                    .port(*port);
                if let (Some(user), Some(pass)) = (username, password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                (MailTransport::Smtp(builder.build()), from.clone())
            }
            MailConfig::File { dir, from } => {
                std::fs::create_dir_all(dir).map_err(|err| {
                    AppError::Internal(format!("create mail outbox dir: {err}"))
                })?;
                (
                    MailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir)),
                    from.clone(),
                )
            }
        };

        Ok(Self {
            transport: Arc::new(transport),
            from,
            base_url: base_url.to_string(),
        })
    }

    /// Send the registration confirmation email with the code and both
    /// confirmation paths (direct link and manual entry page).
    pub async fn send_confirmation(&self, to: &str, code: &str) -> Result<(), AppError> {
        let confirm_url = format!("{}/confirm-email/{code}", self.base_url);
        let manual_url = format!("{}/confirm-email-page", self.base_url);
        let body = format!(
            "Hello!\n\n\
             Thank you for registering with ADRAuto.\n\n\
             Confirm your email by following this link:\n{confirm_url}\n\n\
             Or enter the code on {manual_url}\nCode: {code}\n\n\
             The link and code are valid for 10 minutes.\n\n\
             If you did not register with ADRAuto, ignore this message.\n"
        );

        let message = self.build_message(to, "ADRAuto registration confirmation", body)?;
        self.send(message).await?;
        log::info!("Confirmation email sent to {to}");
        Ok(())
    }

    fn build_message(&self, to: &str, subject: &str, body: String) -> Result<Message, AppError> {
        let from = self
            .from
            .parse::<Mailbox>()
            .map_err(|err| AppError::Internal(format!("bad sender address: {err}")))?;
        let to = to
            .parse::<Mailbox>()
            .map_err(|err| AppError::Internal(format!("bad recipient address: {err}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|err| AppError::Internal(format!("build email message: {err}")))
    }

    async fn send(&self, message: Message) -> Result<(), AppError> {
        match self.transport.as_ref() {
            MailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(AppError::transport)?;
            }
            MailTransport::File(file) => {
                file.send(message).await.map_err(AppError::transport)?;
            }
        }
        Ok(())
    }
}
