use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{CommunicationError, SmtpSettings};
use crate::services::render;

/// SMTP delivery over STARTTLS with multipart text plus HTML bodies.
pub struct EmailService {
    settings: SmtpSettings,
}

impl EmailService {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, CommunicationError> {
        let builder = if self.settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.server)
                .map_err(|e| CommunicationError::DeliveryFailed(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.settings.server)
        };

        Ok(builder
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ))
            .build())
    }

    fn from_mailbox(&self) -> Result<Mailbox, CommunicationError> {
        let address: Address = self.settings.from_email.parse().map_err(|_| {
            CommunicationError::ValidationError(format!(
                "Invalid sender address: {}",
                self.settings.from_email
            ))
        })?;
        Ok(Mailbox::new(Some(self.settings.from_name.clone()), address))
    }

    fn message_id(&self) -> String {
        let domain = self
            .settings
            .from_email
            .split('@')
            .nth(1)
            .unwrap_or("localhost");
        format!("<{}@{}>", Uuid::new_v4(), domain)
    }

    /// Renders the template and sends one email per recipient list call.
    pub async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        html_content: &str,
        text_content: Option<&str>,
        template_data: &Value,
    ) -> Result<Value, CommunicationError> {
        if to.is_empty() {
            return Err(CommunicationError::ValidationError(
                "No recipients given".to_string(),
            ));
        }
        for recipient in to {
            if !render::is_valid_email(recipient) {
                return Err(CommunicationError::ValidationError(format!(
                    "Invalid recipient address: {}",
                    recipient
                )));
            }
        }

        let rendered_html = render::render_template(html_content, template_data);
        let fallback = text_content
            .map(String::from)
            .unwrap_or_else(|| render::html_to_text(html_content));
        let rendered_text = render::render_template(&fallback, template_data);

        let message_id = self.message_id();
        let mut builder = Message::builder()
            .from(self.from_mailbox()?)
            .subject(subject)
            .message_id(Some(message_id.clone()));
        for recipient in to {
            let address: Address = recipient
                .parse()
                .map_err(|_| CommunicationError::ValidationError(recipient.clone()))?;
            builder = builder.to(Mailbox::new(None, address));
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                rendered_text,
                rendered_html,
            ))
            .map_err(|e| CommunicationError::DeliveryFailed(e.to_string()))?;

        let transport = self.transport()?;
        transport.send(message).await.map_err(|e| {
            error!("SMTP send failed: {}", e);
            CommunicationError::DeliveryFailed(e.to_string())
        })?;

        info!("Email sent to {} recipients", to.len());

        Ok(json!({
            "success": true,
            "message_id": message_id,
            "recipients": to.len(),
            "timestamp": chrono::Utc::now()
        }))
    }

    /// Opens an SMTP session and authenticates without sending anything.
    pub async fn test_connection(&self) -> Result<Value, CommunicationError> {
        let transport = self.transport()?;
        match transport.test_connection().await {
            Ok(true) => Ok(json!({ "success": true, "message": "SMTP connection ok" })),
            Ok(false) => Ok(json!({ "success": false, "error": "SMTP server refused the connection" })),
            Err(e) => Ok(json!({ "success": false, "error": e.to_string() })),
        }
    }
}
