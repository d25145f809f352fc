use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{self, EmailConfig};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Posts messages to a transactional-email HTTP API with a bearer key
pub struct HttpEmailSender {
    client: reqwest::Client,
    config: EmailConfig,
    api_key: String,
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl HttpEmailSender {
    pub fn new(config: EmailConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let payload = ProviderPayload {
            from: format!("{} <{}>", self.config.from_name, self.config.from_address),
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(&self.config.provider_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected { status: status.as_u16(), body });
        }

        tracing::info!("Email '{}' dispatched to {}", message.subject, message.to);
        Ok(())
    }
}

/// Used when no provider key is configured; the message only goes to the log
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email provider not configured, message logged instead:\n{}",
            message.text
        );
        Ok(())
    }
}

/// Picks the sender for the current configuration
pub fn sender_from_config() -> Arc<dyn EmailSender> {
    let email = &config::config().email;
    match &email.api_key {
        Some(key) => Arc::new(HttpEmailSender::new(email.clone(), key.clone())),
        None => Arc::new(LogEmailSender),
    }
}

/// Password recovery message pointing at the dashboard reset page
pub fn password_reset_message(to: &str, name: &str, reset_url: &str, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Redefinição de senha".to_string(),
        html: format!(
            "<p>Olá, {name}.</p>\
             <p>Recebemos um pedido para redefinir sua senha. \
             <a href=\"{url}\">Clique aqui para criar uma nova senha</a>.</p>\
             <p>O link expira em {ttl} minutos. Se você não fez este pedido, ignore este e-mail.</p>",
            name = html_escape(name),
            url = html_escape(reset_url),
            ttl = ttl_minutes
        ),
        text: format!(
            "Olá, {name}.\n\nPara redefinir sua senha acesse: {url}\n\nO link expira em {ttl} minutos. \
             Se você não fez este pedido, ignore este e-mail.",
            name = name,
            url = reset_url,
            ttl = ttl_minutes
        ),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Captures messages instead of sending them
    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn reset_message_embeds_link_and_escapes_name() {
        let msg = password_reset_message(
            "ana@example.com",
            "Ana <admin>",
            "http://localhost:5173/reset-password?token=abc",
            60,
        );
        assert_eq!(msg.to, "ana@example.com");
        assert!(msg.html.contains("Ana &lt;admin&gt;"));
        assert!(msg.html.contains("token=abc"));
        assert!(msg.text.contains("60 minutos"));
    }

    #[tokio::test]
    async fn senders_are_object_safe() {
        let recorder = Arc::new(RecordingSender::default());
        let sender: Arc<dyn EmailSender> = recorder.clone();
        let msg = password_reset_message("a@b.c", "A", "http://x/reset", 5);
        sender.send(&msg).await.unwrap();
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);

        LogEmailSender.send(&msg).await.unwrap();
    }
}
