use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::config::{env_parse, env_string};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub provider: EmailProviderType,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub from_address: String,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailProviderType {
    Smtp,
    SendGrid,
    Mock,
    None,
}

impl EmailProviderType {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("smtp") => EmailProviderType::Smtp,
            Some("sendgrid") => EmailProviderType::SendGrid,
            Some("mock") => EmailProviderType::Mock,
            _ => EmailProviderType::None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("smtp error: {0}")]
    Smtp(String),
}

/// A message captured by the mock provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
    client: reqwest::Client,
    outbox: Arc<Mutex<Vec<SentEmail>>>,
}

#[derive(Serialize)]
struct SendGridPayload<'a> {
    personalizations: Vec<SendGridPersonalization<'a>>,
    from: SendGridAddress<'a>,
    subject: &'a str,
    content: Vec<SendGridContent<'a>>,
}

#[derive(Serialize)]
struct SendGridPersonalization<'a> {
    to: Vec<SendGridAddress<'a>>,
}

#[derive(Serialize)]
struct SendGridAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendGridContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl EmailService {
    pub fn from_env(frontend_url: &str) -> Self {
        Self::new(EmailConfig {
            provider: EmailProviderType::parse(env_string("EMAIL_PROVIDER").as_deref()),
            smtp_host: env_string("SMTP_HOST"),
            smtp_port: env_parse("SMTP_PORT").unwrap_or(587),
            smtp_user: env_string("SMTP_USER"),
            smtp_password: env_string("SMTP_PASSWORD"),
            sendgrid_api_key: env_string("SENDGRID_API_KEY"),
            from_address: env_string("EMAIL_FROM")
                .unwrap_or_else(|| "noreply@careernavigator.in".into()),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn mock(frontend_url: &str) -> Self {
        Self::new(EmailConfig {
            provider: EmailProviderType::Mock,
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_password: None,
            sendgrid_api_key: None,
            from_address: "noreply@careernavigator.in".into(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        })
    }

    fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn is_available(&self) -> bool {
        match self.config.provider {
            EmailProviderType::Smtp => {
                self.config.smtp_host.is_some() && self.config.smtp_user.is_some()
            }
            EmailProviderType::SendGrid => self.config.sendgrid_api_key.is_some(),
            EmailProviderType::Mock => true,
            EmailProviderType::None => false,
        }
    }

    pub fn provider_type(&self) -> EmailProviderType {
        self.config.provider
    }

    /// Messages accepted by the mock provider, oldest first.
    pub fn outbox(&self) -> Vec<SentEmail> {
        self.outbox.lock().clone()
    }

    pub async fn send_verification_email(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let body = format!(
            "<h2>Welcome to CareerNavigator, {name}!</h2>\
             <p>Please confirm your email address to finish setting up your account.</p>\
             <p>Sign in and choose <strong>Send verification code</strong>. We will email you a \
             one-time code to enter on the verification step.</p>\
             <p><a href=\"{}/login\">Sign in</a></p>",
            self.config.frontend_url
        );
        self.send_email(to, "Verify your CareerNavigator account", &body)
            .await
    }

    pub async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = format!(
            "{}/reset-password?token={}",
            self.config.frontend_url,
            urlencoding::encode(token)
        );
        let body = format!(
            "<h2>Password reset</h2><p>Hello {name},</p>\
             <p>Use the link below within one hour to choose a new password.</p>\
             <p><a href=\"{link}\">Reset password</a></p>\
             <p>If you did not request this, you can ignore this email.</p>"
        );
        self.send_email(to, "Reset your CareerNavigator password", &body)
            .await
    }

    pub async fn send_otp_email(
        &self,
        to: &str,
        code: &str,
        expiry_minutes: u64,
    ) -> Result<(), EmailError> {
        let body = format!(
            "<p>Your CareerNavigator verification code is <strong>{code}</strong>.</p>\
             <p>It expires in {expiry_minutes} minutes.</p>"
        );
        self.send_email(to, "Your CareerNavigator verification code", &body)
            .await
    }

    pub async fn send_welcome_email(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let body = format!(
            "<h2>You're all set, {name}!</h2>\
             <p>Your registration is complete. Take the career assessment to get personalised \
             recommendations.</p><p><a href=\"{}/dashboard\">Open dashboard</a></p>",
            self.config.frontend_url
        );
        self.send_email(to, "Welcome to CareerNavigator", &body)
            .await
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        match self.config.provider {
            EmailProviderType::SendGrid => self.send_via_sendgrid(to, subject, html_body).await,
            EmailProviderType::Smtp => self.send_via_smtp(to, subject, html_body).await,
            EmailProviderType::Mock => {
                tracing::debug!(to, subject, "mock email accepted");
                self.outbox.lock().push(SentEmail {
                    to: to.to_string(),
                    subject: subject.to_string(),
                    body: html_body.to_string(),
                });
                Ok(())
            }
            EmailProviderType::None => Err(EmailError::NotConfigured("EMAIL_PROVIDER")),
        }
    }

    async fn send_via_sendgrid(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let api_key = self
            .config
            .sendgrid_api_key
            .as_deref()
            .ok_or(EmailError::NotConfigured("SENDGRID_API_KEY"))?;

        let payload = SendGridPayload {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridAddress { email: to }],
            }],
            from: SendGridAddress {
                email: &self.config.from_address,
            },
            subject,
            content: vec![SendGridContent {
                content_type: "text/html",
                value: html_body,
            }],
        };

        let resp = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmailError::HttpStatus { status, body });
        }

        Ok(())
    }

    async fn send_via_smtp(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let host = self
            .config
            .smtp_host
            .clone()
            .ok_or(EmailError::NotConfigured("SMTP_HOST"))?;
        let user = self
            .config
            .smtp_user
            .clone()
            .ok_or(EmailError::NotConfigured("SMTP_USER"))?;
        let password = self
            .config
            .smtp_password
            .clone()
            .ok_or(EmailError::NotConfigured("SMTP_PASSWORD"))?;

        let envelope = Envelope {
            from: self.config.from_address.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        };
        let port = self.config.smtp_port;

        tokio::task::spawn_blocking(move || {
            let mut session = SmtpSession::connect(&host, port)?;
            session.deliver(&host, &user, &password, &envelope)
        })
        .await
        .map_err(|e| EmailError::Smtp(e.to_string()))?
    }
}

struct Envelope {
    from: String,
    to: String,
    subject: String,
    html_body: String,
}

struct SmtpSession {
    stream: std::net::TcpStream,
    buf: [u8; 1024],
}

impl SmtpSession {
    fn connect(host: &str, port: u16) -> Result<Self, EmailError> {
        let stream = std::net::TcpStream::connect((host, port))
            .map_err(|e| EmailError::Smtp(e.to_string()))?;
        let timeout = Some(std::time::Duration::from_secs(30));
        stream.set_read_timeout(timeout).ok();
        stream.set_write_timeout(timeout).ok();

        let mut session = Self {
            stream,
            buf: [0u8; 1024],
        };
        session.expect_reply()?;
        Ok(session)
    }

    fn expect_reply(&mut self) -> Result<String, EmailError> {
        use std::io::Read;
        let n = self
            .stream
            .read(&mut self.buf)
            .map_err(|e| EmailError::Smtp(e.to_string()))?;
        let reply = String::from_utf8_lossy(&self.buf[..n]).to_string();
        match reply.chars().next() {
            Some('2') | Some('3') => Ok(reply),
            _ => Err(EmailError::Smtp(reply.trim().to_string())),
        }
    }

    fn command(&mut self, line: &str) -> Result<String, EmailError> {
        use std::io::Write;
        self.stream
            .write_all(format!("{line}\r\n").as_bytes())
            .map_err(|e| EmailError::Smtp(e.to_string()))?;
        self.expect_reply()
    }

    fn deliver(
        &mut self,
        host: &str,
        user: &str,
        password: &str,
        mail: &Envelope,
    ) -> Result<(), EmailError> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        self.command(&format!("EHLO {host}"))?;
        self.command("AUTH LOGIN")?;
        self.command(&STANDARD.encode(user))?;
        self.command(&STANDARD.encode(password))?;
        self.command(&format!("MAIL FROM:<{}>", mail.from))?;
        self.command(&format!("RCPT TO:<{}>", mail.to))?;
        self.command("DATA")?;
        self.command(&format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n{}\r\n.",
            mail.from, mail.to, mail.subject, mail.html_body
        ))?;
        let _ = self.command("QUIT");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(EmailProviderType::parse(Some("SMTP")), EmailProviderType::Smtp);
        assert_eq!(EmailProviderType::parse(Some("sendgrid")), EmailProviderType::SendGrid);
        assert_eq!(EmailProviderType::parse(Some("mock")), EmailProviderType::Mock);
        assert_eq!(EmailProviderType::parse(Some("carrier-pigeon")), EmailProviderType::None);
        assert_eq!(EmailProviderType::parse(None), EmailProviderType::None);
    }

    #[tokio::test]
    async fn test_mock_outbox_records_templates() {
        let email = EmailService::mock("http://localhost:3000/");
        email.send_otp_email("asha@example.com", "123456", 5).await.unwrap();
        email
            .send_password_reset_email("asha@example.com", "Asha", "tok en")
            .await
            .unwrap();

        let sent = email.outbox();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].body.contains("123456"));
        assert!(sent[1]
            .body
            .contains("http://localhost:3000/reset-password?token=tok%20en"));
    }

    #[tokio::test]
    async fn test_verification_email_points_to_code_step() {
        let email = EmailService::mock("http://localhost:3000/");
        email
            .send_verification_email("asha@example.com", "Asha")
            .await
            .unwrap();

        let sent = email.outbox();
        assert_eq!(sent[0].subject, "Verify your CareerNavigator account");
        assert!(sent[0].body.contains("Send verification code"));
        assert!(sent[0].body.contains("href=\"http://localhost:3000/login\""));
        assert!(!sent[0].body.contains("/verify-email"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_errors() {
        let mut email = EmailService::mock("http://x");
        email.config.provider = EmailProviderType::None;
        assert!(!email.is_available());
        assert!(matches!(
            email.send_email("a@b.c", "s", "b").await,
            Err(EmailError::NotConfigured(_))
        ));
    }
}
