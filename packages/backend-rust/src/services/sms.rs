use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::env_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsProviderType {
    Twilio,
    Mock,
    None,
}

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("sms not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub body: String,
}

#[derive(Clone)]
pub struct SmsService {
    provider: SmsProviderType,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    client: reqwest::Client,
    outbox: Arc<Mutex<Vec<SentSms>>>,
}

impl SmsService {
    pub fn from_env() -> Self {
        let provider = match env_string("SMS_PROVIDER").as_deref() {
            Some("twilio") => SmsProviderType::Twilio,
            Some("mock") => SmsProviderType::Mock,
            _ => SmsProviderType::None,
        };
        Self {
            provider,
            account_sid: env_string("TWILIO_ACCOUNT_SID"),
            auth_token: env_string("TWILIO_AUTH_TOKEN"),
            from_number: env_string("TWILIO_PHONE_NUMBER"),
            client: reqwest::Client::new(),
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn mock() -> Self {
        Self {
            provider: SmsProviderType::Mock,
            account_sid: None,
            auth_token: None,
            from_number: None,
            client: reqwest::Client::new(),
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn provider_type(&self) -> SmsProviderType {
        self.provider
    }

    pub fn outbox(&self) -> Vec<SentSms> {
        self.outbox.lock().clone()
    }

    pub async fn send_otp(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        self.send(phone, &format!("Your CareerNavigator OTP code is: {code}"))
            .await
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        match self.provider {
            SmsProviderType::Twilio => self.send_via_twilio(to, body).await,
            SmsProviderType::Mock => {
                tracing::info!(to, "mock sms accepted");
                self.outbox.lock().push(SentSms {
                    to: to.to_string(),
                    body: body.to_string(),
                });
                Ok(())
            }
            SmsProviderType::None => Err(SmsError::NotConfigured("SMS_PROVIDER")),
        }
    }

    async fn send_via_twilio(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let sid = self
            .account_sid
            .as_deref()
            .ok_or(SmsError::NotConfigured("TWILIO_ACCOUNT_SID"))?;
        let token = self
            .auth_token
            .as_deref()
            .ok_or(SmsError::NotConfigured("TWILIO_AUTH_TOKEN"))?;
        let from = self
            .from_number
            .as_deref()
            .ok_or(SmsError::NotConfigured("TWILIO_PHONE_NUMBER"))?;

        let to = if to.starts_with('+') {
            to.to_string()
        } else {
            format!("+91{to}")
        };

        let resp = self
            .client
            .post(format!(
                "https://api.twilio.com/2010-04-01/Accounts/{sid}/Messages.json"
            ))
            .basic_auth(sid, Some(token))
            .form(&[("To", to.as_str()), ("From", from), ("Body", body)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SmsError::HttpStatus { status, body });
        }
        Ok(())
    }
}
