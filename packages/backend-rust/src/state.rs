use std::sync::Arc;
use std::time::{Instant, SystemTime};

use career_algo::AssessmentScorer;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::Database;
use crate::services::email_provider::EmailService;
use crate::services::encryption::FieldCipher;
use crate::services::otp::{InMemoryStore, OtpService};
use crate::services::sms::SmsService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    config: Arc<Config>,
    db: Database,
    scorer: Arc<AssessmentScorer>,
    otp: Arc<OtpService>,
    cipher: Arc<FieldCipher>,
    email: Arc<EmailService>,
    sms: Arc<SmsService>,
}

impl AppState {
    pub fn new(config: Config, db: Database, scorer: AssessmentScorer) -> Self {
        let otp = OtpService::new(InMemoryStore::new(), config.otp);
        let email = EmailService::from_env(&config.frontend_url);
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            config: Arc::new(config),
            db,
            scorer: Arc::new(scorer),
            otp: Arc::new(otp),
            cipher: Arc::new(FieldCipher::from_env()),
            email: Arc::new(email),
            sms: Arc::new(SmsService::from_env()),
        }
    }

    /// Swaps the outbound channels, e.g. for mock providers whose outbox a caller inspects.
    pub fn with_messaging(mut self, email: EmailService, sms: SmsService) -> Self {
        self.email = Arc::new(email);
        self.sms = Arc::new(sms);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn scorer(&self) -> &AssessmentScorer {
        &self.scorer
    }

    pub fn otp(&self) -> Arc<OtpService> {
        Arc::clone(&self.otp)
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    pub fn email(&self) -> Arc<EmailService> {
        Arc::clone(&self.email)
    }

    pub fn sms(&self) -> Arc<SmsService> {
        Arc::clone(&self.sms)
    }
}
