//! One-time passcodes kept in an expiring key/value store.
//!
//! Keys are `{kind}:{identifier}`. Entries live for the configured TTL and allow a bounded
//! number of verification attempts; a successful verification consumes the entry.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OtpSettings;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active: usize,
    pub expired: usize,
    pub total: usize,
}

/// Key/value store whose entries disappear after a TTL.
pub trait ExpiringStore<V>: Send + Sync {
    fn put(&self, key: &str, value: V, ttl: Duration);
    /// Returns `None` for missing or expired keys. Expired keys are dropped on read.
    fn get(&self, key: &str) -> Option<V>;
    /// Applies `f` to a live entry and returns the updated value.
    fn update(&self, key: &str, f: &mut dyn FnMut(&mut V)) -> Option<V>;
    fn remove(&self, key: &str) -> Option<V>;
    fn purge_expired(&self) -> usize;
    fn stats(&self) -> StoreStats;
}

struct Slot<V> {
    value: V,
    expires_at: Instant,
}

pub struct InMemoryStore<V, C: Clock = SystemClock> {
    entries: Mutex<HashMap<String, Slot<V>>>,
    clock: C,
}

impl<V> InMemoryStore<V, SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<V> Default for InMemoryStore<V, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C: Clock> InMemoryStore<V, C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl<V, C: Clock> fmt::Debug for InMemoryStore<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl<V: Clone + Send, C: Clock> ExpiringStore<V> for InMemoryStore<V, C> {
    fn put(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries
            .lock()
            .insert(key.to_string(), Slot { value, expires_at });
    }

    fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(slot) if slot.expires_at > now => Some(slot.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(&mut V)) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let slot = entries.get_mut(key)?;
        if slot.expires_at <= now {
            entries.remove(key);
            return None;
        }
        f(&mut slot.value);
        Some(slot.value.clone())
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().remove(key).map(|slot| slot.value)
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, slot| slot.expires_at > now);
        before - entries.len()
    }

    fn stats(&self) -> StoreStats {
        let now = self.clock.now();
        let entries = self.entries.lock();
        let active = entries.values().filter(|slot| slot.expires_at > now).count();
        StoreStats {
            active,
            expired: entries.len() - active,
            total: entries.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpKind {
    Email,
    Phone,
}

impl OtpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpKind::Email => "email",
            OtpKind::Phone => "phone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpEntry {
    pub code: String,
    pub attempts: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP not found or expired")]
    NotFound,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("invalid OTP, {remaining} attempts remaining")]
    Mismatch { remaining: u32 },
}

pub struct OtpService<S: ExpiringStore<OtpEntry> = InMemoryStore<OtpEntry>> {
    store: S,
    settings: OtpSettings,
}

impl<S: ExpiringStore<OtpEntry>> OtpService<S> {
    pub fn new(store: S, settings: OtpSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> OtpSettings {
        self.settings
    }

    pub fn key(kind: OtpKind, identifier: &str) -> String {
        format!("{}:{}", kind.as_str(), identifier.trim().to_ascii_lowercase())
    }

    pub fn generate() -> String {
        rand::rng().random_range(100_000..=999_999u32).to_string()
    }

    /// Stores a fresh code, replacing any earlier one for the same key.
    pub fn issue(&self, kind: OtpKind, identifier: &str) -> String {
        let code = Self::generate();
        self.store.put(
            &Self::key(kind, identifier),
            OtpEntry {
                code: code.clone(),
                attempts: 0,
            },
            self.settings.expiry,
        );
        code
    }

    pub fn verify(&self, kind: OtpKind, identifier: &str, code: &str) -> Result<(), OtpError> {
        let key = Self::key(kind, identifier);
        let max = self.settings.max_attempts;

        let entry = self
            .store
            .update(&key, &mut |entry| entry.attempts += 1)
            .ok_or(OtpError::NotFound)?;

        if entry.attempts > max {
            self.store.remove(&key);
            return Err(OtpError::TooManyAttempts);
        }

        if entry.code == code.trim() {
            self.store.remove(&key);
            return Ok(());
        }

        let remaining = max - entry.attempts;
        if remaining == 0 {
            self.store.remove(&key);
            return Err(OtpError::TooManyAttempts);
        }
        Err(OtpError::Mismatch { remaining })
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    pub fn statistics(&self) -> StoreStats {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<Instant>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            *self.0.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock()
        }
    }

    fn service(clock: ManualClock) -> OtpService<InMemoryStore<OtpEntry, ManualClock>> {
        OtpService::new(InMemoryStore::with_clock(clock), OtpSettings::default())
    }

    #[test]
    fn test_generate_is_six_digits() {
        for _ in 0..200 {
            let code = OtpService::<InMemoryStore<OtpEntry>>::generate();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn test_verify_consumes_code() {
        let otp = service(ManualClock::new());
        let code = otp.issue(OtpKind::Email, "Asha@Example.com");

        assert_eq!(otp.verify(OtpKind::Email, "asha@example.com", &code), Ok(()));
        assert_eq!(
            otp.verify(OtpKind::Email, "asha@example.com", &code),
            Err(OtpError::NotFound)
        );
    }

    #[test]
    fn test_attempt_limit_removes_entry() {
        let otp = service(ManualClock::new());
        let code = otp.issue(OtpKind::Phone, "9876543210");
        let wrong = if code == "111111" { "222222" } else { "111111" };

        assert_eq!(
            otp.verify(OtpKind::Phone, "9876543210", wrong),
            Err(OtpError::Mismatch { remaining: 2 })
        );
        assert_eq!(
            otp.verify(OtpKind::Phone, "9876543210", wrong),
            Err(OtpError::Mismatch { remaining: 1 })
        );
        assert_eq!(
            otp.verify(OtpKind::Phone, "9876543210", wrong),
            Err(OtpError::TooManyAttempts)
        );
        assert_eq!(
            otp.verify(OtpKind::Phone, "9876543210", &code),
            Err(OtpError::NotFound)
        );
    }

    #[test]
    fn test_expired_code_is_rejected_and_purged() {
        let clock = ManualClock::new();
        let otp = service(clock.clone());
        let code = otp.issue(OtpKind::Email, "a@b.co");
        otp.issue(OtpKind::Email, "c@d.co");

        clock.advance(Duration::from_secs(5 * 60 + 1));
        assert_eq!(
            otp.statistics(),
            StoreStats {
                active: 0,
                expired: 2,
                total: 2
            }
        );
        assert_eq!(otp.verify(OtpKind::Email, "a@b.co", &code), Err(OtpError::NotFound));
        assert_eq!(otp.purge_expired(), 1);
        assert_eq!(otp.statistics().total, 0);
    }

    #[test]
    fn test_store_update_and_remove() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        store.put("k", 1, Duration::from_secs(60));
        assert_eq!(store.update("k", &mut |v| *v += 4), Some(5));
        assert_eq!(store.get("k"), Some(5));
        assert_eq!(store.remove("k"), Some(5));
        assert_eq!(store.get("k"), None);
    }
}
