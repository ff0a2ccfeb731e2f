use std::sync::OnceLock;

use regex::Regex;

use crate::services::ServiceError;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static PHONE_RE: OnceLock<Regex> = OnceLock::new();
static PINCODE_RE: OnceLock<Regex> = OnceLock::new();
static AADHAAR_RE: OnceLock<Regex> = OnceLock::new();

const PASSWORD_SPECIALS: &str = "@$!%*?&";

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("static pattern compiles"))
}

pub fn is_valid_email(value: &str) -> bool {
    value.len() <= 254 && pattern(&EMAIL_RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_match(value.trim())
}

/// Indian mobile number: ten digits starting with 6-9.
pub fn is_valid_phone(value: &str) -> bool {
    pattern(&PHONE_RE, r"^[6-9]\d{9}$").is_match(value)
}

pub fn is_valid_pincode(value: &str) -> bool {
    pattern(&PINCODE_RE, r"^\d{6}$").is_match(value)
}

pub fn is_valid_aadhaar(value: &str) -> bool {
    pattern(&AADHAAR_RE, r"^\d{12}$").is_match(value)
}

pub fn is_strong_password(value: &str) -> bool {
    value.chars().count() >= 8
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

pub fn char_len_between(value: &str, min: usize, max: usize) -> bool {
    let len = value.trim().chars().count();
    (min..=max).contains(&len)
}

pub const PASSWORD_RULE: &str = "Password must be at least 8 characters and contain uppercase, lowercase, number and special character";

/// Collects failed checks and reports them together.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(message.into());
        }
        self
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn finish(&self) -> Result<(), ServiceError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self.errors.join("; ")))
        }
    }
}
