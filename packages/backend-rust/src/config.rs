use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use career_algo::ScoringMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub frontend_url: String,
    pub catalog_path: Option<PathBuf>,
    pub vocabulary_path: Option<PathBuf>,
    pub scoring_mode: ScoringMode,
    pub seed_demo_data: bool,
    pub rewards: CoinRewards,
    pub otp: OtpSettings,
}

/// Coins credited for each earning event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinRewards {
    pub registration: i64,
    pub assessment_completion: i64,
    pub puzzle_easy: i64,
    pub puzzle_medium: i64,
    pub puzzle_hard: i64,
}

impl Default for CoinRewards {
    fn default() -> Self {
        Self {
            registration: 75,
            assessment_completion: 50,
            puzzle_easy: 10,
            puzzle_medium: 20,
            puzzle_hard: 30,
        }
    }
}

impl CoinRewards {
    pub const PUZZLE_FALLBACK: i64 = 10;

    pub fn for_puzzle(&self, difficulty: &str) -> i64 {
        match difficulty.trim().to_ascii_lowercase().as_str() {
            "easy" => self.puzzle_easy,
            "medium" => self.puzzle_medium,
            "hard" => self.puzzle_hard,
            _ => Self::PUZZLE_FALLBACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpSettings {
    pub expiry: Duration,
    pub max_attempts: u32,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(5 * 60),
            max_attempts: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 5000,
            log_level: "info".to_string(),
            database_url: default_database_url(),
            frontend_url: "http://localhost:3000".to_string(),
            catalog_path: None,
            vocabulary_path: None,
            scoring_mode: ScoringMode::Randomized,
            seed_demo_data: true,
            rewards: CoinRewards::default(),
            otp: OtpSettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse::<u16>("PORT").unwrap_or(defaults.port);
        let host = env_parse::<IpAddr>("HOST").unwrap_or(defaults.host);
        let log_level = env_string("RUST_LOG").unwrap_or(defaults.log_level);

        let scoring_mode = env_string("SCORING_MODE")
            .as_deref()
            .and_then(ScoringMode::parse)
            .unwrap_or(defaults.scoring_mode);

        let rewards = CoinRewards {
            registration: env_parse("COIN_REWARD_REGISTRATION")
                .unwrap_or(defaults.rewards.registration),
            assessment_completion: env_parse("COIN_REWARD_ASSESSMENT")
                .unwrap_or(defaults.rewards.assessment_completion),
            puzzle_easy: env_parse("COIN_REWARD_PUZZLE_EASY")
                .unwrap_or(defaults.rewards.puzzle_easy),
            puzzle_medium: env_parse("COIN_REWARD_PUZZLE_MEDIUM")
                .unwrap_or(defaults.rewards.puzzle_medium),
            puzzle_hard: env_parse("COIN_REWARD_PUZZLE_HARD")
                .unwrap_or(defaults.rewards.puzzle_hard),
        };

        let otp = OtpSettings {
            expiry: env_parse::<u64>("OTP_EXPIRY_MINUTES")
                .map(|minutes| Duration::from_secs(minutes * 60))
                .unwrap_or(defaults.otp.expiry),
            max_attempts: env_parse("OTP_MAX_ATTEMPTS").unwrap_or(defaults.otp.max_attempts),
        };

        Self {
            host,
            port,
            log_level,
            database_url: env_string("DATABASE_URL").unwrap_or(defaults.database_url),
            frontend_url: env_string("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            catalog_path: env_string("CAREER_CATALOG_PATH").map(PathBuf::from),
            vocabulary_path: env_string("ANSWER_VOCABULARY_PATH").map(PathBuf::from),
            scoring_mode,
            seed_demo_data: env_bool("SEED_DEMO_DATA").unwrap_or(defaults.seed_demo_data),
            rewards,
            otp,
        }
    }

    /// In-memory database, demo data seeded. Used by tests and local tooling.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_database_url() -> String {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("career-navigator")
        .join("career_navigator.db");
    format!("sqlite:{}", path.display())
}

pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.trim().parse::<T>().ok()
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    let value = env_string(key)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
