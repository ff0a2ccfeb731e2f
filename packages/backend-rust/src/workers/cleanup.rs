use std::time::Instant;

use tracing::{debug, info};

use crate::auth;
use crate::db::Database;
use crate::services::otp::OtpService;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CleanupStats {
    pub expired_otps: usize,
    pub expired_sessions: u64,
    pub duration_secs: f64,
}

/// Drops expired OTP entries and session rows.
pub async fn run_cleanup(db: &Database, otp: &OtpService) -> Result<CleanupStats, super::WorkerError> {
    let start = Instant::now();
    debug!("Starting cleanup cycle");

    let mut stats = CleanupStats {
        expired_otps: otp.purge_expired(),
        ..CleanupStats::default()
    };
    stats.expired_sessions = auth::purge_expired_sessions(db.pool()).await?;
    stats.duration_secs = start.elapsed().as_secs_f64();

    if stats.expired_otps > 0 || stats.expired_sessions > 0 {
        info!(
            expired_otps = stats.expired_otps,
            expired_sessions = stats.expired_sessions,
            duration_secs = format!("{:.2}", stats.duration_secs),
            "Cleanup completed"
        );
    }

    Ok(stats)
}
