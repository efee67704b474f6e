//! Periodic sweep of expired sessions, authorization codes and tokens.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::services::metrics;
use crate::store::{AuthCodeStore, CredentialStore, SessionStore, TokenStore};

/// Rows removed by one sweep. A failed table keeps a count of zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: u64,
    pub auth_codes: u64,
    pub tokens: u64,
    pub failures: u32,
}

#[derive(Clone)]
pub struct SessionReaper {
    store: Arc<dyn CredentialStore>,
    interval: Duration,
}

impl SessionReaper {
    pub fn new(store: Arc<dyn CredentialStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Delete everything expired as of now. Each table is swept independently;
    /// one failing does not skip the others.
    pub async fn sweep(&self) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();

        match self.store.delete_expired_sessions(now).await {
            Ok(rows) => {
                report.sessions = rows;
                metrics::record_reaped("session", rows);
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!(error = %e, "Failed to reap expired sessions");
            }
        }

        match self.store.delete_expired_auth_codes(now).await {
            Ok(rows) => {
                report.auth_codes = rows;
                metrics::record_reaped("auth_code", rows);
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!(error = %e, "Failed to reap expired authorization codes");
            }
        }

        match self.store.delete_expired_tokens(now).await {
            Ok(rows) => {
                report.tokens = rows;
                metrics::record_reaped("token", rows);
            }
            Err(e) => {
                report.failures += 1;
                tracing::error!(error = %e, "Failed to reap expired tokens");
            }
        }

        tracing::info!(
            sessions = report.sessions,
            auth_codes = report.auth_codes,
            tokens = report.tokens,
            failures = report.failures,
            "Expired credentials reaped"
        );
        report
    }

    /// Sweep immediately, then on every tick until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_secs = self.interval.as_secs(), "Session reaper started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Session reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
