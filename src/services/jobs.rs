//! Background Jobs
//!
//! Periodic maintenance sweep for in-memory and on-disk state: expired
//! rate-limiter buckets, idle conversations, and stale audio files.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::services::{AudioStore, ConversationService, RateLimiterService};

/// Configuration for the maintenance job
#[derive(Debug, Clone)]
pub struct MaintenanceJobConfig {
    /// Interval between sweeps (default: 5 minutes)
    pub interval: Duration,
    /// Whether the job is enabled
    pub enabled: bool,
}

impl Default for MaintenanceJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            enabled: true,
        }
    }
}

/// Background job runner for periodic state cleanup
pub struct MaintenanceJob {
    rate_limiter: Arc<RateLimiterService>,
    conversations: Arc<ConversationService>,
    audio_store: Option<AudioStore>,
    config: MaintenanceJobConfig,
}

impl MaintenanceJob {
    pub fn new(
        rate_limiter: Arc<RateLimiterService>,
        conversations: Arc<ConversationService>,
        audio_store: Option<AudioStore>,
        config: MaintenanceJobConfig,
    ) -> Self {
        Self {
            rate_limiter,
            conversations,
            audio_store,
            config,
        }
    }

    /// Start the maintenance job
    ///
    /// Returns a shutdown sender that can be used to stop the job.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        if !self.config.enabled {
            info!("Maintenance job is disabled");
            return shutdown_tx;
        }

        let interval = self.config.interval;

        tokio::spawn(async move {
            info!("Starting maintenance job with interval {:?}", interval);

            // Run immediately on startup
            self.run_sweep().await;

            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        self.run_sweep().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Maintenance job shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    async fn run_sweep(&self) {
        self.rate_limiter.cleanup_expired().await;
        let removed_conversations = self.conversations.cleanup_expired().await;
        let removed_audio = self
            .audio_store
            .as_ref()
            .map(|store| store.cleanup_expired())
            .unwrap_or(0);

        info!(
            removed_conversations,
            removed_audio, "Maintenance sweep completed"
        );
    }
}
