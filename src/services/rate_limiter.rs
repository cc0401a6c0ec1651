//! Rate Limiter Service
//!
//! Per-IP and per-API-key request admission using an exact sliding window.
//! Every tracked identifier keeps the timestamps of its admitted requests;
//! a check prunes timestamps older than the window before comparing the
//! remaining count against the configured limit, so bursts spanning a
//! window boundary are throttled correctly (no fixed buckets).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Which identifier class a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitScope {
    Ip,
    ApiKey,
}

impl std::fmt::Display for LimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ip => write!(f, "IP"),
            Self::ApiKey => write!(f, "API key"),
        }
    }
}

/// Errors that can occur during rate limiting
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for {scope}: maximum {limit} requests per {window_secs} seconds. Retry after {retry_after} seconds")]
    Limited {
        scope: LimitScope,
        limit: u32,
        window_secs: u64,
        retry_after: u64,
    },

    #[error("Invalid rate limiter configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per IP address within the window
    pub ip_limit: u32,
    /// Maximum requests per API key within the window
    pub api_key_limit: u32,
    /// Sliding window width in seconds
    pub window_secs: u64,
    /// Interval between full cleanup sweeps in seconds
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ip_limit: 60,
            api_key_limit: 100,
            window_secs: 60,
            cleanup_interval_secs: 300,
        }
    }
}

impl RateLimitConfig {
    fn validate(&self) -> Result<(), RateLimitError> {
        if self.ip_limit == 0 {
            return Err(RateLimitError::InvalidConfig(
                "ip_limit must be at least 1".to_string(),
            ));
        }
        if self.api_key_limit == 0 {
            return Err(RateLimitError::InvalidConfig(
                "api_key_limit must be at least 1".to_string(),
            ));
        }
        if self.window_secs == 0 {
            return Err(RateLimitError::InvalidConfig(
                "window_secs must be at least 1".to_string(),
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(RateLimitError::InvalidConfig(
                "cleanup_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remaining admissions for a client, reported by [`RateLimiterService::remaining`].
#[derive(Debug, Clone, Serialize)]
pub struct RemainingRequests {
    pub ip: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<u32>,
}

/// Counts of currently tracked identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub tracked_ips: usize,
    pub tracked_keys: usize,
    pub ip_limit: u32,
    pub api_key_limit: u32,
    pub window_secs: u64,
}

/// Rate Limiter Service
///
/// The IP map and the API-key map lock independently, so a check against one
/// class never blocks checks against the other. Check-then-record for a
/// single bucket happens under one lock acquisition, which keeps concurrent
/// checks against the same identifier from both observing `count < limit`.
pub struct RateLimiterService {
    config: RateLimitConfig,
    ip_requests: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
    key_requests: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
    last_cleanup: Mutex<DateTime<Utc>>,
}

impl RateLimiterService {
    /// Create a rate limiter, rejecting zero limits, window, or interval.
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        config.validate()?;
        info!(
            ip_limit = config.ip_limit,
            api_key_limit = config.api_key_limit,
            window_secs = config.window_secs,
            "Rate limiter initialized"
        );
        Ok(Self {
            config,
            ip_requests: Mutex::new(HashMap::new()),
            key_requests: Mutex::new(HashMap::new()),
            last_cleanup: Mutex::new(Utc::now()),
        })
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.config.window_secs as i64)
    }

    /// Check whether a request from `ip_address` (optionally carrying an API
    /// key) is admitted, and record it if so.
    ///
    /// The IP bucket is always checked first. A rejected IP check records
    /// nothing and never touches the key bucket. When the IP check passes
    /// its timestamp is recorded immediately, so a subsequent key-bucket
    /// rejection does not roll it back.
    pub async fn check(
        &self,
        ip_address: &str,
        api_key: Option<&str>,
    ) -> Result<(), RateLimitError> {
        self.check_at(ip_address, api_key, Utc::now()).await
    }

    /// Like [`check`](Self::check) with an explicit clock, used by tests.
    pub async fn check_at(
        &self,
        ip_address: &str,
        api_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RateLimitError> {
        {
            let mut ips = self.ip_requests.lock().await;
            self.check_bucket(
                &mut ips,
                ip_address,
                self.config.ip_limit,
                LimitScope::Ip,
                now,
            )?;
        }

        if let Some(key) = api_key {
            let mut keys = self.key_requests.lock().await;
            self.check_bucket(
                &mut keys,
                key,
                self.config.api_key_limit,
                LimitScope::ApiKey,
                now,
            )?;
        }

        // Opportunistic sweep when a check lands long after the last one.
        let due = {
            let last = self.last_cleanup.lock().await;
            now - *last > Duration::seconds(self.config.cleanup_interval_secs as i64)
        };
        if due {
            self.cleanup_expired_at(now).await;
        }

        debug!(
            ip_address,
            has_api_key = api_key.is_some(),
            "Rate limit check passed"
        );
        Ok(())
    }

    /// Prune one bucket, compare against the limit, and record on success.
    /// Runs under the caller's lock so check-then-record is atomic per map.
    fn check_bucket(
        &self,
        requests: &mut HashMap<String, Vec<DateTime<Utc>>>,
        identifier: &str,
        limit: u32,
        scope: LimitScope,
        now: DateTime<Utc>,
    ) -> Result<(), RateLimitError> {
        let window_start = now - self.window();
        let timestamps = requests.entry(identifier.to_string()).or_default();
        Self::prune(timestamps, window_start);

        if timestamps.len() >= limit as usize {
            let retry_after = timestamps
                .first()
                .map(|oldest| {
                    let reset = *oldest + self.window();
                    (reset - now).num_seconds().max(1) as u64
                })
                .unwrap_or(self.config.window_secs);

            warn!(%scope, identifier, limit, "Rate limit exceeded");
            return Err(RateLimitError::Limited {
                scope,
                limit,
                window_secs: self.config.window_secs,
                retry_after,
            });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drop timestamps outside the window. Canonical prune routine shared by
    /// checks and sweeps.
    fn prune(timestamps: &mut Vec<DateTime<Utc>>, window_start: DateTime<Utc>) {
        timestamps.retain(|ts| *ts > window_start);
    }

    /// Report remaining admissions without consuming quota.
    pub async fn remaining(&self, ip_address: &str, api_key: Option<&str>) -> RemainingRequests {
        self.remaining_at(ip_address, api_key, Utc::now()).await
    }

    pub async fn remaining_at(
        &self,
        ip_address: &str,
        api_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> RemainingRequests {
        let window_start = now - self.window();

        let ip = {
            let ips = self.ip_requests.lock().await;
            let valid = ips
                .get(ip_address)
                .map(|ts| ts.iter().filter(|t| **t > window_start).count())
                .unwrap_or(0);
            (self.config.ip_limit as usize).saturating_sub(valid) as u32
        };

        let api_key = match api_key {
            Some(key) => {
                let keys = self.key_requests.lock().await;
                let valid = keys
                    .get(key)
                    .map(|ts| ts.iter().filter(|t| **t > window_start).count())
                    .unwrap_or(0);
                Some((self.config.api_key_limit as usize).saturating_sub(valid) as u32)
            }
            None => None,
        };

        RemainingRequests { ip, api_key }
    }

    /// Prune every tracked identifier and drop the ones left empty.
    pub async fn cleanup_expired(&self) {
        self.cleanup_expired_at(Utc::now()).await;
    }

    pub async fn cleanup_expired_at(&self, now: DateTime<Utc>) {
        let window_start = now - self.window();

        let (cleaned_ips, remaining_ips) = {
            let mut ips = self.ip_requests.lock().await;
            let before = ips.len();
            ips.retain(|_, ts| {
                Self::prune(ts, window_start);
                !ts.is_empty()
            });
            (before - ips.len(), ips.len())
        };

        let (cleaned_keys, remaining_keys) = {
            let mut keys = self.key_requests.lock().await;
            let before = keys.len();
            keys.retain(|_, ts| {
                Self::prune(ts, window_start);
                !ts.is_empty()
            });
            (before - keys.len(), keys.len())
        };

        *self.last_cleanup.lock().await = now;

        info!(
            cleaned_ips,
            cleaned_keys, remaining_ips, remaining_keys, "Rate limiter cleanup completed"
        );
    }

    /// Administrative reset. With an identifier, clears that bucket; with
    /// neither, clears everything in both classes.
    pub async fn reset(&self, ip_address: Option<&str>, api_key: Option<&str>) {
        match ip_address {
            Some(ip) => {
                let mut ips = self.ip_requests.lock().await;
                if ips.remove(ip).is_some() {
                    info!(ip_address = ip, "Reset rate limit for IP");
                }
            }
            None => {
                if api_key.is_none() {
                    self.ip_requests.lock().await.clear();
                    info!("Reset all IP rate limits");
                }
            }
        }

        match api_key {
            Some(key) => {
                let mut keys = self.key_requests.lock().await;
                if keys.remove(key).is_some() {
                    info!("Reset rate limit for API key");
                }
            }
            None => {
                if ip_address.is_none() {
                    self.key_requests.lock().await.clear();
                    info!("Reset all API key rate limits");
                }
            }
        }
    }

    /// Snapshot of tracked identifier counts for the admin endpoint.
    pub async fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            tracked_ips: self.ip_requests.lock().await.len(),
            tracked_keys: self.key_requests.lock().await.len(),
            ip_limit: self.config.ip_limit,
            api_key_limit: self.config.api_key_limit,
            window_secs: self.config.window_secs,
        }
    }
}
