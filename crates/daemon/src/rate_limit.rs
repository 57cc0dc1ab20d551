// SPDX-License-Identifier: MIT

//! Per-IP connection rate limiting for the handshake gate.
//!
//! A sliding window of attempts per IP; exceeding it escalates into an
//! exponential backoff block. A successful authentication clears the
//! offending IP's history outright.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window: Duration,
    pub base_block: Duration,
    pub max_block: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::seconds(60),
            base_block: Duration::seconds(30),
            max_block: Duration::seconds(3600),
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    attempts: u32,
    first_attempt: DateTime<Utc>,
    last_attempt: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

/// Guards the handshake gate in front of [`crate::listener::Listener`].
pub struct ConnectionRateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<IpAddr, RateLimitEntry>>,
}

impl ConnectionRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a new connection attempt from `ip` may proceed right now.
    /// Does not itself record an attempt — call [`Self::record_attempt`]
    /// once the handshake outcome is known.
    pub fn is_allowed(&self, ip: IpAddr, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock();
        let entry = entries.entry(ip).or_insert_with(|| RateLimitEntry {
            attempts: 0,
            first_attempt: now,
            last_attempt: now,
            blocked_until: None,
            consecutive_failures: 0,
        });

        if let Some(blocked_until) = entry.blocked_until {
            if blocked_until > now {
                return false;
            }
            // Block just expired: start a clean window rather than judging
            // this attempt against a stale attempt count.
            entry.blocked_until = None;
            entry.attempts = 0;
            entry.first_attempt = now;
            return true;
        }

        if now - entry.first_attempt > self.config.window {
            entry.attempts = 0;
            entry.first_attempt = now;
        }

        if entry.attempts >= self.config.max_attempts {
            let exponent = entry.consecutive_failures.min(16);
            let block = self.config.base_block * 2i32.pow(exponent);
            let block = block.min(self.config.max_block);
            entry.blocked_until = Some(now + block);
            entry.consecutive_failures += 1;
            return false;
        }

        true
    }

    /// Record one handshake attempt (successful or not) against `ip`.
    pub fn record_attempt(&self, ip: IpAddr, now: DateTime<Utc>) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(ip).or_insert_with(|| RateLimitEntry {
            attempts: 0,
            first_attempt: now,
            last_attempt: now,
            blocked_until: None,
            consecutive_failures: 0,
        });
        if entry.attempts == 0 {
            entry.first_attempt = now;
        }
        entry.attempts += 1;
        entry.last_attempt = now;
    }

    /// Alias kept distinct from [`Self::record_attempt`] at the call site
    /// so a failed handshake reads as a failure, not bookkeeping.
    pub fn record_failure(&self, ip: IpAddr, now: DateTime<Utc>) {
        self.record_attempt(ip, now);
    }

    /// A successful authentication wipes this IP's history outright.
    pub fn record_success(&self, ip: IpAddr) {
        self.entries.lock().remove(&ip);
    }

    /// Drop entries whose block has expired and which have been idle for
    /// more than twice the window. Call periodically so the map doesn't
    /// grow without bound.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) {
        let stale_window = self.config.window * 2;
        self.entries.lock().retain(|_, entry| {
            let block_expired = entry.blocked_until.map(|b| b < now).unwrap_or(true);
            let idle_past_window = now - entry.last_attempt > stale_window;
            !(block_expired && idle_past_window)
        });
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
