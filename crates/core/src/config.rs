// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ambient configuration: every magic number spec.md scatters through its
//! prose (§4.1, §4.4, §4.7, §6, §9) gets one named, documented home here
//! instead of being re-derived at each call site.

use std::time::Duration;

/// How the Sequence Tracker (C3) treats duplicate/out-of-order events,
/// read from `ANOMALY_RESOLUTION_MODE` (§4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyPolicy {
    /// Anomalies are flagged but the event still processes normally.
    Warn,
    /// Anomalous events are rejected (`shouldSkip=true`).
    Skip,
    /// Anomalies are flagged but processing proceeds, same as `Warn` at the
    /// sequence-tracker layer — the distinction is downstream (e.g. whether
    /// a caller chooses to alert on it).
    Process,
}

impl AnomalyPolicy {
    pub fn from_env() -> Self {
        match std::env::var("ANOMALY_RESOLUTION_MODE").as_deref() {
            Ok("skip") => AnomalyPolicy::Skip,
            Ok("process") => AnomalyPolicy::Process,
            _ => AnomalyPolicy::Warn,
        }
    }

    pub fn should_skip_anomalies(self) -> bool {
        matches!(self, AnomalyPolicy::Skip)
    }
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        AnomalyPolicy::Warn
    }
}

/// Retry policy for failed operations (§4.1 retry policy, §8 scenario 4).
///
/// The spec documents the backoff as "exponential" but specifies
/// `5s * (attempts + 1)` — geometric, not exponential; §9 treats the formula
/// as authoritative over the prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(5) }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempts` prior attempts (0-indexed).
    pub fn delay_for(&self, attempts: u32) -> Duration {
        self.base_delay * (attempts + 1)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// Session keepalive interval bounds (§4.7): `clamp(timeout/6, 3000..20000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStreamConfig {
    pub keepalive_min: Duration,
    pub keepalive_max: Duration,
    /// Cap on the number of trailing errors attached to `session_teardown`.
    pub teardown_error_cap: usize,
}

impl Default for SessionStreamConfig {
    fn default() -> Self {
        Self {
            keepalive_min: Duration::from_millis(3_000),
            keepalive_max: Duration::from_millis(20_000),
            teardown_error_cap: 5,
        }
    }
}

impl SessionStreamConfig {
    pub fn keepalive_interval(&self, operation_timeout: Duration) -> Duration {
        (operation_timeout / 6).clamp(self.keepalive_min, self.keepalive_max)
    }
}

/// Engine-wide tunables not already carried per-operation in
/// [`crate::operation::OperationOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub default_batch_size: u32,
    pub default_max_concurrency: u32,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
    pub session_stream: SessionStreamConfig,
    /// Width of the slices a deferred embedding batch is chunked into
    /// (§4.1.1 step 11).
    pub embed_chunk_size: usize,
    /// Width of a relationship post-resolution retry pass progress report.
    pub post_resolution_progress: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 60,
            default_max_concurrency: 12,
            default_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            session_stream: SessionStreamConfig::default(),
            embed_chunk_size: 200,
            post_resolution_progress: 0.95,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
