//! Fixed-interval tick scheduler for Warden.
//!
//! Drives the session layer's periodic token verification: one tick per
//! interval, with overrun handling, pause/resume and a little start-up
//! jitter so many tabs opened at once don't all hit the backend in the
//! same instant.
//!
//! # Disabled mode
//!
//! When `interval` is zero, [`TickScheduler::wait_for_tick`] pends forever.
//! That is how a host turns automatic verification off without special
//! casing its task loop.
//!
//! # Integration
//!
//! The scheduler sits inside a `tokio::select!` loop next to a stop signal:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = &mut stop_rx => break,
//!         tick = scheduler.wait_for_tick() => {
//!             session.verify_with(Escalation::Logout).await;
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! All waiting goes through `tokio::time`, so tests drive it with
//! `#[tokio::test(start_paused = true)]` instead of real delays.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late (the previous tick's work, or the
/// host being suspended, pushed it past its deadline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and schedule from now.
    /// A laptop waking from sleep verifies once, not once per missed interval.
    #[default]
    Skip,
    /// Keep the original cadence: the next tick fires at its originally
    /// scheduled time, which may be immediately.
    Drop,
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `Duration::ZERO` disables ticking.
    pub interval: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Random jitter (`0..initial_jitter`) added to the *first* tick only.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            policy: TickPolicy::default(),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// Create a config for a specific interval with default settings.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`]. Jitter is capped to
    /// the interval; more than a full interval of jitter would make the
    /// first check later than the second would have been.
    pub fn validated(mut self) -> Self {
        if self.interval > Duration::ZERO && self.initial_jitter > self.interval {
            warn!(
                jitter_ms = self.initial_jitter.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "initial jitter exceeds interval, clamping"
            );
            self.initial_jitter = self.interval;
        }
        self
    }

    /// Interval between ticks, or `None` when ticking is disabled.
    pub fn tick_interval(&self) -> Option<Duration> {
        if self.interval.is_zero() {
            None
        } else {
            Some(self.interval)
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired late.
    pub overrun: bool,
    /// How many whole intervals were skipped because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for the tick scheduler.
///
/// Work timings refer to what the caller reported via
/// [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    /// Total ticks fired.
    pub total_ticks: u64,
    /// Total overruns detected.
    pub total_overruns: u64,
    /// Total intervals skipped under [`TickPolicy::Skip`].
    pub total_skipped: u64,
    /// Duration of the most recent tick's work.
    pub last_tick_time: Duration,
    /// Longest tick work observed.
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler. One per periodic task.
pub struct TickScheduler {
    config: TickConfig,
    interval: Option<Duration>,
    tick_count: u64,
    /// When the next tick should fire (Tokio instant for `sleep_until`).
    next_tick: Option<TokioInstant>,
    /// When the current tick's work started; consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Create a new scheduler from config. The first tick fires one
    /// interval (plus jitter) from now, never immediately.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let interval = config.tick_interval();

        let next_tick = interval.map(|d| {
            let max_us = config.initial_jitter.as_micros() as u64;
            let jitter = if max_us == 0 {
                Duration::ZERO
            } else {
                Duration::from_micros(rand::rng().random_range(0..max_us))
            };
            TokioInstant::now() + d + jitter
        });

        match interval {
            None => debug!("tick scheduler created with ticking disabled"),
            Some(d) => debug!(
                interval_ms = d.as_millis() as u64,
                policy = ?config.policy,
                "tick scheduler created"
            ),
        }

        Self {
            config,
            interval,
            tick_count: 0,
            next_tick,
            tick_start: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// Wait until the next tick is due.
    ///
    /// When ticking is disabled or the scheduler is paused this future
    /// pends forever; `tokio::select!` still services its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        // More than 10% late counts as an overrun.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_millis() as u64,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_millis() as u64,
                        "tick overrun, keeping original schedule"
                    );
                }
                next + interval
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Record that the work for the current tick has finished.
    ///
    /// Warns when the work took longer than the interval: the next tick
    /// is then already overdue.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(interval) = self.interval {
            if elapsed >= interval {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "tick work exceeded the interval"
                );
            }
        }

        self.metrics.last_tick_time = elapsed;
        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
    }

    /// Pause ticking. `wait_for_tick` pends until [`resume`](Self::resume).
    ///
    /// Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resume ticking. The next tick fires one full interval from now,
    /// so time spent paused never produces a burst of ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(interval) = self.interval {
                self.next_tick = Some(TokioInstant::now() + interval);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    /// Whether the scheduler is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether ticking is disabled (zero interval).
    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// The configured interval, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}
