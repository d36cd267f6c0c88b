//! Resettable one-shot (or recurring) timer
//!
//! # Architecture
//!
//! Each armed timer owns one Tokio task that sleeps and then hands a
//! [`TimerTick`] to the timer's callback. The owner of the timer is expected
//! to route that tick back into its serialized state and call
//! [`Timer::fire`], which rejects ticks from a superseded arming:
//!
//! ```text
//! schedule_timeout() ──> sleep task ──> callback(tick) ──> event queue
//!                                                              │
//!                       owner (under its lock) ── fire(tick) <─┘
//! ```
//!
//! Re-arming or resetting aborts the pending task and bumps the generation,
//! so a tick that was already in flight is dropped by `fire`.

use crate::traits::backoff::Backoff;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Shortest period a recurring timer accepts
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Opaque proof that a timer elapsed, tagged with the arming it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    generation: u64,
}

/// Where a timer's delay comes from
#[derive(Clone)]
pub enum Interval {
    /// Constant delay
    Fixed(Duration),
    /// Delay computed from the try count
    Backoff(Arc<dyn Backoff>),
}

impl Interval {
    pub fn delay(&self, tries: u32) -> Duration {
        match self {
            Interval::Fixed(delay) => *delay,
            Interval::Backoff(backoff) => backoff.delay(tries),
        }
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Interval::Backoff(_) => f.write_str("Backoff"),
        }
    }
}

type TimerCallback = Arc<dyn Fn(TimerTick) + Send + Sync>;

/// Reusable scheduled callback
///
/// Non-recurring timers count their fires in `tries`, which is what feeds a
/// backoff interval. Recurring timers keep firing every interval until reset
/// and never count.
pub struct Timer {
    name: &'static str,
    interval: Interval,
    recurring: bool,
    tries: u32,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    runtime: Handle,
    callback: TimerCallback,
}

impl Timer {
    pub fn new<F>(
        name: &'static str,
        interval: Interval,
        recurring: bool,
        runtime: Handle,
        callback: F,
    ) -> Self
    where
        F: Fn(TimerTick) + Send + Sync + 'static,
    {
        Self {
            name,
            interval,
            recurring,
            tries: 0,
            generation: 0,
            pending: None,
            runtime,
            callback: Arc::new(callback),
        }
    }

    /// Timer with a constant delay
    pub fn fixed<F>(
        name: &'static str,
        delay: Duration,
        recurring: bool,
        runtime: Handle,
        callback: F,
    ) -> Self
    where
        F: Fn(TimerTick) + Send + Sync + 'static,
    {
        Self::new(name, Interval::Fixed(delay), recurring, runtime, callback)
    }

    /// One-shot timer whose delay follows `backoff`
    pub fn backoff<F>(
        name: &'static str,
        backoff: Arc<dyn Backoff>,
        runtime: Handle,
        callback: F,
    ) -> Self
    where
        F: Fn(TimerTick) + Send + Sync + 'static,
    {
        Self::new(name, Interval::Backoff(backoff), false, runtime, callback)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Replace the fixed delay (used when a push is resent with a new timeout)
    pub fn set_interval(&mut self, interval: Interval) {
        self.interval = interval;
    }

    /// Arm exactly one pending fire, cancelling any previous one
    pub fn schedule_timeout(&mut self) {
        self.cancel();
        self.generation += 1;

        let delay = self.interval.delay(self.tries);
        let tick = TimerTick {
            generation: self.generation,
        };
        let callback = Arc::clone(&self.callback);

        let task = if self.recurring {
            let period = delay.max(MIN_PERIOD);
            self.runtime.spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    callback(tick);
                }
            })
        } else {
            self.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                callback(tick);
            })
        };
        self.pending = Some(task);
    }

    /// Cancel any pending fire and zero the try count
    ///
    /// Idempotent; safe to call on an idle timer.
    pub fn reset(&mut self) {
        self.cancel();
        self.generation += 1;
        self.tries = 0;
    }

    /// Accept a tick delivered through the callback
    ///
    /// Returns `false` for ticks of a cancelled or superseded arming, in
    /// which case the owner must ignore the fire.
    pub fn fire(&mut self, tick: TimerTick) -> bool {
        if tick.generation != self.generation {
            return false;
        }
        if !self.recurring {
            self.tries = self.tries.saturating_add(1);
            self.pending = None;
        }
        true
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("recurring", &self.recurring)
            .field("tries", &self.tries)
            .field("pending", &self.is_pending())
            .finish()
    }
}
