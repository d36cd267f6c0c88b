use std::time::Duration;

/// Reconnect backoff steps in milliseconds, tries 1..=9
pub const RECONNECT_STEPS_MS: [u64; 9] = [10, 50, 100, 150, 200, 250, 500, 1000, 2000];
/// Delay used by the reconnect table once the steps are exhausted
pub const RECONNECT_FLOOR: Duration = Duration::from_millis(5000);

/// Rejoin backoff steps in milliseconds, tries 1..=3
pub const REJOIN_STEPS_MS: [u64; 3] = [1000, 2000, 5000];
/// Delay used by the rejoin table once the steps are exhausted
pub const REJOIN_FLOOR: Duration = Duration::from_millis(10_000);

/// Trait for defining backoff strategies
///
/// A backoff maps the try count of a timer to the delay before its next
/// fire. It drives both transport reconnects and channel rejoins.
pub trait Backoff: Send + Sync {
    /// Get the delay before the next attempt
    ///
    /// # Arguments
    /// * `tries` - Number of times the timer already fired since its last
    ///   reset (1-indexed once it has fired; 0 before the first fire)
    fn delay(&self, tries: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, tries: u32) -> Duration {
        self(tries)
    }
}

/// Table-driven backoff
///
/// Try `n` (1-indexed) uses the `n`-th step. Try 0 and every try past the
/// end of the table use the floor.
#[derive(Debug, Clone)]
pub struct BackoffTable {
    steps: Vec<Duration>,
    floor: Duration,
}

impl BackoffTable {
    /// Create a table from millisecond steps and a floor
    pub fn new(steps_ms: &[u64], floor: Duration) -> Self {
        Self {
            steps: steps_ms.iter().copied().map(Duration::from_millis).collect(),
            floor,
        }
    }

    /// Default table for transport reconnects
    pub fn reconnect() -> Self {
        Self::new(&RECONNECT_STEPS_MS, RECONNECT_FLOOR)
    }

    /// Default table for channel rejoins
    pub fn rejoin() -> Self {
        Self::new(&REJOIN_STEPS_MS, REJOIN_FLOOR)
    }

    /// Replace the floor, keeping the steps
    pub fn with_floor(mut self, floor: Duration) -> Self {
        self.floor = floor;
        self
    }
}

impl Backoff for BackoffTable {
    fn delay(&self, tries: u32) -> Duration {
        match (tries as usize).checked_sub(1) {
            Some(index) if index < self.steps.len() => self.steps[index],
            _ => self.floor,
        }
    }
}

/// Exponential backoff strategy
///
/// Delays grow exponentially: initial_delay * 2^(tries - 1), capped at max_delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - Delay for tries 0 and 1
    /// * `max_delay` - The maximum delay between attempts
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, tries: u32) -> Duration {
        let exponent = tries.saturating_sub(1).min(32);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay.as_millis() as u64))
    }
}

/// Fixed delay strategy
///
/// Always waits the same amount of time, whatever the try count
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoff for FixedDelay {
    fn delay(&self, _tries: u32) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_table_steps() {
        let table = BackoffTable::reconnect();
        for (i, &expected) in RECONNECT_STEPS_MS.iter().enumerate() {
            assert_eq!(table.delay(i as u32 + 1), Duration::from_millis(expected));
        }
    }

    #[test]
    fn test_reconnect_table_floor() {
        let table = BackoffTable::reconnect();
        assert_eq!(table.delay(0), RECONNECT_FLOOR);
        assert_eq!(table.delay(10), RECONNECT_FLOOR);
        assert_eq!(table.delay(1_000), RECONNECT_FLOOR);
    }

    #[test]
    fn test_rejoin_table() {
        let table = BackoffTable::rejoin();
        assert_eq!(table.delay(1), Duration::from_millis(1000));
        assert_eq!(table.delay(2), Duration::from_millis(2000));
        assert_eq!(table.delay(3), Duration::from_millis(5000));
        assert_eq!(table.delay(4), REJOIN_FLOOR);
    }

    #[test]
    fn test_alternate_floor() {
        let table = BackoffTable::reconnect().with_floor(Duration::from_secs(10));
        assert_eq!(table.delay(9), Duration::from_millis(2000));
        assert_eq!(table.delay(10), Duration::from_secs(10));
    }

    #[test]
    fn test_exponential_capped() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(strategy.delay(0), Duration::from_millis(100));
        assert_eq!(strategy.delay(1), Duration::from_millis(100));
        assert_eq!(strategy.delay(3), Duration::from_millis(400));
        assert_eq!(strategy.delay(5), Duration::from_secs(1));
        assert_eq!(strategy.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_closure_backoff() {
        let backoff = |tries: u32| Duration::from_millis(u64::from(tries) * 7);
        assert_eq!(Backoff::delay(&backoff, 3), Duration::from_millis(21));
    }
}
