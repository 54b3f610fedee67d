//! Watermark policies for timestamped sources.
//!
//! The planner only attaches a [`WatermarkPolicyFn`] to the watermark-insertion
//! vertex it creates behind a timestamped source; the runtime calls it once per
//! processor instance.

use crate::function::erased_fn;
use crate::window::TimestampMs;

/// Tracks event timestamps and decides the current watermark.
pub trait WatermarkPolicy: Send {
    /// Report an event timestamp, returning the watermark after it.
    fn report_event(&mut self, timestamp: TimestampMs) -> TimestampMs;

    fn current_watermark(&self) -> TimestampMs;
}

erased_fn!(
    /// Creates a fresh [`WatermarkPolicy`] per processor instance.
    WatermarkPolicyFn, () -> Box<dyn WatermarkPolicy>
);

/// Watermark trailing the highest timestamp seen by a fixed lag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitingLag {
    lag: i64,
    top_ts: TimestampMs,
}

impl LimitingLag {
    #[must_use]
    pub fn new(lag: i64) -> Self {
        Self {
            lag,
            top_ts: TimestampMs::MIN,
        }
    }
}

impl WatermarkPolicy for LimitingLag {
    fn report_event(&mut self, timestamp: TimestampMs) -> TimestampMs {
        self.top_ts = self.top_ts.max(timestamp);
        self.current_watermark()
    }

    fn current_watermark(&self) -> TimestampMs {
        self.top_ts.saturating_sub(self.lag)
    }
}

/// Factory for [`LimitingLag`] policies.
#[must_use]
pub fn limiting_lag(lag: i64) -> WatermarkPolicyFn {
    WatermarkPolicyFn::new(move || Box::new(LimitingLag::new(lag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_trails_the_highest_timestamp() {
        let mut policy = limiting_lag(5).call();
        assert_eq!(policy.report_event(100), 95);
        assert_eq!(policy.report_event(90), 95);
        assert_eq!(policy.report_event(120), 115);
        assert_eq!(policy.current_watermark(), 115);
    }
}
