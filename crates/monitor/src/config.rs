use std::time::Duration;

/// Configuration for the [`CompletionMonitor`](crate::CompletionMonitor).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between ledger samples.
    pub tick_interval: Duration,
    /// Delay before the first sample, so a slow start is not mistaken for
    /// an idle pipeline.
    pub grace_period: Duration,
    /// Number of consecutive no-progress ticks before the pipeline is
    /// declared idle and verified. Must be at least 1.
    pub idle_ticks: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            grace_period: Duration::from_secs(1),
            idle_ticks: 2,
        }
    }
}
