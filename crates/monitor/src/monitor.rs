use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conveyor_core::{ProcessingLedger, VerificationReport};

use crate::config::MonitorConfig;

/// Where the monitor currently is in its idle-detection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// Progress was observed on the most recent tick.
    Active,
    /// `ticks` consecutive samples saw no progress; not yet enough to
    /// declare the stream drained.
    IdleSuspect { ticks: u32 },
    /// Enough idle ticks accumulated; the ledger is being verified.
    Verifying,
    /// Verification ran and the pipeline has been told to shut down.
    Terminated,
}

/// Advance the idle-detection state machine by one tick.
///
/// `sensitivity` is the number of consecutive no-progress ticks required
/// before verification; any progress resets the count.
#[must_use]
pub fn observe(phase: MonitorPhase, progressed: bool, sensitivity: u32) -> MonitorPhase {
    match phase {
        MonitorPhase::Active | MonitorPhase::IdleSuspect { .. } if progressed => {
            MonitorPhase::Active
        }
        MonitorPhase::Active => idle_after(1, sensitivity),
        MonitorPhase::IdleSuspect { ticks } => idle_after(ticks + 1, sensitivity),
        MonitorPhase::Verifying | MonitorPhase::Terminated => phase,
    }
}

fn idle_after(ticks: u32, sensitivity: u32) -> MonitorPhase {
    if ticks >= sensitivity {
        MonitorPhase::Verifying
    } else {
        MonitorPhase::IdleSuspect { ticks }
    }
}

/// Samples the ledger until the pipeline goes idle, then verifies it.
///
/// Termination is signalled by cancelling the shared token, so the rest of
/// the pipeline can wait on the token rather than on the monitor task
/// itself. Cancelling the token externally stops the monitor early without
/// a verification pass.
pub struct CompletionMonitor {
    ledger: Arc<ProcessingLedger>,
    config: MonitorConfig,
    shutdown: CancellationToken,
}

impl CompletionMonitor {
    pub fn new(
        ledger: Arc<ProcessingLedger>,
        config: MonitorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ledger,
            config,
            shutdown,
        }
    }

    /// Spawn the monitor task.
    ///
    /// Resolves with the verification report once the pipeline is idle, or
    /// with `None` if the token was cancelled before idleness was reached.
    pub fn spawn(self) -> JoinHandle<Option<VerificationReport>> {
        tokio::spawn(self.run())
    }

    async fn run(self) -> Option<VerificationReport> {
        let first_tick = Instant::now() + self.config.grace_period;
        let mut ticks = tokio::time::interval_at(first_tick, self.config.tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_total = self.ledger.total();
        let mut phase = MonitorPhase::Active;
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("completion monitor cancelled before the pipeline went idle");
                    return None;
                }
                _ = ticks.tick() => {}
            }

            let total = self.ledger.total();
            let progressed = total != last_total;
            last_total = total;
            phase = observe(phase, progressed, self.config.idle_ticks.max(1));

            match phase {
                MonitorPhase::Active => {
                    debug!(total, "pipeline active");
                }
                MonitorPhase::IdleSuspect { ticks } => {
                    debug!(total, idle_ticks = ticks, "no progress since last sample");
                }
                MonitorPhase::Verifying => {
                    info!(total, "pipeline idle; verifying ledger");
                    let report = self.ledger.verify();
                    if report.is_clean() {
                        info!(
                            total = report.total,
                            key_space = report.key_space,
                            "all keys processed exactly once"
                        );
                    } else {
                        warn!(
                            total = report.total,
                            missing = report.missing(),
                            duplicates = report.duplicates(),
                            "ledger verification found anomalies"
                        );
                    }
                    self.shutdown.cancel();
                    return Some(report);
                }
                MonitorPhase::Terminated => unreachable!("monitor returns on verification"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            tick_interval: Duration::from_millis(100),
            grace_period: Duration::from_millis(100),
            idle_ticks: 2,
        }
    }

    #[test]
    fn observe_counts_idle_ticks_up_to_verification() {
        let phase = observe(MonitorPhase::Active, false, 3);
        assert_eq!(phase, MonitorPhase::IdleSuspect { ticks: 1 });
        let phase = observe(phase, false, 3);
        assert_eq!(phase, MonitorPhase::IdleSuspect { ticks: 2 });
        let phase = observe(phase, false, 3);
        assert_eq!(phase, MonitorPhase::Verifying);
    }

    #[test]
    fn observe_resets_on_progress() {
        let phase = observe(MonitorPhase::IdleSuspect { ticks: 2 }, true, 3);
        assert_eq!(phase, MonitorPhase::Active);
    }

    #[test]
    fn observe_sensitivity_one_verifies_immediately() {
        assert_eq!(
            observe(MonitorPhase::Active, false, 1),
            MonitorPhase::Verifying
        );
    }

    #[test]
    fn observe_terminal_phases_are_sticky() {
        assert_eq!(
            observe(MonitorPhase::Verifying, true, 2),
            MonitorPhase::Verifying
        );
        assert_eq!(
            observe(MonitorPhase::Terminated, false, 2),
            MonitorPhase::Terminated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_ledger_is_verified_and_token_cancelled() {
        let ledger = Arc::new(ProcessingLedger::new(4));
        for key in 0..4 {
            assert!(ledger.record(key));
        }
        let token = CancellationToken::new();
        let monitor = CompletionMonitor::new(Arc::clone(&ledger), fast_config(), token.clone());
        let task = monitor.spawn();

        let report = task.await.unwrap().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.total, 4);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_defers_verification() {
        let ledger = Arc::new(ProcessingLedger::new(8));
        let token = CancellationToken::new();
        let monitor = CompletionMonitor::new(Arc::clone(&ledger), fast_config(), token.clone());
        let task = monitor.spawn();

        // Record one key between samples for a while; the monitor must stay
        // active the whole time. 60ms keeps the records off the tick grid.
        for key in 0..8 {
            assert!(ledger.record(key));
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert!(!token.is_cancelled());
        }

        let report = task.await.unwrap().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.total, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn verification_reports_missing_keys() {
        let ledger = Arc::new(ProcessingLedger::new(4));
        assert!(ledger.record(0));
        assert!(ledger.record(2));
        let token = CancellationToken::new();
        let monitor = CompletionMonitor::new(ledger, fast_config(), token);
        let report = monitor.spawn().await.unwrap().unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.missing(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancellation_stops_without_verifying() {
        let ledger = Arc::new(ProcessingLedger::new(4));
        let token = CancellationToken::new();
        let monitor = CompletionMonitor::new(ledger, fast_config(), token.clone());
        let task = monitor.spawn();

        token.cancel();
        assert!(task.await.unwrap().is_none());
    }
}
