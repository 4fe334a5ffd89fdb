use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use conveyor_bridge::{BridgeConfig, DeliveryMode, MediatorBridge, NackPolicy};
use conveyor_consumer::{BookingConsumer, ConsumerMailbox, RandomFaults};
use conveyor_core::{ProcessingLedger, TextIdCodec};
use conveyor_monitor::{CompletionMonitor, MonitorConfig};
use conveyor_simulation::{AckLog, QueueBroker};

/// Conveyor delivery pipeline runner.
///
/// Drives `count` work items from an in-memory queue through the mediator
/// bridge into the booking consumer, with optional fault injection, and
/// verifies the processing ledger once the pipeline goes idle.
#[derive(Parser, Debug)]
#[command(name = "conveyor", about = "Queue-to-consumer delivery pipeline runner")]
struct Cli {
    /// Number of work items to enqueue (ids 0..count).
    #[arg(long, default_value_t = 1000)]
    count: u64,

    /// Probability that a processing attempt fails, 0.0 to 1.0.
    #[arg(long, default_value_t = 0.05)]
    fail_probability: f64,

    /// Attempts processed before fault injection starts.
    #[arg(long, default_value_t = 10)]
    fault_warmup: u64,

    /// Fixed RNG seed for reproducible fault injection.
    #[arg(long)]
    seed: Option<u64>,

    /// Per-item reply budget in milliseconds.
    #[arg(long, default_value_t = 500)]
    reply_timeout_ms: u64,

    /// Use at-most-once delivery (the transport auto-acknowledges on read,
    /// so a rejected item is lost instead of redelivered).
    #[arg(long)]
    at_most_once: bool,

    /// Under at-most-once, forward rejects to the transport instead of
    /// warning and acknowledging.
    #[arg(long)]
    forward_nacks: bool,

    /// Completion monitor sample interval in milliseconds.
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// Delay before the monitor's first idle check, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    grace_ms: u64,

    /// Consecutive no-progress ticks before the ledger is verified.
    #[arg(long, default_value_t = 2)]
    idle_ticks: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mode = if cli.at_most_once {
        DeliveryMode::AtMostOnce
    } else {
        DeliveryMode::AtLeastOnce
    };
    let key_space = usize::try_from(cli.count)?;

    info!(
        count = cli.count,
        ?mode,
        fail_probability = cli.fail_probability,
        "starting pipeline"
    );

    let ledger = Arc::new(ProcessingLedger::new(key_space));
    let faults = match cli.seed {
        Some(seed) => RandomFaults::seeded(cli.fail_probability, cli.fault_warmup, seed),
        None => RandomFaults::new(cli.fail_probability, cli.fault_warmup),
    };
    let consumer = BookingConsumer::new(TextIdCodec, Arc::clone(&ledger), faults);
    let (consumer_handle, _mailbox) = ConsumerMailbox::spawn(Arc::new(consumer));

    let (bridge_handle, bridge_task) = MediatorBridge::spawn(
        consumer_handle,
        BridgeConfig {
            reply_timeout: Duration::from_millis(cli.reply_timeout_ms),
            delivery_mode: mode,
            nack_policy: if cli.forward_nacks {
                NackPolicy::Forward
            } else {
                NackPolicy::WarnAndAccept
            },
            ..BridgeConfig::default()
        },
    );

    let shutdown = CancellationToken::new();
    let monitor = CompletionMonitor::new(
        Arc::clone(&ledger),
        MonitorConfig {
            tick_interval: Duration::from_millis(cli.tick_ms),
            grace_period: Duration::from_millis(cli.grace_ms),
            idle_ticks: cli.idle_ticks.max(1),
        },
        shutdown.clone(),
    )
    .spawn();

    let log = AckLog::new();
    let summary = QueueBroker::new(cli.count, mode, log.clone())
        .run(bridge_handle)
        .await;
    info!(
        deliveries = summary.deliveries,
        redeliveries = summary.redeliveries,
        acknowledged = log.acknowledged(),
        rejected = log.rejected(),
        "delivery finished"
    );

    // A bridge error here is a protocol violation; propagate it so the
    // process exits non-zero.
    bridge_task.await??;

    shutdown.cancelled().await;
    if let Some(report) = monitor.await? {
        if !report.is_clean() {
            warn!(
                missing = report.missing(),
                duplicates = report.duplicates(),
                "ledger verification found anomalies"
            );
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
