//! Control-loop dispatch pump
//!
//! Calls [`EventBus::process`] once per fixed period with the configured
//! budget, the way the controller's main loop does between module updates.
//!
//! # Example
//!
//! ```rust,no_run
//! use appliance_events::{driver, EventBus, EventBusConfig};
//!
//! async fn example() {
//!     let config = EventBusConfig::from_env();
//!     let mut bus = EventBus::with_config(&config).unwrap();
//!
//!     let report = driver::run_dispatch_loop(&mut bus, &config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//!     println!("dispatched {} events", report.events_processed);
//! }
//! ```

use crate::bus::EventBus;
use crate::config::EventBusConfig;
use std::future::Future;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Summary of a dispatch loop run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchLoopReport {
    /// Number of loop iterations
    pub cycles: u64,
    /// Events dispatched across all iterations
    pub events_processed: u64,
    /// Iterations whose dispatch took longer than one period
    pub overruns: u64,
}

/// Drive `bus.process` every `config.loop_period()` until `shutdown` resolves.
///
/// Missed ticks are skipped rather than bursted, so an overrun never causes
/// back-to-back dispatch passes.
pub async fn run_dispatch_loop<F>(
    bus: &mut EventBus,
    config: &EventBusConfig,
    shutdown: F,
) -> DispatchLoopReport
where
    F: Future<Output = ()>,
{
    let period = config.loop_period();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(
        period_ms = config.loop_period_ms,
        budget_ms = config.process_budget_ms,
        "Dispatch loop starting"
    );

    let mut report = DispatchLoopReport::default();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let cycle_start = Instant::now();
                let processed = bus.process(config.process_budget_ms);
                let cycle_time = cycle_start.elapsed();

                report.cycles += 1;
                report.events_processed += processed as u64;
                if cycle_time > period {
                    report.overruns += 1;
                    warn!(
                        cycle_us = u64::try_from(cycle_time.as_micros()).unwrap_or(u64::MAX),
                        processed,
                        "Dispatch cycle overrun"
                    );
                }
            }
        }
    }

    info!(
        cycles = report.cycles,
        events_processed = report.events_processed,
        overruns = report.overruns,
        "Dispatch loop stopped"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_loop_dispatches_until_shutdown() {
        let config = EventBusConfig::default();
        let mut bus = EventBus::with_config(&config).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe("*", move |event: &Event| sink.lock().push(event.event_type.clone()));

        let publisher = bus.publisher();
        publisher.publish("system.started", json!({})).unwrap();
        publisher.publish("sensor.reading", json!({})).unwrap();

        let report = run_dispatch_loop(
            &mut bus,
            &config,
            tokio::time::sleep(Duration::from_millis(35)),
        )
        .await;

        assert!(report.cycles >= 3);
        assert_eq!(report.events_processed, 2);
        assert_eq!(*seen.lock(), vec!["system.started", "sensor.reading"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_picks_up_events_published_while_running() {
        let config = EventBusConfig::default();
        let mut bus = EventBus::with_config(&config).unwrap();
        let publisher = bus.publisher();

        let producer = tokio::spawn(async move {
            for i in 0..5 {
                tokio::time::sleep(Duration::from_millis(7)).await;
                publisher.publish(format!("tick.{}", i), json!(i)).unwrap();
            }
        });

        let report = run_dispatch_loop(
            &mut bus,
            &config,
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;
        producer.await.unwrap();

        assert_eq!(report.events_processed, 5);
        assert_eq!(bus.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_slow_handler_counts_overrun() {
        let config = EventBusConfig::default();
        let mut bus = EventBus::with_config(&config).unwrap();
        bus.subscribe("compressor.*", |_: &Event| {
            std::thread::sleep(Duration::from_millis(25));
        });
        bus.publish("compressor.defrost", json!(null)).unwrap();

        let report = run_dispatch_loop(
            &mut bus,
            &config,
            tokio::time::sleep(Duration::from_millis(60)),
        )
        .await;

        assert_eq!(report.events_processed, 1);
        assert!(report.overruns >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_shutdown() {
        let config = EventBusConfig::default();
        let mut bus = EventBus::with_config(&config).unwrap();

        let report = run_dispatch_loop(&mut bus, &config, std::future::ready(())).await;
        assert!(report.cycles <= 1);
        assert_eq!(report.events_processed, 0);
    }
}
