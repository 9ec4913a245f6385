//! Background retry pass over the recovery queue.
//!
//! A sweeper wakes on a fixed period and drains pending items until the
//! queue stops yielding work. A pass that fails (or keeps failing items)
//! simply waits for the next tick; there is no per-pass timeout. The
//! random share of the initial delay spreads sweeps across nodes started
//! together.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codescan_types::SweepSettings;

use crate::engine::SyncEngine;

/// Periodic background consumer of the recovery queue.
pub struct RecoverySweeper {
    engine: Arc<SyncEngine>,
    settings: SweepSettings,
}

impl RecoverySweeper {
    pub fn new(engine: Arc<SyncEngine>, settings: SweepSettings) -> Self {
        Self { engine, settings }
    }

    /// Start the sweeper loop on the runtime. Cancel the token to stop it.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        let initial = Duration::from_secs(self.settings.initial_delay_secs)
            + jitter(self.settings.max_jitter_secs);
        debug!(delay = ?initial, "Recovery sweeper scheduled");

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(initial) => {}
        }

        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.settings.loop_delay_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Recovery sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let engine = self.engine.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || sweep_until_drained(&engine)).await
            {
                warn!(error = %e, "Sweep task panicked");
            }
        }
    }
}

fn jitter(max_secs: u64) -> Duration {
    if max_secs == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_secs * 1000))
}

/// Run sweep passes until the queue yields nothing, a pass keeps failing
/// items, or a pass errors. Whatever remains waits for the next tick.
fn sweep_until_drained(engine: &SyncEngine) {
    loop {
        match engine.sweep() {
            Ok(result) if result.total == 0 => break,
            Ok(result) => {
                info!(
                    total = result.total,
                    failures = result.failures,
                    "Sweep pass finished"
                );
                if !result.is_success() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Sweep pass failed");
                break;
            }
        }
    }
}
