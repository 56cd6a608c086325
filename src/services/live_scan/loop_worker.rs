use crate::error::AppError;
use crate::models::scan_types::ScanTrigger;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::{CycleStart, ScanShared};

pub(crate) async fn scan_loop(
    shared: Arc<ScanShared>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let Some(first_tick) = Instant::now().checked_add(interval) else {
        warn!(
            "Scan interval of {}ms is out of range, no ticks will fire",
            interval.as_millis()
        );
        cancel_token.cancelled().await;
        return;
    };
    let mut ticker = tokio::time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!("scan loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                if cancel_token.is_cancelled() {
                    break;
                }
                let start = shared.session().begin_cycle(ScanTrigger::Tick);
                if start != CycleStart::Started {
                    continue;
                }

                // Cycles run detached so later ticks keep firing and are counted as dropped.
                let cycle = Arc::clone(&shared);
                tokio::spawn(async move {
                    match cycle.run_cycle().await {
                        Ok(result) => info!(
                            "Scan cycle: {} ({:.1}%)",
                            result.class_name,
                            result.confidence * 100.0
                        ),
                        Err(AppError::NotReady) => {
                            warn!("Scan cycle skipped: prediction gateway is not initialized")
                        }
                        Err(e) => error!("Scan cycle failed: {}", e),
                    }
                });
            }
        }
    }
}
