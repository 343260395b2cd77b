//! Periodic deletion of old terminal records.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use relayer_db::ledger::ProcessingLedger;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RetentionConfig;

/// Prunes terminal records older than `cfg.max_age` every `cfg.interval` until `cancel` fires.
///
/// The first pass runs immediately. A failed pass is logged and retried on the next tick.
pub async fn run_retention(
    ledger: Arc<dyn ProcessingLedger>,
    cfg: RetentionConfig,
    cancel: CancellationToken,
) {
    let max_age = match TimeDelta::from_std(cfg.max_age) {
        Ok(max_age) => max_age,
        Err(err) => {
            error!(%err, max_age = ?cfg.max_age, "retention window out of range, pruning disabled");
            return;
        }
    };

    info!(max_age = ?cfg.max_age, interval = ?cfg.interval, "starting ledger pruning");
    let mut ticker = interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
            continue;
        };
        match ledger.prune(cutoff).await {
            Ok(0) => debug!(%cutoff, "nothing to prune"),
            Ok(removed) => info!(%removed, %cutoff, "pruned terminal records"),
            Err(err) => warn!(%err, "pruning failed"),
        }
    }

    debug!("ledger pruning stopped");
}
