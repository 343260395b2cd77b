//! Wires the relayer together and runs it until shutdown.

use std::sync::Arc;

use anyhow::Context;
use attestation_feed::{client::AttestationFeed, errors::FeedError};
use chain_clients::registry::ClientRegistry;
use relayer_core::{
    controller::RetryController, dispatcher::Dispatcher, pipeline::Relayer,
    retention::run_retention,
};
use relayer_db::{
    ledger::ProcessingLedger,
    persistent::{open_pool, SqliteLedger},
};
use relayer_primitives::{attestation::Attestation, route::RouteTable};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;

/// Builds every component from `config`, relays until a shutdown signal arrives and logs the
/// final counters.
///
/// Any error returned here happened during startup.
pub(crate) async fn bootstrap(config: Config) -> anyhow::Result<()> {
    info!("bootstrapping attestation relayer");

    let cancel = CancellationToken::new();
    start_signal_listener(cancel.clone());

    let routes = RouteTable::new(config.routes.iter().cloned()).context("invalid route table")?;
    let clients =
        ClientRegistry::from_configs(&config.chains).context("failed to build chain clients")?;
    clients
        .ensure_routes(&routes)
        .context("route table does not match chain clients")?;
    info!(routes = routes.len(), chains = ?clients.chains(), "loaded routes");

    let pool = open_pool(&config.datadir, &config.db)
        .await
        .context("failed to open database")?;
    let ledger = Arc::new(
        SqliteLedger::new(pool, config.db.clone())
            .await
            .context("failed to initialize ledger")?,
    );
    let recovered = recover(ledger.as_ref()).await?;

    let (feed, attestations) =
        match AttestationFeed::connect(config.feed.clone(), cancel.clone()).await {
            Ok(connected) => connected,
            Err(FeedError::Closed) => {
                info!("shutdown requested during startup");
                return Ok(());
            }
            Err(err) => return Err(err).context("failed to connect to attestation feed"),
        };

    let retention = config.relay.retention.clone().map(|cfg| {
        tokio::spawn(run_retention(
            ledger.clone() as Arc<dyn ProcessingLedger>,
            cfg,
            cancel.clone(),
        ))
    });

    let dispatcher = Dispatcher::new(
        ledger,
        Arc::new(clients),
        RetryController::new(config.retry.clone()),
    );
    let relayer = Relayer::new(
        Arc::new(routes),
        Arc::new(dispatcher),
        config.relay.clone(),
    );

    relayer.run(recovered, attestations, cancel.clone()).await;

    // the pipeline also stops when the feed gives up; make sure everything else follows
    cancel.cancel();
    let feed_stats = feed.stats();
    feed.close().await;
    if let Some(task) = retention {
        if let Err(err) = task.await {
            warn!(%err, "retention task ended abnormally");
        }
    }

    info!(
        feed_received = feed_stats.received,
        feed_malformed = feed_stats.malformed,
        relay = %relayer.stats().snapshot(),
        "relayer stopped"
    );

    Ok(())
}

/// Returns in-flight records to pending and decodes their stored envelopes for re-dispatch.
async fn recover(ledger: &dyn ProcessingLedger) -> anyhow::Result<Vec<Attestation>> {
    let records = ledger
        .recover_in_flight()
        .await
        .context("failed to recover interrupted dispatches")?;

    let recovered = records
        .into_iter()
        .filter_map(|record| match Attestation::decode(&record.envelope) {
            Ok(attestation) => Some(attestation),
            Err(err) => {
                warn!(id = %record.id, %err, "stored envelope is unreadable, skipping");
                None
            }
        })
        .collect::<Vec<_>>();

    if !recovered.is_empty() {
        info!(count = recovered.len(), "re-dispatching recovered attestations");
    }

    Ok(recovered)
}

/// Cancels `cancel` on SIGINT or SIGTERM.
fn start_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = interrupt => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            warn!(%err, "could not listen for SIGTERM");
            interrupt.await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
