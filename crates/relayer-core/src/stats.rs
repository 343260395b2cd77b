//! Process-wide relay counters.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::dispatcher::Disposition;

/// Counters updated by the intake task and the workers.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    no_route: AtomicU64,
    duplicates: AtomicU64,
    confirmed: AtomicU64,
    failed: AtomicU64,
    ledger_errors: AtomicU64,
}

/// A point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// Attestations that reached the pipeline, including recovered ones.
    pub received: u64,

    /// Attestations no route matched.
    pub no_route: u64,

    /// Attestations already being processed or already final.
    pub duplicates: u64,

    /// Dispatches that ended confirmed.
    pub confirmed: u64,

    /// Dispatches that ended failed, including those without a client.
    pub failed: u64,

    /// Dispatches whose ledger access failed.
    pub ledger_errors: u64,
}

impl RelayStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn note_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_no_route(&self) {
        self.no_route.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, disposition: &Disposition) {
        let counter = match disposition {
            Disposition::Dispatched(outcome) if outcome.is_confirmed() => &self.confirmed,
            Disposition::Dispatched(_) | Disposition::NoClient => &self.failed,
            Disposition::AlreadyProcessing => &self.duplicates,
            Disposition::LedgerError => &self.ledger_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            no_route: self.no_route.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            ledger_errors: self.ledger_errors.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for RelayStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} no_route={} duplicates={} confirmed={} failed={} ledger_errors={}",
            self.received,
            self.no_route,
            self.duplicates,
            self.confirmed,
            self.failed,
            self.ledger_errors
        )
    }
}
