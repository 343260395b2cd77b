//! SQLite implementation of the processing ledger.

use std::{future::Future, path::Path};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relayer_primitives::{
    attestation::{Attestation, AttestationId, EmitterAddress},
    chain::ChainId,
    outcome::{Outcome, TxId},
};
use relayer_retry::{retry_with, RetryAction, Strategy};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use tracing::{debug, info, warn};

use super::{config::DbConfig, constants::DB_FILE_NAME, errors::StorageError};
use crate::{
    errors::{DbError, DbResult},
    ledger::ProcessingLedger,
    record::{ProcessingRecord, ProcessingStatus},
};

/// Schema migrations embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!();

const RECORD_COLUMNS: &str = "emitter_chain, emitter_address, sequence, status, destination_tx, \
                              attempts, last_error, retryable, envelope, created_at, updated_at";

/// Opens (creating if needed) the relayer database inside `datadir`.
pub async fn open_pool(
    datadir: impl AsRef<Path>,
    config: &DbConfig,
) -> Result<SqlitePool, StorageError> {
    let datadir = datadir.as_ref();
    std::fs::create_dir_all(datadir)?;
    let db_path = datadir.join(DB_FILE_NAME);

    let connect_options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .busy_timeout(config.busy_timeout)
        .journal_mode(SqliteJournalMode::Wal);

    info!(path = %db_path.display(), "opening database");
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(connect_options)
        .await?;

    Ok(pool)
}

/// [`ProcessingLedger`] persisted in SQLite.
///
/// `try_begin` is a single `INSERT .. ON CONFLICT DO UPDATE .. WHERE` statement so that the
/// claim is atomic across connections.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    config: DbConfig,
}

impl SqliteLedger {
    /// Wraps the pool and brings the schema up to date.
    pub async fn new(pool: SqlitePool, config: DbConfig) -> Result<Self, StorageError> {
        info!(action = "running migrations");
        MIGRATOR.run(&pool).await?;

        Ok(Self { pool, config })
    }

    async fn with_busy_retry<T, Fut, Gen>(&self, generator: Gen) -> Result<T, StorageError>
    where
        Fut: Future<Output = Result<T, sqlx::Error>>,
        Gen: FnMut(usize) -> Fut,
    {
        let delay = self.config.busy_retry_delay;
        let strategy = Strategy::new(move |err: &sqlx::Error, attempt| {
            if is_busy(err) {
                warn!(%err, %attempt, "database busy, retrying");
                RetryAction::Retry(delay)
            } else {
                RetryAction::Stop
            }
        })
        .with_max_retries(self.config.busy_retries);

        Ok(retry_with(strategy, generator).await?)
    }

    async fn status_of(&self, id: &AttestationId) -> DbResult<Option<ProcessingStatus>> {
        Ok(self.get(id).await?.map(|record| record.status))
    }
}

#[async_trait]
impl ProcessingLedger for SqliteLedger {
    async fn try_begin(&self, attestation: &Attestation) -> DbResult<bool> {
        let pool = &self.pool;
        let id = attestation.id();
        let (chain, emitter, sequence) = key(&id);
        let envelope = attestation.raw();
        let now = Utc::now().timestamp_millis();

        let result = self
            .with_busy_retry(move |_| async move {
                sqlx::query(
                    r#"
                    INSERT INTO processing_records (
                        emitter_chain, emitter_address, sequence, status, attempts, retryable,
                        envelope, created_at, updated_at
                    ) VALUES (?, ?, ?, 'in_flight', 0, 0, ?, ?, ?)
                    ON CONFLICT (emitter_chain, emitter_address, sequence) DO UPDATE SET
                        status = 'in_flight',
                        retryable = 0,
                        last_error = NULL,
                        envelope = excluded.envelope,
                        updated_at = excluded.updated_at
                    WHERE processing_records.status = 'pending'
                        OR (processing_records.status = 'failed_permanent'
                            AND processing_records.retryable = 1)
                    "#,
                )
                .bind(chain)
                .bind(emitter)
                .bind(sequence)
                .bind(envelope)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
            })
            .await?;

        let claimed = result.rows_affected() == 1;
        debug!(id = %attestation.id(), %claimed, "try_begin");

        Ok(claimed)
    }

    async fn commit(&self, id: &AttestationId, outcome: &Outcome) -> DbResult<()> {
        let pool = &self.pool;
        let (chain, emitter, sequence) = key(id);
        let now = Utc::now().timestamp_millis();
        let attempts = i64::from(outcome.attempts());

        let (status, tx_id, error, retryable) = match outcome {
            Outcome::Confirmed { tx_id, .. } => {
                (ProcessingStatus::Confirmed, Some(tx_id.as_str()), None, false)
            }
            Outcome::Failed {
                error, retryable, ..
            } => (
                ProcessingStatus::FailedPermanent,
                None,
                Some(error.as_str()),
                *retryable,
            ),
        };
        let status = status.as_str();

        let result = self
            .with_busy_retry(move |_| async move {
                sqlx::query(
                    r#"
                    UPDATE processing_records SET
                        status = ?,
                        destination_tx = ?,
                        attempts = attempts + ?,
                        last_error = COALESCE(?, last_error),
                        retryable = ?,
                        updated_at = ?
                    WHERE emitter_chain = ? AND emitter_address = ? AND sequence = ?
                        AND status = 'in_flight'
                    "#,
                )
                .bind(status)
                .bind(tx_id)
                .bind(attempts)
                .bind(error)
                .bind(retryable)
                .bind(now)
                .bind(chain)
                .bind(emitter)
                .bind(sequence)
                .execute(pool)
                .await
            })
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotInFlight {
                id: *id,
                found: self.status_of(id).await?,
            });
        }

        Ok(())
    }

    async fn get(&self, id: &AttestationId) -> DbResult<Option<ProcessingRecord>> {
        let pool = &self.pool;
        let (chain, emitter, sequence) = key(id);
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM processing_records \
             WHERE emitter_chain = ? AND emitter_address = ? AND sequence = ?"
        );
        let sql = sql.as_str();

        let row = self
            .with_busy_retry(move |_| async move {
                sqlx::query(sql)
                    .bind(chain)
                    .bind(emitter)
                    .bind(sequence)
                    .fetch_optional(pool)
                    .await
            })
            .await?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn recover_in_flight(&self) -> DbResult<Vec<ProcessingRecord>> {
        let pool = &self.pool;
        let now = Utc::now().timestamp_millis();
        let select = format!(
            "SELECT {RECORD_COLUMNS} FROM processing_records \
             WHERE status = 'pending' ORDER BY created_at"
        );
        let select = select.as_str();

        let (reset, rows) = self
            .with_busy_retry(move |_| async move {
                let mut tx = pool.begin().await?;

                let reset = sqlx::query(
                    "UPDATE processing_records SET status = 'pending', updated_at = ? \
                     WHERE status = 'in_flight'",
                )
                .bind(now)
                .execute(&mut *tx)
                .await?
                .rows_affected();
                let rows = sqlx::query(select).fetch_all(&mut *tx).await?;

                tx.commit().await?;

                Ok::<_, sqlx::Error>((reset, rows))
            })
            .await?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        info!(%reset, pending = %records.len(), "recovered processing records");

        Ok(records)
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> DbResult<u64> {
        let pool = &self.pool;
        let cutoff = older_than.timestamp_millis();

        let result = self
            .with_busy_retry(move |_| async move {
                sqlx::query(
                    "DELETE FROM processing_records \
                     WHERE status IN ('confirmed', 'failed_permanent') AND updated_at < ?",
                )
                .bind(cutoff)
                .execute(pool)
                .await
            })
            .await?;

        Ok(result.rows_affected())
    }
}

/// Splits an identity into its column values. Sequences are stored as their two's complement
/// bit pattern since SQLite integers are signed.
fn key(id: &AttestationId) -> (i64, &[u8], i64) {
    (
        i64::from(id.emitter_chain.get()),
        id.emitter.as_bytes().as_slice(),
        id.sequence as i64,
    )
}

fn record_from_row(row: &SqliteRow) -> Result<ProcessingRecord, StorageError> {
    let chain: i64 = row.try_get("emitter_chain")?;
    let chain = u16::try_from(chain)
        .map_err(|_| StorageError::MismatchedTypes(format!("emitter_chain {chain} out of range")))?;

    let emitter: Vec<u8> = row.try_get("emitter_address")?;
    let emitter = <[u8; 32]>::try_from(emitter.as_slice()).map_err(|_| {
        StorageError::MismatchedTypes(format!("emitter_address has {} bytes", emitter.len()))
    })?;

    let sequence: i64 = row.try_get("sequence")?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<ProcessingStatus>()
        .map_err(StorageError::InvalidData)?;

    let attempts: i64 = row.try_get("attempts")?;
    let attempts = u32::try_from(attempts)
        .map_err(|_| StorageError::MismatchedTypes(format!("attempts {attempts} out of range")))?;

    Ok(ProcessingRecord {
        id: AttestationId {
            emitter_chain: ChainId::new(chain),
            emitter: EmitterAddress::new(emitter),
            sequence: sequence as u64,
        },
        status,
        destination_tx: row
            .try_get::<Option<String>, _>("destination_tx")?
            .map(TxId::new),
        attempts,
        last_error: row.try_get("last_error")?,
        retryable: row.try_get("retryable")?,
        envelope: row.try_get("envelope")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::InvalidData(format!("timestamp {millis} out of range")))
}

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes, and pool exhaustion.
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}
