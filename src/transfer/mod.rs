// ABOUTME: Transfer runners: full dump and incremental migration
// ABOUTME: Shared options, report, and error types carrying partial progress

pub mod dump;
pub mod migrate;

pub use dump::dump;
pub use migrate::migrate;

use crate::accessor::AccessorError;
use serde::Serialize;

/// Default page size for the full dump.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default chunk size for the incremental migration.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Options for the full dump.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Rows per page, and the offset stride.
    pub batch_size: usize,
    /// Pin a read snapshot on the source for the whole run, so offset
    /// paging is not skewed by concurrent writes.
    pub snapshot_read: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            snapshot_read: false,
        }
    }
}

/// Options for the incremental migration.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Rows per chunk.
    pub chunk_size: usize,
    /// Name of the strictly increasing integer identifier column.
    pub id_column: String,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            id_column: "id".to_string(),
        }
    }
}

/// Outcome of a completed transfer run.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    /// Rows inserted and committed into the destination.
    pub rows_processed: u64,
    /// Batches/chunks committed.
    pub batches_committed: u64,
    /// Final watermark (incremental runs only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<i64>,
}

/// A transfer run that aborted mid-way.
///
/// Prior committed batches stay committed; this error reports what was
/// already durable when the failing operation rolled back.
#[derive(Debug, thiserror::Error)]
#[error(
    "transfer aborted after {rows_processed} rows in {batches_committed} committed batches ({kind}): {source}"
)]
pub struct TransferError {
    /// Classified kind of the underlying failure.
    pub kind: &'static str,
    /// Rows committed before the failure.
    pub rows_processed: u64,
    /// Batches committed before the failure.
    pub batches_committed: u64,
    #[source]
    pub source: AccessorError,
}

impl TransferError {
    pub(crate) fn new(source: AccessorError, rows_processed: u64, batches_committed: u64) -> Self {
        Self {
            kind: source.kind(),
            rows_processed,
            batches_committed,
            source,
        }
    }

    /// Whether re-running may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Nominal batch count for progress reporting: `ceil(total / size)`.
pub(crate) fn nominal_batches(total: u64, size: usize) -> u64 {
    let size = size as u64;
    total.div_ceil(size)
}
