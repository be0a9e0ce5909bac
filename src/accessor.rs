// ABOUTME: Table accessor contract consumed by the transfer runners
// ABOUTME: Defines the classified error taxonomy for fetch and insert operations

use crate::row::Row;

/// Error raised by a table accessor, classified by kind.
///
/// The transfer runners abort the run on any of these, but the kind is
/// preserved all the way to the caller so it can distinguish transient
/// connectivity failures (worth re-running — the incremental path resumes
/// from the committed watermark) from terminal schema or constraint
/// failures (re-running will fail the same way).
#[derive(Debug, thiserror::Error)]
pub enum AccessorError {
    /// Connection lost, database locked/busy, file unreadable. Retryable.
    #[error("connectivity error: {0}")]
    Connectivity(#[source] anyhow::Error),

    /// Missing table or column, or a type that breaks the contract.
    #[error("schema error: {0}")]
    Schema(String),

    /// Constraint violation on insert (duplicate key, NOT NULL, CHECK).
    #[error("constraint violation: {0}")]
    Constraint(#[source] anyhow::Error),

    /// Anything the accessor could not classify.
    #[error("accessor error: {0}")]
    Other(#[source] anyhow::Error),
}

impl AccessorError {
    /// Whether re-running the transfer may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AccessorError::Connectivity(_))
    }

    /// Short machine-readable kind label for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AccessorError::Connectivity(_) => "connectivity",
            AccessorError::Schema(_) => "schema",
            AccessorError::Constraint(_) => "constraint",
            AccessorError::Other(_) => "other",
        }
    }
}

/// A connection handle bound to one named table.
///
/// One implementation per storage engine; the shipped one is SQLite (see
/// [`crate::sqlite::SqliteTable`]). The runners only ever talk to this
/// trait, which is also the seam the failure-injection tests use.
///
/// Reads are ordinary blocking calls. `insert_batch` must be atomic: either
/// the whole batch commits or none of it does.
pub trait TableAccessor {
    /// Column names of the bound table, introspected once per run.
    fn column_names(&self) -> Result<Vec<String>, AccessorError>;

    /// Row count, optionally restricted to `id > min_id_exclusive`.
    fn count_rows(&self, min_id_exclusive: Option<i64>) -> Result<u64, AccessorError>;

    /// Fetch up to `limit` rows starting at `offset` (full-dump paging).
    fn read_page(&self, offset: u64, limit: usize) -> Result<Vec<Row>, AccessorError>;

    /// Fetch up to `limit` rows with `id > watermark`, ascending by id.
    fn read_after(&self, watermark: i64, limit: usize) -> Result<Vec<Row>, AccessorError>;

    /// Maximum value of the id column, or `None` for an empty table.
    fn max_id(&self) -> Result<Option<i64>, AccessorError>;

    /// Insert `rows` projected to `columns` in a single transaction.
    ///
    /// Commits on success; rolls back and returns the error otherwise.
    fn insert_batch(&mut self, columns: &[String], rows: &[Row]) -> Result<(), AccessorError>;

    /// Pin a read snapshot for the duration of a run, if the engine
    /// supports one. Default is a no-op.
    fn begin_read_snapshot(&mut self) -> Result<(), AccessorError> {
        Ok(())
    }

    /// Release a snapshot pinned by [`begin_read_snapshot`]. Must be safe
    /// to call when no snapshot is active.
    ///
    /// [`begin_read_snapshot`]: TableAccessor::begin_read_snapshot
    fn end_read_snapshot(&mut self) -> Result<(), AccessorError> {
        Ok(())
    }
}
