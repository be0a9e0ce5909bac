// ABOUTME: Command implementations wiring CLI arguments to the transfer runners
// ABOUTME: Opens scoped source/destination handles and prints the run summary

use crate::sqlite::{open_dest, open_source, SqliteTable};
use crate::transfer::{self, DumpOptions, MigrateOptions, TransferReport};
use anyhow::{Context, Result};

/// Run a full dump from one SQLite table to another.
///
/// The source is opened read-only and the destination read-write; both
/// handles live for exactly this call and are released on every exit path.
pub fn dump(
    source_path: &str,
    dest_path: &str,
    source_table: &str,
    dest_table: &str,
    options: DumpOptions,
    json: bool,
) -> Result<()> {
    let source_conn = open_source(source_path)?;
    let dest_conn = open_dest(dest_path)?;

    let mut source = SqliteTable::new(source_conn, source_table)?;
    let mut dest = SqliteTable::new(dest_conn, dest_table)?;

    tracing::info!(
        "Dumping '{}' into '{}' (batch size {})",
        source_table,
        dest_table,
        options.batch_size
    );

    let report = transfer::dump(&mut source, &mut dest, &options).map_err(report_failure)?;

    print_report("Dump", &report, json)?;
    Ok(())
}

/// Run an incremental migration from one SQLite table to another.
pub fn migrate(
    source_path: &str,
    dest_path: &str,
    source_table: &str,
    dest_table: &str,
    id_column: &str,
    chunk_size: usize,
    json: bool,
) -> Result<()> {
    let source_conn = open_source(source_path)?;
    let dest_conn = open_dest(dest_path)?;

    let mut source = SqliteTable::with_id_column(source_conn, source_table, id_column)?;
    let mut dest = SqliteTable::with_id_column(dest_conn, dest_table, id_column)?;

    let options = MigrateOptions {
        chunk_size,
        id_column: id_column.to_string(),
    };

    tracing::info!(
        "Migrating '{}' into '{}' (chunk size {}, id column '{}')",
        source_table,
        dest_table,
        options.chunk_size,
        id_column
    );

    let report = transfer::migrate(&mut source, &mut dest, &options).map_err(report_failure)?;

    print_report("Migration", &report, json)?;
    Ok(())
}

fn report_failure(err: transfer::TransferError) -> anyhow::Error {
    tracing::error!(
        "Run aborted after {} rows in {} committed batches",
        err.rows_processed,
        err.batches_committed
    );
    if err.is_retryable() {
        tracing::warn!("The failure looks transient; re-running will resume committed progress");
    }
    anyhow::Error::new(err)
}

fn print_report(what: &str, report: &TransferReport, json: bool) -> Result<()> {
    if json {
        let line =
            serde_json::to_string(report).context("Failed to serialize transfer report")?;
        println!("{}", line);
    } else {
        tracing::info!(
            "✓ {} finished: {} rows in {} batches",
            what,
            report.rows_processed,
            report.batches_committed
        );
        if let Some(watermark) = report.watermark {
            tracing::info!("  Final watermark: {}", watermark);
        }
    }
    Ok(())
}
