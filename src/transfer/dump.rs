// ABOUTME: Full dump runner: offset-paged copy of an entire source table
// ABOUTME: Pages from a total counted up front, commits one transaction per page

use crate::accessor::{AccessorError, TableAccessor};
use crate::transfer::{nominal_batches, DumpOptions, TransferError, TransferReport};

/// Copy the whole source table into the destination in fixed-size pages.
///
/// Pages are computed from the total counted at the start of the run, so
/// rows added to the source while the dump runs are not picked up. There is
/// no resume: re-running copies everything again, and will duplicate rows
/// unless the destination enforces uniqueness. Use [`migrate`] for the
/// re-runnable path.
///
/// Any error aborts the remaining pages; the in-flight page rolls back,
/// pages committed before it stay committed, and the returned error carries
/// the rows already durable.
///
/// [`migrate`]: crate::transfer::migrate
pub fn dump(
    source: &mut dyn TableAccessor,
    dest: &mut dyn TableAccessor,
    options: &DumpOptions,
) -> Result<TransferReport, TransferError> {
    if options.batch_size == 0 {
        return Err(TransferError::new(
            AccessorError::Other(anyhow::anyhow!("batch_size must be greater than zero")),
            0,
            0,
        ));
    }

    if options.snapshot_read {
        source
            .begin_read_snapshot()
            .map_err(|e| TransferError::new(e, 0, 0))?;
    }

    let result = run(source, dest, options);

    if options.snapshot_read {
        if let Err(e) = source.end_read_snapshot() {
            // The committed pages are already durable on the destination;
            // failing to release the source snapshot does not undo them.
            tracing::warn!("Failed to release source read snapshot: {}", e);
        }
    }

    result
}

fn run(
    source: &mut dyn TableAccessor,
    dest: &mut dyn TableAccessor,
    options: &DumpOptions,
) -> Result<TransferReport, TransferError> {
    let mut rows_processed: u64 = 0;
    let mut batches_committed: u64 = 0;

    let fail = |e: AccessorError, rows: u64, batches: u64| TransferError::new(e, rows, batches);

    let columns = source.column_names().map_err(|e| fail(e, 0, 0))?;
    let total = source.count_rows(None).map_err(|e| fail(e, 0, 0))?;

    tracing::info!("Total rows to process: {}", total);
    tracing::debug!(
        "Dumping in {} pages of up to {} rows",
        nominal_batches(total, options.batch_size),
        options.batch_size
    );

    let batch_size = options.batch_size as u64;
    let mut offset: u64 = 0;

    while offset < total {
        let page = source
            .read_page(offset, options.batch_size)
            .map_err(|e| fail(e, rows_processed, batches_committed))?;

        if page.is_empty() {
            tracing::debug!("Empty page at offset {}, stopping early", offset);
            break;
        }

        dest.insert_batch(&columns, &page)
            .map_err(|e| fail(e, rows_processed, batches_committed))?;

        rows_processed += page.len() as u64;
        batches_committed += 1;

        tracing::info!(
            "Batch from {} to {} processed ({} rows)",
            offset,
            offset + batch_size,
            page.len()
        );

        offset += batch_size;
    }

    tracing::info!(
        "Dump complete: {} rows in {} batches",
        rows_processed,
        batches_committed
    );

    Ok(TransferReport {
        rows_processed,
        batches_committed,
        watermark: None,
    })
}
