// ABOUTME: Incremental migration runner: watermark-bounded, id-ordered copy
// ABOUTME: Resumes from the destination's max id and commits one transaction per chunk

use crate::accessor::{AccessorError, TableAccessor};
use crate::row::integer_id;
use crate::transfer::{nominal_batches, MigrateOptions, TransferError, TransferReport};

/// Transfer source rows the destination does not yet hold.
///
/// The watermark is the destination's maximum id (0 when empty); only rows
/// with `id > watermark` are fetched, in id order, and the watermark
/// advances to the last row of each committed chunk. The loop terminates on
/// the first empty fetch, not on the nominal chunk count — rows arriving
/// above the watermark while the run is in flight are picked up.
///
/// Safe to re-run: a second run at quiescence transfers zero rows, and a
/// run aborted mid-way resumes from the last committed chunk.
pub fn migrate(
    source: &mut dyn TableAccessor,
    dest: &mut dyn TableAccessor,
    options: &MigrateOptions,
) -> Result<TransferReport, TransferError> {
    if options.chunk_size == 0 {
        return Err(TransferError::new(
            AccessorError::Other(anyhow::anyhow!("chunk_size must be greater than zero")),
            0,
            0,
        ));
    }

    let mut rows_processed: u64 = 0;
    let mut chunks_committed: u64 = 0;

    let fail = |e: AccessorError, rows: u64, chunks: u64| TransferError::new(e, rows, chunks);

    let columns = source.column_names().map_err(|e| fail(e, 0, 0))?;

    let mut watermark = dest.max_id().map_err(|e| fail(e, 0, 0))?.unwrap_or(0);
    let remaining = source
        .count_rows(Some(watermark))
        .map_err(|e| fail(e, 0, 0))?;

    // The nominal count only feeds progress lines; termination is the
    // empty fetch below.
    let nominal_chunks = nominal_batches(remaining, options.chunk_size);

    tracing::info!("Total records to insert: {}", remaining);
    tracing::debug!(
        "Starting from watermark {} in up to {} chunks of {}",
        watermark,
        nominal_chunks,
        options.chunk_size
    );

    loop {
        let chunk = source
            .read_after(watermark, options.chunk_size)
            .map_err(|e| fail(e, rows_processed, chunks_committed))?;

        let Some(last_row) = chunk.last() else {
            break;
        };

        // Chunks are id-ordered, so the last row carries the new watermark.
        let last_id = integer_id(last_row, &options.id_column)
            .map_err(|e| fail(e, rows_processed, chunks_committed))?;

        dest.insert_batch(&columns, &chunk)
            .map_err(|e| fail(e, rows_processed, chunks_committed))?;

        rows_processed += chunk.len() as u64;
        chunks_committed += 1;
        watermark = last_id;

        tracing::info!(
            "Chunk {}/{}: inserted {} records up to id {}",
            chunks_committed,
            nominal_chunks,
            chunk.len(),
            watermark
        );
    }

    tracing::info!(
        "Migration complete: {} rows in {} chunks, watermark {}",
        rows_processed,
        chunks_committed,
        watermark
    );

    Ok(TransferReport {
        rows_processed,
        batches_committed: chunks_committed,
        watermark: Some(watermark),
    })
}
