// ABOUTME: CLI entry point for table-shuttle
// ABOUTME: Parses commands and routes to appropriate handlers

use clap::{Parser, Subcommand};
use table_shuttle::commands;
use table_shuttle::transfer::{DumpOptions, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE};

#[derive(Parser)]
#[command(name = "table-shuttle")]
#[command(about = "Batched table-to-table copy with watermark-based incremental migration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy an entire source table in fixed-size pages (no resume)
    Dump {
        /// Path to the source SQLite database (opened read-only)
        #[arg(long)]
        source: String,
        /// Path to the destination SQLite database (created if missing)
        #[arg(long)]
        dest: String,
        /// Table to read from
        #[arg(long)]
        source_table: String,
        /// Table to write to (defaults to the source table name)
        #[arg(long)]
        dest_table: Option<String>,
        /// Rows per page
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Pin a read snapshot on the source for the whole run
        #[arg(long)]
        snapshot_read: bool,
        /// Print the final report as a single JSON line
        #[arg(long)]
        json: bool,
    },
    /// Copy only rows newer than the destination's watermark (re-runnable)
    Migrate {
        /// Path to the source SQLite database (opened read-only)
        #[arg(long)]
        source: String,
        /// Path to the destination SQLite database (created if missing)
        #[arg(long)]
        dest: String,
        /// Table to read from
        #[arg(long)]
        source_table: String,
        /// Table to write to (defaults to the source table name)
        #[arg(long)]
        dest_table: Option<String>,
        /// Rows per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Strictly increasing integer identifier column
        #[arg(long, default_value = "id")]
        id_column: String,
        /// Print the final report as a single JSON line
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dump {
            source,
            dest,
            source_table,
            dest_table,
            batch_size,
            snapshot_read,
            json,
        } => {
            let dest_table = dest_table.unwrap_or_else(|| source_table.clone());
            commands::dump(
                &source,
                &dest,
                &source_table,
                &dest_table,
                DumpOptions {
                    batch_size,
                    snapshot_read,
                },
                json,
            )
        }
        Commands::Migrate {
            source,
            dest,
            source_table,
            dest_table,
            chunk_size,
            id_column,
            json,
        } => {
            let dest_table = dest_table.unwrap_or_else(|| source_table.clone());
            commands::migrate(
                &source,
                &dest,
                &source_table,
                &dest_table,
                &id_column,
                chunk_size,
                json,
            )
        }
    }
}
