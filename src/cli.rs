//! Command-line interface: argument parsing and dispatch.

use std::path::PathBuf;

use clap::Parser;
use tracing::error;

use comic_index_builder::build::{run_build, BuildOptions};
use comic_index_builder::error::BuildError;

const DEFAULT_DB_PATH: &str = "data/catalog.sqlite3";
const DEFAULT_OUT_DIR: &str = "public/assets";

/// Build client-side n-gram/tag search artifacts from a catalog SQLite database.
#[derive(Parser, Debug)]
#[command(name = "build-index", version, about)]
pub struct Cli {
    /// SQLite database file to read the `comics` table from
    #[arg(default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Directory to write generated index artifacts into
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    pub out_dir: PathBuf,

    /// Override the manifest's `generatedAt` timestamp (ISO-8601). Defaults
    /// to the current UTC time.
    #[arg(long, default_value = "")]
    pub generated_at: String,

    /// Remove stale generated artifacts from a previous run after building
    #[arg(long)]
    pub clean: bool,

    /// Split meta-lite into fixed-size shards of this many documents (0 = no sharding)
    #[arg(long, default_value_t = 4096)]
    pub meta_shard_docs: usize,

    /// Number of tokenKey-hash shards for the n-gram postings index (0 = single shard)
    #[arg(long, default_value_t = 8)]
    pub index_shard_count: u32,

    /// Log verbosity: error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Shorthand for `--log-level debug`
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn init_tracing(log_level: &str, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        match log_level {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse CLI args, run the build, and return a process exit code:
/// 0 on success, 1 if the database file is missing, 2 on any other error.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.verbose);

    let options = BuildOptions {
        db_path: cli.db,
        out_dir: cli.out_dir,
        generated_at: Some(cli.generated_at).filter(|s| !s.is_empty()),
        clean: cli.clean,
        meta_shard_docs: cli.meta_shard_docs,
        index_shard_count: cli.index_shard_count,
    };

    match run_build(&options) {
        Ok(report) => {
            println!("Generated index:");
            println!("- {}", report.manifest_path.display());
            for path in &report.written_files {
                println!("- {}", path.display());
            }
            println!(
                "- {} docs, {} tokens, {} index bytes",
                report.stats.count, report.stats.unique_tokens, report.stats.index_bytes
            );
            0
        }
        Err(err @ BuildError::DbNotFound(_)) => {
            error!("{err}");
            1
        }
        Err(err) => {
            error!("{err}");
            2
        }
    }
}
