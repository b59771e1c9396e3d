use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use ttlkv::repl::{self, Repl};
use ttlkv::{KvStore, Options, DEFAULT_MAX_SIZE};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// File holding one `key:value` line per key.
    #[clap(long, env = "TTLKV_DB_PATH", default_value = "./data/db.txt", global = true)]
    db_path: PathBuf,

    /// File holding one `key:expiry` line per key.
    #[clap(long, env = "TTLKV_META_PATH", default_value = "./data/db-meta.txt", global = true)]
    meta_path: PathBuf,

    /// TTL in seconds for keys created without one.
    #[clap(
        long,
        env = "TTLKV_DEFAULT_TTL",
        default_value_t = 86400,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    default_ttl: u64,

    /// Largest size in bytes either file may grow to.
    #[clap(long, env = "TTLKV_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_SIZE, global = true)]
    max_file_size: u64,

    /// fsync after every write.
    #[clap(long, global = true)]
    sync_writes: bool,

    /// Log level used when `RUST_LOG` is unset.
    #[clap(long, default_value = "warn", global = true)]
    log_level: String,

    /// Runs a single command instead of the interactive menu.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    Create {
        key: String,
        value: String,
        /// Seconds until the key expires. 0 or less means the default.
        #[clap(long, default_value_t = 0, allow_negative_numbers = true)]
        ttl: i64,
    },
    Read {
        key: String,
    },
    Delete {
        key: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::configure(logging::level_from_str(&args.log_level));

    let options = Options::default()
        .with_value_log_path(args.db_path)
        .with_meta_log_path(args.meta_path)
        .with_default_ttl(Duration::from_secs(args.default_ttl))
        .with_max_file_size(args.max_file_size)
        .with_sync_writes(args.sync_writes);
    debug!(?options, "Opening store");
    let store = KvStore::open(options).context("Failed to open store")?;

    let result = match args.command {
        None => {
            let stdin = io::stdin();
            return Repl::new(&store, stdin.lock(), io::stdout(), io::stderr())
                .run()
                .context("Terminal I/O failed");
        }
        Some(Command::Create { key, value, ttl }) => {
            let ttl_secs = u64::try_from(ttl).unwrap_or(0);
            store
                .put(&key, value, ttl_secs)
                .map(|()| println!("SUCCESS: Key-Value pair has been added successfully"))
        }
        Some(Command::Read { key }) => store
            .get(&key)
            .map(|value| println!("{}", String::from_utf8_lossy(&value))),
        Some(Command::Delete { key }) => store
            .delete(&key)
            .map(|()| println!("SUCCESS: Key-Value pair has been deleted successfully")),
    };

    if let Err(e) = result {
        eprintln!("FAILED: {}", repl::describe_error(&e));
        std::process::exit(1);
    }
    Ok(())
}
