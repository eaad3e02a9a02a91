use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use minidb::common::types::TxnId;
use minidb::{Database, DatabaseConfig, IsolationLevel, Record, WalManager};

#[derive(Parser)]
#[command(author, version, about = "MiniDB - storage and transaction engine tools")]
struct Cli {
    /// Directory holding the page files and the WAL
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Buffer pool size (number of pages)
    #[arg(short, long, default_value_t = 100)]
    pool_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run crash recovery and print what it did
    Recover,

    /// Flush all dirty pages and write a checkpoint
    Checkpoint,

    /// Print the records of the write-ahead log
    Wal {
        /// Only show records of this transaction
        #[arg(short, long)]
        txn: Option<TxnId>,
    },

    /// Run a short transactional session against the data directory
    Demo,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = DatabaseConfig {
        pool_size: cli.pool_size,
        ..DatabaseConfig::with_data_dir(&cli.data_dir)
    };

    match cli.command {
        Commands::Recover => {
            let db = Database::open(config).context("Failed to open database")?;
            let report = db.last_recovery();
            println!("Committed:   {:?}", report.committed);
            println!("Aborted:     {:?}", report.aborted);
            println!("Rolled back: {:?}", report.rolled_back);
            println!("Redo: {}  Undo: {}", report.redo_count, report.undo_count);
            db.close()?;
        }
        Commands::Checkpoint => {
            let db = Database::open(config).context("Failed to open database")?;
            let lsn = db.checkpoint()?;
            println!("Checkpoint written at LSN {}", lsn);
        }
        Commands::Wal { txn } => {
            let wal = WalManager::open(config.wal_path())
                .with_context(|| format!("Failed to open {}", config.wal_path().display()))?;
            let records = wal.read_all()?;
            let shown = records
                .iter()
                .filter(|record| txn.is_none_or(|id| record.txn_id() == id));
            for record in shown {
                println!("{}", record);
            }
        }
        Commands::Demo => run_demo(config)?,
    }

    Ok(())
}

fn run_demo(config: DatabaseConfig) -> Result<()> {
    let db = Database::open(config)?;

    let (_, page_id) = db.buffer_pool().new_page(0)?;
    db.buffer_pool().unpin_page(page_id, false)?;
    let tm = db.transaction_manager();

    let committed = db.begin(IsolationLevel::ReadCommitted)?;
    tm.write(committed, page_id, 0, b"committed")?;
    db.commit(committed)?;
    info!("txn {} committed a write to {}", committed, page_id);

    let aborted = db.begin(IsolationLevel::ReadCommitted)?;
    tm.write(aborted, page_id, 0, b"discarded")?;
    db.abort(aborted)?;

    let reader = db.begin(IsolationLevel::ReadCommitted)?;
    let bytes = tm.read(reader, page_id, 0, 9)?;
    db.commit(reader)?;
    println!("{} holds {:?}", page_id, String::from_utf8_lossy(&bytes));

    let users = db.create_table("users", true)?;
    {
        let mut users = users.write();
        for (id, name) in [(10, "Alice"), (20, "Bob"), (30, "Carol")] {
            let mut record = Record::new();
            record.add_int(id).add_string(name);
            users.insert_record(&record)?;
        }
    }

    let users = users.read();
    for record in users.range_scan_by_primary_key(10, 20)? {
        println!(
            "{} {}",
            record.field_as_int(0).unwrap_or_default(),
            record.field_as_string(1).unwrap_or_default()
        );
    }
    drop(users);

    db.close()?;
    Ok(())
}
