//! TideKV CLI
//!
//! Command-line access to a local TideKV database and its full-text indexes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tidekv::fulltext::{parse_terms, verbatim_term};
use tidekv::{Config, Cursor, Db, Direction, FullTextIndex, Query, ReadView};
use tracing_subscriber::{fmt, EnvFilter};

/// TideKV CLI
#[derive(Parser, Debug)]
#[command(name = "tidekv-cli")]
#[command(about = "CLI for the TideKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./tidekv_data")]
    data_dir: PathBuf,

    /// Full-text index used by index/unindex/search/suggest
    #[arg(short, long, default_value = "default")]
    index: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List keys in order
    Scan {
        /// Only keys starting with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Iterate in descending order
        #[arg(short, long)]
        reverse: bool,

        /// Maximum number of entries
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Replace the indexed text of a document
    Index {
        doc_id: String,
        text: String,

        /// Sort key of the document (defaults to its id)
        #[arg(short, long)]
        sort_key: Option<String>,

        /// Index the text as one exact term
        #[arg(long)]
        verbatim: bool,
    },

    /// Remove a document from the index
    Unindex { doc_id: String },

    /// Search the index; the last word matches as a prefix
    Search {
        query: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Suggest terms starting with a prefix
    Suggest {
        prefix: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show storage statistics
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    tracing::debug!("TideKV CLI v{}", tidekv::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> tidekv::Result<()> {
    let db = Db::open(Config::builder().data_dir(&args.data_dir).build())?;

    match args.command {
        Commands::Get { key } => match db.get(key.as_bytes()) {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            db.put(key.as_bytes(), value.as_bytes());
            println!("OK");
        }
        Commands::Del { key } => {
            let existed = db.exists(key.as_bytes());
            db.delete(key.as_bytes());
            println!("{}", if existed { 1 } else { 0 });
        }
        Commands::Scan {
            prefix,
            reverse,
            limit,
        } => scan(&db, prefix.as_bytes(), reverse, limit),
        Commands::Index {
            doc_id,
            text,
            sort_key,
            verbatim,
        } => {
            let index = FullTextIndex::open(&db, &args.index)?;
            let terms = if verbatim {
                vec![verbatim_term(&text)]
            } else {
                parse_terms(&text)
            };
            let sort_key = sort_key.unwrap_or_else(|| doc_id.clone());
            let mut txn = db.new_transaction();
            index.update_index(&mut txn, &doc_id, &sort_key, &terms);
            txn.commit();
            index.wait_for_stats();
            println!("indexed {} terms", terms.len());
        }
        Commands::Unindex { doc_id } => {
            let index = FullTextIndex::open(&db, &args.index)?;
            let mut txn = db.new_transaction();
            index.remove_terms(&mut txn, &doc_id);
            txn.commit();
            index.wait_for_stats();
            println!("OK");
        }
        Commands::Search { query, limit } => {
            let index = FullTextIndex::open(&db, &args.index)?;
            if let Some(query) = Query::parse(&query) {
                tracing::debug!(%query, "searching");
                let snapshot = db.new_snapshot();
                let mut results = index.search(&snapshot, &query);
                let mut shown = 0;
                while results.valid() && shown < limit {
                    let terms: Vec<String> = results.raw_terms().into_iter().collect();
                    println!("{}\t{}\t[{}]", results.doc_id(), results.sort_key(), terms.join(", "));
                    results.next();
                    shown += 1;
                }
            }
        }
        Commands::Suggest { prefix, limit } => {
            let index = FullTextIndex::open(&db, &args.index)?;
            index.wait_for_stats();
            for suggestion in index.suggestions(&db.new_snapshot(), &prefix.to_lowercase(), limit) {
                println!("{}\t{}", suggestion.term, suggestion.count);
            }
        }
        Commands::Stats => {
            let engine = db.engine();
            println!("data_dir:        {}", engine.data_dir().display());
            println!("memtable_bytes:  {}", engine.memtable_size());
            println!("memtable_keys:   {}", engine.memtable_entry_count());
            println!("sstables:        {}", engine.sstable_count());
            println!("last_sequence:   {}", engine.last_sequence());
        }
    }

    db.close();
    Ok(())
}

fn scan(db: &Db, prefix: &[u8], reverse: bool, limit: usize) {
    let entries = if reverse {
        let mut cursor = db.iter(Direction::Reverse);
        if let Some(upper) = prefix_successor(prefix) {
            cursor.seek(&upper);
        }
        let mut out = Vec::new();
        while cursor.valid() && out.len() < limit {
            if cursor.key().starts_with(prefix) {
                out.push((cursor.key().to_vec(), cursor.value().to_vec()));
            } else if cursor.key() < prefix {
                break;
            }
            cursor.next();
        }
        out
    } else {
        let mut entries = db.scan_prefix(prefix);
        entries.truncate(limit);
        entries
    };

    for (key, value) in entries {
        println!(
            "{}\t{}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
        );
    }
}

/// Smallest key greater than every key starting with `prefix`
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < 0xff {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}
