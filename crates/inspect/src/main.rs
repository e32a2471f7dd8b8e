//! AVM value inspector
//!
//! Loads values from a directory store (one file per node, named by the
//! node hash in hex) and prints them as an indented tree.
//!
//! Set `RUST_LOG=avm_storage=trace` to watch placeholders being created and
//! filled; `AVM_RECONSTRUCT_MAX_NODES` caps the session size unless
//! `--max-nodes` is given.

use avm_storage::{DirStore, ReconstructConfig, reconstruct};
use avm_values::{U256, Value, segment_id_to_db_hash};
use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;

mod render;

use render::{ChainStatus, check_chain, render};

#[derive(ClapParser)]
#[command(name = "avm-inspect")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect hash-linked AVM values stored one node per file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct a value and print it as a tree
    Show {
        /// Directory holding one file per node
        #[arg(short, long)]
        store: PathBuf,

        /// Root hash (64 hex digits, optional 0x prefix)
        root: U256,

        /// Most nodes to load (overrides AVM_RECONSTRUCT_MAX_NODES)
        #[arg(long)]
        max_nodes: Option<usize>,
    },

    /// Load a code segment by id and verify its hash chain
    Segment {
        /// Directory holding one file per node
        #[arg(short, long)]
        store: PathBuf,

        /// Segment id
        id: u64,

        /// Most nodes to load (overrides AVM_RECONSTRUCT_MAX_NODES)
        #[arg(long)]
        max_nodes: Option<usize>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show {
            store,
            root,
            max_nodes,
        } => {
            let value = load(&store, root, max_nodes);
            print!("{}", render(&value));
            match value.hash() {
                Ok(hash) => println!("content hash {}", hash),
                Err(e) => println!("content hash unavailable: {}", e),
            }
        }
        Commands::Segment {
            store,
            id,
            max_nodes,
        } => {
            let value = load(&store, segment_id_to_db_hash(id), max_nodes);
            let Value::CodeSegment(segment) = &value else {
                eprintln!("Error: node for segment {} holds a {}", id, value.kind_name());
                process::exit(1);
            };
            print!("{}", render(&value));
            match check_chain(&segment.load()) {
                ChainStatus::Intact => println!("hash chain intact"),
                ChainStatus::BrokenAt(pc) => {
                    println!("hash chain broken at pc {}", pc);
                    process::exit(2);
                }
                ChainStatus::Unresolved(pc) => {
                    println!("hash chain unverifiable: pc {} has an unloaded immediate", pc);
                    process::exit(2);
                }
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "avm-inspect", &mut io::stdout());
        }
    }
}

fn load(store: &Path, root: U256, max_nodes: Option<usize>) -> Value {
    let store = match DirStore::open(store) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening store: {}", e);
            process::exit(1);
        }
    };
    let config = match max_nodes {
        Some(n) => ReconstructConfig::with_max_nodes(n),
        None => ReconstructConfig::from_env(),
    };
    info!(root = %root, store = %store.root().display(), "loading");

    match reconstruct(&store, root, &config) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
