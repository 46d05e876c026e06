use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use infohub::config::Config;
use infohub::db::{Database, Transaction};
use infohub::models::{ContentTree, NodeId};
use infohub::persist::SchemaRegistry;
use infohub::{loader, render};

#[derive(Parser)]
#[command(name = "infohub")]
#[command(about = "Hierarchical content store with persistence boundaries")]
struct Cli {
    /// Store file to use instead of the configured one
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a directory as a new root folder
    Import {
        dir: PathBuf,

        /// Source identifier of the root folder (default: the directory path)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// List stored root folders
    Roots,
    /// Print the tree of a root folder
    Tree {
        source: String,

        /// Load documents and show their content
        #[arg(short, long)]
        content: bool,
    },
    /// Look up a filesystem node by path
    Find { source: String, path: String },
    /// Delete a filesystem node and everything stored below it
    Remove { source: String, path: String },
    /// Erase a root folder and all of its content
    Destroy { source: String },
}

/// Initialize tracing with output to stderr so stdout stays clean for command output
fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_store(cli_path: Option<PathBuf>, config: &Config) -> anyhow::Result<Database> {
    let path = match cli_path {
        Some(path) => path,
        None => config.database_path()?,
    };
    let db = Database::open(path)?;
    db.migrate()?;
    Ok(db)
}

fn open_tree(db: &Database, source: &str) -> anyhow::Result<ContentTree> {
    let Some(root) = db.root_folder_by_source(source)? else {
        bail!("No root folder for source '{}'", source);
    };
    let tree = ContentTree::open(root, Box::new(db.clone()), Arc::new(SchemaRegistry::default()))?;
    Ok(tree)
}

fn lookup(db: &Database, tree: &ContentTree, path: &str) -> anyhow::Result<NodeId> {
    db.file_system_object_by_path(tree.root(), path)?
        .with_context(|| format!("No node at '{}' under '{}'", path, tree.source()))
}

/// Runs `work` inside a store transaction, rolling back on failure.
fn in_transaction<T>(
    db: &Database,
    work: impl FnOnce(&Transaction) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let transaction = db.begin_transaction()?;
    match work(&transaction) {
        Ok(value) => {
            db.commit_transaction(&transaction)?;
            Ok(value)
        }
        Err(e) => {
            db.rollback_transaction(&transaction)?;
            Err(e)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load();
    init_tracing(&config.log_filter);

    let db = open_store(cli.db, &config)?;

    match cli.command {
        Commands::Import { dir, source } => {
            let source = match source {
                Some(source) => source,
                None => dir
                    .canonicalize()
                    .with_context(|| format!("Cannot import {}", dir.display()))?
                    .display()
                    .to_string(),
            };
            if db.root_folder_by_source(&source)?.is_some() {
                bail!("'{}' is already imported; destroy it first", source);
            }

            let (summary, stored) = in_transaction(&db, |_| {
                let mut tree = ContentTree::new(source.clone(), Box::new(db.clone()))?;
                let root = tree.root();
                let summary = loader::import_directory(&mut tree, root, &dir)?;
                let stored = loader::add_all(&mut tree)?;
                Ok((summary, stored))
            })?;
            println!(
                "Imported {} folders, {} documents, {} lines as '{}' ({} objects stored)",
                summary.folders, summary.documents, summary.lines, source, stored
            );
        }
        Commands::Roots => {
            for root in db.root_folders()? {
                println!("{}\t{}\t{}", root.id, root.stored_at.to_rfc3339(), root.source);
            }
        }
        Commands::Tree { source, content } => {
            let mut tree = open_tree(&db, &source)?;
            if content {
                let root = tree.root();
                for id in tree.subtree(root)? {
                    let unloaded = tree.get(id).is_some_and(|n| !n.is_loaded());
                    if unloaded && tree.is_boundary(id)? {
                        tree.activate(id)?;
                    }
                }
            }
            print!("{}", render::render_tree(&tree, tree.root(), content));
        }
        Commands::Find { source, path } => {
            let tree = open_tree(&db, &source)?;
            let id = lookup(&db, &tree, &path)?;
            let node = tree.node(id)?;
            println!("{}\t{}\t{}", id, node.kind().tag(), tree.path(id)?);
        }
        Commands::Remove { source, path } => {
            let mut tree = open_tree(&db, &source)?;
            let id = lookup(&db, &tree, &path)?;
            let removed = in_transaction(&db, |_| {
                let removed = tree.delete(id)?;
                let root = tree.root();
                tree.update(root)?;
                Ok(removed)
            })?;
            println!("Removed {} ({} objects erased)", path, removed);
        }
        Commands::Destroy { source } => {
            let tree = open_tree(&db, &source)?;
            let erased = in_transaction(&db, |_| Ok(tree.destroy()?))?;
            println!("Destroyed '{}' ({} objects erased)", source, erased);
        }
    }

    Ok(())
}
