//! catsync CLI: resolve category paths and reconcile article assignments.
//!
//! Usage:
//!   catsync init [--db path]
//!   catsync assign <article> [--id N]... [--path P]... [--db path]
//!   catsync resolve <path> [--db path]
//!   catsync show <article> [--json] [--db path]

use catsync::{
    ArticleId, AssignmentSynchronizer, AttributeWriter, CategoryId, CategoryPath, CategoryReference,
    CategoryStore, OpenStore, SqliteStore, SyncConfig,
};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "catsync",
    version,
    about = "Category path resolution and article assignment reconciliation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the root category if it does not exist
    Init {
        /// Description of the root category
        #[arg(long, default_value = "Root")]
        name: String,
    },
    /// Reconcile an article's categories with the given references
    Assign {
        /// Article id
        article: i64,
        /// Category id to assign (repeatable)
        #[arg(long = "id")]
        ids: Vec<i64>,
        /// Category path to assign, e.g. "English->Cars->Mazda" (repeatable)
        #[arg(long = "path")]
        paths: Vec<String>,
    },
    /// Resolve a category path, creating missing segments, and print its id
    Resolve {
        /// Category path, e.g. "English->Cars->Mazda"
        path: String,
    },
    /// List the categories assigned to an article
    Show {
        /// Article id
        article: i64,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Get the default database path (~/.local/share/catsync/catsync.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("catsync").join("catsync.db")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<SyncConfig, String> {
    match path {
        Some(path) => SyncConfig::load(&path).map_err(|e| format!("Failed to load config '{}': {}", path.display(), e)),
        None => Ok(SyncConfig::default()),
    }
}

fn open_store(db: Option<PathBuf>, config: &SyncConfig) -> Result<Arc<SqliteStore>, String> {
    let db_path = db
        .or_else(|| config.database.clone())
        .unwrap_or_else(default_db_path);
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

fn synchronizer(store: &Arc<SqliteStore>, config: &SyncConfig) -> AssignmentSynchronizer {
    let attributes = Arc::new(AttributeWriter::new(store.clone()));
    AssignmentSynchronizer::new(store.clone(), attributes, config)
}

fn cmd_init(store: &SqliteStore, config: &SyncConfig, name: &str) -> i32 {
    match store.ensure_root(config.root_id, name) {
        Ok(true) => {
            println!("Created root category {}", config.root_id);
            0
        }
        Ok(false) => {
            println!("Root category {} already exists", config.root_id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_assign(store: &Arc<SqliteStore>, config: &SyncConfig, article: i64, ids: &[i64], paths: &[String]) -> i32 {
    let mut references: Vec<CategoryReference> = ids.iter().map(|id| CategoryReference::id(*id)).collect();
    for raw in paths {
        match CategoryPath::parse(raw, &config.path_separator) {
            Ok(path) => references.push(CategoryReference::Path(path)),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }

    match synchronizer(store, config).reconcile(ArticleId::new(article), &references) {
        Ok(outcome) if outcome.is_noop() => {
            println!("Article {}: assignments already up to date", article);
            0
        }
        Ok(outcome) => {
            println!(
                "Article {}: added {}, removed {}",
                article,
                outcome.added.len(),
                outcome.removed.len()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_resolve(store: &Arc<SqliteStore>, config: &SyncConfig, raw: &str) -> i32 {
    let path = match CategoryPath::parse(raw, &config.path_separator) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match synchronizer(store, config).resolver().resolve_path(&path) {
        Ok(id) => {
            println!("{}", id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_show(store: &SqliteStore, article: i64, json: bool) -> i32 {
    let ids = match store.find_assignments(ArticleId::new(article)) {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        match store.load_node(id) {
            Ok(Some(node)) => nodes.push(node),
            Ok(None) => eprintln!("Warning: assigned category {} no longer exists", id),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }

    if json {
        return match serde_json::to_string_pretty(&nodes) {
            Ok(out) => {
                println!("{}", out);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
    }

    if nodes.is_empty() {
        println!("Article {} has no categories.", article);
        return 0;
    }
    println!("{:>8}  {:>8}  {:<5}  {}", "ID", "PARENT", "LEAF", "DESCRIPTION");
    println!("{}", "-".repeat(48));
    for node in nodes {
        let parent = node.parent.map(|p: CategoryId| p.to_string()).unwrap_or_default();
        println!("{:>8}  {:>8}  {:<5}  {}", node.id, parent, node.leaf, node.description);
    }
    0
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let store = match open_store(cli.db, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Init { name } => cmd_init(&store, &config, &name),
        Commands::Assign { article, ids, paths } => cmd_assign(&store, &config, article, &ids, &paths),
        Commands::Resolve { path } => cmd_resolve(&store, &config, &path),
        Commands::Show { article, json } => cmd_show(&store, article, json),
    };
    std::process::exit(code);
}
