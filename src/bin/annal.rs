//! Annal CLI — document provenance archive.
//!
//! Usage:
//!   annal ingest --events <file.json> [--objects dir] [--extractor url] [--db path] [--cas dir]
//!   annal reindex [--db path] [--cas dir] [--index url]
//!   annal show <cid> [--cas dir]
//!   annal org <subcommand> [--db path]

use annal::{
    Archive, ArchiveConfig, ContentId, FsCas, FsObjectFetcher, HttpExtractor, HttpSearchIndex,
    MemoryIndex, SearchIndex, SqliteStore, UploadEvent,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "annal",
    version,
    about = "Content-addressed document provenance archive"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a batch of upload events from a JSON file
    Ingest {
        /// Path to a JSON array of upload events
        #[arg(long)]
        events: PathBuf,
        /// Root directory of the local object store
        #[arg(long, default_value = ".")]
        objects: PathBuf,
        /// Base URL of the extraction service
        #[arg(long, default_value = "http://localhost:9998")]
        extractor: String,
        /// Base URL of the search index (omit to skip durable indexing)
        #[arg(long)]
        index: Option<String>,
        /// Path to the SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Root directory of the content store
        #[arg(long)]
        cas: Option<PathBuf>,
    },
    /// Rebuild search index entries from stored assertions
    Reindex {
        /// Base URL of the search index
        #[arg(long)]
        index: String,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        cas: Option<PathBuf>,
    },
    /// Print a stored assertion payload
    Show {
        /// Content id of the assertion (b3:<hex>)
        cid: String,
        #[arg(long)]
        cas: Option<PathBuf>,
    },
    /// Manage organizations
    Org {
        #[command(subcommand)]
        action: OrgAction,
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum OrgAction {
    /// Register a new organization
    Add { slug: String, name: String },
    /// List registered organizations
    List,
}

/// Default data directory (~/.local/share/annal)
fn data_dir() -> PathBuf {
    let base = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = base.join("annal");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn open_store(db: Option<PathBuf>) -> Result<Arc<SqliteStore>, String> {
    let path = db.unwrap_or_else(|| data_dir().join("annal.db"));
    SqliteStore::open(&path)
        .map(Arc::new)
        .map_err(|e| format!("Failed to open database: {}", e))
}

fn open_cas(cas: Option<PathBuf>) -> Result<Arc<FsCas>, String> {
    let root = cas.unwrap_or_else(|| data_dir().join("cas"));
    FsCas::open(&root)
        .map(Arc::new)
        .map_err(|e| format!("Failed to open content store: {}", e))
}

async fn cmd_ingest(
    events: PathBuf,
    objects: PathBuf,
    extractor: String,
    index: Option<String>,
    db: Option<PathBuf>,
    cas: Option<PathBuf>,
) -> i32 {
    let raw = match std::fs::read_to_string(&events) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", events.display(), e);
            return 1;
        }
    };
    let events: Vec<UploadEvent> = match serde_json::from_str(&raw) {
        Ok(events) => events,
        Err(e) => {
            eprintln!("Error: events file is not a JSON array of records: {}", e);
            return 1;
        }
    };

    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let cas = match open_cas(cas) {
        Ok(cas) => cas,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let extractor = match HttpExtractor::new(&extractor) {
        Ok(extractor) => Arc::new(extractor),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let index: Arc<dyn SearchIndex> = match index {
        Some(url) => match HttpSearchIndex::new(&url) {
            Ok(index) => Arc::new(index),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        },
        None => Arc::new(MemoryIndex::new()),
    };

    let archive = Archive::new(
        Arc::new(FsObjectFetcher::new(objects)),
        extractor,
        cas,
        store,
        index,
        ArchiveConfig::default(),
    );

    let outcome = archive.process_batch(events).await;
    for record in &outcome.results {
        match &record.result {
            Ok(receipt) => println!(
                "{}  {}  {:?}{}",
                record.key,
                receipt.assertion_cid,
                receipt.disposition,
                receipt
                    .index_error
                    .as_deref()
                    .map(|e| format!("  (index: {})", e))
                    .unwrap_or_default()
            ),
            Err(e) => println!("{}  FAILED  {}", record.key, e),
        }
    }
    if outcome.all_succeeded() {
        0
    } else {
        1
    }
}

async fn cmd_reindex(index: String, db: Option<PathBuf>, cas: Option<PathBuf>) -> i32 {
    let (store, cas) = match (open_store(db), open_cas(cas)) {
        (Ok(store), Ok(cas)) => (store, cas),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let index = match HttpSearchIndex::new(&index) {
        Ok(index) => Arc::new(index),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    // the fetcher and extractor are never reached by reindex; point them
    // at inert local defaults
    let extractor = match HttpExtractor::new("http://localhost:9998") {
        Ok(extractor) => Arc::new(extractor),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let archive = Archive::new(
        Arc::new(FsObjectFetcher::new(".")),
        extractor,
        cas,
        store,
        index,
        ArchiveConfig::default(),
    );

    match archive.reindex().await {
        Ok(report) => {
            println!(
                "scanned {}  indexed {}  skipped {}",
                report.scanned, report.indexed, report.skipped
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_show(cid: String, cas: Option<PathBuf>) -> i32 {
    let cid = match ContentId::parse(&cid) {
        Ok(cid) => cid,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let cas = match open_cas(cas) {
        Ok(cas) => cas,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    use annal::ContentStore;
    match cas.get(&cid).await {
        Ok(Some(bytes)) => {
            print!("{}", String::from_utf8_lossy(&bytes));
            0
        }
        Ok(None) => {
            eprintln!("Error: {} not found in content store", cid);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_org(action: OrgAction, db: Option<PathBuf>) -> i32 {
    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    use annal::RecordStore;
    match action {
        OrgAction::Add { slug, name } => {
            let org = annal::Organization {
                id: uuid::Uuid::new_v4().to_string(),
                slug,
                name,
                created_at: chrono::Utc::now(),
            };
            match store.create_organization(&org).await {
                Ok(()) => {
                    println!("Registered '{}' ({})", org.slug, org.id);
                    0
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
        OrgAction::List => match store.list_organizations().await {
            Ok(orgs) => {
                if orgs.is_empty() {
                    println!("No organizations registered.");
                    return 0;
                }
                println!("{:<36}  {:<20}  NAME", "ID", "SLUG");
                println!("{}", "-".repeat(72));
                for org in orgs {
                    println!("{:<36}  {:<20}  {}", org.id, org.slug, org.name);
                }
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Ingest {
            events,
            objects,
            extractor,
            index,
            db,
            cas,
        } => cmd_ingest(events, objects, extractor, index, db, cas).await,
        Commands::Reindex { index, db, cas } => cmd_reindex(index, db, cas).await,
        Commands::Show { cid, cas } => cmd_show(cid, cas).await,
        Commands::Org { action, db } => cmd_org(action, db).await,
    };
    std::process::exit(code);
}
