//! Chronicle CLI: campaign content over a local SQLite store.
//!
//! Usage:
//!   chronicle --group g1 --campaign c1 --user u1 locations add "Erebor"
//!   chronicle --group g1 --campaign c1 locations tree
//!   chronicle --group g1 --campaign c1 --user u1 notes add "Riddles" --content "..."

use chronicle::{
    ChronicleConfig, ChronicleEngine, DomainContext, Entity, Identity, Location, Note, OpenStore,
    Rumor, SqliteStore, TenantScope,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "chronicle",
    version,
    about = "Tenant-scoped campaign content"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Active group id
    #[arg(long, global = true)]
    group: Option<String>,
    /// Active campaign id
    #[arg(long, global = true)]
    campaign: Option<String>,
    /// Sign in as this user id (required for writes)
    #[arg(long, global = true)]
    user: Option<String>,
    /// Username shown in attribution (defaults to the user id)
    #[arg(long, global = true)]
    username: Option<String>,
    /// Active character name for this campaign
    #[arg(long, global = true)]
    character: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage locations
    Locations {
        #[command(subcommand)]
        action: LocationAction,
    },
    /// Manage notes
    Notes {
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Manage rumors
    Rumors {
        #[command(subcommand)]
        action: RumorAction,
    },
}

#[derive(Subcommand)]
enum LocationAction {
    /// List locations
    List,
    /// Add a location
    Add {
        name: String,
        /// Id of the enclosing location
        #[arg(long)]
        parent: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Free-form kind such as city or dungeon
        #[arg(long = "type")]
        location_type: Option<String>,
    },
    /// Delete a location and everything inside it
    Delete { id: String },
    /// Print the location hierarchy
    Tree,
}

#[derive(Subcommand)]
enum NoteAction {
    /// List notes
    List,
    /// Add a note
    Add {
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[derive(Subcommand)]
enum RumorAction {
    /// List rumors
    List,
    /// Add a rumor
    Add {
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        /// Who spread it
        #[arg(long)]
        source: Option<String>,
    },
}

/// Get the default database path (~/.local/share/chronicle/chronicle.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("chronicle").join("chronicle.db")
}

fn init_logging() {
    let filter = std::env::var("CHRONICLE_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn open_engine(cli: &Cli) -> Result<ChronicleEngine, String> {
    let config = ChronicleConfig::load_or_default(cli.config.as_deref());
    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let store = SqliteStore::open(&db_path)
        .map_err(|e| format!("Failed to open database {}: {}", db_path.display(), e))?;
    let (engine, auth) = ChronicleEngine::with_local_auth(Arc::new(store), config);

    if let Some(uid) = &cli.user {
        let username = cli.username.clone().unwrap_or_else(|| uid.clone());
        auth.sign_in(Identity::new(uid.clone(), username));
    }
    engine.scope().set_scope(TenantScope {
        active_group_id: cli.group.clone(),
        active_campaign_id: cli.campaign.clone(),
    });
    if let (Some(group), Some(campaign)) = (&cli.group, &cli.campaign) {
        engine
            .scope()
            .set_character_name(group.clone(), campaign.clone(), cli.character.clone());
    }
    Ok(engine)
}

/// Mount and load a context, reporting failures the way every command does
async fn mount<T: Entity>(engine: &ChronicleEngine) -> Result<Arc<DomainContext<T>>, String> {
    let context = engine.context::<T>();
    context.refresh().await.map_err(|e| e.to_string())?;
    Ok(context)
}

fn report(result: Result<(), String>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_locations(engine: &ChronicleEngine, action: LocationAction) -> Result<(), String> {
    let locations = mount::<Location>(engine).await?;
    match action {
        LocationAction::List => {
            let records = locations.records();
            if records.is_empty() {
                println!("No locations.");
                return Ok(());
            }
            println!("{:<24}  {:<24}  {:<24}", "ID", "NAME", "PARENT");
            println!("{}", "-".repeat(76));
            for location in records {
                println!(
                    "{:<24}  {:<24}  {:<24}",
                    location.id,
                    location.name,
                    location.parent_id.as_deref().unwrap_or("-")
                );
            }
        }
        LocationAction::Add {
            name,
            parent,
            description,
            location_type,
        } => {
            let mut draft = Location::new(name).with_description(description);
            draft.parent_id = parent;
            draft.location_type = location_type;
            let id = locations.create(draft).await.map_err(|e| e.to_string())?.into_value();
            println!("Created location '{}'", id);
        }
        LocationAction::Delete { id } => {
            let deleted = locations.delete(&id).await.map_err(|e| e.to_string())?.into_value();
            println!("Deleted {} location(s): {}", deleted.len(), deleted.join(", "));
        }
        LocationAction::Tree => {
            let records = locations.records();
            for root in records.iter().filter(|l| l.parent_id.is_none()) {
                print_subtree(&locations, root, 0);
            }
        }
    }
    Ok(())
}

fn print_subtree(locations: &DomainContext<Location>, location: &Location, depth: usize) {
    println!("{}{} ({})", "  ".repeat(depth), location.name, location.id);
    for child in locations.children(&location.id) {
        print_subtree(locations, &child, depth + 1);
    }
}

async fn cmd_notes(engine: &ChronicleEngine, action: NoteAction) -> Result<(), String> {
    let notes = mount::<Note>(engine).await?;
    match action {
        NoteAction::List => {
            for note in notes.records() {
                let by = &note.attribution.created_by_character_name;
                println!("{}  {}  (by {})", note.id, note.title, by);
            }
        }
        NoteAction::Add { title, content, tags } => {
            let mut draft = Note::new(title, content);
            draft.tags = tags;
            let id = notes.create(draft).await.map_err(|e| e.to_string())?.into_value();
            println!("Created note {}", id);
        }
    }
    Ok(())
}

async fn cmd_rumors(engine: &ChronicleEngine, action: RumorAction) -> Result<(), String> {
    let rumors = mount::<Rumor>(engine).await?;
    match action {
        RumorAction::List => {
            for rumor in rumors.records() {
                let mark = if rumor.verified { "verified" } else { "unverified" };
                println!("{}  {}  [{}]", rumor.id, rumor.title, mark);
            }
        }
        RumorAction::Add {
            title,
            content,
            source,
        } => {
            let mut draft = Rumor::new(title, content);
            draft.source = source;
            let id = rumors.create(draft).await.map_err(|e| e.to_string())?.into_value();
            println!("Created rumor {}", id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let engine = match open_engine(&cli) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Locations { action } => cmd_locations(&engine, action).await,
        Commands::Notes { action } => cmd_notes(&engine, action).await,
        Commands::Rumors { action } => cmd_rumors(&engine, action).await,
    };
    std::process::exit(report(result));
}
