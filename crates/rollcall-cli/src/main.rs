use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rollcall_store::{Db, SqliteFaceStore, SqliteUserStore};

/// Demo roster seeded into the user directory.
const SEED_NAMES: [&str; 8] = [
    "Boni", "Farrel", "Juan", "Diqi", "Juan", "Wildan", "Filah", "Fikri",
];
const SEED_PASSWORD: &str = "password123";

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance backend CLI")]
struct Cli {
    /// Path to the SQLite database (defaults to ROLLCALL_DB_PATH).
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the demo user roster (idempotent by email)
    SeedUsers,
    /// List registered faces for a user
    ListFaces {
        /// User id to inspect
        user_id: i64,
    },
    /// Probe a running daemon's health endpoints
    Status {
        /// Daemon base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::SeedUsers => {
            let db = Db::open(&db_path(cli.db)).await?;
            let users = SqliteUserStore::new(&db);
            for (i, name) in SEED_NAMES.iter().enumerate() {
                // Duplicate names get unique emails (juan3@, juan5@, ...).
                let email = format!("{}{}@example.com", name.to_lowercase(), i + 1);
                let user = users.upsert_by_email(name, &email, SEED_PASSWORD).await?;
                println!("seeded user {} <{}> (id {})", user.name, user.email, user.id);
            }
        }
        Commands::ListFaces { user_id } => {
            let db = Db::open(&db_path(cli.db)).await?;
            let faces = SqliteFaceStore::new(&db).list_for_user(user_id).await?;
            if faces.is_empty() {
                println!("no faces registered for user {user_id}");
            }
            for face in faces {
                println!(
                    "face {} primary={} model={} dim={} path={}",
                    face.id,
                    face.is_primary,
                    face.embedding_model,
                    face.embedding_dim
                        .map_or_else(|| "?".to_string(), |d| d.to_string()),
                    face.image_path,
                );
            }
        }
        Commands::Status { url } => {
            let base = url.trim_end_matches('/');
            let healthz: serde_json::Value = reqwest::get(format!("{base}/healthz"))
                .await?
                .json()
                .await?;
            println!("daemon: {healthz}");
            let db: serde_json::Value = reqwest::get(format!("{base}/health/db"))
                .await?
                .json()
                .await?;
            println!("database: {db}");
        }
    }

    Ok(())
}

fn db_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var("ROLLCALL_DB_PATH").map(PathBuf::from).ok())
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share/rollcall/rollcall.db")
        })
}
