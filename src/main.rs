use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use music_catalog_service::blob_store::FsBlobStore;
use music_catalog_service::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_BUCKET, DEFAULT_CATALOG_TABLE,
    DEFAULT_FETCH_TIMEOUT_SEC, DEFAULT_SOURCE_KEY,
};
use music_catalog_service::fetcher::HttpMediaFetcher;
use music_catalog_service::kv_store::SqliteKvStore;
use music_catalog_service::{CatalogService, Clients};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "catalog-cli")]
#[command(about = "Synchronize and query the music catalog")]
struct CliArgs {
    /// Path to the SQLite key-value database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Root directory of the blob store. Defaults to the database directory.
    #[clap(long, value_parser = parse_path)]
    pub blob_root: Option<PathBuf>,

    /// Bucket holding the source document and mirrored images.
    #[clap(long, default_value = DEFAULT_BUCKET)]
    pub bucket: String,

    /// Key of the source document inside the bucket.
    #[clap(long, default_value = DEFAULT_SOURCE_KEY)]
    pub source_key: String,

    /// Name of the catalog table.
    #[clap(long, default_value = DEFAULT_CATALOG_TABLE)]
    pub catalog_table: String,

    /// Timeout in seconds for image downloads.
    #[clap(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SEC)]
    pub fetch_timeout_sec: u64,

    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replaces the catalog with the contents of the source document.
    Sync,

    /// Looks up catalog items. Omitted predicates match everything.
    Find {
        #[clap(long)]
        title: Option<String>,
        #[clap(long)]
        artist: Option<String>,
        #[clap(long)]
        year: Option<i32>,
    },

    /// Registers a new user.
    Register {
        email: String,
        username: String,
        password: String,
    },

    /// Checks a user's credentials.
    Login { email: String, password: String },

    /// Subscribes a user to a catalog item.
    Subscribe {
        email: String,
        title: String,
        artist: String,
    },

    /// Removes a user's subscription.
    Unsubscribe {
        email: String,
        title: String,
        artist: String,
    },

    /// Lists a user's subscriptions.
    Subscriptions { email: String },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            blob_root: self.blob_root.clone(),
            bucket: self.bucket.clone(),
            source_key: self.source_key.clone(),
            catalog_table: self.catalog_table.clone(),
            fetch_timeout_sec: self.fetch_timeout_sec,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening key-value database at {:?}...", config.db_path);
    let clients = Clients {
        kv: Arc::new(SqliteKvStore::new(&config.db_path)?),
        blobs: Arc::new(FsBlobStore::new(&config.blob_root)),
        fetcher: Arc::new(HttpMediaFetcher::new(config.fetch_timeout_sec)?),
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling...");
            ctrl_c_cancel.cancel();
        }
    });

    let service = CatalogService::new(clients, config.importer_settings(), cancel);
    service
        .start()
        .await
        .context("Failed to provision user tables")?;

    let success = match cli_args.command {
        Command::Sync => {
            let outcome = service.sync_catalog().await;
            print_json(&outcome)?;
            outcome.succeeded()
        }
        Command::Find {
            title,
            artist,
            year,
        } => {
            let items = service.find_catalog(title.as_deref(), artist.as_deref(), year);
            print_json(&items)?;
            true
        }
        Command::Register {
            email,
            username,
            password,
        } => {
            let registration = service.register_user(&email, &username, &password);
            print_json(&registration)?;
            registration.is_registered()
        }
        Command::Login { email, password } => {
            let lookup = service.authenticate(&email, &password);
            print_json(&lookup)?;
            lookup.is_found()
        }
        Command::Subscribe {
            email,
            title,
            artist,
        } => {
            let change = service.register_subscription(&title, &artist, &email);
            print_json(&change)?;
            change.is_applied()
        }
        Command::Unsubscribe {
            email,
            title,
            artist,
        } => {
            let change = service.delete_subscription(&title, &artist, &email);
            print_json(&change)?;
            change.is_applied()
        }
        Command::Subscriptions { email } => {
            print_json(&service.list_subscriptions(&email))?;
            true
        }
    };

    Ok(exit_code(success))
}
