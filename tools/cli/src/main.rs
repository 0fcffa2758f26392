//! cloudstore CLI - Command line interface for cloud store operations.
//!
//! This tool authorizes a store instance against its provider and runs
//! single file operations on it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cloudstore_common::StorePath;
use cloudstore_store::{Store, StoreRegistry};

#[derive(Parser)]
#[command(name = "cloudstore")]
#[command(about = "cloudstore - Google Drive and Dropbox file storage")]
#[command(version)]
struct Cli {
    /// Configuration file (default: <config dir>/cloudstore/config.json).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Provider: "gdrive" or "dropbox".
    provider: String,

    /// Instance name; each name keeps its own token file.
    name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize this instance in the browser.
    Auth,

    /// List a remote directory.
    Ls {
        /// Remote directory (default: root).
        #[arg(default_value = "/")]
        path: String,
    },

    /// Download a remote file.
    Get {
        /// Remote file.
        path: String,

        /// Local destination file.
        out: PathBuf,
    },

    /// Upload a local file.
    Put {
        /// Local source file.
        local: PathBuf,

        /// Remote destination path.
        path: String,

        /// Tag the upload as a chunk.
        #[arg(long)]
        chunk: bool,
    },

    /// Create a remote directory.
    Mkdir {
        /// Remote parent directory.
        parent: String,

        /// Name of the new directory.
        name: String,
    },

    /// Remove a remote file or directory.
    Rm {
        /// Remote path.
        path: String,
    },
}

/// Contents of the configuration file.
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    /// Directory holding token files (default: <data dir>/cloudstore).
    #[serde(default)]
    token_dir: Option<PathBuf>,

    /// Per-provider settings, passed on to the store configuration.
    #[serde(flatten)]
    providers: Map<String, Value>,
}

impl CliConfig {
    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Build the store configuration for `provider` and instance `name`.
    fn store_config(&self, provider: &str, name: &str) -> Result<Value> {
        let mut section = match self.providers.get(provider) {
            Some(Value::Object(section)) => section.clone(),
            Some(_) => anyhow::bail!("Config section '{}' must be an object", provider),
            None => anyhow::bail!("No '{}' section in config file", provider),
        };

        let token_dir = match &self.token_dir {
            Some(dir) => dir.clone(),
            None => default_token_dir()?,
        };

        section.insert("name".to_string(), Value::String(name.to_string()));
        section.insert(
            "token_dir".to_string(),
            Value::String(token_dir.to_string_lossy().into_owned()),
        );
        Ok(Value::Object(section))
    }
}

fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine the config directory")?;
    Ok(dir.join("cloudstore").join("config.json"))
}

fn default_token_dir() -> Result<PathBuf> {
    let dir = dirs::data_dir().context("Could not determine the data directory")?;
    Ok(dir.join("cloudstore"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = CliConfig::load(&config_path)?;

    let registry = StoreRegistry::default();
    if !registry.has_provider(&cli.provider) {
        anyhow::bail!(
            "Unknown provider '{}'. Use one of: {}",
            cli.provider,
            registry.providers().join(", ")
        );
    }
    let store = registry
        .resolve(&cli.provider, config.store_config(&cli.provider, &cli.name)?)
        .context("Failed to create store")?;

    match cli.command {
        Commands::Auth => cmd_auth(store).await,
        Commands::Ls { path } => cmd_ls(store, &path).await,
        Commands::Get { path, out } => cmd_get(store, &path, &out).await,
        Commands::Put { local, path, chunk } => cmd_put(store, &local, &path, chunk).await,
        Commands::Mkdir { parent, name } => cmd_mkdir(store, &parent, &name).await,
        Commands::Rm { path } => cmd_rm(store, &path).await,
    }
}

fn parse_path(path: &str) -> Result<StorePath> {
    StorePath::parse(path).with_context(|| format!("Invalid remote path: {}", path))
}

/// Fail early with a hint when the instance has no usable token.
async fn require_authorized(store: &dyn Store) -> Result<()> {
    if !store.authorized().await {
        anyhow::bail!(
            "'{}' instance is not authorized; run the auth command first",
            store.name()
        );
    }
    Ok(())
}

/// Run the interactive authorization flow.
async fn cmd_auth(store: Arc<dyn Store>) -> Result<()> {
    let url = store.get_authorization_url();

    println!("Open this URL in your browser and grant access:\n\n  {}\n", url);
    if let Err(e) = open::that(&url) {
        info!("Could not open a browser: {}", e);
    }

    print!("Paste the redirect URL or the authorization code: ");
    io::stdout().flush().context("Failed to write prompt")?;

    let mut response = String::new();
    io::stdin()
        .lock()
        .read_line(&mut response)
        .context("Failed to read authorization response")?;

    store
        .fetch_token(response.trim())
        .await
        .context("Authorization failed")?;

    println!("Authorized.");
    Ok(())
}

/// List directory contents.
async fn cmd_ls(store: Arc<dyn Store>, path: &str) -> Result<()> {
    require_authorized(store.as_ref()).await?;
    let dir = parse_path(path)?;

    let mut entries = store
        .get_list(&dir)
        .await
        .context("Failed to list directory")?;
    entries.sort_by(|a, b| a.name().cmp(b.name()));

    if entries.is_empty() {
        println!("Directory is empty.");
        return Ok(());
    }

    println!("Contents of {}:", dir);
    for entry in entries {
        if entry.is_directory() {
            println!("  [DIR]   {}/", entry.name());
        } else if entry.is_chunk() {
            println!("  [CHUNK] {} ({} bytes)", entry.name(), entry.file_size());
        } else {
            println!("  [FILE]  {} ({} bytes)", entry.name(), entry.file_size());
        }
    }

    Ok(())
}

/// Download a file.
async fn cmd_get(store: Arc<dyn Store>, path: &str, out: &Path) -> Result<()> {
    require_authorized(store.as_ref()).await?;
    info!("Downloading {} to {}", path, out.display());

    let content = store
        .download_file(&parse_path(path)?)
        .await
        .context("Failed to download file")?;

    tokio::fs::write(out, &content)
        .await
        .context("Failed to write output file")?;

    println!("Downloaded {} ({} bytes)", out.display(), content.len());
    Ok(())
}

/// Upload a file.
async fn cmd_put(store: Arc<dyn Store>, local: &Path, path: &str, chunk: bool) -> Result<()> {
    require_authorized(store.as_ref()).await?;
    info!("Uploading {} as {}", local.display(), path);

    let content = tokio::fs::read(local)
        .await
        .context("Failed to read source file")?;
    let size = content.len();

    store
        .upload_file(&parse_path(path)?, content, chunk)
        .await
        .context("Failed to upload file")?;

    println!("Uploaded {} ({} bytes)", path, size);
    Ok(())
}

/// Create a directory.
async fn cmd_mkdir(store: Arc<dyn Store>, parent: &str, name: &str) -> Result<()> {
    require_authorized(store.as_ref()).await?;

    store
        .make_dir(&parse_path(parent)?, name)
        .await
        .context("Failed to create directory")?;

    println!("Directory created: {}", name);
    Ok(())
}

/// Remove a file or directory.
async fn cmd_rm(store: Arc<dyn Store>, path: &str) -> Result<()> {
    require_authorized(store.as_ref()).await?;

    store
        .remove(&parse_path(path)?)
        .await
        .context("Failed to remove")?;

    println!("Removed: {}", path);
    Ok(())
}
