//! gitkv CLI - Command line interface for the git-backed key-value store.
//!
//! Every invocation connects to the configured repository, runs one
//! operation and prints the resulting record.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gitkv_common::Record;
use gitkv_storage::create_default_registry;
use gitkv_store::{KeyValueStore, StoreConfig};

#[derive(Parser)]
#[command(name = "gitkv")]
#[command(about = "gitkv - Key-value store on top of a git repository")]
#[command(version)]
struct Cli {
    /// Repository clone URL, e.g. git@github.com:owner/repo.git.
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Access token.
    #[arg(short, long, env = "GITKV_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Database directory inside the repository.
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Branch to read from and commit to.
    #[arg(short, long, global = true)]
    branch: Option<String>,

    /// Passphrase encrypting keys and values.
    #[arg(long, global = true, conflicts_with = "ask_secret")]
    secret: Option<String>,

    /// Prompt for the passphrase.
    #[arg(long, global = true)]
    ask_secret: bool,

    /// Disable the read cache.
    #[arg(long, global = true)]
    no_cache: bool,

    /// Print only the value.
    #[arg(short, long, global = true)]
    short_output: bool,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: <config dir>/gitkv/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a key.
    Get {
        key: String,
    },

    /// Create or overwrite a key.
    Set {
        key: String,
        value: String,
    },

    /// Append to the value of a key.
    Append {
        key: String,
        value: String,
    },

    /// Delete a key.
    Delete {
        key: String,
    },

    /// List the keys of the database.
    Keys,

    /// Show the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for results
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(cli.config.as_ref())?;
    apply_overrides(&mut config, &cli);
    if cli.ask_secret {
        config.secret = Some(prompt_secret("Secret: ")?);
    }
    config.validate().context("Invalid configuration")?;

    if let Commands::Config = cli.command {
        println!("{}", config.redacted().to_json()?);
        return Ok(());
    }

    let registry = create_default_registry();
    let store = KeyValueStore::connect(&registry, &config)
        .await
        .context("Failed to connect")?;

    let started = Instant::now();
    match &cli.command {
        Commands::Get { key } => {
            let record = store.get(key).await?;
            print_found(key, &record, cli.short_output, started)
        }
        Commands::Set { key, value } => {
            let record = store.set(key, value).await?;
            print_record(&record, cli.short_output, started)
        }
        Commands::Append { key, value } => {
            let record = store.append(key, value).await?;
            print_record(&record, cli.short_output, started)
        }
        Commands::Delete { key } => {
            let record = store.delete(key).await?;
            print_found(key, &record, cli.short_output, started)
        }
        Commands::Keys => {
            let records = store.keys().await?;
            print_keys(&records, cli.short_output, started)
        }
        Commands::Config => Ok(()),
    }
}

/// Load the config file named on the command line, or the default one.
fn load_config(path: Option<&PathBuf>) -> Result<StoreConfig> {
    let path = match path {
        Some(path) => path.clone(),
        None => match StoreConfig::default_path() {
            Some(path) => path,
            None => return Ok(StoreConfig::default()),
        },
    };

    debug!(path = %path.display(), "Loading configuration");
    StoreConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Command line flags take precedence over the config file.
fn apply_overrides(config: &mut StoreConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.host = Some(host.clone());
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(branch) = &cli.branch {
        config.branch = branch.clone();
    }
    if let Some(secret) = &cli.secret {
        config.secret = Some(secret.clone());
    }
    if cli.no_cache {
        config.cache = false;
    }
}

/// Prompt for the secret without echo.
fn prompt_secret(prompt: &str) -> Result<String> {
    let secret = rpassword::prompt_password(prompt).context("Failed to read secret")?;
    if secret.is_empty() {
        bail!("Secret cannot be empty");
    }
    Ok(secret)
}

fn print_found(key: &str, record: &Record, short: bool, started: Instant) -> Result<()> {
    if record.is_not_found() {
        bail!("Key \"{}\" not found", key);
    }
    print_record(record, short, started)
}

fn print_record(record: &Record, short: bool, started: Instant) -> Result<()> {
    if short {
        println!("{}", record.content);
    } else {
        println!("{}", serde_json::to_string_pretty(record)?);
        println!("Time: {}ms", started.elapsed().as_millis());
    }
    Ok(())
}

fn print_keys(records: &[Record], short: bool, started: Instant) -> Result<()> {
    if short {
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        println!("{}", serde_json::to_string(&names)?);
    } else {
        println!("{}", serde_json::to_string_pretty(records)?);
        println!("Time: {}ms", started.elapsed().as_millis());
    }
    Ok(())
}
