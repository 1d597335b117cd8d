use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use secrets_core::{MemorySecretStore, SecretsConfig, SecretsService, UnsealShare};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forge-secrets", version, about = "Forge secrets CLI")]
struct Cli {
    /// TOML or JSON file layered between defaults and FORGE_SECRETS_* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision a fresh master key in a plain key file.
    Keygen {
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Replace an existing key file.
        #[arg(long)]
        force: bool,
    },
    /// Encrypt a value with the configured master key.
    Encrypt { value: String },
    /// Decrypt a value produced by `encrypt`.
    Decrypt { value: String },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = SecretsConfig::load(cli.config.as_deref()).context("failed to load config")?;
    match cli.command {
        Command::Keygen { key_file, force } => handle_keygen(config, key_file, force),
        Command::Encrypt { value } => {
            let service = start(&config)?;
            println!("{}", service.encrypt_string(&value)?);
            Ok(())
        }
        Command::Decrypt { value } => {
            let service = start(&config)?;
            println!("{}", service.decrypt_string(&value)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_keygen(base: SecretsConfig, key_file: Option<PathBuf>, force: bool) -> Result<()> {
    let path = key_file.unwrap_or(base.key_file);
    if path.exists() && !force {
        bail!(
            "{} already exists (pass --force to replace it)",
            path.display()
        );
    }

    // The live key file is only replaced once the new key is fully written.
    let staging = staging_path(&path);
    clear_staging(&staging)?;
    let shares = match provision(&staging) {
        Ok(shares) => shares,
        Err(err) => {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
    };
    fs::rename(&staging, &path)
        .with_context(|| format!("failed to move new key into {}", path.display()))?;

    for share in shares {
        println!("{}", share.to_base64());
    }
    info!(path = %path.display(), "master key written");
    Ok(())
}

fn provision(staging: &Path) -> Result<Vec<UnsealShare>> {
    let config = SecretsConfig {
        master_key_provider: "plain".into(),
        key_file: staging.to_path_buf(),
        generate_if_missing: true,
    };
    let service = start(&config)?;
    service
        .generate_master_key()
        .context("failed to generate master key")
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("master.key"));
    name.push(".new");
    path.with_file_name(name)
}

fn clear_staging(staging: &Path) -> Result<()> {
    match fs::remove_file(staging) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to clear {}", staging.display()))
        }
    }
}

fn start(config: &SecretsConfig) -> Result<SecretsService> {
    let mut service = SecretsService::new(MemorySecretStore::new());
    service
        .init(config)
        .with_context(|| format!("failed to start `{}` provider", config.master_key_provider))?;
    Ok(service)
}
