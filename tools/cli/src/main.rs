//! DriveGate command-line entry point.
//!
//! `serve` runs the proxy; the `seal-*` subcommands produce the sealed
//! blobs the remote stores hold (pool credentials and user records), so
//! provisioning never requires a running server.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use drivegate_accounts::{Credential, NS_ACCOUNT};
use drivegate_crypto::TokenSealer;
use drivegate_server::users::{user_blob_name, User, NS_USER};
use drivegate_server::{router, AppState, Config};

#[derive(Parser)]
#[command(
    name = "drivegate",
    about = "Credential-pooling Google Drive proxy",
    version
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server.
    Serve {
        /// Path to the JSON configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Seal a credential JSON file into a pool blob.
    SealAccount {
        /// Configuration file supplying the sealing secret.
        #[arg(short, long)]
        config: PathBuf,
        /// Plaintext credential JSON (authorized_user or service_account).
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the sealed blob.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Seal a user record into a directory blob.
    SealUser {
        /// Configuration file supplying the sealing secret.
        #[arg(short, long)]
        config: PathBuf,
        /// Plaintext user record JSON.
        #[arg(short, long)]
        input: PathBuf,
        /// Directory to write the blob into; the file name is derived from
        /// the secret and the user name.
        #[arg(short, long)]
        output_dir: PathBuf,
    },
}

fn load_config(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading configuration from {}", path.display()))?;
    Config::from_json(&raw).context("parsing configuration")
}

async fn serve(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let listen = config.listen.clone();

    let state = Arc::new(AppState::from_config(&config).context("building application state")?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("binding {}", listen))?;
    info!(addr = %listen, "drivegate listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn seal_account(config_path: &Path, input: &Path, output: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let sealer = TokenSealer::new(&config.secret);

    let raw = fs::read_to_string(input)
        .with_context(|| format!("reading credential from {}", input.display()))?;
    let credential: Credential =
        serde_json::from_str(&raw).context("parsing credential JSON")?;

    let plaintext = serde_json::to_vec(&credential).context("serializing credential")?;
    let blob = sealer
        .seal_raw(NS_ACCOUNT, &plaintext)
        .context("sealing credential")?;

    fs::write(output, blob).with_context(|| format!("writing blob to {}", output.display()))?;
    info!(output = %output.display(), "credential blob sealed");
    Ok(())
}

fn seal_user(config_path: &Path, input: &Path, output_dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let sealer = TokenSealer::new(&config.secret);

    let raw = fs::read_to_string(input)
        .with_context(|| format!("reading user record from {}", input.display()))?;
    let user: User = serde_json::from_str(&raw).context("parsing user record JSON")?;

    let plaintext = serde_json::to_vec(&user).context("serializing user record")?;
    let blob = sealer
        .seal_raw(NS_USER, &plaintext)
        .context("sealing user record")?;

    let name = user_blob_name(&config.secret, &user.name);
    let path = output_dir.join(&name);
    fs::write(&path, blob).with_context(|| format!("writing blob to {}", path.display()))?;

    info!(user = %user.name, blob = %name, "user blob sealed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting tracing subscriber")?;

    match &cli.command {
        Commands::Serve { config } => serve(config).await,
        Commands::SealAccount {
            config,
            input,
            output,
        } => seal_account(config, input, output),
        Commands::SealUser {
            config,
            input,
            output_dir,
        } => seal_user(config, input, output_dir),
    }
}
