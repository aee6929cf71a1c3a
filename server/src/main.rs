//! Tallybook server
//!
//! Serves license activation and administrator account security over HTTP,
//! backed by a single SQLite database.
//!
//! Usage:
//!   tallybook-server --config tallybook.toml
//!   tallybook-server issue-license --company "Acme" --email ops@acme.test --days 365
//!   tallybook-server set-password --identity admin
//!   tallybook-server verify-audit

use std::{path::PathBuf, sync::Arc};
use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tallybook_license::{LicenseClaim, LicenseClass};
use tallybook_security::{CredentialHasher, CredentialStore};
use tallybook_server::{build_router, keys, AppState, ServerConfig};
use tallybook_storage::Database;
use tallybook_types::{Identity, SystemClock};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tallybook-server")]
#[command(about = "Tallybook licensing and account security server")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "tallybook.toml")]
    config: PathBuf,

    /// HTTP port, overriding the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path, overriding the config file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Signing key path, overriding the config file
    #[arg(short, long)]
    key_file: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Sign a commercial license token and print it
    IssueLicense {
        #[arg(long)]
        company: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "365")]
        days: u32,
        #[arg(long, default_value = "5")]
        max_users: u32,
    },
    /// Set an administrator password, reading it from TALLYBOOK_PASSWORD
    SetPassword {
        #[arg(long)]
        identity: String,
    },
    /// Walk the audit hash chain and report the first broken row
    VerifyAudit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut config = ServerConfig::load_from(&args.config);
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.server.database = database;
    }
    if let Some(key_file) = args.key_file {
        config.server.key_file = key_file;
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::IssueLicense {
            company,
            email,
            days,
            max_users,
        } => issue_license(&config, &company, &email, days, max_users),
        Command::SetPassword { identity } => set_password(&config, &identity),
        Command::VerifyAudit => verify_audit(&config),
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    info!("Tallybook server starting...");
    let codec = keys::load_or_generate_codec(&config.server.key_file)?;
    info!(key_id = %codec.key_id(), "License signing key loaded");

    let db = Database::open(&config.server.database).with_context(|| {
        format!("Failed to open database {}", config.server.database.display())
    })?;
    let (state, mut escalations) =
        AppState::with_database(&db, &config, codec, Arc::new(SystemClock))
            .context("Failed to initialise services")?;

    tokio::spawn(async move {
        while let Some(failure) = escalations.recv().await {
            error!(
                action = failure.event.action.as_str(),
                actor = %failure.event.actor,
                error = %failure.error,
                "Audit event could not be persisted"
            );
        }
    });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, database = %config.server.database.display(), "HTTP API listening");

    axum::serve(listener, build_router(state))
        .await
        .context("HTTP server failed")
}

fn issue_license(
    config: &ServerConfig,
    company: &str,
    email: &str,
    days: u32,
    max_users: u32,
) -> Result<()> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let codec = keys::load_or_generate_codec(&config.server.key_file)?;
    let now = Utc::now();
    let claim = LicenseClaim::new(
        company,
        email,
        now,
        now + Duration::days(i64::from(days)),
        max_users,
        LicenseClass::Commercial,
    );
    let token = codec.encode(&claim).context("Failed to sign license")?;
    info!(key_id = %codec.key_id(), company, days, "License issued");
    println!("{token}");
    Ok(())
}

fn set_password(config: &ServerConfig, identity: &str) -> Result<()> {
    let identity = Identity::parse(identity)?;
    let password = std::env::var("TALLYBOOK_PASSWORD")
        .context("TALLYBOOK_PASSWORD must hold the new password")?;
    config.password.validate(&password, &password)?;

    let db = Database::open(&config.server.database).with_context(|| {
        format!("Failed to open database {}", config.server.database.display())
    })?;
    let store = db.credential_store(CredentialHasher::new(config.security.kdf.clone()));
    store.set_password(&identity, &password)?;
    info!(identity = %identity, "Password set");
    Ok(())
}

fn verify_audit(config: &ServerConfig) -> Result<()> {
    let db = Database::open(&config.server.database).with_context(|| {
        format!("Failed to open database {}", config.server.database.display())
    })?;
    let report = db.audit_sink()?.verify_chain()?;
    if let Some(seq) = report.broken_at {
        bail!("Audit chain broken at row {seq} ({} rows checked)", report.entries);
    }
    println!("Audit chain intact ({} rows)", report.entries);
    Ok(())
}
