use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatehouse_server::store::NewUser;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "gatehoused",
    about = "Gatehoused: session-authenticated web server with file uploads",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: $GATEHOUSE_PORT or 8080)
        #[arg(long, env = "GATEHOUSE_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $GATEHOUSE_HOST or 0.0.0.0)
        #[arg(long, env = "GATEHOUSE_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Log level: error, warn, info, debug, verbose (default: $GATEHOUSE_LOG_LEVEL or warn)
        #[arg(long, env = "GATEHOUSE_LOG_LEVEL")]
        log_level: Option<String>,
    },
    /// Create a user account (offline). Requires direct access to the
    /// gatehouse.db file, so stop the server first.
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GATEHOUSE_NEW_USER_PASSWORD")]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Grant the admin flag
        #[arg(long)]
        admin: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let raw = match cli.command {
        Commands::Serve { ref log_level, .. } => log_level.clone(),
        Commands::AddUser { .. } => None,
    }
    .or_else(|| std::env::var("GATEHOUSE_LOG_LEVEL").ok())
    .unwrap_or_else(|| "warn".into());
    let effective_log_level = if raw.eq_ignore_ascii_case("verbose") {
        "debug".to_owned()
    } else {
        raw
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&effective_log_level))
        .init();

    match cli.command {
        Commands::Serve { port, host, .. } => cmd_serve(host, port).await,
        Commands::AddUser {
            email,
            password,
            first_name,
            last_name,
            admin,
        } => cmd_add_user(NewUser {
            email,
            password,
            first_name,
            last_name,
            is_admin: admin,
        }),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16) -> Result<()> {
    let cfg = gatehouse_server::ServerConfig {
        host,
        port,
        ..Default::default()
    };
    gatehouse_server::run(cfg).await
}

fn cmd_add_user(new_user: NewUser) -> Result<()> {
    let data_dir: Option<PathBuf> = std::env::var("GATEHOUSE_DATA_DIR").ok().map(Into::into);
    let store = gatehouse_server::open_store(data_dir.as_ref())?;

    let user = store
        .insert_user(new_user)
        .context("create user (is the server still running?)")?;

    tracing::info!(user_id = user.id, "audit: user.created");
    println!("created user {} <{}>", user.id, user.email);
    if user.is_admin {
        println!("admin flag set");
    }
    Ok(())
}
