//! # Students Server
//!
//! Process entry point: parses the command line, installs JSON tracing,
//! connects the database gateway, serves until Ctrl-C and closes the
//! gateway on the way out.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use students_core::{build_server, AppConfig, DatabaseConfig, Environment};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Students API - CRUD over a single PostgreSQL table
#[derive(Parser, Debug)]
#[command(name = "students")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Environment; `test` selects the students-test database
    #[arg(long = "env", env = "APP_ENV", default_value = "development")]
    environment: String,

    /// Connection URL overriding the one derived from the environment
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

impl Cli {
    fn into_config(self) -> AppConfig {
        let mut config = AppConfig::for_environment(Environment::from_name(&self.environment));
        if let Some(url) = self.database_url {
            config.database = DatabaseConfig::with_url(url);
        }
        config.server.address = self.bind;
        config
    }
}

/// Initialize tracing for the binary
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("students=info,students_core=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(environment = %config.environment, "Starting students API");

    let db = students_core::Database::connect(&config.database)
        .await
        .context("database unavailable at startup")?;

    let served = match build_server(config.server, &db) {
        Ok(server) => server.serve().await.context("server failed"),
        Err(e) => Err(e).context("failed to build routes"),
    };

    db.close().await;
    served
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run(Cli::parse().into_config()).await {
        error!("{:#}", e);
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
