//! framekv server binary
//!
//! Binds the configured address, serves clients until Ctrl+C, then shuts
//! down gracefully.

use clap::Parser;
use framekv::{Server, ServerConfig};
use log::{error, info};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Debug, Parser)]
#[command(name = "framekv-server", version, about = "Networked key-value store")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Write-ahead log path; omit to run purely in-memory
    #[arg(long)]
    wal: Option<PathBuf>,

    /// Close connections idle for longer than this many seconds
    #[arg(long, default_value_t = 300)]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: args.addr,
        wal_path: args.wal,
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
    };

    let server = match Server::new(config).await {
        Ok(server) => Arc::new(server),
        Err(err) => {
            error!("failed to initialize server: {}", err);
            exit(1);
        }
    };

    // Graceful shutdown on SIGINT (Ctrl+C)
    let server_clone = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", err);
            return;
        }

        info!("received Ctrl+C, initiating graceful shutdown");
        if let Err(err) = server_clone.shutdown() {
            error!("failed to initiate shutdown: {}", err);
        }
    });

    if let Err(err) = server.run().await {
        // Reaching here without serving means the bind itself failed
        error!("server exited with error: {}", err);
        exit(1);
    }
}
