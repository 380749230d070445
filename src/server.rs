//! framekv TCP server
//!
//! Accepts client connections and runs one concurrent session per client,
//! all sharing a single storage engine. Failure to bind is fatal at startup;
//! everything after that is contained to the session it happened on.

use crate::{
    error::{KvError, Result},
    session::Session,
    store::MemoryStore,
    wal::WriteAheadLog,
};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::TcpListener,
    sync::{broadcast, RwLock},
    time::sleep,
};

/// Active sessions by id, shared between the accept loop and the sessions
/// themselves so each can deregister on close
pub(crate) type SessionRegistry = Arc<RwLock<HashMap<u64, SocketAddr>>>;

/// framekv server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Durability is opt-in: no path means a purely in-memory store
    pub wal_path: Option<PathBuf>,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            wal_path: None,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// framekv TCP server
pub struct Server {
    config: ServerConfig,
    store: Arc<MemoryStore>,
    sessions: SessionRegistry,
    next_session_id: AtomicU64,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new server instance, restoring state from the WAL if one is
    /// configured
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let store = match &config.wal_path {
            Some(path) => {
                let wal = Arc::new(WriteAheadLog::new(path)?);
                let store = MemoryStore::with_wal(wal);
                let restored = store.restore_from_wal().await?;
                info!(
                    "restored {} key-value pairs from WAL {}",
                    restored,
                    path.display()
                );
                store
            }
            None => MemoryStore::new(),
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            store: Arc::new(store),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_session_id: AtomicU64::new(1),
            shutdown_tx,
        })
    }

    /// Accept connections until shutdown.
    ///
    /// A failed bind is returned to the caller (there is nothing to protect
    /// yet, aborting startup is correct); a failed accept is logged and the
    /// loop continues.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("framekv server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                            self.sessions.write().await.insert(id, peer);
                            debug!("session {} connected from {}", id, peer);

                            let session = Session::new(
                                id,
                                peer,
                                stream,
                                Arc::clone(&self.store),
                                Arc::clone(&self.sessions),
                                self.config.idle_timeout,
                            );
                            tokio::spawn(session.run(self.shutdown_tx.subscribe()));
                        }
                        Err(err) => {
                            warn!("failed to accept connection: {}", err);
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        drop(listener);
        self.drain_sessions().await;
        info!("server stopped");
        Ok(())
    }

    /// Wait (bounded) for in-flight sessions to finish their current request
    /// and deregister
    async fn drain_sessions(&self) {
        for _ in 0..50 {
            let remaining = self.sessions.read().await.len();
            if remaining == 0 {
                return;
            }
            debug!("waiting for {} session(s) to close", remaining);
            sleep(Duration::from_millis(100)).await;
        }
        let remaining = self.sessions.read().await.len();
        if remaining > 0 {
            error!("{} session(s) still open after drain window", remaining);
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .map_err(|_| KvError::Server("failed to send shutdown signal".to_string()))?;
        Ok(())
    }
}
