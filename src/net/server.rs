use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::runtime::Builder;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::NetError;
use crate::net::connection::StreamConnectionFactory;
use crate::net::handler::{new_registry, ConnectionHandler, Registry};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

struct Running {
    shutdown: watch::Sender<bool>,
    thread: JoinHandle<()>,
}

/// Accepts inbound connections and drives them from one background thread.
pub struct Server {
    local_addr: SocketAddr,
    running: Mutex<Option<Running>>,
    registry: Registry,
}

impl Server {
    /// Binds `addr` and starts accepting. Each accepted socket gets a
    /// connection from `factory`; a `None` from the factory closes it.
    pub fn bind(addr: SocketAddr, factory: Arc<dyn StreamConnectionFactory>) -> Result<Self, NetError> {
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let registry = new_registry();
        let task_registry = registry.clone();
        let thread = std::thread::Builder::new()
            .name("btc-wire-server".into())
            .spawn(move || runtime.block_on(accept_loop(listener, factory, shutdown_rx, task_registry)))?;

        info!(%local_addr, "server listening");
        Ok(Self {
            local_addr,
            running: Mutex::new(Some(Running { shutdown, thread })),
            registry,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connected_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Stops accepting, closes every connection and joins the server thread.
    pub fn shutdown(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.shutdown.send(true);
        if running.thread.join().is_err() {
            warn!("server thread panicked");
        }
        info!(local_addr = %self.local_addr, "server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn accept_loop(
    listener: std::net::TcpListener,
    factory: Arc<dyn StreamConnectionFactory>,
    mut shutdown: watch::Receiver<bool>,
    registry: Registry,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "cannot register listener");
            return;
        }
    };

    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let Some(connection) = factory.new_connection(peer.ip(), peer.port()) else {
                        debug!(%peer, "factory rejected connection");
                        continue;
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "could not disable nagle");
                    }
                    let handler = ConnectionHandler::open(stream, peer, connection, registry.clone());
                    tasks.spawn(handler.run(shutdown.clone()));
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms = ACCEPT_BACKOFF.as_millis() as u64, "accept failed");
                    if !back_off(&mut shutdown).await {
                        break;
                    }
                }
            },
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    drop(listener);
    while tasks.join_next().await.is_some() {}
}

/// Pauses accepting after a failed `accept`. False if shutdown was signalled
/// meanwhile.
async fn back_off(shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown.changed() => false,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn runtime() -> tokio::runtime::Runtime {
        Builder::new_current_thread().enable_all().build().unwrap()
    }

    #[test]
    fn failed_accept_waits_before_retrying() {
        let (_tx, mut rx) = watch::channel(false);
        let started = Instant::now();
        assert!(runtime().block_on(back_off(&mut rx)));
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[test]
    fn shutdown_cuts_the_pause_short() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(!runtime().block_on(back_off(&mut rx)));
    }
}
