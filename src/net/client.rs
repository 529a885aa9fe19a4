use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::runtime::Builder;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::net::connection::{Completion, Resolver, StreamConnection, WriteTarget};
use crate::net::handler::{new_registry, ConnectionHandler, Registry};

/// An outbound connect request handed to the reactor thread.
struct PendingConnect {
    addr: SocketAddr,
    connection: Box<dyn StreamConnection>,
    timeout: Duration,
    done: Resolver<SocketAddr>,
}

impl PendingConnect {
    fn fail(mut self, err: NetError) {
        self.connection.connection_closed();
        let _ = self.done.send(Err(err));
    }
}

struct Running {
    requests: mpsc::UnboundedSender<PendingConnect>,
    shutdown: watch::Sender<bool>,
    thread: JoinHandle<()>,
}

/// Opens and drives many outbound connections from one background thread.
///
/// ```no_run
/// # use std::time::Duration;
/// # use btc_wire::net::{ClientConnectionManager, StreamConnection};
/// # fn demo(connection: Box<dyn StreamConnection>) -> Result<(), btc_wire::NetError> {
/// let manager = ClientConnectionManager::new();
/// manager.start()?;
/// let addr = manager
///     .open_connection("127.0.0.1:8333".parse().unwrap(), connection, Duration::from_secs(5))
///     .blocking_wait()?;
/// println!("connected to {addr}");
/// manager.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct ClientConnectionManager {
    running: Mutex<Option<Running>>,
    registry: Registry,
}

impl Default for ClientConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConnectionManager {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(None),
            registry: new_registry(),
        }
    }

    /// Starts the reactor thread. Starting a running manager does nothing.
    pub fn start(&self) -> Result<(), NetError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (requests, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let registry = self.registry.clone();
        let thread = std::thread::Builder::new()
            .name("btc-wire-client".into())
            .spawn(move || runtime.block_on(run(rx, shutdown_rx, registry)))?;

        *running = Some(Running {
            requests,
            shutdown,
            thread,
        });
        info!("client connection manager started");
        Ok(())
    }

    /// Connects to `addr` and hands the socket to `connection`.
    ///
    /// On success the connection has its write target and has been opened
    /// before the completion resolves. On failure or timeout it receives
    /// `connection_closed` and the completion fails.
    pub fn open_connection(
        &self,
        addr: SocketAddr,
        connection: Box<dyn StreamConnection>,
        timeout: Duration,
    ) -> Completion<SocketAddr> {
        let (done, completion) = Completion::channel();
        let running = self.running.lock();
        let Some(running) = running.as_ref() else {
            let _ = done.send(Err(NetError::NotRunning));
            return completion;
        };

        let request = PendingConnect {
            addr,
            connection,
            timeout,
            done,
        };
        if let Err(mpsc::error::SendError(request)) = running.requests.send(request) {
            request.fail(NetError::NotRunning);
        }
        completion
    }

    pub fn connected_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Asks up to `n` live connections to close.
    pub fn close_connections(&self, n: usize) {
        let victims: Vec<_> = self.registry.lock().values().take(n).cloned().collect();
        for shared in victims {
            shared.close_connection();
        }
    }

    /// Closes every connection and stops the reactor thread.
    ///
    /// Blocks until every `connection_closed` callback has run. Must not be
    /// called from a connection callback.
    pub fn shutdown(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.shutdown.send(true);
        drop(running.requests);
        if running.thread.join().is_err() {
            warn!("client reactor thread panicked");
        }
        info!("client connection manager stopped");
    }
}

impl Drop for ClientConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    mut requests: mpsc::UnboundedReceiver<PendingConnect>,
    mut shutdown: watch::Receiver<bool>,
    registry: Registry,
) {
    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            request = requests.recv() => match request {
                Some(request) => {
                    tasks.spawn(connect(request, shutdown.clone(), registry.clone()));
                }
                None => break,
            },
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Every connection task watches the same signal and closes itself.
    while tasks.join_next().await.is_some() {}

    requests.close();
    while let Ok(request) = requests.try_recv() {
        request.fail(NetError::NotRunning);
    }
}

async fn connect(request: PendingConnect, mut shutdown: watch::Receiver<bool>, registry: Registry) {
    let addr = request.addr;
    debug!(%addr, "connecting");
    let attempt = tokio::time::timeout(request.timeout, TcpStream::connect(addr));
    let outcome = tokio::select! {
        outcome = attempt => outcome,
        _ = shutdown.changed() => {
            request.fail(NetError::NotRunning);
            return;
        }
    };

    let stream = match outcome {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "connect failed");
            request.fail(NetError::ConnectFailed(e));
            return;
        }
        Err(_) => {
            debug!(%addr, "connect timed out");
            request.fail(NetError::ConnectTimeout);
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%addr, error = %e, "could not disable nagle");
    }

    let PendingConnect {
        connection, done, ..
    } = request;
    let handler = ConnectionHandler::open(stream, addr, connection, registry);
    let _ = done.send(Ok(addr));
    handler.run(shutdown).await;
}
