use std::error::Error;
use std::net::ToSocketAddrs;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::Rng;
use tracing_subscriber::EnvFilter;

use btc_wire::config;
use btc_wire::net::{ClientConnectionManager, PeerConnection, PeerHandle};
use btc_wire::wire::{build_version_payload, Message, Ping, SendAddrV2, Services, UnknownMessage};

#[derive(Parser)]
#[command(name = "btc-cli", about = "Talk to a single Bitcoin node")]
struct Cli {
    /// host:port of the node.
    #[arg(long)]
    node: String,

    /// Overrides the configured network (main, test, regtest, signet).
    #[arg(long)]
    network: Option<String>,

    /// Connect timeout in seconds; defaults to the configured value.
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Ping,
    GetAddr,
    /// Print every message the node sends until it disconnects.
    Listen,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load();
    if let Some(network) = cli.network {
        cfg.network = network;
    }
    let timeout = cli.timeout.map(Duration::from_secs).unwrap_or(cfg.connect_timeout());
    let serializer = cfg.serializer();

    let addr = cli
        .node
        .to_socket_addrs()?
        .next()
        .ok_or("could not resolve address")?;
    println!("Connecting to {addr} ({})", serializer.params());

    let manager = ClientConnectionManager::new();
    manager.start()?;
    let (connection, mut peer) = PeerConnection::new(serializer);
    manager
        .open_connection(addr, Box::new(connection), timeout)
        .blocking_wait()?;

    handshake(&mut peer, addr)?;

    match cli.command {
        Commands::Ping => ping(&mut peer)?,
        Commands::GetAddr => get_addresses(&mut peer)?,
        Commands::Listen => listen(&mut peer),
    }

    peer.close();
    manager.shutdown();
    Ok(())
}

fn send(peer: &PeerHandle, message: impl Into<Message>) -> Result<(), Box<dyn Error>> {
    peer.send_message(&mut message.into())?.blocking_wait()?;
    Ok(())
}

/// Feeds messages to `handler` until it returns true. Pings are already
/// answered by the connection and are skipped.
fn recv_until<F>(peer: &mut PeerHandle, mut handler: F) -> Result<(), Box<dyn Error>>
where
    F: FnMut(Message) -> Result<bool, Box<dyn Error>>,
{
    loop {
        let msg = peer.blocking_recv().ok_or("peer disconnected")?;
        if matches!(msg, Message::Ping(_)) {
            continue;
        }
        if handler(msg)? {
            return Ok(());
        }
    }
}

fn handshake(peer: &mut PeerHandle, addr: std::net::SocketAddr) -> Result<(), Box<dyn Error>> {
    let serializer = peer.serializer().clone();
    let payload = build_version_payload(&serializer, Services::NONE, addr, 0)?;
    send(peer, UnknownMessage::new(serializer.clone(), "version", payload))?;

    recv_until(peer, |msg| Ok(msg.command_name() == "version"))?;
    println!("Received version");

    // addrv2 support must be signalled before verack.
    send(peer, SendAddrV2::new(serializer.clone()))?;
    send(peer, UnknownMessage::new(serializer, "verack", Vec::new()))?;

    recv_until(peer, |msg| Ok(msg.command_name() == "verack"))?;
    println!("Handshake complete");
    Ok(())
}

fn ping(peer: &mut PeerHandle) -> Result<(), Box<dyn Error>> {
    let nonce: u64 = rand::thread_rng().r#gen();
    println!("Sending ping");
    send(peer, Ping::new(peer.serializer().clone(), nonce))?;

    recv_until(peer, |msg| match msg {
        Message::Pong(pong) if pong.nonce() == nonce => {
            println!("Received matching pong: {nonce}");
            Ok(true)
        }
        other => {
            println!("Received (ignored): {other}");
            Ok(false)
        }
    })
}

fn get_addresses(peer: &mut PeerHandle) -> Result<(), Box<dyn Error>> {
    println!("Requesting peer addresses...");
    send(peer, UnknownMessage::new(peer.serializer().clone(), "getaddr", Vec::new()))?;

    recv_until(peer, |msg| match msg {
        Message::Addr(list) | Message::AddrV2(list) => {
            println!("Received {} peers ({})", list.len(), list.format().command());
            for entry in list.addresses() {
                println!("  {entry}  {:?}", entry.services());
            }
            Ok(true)
        }
        other => {
            println!("Received (ignored): {other}");
            Ok(false)
        }
    })
}

fn listen(peer: &mut PeerHandle) {
    while let Some(msg) = peer.blocking_recv() {
        println!("Received {}: {msg}", msg.command_name());
    }
    println!("Peer closed connection.");
}
