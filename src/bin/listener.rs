use std::error::Error;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use btc_wire::config;
use btc_wire::net::{PeerFactory, PeerHandle, Server};

#[derive(Parser)]
#[command(name = "btc-listener", about = "Accept peers and print what they send")]
struct Cli {
    /// Port to listen on; defaults to the configured one.
    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    network: Option<String>,
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
    let port = cli.port.unwrap_or(cfg.listen_port());

    let (factory, mut accepted) = PeerFactory::new(cfg.serializer());
    let server = Server::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), Arc::new(factory))?;
    println!("Listening on {}", server.local_addr());

    // Nothing is pushed to us unasked, so most peers stay quiet after connecting.
    while let Some((addr, peer)) = accepted.blocking_recv() {
        info!(%addr, connected = server.connected_count(), "accepted");
        std::thread::Builder::new()
            .name(format!("peer-{addr}"))
            .spawn(move || print_messages(addr, peer))?;
    }

    server.shutdown();
    Ok(())
}

fn print_messages(addr: SocketAddr, mut peer: PeerHandle) {
    while let Some(msg) = peer.blocking_recv() {
        println!("[{addr}] {}: {msg}", msg.command_name());
    }
    println!("[{addr}] closed");
}
