//! Virtual Node CLI
//!
//! Registers with an Oracle Node and prints every link-state batch it sends.

use anyhow::{Context, Result};
use clap::Parser;
use oracle_env::TransportError;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use virtual_node::{BatchRecord, PeerConfig, VirtualNodePeer};

#[derive(Parser, Debug)]
#[command(name = "virtual-node", version)]
#[command(about = "Register with an Oracle Node and receive link-state", long_about = None)]
struct Args {
    /// Oracle Node IPv4 address
    on_ip: Ipv4Addr,

    /// UDP port to bind and advertise
    udp_port: u16,

    /// Own IPv4 address to bind and advertise
    own_ip: Ipv4Addr,

    /// Oracle Node TCP port
    #[arg(long, default_value = "5000")]
    oracle_port: u16,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print each batch as one JSON line on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = PeerConfig {
        oracle: SocketAddrV4::new(args.on_ip, args.oracle_port),
        own_ip: args.own_ip,
        udp_port: args.udp_port,
        ..Default::default()
    };

    let mut peer = VirtualNodePeer::connect(&config)
        .await
        .with_context(|| format!("failed to register with Oracle Node at {}", config.oracle))?;
    info!("Waiting for LINK-STATE from Oracle (over TCP)...");

    loop {
        match peer.next_batch().await {
            Ok(batch) => {
                if args.json {
                    println!("{}", serde_json::to_string(&BatchRecord::new(peer.identity(), &batch))?);
                }
            }
            Err(TransportError::Closed) => {
                warn!("Oracle Node closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e).context("lost connection to Oracle Node"),
        }
    }
}
