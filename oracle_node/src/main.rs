//! Oracle Node CLI
//!
//! Serves link-state for the topology in CONFIG to its Virtual Nodes.

use clap::Parser;
use oracle_core::OracleError;
use oracle_node::{EventLoop, OracleConfig, DEFAULT_PORT};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "oracle-node", version)]
#[command(about = "Distribute link-state to Virtual Nodes", long_about = None)]
struct Args {
    /// Topology config file (upper-triangular cost matrix)
    config: PathBuf,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Readiness-wait timeout in milliseconds (at most 1000)
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version print to stdout and succeed
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }

    let config = OracleConfig::new(args.config)
        .with_listen(args.bind, args.port)
        .with_tick(Duration::from_millis(args.tick_ms));

    let event_loop = match EventLoop::bind(&config).await {
        Ok(event_loop) => event_loop,
        Err(OracleError::Config(e)) => {
            error!("Wrong format in config file {}: {}", config.config_path.display(), e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    event_loop.run().await;
}
