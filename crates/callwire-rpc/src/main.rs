//! callwire RPC host - serves the built-in services over HTTP.
//!
//! Listens for call envelopes on `POST /api` and prints the bound port as
//! `RPC_PORT=<port>` on stdout so a parent process can find it.

mod handler;
mod server;
mod services;

use anyhow::Result;
use callwire_core::{ServerConfig, ServiceRouter};
use clap::Parser;
use server::ServerOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "callwire-rpc")]
#[command(about = "HTTP host for callwire services")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = ServerConfig::DEFAULT_HOST)]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Maximum number of requests handled at once
    #[arg(long, default_value_t = ServerConfig::DEFAULT_MAX_CONCURRENT_CALLS)]
    max_concurrent: usize,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = ServerConfig::MAX_REQUEST_BODY_BYTES)]
    body_limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!("Starting callwire RPC host");

    let registry = services::default_registry()?;
    info!("Registered services: {}", registry.service_names().join(", "));

    let options = ServerOptions {
        host: args.host,
        port: args.port,
        max_concurrent: args.max_concurrent,
        body_limit: args.body_limit,
    };
    let addr = server::start_server(ServiceRouter::new(registry), &options).await?;

    // Parent processes read the port from this line
    println!("RPC_PORT={}", addr.port());

    info!("RPC host running on {}{}", addr, ServerConfig::ENDPOINT_PATH);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
