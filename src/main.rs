//! Line chat server - Entry Point
//!
//! Loads configuration, starts the TCP listener and the ChatServer actor.

use std::env;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use line_chat_server::{serve, AppError, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_chat_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("line_chat_server=info")),
        )
        .init();

    // Get bind address from command line, overriding config and env
    let config = ServerConfig::load(env::args().nth(1))?;

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Chat server listening on {}", config.bind_addr);

    serve(listener, config).await;
    Ok(())
}
