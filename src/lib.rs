//! Multi-user line-protocol chat server library
//!
//! Clients connect over TCP, register a username, exchange direct messages,
//! and form named groups for broadcast messaging.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor; it owns the `Router`, which owns the
//!   `Directory` (sessions, usernames, groups)
//! - Each connection has a `handler` task that frames the byte stream with
//!   `LineFramer` and forwards frames to the ChatServer in order
//! - Each session has an unbounded outbound queue drained by its own writer
//!   task, so routing never waits on a slow socket
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use line_chat_server::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     serve(listener, config).await;
//! }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod framer;
pub mod group;
pub mod handler;
pub mod message;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use directory::{Delivery, Directory};
pub use error::{AppError, ConfigError, DirectoryConflict, ProtocolError};
pub use framer::LineFramer;
pub use group::Group;
pub use handler::handle_connection;
pub use message::{parse, serialize, Command, Notification, ParseError};
pub use router::Router;
pub use server::{serve, ChatServer, ServerCommand};
pub use session::{CloseReason, Session, SessionState};
pub use types::SessionId;
