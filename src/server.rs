//! ChatServer Actor implementation
//!
//! The single owner of the `Router` (and through it the `Directory`).
//! Connection tasks talk to it over one mpsc channel, so directory access
//! is serialized here: a check-then-act sequence never interleaves with
//! another session's command, and commands from one session are applied in
//! the order they were sent.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::directory::Delivery;
use crate::framer::Frame;
use crate::handler::handle_connection;
use crate::message::{self, Notification};
use crate::router::Router;
use crate::session::CloseReason;
use crate::types::SessionId;

/// Commands sent from connection tasks to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New session accepted
    Connect {
        session_id: SessionId,
        sender: mpsc::UnboundedSender<Notification>,
    },
    /// One complete frame read from a session
    Frame { session_id: SessionId, frame: Frame },
    /// Session's connection ended
    Disconnect {
        session_id: SessionId,
        reason: CloseReason,
    },
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Command router, owns the directory
    router: Router,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            router: Router::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { session_id, sender } => {
                info!("Session {} connected", session_id);
                self.router.connect(session_id, sender);
                self.log_totals();
            }
            ServerCommand::Frame { session_id, frame } => {
                let command = frame
                    .and_then(|text| message::parse(&text))
                    .unwrap_or_else(message::Command::Unknown);
                let deliveries = self.router.apply(session_id, command);
                self.deliver(deliveries);
            }
            ServerCommand::Disconnect { session_id, reason } => {
                let deliveries = self.router.close(session_id, reason);
                self.deliver(deliveries);
                self.log_totals();
            }
        }
    }

    /// Hand each notification to its target session's queue
    fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let target = delivery.target;
            if !self.router.directory().deliver(delivery) {
                debug!("Dropped notification for closed session {}", target);
            }
        }
    }

    fn log_totals(&self) {
        let directory = self.router.directory();
        debug!(
            "Total sessions: {}, users: {}, groups: {}",
            directory.session_count(),
            directory.user_count(),
            directory.group_count()
        );
    }
}

/// Accept connections on `listener` forever
///
/// Spawns the ChatServer actor and one task per accepted connection.
pub async fn serve(listener: TcpListener, config: ServerConfig) {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    tokio::spawn(ChatServer::new(cmd_rx).run());
    info!("ChatServer actor started");

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let max_frame_len = config.max_frame_len;

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, max_frame_len).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
