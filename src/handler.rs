//! TCP connection handler
//!
//! Handles individual client connections: line framing, the read loop
//! feeding the ChatServer, and the writer draining the session's outbound
//! queue.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, ProtocolError};
use crate::framer::LineFramer;
use crate::message::Notification;
use crate::server::ServerCommand;
use crate::session::CloseReason;
use crate::types::SessionId;

/// Handle a new TCP connection
///
/// Frames are forwarded to the ChatServer strictly in arrival order. The
/// connection ends when the peer closes, on a framing or transport error,
/// or when the ChatServer closes the session (REMOVE). In every case the
/// ChatServer is told exactly once and the queued output is flushed before
/// the socket is dropped.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    max_frame_len: usize,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let session_id = SessionId::new();
    info!("Session {} opened from {}", session_id, peer_addr);

    let framer = LineFramer::with_max_len(max_frame_len);
    debug!("Session {} frame limit: {} bytes", session_id, framer.max_len());

    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, framer.clone());
    let mut sink = FramedWrite::new(write_half, framer);

    // Outbound queue: the ChatServer holds the sender, the writer below
    // owns each notification until its bytes are written
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Notification>();

    if cmd_tx
        .send(ServerCommand::Connect {
            session_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register session {} - server closed", session_id);
        return Err(AppError::ChannelSend);
    }

    // Spawn write task (outbound queue -> socket)
    let mut write_task = tokio::spawn(async move {
        while let Some(notification) = msg_rx.recv().await {
            sink.send(notification).await?;
        }
        sink.close().await?;
        Ok::<(), ProtocolError>(())
    });

    let mut reason = CloseReason::Disconnected;
    let mut outcome = Ok(());
    let mut write_done = false;

    loop {
        tokio::select! {
            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    let cmd = ServerCommand::Frame { session_id, frame };
                    if cmd_tx.send(cmd).await.is_err() {
                        debug!("Server closed, ending read loop for {}", session_id);
                        break;
                    }
                }
                Some(Err(ProtocolError::Io(e))) => {
                    error!("Transport error on session {}: {}", session_id, e);
                    reason = CloseReason::Failed;
                    outcome = Err(AppError::Io(e));
                    break;
                }
                Some(Err(e)) => {
                    warn!("Protocol violation on session {}: {}", session_id, e);
                    reason = CloseReason::Failed;
                    outcome = Err(AppError::Protocol(e));
                    break;
                }
                None => {
                    debug!("Session {} reached end of stream", session_id);
                    break;
                }
            },
            result = &mut write_task => {
                write_done = true;
                match result {
                    Ok(Ok(())) => debug!("Outbound queue closed for {}", session_id),
                    Ok(Err(e)) => {
                        error!("Write failed for {}: {}", session_id, e);
                        reason = CloseReason::Failed;
                    }
                    Err(e) => error!("Write task for {} aborted: {}", session_id, e),
                }
                break;
            }
        }
    }

    // No-op if the ChatServer already closed the session
    let _ = cmd_tx
        .send(ServerCommand::Disconnect { session_id, reason })
        .await;

    if !write_done {
        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Final flush failed for {}: {}", session_id, e),
            Err(e) => error!("Write task for {} aborted: {}", session_id, e),
        }
    }

    info!("Session {} disconnected ({})", session_id, reason);

    outcome
}
