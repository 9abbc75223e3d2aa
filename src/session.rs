//! Session struct definition
//!
//! Server-side record of one connected client: its id, registration state,
//! and the sending half of its outbound queue. The connection task owns the
//! socket and the receiving half.

use tokio::sync::mpsc;

use crate::message::Notification;
use crate::types::SessionId;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, no username yet
    Connecting,
    /// Holds a username in the directory
    Registered,
    /// Being torn down; directory entries are being purged
    Closing,
    /// Removed from the directory; the writer drains whatever is still
    /// queued, then the socket closes
    Closed,
}

/// Why a session was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent REMOVE
    Removed,
    /// Read side reached end of stream
    Disconnected,
    /// Framing or transport failure
    Failed,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CloseReason::Removed => "removed",
            CloseReason::Disconnected => "disconnected",
            CloseReason::Failed => "failed",
        };
        f.write_str(reason)
    }
}

/// Connected session
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Username (None until REGISTER succeeds)
    username: Option<String>,
    /// Lifecycle state
    state: SessionState,
    /// Server → Client queue
    outbound: mpsc::UnboundedSender<Notification>,
}

impl Session {
    /// Create a new session in the `Connecting` state
    pub fn new(id: SessionId, outbound: mpsc::UnboundedSender<Notification>) -> Self {
        Self {
            id,
            username: None,
            state: SessionState::Connecting,
            outbound,
        }
    }

    /// Queue a notification for this session
    ///
    /// Never blocks. Returns false if the connection's writer is gone; the
    /// notification is dropped in that case.
    pub fn enqueue(&self, notification: Notification) -> bool {
        self.outbound.send(notification).is_ok()
    }

    /// Username, if registered
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connecting or Registered
    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connecting | SessionState::Registered
        )
    }

    /// Check if this session holds a username
    pub fn is_registered(&self) -> bool {
        self.state == SessionState::Registered
    }

    /// Connecting → Registered
    pub(crate) fn register(&mut self, username: String) {
        self.username = Some(username);
        self.state = SessionState::Registered;
    }

    /// Drop the username binding without closing
    pub(crate) fn clear_username(&mut self) -> Option<String> {
        if self.state == SessionState::Registered {
            self.state = SessionState::Connecting;
        }
        self.username.take()
    }

    /// Enter `Closing`
    ///
    /// Returns false if the session was already closing or closed, so
    /// cleanup runs once.
    pub(crate) fn begin_close(&mut self) -> bool {
        match self.state {
            SessionState::Closing | SessionState::Closed => false,
            SessionState::Connecting | SessionState::Registered => {
                self.state = SessionState::Closing;
                true
            }
        }
    }

    /// Closing → Closed
    pub(crate) fn finish_close(&mut self) {
        self.state = SessionState::Closed;
    }
}
