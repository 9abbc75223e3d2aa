//! Command routing
//!
//! Applies one `Command` from one session against the `Directory` and
//! returns every notification that results, replies and broadcasts alike.
//! Per-command failures always become a reply; nothing here ends a session
//! except REMOVE.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::directory::{Delivery, Directory};
use crate::error::DirectoryConflict;
use crate::message::{Command, Notification, SERVER_NAME};
use crate::session::CloseReason;
use crate::types::SessionId;

/// Command state machine over the directory
#[derive(Debug, Default)]
pub struct Router {
    directory: Directory,
}

impl Router {
    /// Create a router with an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the directory
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Register a newly accepted session
    pub fn connect(&mut self, session_id: SessionId, outbound: mpsc::UnboundedSender<Notification>) {
        self.directory.insert_session(session_id, outbound);
    }

    /// Close a session and purge its directory entries
    pub fn close(&mut self, session_id: SessionId, reason: CloseReason) -> Vec<Delivery> {
        if self.directory.session(session_id).is_none() {
            return Vec::new();
        }
        info!("Session {} closing ({})", session_id, reason);
        self.directory.close_session(session_id)
    }

    /// Apply one command from `sender`
    pub fn apply(&mut self, sender: SessionId, command: Command) -> Vec<Delivery> {
        let Some(session) = self.directory.session(sender) else {
            debug!("Dropping command from closed session {}", sender);
            return Vec::new();
        };
        let current = session.username().map(str::to_owned);

        let command = match command {
            Command::Unknown(err) => {
                warn!("Invalid input from {}: {}", sender, err);
                return vec![Delivery::new(sender, Notification::from(&err))];
            }
            Command::Register { username } => return self.register(sender, &username),
            Command::Deregister { username } => {
                if current.as_deref() != Some(username.as_str()) {
                    warn!(
                        "Session {} asked to remove '{}' but is registered as {:?}",
                        sender, username, current
                    );
                }
                return self.close(sender, CloseReason::Removed);
            }
            other => other,
        };

        let Some(from) = current else {
            return vec![Delivery::new(sender, Notification::NotRegistered)];
        };

        match command {
            Command::SendDirect { username, text } => self.send_direct(sender, from, username, text),
            Command::CreateGroup { group } => self.create_group(sender, &group),
            Command::JoinGroup { group } => {
                let reply = match self.directory.join_group(&group, sender) {
                    Ok(()) => Notification::JoinedGroup,
                    Err(DirectoryConflict::AlreadyMember) => Notification::AlreadyInGroup,
                    Err(_) => Notification::GroupNotFound,
                };
                vec![Delivery::new(sender, reply)]
            }
            Command::CheckGroup { group } => {
                let reply = match self.directory.member_names(&group) {
                    Ok(members) => Notification::GroupMembers { group, members },
                    Err(_) => Notification::GroupNotFound,
                };
                vec![Delivery::new(sender, reply)]
            }
            Command::GroupMessage { group, text } => self.group_message(sender, &from, &group, &text),
            Command::Register { .. } | Command::Deregister { .. } | Command::Unknown(_) => Vec::new(),
        }
    }

    fn register(&mut self, sender: SessionId, username: &str) -> Vec<Delivery> {
        match self.directory.register_user(username, sender) {
            Ok(broadcast) => {
                let mut out = vec![Delivery::new(sender, Notification::Registered)];
                out.extend(broadcast);
                out
            }
            Err(conflict) => {
                debug!("Registration of '{}' by {} refused: {}", username, sender, conflict);
                let reply = match conflict {
                    DirectoryConflict::AlreadyRegistered => Notification::AlreadyRegistered,
                    _ => Notification::UsernameTaken,
                };
                vec![Delivery::new(sender, reply)]
            }
        }
    }

    fn send_direct(
        &mut self,
        sender: SessionId,
        from: String,
        target: String,
        text: String,
    ) -> Vec<Delivery> {
        if target == SERVER_NAME {
            // The server is a participant but never a routing target
            info!("Message to server from {}: {}", from, text);
            return vec![Delivery::new(sender, Notification::MessageSent)];
        }

        match self.directory.lookup_user(&target) {
            Some(target_id) => {
                debug!("Direct message {} -> {}", from, target);
                vec![
                    Delivery::new(target_id, Notification::Direct { from, text }),
                    Delivery::new(sender, Notification::MessageSent),
                ]
            }
            None => vec![Delivery::new(sender, Notification::UserNotFound)],
        }
    }

    fn create_group(&mut self, sender: SessionId, group: &str) -> Vec<Delivery> {
        match self.directory.create_group(group, sender) {
            Ok(broadcast) => {
                let mut out = vec![Delivery::new(sender, Notification::GroupCreated)];
                out.extend(broadcast);
                out
            }
            Err(_) => vec![Delivery::new(sender, Notification::GroupExists)],
        }
    }

    fn group_message(&mut self, sender: SessionId, from: &str, group: &str, text: &str) -> Vec<Delivery> {
        match self.directory.group_message(group, sender, text) {
            Ok(mut out) => {
                debug!("Group message from {} to {} ({} members)", from, group, out.len());
                out.push(Delivery::new(sender, Notification::GroupMessageSent));
                out
            }
            // Non-members are dropped without a reply
            Err(DirectoryConflict::NotMember) => {
                debug!("Dropped group message from non-member {} to {}", from, group);
                Vec::new()
            }
            Err(_) => vec![Delivery::new(sender, Notification::GroupNotFound)],
        }
    }
}
