//! Session, user and group registries
//!
//! `Directory` is the single source of truth for routing. It owns the
//! session arena (keyed by `SessionId`) plus the username and group maps,
//! which refer to sessions by id only. It is plain data: the `ChatServer`
//! actor owns it, which is what makes every operation below atomic with
//! respect to other sessions.
//!
//! Operations never write to sockets. Anything that must reach a session
//! is returned as a list of `Delivery` values built from a point-in-time
//! snapshot of the relevant set.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::DirectoryConflict;
use crate::group::Group;
use crate::message::{Notification, SERVER_NAME};
use crate::session::Session;
use crate::types::SessionId;

/// One notification addressed to one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: SessionId,
    pub notification: Notification,
}

impl Delivery {
    pub fn new(target: SessionId, notification: Notification) -> Self {
        Self {
            target,
            notification,
        }
    }
}

/// Routing registries
#[derive(Debug, Default)]
pub struct Directory {
    /// Live sessions: SessionId -> Session
    sessions: HashMap<SessionId, Session>,
    /// Registered usernames: username -> SessionId
    users: HashMap<String, SessionId>,
    /// Groups: name -> Group
    groups: HashMap<String, Group>,
}

impl Directory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly accepted session in the `Connecting` state
    pub fn insert_session(&mut self, id: SessionId, outbound: mpsc::UnboundedSender<Notification>) {
        self.sessions.insert(id, Session::new(id, outbound));
    }

    /// Look up a live session
    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of registered users
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Bind `name` to `session_id`
    ///
    /// First writer wins. Re-registering the same session under the same
    /// name succeeds without a broadcast. On a new binding, returns the
    /// user-list broadcast for every live session.
    pub fn register_user(
        &mut self,
        name: &str,
        session_id: SessionId,
    ) -> Result<Vec<Delivery>, DirectoryConflict> {
        if name == SERVER_NAME {
            return Err(DirectoryConflict::AlreadyTaken);
        }

        match self.users.get(name) {
            Some(owner) if *owner == session_id => return Ok(Vec::new()),
            Some(_) => return Err(DirectoryConflict::AlreadyTaken),
            None => {}
        }

        let Some(session) = self.sessions.get_mut(&session_id) else {
            debug!("Register from unknown session {}", session_id);
            return Ok(Vec::new());
        };
        if session.username().is_some() {
            return Err(DirectoryConflict::AlreadyRegistered);
        }

        session.register(name.to_string());
        self.users.insert(name.to_string(), session_id);
        info!("New user registered: {}", name);

        Ok(self.user_list_broadcast())
    }

    /// Remove the binding for `name`, if any
    ///
    /// Not an error when absent. Returns the user-list broadcast when a
    /// binding was removed.
    pub fn deregister_user(&mut self, name: &str) -> Vec<Delivery> {
        let Some(session_id) = self.users.remove(name) else {
            return Vec::new();
        };
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.clear_username();
        }
        info!("User deregistered: {}", name);

        self.user_list_broadcast()
    }

    /// Session currently bound to `name`
    pub fn lookup_user(&self, name: &str) -> Option<SessionId> {
        self.users.get(name).copied()
    }

    /// Create a group with `founder` as its first member
    ///
    /// Returns the group-list broadcast for every live session.
    pub fn create_group(
        &mut self,
        name: &str,
        founder: SessionId,
    ) -> Result<Vec<Delivery>, DirectoryConflict> {
        match self.groups.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(DirectoryConflict::AlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(Group::new(name.to_string(), founder));
            }
        }
        info!("Group {} created by {}", name, founder);

        Ok(self.group_list_broadcast())
    }

    /// Add `session_id` to an existing group
    pub fn join_group(&mut self, name: &str, session_id: SessionId) -> Result<(), DirectoryConflict> {
        let group = self
            .groups
            .get_mut(name)
            .ok_or(DirectoryConflict::NotFound)?;

        if !group.add_member(session_id) {
            return Err(DirectoryConflict::AlreadyMember);
        }
        debug!(
            "Session {} joined group {} ({} members)",
            session_id,
            name,
            group.member_count()
        );
        Ok(())
    }

    /// Member sessions of a group
    pub fn members(&self, name: &str) -> Result<Vec<SessionId>, DirectoryConflict> {
        self.groups
            .get(name)
            .map(Group::snapshot)
            .ok_or(DirectoryConflict::NotFound)
    }

    /// Sorted usernames of a group's registered members
    pub fn member_names(&self, name: &str) -> Result<Vec<String>, DirectoryConflict> {
        let mut names: Vec<String> = self
            .members(name)?
            .into_iter()
            .filter_map(|id| self.sessions.get(&id))
            .filter_map(|session| session.username().map(str::to_owned))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Fan a message out to every current member, sender included
    ///
    /// The member set is read once; the returned deliveries are the whole
    /// broadcast.
    pub fn group_message(
        &self,
        name: &str,
        sender: SessionId,
        text: &str,
    ) -> Result<Vec<Delivery>, DirectoryConflict> {
        let group = self.groups.get(name).ok_or(DirectoryConflict::NotFound)?;
        if !group.contains(sender) {
            return Err(DirectoryConflict::NotMember);
        }
        let from = self
            .sessions
            .get(&sender)
            .and_then(Session::username)
            .ok_or(DirectoryConflict::NotMember)?;

        let notification = Notification::GroupMessage {
            group: name.to_string(),
            from: from.to_string(),
            text: text.to_string(),
        };
        Ok(group
            .snapshot()
            .into_iter()
            .map(|member| Delivery::new(member, notification.clone()))
            .collect())
    }

    /// Tear down a session
    ///
    /// Runs once per session. The session stays in the arena as `Closing`
    /// while it leaves every group and the user map, so the resulting
    /// user-list broadcast skips it; then it is removed and marked `Closed`.
    /// Dropping it releases the outbound sender, so its writer drains what
    /// is already queued and stops. Later calls are no-ops.
    pub fn close_session(&mut self, session_id: SessionId) -> Vec<Delivery> {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Vec::new();
        };
        if !session.begin_close() {
            return Vec::new();
        }
        let username = session.username().map(str::to_owned);

        for group in self.groups.values_mut() {
            group.remove_member(session_id);
        }

        let deliveries = match username {
            Some(name) if self.lookup_user(&name) == Some(session_id) => self.deregister_user(&name),
            _ => Vec::new(),
        };

        if let Some(mut session) = self.sessions.remove(&session_id) {
            session.finish_close();
        }
        deliveries
    }

    /// Queue a delivery on its target session
    ///
    /// Returns false when the target is no longer live.
    pub fn deliver(&self, delivery: Delivery) -> bool {
        match self.sessions.get(&delivery.target) {
            Some(session) => session.enqueue(delivery.notification),
            None => false,
        }
    }

    /// Sorted registered usernames
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted group names
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort();
        names
    }

    /// Current user list, addressed to every live session (not `Closing`)
    pub fn user_list_broadcast(&self) -> Vec<Delivery> {
        self.broadcast(Notification::UserList(self.usernames()))
    }

    /// Current group list, addressed to every live session
    pub fn group_list_broadcast(&self) -> Vec<Delivery> {
        self.broadcast(Notification::GroupList(self.group_names()))
    }

    fn broadcast(&self, notification: Notification) -> Vec<Delivery> {
        self.sessions
            .values()
            .filter(|session| session.is_live())
            .map(|session| Delivery::new(session.id, notification.clone()))
            .collect()
    }
}
