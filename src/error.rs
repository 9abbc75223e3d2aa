//! Error types for the chat server
//!
//! Defines application-level errors, framing errors, and directory conflicts.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only `AppError` and `ProtocolError` end a session. Directory conflicts and
//! parse errors (see `message::ParseError`) are turned into replies.

use thiserror::Error;

/// Application-level errors
///
/// Every variant here is fatal for the connection it occurs on.
#[derive(Debug, Error)]
pub enum AppError {
    /// Framing or wire-level violation
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// IO error (transport failure)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Fatal wire-level errors raised by the framer
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame grew past the configured maximum before its terminator arrived
    #[error("frame too large: {actual} bytes (limit {limit})")]
    FrameTooLarge { actual: usize, limit: usize },

    /// Underlying read or write failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Conflicts reported by directory operations
///
/// Never fatal; the router turns each into a reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DirectoryConflict {
    /// Username is bound to another live session
    #[error("username already taken")]
    AlreadyTaken,

    /// Session is already registered under a different name
    #[error("session already registered")]
    AlreadyRegistered,

    /// Group name is already in use
    #[error("group already exists")]
    AlreadyExists,

    /// Session is already a member of the group
    #[error("already a member")]
    AlreadyMember,

    /// Group does not exist
    #[error("group not found")]
    NotFound,

    /// Sender is not a member of the group
    #[error("sender is not a member")]
    NotMember,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `ServerConfig`
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Setting out of range
    #[error("invalid value for {field}: must be greater than zero")]
    Invalid { field: &'static str },

    /// Environment variable holds an unusable value
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}
