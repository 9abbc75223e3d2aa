//! Message protocol definitions
//!
//! Text line protocol in both directions. Client frames parse into a
//! `Command`; server output is a `Notification` rendered as one line.
//!
//! ```text
//! REGISTER SERVER <username>
//! MESSAGE <username> <text...>
//! CREATE_GROUP <groupName>
//! JOIN_GROUP <groupName>
//! GROUP_CHECK <groupName>
//! GROUP_MESSAGE <groupName> <text...>
//! REMOVE SERVER <username>
//! ```

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Name of the implicit server participant
///
/// Appears as the keyword in `REGISTER SERVER` / `REMOVE SERVER` and can
/// never be registered as a username.
pub const SERVER_NAME: &str = "SERVER";

/// Client → Server command, parsed from one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Claim a username
    Register { username: String },
    /// Direct message to one user
    SendDirect { username: String, text: String },
    /// Create a group, founder joins it
    CreateGroup { group: String },
    /// Join an existing group
    JoinGroup { group: String },
    /// List group members
    CheckGroup { group: String },
    /// Message every member of a group
    GroupMessage { group: String, text: String },
    /// Leave the server
    Deregister { username: String },
    /// Frame that did not parse
    Unknown(ParseError),
}

impl Command {
    /// Render the command back into its wire form (without terminator)
    ///
    /// Returns `None` for `Unknown`, which has no wire form.
    pub fn to_frame(&self) -> Option<String> {
        let frame = match self {
            Command::Register { username } => format!("REGISTER {} {}", SERVER_NAME, username),
            Command::SendDirect { username, text } => format!("MESSAGE {} {}", username, text),
            Command::CreateGroup { group } => format!("CREATE_GROUP {}", group),
            Command::JoinGroup { group } => format!("JOIN_GROUP {}", group),
            Command::CheckGroup { group } => format!("GROUP_CHECK {}", group),
            Command::GroupMessage { group, text } => format!("GROUP_MESSAGE {} {}", group, text),
            Command::Deregister { username } => format!("REMOVE {} {}", SERVER_NAME, username),
            Command::Unknown(_) => return None,
        };
        Some(frame)
    }
}

/// Why a frame failed to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Blank frame
    #[error("empty frame")]
    Empty,

    /// Leading token is not a known command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Required argument absent
    #[error("{command}: missing {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    /// Extra tokens after the last argument
    #[error("{command}: unexpected argument '{token}'")]
    UnexpectedArgument { command: &'static str, token: String },

    /// Frame bytes are not valid UTF-8
    #[error("invalid UTF-8 at byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },

    /// `REGISTER` frame of the wrong shape
    #[error("invalid registration command format")]
    InvalidRegistration,
}

/// Parse one frame into a `Command`
///
/// Never panics; any malformed input is a `ParseError`.
pub fn parse(frame: &str) -> Result<Command, ParseError> {
    let (name, rest) = next_token(frame).ok_or(ParseError::Empty)?;

    match name {
        "REGISTER" => {
            let username = server_addressed(rest).ok_or(ParseError::InvalidRegistration)?;
            Ok(Command::Register { username })
        }
        "MESSAGE" => {
            let (username, rest) = required("MESSAGE", "username", rest)?;
            let text = remainder("MESSAGE", rest)?;
            Ok(Command::SendDirect { username, text })
        }
        "CREATE_GROUP" => Ok(Command::CreateGroup {
            group: only("CREATE_GROUP", rest)?,
        }),
        "JOIN_GROUP" => Ok(Command::JoinGroup {
            group: only("JOIN_GROUP", rest)?,
        }),
        "GROUP_CHECK" => Ok(Command::CheckGroup {
            group: only("GROUP_CHECK", rest)?,
        }),
        "GROUP_MESSAGE" => {
            let (group, rest) = required("GROUP_MESSAGE", "group name", rest)?;
            let text = remainder("GROUP_MESSAGE", rest)?;
            Ok(Command::GroupMessage { group, text })
        }
        "REMOVE" => {
            let username = server_addressed(rest).ok_or(ParseError::MissingArgument {
                command: "REMOVE",
                argument: "SERVER <username>",
            })?;
            Ok(Command::Deregister { username })
        }
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

/// Split off the next whitespace-delimited token
fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, "")),
    }
}

fn required<'a>(
    command: &'static str,
    argument: &'static str,
    input: &'a str,
) -> Result<(String, &'a str), ParseError> {
    next_token(input)
        .map(|(token, rest)| (token.to_string(), rest))
        .ok_or(ParseError::MissingArgument { command, argument })
}

/// Exactly one argument, nothing after it
fn only(command: &'static str, input: &str) -> Result<String, ParseError> {
    let (token, rest) = required(command, "group name", input)?;
    match next_token(rest) {
        Some((extra, _)) => Err(ParseError::UnexpectedArgument {
            command,
            token: extra.to_string(),
        }),
        None => Ok(token),
    }
}

/// The rest of the frame, verbatim apart from leading whitespace
fn remainder(command: &'static str, input: &str) -> Result<String, ParseError> {
    let text = input.trim_start();
    if text.is_empty() {
        return Err(ParseError::MissingArgument {
            command,
            argument: "text",
        });
    }
    Ok(text.to_string())
}

/// `SERVER <username>` with nothing trailing
fn server_addressed(input: &str) -> Option<String> {
    let (keyword, rest) = next_token(input)?;
    if keyword != SERVER_NAME {
        return None;
    }
    let (username, rest) = next_token(rest)?;
    if next_token(rest).is_some() {
        return None;
    }
    Some(username.to_string())
}

/// Server → Client notification
///
/// Each variant renders as exactly one line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Registration succeeded
    Registered,
    /// Malformed REGISTER frame
    InvalidRegistration,
    /// Username bound to another session
    UsernameTaken,
    /// Session already holds a different username
    AlreadyRegistered,
    /// Command requires a registered session
    NotRegistered,
    /// Direct message routed
    MessageSent,
    /// Direct message target unknown
    UserNotFound,
    /// Direct message delivered to its target
    Direct { from: String, text: String },
    /// Group created
    GroupCreated,
    /// Group name in use
    GroupExists,
    /// Joined a group
    JoinedGroup,
    /// Already a member
    AlreadyInGroup,
    /// Group unknown
    GroupNotFound,
    /// Reply to GROUP_CHECK
    GroupMembers { group: String, members: Vec<String> },
    /// Group message routed
    GroupMessageSent,
    /// Group message delivered to a member
    GroupMessage {
        group: String,
        from: String,
        text: String,
    },
    /// Broadcast of registered usernames
    UserList(Vec<String>),
    /// Broadcast of group names
    GroupList(Vec<String>),
    /// Frame did not parse
    InvalidInput,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Registered => f.write_str("Registered."),
            Notification::InvalidRegistration => {
                f.write_str("Invalid registration command format.")
            }
            Notification::UsernameTaken => f.write_str("Username already taken."),
            Notification::AlreadyRegistered => f.write_str("Already registered."),
            Notification::NotRegistered => f.write_str("Not registered."),
            Notification::MessageSent => f.write_str("Message sent."),
            Notification::UserNotFound => f.write_str("User not found."),
            Notification::Direct { from, text } => write!(f, "{}: {}", from, text),
            Notification::GroupCreated => f.write_str("Group created."),
            Notification::GroupExists => f.write_str("Group already exists."),
            Notification::JoinedGroup => f.write_str("Joined group."),
            Notification::AlreadyInGroup => f.write_str("User already in group."),
            Notification::GroupNotFound => f.write_str("Group not found."),
            Notification::GroupMembers { group, members } => {
                write!(f, "Members of {}: {}", group, members.join(", "))
            }
            Notification::GroupMessageSent => f.write_str("Group message sent."),
            Notification::GroupMessage { group, from, text } => {
                write!(f, "({}) {}: {}", group, from, text)
            }
            Notification::UserList(users) => write!(f, "Online users: {}", users.join(", ")),
            Notification::GroupList(groups) => write!(f, "Groups: {}", groups.join(", ")),
            Notification::InvalidInput => f.write_str("Invalid input."),
        }
    }
}

/// Reply for a frame that failed to parse
impl From<&ParseError> for Notification {
    fn from(err: &ParseError) -> Self {
        match err {
            ParseError::InvalidRegistration => Notification::InvalidRegistration,
            _ => Notification::InvalidInput,
        }
    }
}

/// Serialize a notification to wire bytes: UTF-8, newline-terminated
pub fn serialize(notification: &Notification) -> Bytes {
    let mut line = notification.to_string();
    line.push('\n');
    Bytes::from(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register() {
        assert_eq!(
            parse("REGISTER SERVER alice").unwrap(),
            Command::Register {
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_parse_register_malformed() {
        assert_eq!(parse("REGISTER alice"), Err(ParseError::InvalidRegistration));
        assert_eq!(parse("REGISTER SERVER"), Err(ParseError::InvalidRegistration));
        assert_eq!(
            parse("REGISTER SERVER alice bob"),
            Err(ParseError::InvalidRegistration)
        );
    }

    #[test]
    fn test_parse_message_keeps_text_verbatim() {
        match parse("MESSAGE bob  hello,   world ").unwrap() {
            Command::SendDirect { username, text } => {
                assert_eq!(username, "bob");
                assert_eq!(text, "hello,   world ");
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_parse_group_commands() {
        assert_eq!(
            parse("CREATE_GROUP g1").unwrap(),
            Command::CreateGroup {
                group: "g1".to_string()
            }
        );
        assert_eq!(
            parse("JOIN_GROUP g1").unwrap(),
            Command::JoinGroup {
                group: "g1".to_string()
            }
        );
        assert_eq!(
            parse("GROUP_CHECK g1").unwrap(),
            Command::CheckGroup {
                group: "g1".to_string()
            }
        );
        assert_eq!(
            parse("GROUP_MESSAGE g1 hi there").unwrap(),
            Command::GroupMessage {
                group: "g1".to_string(),
                text: "hi there".to_string()
            }
        );
    }

    #[test]
    fn test_parse_remove() {
        assert_eq!(
            parse("REMOVE SERVER alice").unwrap(),
            Command::Deregister {
                username: "alice".to_string()
            }
        );
        assert!(matches!(
            parse("REMOVE alice"),
            Err(ParseError::MissingArgument { command: "REMOVE", .. })
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(
            parse("register SERVER alice"),
            Err(ParseError::UnknownCommand("register".to_string()))
        );
        assert!(matches!(
            parse("MESSAGE bob"),
            Err(ParseError::MissingArgument {
                argument: "text",
                ..
            })
        ));
        assert!(matches!(
            parse("MESSAGE"),
            Err(ParseError::MissingArgument {
                argument: "username",
                ..
            })
        ));
        assert!(matches!(
            parse("JOIN_GROUP"),
            Err(ParseError::MissingArgument { .. })
        ));
        assert_eq!(
            parse("CREATE_GROUP a b"),
            Err(ParseError::UnexpectedArgument {
                command: "CREATE_GROUP",
                token: "b".to_string()
            })
        );
    }

    #[test]
    fn test_frame_round_trip() {
        let frames = [
            "REGISTER SERVER alice",
            "MESSAGE bob hello there",
            "CREATE_GROUP g1",
            "JOIN_GROUP g1",
            "GROUP_CHECK g1",
            "GROUP_MESSAGE g1 hi  all",
            "REMOVE SERVER alice",
        ];
        for frame in frames {
            let command = parse(frame).unwrap();
            let rendered = command.to_frame().unwrap();
            assert_eq!(rendered, frame);
            assert_eq!(parse(&rendered).unwrap(), command);
        }
    }

    #[test]
    fn test_round_trip_normalizes_whitespace() {
        let command = parse("  JOIN_GROUP   g1  ").unwrap();
        assert_eq!(command.to_frame().unwrap(), "JOIN_GROUP g1");
    }

    #[test]
    fn test_notification_wording() {
        assert_eq!(Notification::Registered.to_string(), "Registered.");
        assert_eq!(
            Notification::InvalidRegistration.to_string(),
            "Invalid registration command format."
        );
        assert_eq!(Notification::UserNotFound.to_string(), "User not found.");
        assert_eq!(
            Notification::AlreadyInGroup.to_string(),
            "User already in group."
        );
        assert_eq!(Notification::InvalidInput.to_string(), "Invalid input.");
        assert_eq!(
            Notification::GroupMessage {
                group: "g1".to_string(),
                from: "alice".to_string(),
                text: "hello".to_string(),
            }
            .to_string(),
            "(g1) alice: hello"
        );
        assert_eq!(
            Notification::UserList(vec!["alice".to_string(), "bob".to_string()]).to_string(),
            "Online users: alice, bob"
        );
    }

    #[test]
    fn test_serialize_is_newline_terminated() {
        let bytes = serialize(&Notification::Direct {
            from: "alice".to_string(),
            text: "hi bob".to_string(),
        });
        assert_eq!(&bytes[..], b"alice: hi bob\n");
    }

    #[test]
    fn test_parse_error_reply() {
        assert_eq!(
            Notification::from(&ParseError::InvalidRegistration),
            Notification::InvalidRegistration
        );
        assert_eq!(
            Notification::from(&ParseError::Empty),
            Notification::InvalidInput
        );
        assert_eq!(
            Notification::from(&ParseError::InvalidUtf8 { valid_up_to: 3 }),
            Notification::InvalidInput
        );
    }
}
