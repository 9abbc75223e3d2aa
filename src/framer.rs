//! Newline framing for the chat protocol
//!
//! Turns the raw byte stream of one connection into complete text frames.
//! Partial data stays in the `BytesMut` read buffer between reads, so a frame
//! split across several reads, or several frames coalesced into one read,
//! come out the same way.
//!
//! A complete line that is not valid UTF-8 is still a frame: it comes out as
//! a `ParseError` so the session gets a reply and stays open. Only an
//! oversized frame or a transport failure is fatal.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::error::ProtocolError;
use crate::message::{self, Notification, ParseError};

/// Default maximum frame length in bytes, terminator excluded
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;

/// One decoded line: its text, or why it is not text
pub type Frame = Result<String, ParseError>;

/// Line framer: `\n`-terminated UTF-8 frames, optional trailing `\r`
#[derive(Debug, Clone)]
pub struct LineFramer {
    /// Index of next byte to check for a terminator
    next_index: usize,
    /// Maximum frame length
    max_len: usize,
}

impl LineFramer {
    /// Create a framer with the default size limit
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a framer with a custom size limit
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    /// Maximum accepted frame length
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineFramer {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            // No complete frame yet - remember where we stopped
            self.next_index = src.len();

            // Allow one extra byte for a trailing '\r'
            if src.len() > self.max_len + 1 {
                return Err(ProtocolError::FrameTooLarge {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            return Ok(None);
        };

        let newline = self.next_index + offset;
        self.next_index = 0;

        let mut line = src.split_to(newline + 1);
        line.truncate(newline);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        if line.len() > self.max_len {
            return Err(ProtocolError::FrameTooLarge {
                actual: line.len(),
                limit: self.max_len,
            });
        }

        let frame = String::from_utf8(line.to_vec()).map_err(|e| ParseError::InvalidUtf8 {
            valid_up_to: e.utf8_error().valid_up_to(),
        });
        Ok(Some(frame))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        // Unterminated residue at disconnect is never delivered
        if !src.is_empty() {
            debug!("Discarding {} unterminated bytes at end of stream", src.len());
            src.advance(src.len());
            self.next_index = 0;
        }
        Ok(None)
    }
}

impl Encoder<Notification> for LineFramer {
    type Error = ProtocolError;

    fn encode(&mut self, item: Notification, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.extend_from_slice(&message::serialize(&item));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{parse, Command};

    fn drain(framer: &mut LineFramer, buf: &mut BytesMut) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = framer.decode(buf).unwrap() {
            frames.push(frame.unwrap());
        }
        frames
    }

    #[test]
    fn test_single_frame() {
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::from("REGISTER SERVER alice\n");

        assert_eq!(drain(&mut framer, &mut buf), vec!["REGISTER SERVER alice"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_coalesced_frames() {
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::from("CREATE_GROUP g1\r\nJOIN_GROUP g2\nGROUP_CH");

        assert_eq!(
            drain(&mut framer, &mut buf),
            vec!["CREATE_GROUP g1", "JOIN_GROUP g2"]
        );
        assert_eq!(&buf[..], b"GROUP_CH");

        buf.extend_from_slice(b"ECK g1\n");
        assert_eq!(drain(&mut framer, &mut buf), vec!["GROUP_CHECK g1"]);
    }

    #[test]
    fn test_split_at_every_boundary() {
        let wire = b"MESSAGE bob hello there, bob\n";
        let whole = parse("MESSAGE bob hello there, bob").unwrap();

        for split in 1..wire.len() {
            let mut framer = LineFramer::new();
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();

            buf.extend_from_slice(&wire[..split]);
            frames.extend(drain(&mut framer, &mut buf));
            buf.extend_from_slice(&wire[split..]);
            frames.extend(drain(&mut framer, &mut buf));

            assert_eq!(frames.len(), 1, "split at {}", split);
            let command: Command = parse(&frames[0]).unwrap();
            assert_eq!(command, whole, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let wire = b"GROUP_MESSAGE g1 hi all\n";
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::new();
        let mut frames = Vec::new();

        for byte in wire {
            buf.extend_from_slice(&[*byte]);
            frames.extend(drain(&mut framer, &mut buf));
        }

        assert_eq!(frames, vec!["GROUP_MESSAGE g1 hi all"]);
    }

    #[test]
    fn test_frame_too_large_partial() {
        let mut framer = LineFramer::with_max_len(8);
        let mut buf = BytesMut::from("123456789");
        assert_eq!(framer.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"0");
        let err = framer.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooLarge { actual: 10, limit: 8 }
        ));
    }

    #[test]
    fn test_frame_too_large_complete() {
        let mut framer = LineFramer::with_max_len(4);
        let mut buf = BytesMut::from("hello\n");

        assert!(matches!(
            framer.decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_frame_at_limit_is_accepted() {
        let mut framer = LineFramer::with_max_len(5);
        let mut buf = BytesMut::from("hello\r\n");

        assert_eq!(drain(&mut framer, &mut buf), vec!["hello"]);
    }

    #[test]
    fn test_invalid_utf8_is_not_fatal() {
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::from(&b"MESSAGE bob caf\xe9\nHELLO\n"[..]);

        assert_eq!(
            framer.decode(&mut buf).unwrap(),
            Some(Err(ParseError::InvalidUtf8 { valid_up_to: 15 }))
        );
        assert_eq!(
            framer.decode(&mut buf).unwrap(),
            Some(Ok("HELLO".to_string()))
        );
    }

    #[test]
    fn test_max_len_accessor() {
        assert_eq!(LineFramer::new().max_len(), DEFAULT_MAX_FRAME_LEN);
        assert_eq!(LineFramer::with_max_len(16).max_len(), 16);
    }

    #[test]
    fn test_eof_discards_residue() {
        let mut framer = LineFramer::new();
        let mut buf = BytesMut::from("JOIN_GROUP g1\nREMOVE SERV");

        assert_eq!(
            framer.decode_eof(&mut buf).unwrap(),
            Some(Ok("JOIN_GROUP g1".to_string()))
        );
        assert_eq!(framer.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_notification() {
        let mut framer = LineFramer::new();
        let mut dst = BytesMut::new();

        framer
            .encode(Notification::Registered, &mut dst)
            .unwrap();

        assert_eq!(&dst[..], b"Registered.\n");
    }
}
