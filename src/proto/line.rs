//! Line-based codec for tokio.
//!
//! Reads CRLF (or bare LF) terminated lines. Oversized lines are discarded
//! and surfaced as an item-level error so the stream keeps going; only real
//! I/O failures end it.

use bytes::BytesMut;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use super::error::ProtocolError;

/// Default maximum line length (IRCv3 tags + 512 byte message body).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8191;

/// Line-based codec that handles newline-terminated messages.
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Set while skipping the remainder of an oversized line
    discarding: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a new codec with custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Result<String, ProtocolError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let content = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let content = content.strip_suffix(b"\r").unwrap_or(content);
            if std::mem::take(&mut self.discarding) || content.len() > self.max_len {
                return Ok(Some(Err(ProtocolError::LineTooLong {
                    limit: self.max_len,
                })));
            }

            // Non UTF-8 clients still get routed; invalid bytes become U+FFFD.
            let text = String::from_utf8_lossy(&line);
            return Ok(Some(Ok(text.trim_end_matches(['\r', '\n']).to_string())));
        }

        if src.len() > self.max_len + 2 {
            src.clear();
            self.next_index = 0;
            self.discarding = true;
            return Ok(None);
        }

        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if src.is_empty() || self.discarding {
            src.clear();
            return Ok(None);
        }
        let line = src.split();
        self.next_index = 0;
        Ok(Some(Ok(String::from_utf8_lossy(&line)
            .trim_end_matches('\r')
            .to_string())))
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    /// Writes the payload verbatim; terminators are added by the caller.
    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> io::Result<()> {
        dst.extend_from_slice(msg.as_bytes());
        Ok(())
    }
}
