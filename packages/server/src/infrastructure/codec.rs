//! Newline-delimited text codec with truncation.
//!
//! Unlike a strict line codec, an oversized line is not an error: the first
//! `max_len` bytes (cut back to a UTF-8 boundary) are yielded and the rest of
//! that line is skipped.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Line codec used for both directions of a chat connection.
#[derive(Debug, Clone)]
pub struct ChatLineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length in bytes, terminator excluded
    max_len: usize,
    /// Skipping the tail of a truncated line
    discarding: bool,
}

impl ChatLineCodec {
    pub fn new(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len: max_len.max(1),
            discarding: false,
        }
    }

    fn bounded_text(&self, raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let mut text = String::from_utf8_lossy(raw).into_owned();
        truncate_at_char_boundary(&mut text, self.max_len);
        text
    }
}

/// Cut `text` to at most `max_len` bytes without splitting a character.
pub fn truncate_at_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

impl Decoder for ChatLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            match (self.discarding, newline) {
                (true, Some(end)) => {
                    src.advance(end + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    src.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(end)) => {
                    let line = src.split_to(end + 1);
                    self.next_index = 0;
                    return Ok(Some(self.bounded_text(&line[..end])));
                }
                (false, None) if src.len() == self.max_len + 1 && src.ends_with(b"\r") => {
                    // Might be the CR of an exact-length CRLF line, wait for more
                    self.next_index = src.len();
                    return Ok(None);
                }
                (false, None) if src.len() > self.max_len => {
                    let line = src.split_to(self.max_len);
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(Some(self.bounded_text(&line)));
                }
                (false, None) => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        // An unterminated tail is dropped, the peer went away mid-line.
        src.clear();
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}

impl Encoder<String> for ChatLineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
