//! Line-based codec for the frame stream.
//!
//! Frames arrive as text lines terminated by `\n`. Carriage returns are
//! dropped wherever they appear, so both `\n` and `\r\n` senders work. A line
//! that reaches [`MAX_LINE_LENGTH`] bytes is cut there and the remainder is
//! delivered as the next line. The cut never falls inside a UTF-8 character:
//! a character straddling the limit moves whole to the next line.

use bytes::{Buf, BytesMut};

/// Maximum line length in bytes.
pub const MAX_LINE_LENGTH: usize = 255;

/// Line terminator used on the wire.
pub const LINE_TERMINATOR: u8 = b'\n';

/// A codec for splitting a byte stream into frame lines.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Complete lines (each ending in `\n`) followed by a partial line. Never holds `\r`.
    buffer: BytesMut,
    /// Number of complete lines waiting in `buffer`.
    complete: usize,
    /// Length of the trailing, unterminated line.
    line_len: usize,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH + 1),
            complete: 0,
            line_len: 0,
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        for &byte in data {
            match byte {
                b'\r' => continue,
                LINE_TERMINATOR => self.terminate_line(),
                _ => {
                    if self.line_len >= MAX_LINE_LENGTH {
                        log::debug!("line exceeds {MAX_LINE_LENGTH} bytes, splitting");
                        self.split_line(byte);
                    }
                    self.buffer.extend_from_slice(&[byte]);
                    self.line_len += 1;
                }
            }
        }
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns `Some("")` for a bare terminator so callers can see empty
    /// reads, or `None` if more data is needed.
    pub fn decode_line(&mut self) -> Option<String> {
        if self.complete == 0 {
            return None;
        }
        let end = self.buffer.iter().position(|&b| b == LINE_TERMINATOR)?;
        let line_data = self.buffer.split_to(end);
        self.buffer.advance(1);
        self.complete -= 1;
        Some(String::from_utf8_lossy(&line_data).into_owned())
    }

    /// Flush a partial, unterminated line.
    ///
    /// Only meaningful when no complete line is pending; returns `None` if
    /// there is nothing to flush.
    pub fn finish(&mut self) -> Option<String> {
        if let Some(line) = self.decode_line() {
            return Some(line);
        }
        if self.buffer.is_empty() {
            return None;
        }
        let line_data = self.buffer.split();
        self.line_len = 0;
        Some(String::from_utf8_lossy(&line_data).into_owned())
    }

    /// Encode a line for transmission.
    pub fn encode_line(line: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(LINE_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.complete = 0;
        self.line_len = 0;
    }

    fn terminate_line(&mut self) {
        self.buffer.extend_from_slice(&[LINE_TERMINATOR]);
        self.complete += 1;
        self.line_len = 0;
    }

    /// End the trailing line before `next`, carrying an unfinished
    /// character over to the new line.
    fn split_line(&mut self, next: u8) {
        let carried = if is_continuation(next) { self.unfinished_char_len() } else { 0 };
        let start = self.buffer.len() - carried;

        let mut tail = [0u8; 3];
        tail[..carried].copy_from_slice(&self.buffer[start..]);
        self.buffer.truncate(start);
        self.terminate_line();
        self.buffer.extend_from_slice(&tail[..carried]);
        self.line_len = carried;
    }

    /// Bytes at the end of the trailing line that start a multi-byte
    /// character (lead byte plus continuations). Zero if there is none.
    fn unfinished_char_len(&self) -> usize {
        let line = &self.buffer[self.buffer.len() - self.line_len..];
        line.iter()
            .rev()
            .take(3)
            .position(|&b| !is_continuation(b))
            .filter(|&i| line[line.len() - 1 - i] >= 0xC0)
            .map_or(0, |i| i + 1)
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
