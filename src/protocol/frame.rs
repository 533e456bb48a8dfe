//! Message framing for SCPI over byte streams.
//!
//! SCPI program and response messages are terminated by a line feed:
//! ```text
//! ┌───────────────────────────────┬────────┐
//! │  message units (ASCII/binary) │  0x0a  │
//! └───────────────────────────────┴────────┘
//! ```
//!
//! A terminator byte does not always end a message. Definite-length arbitrary
//! blocks (`#<n><len><bytes>`) carry raw binary that may contain `0x0a`, and
//! quoted strings may contain it too. The decoder skips over both. Only a `"`
//! at the start of a data element opens a string, so apostrophes and inch
//! marks inside plain text do not.

use bytes::{Bytes, BytesMut};

/// Default message terminator.
pub const DEFAULT_TERMINATOR: u8 = b'\n';

/// Resumable scan position inside the buffered data.
#[derive(Debug, Clone, Copy)]
struct ScanState {
    pos: usize,
    quoted: bool,
    token_start: bool,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            pos: 0,
            quoted: false,
            token_start: true,
        }
    }
}

/// Line decoder that handles partial data, arbitrary blocks and quoted strings.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: BytesMut,
    terminator: u8,
    scan: ScanState,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Creates a new decoder using the default `\n` terminator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_terminator(DEFAULT_TERMINATOR)
    }

    /// Creates a new decoder with a custom terminator byte.
    #[must_use]
    pub fn with_terminator(terminator: u8) -> Self {
        Self {
            buffer: BytesMut::new(),
            terminator,
            scan: ScanState::default(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete message.
    ///
    /// Returns `Some(message)` without its terminator (a trailing `\r` is
    /// stripped as well), or `None` if more data is needed.
    pub fn decode(&mut self) -> Option<Bytes> {
        let end = self.find_end()?;

        let mut message = self.buffer.split_to(end + 1);
        self.scan = ScanState::default();

        message.truncate(end);
        if message.last() == Some(&b'\r') {
            message.truncate(end - 1);
        }

        Some(message.freeze())
    }

    /// Scans forward for the terminator that ends the current message.
    fn find_end(&mut self) -> Option<usize> {
        let buf = &self.buffer[..];
        let mut state = self.scan;

        while state.pos < buf.len() {
            let byte = buf[state.pos];

            if state.quoted {
                // A doubled quote closes and immediately reopens.
                if byte == b'"' {
                    state.quoted = false;
                    state.token_start = true;
                }
                state.pos += 1;
                continue;
            }

            if byte == self.terminator {
                self.scan = state;
                return Some(state.pos);
            }

            match byte {
                b'"' if state.token_start => {
                    state.quoted = true;
                    state.token_start = false;
                    state.pos += 1;
                }
                b'#' if state.token_start => match block_extent(&buf[state.pos..]) {
                    BlockScan::Incomplete => {
                        // Resume at the '#' once more data arrives.
                        self.scan = state;
                        return None;
                    }
                    BlockScan::Skip(len) => {
                        state.pos += len;
                        state.token_start = false;
                    }
                    BlockScan::NotABlock => {
                        state.pos += 1;
                        state.token_start = false;
                    }
                },
                b',' | b';' | b' ' | b'\t' => {
                    state.token_start = true;
                    state.pos += 1;
                }
                _ => {
                    state.token_start = false;
                    state.pos += 1;
                }
            }
        }

        self.scan = state;
        None
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scan = ScanState::default();
    }
}

enum BlockScan {
    Incomplete,
    Skip(usize),
    NotABlock,
}

/// Determines how many bytes a block starting at `data[0] == b'#'` spans.
///
/// `#0` (indefinite length) runs to the terminator, so only the header is
/// skipped. Non-digit forms such as `#H1F` are numeric data, not blocks.
fn block_extent(data: &[u8]) -> BlockScan {
    let Some(&count) = data.get(1) else {
        return BlockScan::Incomplete;
    };

    if !count.is_ascii_digit() {
        return BlockScan::NotABlock;
    }

    let digits = usize::from(count - b'0');
    if digits == 0 {
        return BlockScan::Skip(2);
    }

    let header_len = 2 + digits;
    let Some(len_field) = data.get(2..header_len) else {
        return BlockScan::Incomplete;
    };

    let Some(payload_len) = parse_ascii_len(len_field) else {
        return BlockScan::NotABlock;
    };

    let total = header_len + payload_len;
    if data.len() < total {
        BlockScan::Incomplete
    } else {
        BlockScan::Skip(total)
    }
}

/// Parses an unsigned decimal length field.
pub(crate) fn parse_ascii_len(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_line() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"+1.25E+00\n");

        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"+1.25E+00")));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_partial_line() {
        let mut decoder = LineDecoder::new();

        decoder.feed(b"ACME,DMM");
        assert_eq!(decoder.decode(), None);

        decoder.feed(b",0,1.0\r\n");
        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"ACME,DMM,0,1.0")));
    }

    #[test]
    fn test_decode_multiple_lines() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"1\n0,\"No error\"\n");

        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"1")));
        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"0,\"No error\"")));
        assert_eq!(decoder.decode(), None);
    }

    #[test]
    fn test_decode_block_containing_terminator() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"#15a\nb\nc\n");

        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"#15a\nb\nc")));
    }

    #[test]
    fn test_decode_block_split_across_feeds() {
        let mut decoder = LineDecoder::new();

        decoder.feed(b"#2");
        assert_eq!(decoder.decode(), None);
        decoder.feed(b"10\n\n\n");
        assert_eq!(decoder.decode(), None);
        decoder.feed(b"1234567\n");

        assert_eq!(
            decoder.decode(),
            Some(Bytes::from_static(b"#210\n\n\n1234567"))
        );
    }

    #[test]
    fn test_decode_quoted_terminator() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"\"line one\nline two\"\n");

        assert_eq!(
            decoder.decode(),
            Some(Bytes::from_static(b"\"line one\nline two\""))
        );
    }

    #[test]
    fn test_decode_doubled_quote_inside_string() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"\"say \"\"hi\"\"\n\"\n");

        assert_eq!(
            decoder.decode(),
            Some(Bytes::from_static(b"\"say \"\"hi\"\"\n\""))
        );
    }

    #[test]
    fn test_decode_apostrophe_in_plain_text() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"O'Brien Instruments,PSU-1,0,1.0\n");

        assert_eq!(
            decoder.decode(),
            Some(Bytes::from_static(b"O'Brien Instruments,PSU-1,0,1.0"))
        );
    }

    #[test]
    fn test_decode_inch_mark_in_plain_text() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"ACME,12\" Display,0,1.0\nNEXT\n");

        assert_eq!(
            decoder.decode(),
            Some(Bytes::from_static(b"ACME,12\" Display,0,1.0"))
        );
        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"NEXT")));
    }

    #[test]
    fn test_decode_hex_numeric_is_not_a_block() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"#H1F\n");

        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"#H1F")));
    }

    #[test]
    fn test_decode_indefinite_block() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"#0abc\n");

        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"#0abc")));
    }

    #[test]
    fn test_custom_terminator() {
        let mut decoder = LineDecoder::with_terminator(b'\r');
        decoder.feed(b"OK\rNEXT");

        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"OK")));
        assert_eq!(decoder.buffered(), 4);
    }

    #[test]
    fn test_clear() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"stale half resp");
        decoder.clear();
        decoder.feed(b"fresh\n");

        assert_eq!(decoder.decode(), Some(Bytes::from_static(b"fresh")));
    }
}
