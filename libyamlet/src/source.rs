//! Character source: buffered UTF-8 decoding with arbitrary lookahead.
//!
//! The tokenizer pulls characters through [`CharSource::peek`] and
//! [`CharSource::read`]. End of stream is `Ok(None)`, never an error. Bytes
//! are decoded a reader buffer at a time into a ring of characters, so peeks
//! and reads are amortized O(1).

use crate::error::{ParseError, Result};
use std::collections::VecDeque;
use std::io::{BufRead, ErrorKind};

const BOM: char = '\u{feff}';

/// A character stream over any buffered reader.
pub struct CharSource<R> {
    reader: R,
    buffer: VecDeque<char>,
    eof: bool,
    started: bool,
    line: usize,
    col: usize,
}

impl<R: BufRead> CharSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: VecDeque::new(),
            eof: false,
            started: false,
            line: 0,
            col: 0,
        }
    }

    /// Zero-based line and column of the next character to be read.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.col)
    }

    /// Returns the character `n` positions ahead without consuming it.
    pub fn peek(&mut self, n: usize) -> Result<Option<char>> {
        self.fill(n + 1)?;
        Ok(self.buffer.get(n).copied())
    }

    /// Consumes and returns the next character.
    pub fn read(&mut self) -> Result<Option<char>> {
        self.fill(2)?;
        let Some(ch) = self.buffer.pop_front() else {
            return Ok(None);
        };
        match ch {
            '\n' => {
                self.line += 1;
                self.col = 0;
            }
            // A lone CR ends a line; in CRLF the LF does.
            '\r' if self.buffer.front() != Some(&'\n') => {
                self.line += 1;
                self.col = 0;
            }
            _ => self.col += 1,
        }
        Ok(Some(ch))
    }

    /// Buffer at least `want` characters unless the reader is exhausted.
    fn fill(&mut self, want: usize) -> Result<()> {
        while self.buffer.len() < want && !self.eof {
            if !read_utf8_buffered(&mut self.reader, &mut self.buffer)? {
                self.eof = true;
            }
            if !self.started && !self.buffer.is_empty() {
                self.started = true;
                if self.buffer.front() == Some(&BOM) {
                    self.buffer.pop_front();
                }
            }
        }
        Ok(())
    }
}

/// Decode one reader buffer's worth of UTF-8 into `out`. Returns `false` at
/// end of input.
fn read_utf8_buffered<R: BufRead>(reader: &mut R, out: &mut VecDeque<char>) -> Result<bool> {
    let available = loop {
        match reader.fill_buf() {
            Ok([]) => return Ok(false),
            Ok(available) => break available,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };

    match std::str::from_utf8(available) {
        Ok(valid) => {
            let used = valid.len();
            out.extend(valid.chars());
            reader.consume(used);
            Ok(true)
        }
        Err(err) => {
            let valid_bytes = err.valid_up_to();
            if err.error_len().is_some() {
                return Err(ParseError::InvalidUtf8(String::new()));
            }
            if valid_bytes != 0 {
                // Leave the incomplete tail for the next fill.
                let valid = std::str::from_utf8(&available[..valid_bytes])
                    .map_err(|_| ParseError::InvalidUtf8(String::new()))?;
                out.extend(valid.chars());
                reader.consume(valid_bytes);
                Ok(true)
            } else {
                let initial = available[0];
                read_utf8_char_unbuffered(reader, out, initial)?;
                Ok(true)
            }
        }
    }
}

/// Read a single character whose encoding straddles the reader's buffer
/// boundary.
fn read_utf8_char_unbuffered<R: BufRead>(
    reader: &mut R,
    out: &mut VecDeque<char>,
    initial: u8,
) -> Result<()> {
    let width = utf8_char_width(initial);
    if width == 0 {
        return Err(ParseError::InvalidUtf8(String::new()));
    }
    let mut buffer = [0; 4];
    reader.read_exact(&mut buffer[..width]).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            ParseError::InvalidUtf8(String::new())
        } else {
            err.into()
        }
    })?;
    let ch = std::str::from_utf8(&buffer[..width])
        .ok()
        .and_then(|valid| valid.chars().next())
        .ok_or_else(|| ParseError::InvalidUtf8(String::new()))?;
    out.push_back(ch);
    Ok(())
}

fn utf8_char_width(initial: u8) -> usize {
    match initial {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn drain<R: BufRead>(mut source: CharSource<R>) -> String {
        let mut out = String::new();
        while let Some(ch) = source.read().unwrap() {
            out.push(ch);
        }
        out
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut source = CharSource::new("ab".as_bytes());
        assert_eq!(source.peek(1).unwrap(), Some('b'));
        assert_eq!(source.peek(0).unwrap(), Some('a'));
        assert_eq!(source.read().unwrap(), Some('a'));
        assert_eq!(source.read().unwrap(), Some('b'));
        assert_eq!(source.peek(0).unwrap(), None);
        assert_eq!(source.read().unwrap(), None);
        assert_eq!(source.read().unwrap(), None);
    }

    #[test]
    fn test_multibyte_across_tiny_buffer() {
        // A one-byte buffer forces every multibyte character through the
        // unbuffered path.
        let text = "h\u{e9}llo \u{1f600} \u{4e16}";
        let reader = BufReader::with_capacity(1, text.as_bytes());
        assert_eq!(drain(CharSource::new(reader)), text);
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let mut source = CharSource::new(&b"ok\xff"[..]);
        assert!(matches!(source.peek(3), Err(ParseError::InvalidUtf8(_))));
    }

    #[test]
    fn test_truncated_sequence_is_an_error() {
        let reader = BufReader::with_capacity(1, &b"a\xe4\xb8"[..]);
        let mut source = CharSource::new(reader);
        let err = loop {
            match source.read() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("truncated input decoded cleanly"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, ParseError::InvalidUtf8(_)));
    }

    #[test]
    fn test_leading_bom_is_skipped() {
        assert_eq!(drain(CharSource::new("\u{feff}a: 1".as_bytes())), "a: 1");
    }

    #[test]
    fn test_position_tracks_lines() {
        let mut source = CharSource::new("a\r\nb\rc\nd".as_bytes());
        let mut positions = Vec::new();
        while source.peek(0).unwrap().is_some() {
            positions.push(source.position());
            source.read().unwrap();
        }
        assert_eq!(
            positions,
            [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (2, 0), (2, 1), (3, 0)]
        );
    }
}
