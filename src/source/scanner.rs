//! Low-level source cursor used by the tokenizer.
//!
//! The scanner walks a source buffer byte by byte while tracking the current
//! `(line, character)` position, counting characters in either UTF-8 or
//! UTF-16 code units. It splices GLSL line continuations (`\` immediately
//! followed by a newline) transparently, so the tokenizer above it never sees
//! them.

use super::position::{TextPosition, TextRange};

pub struct SourceScanner<'s> {
    source: &'s [u8],
    cursor: usize,
    line: u32,
    character: u32,
    count_utf16: bool,
}

impl<'s> SourceScanner<'s> {
    pub fn new(source: &'s str, count_utf16: bool) -> Self {
        let mut scanner = SourceScanner {
            source: source.as_bytes(),
            cursor: 0,
            line: 0,
            character: 0,
            count_utf16,
        };
        // A UTF-8 BOM is tolerated and skipped without affecting positions.
        if scanner.source.starts_with(&[0xEF, 0xBB, 0xBF]) {
            scanner.cursor = 3;
        }
        scanner
    }

    pub fn at_begin(&self) -> bool {
        self.cursor == 0 || (self.cursor == 3 && self.source.starts_with(&[0xEF, 0xBB, 0xBF]))
    }

    pub fn at_end(&self) -> bool {
        self.cursor >= self.source.len()
    }

    pub fn position(&self) -> TextPosition {
        TextPosition::new(self.line, self.character)
    }

    /// Skip spaces, tabs, carriage returns, and newlines. Sets
    /// `skipped_whitespace` if anything was consumed and `skipped_newline` if
    /// a line break was crossed; the tokenizer derives its two token flags
    /// from these.
    pub fn skip_whitespace(&mut self, skipped_whitespace: &mut bool, skipped_newline: &mut bool) {
        while let Some(byte) = self.peek_byte() {
            match byte {
                b' ' | b'\t' | b'\r' => {
                    self.character += 1;
                    self.cursor += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.character = 0;
                    self.cursor += 1;
                    *skipped_newline = true;
                }
                _ => break,
            }
            *skipped_whitespace = true;
        }
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.source.get(self.cursor).copied()
    }

    pub fn peek_byte_at(&self, lookahead: usize) -> Option<u8> {
        self.source.get(self.cursor + lookahead).copied()
    }

    /// Consume one character, appending it to `buffer`, and splice any line
    /// continuation that follows.
    pub fn consume_char(&mut self, buffer: &mut String) -> Option<char> {
        let ch = self.decode_char()?;
        buffer.push(ch);
        self.advance_past(ch);
        self.skip_line_continuation();
        Some(ch)
    }

    /// Consume one character without recording its text.
    pub fn skip_char(&mut self) -> Option<char> {
        let ch = self.decode_char()?;
        self.advance_past(ch);
        self.skip_line_continuation();
        Some(ch)
    }

    /// Consume `ch` if it is next. ASCII only.
    pub fn try_consume_ascii(&mut self, ch: u8, buffer: &mut String) -> bool {
        debug_assert!(ch.is_ascii());
        if self.peek_byte() == Some(ch) {
            buffer.push(ch as char);
            self.advance_past(ch as char);
            self.skip_line_continuation();
            true
        } else {
            false
        }
    }

    /// Consume `text` if the upcoming bytes match it exactly. ASCII only; the
    /// consumed text is not recorded.
    pub fn try_consume_ascii_text(&mut self, text: &str) -> bool {
        let bytes = text.as_bytes();
        if self.source[self.cursor..].starts_with(bytes) {
            for &b in bytes {
                self.advance_past(b as char);
            }
            self.skip_line_continuation();
            true
        } else {
            false
        }
    }

    /// Range covering a single already-known span from `start` to here.
    pub fn range_from(&self, start: TextPosition) -> TextRange {
        TextRange::new(start, self.position())
    }

    fn decode_char(&self) -> Option<char> {
        if self.at_end() {
            return None;
        }
        // The buffer is valid UTF-8 (it came from a &str), so decoding the
        // remainder cannot fail.
        std::str::from_utf8(&self.source[self.cursor..])
            .ok()
            .and_then(|s| s.chars().next())
    }

    fn advance_past(&mut self, ch: char) {
        self.cursor += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.character = 0;
        } else if self.count_utf16 {
            self.character += ch.len_utf16() as u32;
        } else {
            self.character += ch.len_utf8() as u32;
        }
    }

    fn skip_line_continuation(&mut self) {
        loop {
            if self.peek_byte() == Some(b'\\') && self.peek_byte_at(1) == Some(b'\n') {
                self.cursor += 2;
            } else if self.peek_byte() == Some(b'\\')
                && self.peek_byte_at(1) == Some(b'\r')
                && self.peek_byte_at(2) == Some(b'\n')
            {
                self.cursor += 3;
            } else {
                break;
            }
            self.line += 1;
            self.character = 0;
        }
    }
}
