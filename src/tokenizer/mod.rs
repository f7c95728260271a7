//! GLSL pre-preprocessor tokenizer.
//!
//! Converts one source buffer into a stream of [`PpToken`]s: numeric
//! constants, identifiers and keywords, punctuation, and (only while the
//! preprocessor is handling an `#include` tail) header names. Comments are
//! consumed here and become no token at all; they only contribute to the
//! `has_leading_whitespace` flag of the token that follows. Unknown bytes
//! consume exactly one character and produce an `Unknown` token, so the
//! tokenizer always makes forward progress.

pub mod tokens;

pub use tokens::{PpToken, TokenKind, KEYWORD_LOOKUP, PUNCT_LOOKUP};

use crate::atom::AtomTable;
use crate::diagnostics::DiagnosticStream;
use crate::source::{FileId, SourceScanner, TextRange};

pub struct Tokenizer<'s> {
    file: FileId,
    scanner: SourceScanner<'s>,
    buffer: String,
}

impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str, file: FileId, count_utf16: bool) -> Self {
        Tokenizer {
            file,
            scanner: SourceScanner::new(source, count_utf16),
            buffer: String::new(),
        }
    }

    /// Lex the next PP token. `lex_header_name` is set by the preprocessor
    /// only while it expects the tail of an `#include` directive.
    pub fn next_token(
        &mut self,
        atoms: &mut AtomTable,
        diags: &mut DiagnosticStream,
        lex_header_name: bool,
    ) -> PpToken {
        let mut skipped_whitespace = false;
        let mut skipped_newline = self.scanner.at_begin();

        loop {
            self.scanner.skip_whitespace(&mut skipped_whitespace, &mut skipped_newline);

            if self.scanner.at_end() {
                // EOF is always regarded as starting a new line.
                return PpToken {
                    kind: TokenKind::Eof,
                    spelled_file: self.file,
                    spelled_range: TextRange::point(self.scanner.position()),
                    text: crate::atom::AtomString::EMPTY,
                    is_first_token_of_line: true,
                    has_leading_whitespace: true,
                };
            }

            let begin = self.scanner.position();
            self.buffer.clear();

            // Comments vanish from the stream but count as whitespace.
            if self.scanner.try_consume_ascii_text("//") {
                self.skip_line_comment();
                skipped_whitespace = true;
                continue;
            }
            if self.scanner.try_consume_ascii_text("/*") {
                if !self.skip_block_comment() {
                    diags.error_at_spelled(
                        self.file,
                        self.scanner.range_from(begin),
                        "unterminated block comment",
                    );
                }
                skipped_whitespace = true;
                continue;
            }

            let kind = if lex_header_name && self.scanner.try_consume_ascii(b'"', &mut self.buffer) {
                self.lex_header_name(b'"', TokenKind::UserHeaderName)
            } else if lex_header_name && self.scanner.try_consume_ascii(b'<', &mut self.buffer) {
                self.lex_header_name(b'>', TokenKind::SystemHeaderName)
            } else {
                self.lex_regular_token()
            };

            let text = atoms.get_atom(&self.buffer);
            return PpToken {
                kind,
                spelled_file: self.file,
                spelled_range: self.scanner.range_from(begin),
                text,
                is_first_token_of_line: skipped_newline,
                has_leading_whitespace: skipped_whitespace,
            };
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(byte) = self.scanner.peek_byte() {
            if byte == b'\n' {
                break;
            }
            self.scanner.skip_char();
        }
    }

    /// Returns false if the comment ran off the end of the buffer.
    fn skip_block_comment(&mut self) -> bool {
        while !self.scanner.at_end() {
            if self.scanner.try_consume_ascii_text("*/") {
                return true;
            }
            self.scanner.skip_char();
        }
        false
    }

    /// Header names keep their quote characters in the token text. An
    /// unterminated name ends at the newline as `Unknown`.
    fn lex_header_name(&mut self, close: u8, kind: TokenKind) -> TokenKind {
        while let Some(byte) = self.scanner.peek_byte() {
            if byte == b'\n' {
                break;
            }
            if self.scanner.try_consume_ascii(close, &mut self.buffer) {
                return kind;
            }
            self.scanner.consume_char(&mut self.buffer);
        }
        TokenKind::Unknown
    }

    fn lex_regular_token(&mut self) -> TokenKind {
        let first = self.scanner.peek_byte().unwrap_or(0);

        if first.is_ascii_digit()
            || (first == b'.' && self.scanner.peek_byte_at(1).is_some_and(|b| b.is_ascii_digit()))
        {
            return self.lex_number();
        }

        if first == b'_' || first.is_ascii_alphabetic() {
            while let Some(byte) = self.scanner.peek_byte() {
                if byte == b'_' || byte.is_ascii_alphanumeric() {
                    self.scanner.consume_char(&mut self.buffer);
                } else {
                    break;
                }
            }
            return KEYWORD_LOOKUP.get(self.buffer.as_str()).copied().unwrap_or(TokenKind::Identifier);
        }

        for &(text, kind) in PUNCT_LOOKUP.iter() {
            if self.scanner.try_consume_ascii_text(text) {
                self.buffer.push_str(text);
                return kind;
            }
        }

        // Consume one character to guarantee forward progress.
        self.scanner.consume_char(&mut self.buffer);
        TokenKind::Unknown
    }

    fn lex_number(&mut self) -> TokenKind {
        let mut is_float = false;

        if self.scanner.peek_byte() == Some(b'0')
            && matches!(self.scanner.peek_byte_at(1), Some(b'x') | Some(b'X'))
        {
            self.scanner.consume_char(&mut self.buffer);
            self.scanner.consume_char(&mut self.buffer);
            while self.scanner.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.scanner.consume_char(&mut self.buffer);
            }
            self.consume_integer_suffix();
            return TokenKind::IntegerConstant;
        }

        while self.scanner.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
            self.scanner.consume_char(&mut self.buffer);
        }

        if self.scanner.peek_byte() == Some(b'.') {
            is_float = true;
            self.scanner.consume_char(&mut self.buffer);
            while self.scanner.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                self.scanner.consume_char(&mut self.buffer);
            }
        }

        if matches!(self.scanner.peek_byte(), Some(b'e') | Some(b'E')) {
            let sign_offset = match self.scanner.peek_byte_at(1) {
                Some(b'+') | Some(b'-') => 1,
                _ => 0,
            };
            if self.scanner.peek_byte_at(1 + sign_offset).is_some_and(|b| b.is_ascii_digit()) {
                is_float = true;
                for _ in 0..(1 + sign_offset) {
                    self.scanner.consume_char(&mut self.buffer);
                }
                while self.scanner.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                    self.scanner.consume_char(&mut self.buffer);
                }
            }
        }

        if is_float {
            // f/F single-precision and lf/LF double-precision suffixes.
            match self.scanner.peek_byte() {
                Some(b'f') | Some(b'F') => {
                    self.scanner.consume_char(&mut self.buffer);
                }
                Some(b'l') | Some(b'L')
                    if matches!(self.scanner.peek_byte_at(1), Some(b'f') | Some(b'F')) =>
                {
                    self.scanner.consume_char(&mut self.buffer);
                    self.scanner.consume_char(&mut self.buffer);
                }
                _ => {}
            }
            TokenKind::FloatConstant
        } else {
            // An integer-looking constant may still be a float via `1f`.
            match self.scanner.peek_byte() {
                Some(b'f') | Some(b'F') => {
                    self.scanner.consume_char(&mut self.buffer);
                    return TokenKind::FloatConstant;
                }
                Some(b'l') | Some(b'L')
                    if matches!(self.scanner.peek_byte_at(1), Some(b'f') | Some(b'F')) =>
                {
                    self.scanner.consume_char(&mut self.buffer);
                    self.scanner.consume_char(&mut self.buffer);
                    return TokenKind::FloatConstant;
                }
                _ => {}
            }
            self.consume_integer_suffix();
            TokenKind::IntegerConstant
        }
    }

    fn consume_integer_suffix(&mut self) {
        if matches!(self.scanner.peek_byte(), Some(b'u') | Some(b'U')) {
            self.scanner.consume_char(&mut self.buffer);
        }
    }
}
