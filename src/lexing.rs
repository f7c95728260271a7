//! The final token stream of a translation unit.
//!
//! The preprocessor registers every fully-preprocessed token here as a
//! [`RawSyntaxToken`], which keeps both the token's spelled range (where the
//! bytes physically live) and its expanded range (where the token logically
//! appears in the main file after macro and include expansion). AST nodes
//! refer into this stream by dense [`SyntaxTokenId`]s.
//!
//! A context can layer over a frozen preamble context: preamble tokens keep
//! their ids and the invocation's tokens continue after them.

use crate::atom::AtomString;
use crate::source::{FileId, TextRange};
use crate::tokenizer::{PpToken, TokenKind};
use serde::Serialize;
use std::sync::Arc;

/// Dense index into the expanded token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SyntaxTokenId(pub u32);

impl SyntaxTokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A half-open range `[begin, end)` of syntax tokens covered by an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AstSyntaxRange {
    pub begin: SyntaxTokenId,
    pub end: SyntaxTokenId,
}

impl AstSyntaxRange {
    pub fn new(begin: SyntaxTokenId, end: SyntaxTokenId) -> Self {
        debug_assert!(begin <= end);
        AstSyntaxRange { begin, end }
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// One token of the expanded stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSyntaxToken {
    pub kind: TokenKind,
    pub text: AtomString,
    pub spelled_file: FileId,
    pub spelled_range: TextRange,
    pub expanded_range: TextRange,
}

#[derive(Debug, Default)]
pub struct LexContext {
    base: Option<Arc<LexContext>>,
    base_len: u32,
    tokens: Vec<RawSyntaxToken>,
    tu_start: u32,
}

impl LexContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layered(base: Arc<LexContext>) -> Self {
        let base_len = base.token_count() as u32;
        LexContext {
            base: Some(base),
            base_len,
            tokens: Vec::new(),
            tu_start: base_len,
        }
    }

    /// Register one final token. Returns its id.
    pub fn add_token(&mut self, token: &PpToken, expanded_range: TextRange) -> SyntaxTokenId {
        let id = SyntaxTokenId(self.base_len + self.tokens.len() as u32);
        self.tokens.push(RawSyntaxToken {
            kind: token.kind,
            text: token.text,
            spelled_file: token.spelled_file,
            spelled_range: token.spelled_range,
            expanded_range,
        });
        id
    }

    /// Mark the current end of the stream as the start of the main-file TU
    /// view. Called by the compiler right before the main file is fed in.
    pub fn mark_tu_start(&mut self) {
        self.tu_start = self.base_len + self.tokens.len() as u32;
    }

    pub fn token_count(&self) -> usize {
        self.base_len as usize + self.tokens.len()
    }

    pub fn get_token(&self, id: SyntaxTokenId) -> RawSyntaxToken {
        if id.0 < self.base_len {
            return self
                .base
                .as_ref()
                .expect("token id below base length without a base context")
                .get_token(id);
        }
        let local = (id.0 - self.base_len) as usize;
        if local < self.tokens.len() {
            self.tokens[local]
        } else {
            // Reading past the end yields the final token, which is Eof in
            // any completed stream.
            *self.tokens.last().expect("empty lex context")
        }
    }

    pub fn lookup_spelled_range(&self, id: SyntaxTokenId) -> (FileId, TextRange) {
        let tok = self.get_token(id);
        (tok.spelled_file, tok.spelled_range)
    }

    pub fn lookup_expanded_range(&self, id: SyntaxTokenId) -> TextRange {
        self.get_token(id).expanded_range
    }

    pub fn lookup_file(&self, id: SyntaxTokenId) -> FileId {
        self.get_token(id).spelled_file
    }

    /// Ids of the translation-unit view: tokens of the user file, excluding
    /// everything lexed for preambles.
    pub fn tu_token_ids(&self) -> impl Iterator<Item = SyntaxTokenId> + '_ {
        (self.tu_start..self.token_count() as u32).map(SyntaxTokenId)
    }

    pub fn tu_start(&self) -> SyntaxTokenId {
        SyntaxTokenId(self.tu_start)
    }

    pub fn end(&self) -> SyntaxTokenId {
        SyntaxTokenId(self.token_count() as u32)
    }

    /// Syntax range spanning `[begin, end)` token indices.
    pub fn syntax_range(&self, begin: SyntaxTokenId, end: SyntaxTokenId) -> AstSyntaxRange {
        AstSyntaxRange::new(begin, end)
    }

    /// The source-position range covered by a syntax range, in expanded
    /// (main-file) coordinates.
    pub fn expanded_range_of(&self, range: AstSyntaxRange) -> TextRange {
        if range.is_empty() {
            TextRange::point(self.lookup_expanded_range(range.begin).start)
        } else {
            let start = self.lookup_expanded_range(range.begin).start;
            let end = self.lookup_expanded_range(SyntaxTokenId(range.end.0 - 1)).end;
            TextRange { start, end }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomTable;
    use crate::source::TextPosition;

    fn token(atoms: &mut AtomTable, text: &str, line: u32, col: u32) -> PpToken {
        let start = TextPosition::new(line, col);
        let end = TextPosition::new(line, col + text.len() as u32);
        PpToken {
            kind: TokenKind::Identifier,
            spelled_file: FileId::SYSTEM_PREAMBLE,
            spelled_range: TextRange::new(start, end),
            text: atoms.get_atom(text),
            is_first_token_of_line: false,
            has_leading_whitespace: false,
        }
    }

    #[test]
    fn ids_are_dense_and_stable() {
        let mut atoms = AtomTable::new();
        let mut lex = LexContext::new();
        let t0 = token(&mut atoms, "a", 0, 0);
        let t1 = token(&mut atoms, "b", 0, 2);
        let id0 = lex.add_token(&t0, t0.spelled_range);
        let id1 = lex.add_token(&t1, t1.spelled_range);
        assert_eq!(id0, SyntaxTokenId(0));
        assert_eq!(id1, SyntaxTokenId(1));
        assert_eq!(lex.get_token(id1).text, t1.text);
    }

    #[test]
    fn layered_context_continues_ids() {
        let mut atoms = AtomTable::new();
        let mut base = LexContext::new();
        let t0 = token(&mut atoms, "sin", 0, 0);
        base.add_token(&t0, t0.spelled_range);
        let base = Arc::new(base);

        let mut layered = LexContext::layered(base);
        let t1 = token(&mut atoms, "x", 1, 0);
        let id = layered.add_token(&t1, t1.spelled_range);
        assert_eq!(id, SyntaxTokenId(1));
        assert_eq!(layered.get_token(SyntaxTokenId(0)).text, t0.text);
        assert_eq!(layered.tu_start(), SyntaxTokenId(1));
    }

    #[test]
    fn tu_view_excludes_preamble_tokens() {
        let mut atoms = AtomTable::new();
        let mut lex = LexContext::new();
        let t0 = token(&mut atoms, "preamble", 0, 0);
        lex.add_token(&t0, t0.spelled_range);
        lex.mark_tu_start();
        let t1 = token(&mut atoms, "main", 0, 0);
        lex.add_token(&t1, t1.spelled_range);
        let ids: Vec<_> = lex.tu_token_ids().collect();
        assert_eq!(ids, vec![SyntaxTokenId(1)]);
    }
}
