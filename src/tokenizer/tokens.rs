//! Token kinds and the pre-preprocessor token record.
//!
//! The whole token vocabulary is declared once in the `define_token_schema!`
//! invocation below: keyword and punctuation entries expand into the
//! [`TokenKind`] enum, the spelling table, and the string-to-kind lookup
//! maps. Adding a keyword is a one-line change here and nowhere else.

use crate::atom::AtomString;
use crate::source::{FileId, TextRange};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

macro_rules! define_token_schema {
    (
        specials { $($sp:ident,)* }
        keywords { $($kw:ident => $kw_text:literal,)* }
        puncts { $($p:ident => $p_text:literal,)* }
    ) => {
        /// The klass of a token, shared between PP tokens and syntax tokens.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum TokenKind {
            $($sp,)*
            $($kw,)*
            $($p,)*
        }

        impl TokenKind {
            /// The fixed spelling of a keyword or punctuation kind.
            pub fn fixed_spelling(self) -> Option<&'static str> {
                match self {
                    $(TokenKind::$kw => Some($kw_text),)*
                    $(TokenKind::$p => Some($p_text),)*
                    _ => None,
                }
            }

            pub fn is_keyword(self) -> bool {
                matches!(self, $(TokenKind::$kw)|*)
            }

            pub fn is_punct(self) -> bool {
                matches!(self, $(TokenKind::$p)|*)
            }
        }

        /// Maps identifier text to its keyword kind.
        pub static KEYWORD_LOOKUP: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
            let mut map = HashMap::new();
            $(map.insert($kw_text, TokenKind::$kw);)*
            map
        });

        /// All punctuation spellings with their kinds, longest first, for
        /// maximal-munch matching in the tokenizer.
        pub static PUNCT_LOOKUP: Lazy<Vec<(&'static str, TokenKind)>> = Lazy::new(|| {
            let mut list = vec![$(($p_text, TokenKind::$p),)*];
            list.sort_by_key(|(text, _)| std::cmp::Reverse(text.len()));
            list
        });
    };
}

define_token_schema! {
    specials {
        Eof,
        Unknown,
        Comment,
        IntegerConstant,
        FloatConstant,
        Identifier,
        UserHeaderName,
        SystemHeaderName,
    }
    keywords {
        KwVoid => "void",
        KwBool => "bool",
        KwInt => "int",
        KwUint => "uint",
        KwFloat => "float",
        KwDouble => "double",
        KwVec2 => "vec2",
        KwVec3 => "vec3",
        KwVec4 => "vec4",
        KwBvec2 => "bvec2",
        KwBvec3 => "bvec3",
        KwBvec4 => "bvec4",
        KwIvec2 => "ivec2",
        KwIvec3 => "ivec3",
        KwIvec4 => "ivec4",
        KwUvec2 => "uvec2",
        KwUvec3 => "uvec3",
        KwUvec4 => "uvec4",
        KwDvec2 => "dvec2",
        KwDvec3 => "dvec3",
        KwDvec4 => "dvec4",
        KwMat2 => "mat2",
        KwMat3 => "mat3",
        KwMat4 => "mat4",
        KwMat2x2 => "mat2x2",
        KwMat2x3 => "mat2x3",
        KwMat2x4 => "mat2x4",
        KwMat3x2 => "mat3x2",
        KwMat3x3 => "mat3x3",
        KwMat3x4 => "mat3x4",
        KwMat4x2 => "mat4x2",
        KwMat4x3 => "mat4x3",
        KwMat4x4 => "mat4x4",
        KwDmat2 => "dmat2",
        KwDmat3 => "dmat3",
        KwDmat4 => "dmat4",
        KwSampler1D => "sampler1D",
        KwSampler2D => "sampler2D",
        KwSampler3D => "sampler3D",
        KwSamplerCube => "samplerCube",
        KwSampler2DRect => "sampler2DRect",
        KwSamplerBuffer => "samplerBuffer",
        KwSampler1DArray => "sampler1DArray",
        KwSampler2DArray => "sampler2DArray",
        KwSampler2DShadow => "sampler2DShadow",
        KwSamplerCubeShadow => "samplerCubeShadow",
        KwConst => "const",
        KwIn => "in",
        KwOut => "out",
        KwInout => "inout",
        KwUniform => "uniform",
        KwBuffer => "buffer",
        KwShared => "shared",
        KwLayout => "layout",
        KwCentroid => "centroid",
        KwFlat => "flat",
        KwSmooth => "smooth",
        KwNoperspective => "noperspective",
        KwPatch => "patch",
        KwSample => "sample",
        KwInvariant => "invariant",
        KwPrecise => "precise",
        KwCoherent => "coherent",
        KwVolatile => "volatile",
        KwRestrict => "restrict",
        KwReadonly => "readonly",
        KwWriteonly => "writeonly",
        KwHighp => "highp",
        KwMediump => "mediump",
        KwLowp => "lowp",
        KwPrecision => "precision",
        KwStruct => "struct",
        KwIf => "if",
        KwElse => "else",
        KwFor => "for",
        KwWhile => "while",
        KwDo => "do",
        KwSwitch => "switch",
        KwCase => "case",
        KwDefault => "default",
        KwBreak => "break",
        KwContinue => "continue",
        KwReturn => "return",
        KwDiscard => "discard",
        KwTrue => "true",
        KwFalse => "false",
    }
    puncts {
        LParen => "(",
        RParen => ")",
        LBracket => "[",
        RBracket => "]",
        LBrace => "{",
        RBrace => "}",
        Dot => ".",
        Comma => ",",
        Colon => ":",
        Semicolon => ";",
        Question => "?",
        Hash => "#",
        Assign => "=",
        Plus => "+",
        Dash => "-",
        Bang => "!",
        Tilde => "~",
        Star => "*",
        Slash => "/",
        Percent => "%",
        LAngle => "<",
        RAngle => ">",
        VerticalBar => "|",
        Caret => "^",
        Ampersand => "&",
        LShift => "<<",
        RShift => ">>",
        LessEq => "<=",
        GreaterEq => ">=",
        Equal => "==",
        NotEqual => "!=",
        AndAnd => "&&",
        OrOr => "||",
        XorXor => "^^",
        AddAssign => "+=",
        SubAssign => "-=",
        MulAssign => "*=",
        DivAssign => "/=",
        ModAssign => "%=",
        LShiftAssign => "<<=",
        RShiftAssign => ">>=",
        AndAssign => "&=",
        XorAssign => "^=",
        OrAssign => "|=",
        Increment => "++",
        Decrement => "--",
    }
}

/// A token produced by the tokenizer, before preprocessing. Positions are
/// where the bytes physically live (`spelled`); the expanded position is
/// assigned later by the preprocessor when the token reaches the final
/// stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PpToken {
    pub kind: TokenKind,
    pub spelled_file: FileId,
    pub spelled_range: TextRange,
    pub text: AtomString,
    pub is_first_token_of_line: bool,
    pub has_leading_whitespace: bool,
}

impl PpToken {
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_round_trips() {
        for (&text, &kind) in KEYWORD_LOOKUP.iter() {
            assert_eq!(kind.fixed_spelling(), Some(text));
            assert!(kind.is_keyword());
        }
        assert_eq!(KEYWORD_LOOKUP.get("vec3"), Some(&TokenKind::KwVec3));
        assert_eq!(KEYWORD_LOOKUP.get("not_a_keyword"), None);
    }

    #[test]
    fn punct_lookup_is_longest_first() {
        let lengths: Vec<usize> = PUNCT_LOOKUP.iter().map(|(text, _)| text.len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
        assert!(PUNCT_LOOKUP
            .iter()
            .any(|&(text, kind)| text == "<<=" && kind == TokenKind::LShiftAssign));
    }

    #[test]
    fn specials_have_no_fixed_spelling() {
        assert_eq!(TokenKind::Identifier.fixed_spelling(), None);
        assert_eq!(TokenKind::Eof.fixed_spelling(), None);
    }
}
