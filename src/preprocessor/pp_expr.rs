//! `#if` / `#elif` controlling-expression evaluation.
//!
//! The expression is a C-style constant integer expression over the
//! directive's PP tokens. `defined` operators are resolved first (they must
//! see macro names unexpanded), the rest of the tokens are macro-expanded,
//! and the result is evaluated over `i64` with precedence climbing.
//! Unknown identifiers evaluate to 0.

use crate::preprocessor::macros::{expand_tokens_to_vec, ExpansionEnv, ExpansionSink};
use crate::tokenizer::{PpToken, TokenKind};

/// Evaluate a directive's controlling expression. `None` means the
/// expression was malformed (the caller diagnoses and treats the branch as
/// inactive). Macro-use events fire through `events`.
pub fn evaluate_pp_expression(
    env: &mut ExpansionEnv<'_>,
    events: &mut dyn ExpansionSink,
    tokens: &[PpToken],
) -> Option<bool> {
    let resolved = resolve_defined_operators(env, tokens)?;
    let expanded = expand_tokens_to_vec(env, events, &resolved);
    let mut parser = PpExprParser { env, tokens: &expanded, cursor: 0 };
    let value = parser.parse_expr(0)?;
    if parser.cursor != parser.tokens.len() {
        return None;
    }
    Some(value != 0)
}

/// Replace `defined NAME` / `defined(NAME)` with an integer token value
/// before macro expansion. Implemented by substituting a synthetic
/// integer-constant token carrying the spelled range of the operator.
fn resolve_defined_operators(env: &mut ExpansionEnv<'_>, tokens: &[PpToken]) -> Option<Vec<PpToken>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        if tok.kind == TokenKind::Identifier && env.atoms.resolve(tok.text) == "defined" {
            let (name_tok, consumed) = if tokens.get(i + 1).map(|t| t.kind) == Some(TokenKind::LParen) {
                let name = *tokens.get(i + 2)?;
                if tokens.get(i + 3).map(|t| t.kind) != Some(TokenKind::RParen) {
                    return None;
                }
                (name, 4)
            } else {
                (*tokens.get(i + 1)?, 2)
            };
            if name_tok.kind != TokenKind::Identifier {
                return None;
            }
            out.push(synthetic_int(&tok, env.macros.is_defined(name_tok.text)));
            i += consumed;
        } else {
            out.push(tok);
            i += 1;
        }
    }
    Some(out)
}

fn synthetic_int(at: &PpToken, value: bool) -> PpToken {
    PpToken {
        // The token kind carries the value; the text atom is unused by the
        // evaluator for these two fixed spellings.
        kind: if value { TokenKind::KwTrue } else { TokenKind::KwFalse },
        ..*at
    }
}

struct PpExprParser<'a, 'e> {
    env: &'a mut ExpansionEnv<'e>,
    tokens: &'a [PpToken],
    cursor: usize,
}

impl PpExprParser<'_, '_> {
    fn peek(&self) -> Option<&PpToken> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<PpToken> {
        let tok = self.tokens.get(self.cursor).copied();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Option<i64> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = self.peek().and_then(|t| binary_precedence(t.kind)) {
            let (kind, precedence) = op;
            if precedence < min_precedence {
                break;
            }
            self.advance();

            // Ternary is right-associative and parsed here at its own level.
            if kind == TokenKind::Question {
                let true_value = self.parse_expr(0)?;
                if self.advance()?.kind != TokenKind::Colon {
                    return None;
                }
                let false_value = self.parse_expr(precedence)?;
                lhs = if lhs != 0 { true_value } else { false_value };
                continue;
            }

            let rhs = self.parse_expr(precedence + 1)?;
            lhs = apply_binary(kind, lhs, rhs)?;
        }

        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<i64> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Plus => self.parse_unary(),
            TokenKind::Dash => Some(self.parse_unary()?.wrapping_neg()),
            TokenKind::Tilde => Some(!self.parse_unary()?),
            TokenKind::Bang => Some((self.parse_unary()? == 0) as i64),
            TokenKind::LParen => {
                let value = self.parse_expr(0)?;
                if self.advance()?.kind != TokenKind::RParen {
                    return None;
                }
                Some(value)
            }
            TokenKind::IntegerConstant => parse_pp_integer(self.env.atoms.resolve(tok.text)),
            TokenKind::KwTrue => Some(1),
            TokenKind::KwFalse => Some(0),
            // Any identifier that survived macro expansion is unknown: 0.
            TokenKind::Identifier => Some(0),
            // Non-macro keywords behave like unknown identifiers.
            kind if kind.is_keyword() => Some(0),
            _ => None,
        }
    }
}

fn parse_pp_integer(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(['u', 'U']);
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()
    } else {
        digits.parse().ok()
    }
}

fn binary_precedence(kind: TokenKind) -> Option<(TokenKind, u8)> {
    let precedence = match kind {
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 10,
        TokenKind::Plus | TokenKind::Dash => 9,
        TokenKind::LShift | TokenKind::RShift => 8,
        TokenKind::LAngle | TokenKind::RAngle | TokenKind::LessEq | TokenKind::GreaterEq => 7,
        TokenKind::Equal | TokenKind::NotEqual => 6,
        TokenKind::Ampersand => 5,
        TokenKind::Caret => 4,
        TokenKind::VerticalBar => 3,
        TokenKind::AndAnd => 2,
        TokenKind::OrOr => 1,
        TokenKind::Question => 0,
        _ => return None,
    };
    Some((kind, precedence))
}

fn apply_binary(kind: TokenKind, lhs: i64, rhs: i64) -> Option<i64> {
    Some(match kind {
        TokenKind::Star => lhs.wrapping_mul(rhs),
        TokenKind::Slash => {
            if rhs == 0 {
                return None;
            }
            lhs.wrapping_div(rhs)
        }
        TokenKind::Percent => {
            if rhs == 0 {
                return None;
            }
            lhs.wrapping_rem(rhs)
        }
        TokenKind::Plus => lhs.wrapping_add(rhs),
        TokenKind::Dash => lhs.wrapping_sub(rhs),
        TokenKind::LShift => lhs.wrapping_shl(rhs as u32),
        TokenKind::RShift => lhs.wrapping_shr(rhs as u32),
        TokenKind::LAngle => (lhs < rhs) as i64,
        TokenKind::RAngle => (lhs > rhs) as i64,
        TokenKind::LessEq => (lhs <= rhs) as i64,
        TokenKind::GreaterEq => (lhs >= rhs) as i64,
        TokenKind::Equal => (lhs == rhs) as i64,
        TokenKind::NotEqual => (lhs != rhs) as i64,
        TokenKind::Ampersand => lhs & rhs,
        TokenKind::Caret => lhs ^ rhs,
        TokenKind::VerticalBar => lhs | rhs,
        TokenKind::AndAnd => (lhs != 0 && rhs != 0) as i64,
        TokenKind::OrOr => (lhs != 0 || rhs != 0) as i64,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomTable;
    use crate::diagnostics::DiagnosticStream;
    use crate::preprocessor::macros::{MacroRegistry, VecSink};
    use crate::source::FileId;
    use crate::tokenizer::Tokenizer;

    fn eval(expr: &str, setup: impl FnOnce(&mut AtomTable, &mut MacroRegistry)) -> Option<bool> {
        let mut atoms = AtomTable::new();
        let mut macros = MacroRegistry::new();
        setup(&mut atoms, &mut macros);
        let mut diags = DiagnosticStream::new();
        let mut tokenizer = Tokenizer::new(expr, FileId::SYSTEM_PREAMBLE, false);
        let mut tokens = Vec::new();
        loop {
            let tok = tokenizer.next_token(&mut atoms, &mut diags, false);
            if tok.kind == TokenKind::Eof {
                break;
            }
            tokens.push(tok);
        }
        let mut env = ExpansionEnv { macros: &mut macros, diags: &mut diags, atoms: &atoms };
        let mut scratch = Vec::new();
        let mut events = VecSink(&mut scratch);
        evaluate_pp_expression(&mut env, &mut events, &tokens)
    }

    fn eval_plain(expr: &str) -> Option<bool> {
        eval(expr, |_, _| {})
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval_plain("1 + 2 * 3 == 7"), Some(true));
        assert_eq!(eval_plain("(1 + 2) * 3"), Some(true));
        assert_eq!(eval_plain("8 >> 2"), Some(true));
        assert_eq!(eval_plain("1 << 3 != 8"), Some(false));
        assert_eq!(eval_plain("0"), Some(false));
    }

    #[test]
    fn unknown_identifiers_are_zero() {
        assert_eq!(eval_plain("SOME_UNKNOWN_FLAG"), Some(false));
        assert_eq!(eval_plain("SOME_UNKNOWN_FLAG || 1"), Some(true));
    }

    #[test]
    fn defined_operator() {
        use crate::preprocessor::macros::MacroDefinition;
        let with_foo = |atoms: &mut AtomTable, macros: &mut MacroRegistry| {
            let name = atoms.get_atom("FOO");
            let name_token = PpToken {
                kind: TokenKind::Identifier,
                spelled_file: FileId::SYSTEM_PREAMBLE,
                spelled_range: Default::default(),
                text: name,
                is_first_token_of_line: false,
                has_leading_whitespace: false,
            };
            macros.define(name, MacroDefinition::object_like(name_token, Vec::new()));
        };
        assert_eq!(eval("defined(FOO)", with_foo), Some(true));
        assert_eq!(eval("defined FOO", with_foo), Some(true));
        assert_eq!(eval_plain("defined(FOO)"), Some(false));
        assert_eq!(eval_plain("!defined(FOO)"), Some(true));
    }

    #[test]
    fn division_by_zero_is_invalid() {
        assert_eq!(eval_plain("1 / 0"), None);
        assert_eq!(eval_plain("1 % 0"), None);
    }

    #[test]
    fn malformed_expressions_are_invalid() {
        assert_eq!(eval_plain("1 +"), None);
        assert_eq!(eval_plain("(1"), None);
        assert_eq!(eval_plain("1.5"), None);
    }

    #[test]
    fn ternary_selects() {
        assert_eq!(eval_plain("1 ? 2 : 0"), Some(true));
        assert_eq!(eval_plain("0 ? 2 : 0"), Some(false));
    }

    #[test]
    fn integer_bases() {
        assert_eq!(eval_plain("0x10 == 16"), Some(true));
        assert_eq!(eval_plain("010 == 8"), Some(true));
        assert_eq!(eval_plain("2u == 2"), Some(true));
    }
}
