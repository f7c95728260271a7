//! Macro definitions and the rescan-driven expansion engine.
//!
//! Expansion is recursive and feedback-driven: tokens are fed in one at a
//! time, replacement lists are replayed back through the same feeder so that
//! nested macro uses expand, and a per-macro disabled flag prevents a macro
//! from expanding inside its own rescan. Function-like macro arguments are
//! fully expanded through a fresh nested expander before substitution.

use crate::atom::{AtomString, AtomTable};
use crate::diagnostics::DiagnosticStream;
use crate::source::TextRange;
use crate::tokenizer::{PpToken, TokenKind};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub is_function_like: bool,
    pub name_token: PpToken,
    pub param_names: Vec<AtomString>,
    pub replacement: Vec<PpToken>,
    disabled: bool,
}

impl MacroDefinition {
    pub fn object_like(name_token: PpToken, replacement: Vec<PpToken>) -> Self {
        MacroDefinition {
            is_function_like: false,
            name_token,
            param_names: Vec::new(),
            replacement,
            disabled: false,
        }
    }

    pub fn function_like(
        name_token: PpToken,
        param_names: Vec<AtomString>,
        replacement: Vec<PpToken>,
    ) -> Self {
        MacroDefinition {
            is_function_like: true,
            name_token,
            param_names,
            replacement,
            disabled: false,
        }
    }
}

/// All macros known to one preprocessing run.
#[derive(Debug, Default, Clone)]
pub struct MacroRegistry {
    macros: HashMap<AtomString, MacroDefinition>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous definition if `name` was already defined.
    pub fn define(&mut self, name: AtomString, def: MacroDefinition) -> Option<MacroDefinition> {
        self.macros.insert(name, def)
    }

    /// Returns true if a definition was removed.
    pub fn undef(&mut self, name: AtomString) -> bool {
        self.macros.remove(&name).is_some()
    }

    pub fn is_defined(&self, name: AtomString) -> bool {
        self.macros.contains_key(&name)
    }

    pub fn find_enabled(&self, name: AtomString) -> Option<&MacroDefinition> {
        self.macros.get(&name).filter(|def| !def.disabled)
    }

    fn set_disabled(&mut self, name: AtomString, disabled: bool) {
        if let Some(def) = self.macros.get_mut(&name) {
            debug_assert_ne!(def.disabled, disabled);
            def.disabled = disabled;
        }
    }
}

/// Mutable context threaded through an expansion.
pub struct ExpansionEnv<'a> {
    pub macros: &'a mut MacroRegistry,
    pub diags: &'a mut DiagnosticStream,
    pub atoms: &'a AtomTable,
}

/// Receives expansion output and events.
///
/// `expansion_range` is set on tokens that came out of a macro body: the
/// point range at the outermost macro use, which becomes the token's
/// expanded position in the final stream.
pub trait ExpansionSink {
    fn yield_token(&mut self, token: &PpToken, expansion_range: Option<TextRange>);

    /// A macro use is being entered. Forwarded up so the preprocessor
    /// callback sees uses inside arguments and nested rescans too.
    fn macro_expanded(&mut self, macro_use: &PpToken) {
        let _ = macro_use;
    }
}

/// Collects expansion output into a vector, discarding events.
pub struct VecSink<'a>(pub &'a mut Vec<PpToken>);

impl ExpansionSink for VecSink<'_> {
    fn yield_token(&mut self, token: &PpToken, _expansion_range: Option<TextRange>) {
        self.0.push(*token);
    }
}

/// Argument pre-expansion sink: output to a buffer, events to the parent.
struct ArgSink<'a> {
    out: &'a mut Vec<PpToken>,
    events: &'a mut dyn ExpansionSink,
}

impl ExpansionSink for ArgSink<'_> {
    fn yield_token(&mut self, token: &PpToken, _expansion_range: Option<TextRange>) {
        self.out.push(*token);
    }

    fn macro_expanded(&mut self, macro_use: &PpToken) {
        self.events.macro_expanded(macro_use);
    }
}

/// The feedback-driven expansion state machine. One lives on the main
/// preprocessor path (sinking into the LexContext) and short-lived ones are
/// created per macro argument.
pub struct MacroExpansionProcessor {
    /// Nesting depth of macro replays currently on the feed path.
    expansion_depth: u32,
    /// Point range at the outermost macro use.
    outer_expansion_range: Option<TextRange>,
    /// A function-like macro name was seen and we are waiting for `(`, or
    /// collecting arguments.
    pending_macro: Option<AtomString>,
    pending_macro_token: Option<PpToken>,
    pending_lparen_token: Option<PpToken>,
    arg_buffer: Vec<PpToken>,
    arg_paren_depth: u32,
}

impl Default for MacroExpansionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroExpansionProcessor {
    pub fn new() -> Self {
        MacroExpansionProcessor {
            expansion_depth: 0,
            outer_expansion_range: None,
            pending_macro: None,
            pending_macro_token: None,
            pending_lparen_token: None,
            arg_buffer: Vec::new(),
            arg_paren_depth: 0,
        }
    }

    pub fn feed(&mut self, env: &mut ExpansionEnv<'_>, sink: &mut dyn ExpansionSink, token: PpToken) {
        if self.pending_macro.is_some() {
            self.feed_pending(env, sink, token);
            return;
        }

        if token.kind == TokenKind::Identifier {
            if let Some(def) = env.macros.find_enabled(token.text) {
                if def.is_function_like {
                    // Hold the name until we know whether `(` follows.
                    self.pending_macro = Some(token.text);
                    self.pending_macro_token = Some(token);
                    self.arg_buffer.clear();
                    self.arg_paren_depth = 0;
                } else {
                    self.expand_object_like(env, sink, token);
                }
                return;
            }
        }

        sink.yield_token(&token, self.current_expansion_range());
    }

    /// The token stream has been fully consumed; flush any held state.
    pub fn finalize(&mut self, sink: &mut dyn ExpansionSink) {
        if let Some(name_token) = self.pending_macro_token.take() {
            self.pending_macro = None;
            sink.yield_token(&name_token, None);
            if let Some(lparen) = self.pending_lparen_token.take() {
                sink.yield_token(&lparen, None);
            }
            let buffered = std::mem::take(&mut self.arg_buffer);
            for tok in buffered {
                sink.yield_token(&tok, None);
            }
        }
    }

    fn current_expansion_range(&self) -> Option<TextRange> {
        if self.expansion_depth > 0 {
            self.outer_expansion_range
        } else {
            None
        }
    }

    fn feed_pending(&mut self, env: &mut ExpansionEnv<'_>, sink: &mut dyn ExpansionSink, token: PpToken) {
        if self.arg_paren_depth > 0 {
            match token.kind {
                TokenKind::RParen => {
                    self.arg_paren_depth -= 1;
                    if self.arg_paren_depth == 0 {
                        let name = self.pending_macro.take().expect("pending macro");
                        let name_token = self.pending_macro_token.take().expect("pending token");
                        let lparen_token = self.pending_lparen_token.take().expect("pending lparen");
                        let args = std::mem::take(&mut self.arg_buffer);
                        self.expand_function_like(env, sink, name, name_token, lparen_token, token, args);
                    } else {
                        self.arg_buffer.push(token);
                    }
                }
                TokenKind::LParen => {
                    self.arg_paren_depth += 1;
                    self.arg_buffer.push(token);
                }
                _ => self.arg_buffer.push(token),
            }
        } else if token.kind == TokenKind::LParen {
            self.arg_paren_depth = 1;
            self.pending_lparen_token = Some(token);
        } else {
            // Not an invocation after all; the held name is just an
            // identifier. Both tokens go out verbatim.
            let name_token = self.pending_macro_token.take().expect("pending token");
            self.pending_macro = None;
            sink.yield_token(&name_token, self.current_expansion_range());
            sink.yield_token(&token, self.current_expansion_range());
        }
    }

    fn enter_expansion(&mut self, sink: &mut dyn ExpansionSink, macro_use: &PpToken) {
        self.expansion_depth += 1;
        if self.expansion_depth == 1 {
            self.outer_expansion_range = Some(TextRange::point(macro_use.spelled_range.start));
        }
        sink.macro_expanded(macro_use);
    }

    fn exit_expansion(&mut self) {
        self.expansion_depth -= 1;
        if self.expansion_depth == 0 {
            self.outer_expansion_range = None;
        }
    }

    fn expand_object_like(
        &mut self,
        env: &mut ExpansionEnv<'_>,
        sink: &mut dyn ExpansionSink,
        macro_use: PpToken,
    ) {
        let replacement = env
            .macros
            .find_enabled(macro_use.text)
            .expect("caller checked the macro is enabled")
            .replacement
            .clone();

        self.enter_expansion(sink, &macro_use);
        // Disable during replay so the macro cannot expand inside itself.
        env.macros.set_disabled(macro_use.text, true);
        for tok in replacement {
            self.feed(env, sink, tok);
        }
        env.macros.set_disabled(macro_use.text, false);
        self.exit_expansion();
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_function_like(
        &mut self,
        env: &mut ExpansionEnv<'_>,
        sink: &mut dyn ExpansionSink,
        name: AtomString,
        name_token: PpToken,
        lparen_token: PpToken,
        rparen_token: PpToken,
        arg_tokens: Vec<PpToken>,
    ) {
        let def = env.macros.find_enabled(name).expect("caller checked the macro is enabled");
        let param_names = def.param_names.clone();
        let replacement = def.replacement.clone();

        // Split the buffered tokens at depth-0 commas.
        let mut args: Vec<Vec<PpToken>> = Vec::new();
        let mut current = Vec::new();
        let mut depth = 0u32;
        for tok in &arg_tokens {
            match tok.kind {
                TokenKind::LParen => {
                    depth += 1;
                    current.push(*tok);
                }
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    current.push(*tok);
                }
                TokenKind::Comma if depth == 0 => {
                    args.push(std::mem::take(&mut current));
                }
                _ => current.push(*tok),
            }
        }
        if !current.is_empty() || !args.is_empty() || !arg_tokens.is_empty() {
            args.push(current);
        }

        if args.len() != param_names.len() {
            env.diags.error_at_spelled(
                name_token.spelled_file,
                name_token.spelled_range,
                format!(
                    "macro '{}' expects {} argument(s), got {}",
                    env.atoms.resolve(name),
                    param_names.len(),
                    args.len()
                ),
            );
            // Emit the use verbatim so downstream phases still see it.
            let range = self.current_expansion_range();
            sink.yield_token(&name_token, range);
            sink.yield_token(&lparen_token, range);
            for tok in &arg_tokens {
                sink.yield_token(tok, range);
            }
            sink.yield_token(&rparen_token, range);
            return;
        }

        // Fully expand each argument through a fresh nested expander.
        let mut expanded_args: Vec<Vec<PpToken>> = Vec::with_capacity(args.len());
        for arg in &args {
            let mut out = Vec::new();
            let mut nested = MacroExpansionProcessor::new();
            {
                let mut arg_sink = ArgSink { out: &mut out, events: &mut *sink };
                for tok in arg {
                    nested.feed(env, &mut arg_sink, *tok);
                }
                nested.finalize(&mut arg_sink);
            }
            expanded_args.push(out);
        }

        self.enter_expansion(sink, &name_token);
        env.macros.set_disabled(name, true);
        for tok in replacement {
            if tok.kind == TokenKind::Identifier {
                if let Some(index) = param_names.iter().position(|&p| p == tok.text) {
                    // A substituted argument stays a single operand: it is
                    // replayed between parentheses cloned from the
                    // invocation.
                    self.feed(env, sink, lparen_token);
                    for arg_tok in expanded_args[index].clone() {
                        self.feed(env, sink, arg_tok);
                    }
                    self.feed(env, sink, rparen_token);
                    continue;
                }
            }
            self.feed(env, sink, tok);
        }
        env.macros.set_disabled(name, false);
        self.exit_expansion();
    }
}

/// Expand a finite token list to a vector. Macro-use events are forwarded to
/// `events`.
pub fn expand_tokens_to_vec(
    env: &mut ExpansionEnv<'_>,
    events: &mut dyn ExpansionSink,
    tokens: &[PpToken],
) -> Vec<PpToken> {
    let mut out = Vec::new();
    let mut processor = MacroExpansionProcessor::new();
    {
        let mut sink = ArgSink { out: &mut out, events: &mut *events };
        for tok in tokens {
            processor.feed(env, &mut sink, *tok);
        }
        processor.finalize(&mut sink);
    }
    out
}
