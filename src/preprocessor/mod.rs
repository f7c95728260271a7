//! The preprocessor: a push state machine over PP tokens.
//!
//! The tokenizer lexes one file and issues each token here; the current
//! [`PreprocessorState`] decides what happens to it. Ordinary tokens in an
//! active region go through macro expansion and land in the
//! [`LexContext`](crate::lexing::LexContext); a `#` that starts a line opens
//! a directive, whose tail tokens are buffered until the line ends and then
//! handled as one unit. Conditional compilation keeps a stack of
//! `{active, seen_active_branch, seen_else}` records; inactive regions
//! discard everything except the `#` that may close them.
//!
//! `#include` recursively tokenizes and preprocesses the named file under
//! this same instance, bounded by the configured maximum include depth.
//! Every token that originates from an included file carries an expanded
//! range that maps back to the include directive in the main file.

pub mod callback;
pub mod macros;
pub mod pp_expr;

pub use callback::{NullCallback, PpCallback};
pub use macros::{MacroDefinition, MacroRegistry};

use crate::atom::AtomTable;
use crate::compiler::CompilerConfig;
use crate::diagnostics::DiagnosticStream;
use crate::lexing::LexContext;
use crate::source::{FileId, SourceContext, TextRange};
use crate::tokenizer::{PpToken, TokenKind, Tokenizer};
use macros::{ExpansionEnv, ExpansionSink, MacroExpansionProcessor};
use pp_expr::evaluate_pp_expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessorState {
    /// Lexing proceeds normally.
    Default,
    /// Inside a region disabled by conditional compilation.
    Inactive,
    /// A `#` beginning a line was seen; expecting a directive name or EOF.
    ExpectDirective,
    /// A regular directive name was parsed; buffering its tail tokens.
    ExpectDefaultDirectiveTail,
    /// An `#include` was parsed; the tokenizer should lex a header name.
    ExpectIncludeDirectiveTail,
}

#[derive(Debug, Clone, Copy)]
struct ConditionalInfo {
    active: bool,
    seen_active_branch: bool,
    seen_else: bool,
}

/// Sink for the main expansion path: final tokens are registered into the
/// LexContext with their expanded range resolved.
struct LexSink<'a> {
    lex: &'a mut LexContext,
    callback: &'a mut dyn PpCallback,
    include_expansion_range: Option<TextRange>,
}

impl ExpansionSink for LexSink<'_> {
    fn yield_token(&mut self, token: &PpToken, expansion_range: Option<TextRange>) {
        let expanded = self
            .include_expansion_range
            .or(expansion_range)
            .unwrap_or(token.spelled_range);
        self.callback.on_yield_token(token);
        self.lex.add_token(token, expanded);
    }

    fn macro_expanded(&mut self, macro_use: &PpToken) {
        self.callback.on_macro_expansion(macro_use);
    }
}

/// Event-only sink used while evaluating `#if` expressions.
struct CallbackEvents<'a>(&'a mut dyn PpCallback);

impl ExpansionSink for CallbackEvents<'_> {
    fn yield_token(&mut self, _token: &PpToken, _expansion_range: Option<TextRange>) {}

    fn macro_expanded(&mut self, macro_use: &PpToken) {
        self.0.on_macro_expansion(macro_use);
    }
}

pub struct Preprocessor<'c> {
    atoms: &'c mut AtomTable,
    sources: &'c mut SourceContext,
    lex: &'c mut LexContext,
    diags: &'c mut DiagnosticStream,
    callback: &'c mut dyn PpCallback,
    config: &'c CompilerConfig,

    macros: MacroRegistry,
    state: PreprocessorState,
    conditional_stack: Vec<ConditionalInfo>,
    directive_token: Option<PpToken>,
    directive_args: Vec<PpToken>,
    expander: MacroExpansionProcessor,
    include_expansion_range: Option<TextRange>,
    include_depth: usize,
}

impl<'c> Preprocessor<'c> {
    pub fn new(
        atoms: &'c mut AtomTable,
        sources: &'c mut SourceContext,
        lex: &'c mut LexContext,
        diags: &'c mut DiagnosticStream,
        callback: &'c mut dyn PpCallback,
        config: &'c CompilerConfig,
    ) -> Self {
        Preprocessor {
            atoms,
            sources,
            lex,
            diags,
            callback,
            config,
            macros: MacroRegistry::new(),
            state: PreprocessorState::Default,
            conditional_stack: Vec::new(),
            directive_token: None,
            directive_args: Vec::new(),
            expander: MacroExpansionProcessor::new(),
            include_expansion_range: None,
            include_depth: 0,
        }
    }

    pub fn state(&self) -> PreprocessorState {
        self.state
    }

    /// Macro definitions survive across files of one run; the compiler uses
    /// this to carry preamble macros into the main file.
    pub fn take_macros(self) -> MacroRegistry {
        self.macros
    }

    pub fn set_macros(&mut self, macros: MacroRegistry) {
        self.macros = macros;
    }

    /// Tokenize and preprocess one top-level source file. With
    /// `register_eof`, the file's EOF token ends the stream; preamble files
    /// compiled into the same stream pass false so the parser sees one
    /// terminator.
    pub fn preprocess_source_file(&mut self, file: FileId, register_eof: bool) {
        debug_assert!(file.is_valid());
        self.run_file(file, register_eof);
    }

    /// Mark the boundary where main-file tokens begin.
    pub fn mark_tu_start(&mut self) {
        self.lex.mark_tu_start();
    }

    fn run_file(&mut self, file: FileId, register_eof: bool) {
        let content = self
            .sources
            .content(file)
            .expect("source buffer must be opened before preprocessing");
        let mut tokenizer = Tokenizer::new(&content, file, self.config.count_utf16_characters);
        loop {
            let lex_header = self.state == PreprocessorState::ExpectIncludeDirectiveTail;
            let token = tokenizer.next_token(&mut *self.atoms, &mut *self.diags, lex_header);
            if token.kind == TokenKind::Eof {
                self.handle_eof(token, register_eof);
                break;
            }
            self.dispatch(token);
        }
    }

    fn in_active_region(&self) -> bool {
        self.conditional_stack.iter().all(|c| c.active)
    }

    fn active_state(&self) -> PreprocessorState {
        if self.in_active_region() {
            PreprocessorState::Default
        } else {
            PreprocessorState::Inactive
        }
    }

    fn dispatch(&mut self, token: PpToken) {
        match self.state {
            PreprocessorState::Default => {
                if token.kind == TokenKind::Hash && token.is_first_token_of_line {
                    self.state = PreprocessorState::ExpectDirective;
                } else {
                    self.expand_token(token);
                }
            }
            PreprocessorState::Inactive => {
                if token.kind == TokenKind::Hash && token.is_first_token_of_line {
                    self.state = PreprocessorState::ExpectDirective;
                }
                // Everything else in an inactive region is discarded.
            }
            PreprocessorState::ExpectDirective => {
                if token.is_first_token_of_line {
                    // A lone `#` is the null directive.
                    self.state = self.active_state();
                    self.dispatch(token);
                } else if token.kind == TokenKind::Identifier {
                    let is_include =
                        self.in_active_region() && self.atoms.resolve(token.text) == "include";
                    self.directive_token = Some(token);
                    self.state = if is_include {
                        PreprocessorState::ExpectIncludeDirectiveTail
                    } else {
                        PreprocessorState::ExpectDefaultDirectiveTail
                    };
                } else {
                    if self.in_active_region() {
                        self.diags.error_at_spelled(
                            token.spelled_file,
                            token.spelled_range,
                            "expected a preprocessor directive name",
                        );
                    }
                    // Discard the rest of the line.
                    self.directive_token = None;
                    self.state = PreprocessorState::ExpectDefaultDirectiveTail;
                }
            }
            PreprocessorState::ExpectDefaultDirectiveTail
            | PreprocessorState::ExpectIncludeDirectiveTail => {
                if token.is_first_token_of_line {
                    self.finish_directive();
                    self.dispatch(token);
                } else {
                    self.directive_args.push(token);
                }
            }
        }
    }

    fn handle_eof(&mut self, token: PpToken, register_eof: bool) {
        match self.state {
            PreprocessorState::ExpectDirective => {}
            PreprocessorState::ExpectDefaultDirectiveTail
            | PreprocessorState::ExpectIncludeDirectiveTail => {
                self.finish_directive();
            }
            _ => {}
        }
        self.state = self.active_state();

        if register_eof {
            self.flush_expander();
            if !self.conditional_stack.is_empty() {
                self.diags.error_at_spelled(
                    token.spelled_file,
                    token.spelled_range,
                    "unterminated conditional directive at end of file",
                );
                self.conditional_stack.clear();
                self.state = PreprocessorState::Default;
            }
            let expanded = self.include_expansion_range.unwrap_or(token.spelled_range);
            self.callback.on_yield_token(&token);
            self.lex.add_token(&token, expanded);
        }
    }

    fn finish_directive(&mut self) {
        let directive = self.directive_token.take();
        let args = std::mem::take(&mut self.directive_args);
        // Includes recurse through this instance, which must be back in the
        // Default state first.
        self.state = PreprocessorState::Default;
        if let Some(directive) = directive {
            self.handle_directive(directive, &args);
        }
        self.state = self.active_state();
    }

    fn expand_token(&mut self, token: PpToken) {
        let mut env = ExpansionEnv {
            macros: &mut self.macros,
            diags: &mut *self.diags,
            atoms: &*self.atoms,
        };
        let mut sink = LexSink {
            lex: &mut *self.lex,
            callback: &mut *self.callback,
            include_expansion_range: self.include_expansion_range,
        };
        self.expander.feed(&mut env, &mut sink, token);
    }

    fn flush_expander(&mut self) {
        let mut sink = LexSink {
            lex: &mut *self.lex,
            callback: &mut *self.callback,
            include_expansion_range: self.include_expansion_range,
        };
        self.expander.finalize(&mut sink);
    }

    fn handle_directive(&mut self, directive: PpToken, args: &[PpToken]) {
        let name = self.atoms.resolve(directive.text).to_string();
        let active = self.in_active_region();
        match name.as_str() {
            "if" => self.handle_if(directive, args),
            "ifdef" => self.handle_ifdef(directive, args, false),
            "ifndef" => self.handle_ifdef(directive, args, true),
            "elif" => self.handle_elif(directive, args),
            "else" => self.handle_else(directive, args),
            "endif" => self.handle_endif(directive),
            _ if !active => {}
            "include" => self.handle_include(directive, args),
            "define" => self.handle_define(directive, args),
            "undef" => self.handle_undef(directive, args),
            "error" => {
                let mut message = String::from("#error");
                for arg in args {
                    message.push(' ');
                    message.push_str(self.atoms.resolve(arg.text));
                }
                self.diags
                    .error_at_spelled(directive.spelled_file, directive.spelled_range, message);
            }
            // Recognized but otherwise ignored by this frontend.
            "version" | "extension" | "pragma" | "line" => {}
            _ => {
                self.diags.error_at_spelled(
                    directive.spelled_file,
                    directive.spelled_range,
                    format!("unknown preprocessor directive '#{name}'"),
                );
            }
        }
    }

    fn eval_condition(&mut self, directive: &PpToken, args: &[PpToken]) -> bool {
        let value = {
            let mut env = ExpansionEnv {
                macros: &mut self.macros,
                diags: &mut *self.diags,
                atoms: &*self.atoms,
            };
            let mut events = CallbackEvents(&mut *self.callback);
            evaluate_pp_expression(&mut env, &mut events, args)
        };
        match value {
            Some(value) => value,
            None => {
                self.diags.error_at_spelled(
                    directive.spelled_file,
                    directive.spelled_range,
                    "invalid preprocessing expression",
                );
                false
            }
        }
    }

    fn handle_if(&mut self, directive: PpToken, args: &[PpToken]) {
        let parent_active = self.in_active_region();
        let value = if parent_active { self.eval_condition(&directive, args) } else { false };
        self.conditional_stack.push(ConditionalInfo {
            active: value,
            // Under an inactive parent no branch of this conditional may
            // ever activate.
            seen_active_branch: value || !parent_active,
            seen_else: false,
        });
    }

    fn handle_ifdef(&mut self, directive: PpToken, args: &[PpToken], is_ndef: bool) {
        let parent_active = self.in_active_region();
        let value = match args.first() {
            Some(name) if name.kind == TokenKind::Identifier => {
                self.callback.on_if_def_directive(name, is_ndef);
                parent_active && (self.macros.is_defined(name.text) != is_ndef)
            }
            _ => {
                if parent_active {
                    self.diags.error_at_spelled(
                        directive.spelled_file,
                        directive.spelled_range,
                        format!("#{} expects a macro name", if is_ndef { "ifndef" } else { "ifdef" }),
                    );
                }
                false
            }
        };
        self.conditional_stack.push(ConditionalInfo {
            active: value,
            seen_active_branch: value || !parent_active,
            seen_else: false,
        });
    }

    fn handle_elif(&mut self, directive: PpToken, args: &[PpToken]) {
        let Some(top) = self.conditional_stack.last().copied() else {
            self.diags.error_at_spelled(
                directive.spelled_file,
                directive.spelled_range,
                "#elif without a matching #if",
            );
            return;
        };
        let depth = self.conditional_stack.len();
        let parent_active = self.conditional_stack[..depth - 1].iter().all(|c| c.active);

        let new_active = if top.seen_else {
            self.diags.error_at_spelled(
                directive.spelled_file,
                directive.spelled_range,
                "#elif after #else",
            );
            false
        } else if top.seen_active_branch {
            false
        } else {
            parent_active && self.eval_condition(&directive, args)
        };

        let top = self.conditional_stack.last_mut().expect("checked non-empty");
        top.active = new_active;
        top.seen_active_branch |= new_active;
    }

    fn handle_else(&mut self, directive: PpToken, _args: &[PpToken]) {
        let depth = self.conditional_stack.len();
        if depth == 0 {
            self.diags.error_at_spelled(
                directive.spelled_file,
                directive.spelled_range,
                "#else without a matching #if",
            );
            return;
        }
        let parent_active = self.conditional_stack[..depth - 1].iter().all(|c| c.active);
        let top = self.conditional_stack.last_mut().expect("checked non-empty");
        if top.seen_else {
            self.diags.error_at_spelled(
                directive.spelled_file,
                directive.spelled_range,
                "duplicate #else",
            );
            top.active = false;
            return;
        }
        top.seen_else = true;
        top.active = parent_active && !top.seen_active_branch;
        top.seen_active_branch = true;
    }

    fn handle_endif(&mut self, directive: PpToken) {
        if self.conditional_stack.pop().is_none() {
            self.diags.error_at_spelled(
                directive.spelled_file,
                directive.spelled_range,
                "#endif without a matching #if",
            );
        }
    }

    fn handle_include(&mut self, directive: PpToken, args: &[PpToken]) {
        let header = match args {
            [header]
                if matches!(
                    header.kind,
                    TokenKind::UserHeaderName | TokenKind::SystemHeaderName
                ) =>
            {
                *header
            }
            _ => {
                self.diags.error_at_spelled(
                    directive.spelled_file,
                    directive.spelled_range,
                    "#include expects a header name",
                );
                return;
            }
        };
        self.callback.on_include_directive(&header);

        if self.include_depth >= self.config.max_include_depth {
            self.diags.error_at_spelled(
                header.spelled_file,
                header.spelled_range,
                format!("maximum include depth of {} exceeded", self.config.max_include_depth),
            );
            return;
        }

        let spelled = self.atoms.resolve(header.text);
        debug_assert!(spelled.len() >= 2);
        let header_name = spelled[1..spelled.len() - 1].to_string();
        let quoted = header.kind == TokenKind::UserHeaderName;

        let file = self.sources.resolve_include(
            &header_name,
            directive.spelled_file,
            quoted,
            &self.config.include_paths,
        );
        if !file.is_valid() {
            self.diags.error_at_spelled(
                header.spelled_file,
                header.spelled_range,
                format!("cannot open include file '{header_name}'"),
            );
            return;
        }

        let directive_range = TextRange::new(directive.spelled_range.start, header.spelled_range.end);
        let saved_range = self.include_expansion_range;
        self.include_expansion_range = Some(saved_range.unwrap_or(directive_range));
        self.include_depth += 1;
        self.callback.on_enter_included_file();

        self.run_file(file, false);

        self.callback.on_exit_included_file();
        self.include_depth -= 1;
        self.include_expansion_range = saved_range;
    }

    fn handle_define(&mut self, directive: PpToken, args: &[PpToken]) {
        let Some(name) = args.first().filter(|t| t.kind == TokenKind::Identifier).copied() else {
            self.diags.error_at_spelled(
                directive.spelled_file,
                directive.spelled_range,
                "#define expects a macro name",
            );
            return;
        };

        let is_function_like =
            args.get(1).is_some_and(|t| t.kind == TokenKind::LParen && !t.has_leading_whitespace);

        let definition = if is_function_like {
            let mut param_tokens = Vec::new();
            let mut cursor = 2;
            let mut well_formed = false;
            while let Some(tok) = args.get(cursor) {
                match tok.kind {
                    TokenKind::RParen => {
                        cursor += 1;
                        well_formed = true;
                        break;
                    }
                    TokenKind::Identifier => {
                        param_tokens.push(*tok);
                        cursor += 1;
                        match args.get(cursor).map(|t| t.kind) {
                            Some(TokenKind::Comma) => cursor += 1,
                            Some(TokenKind::RParen) | None => {}
                            _ => break,
                        }
                    }
                    _ => break,
                }
            }
            if !well_formed {
                self.diags.error_at_spelled(
                    name.spelled_file,
                    name.spelled_range,
                    "malformed parameter list in #define",
                );
                return;
            }
            self.callback.on_define_directive(&name, &param_tokens);
            let param_names = param_tokens.iter().map(|t| t.text).collect();
            MacroDefinition::function_like(name, param_names, args[cursor..].to_vec())
        } else {
            self.callback.on_define_directive(&name, &[]);
            MacroDefinition::object_like(name, args[1..].to_vec())
        };

        if self.macros.define(name.text, definition).is_some() {
            self.diags.warning_at_spelled(
                name.spelled_file,
                name.spelled_range,
                format!("macro '{}' redefined", self.atoms.resolve(name.text)),
            );
        }
    }

    fn handle_undef(&mut self, directive: PpToken, args: &[PpToken]) {
        let Some(name) = args.first().filter(|t| t.kind == TokenKind::Identifier).copied() else {
            self.diags.error_at_spelled(
                directive.spelled_file,
                directive.spelled_range,
                "#undef expects a macro name",
            );
            return;
        };
        self.callback.on_undef_directive(&name);
        if !self.macros.undef(name.text) {
            self.diags.warning_at_spelled(
                name.spelled_file,
                name.spelled_range,
                format!("macro '{}' was not defined", self.atoms.resolve(name.text)),
            );
        }
    }
}
