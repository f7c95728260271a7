//! Error-recovering recursive-descent parser for the GLSL grammar.
//!
//! The parser walks the expanded token stream with single-token lookahead
//! plus short multi-token probes (declaration vs. expression statements,
//! interface blocks, constructor calls). On a syntactic mismatch it enters
//! recovery mode and skips to the nearest synchronizing boundary — a
//! matching `)`, `]`, `}`, or a `;` at the current brace depth — then
//! resumes. Malformed regions become dedicated error nodes, so the produced
//! tree is total over arbitrary input and parsing consumes each token at
//! most a constant number of times.

pub mod builder;

pub use builder::AstBuilder;

use crate::ast::{
    AstDecl, AstStmt, BinaryOp, JumpType, LayoutItem, NodeId, QualifierGroup, TypeSpec, UnaryOp,
    VariableDeclarator,
};
use crate::diagnostics::DiagnosticStream;
use crate::lexing::{AstSyntaxRange, LexContext, RawSyntaxToken, SyntaxTokenId};
use crate::tokenizer::TokenKind;
use crate::types::is_type_keyword;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsingState {
    Parsing,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryMode {
    /// Skip to the `)` matching the recorded paren depth.
    Paren,
    /// Skip to the `]` matching the recorded bracket depth.
    Bracket,
    /// Skip to the `}` closing the current block.
    Brace,
    /// Skip to a `;` in this scope or the `}` closing it.
    Semi,
}

pub struct Parser<'a> {
    lex: &'a LexContext,
    builder: AstBuilder<'a>,
    diags: &'a mut DiagnosticStream,

    state: ParsingState,
    paren_depth: u32,
    bracket_depth: u32,
    brace_depth: u32,

    cursor: u32,
    end: u32,
}

impl<'a> Parser<'a> {
    pub fn new(
        lex: &'a LexContext,
        builder: AstBuilder<'a>,
        diags: &'a mut DiagnosticStream,
        begin: SyntaxTokenId,
    ) -> Self {
        Parser {
            lex,
            builder,
            diags,
            state: ParsingState::Parsing,
            paren_depth: 0,
            bracket_depth: 0,
            brace_depth: 0,
            cursor: begin.0,
            end: lex.end().0,
        }
    }

    /// translation-unit := declaration*
    pub fn parse_translation_unit(&mut self) -> NodeId {
        let begin = self.cursor;
        let mut decls = Vec::new();
        while !self.at_eof() {
            let before = self.cursor;
            decls.push(self.parse_decl_and_try_recover());
            if self.cursor == before && !self.at_eof() {
                // Whatever it is, do not loop on it.
                self.consume_token();
            }
        }
        let range = self.range_from(begin);
        self.builder.translation_unit(range, decls)
    }

    //
    // Token primitives
    //

    fn id(&self) -> SyntaxTokenId {
        SyntaxTokenId(self.cursor)
    }

    fn peek(&self) -> RawSyntaxToken {
        self.lex.get_token(SyntaxTokenId(self.cursor))
    }

    fn peek_kind(&self) -> TokenKind {
        if self.cursor >= self.end {
            TokenKind::Eof
        } else {
            self.peek().kind
        }
    }

    fn peek_kind_at(&self, lookahead: u32) -> TokenKind {
        if self.cursor + lookahead >= self.end {
            TokenKind::Eof
        } else {
            self.lex.get_token(SyntaxTokenId(self.cursor + lookahead)).kind
        }
    }

    fn at_eof(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn test(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn test_at(&self, kind: TokenKind, lookahead: u32) -> bool {
        self.peek_kind_at(lookahead) == kind
    }

    fn consume_token(&mut self) {
        if self.at_eof() {
            return;
        }
        match self.peek_kind() {
            TokenKind::LParen => self.paren_depth += 1,
            TokenKind::LBracket => self.bracket_depth += 1,
            TokenKind::LBrace => self.brace_depth += 1,
            TokenKind::RParen => self.paren_depth = self.paren_depth.saturating_sub(1),
            TokenKind::RBracket => self.bracket_depth = self.bracket_depth.saturating_sub(1),
            TokenKind::RBrace => self.brace_depth = self.brace_depth.saturating_sub(1),
            _ => {}
        }
        self.cursor += 1;
    }

    fn try_consume(&mut self, kind: TokenKind) -> bool {
        if self.test(kind) {
            self.consume_token();
            true
        } else {
            false
        }
    }

    fn range_from(&self, begin: u32) -> AstSyntaxRange {
        AstSyntaxRange::new(SyntaxTokenId(begin), SyntaxTokenId(self.cursor))
    }

    fn point_range(&self) -> AstSyntaxRange {
        AstSyntaxRange::new(self.id(), self.id())
    }

    fn report_error(&mut self, message: impl Into<String>) {
        self.diags.error_at_token(self.id(), message);
    }

    //
    // Recovery
    //

    fn in_recovery(&self) -> bool {
        self.state == ParsingState::Recovery
    }

    fn enter_recovery(&mut self) {
        self.state = ParsingState::Recovery;
    }

    fn exit_recovery(&mut self) {
        self.state = ParsingState::Parsing;
    }

    /// Skip tokens up to the synchronizing boundary for `mode`. When the
    /// boundary's closer turns out to be absent, the corresponding depth is
    /// decremented to resync.
    fn recover_from_error(&mut self, mode: RecoveryMode) {
        let init_paren = self.paren_depth;
        let init_bracket = self.bracket_depth;
        let init_brace = self.brace_depth;

        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::RParen => {
                    if self.paren_depth != 0
                        && mode == RecoveryMode::Paren
                        && self.paren_depth == init_paren
                    {
                        return;
                    }
                }
                TokenKind::RBracket => {
                    if self.bracket_depth != 0
                        && mode == RecoveryMode::Bracket
                        && self.bracket_depth == init_bracket
                    {
                        return;
                    }
                }
                TokenKind::RBrace => {
                    if self.brace_depth != 0 && self.brace_depth == init_brace {
                        self.close_unmatched_depth(mode);
                        return;
                    }
                }
                TokenKind::Semicolon => {
                    if mode != RecoveryMode::Brace && self.brace_depth == init_brace {
                        self.close_unmatched_depth(mode);
                        return;
                    }
                }
                _ => {}
            }
            self.consume_token();
        }
    }

    fn close_unmatched_depth(&mut self, mode: RecoveryMode) {
        match mode {
            RecoveryMode::Paren => {
                if !self.test(TokenKind::RParen) {
                    self.paren_depth = self.paren_depth.saturating_sub(1);
                }
            }
            RecoveryMode::Bracket => {
                if !self.test(TokenKind::RBracket) {
                    self.bracket_depth = self.bracket_depth.saturating_sub(1);
                }
            }
            RecoveryMode::Brace => {
                if !self.test(TokenKind::RBrace) {
                    self.brace_depth = self.brace_depth.saturating_sub(1);
                }
            }
            RecoveryMode::Semi => {}
        }
    }

    /// Consume a `;` if available, otherwise report and carry on as if it
    /// were inferred.
    fn parse_permissive_semicolon(&mut self) {
        if !self.try_consume(TokenKind::Semicolon) {
            self.report_error("expecting ';'");
        }
    }

    fn parse_closing_paren(&mut self) {
        if self.try_consume(TokenKind::RParen) {
            if self.in_recovery() {
                self.exit_recovery();
            }
        } else {
            self.report_error("expecting ')'");
            self.recover_from_error(RecoveryMode::Paren);
            if !self.try_consume(TokenKind::RParen) {
                self.enter_recovery();
            }
        }
    }

    fn parse_closing_bracket(&mut self) {
        if self.try_consume(TokenKind::RBracket) {
            if self.in_recovery() {
                self.exit_recovery();
            }
        } else {
            self.report_error("expecting ']'");
            self.recover_from_error(RecoveryMode::Bracket);
            if !self.try_consume(TokenKind::RBracket) {
                self.enter_recovery();
            }
        }
    }

    //
    // Declarations
    //

    fn parse_decl_and_try_recover(&mut self) -> NodeId {
        let decl = self.parse_declaration();
        if self.in_recovery() {
            self.recover_from_error(RecoveryMode::Semi);
            self.try_consume(TokenKind::Semicolon);
            self.exit_recovery();
        }
        decl
    }

    /// declaration := ';' | precision-decl | interface-block | qualifier-decl
    ///              | function-decl | variable-decl
    fn parse_declaration(&mut self) -> NodeId {
        let begin = self.cursor;

        if self.try_consume(TokenKind::Semicolon) {
            let range = self.range_from(begin);
            return self.builder.decl(range, AstDecl::Empty);
        }

        if self.test(TokenKind::KwPrecision) {
            return self.parse_precision_decl();
        }

        let qualifiers = self.parse_type_qualifiers_opt();

        if let Some(qualifiers) = qualifiers {
            // `layout(...) in;` and friends: qualifiers with no declared name.
            if self.try_consume(TokenKind::Semicolon) {
                let range = self.range_from(begin);
                return self.builder.decl(range, AstDecl::QualifierOnly { qualifiers });
            }
            // `uniform Block { ... } name;`
            if self.test(TokenKind::Identifier) && self.test_at(TokenKind::LBrace, 1) {
                return self.parse_interface_block_decl(begin, qualifiers);
            }
        }

        let qual_type = self.parse_qual_type_tail(begin, qualifiers);
        if self.in_recovery() {
            let range = self.range_from(begin);
            return self.builder.error_decl(range);
        }

        if self.test(TokenKind::Identifier) && self.test_at(TokenKind::LParen, 1) {
            return self.parse_function_decl(begin, qual_type);
        }

        self.parse_type_or_variable_decl(begin, qual_type)
    }

    /// precision-decl := 'precision' precision-qualifier type ';'
    fn parse_precision_decl(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'precision'

        let precision = self.id();
        if matches!(
            self.peek_kind(),
            TokenKind::KwHighp | TokenKind::KwMediump | TokenKind::KwLowp
        ) {
            self.consume_token();
        } else {
            self.report_error("expecting a precision qualifier");
        }

        let type_begin = self.cursor;
        let qual_type = self.parse_qual_type_tail(type_begin, None);
        self.parse_permissive_semicolon();
        let range = self.range_from(begin);
        self.builder.decl(range, AstDecl::Precision { precision, qual_type })
    }

    /// qual-seq := (qualifier-keyword | layout-qualifier)*
    fn parse_type_qualifiers_opt(&mut self) -> Option<NodeId> {
        let begin = self.cursor;
        let mut group = QualifierGroup::default();
        let mut layout_items = Vec::new();
        let mut seen_any = false;

        loop {
            let flag = match self.peek_kind() {
                TokenKind::KwConst => &mut group.q_const,
                TokenKind::KwIn => &mut group.q_in,
                TokenKind::KwOut => &mut group.q_out,
                TokenKind::KwInout => &mut group.q_inout,
                TokenKind::KwUniform => &mut group.q_uniform,
                TokenKind::KwBuffer => &mut group.q_buffer,
                TokenKind::KwShared => &mut group.q_shared,
                TokenKind::KwCentroid => &mut group.q_centroid,
                TokenKind::KwFlat => &mut group.q_flat,
                TokenKind::KwSmooth => &mut group.q_smooth,
                TokenKind::KwNoperspective => &mut group.q_noperspective,
                TokenKind::KwPatch => &mut group.q_patch,
                TokenKind::KwSample => &mut group.q_sample,
                TokenKind::KwInvariant => &mut group.q_invariant,
                TokenKind::KwPrecise => &mut group.q_precise,
                TokenKind::KwCoherent => &mut group.q_coherent,
                TokenKind::KwVolatile => &mut group.q_volatile,
                TokenKind::KwRestrict => &mut group.q_restrict,
                TokenKind::KwReadonly => &mut group.q_readonly,
                TokenKind::KwWriteonly => &mut group.q_writeonly,
                TokenKind::KwHighp => &mut group.q_highp,
                TokenKind::KwMediump => &mut group.q_mediump,
                TokenKind::KwLowp => &mut group.q_lowp,
                TokenKind::KwLayout => {
                    self.parse_layout_qualifier(&mut layout_items);
                    seen_any = true;
                    continue;
                }
                _ => break,
            };
            *flag = true;
            seen_any = true;
            self.consume_token();
        }

        if !seen_any {
            return None;
        }
        let range = self.range_from(begin);
        Some(self.builder.qualifier_seq(range, group, layout_items))
    }

    /// layout-qual := 'layout' '(' [layout-spec (',' layout-spec)*] ')'
    /// layout-spec := ID ['=' assignment-expr]
    fn parse_layout_qualifier(&mut self, items: &mut Vec<LayoutItem>) {
        self.consume_token(); // 'layout'
        if !self.try_consume(TokenKind::LParen) {
            self.report_error("expecting '(' after 'layout'");
            return;
        }
        if self.try_consume(TokenKind::RParen) {
            return;
        }
        loop {
            let name = self.id();
            if self.test(TokenKind::Identifier) || self.peek_kind().is_keyword() {
                self.consume_token();
            } else {
                self.report_error("expecting a layout qualifier name");
                break;
            }
            let value = if self.try_consume(TokenKind::Assign) {
                Some(self.parse_assignment_expr())
            } else {
                None
            };
            items.push(LayoutItem { name, value });
            if !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        self.parse_closing_paren();
    }

    /// type-spec := struct-definition | type-keyword | ID, each with an
    /// optional array specifier.
    fn parse_qual_type_tail(&mut self, begin: u32, qualifiers: Option<NodeId>) -> NodeId {
        let spec = if self.test(TokenKind::KwStruct) {
            TypeSpec::Struct(self.parse_struct_definition())
        } else if is_type_keyword(self.peek_kind()) || self.test(TokenKind::Identifier) {
            let tok = self.id();
            self.consume_token();
            TypeSpec::Token(tok)
        } else {
            self.report_error("expecting a type specifier");
            self.enter_recovery();
            TypeSpec::Token(self.id())
        };

        let array_spec =
            if self.test(TokenKind::LBracket) && !self.in_recovery() {
                Some(self.parse_array_spec())
            } else {
                None
            };

        let range = self.range_from(begin);
        self.builder.qual_type(range, qualifiers, spec, array_spec)
    }

    /// struct-definition := 'struct' [ID] '{' member-decl* '}'
    fn parse_struct_definition(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'struct'

        let name = if self.test(TokenKind::Identifier) {
            let tok = self.id();
            self.consume_token();
            Some(tok)
        } else {
            None
        };

        let members = if self.try_consume(TokenKind::LBrace) {
            self.parse_member_decl_list()
        } else {
            self.report_error("expecting '{' in struct definition");
            self.enter_recovery();
            Vec::new()
        };

        let range = self.range_from(begin);
        self.builder.decl(range, AstDecl::Struct { name, members })
    }

    /// Member declarations of a struct body or interface block, up to the
    /// closing `}`.
    fn parse_member_decl_list(&mut self) -> Vec<NodeId> {
        let mut members = Vec::new();
        while !self.at_eof() && !self.test(TokenKind::RBrace) {
            let before = self.cursor;
            let member_begin = self.cursor;
            let qualifiers = self.parse_type_qualifiers_opt();
            let qual_type = self.parse_qual_type_tail(member_begin, qualifiers);
            let declarators = if self.in_recovery() { Vec::new() } else { self.parse_declarators() };
            if self.in_recovery() {
                self.recover_from_error(RecoveryMode::Semi);
                self.try_consume(TokenKind::Semicolon);
                self.exit_recovery();
            } else {
                self.parse_permissive_semicolon();
            }
            let range = self.range_from(member_begin);
            members.push(self.builder.variable_decl(range, qual_type, declarators));
            if self.cursor == before {
                self.consume_token();
            }
        }
        if !self.try_consume(TokenKind::RBrace) {
            self.report_error("expecting '}'");
        }
        members
    }

    /// array-spec := ('[' [expr] ']')+
    fn parse_array_spec(&mut self) -> NodeId {
        let begin = self.cursor;
        let mut sizes = Vec::new();
        while self.test(TokenKind::LBracket) {
            self.consume_token();
            if self.try_consume(TokenKind::RBracket) {
                sizes.push(None);
                continue;
            }
            let size = self.parse_assignment_expr();
            sizes.push(Some(size));
            self.parse_closing_bracket();
            if self.in_recovery() {
                break;
            }
        }
        let range = self.range_from(begin);
        self.builder.array_spec(range, sizes)
    }

    /// declarator-list := declarator (',' declarator)*
    /// declarator := ID [array-spec] ['=' initializer]
    fn parse_declarators(&mut self) -> Vec<VariableDeclarator> {
        let mut declarators = Vec::new();
        while self.test(TokenKind::Identifier) {
            let name = self.id();
            self.consume_token();

            let array_spec =
                if self.test(TokenKind::LBracket) { Some(self.parse_array_spec()) } else { None };
            let initializer = if self.try_consume(TokenKind::Assign) {
                Some(self.parse_initializer())
            } else {
                None
            };
            declarators.push(VariableDeclarator { name, array_spec, initializer });

            if self.in_recovery() || !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        declarators
    }

    /// initializer := assignment-expr | '{' initializer (',' initializer)* [','] '}'
    fn parse_initializer(&mut self) -> NodeId {
        if !self.test(TokenKind::LBrace) {
            return self.parse_assignment_expr();
        }
        let begin = self.cursor;
        self.consume_token(); // '{'
        let mut items = Vec::new();
        while !self.at_eof() && !self.test(TokenKind::RBrace) {
            items.push(self.parse_initializer());
            if self.in_recovery() {
                self.recover_from_error(RecoveryMode::Brace);
                self.exit_recovery();
                break;
            }
            if !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        if !self.try_consume(TokenKind::RBrace) {
            self.report_error("expecting '}'");
        }
        let range = self.range_from(begin);
        self.builder.initializer_list(range, items)
    }

    /// func-decl := qual-type ID param-list (';' | compound-stmt)
    fn parse_function_decl(&mut self, begin: u32, return_type: NodeId) -> NodeId {
        let name = self.id();
        self.consume_token(); // ID

        let params = self.parse_function_param_list();

        // Trailing `;` makes a prototype; a brace opens the definition.
        let body = if !self.in_recovery() && self.test(TokenKind::LBrace) {
            Some(self.parse_compound_stmt())
        } else {
            if !self.in_recovery() {
                self.parse_permissive_semicolon();
            }
            None
        };

        let range = self.range_from(begin);
        self.builder.decl(range, AstDecl::Function { return_type, name, params, body })
    }

    /// param-list := '(' ')' | '(' 'void' ')' | '(' param (',' param)* ')'
    fn parse_function_param_list(&mut self) -> Vec<NodeId> {
        if !self.try_consume(TokenKind::LParen) {
            self.report_error("expecting '('");
            self.enter_recovery();
            return Vec::new();
        }
        if self.try_consume(TokenKind::RParen) {
            return Vec::new();
        }
        // `(void)` also denotes an empty parameter list.
        if self.test(TokenKind::KwVoid) && self.test_at(TokenKind::RParen, 1) {
            self.consume_token();
            self.consume_token();
            return Vec::new();
        }

        let mut params = Vec::new();
        loop {
            let param_begin = self.cursor;
            let qualifiers = self.parse_type_qualifiers_opt();
            let qual_type = self.parse_qual_type_tail(param_begin, qualifiers);
            if self.in_recovery() {
                break;
            }

            let declarator = if self.test(TokenKind::Identifier) {
                let name = self.id();
                self.consume_token();
                let array_spec =
                    if self.test(TokenKind::LBracket) { Some(self.parse_array_spec()) } else { None };
                Some(VariableDeclarator { name, array_spec, initializer: None })
            } else {
                None
            };

            let range = self.range_from(param_begin);
            params.push(self.builder.decl(range, AstDecl::Param { qual_type, declarator }));

            if !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        self.parse_closing_paren();
        params
    }

    /// type-or-variable-decl := qual-type [declarator-list] ';'
    fn parse_type_or_variable_decl(&mut self, begin: u32, qual_type: NodeId) -> NodeId {
        if self.try_consume(TokenKind::Semicolon) {
            let range = self.range_from(begin);
            return self.builder.variable_decl(range, qual_type, Vec::new());
        }

        let declarators = self.parse_declarators();
        if declarators.is_empty() && !self.in_recovery() {
            self.report_error("expecting a declarator");
            self.enter_recovery();
        }
        if !self.in_recovery() {
            self.parse_permissive_semicolon();
        }
        let range = self.range_from(begin);
        self.builder.variable_decl(range, qual_type, declarators)
    }

    /// interface-block := qual-seq ID '{' member-decl* '}' [declarator] ';'
    fn parse_interface_block_decl(&mut self, begin: u32, qualifiers: NodeId) -> NodeId {
        let name = self.id();
        self.consume_token(); // ID
        self.consume_token(); // '{'
        let members = self.parse_member_decl_list();

        let instance = if self.test(TokenKind::Identifier) {
            let instance_name = self.id();
            self.consume_token();
            let array_spec =
                if self.test(TokenKind::LBracket) { Some(self.parse_array_spec()) } else { None };
            Some(VariableDeclarator { name: instance_name, array_spec, initializer: None })
        } else {
            None
        };
        self.parse_permissive_semicolon();

        let range = self.range_from(begin);
        self.builder.decl(range, AstDecl::InterfaceBlock { qualifiers, name, members, instance })
    }

    //
    // Statements
    //

    fn parse_stmt(&mut self) -> NodeId {
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_compound_stmt(),
            TokenKind::KwIf => self.parse_selection_stmt(),
            TokenKind::KwFor => self.parse_for_stmt(),
            TokenKind::KwWhile => self.parse_while_stmt(),
            TokenKind::KwDo => self.parse_do_while_stmt(),
            TokenKind::KwSwitch => self.parse_switch_stmt(),
            TokenKind::KwCase | TokenKind::KwDefault => self.parse_label_stmt(),
            TokenKind::KwBreak | TokenKind::KwContinue | TokenKind::KwDiscard => {
                self.parse_jump_stmt()
            }
            TokenKind::KwReturn => self.parse_return_stmt(),
            TokenKind::Semicolon => {
                let begin = self.cursor;
                self.consume_token();
                let range = self.range_from(begin);
                self.builder.stmt(range, AstStmt::Empty)
            }
            _ => self.parse_decl_or_expr_stmt(),
        }
    }

    fn parse_stmt_and_try_recover(&mut self) -> NodeId {
        let stmt = self.parse_stmt();
        if self.in_recovery() {
            self.recover_from_error(RecoveryMode::Semi);
            self.try_consume(TokenKind::Semicolon);
            self.exit_recovery();
        }
        stmt
    }

    /// compound-stmt := '{' stmt* '}'
    fn parse_compound_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // '{'

        let mut stmts = Vec::new();
        while !self.at_eof() && !self.test(TokenKind::RBrace) {
            let before = self.cursor;
            stmts.push(self.parse_stmt_and_try_recover());
            if self.cursor == before {
                self.consume_token();
            }
        }
        if !self.try_consume(TokenKind::RBrace) {
            self.report_error("expecting '}'");
        }

        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::Compound { stmts })
    }

    /// selection-stmt := 'if' '(' expr ')' stmt ['else' stmt]
    fn parse_selection_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'if'

        let cond = self.parse_paren_wrapped_expr();
        if self.in_recovery() {
            let range = self.range_from(begin);
            let error = self.builder.error_stmt(self.point_range());
            return self.builder.stmt(range, AstStmt::If { cond, then_stmt: error, else_stmt: None });
        }

        let then_stmt = self.parse_stmt_and_try_recover();
        let else_stmt =
            if self.try_consume(TokenKind::KwElse) { Some(self.parse_stmt_and_try_recover()) } else { None };

        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::If { cond, then_stmt, else_stmt })
    }

    /// for-stmt := 'for' '(' stmt [expr] ';' [expr] ')' stmt
    fn parse_for_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'for'

        if !self.try_consume(TokenKind::LParen) {
            self.report_error("expecting '('");
            self.enter_recovery();
            let range = self.range_from(begin);
            return self.builder.error_stmt(range);
        }

        let init = self.parse_stmt();
        let cond = if self.test(TokenKind::Semicolon) { None } else { Some(self.parse_expr()) };
        self.parse_permissive_semicolon();
        let iter = if self.test(TokenKind::RParen) { None } else { Some(self.parse_expr()) };
        self.parse_closing_paren();

        let body = if self.in_recovery() {
            self.builder.error_stmt(self.point_range())
        } else {
            self.parse_stmt_and_try_recover()
        };

        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::For { init, cond, iter, body })
    }

    /// while-stmt := 'while' '(' expr ')' stmt
    fn parse_while_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'while'

        let cond = self.parse_paren_wrapped_expr();
        let body = if self.in_recovery() {
            self.builder.error_stmt(self.point_range())
        } else {
            self.parse_stmt_and_try_recover()
        };

        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::While { cond, body })
    }

    /// dowhile-stmt := 'do' stmt 'while' '(' expr ')' ';'
    fn parse_do_while_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'do'

        let body = self.parse_stmt_and_try_recover();

        if !self.try_consume(TokenKind::KwWhile) {
            self.report_error("expecting 'while'");
            self.enter_recovery();
            let cond = self.builder.error_expr(self.point_range());
            let range = self.range_from(begin);
            return self.builder.stmt(range, AstStmt::DoWhile { body, cond });
        }

        let cond = self.parse_paren_wrapped_expr();
        if !self.in_recovery() {
            self.parse_permissive_semicolon();
        }

        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::DoWhile { body, cond })
    }

    /// switch-stmt := 'switch' '(' expr ')' compound-stmt
    fn parse_switch_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'switch'

        let test = self.parse_paren_wrapped_expr();
        let body = if !self.in_recovery() && self.test(TokenKind::LBrace) {
            self.parse_compound_stmt()
        } else {
            if !self.in_recovery() {
                self.report_error("expecting '{'");
                self.enter_recovery();
            }
            self.builder.error_stmt(self.point_range())
        };

        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::Switch { test, body })
    }

    /// label-stmt := 'case' expr ':' | 'default' ':'
    fn parse_label_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        let case_expr = if self.try_consume(TokenKind::KwCase) {
            Some(self.parse_expr())
        } else {
            self.consume_token(); // 'default'
            None
        };
        if !self.try_consume(TokenKind::Colon) {
            self.report_error("expecting ':'");
        }
        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::Label { case_expr })
    }

    /// jump-stmt := ('break' | 'continue' | 'discard') ';'
    fn parse_jump_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        let jump = match self.peek_kind() {
            TokenKind::KwBreak => JumpType::Break,
            TokenKind::KwContinue => JumpType::Continue,
            _ => JumpType::Discard,
        };
        self.consume_token();
        self.parse_permissive_semicolon();
        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::Jump { jump })
    }

    /// return-stmt := 'return' [expr] ';'
    fn parse_return_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        self.consume_token(); // 'return'
        let expr = if self.test(TokenKind::Semicolon) { None } else { Some(self.parse_expr()) };
        if !self.in_recovery() {
            self.parse_permissive_semicolon();
        }
        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::Return { expr })
    }

    /// Disambiguate a statement that may be a declaration or an expression
    /// using a short probe.
    fn parse_decl_or_expr_stmt(&mut self) -> NodeId {
        let begin = self.cursor;
        if self.probe_declaration_start() {
            let decl = self.parse_declaration();
            let range = self.range_from(begin);
            return self.builder.stmt(range, AstStmt::Decl { decl });
        }

        let expr = self.parse_expr();
        if !self.in_recovery() {
            self.parse_permissive_semicolon();
        }
        let range = self.range_from(begin);
        self.builder.stmt(range, AstStmt::Expr { expr })
    }

    fn probe_declaration_start(&self) -> bool {
        let kind = self.peek_kind();
        if kind == TokenKind::KwStruct || kind == TokenKind::KwPrecision {
            return true;
        }
        if is_qualifier_keyword(kind) {
            return true;
        }
        if is_type_keyword(kind) {
            // A type keyword starts a declaration unless it is a
            // constructor call like `vec3(...)`.
            return !self.constructor_follows(1);
        }
        if kind == TokenKind::Identifier {
            // `MyType name ...` is a declaration.
            if self.test_at(TokenKind::Identifier, 1) {
                return true;
            }
            // `MyType[2] name` vs `arr[i] = ...`: scan past balanced
            // brackets and look for an identifier.
            if self.test_at(TokenKind::LBracket, 1) {
                let mut i = 1;
                let mut depth = 0u32;
                loop {
                    match self.peek_kind_at(i) {
                        TokenKind::LBracket => depth += 1,
                        TokenKind::RBracket => {
                            depth -= 1;
                            if depth == 0 {
                                return self.test_at(TokenKind::Identifier, i + 1);
                            }
                        }
                        TokenKind::Eof | TokenKind::Semicolon => return false,
                        _ => {}
                    }
                    i += 1;
                }
            }
        }
        false
    }

    /// From `offset` (just past a type keyword), does a constructor-call
    /// head follow: `(` directly or after an array specifier?
    fn constructor_follows(&self, offset: u32) -> bool {
        match self.peek_kind_at(offset) {
            TokenKind::LParen => true,
            TokenKind::LBracket => {
                let mut i = offset;
                let mut depth = 0u32;
                loop {
                    match self.peek_kind_at(i) {
                        TokenKind::LBracket => depth += 1,
                        TokenKind::RBracket => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_kind_at(i + 1) == TokenKind::LParen;
                            }
                        }
                        TokenKind::Eof | TokenKind::Semicolon => return false,
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => false,
        }
    }

    //
    // Expressions
    //

    /// expr := assignment-expr (',' assignment-expr)*
    pub fn parse_expr(&mut self) -> NodeId {
        let begin = self.cursor;
        let mut lhs = self.parse_assignment_expr();
        while !self.in_recovery() && self.try_consume(TokenKind::Comma) {
            let rhs = self.parse_assignment_expr();
            let range = self.range_from(begin);
            lhs = self.builder.binary_expr(range, BinaryOp::Comma, lhs, rhs);
        }
        lhs
    }

    /// assignment-expr := unary-expr assign-op assignment-expr
    ///                  | binary-or-conditional-expr
    fn parse_assignment_expr(&mut self) -> NodeId {
        let begin = self.cursor;
        let first = self.parse_unary_expr();
        if self.in_recovery() {
            return first;
        }

        if let Some(op) = assignment_op(self.peek_kind()) {
            self.consume_token();
            let rhs = self.parse_assignment_expr();
            let range = self.range_from(begin);
            return self.builder.binary_expr(range, op, first, rhs);
        }

        self.parse_binary_or_conditional_expr(begin, first)
    }

    /// binary-or-conditional := binary-expr ['?' expr ':' assignment-expr]
    fn parse_binary_or_conditional_expr(&mut self, begin: u32, first: NodeId) -> NodeId {
        let cond = self.parse_binary_expr(begin, first, 0);
        if self.in_recovery() || !self.try_consume(TokenKind::Question) {
            return cond;
        }

        let true_expr = self.parse_expr();
        if !self.try_consume(TokenKind::Colon) {
            self.report_error("expecting ':'");
            self.enter_recovery();
            let range = self.range_from(begin);
            let false_expr = self.builder.error_expr(self.point_range());
            return self.builder.select_expr(range, cond, true_expr, false_expr);
        }
        let false_expr = self.parse_assignment_expr();
        let range = self.range_from(begin);
        self.builder.select_expr(range, cond, true_expr, false_expr)
    }

    /// Precedence climbing over the 19 binary operators.
    fn parse_binary_expr(&mut self, begin: u32, first: NodeId, min_precedence: u8) -> NodeId {
        let mut lhs = first;
        loop {
            let Some((op, precedence)) = binary_op(self.peek_kind()) else { break };
            if precedence < min_precedence {
                break;
            }
            self.consume_token();

            let rhs_begin = self.cursor;
            let mut rhs = self.parse_unary_expr();
            if self.in_recovery() {
                let range = self.range_from(begin);
                return self.builder.binary_expr(range, op, lhs, rhs);
            }
            loop {
                let Some((_, next_precedence)) = binary_op(self.peek_kind()) else { break };
                if next_precedence <= precedence {
                    break;
                }
                rhs = self.parse_binary_expr(rhs_begin, rhs, next_precedence);
                if self.in_recovery() {
                    break;
                }
            }

            let range = self.range_from(begin);
            lhs = self.builder.binary_expr(range, op, lhs, rhs);
        }
        lhs
    }

    /// unary-expr := unary-op* postfix-expr
    fn parse_unary_expr(&mut self) -> NodeId {
        let begin = self.cursor;
        let op = match self.peek_kind() {
            TokenKind::Plus => Some(UnaryOp::Identity),
            TokenKind::Dash => Some(UnaryOp::Negate),
            TokenKind::Tilde => Some(UnaryOp::BitwiseNot),
            TokenKind::Bang => Some(UnaryOp::LogicalNot),
            TokenKind::Increment => Some(UnaryOp::PrefixInc),
            TokenKind::Decrement => Some(UnaryOp::PrefixDec),
            _ => None,
        };
        if let Some(op) = op {
            self.consume_token();
            let operand = self.parse_unary_expr();
            let range = self.range_from(begin);
            return self.builder.unary_expr(range, op, operand);
        }
        self.parse_postfix_expr()
    }

    /// postfix-expr := primary-expr | constructor-call
    ///               | postfix-expr ('++' | '--' | '.' ID | array-spec | call-args)
    fn parse_postfix_expr(&mut self) -> NodeId {
        let begin = self.cursor;

        let mut expr = if is_type_keyword(self.peek_kind()) {
            // `vec3(...)` and `float[2](...)` are constructor calls; the
            // invoked "expression" is a type specifier.
            let qual_type = self.parse_qual_type_tail(begin, None);
            if self.test(TokenKind::LParen) {
                let args = self.parse_function_argument_list();
                let range = self.range_from(begin);
                self.builder.constructor_call_expr(range, qual_type, args)
            } else {
                self.report_error("expecting '(' after type constructor");
                self.enter_recovery();
                let range = self.range_from(begin);
                return self.builder.error_expr(range);
            }
        } else {
            self.parse_primary_expr()
        };

        if self.in_recovery() {
            return expr;
        }

        loop {
            match self.peek_kind() {
                TokenKind::Increment => {
                    self.consume_token();
                    let range = self.range_from(begin);
                    expr = self.builder.unary_expr(range, UnaryOp::PostfixInc, expr);
                }
                TokenKind::Decrement => {
                    self.consume_token();
                    let range = self.range_from(begin);
                    expr = self.builder.unary_expr(range, UnaryOp::PostfixDec, expr);
                }
                TokenKind::Dot => {
                    self.consume_token();
                    if self.test(TokenKind::Identifier) {
                        let name = self.id();
                        self.consume_token();
                        let range = self.range_from(begin);
                        expr = self.builder.field_access_expr(range, expr, name);
                    } else {
                        self.report_error("expecting a member name");
                        self.enter_recovery();
                        let range = self.range_from(begin);
                        return self.builder.error_expr(range);
                    }
                }
                TokenKind::LBracket => {
                    let array_spec = self.parse_array_spec();
                    let range = self.range_from(begin);
                    expr = self.builder.index_access_expr(range, expr, array_spec);
                    if self.in_recovery() {
                        return expr;
                    }
                }
                TokenKind::LParen => {
                    let args = self.parse_function_argument_list();
                    let range = self.range_from(begin);
                    expr = self.builder.invoke_expr(range, expr, args);
                    if self.in_recovery() {
                        return expr;
                    }
                }
                _ => break,
            }
        }
        expr
    }

    /// primary-expr := ID | constant | '(' expr ')'
    fn parse_primary_expr(&mut self) -> NodeId {
        let begin = self.cursor;
        match self.peek_kind() {
            TokenKind::Identifier => {
                let name = self.id();
                self.consume_token();
                let range = self.range_from(begin);
                self.builder.name_access_expr(range, name)
            }
            TokenKind::IntegerConstant
            | TokenKind::FloatConstant
            | TokenKind::KwTrue
            | TokenKind::KwFalse => {
                let token = self.id();
                self.consume_token();
                let range = self.range_from(begin);
                self.builder.literal_expr(range, token)
            }
            TokenKind::LParen => self.parse_paren_wrapped_expr(),
            _ => {
                self.report_error("expecting an expression");
                self.enter_recovery();
                self.builder.error_expr(self.point_range())
            }
        }
    }

    /// paren-wrapped-expr := '(' expr ')'
    fn parse_paren_wrapped_expr(&mut self) -> NodeId {
        if !self.try_consume(TokenKind::LParen) {
            self.report_error("expecting '('");
            self.enter_recovery();
            return self.builder.error_expr(self.point_range());
        }
        let expr = self.parse_expr();
        self.parse_closing_paren();
        expr
    }

    /// func-arg-list := '(' ')' | '(' 'void' ')'
    ///                | '(' assignment-expr (',' assignment-expr)* ')'
    fn parse_function_argument_list(&mut self) -> Vec<NodeId> {
        self.consume_token(); // '('

        if self.try_consume(TokenKind::RParen) {
            return Vec::new();
        }
        if self.test(TokenKind::KwVoid) && self.test_at(TokenKind::RParen, 1) {
            self.consume_token();
            self.consume_token();
            return Vec::new();
        }

        let mut args = Vec::new();
        while !self.at_eof() {
            let arg = self.parse_assignment_expr();
            if self.in_recovery() {
                break;
            }
            args.push(arg);
            if !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        self.parse_closing_paren();
        args
    }
}

fn is_qualifier_keyword(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::KwConst
            | TokenKind::KwIn
            | TokenKind::KwOut
            | TokenKind::KwInout
            | TokenKind::KwUniform
            | TokenKind::KwBuffer
            | TokenKind::KwShared
            | TokenKind::KwLayout
            | TokenKind::KwCentroid
            | TokenKind::KwFlat
            | TokenKind::KwSmooth
            | TokenKind::KwNoperspective
            | TokenKind::KwPatch
            | TokenKind::KwSample
            | TokenKind::KwInvariant
            | TokenKind::KwPrecise
            | TokenKind::KwCoherent
            | TokenKind::KwVolatile
            | TokenKind::KwRestrict
            | TokenKind::KwReadonly
            | TokenKind::KwWriteonly
            | TokenKind::KwHighp
            | TokenKind::KwMediump
            | TokenKind::KwLowp
    )
}

fn assignment_op(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Assign => BinaryOp::Assign,
        TokenKind::MulAssign => BinaryOp::MulAssign,
        TokenKind::DivAssign => BinaryOp::DivAssign,
        TokenKind::ModAssign => BinaryOp::ModAssign,
        TokenKind::AddAssign => BinaryOp::AddAssign,
        TokenKind::SubAssign => BinaryOp::SubAssign,
        TokenKind::LShiftAssign => BinaryOp::LShiftAssign,
        TokenKind::RShiftAssign => BinaryOp::RShiftAssign,
        TokenKind::AndAssign => BinaryOp::AndAssign,
        TokenKind::XorAssign => BinaryOp::XorAssign,
        TokenKind::OrAssign => BinaryOp::OrAssign,
        _ => return None,
    })
}

/// The non-assignment binary operators with their precedence, higher binds
/// tighter.
fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::OrOr => (BinaryOp::LogicalOr, 1),
        TokenKind::XorXor => (BinaryOp::LogicalXor, 2),
        TokenKind::AndAnd => (BinaryOp::LogicalAnd, 3),
        TokenKind::VerticalBar => (BinaryOp::BitwiseOr, 4),
        TokenKind::Caret => (BinaryOp::BitwiseXor, 5),
        TokenKind::Ampersand => (BinaryOp::BitwiseAnd, 6),
        TokenKind::Equal => (BinaryOp::Equal, 7),
        TokenKind::NotEqual => (BinaryOp::NotEqual, 7),
        TokenKind::LAngle => (BinaryOp::Less, 8),
        TokenKind::RAngle => (BinaryOp::Greater, 8),
        TokenKind::LessEq => (BinaryOp::LessEq, 8),
        TokenKind::GreaterEq => (BinaryOp::GreaterEq, 8),
        TokenKind::LShift => (BinaryOp::ShiftLeft, 9),
        TokenKind::RShift => (BinaryOp::ShiftRight, 9),
        TokenKind::Plus => (BinaryOp::Plus, 10),
        TokenKind::Dash => (BinaryOp::Minus, 10),
        TokenKind::Star => (BinaryOp::Mul, 11),
        TokenKind::Slash => (BinaryOp::Div, 11),
        TokenKind::Percent => (BinaryOp::Modulo, 11),
        _ => return None,
    })
}
