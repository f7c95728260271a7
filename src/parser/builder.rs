//! AST construction helpers.
//!
//! The builder wraps arena node creation with the cheap semantic tagging
//! that can be done at parse time: literal tokens are decoded into
//! [`ConstValue`] payloads, and constructor calls keep the parser's
//! type-specifier distinction. Everything that needs scope information
//! (name resolution, overloads) belongs to the type checker.

use crate::ast::{
    AstContext, AstDecl, AstExpr, AstNodeKind, AstStmt, LayoutItem, NodeId, QualifierGroup,
    TypeSpec, VariableDeclarator,
};
use crate::atom::AtomTable;
use crate::lexing::{AstSyntaxRange, LexContext, SyntaxTokenId};
use crate::tokenizer::TokenKind;
use crate::types::ConstValue;

pub struct AstBuilder<'a> {
    pub ast: &'a mut AstContext,
    pub lex: &'a LexContext,
    pub atoms: &'a AtomTable,
}

impl<'a> AstBuilder<'a> {
    pub fn new(ast: &'a mut AstContext, lex: &'a LexContext, atoms: &'a AtomTable) -> Self {
        AstBuilder { ast, lex, atoms }
    }

    fn create(&mut self, range: AstSyntaxRange, kind: AstNodeKind) -> NodeId {
        self.ast.create_node(range, kind)
    }

    pub fn translation_unit(&mut self, range: AstSyntaxRange, decls: Vec<NodeId>) -> NodeId {
        let id = self.create(range, AstNodeKind::TranslationUnit { decls });
        self.ast.set_translation_unit(id);
        id
    }

    pub fn array_spec(&mut self, range: AstSyntaxRange, sizes: Vec<Option<NodeId>>) -> NodeId {
        self.create(range, AstNodeKind::ArraySpec { sizes })
    }

    pub fn qualifier_seq(
        &mut self,
        range: AstSyntaxRange,
        qualifiers: QualifierGroup,
        layout_items: Vec<LayoutItem>,
    ) -> NodeId {
        self.create(range, AstNodeKind::QualifierSeq { qualifiers, layout_items })
    }

    pub fn qual_type(
        &mut self,
        range: AstSyntaxRange,
        qualifiers: Option<NodeId>,
        spec: TypeSpec,
        array_spec: Option<NodeId>,
    ) -> NodeId {
        self.create(range, AstNodeKind::QualType { qualifiers, spec, array_spec })
    }

    //
    // Expressions
    //

    pub fn error_expr(&mut self, range: AstSyntaxRange) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::Error))
    }

    /// Decode a literal token into its constant value. Unknown forms carry
    /// the error value and get the error type later.
    pub fn literal_expr(&mut self, range: AstSyntaxRange, token: SyntaxTokenId) -> NodeId {
        let tok = self.lex.get_token(token);
        let text = self.atoms.resolve(tok.text);
        let value = match tok.kind {
            TokenKind::KwTrue => ConstValue::from_bool(true),
            TokenKind::KwFalse => ConstValue::from_bool(false),
            TokenKind::IntegerConstant => parse_integer_literal(text),
            TokenKind::FloatConstant => parse_float_literal(text),
            _ => ConstValue::Error,
        };
        self.create(range, AstNodeKind::Expr(AstExpr::Literal { value }))
    }

    pub fn name_access_expr(&mut self, range: AstSyntaxRange, name: SyntaxTokenId) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::NameAccess { name }))
    }

    pub fn field_access_expr(
        &mut self,
        range: AstSyntaxRange,
        base: NodeId,
        name: SyntaxTokenId,
    ) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::FieldAccess { base, name }))
    }

    pub fn index_access_expr(
        &mut self,
        range: AstSyntaxRange,
        base: NodeId,
        array_spec: NodeId,
    ) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::IndexAccess { base, array_spec }))
    }

    pub fn unary_expr(
        &mut self,
        range: AstSyntaxRange,
        op: crate::ast::UnaryOp,
        operand: NodeId,
    ) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::Unary { op, operand }))
    }

    pub fn binary_expr(
        &mut self,
        range: AstSyntaxRange,
        op: crate::ast::BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::Binary { op, lhs, rhs }))
    }

    pub fn select_expr(
        &mut self,
        range: AstSyntaxRange,
        cond: NodeId,
        true_expr: NodeId,
        false_expr: NodeId,
    ) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::Select { cond, true_expr, false_expr }))
    }

    pub fn invoke_expr(&mut self, range: AstSyntaxRange, invoked: NodeId, args: Vec<NodeId>) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::Invoke { invoked, args }))
    }

    pub fn constructor_call_expr(
        &mut self,
        range: AstSyntaxRange,
        qual_type: NodeId,
        args: Vec<NodeId>,
    ) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::ConstructorCall { qual_type, args }))
    }

    pub fn initializer_list(&mut self, range: AstSyntaxRange, items: Vec<NodeId>) -> NodeId {
        self.create(range, AstNodeKind::Expr(AstExpr::InitializerList { items }))
    }

    //
    // Statements
    //

    pub fn error_stmt(&mut self, range: AstSyntaxRange) -> NodeId {
        self.create(range, AstNodeKind::Stmt(AstStmt::Error))
    }

    pub fn stmt(&mut self, range: AstSyntaxRange, stmt: AstStmt) -> NodeId {
        self.create(range, AstNodeKind::Stmt(stmt))
    }

    //
    // Declarations
    //

    pub fn error_decl(&mut self, range: AstSyntaxRange) -> NodeId {
        self.create(range, AstNodeKind::Decl(AstDecl::Error))
    }

    pub fn decl(&mut self, range: AstSyntaxRange, decl: AstDecl) -> NodeId {
        self.create(range, AstNodeKind::Decl(decl))
    }

    pub fn variable_decl(
        &mut self,
        range: AstSyntaxRange,
        qual_type: NodeId,
        declarators: Vec<VariableDeclarator>,
    ) -> NodeId {
        self.create(range, AstNodeKind::Decl(AstDecl::Variable { qual_type, declarators }))
    }
}

/// Decode a GLSL integer literal (decimal, octal, hex; optional `u`/`U`).
fn parse_integer_literal(text: &str) -> ConstValue {
    let (digits, unsigned) = match text.strip_suffix(['u', 'U']) {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };
    match parsed {
        Ok(value) if unsigned => ConstValue::from_uint(value as u32),
        Ok(value) => ConstValue::from_int(value as i32),
        Err(_) => ConstValue::Error,
    }
}

/// Decode a GLSL float literal (`f`/`F` single, `lf`/`LF` double, default
/// single precision).
fn parse_float_literal(text: &str) -> ConstValue {
    if let Some(digits) = text.strip_suffix("lf").or_else(|| text.strip_suffix("LF")) {
        return digits.parse().map(ConstValue::from_double).unwrap_or(ConstValue::Error);
    }
    let digits = text.strip_suffix(['f', 'F']).unwrap_or(text);
    digits.parse::<f32>().map(ConstValue::from_float).unwrap_or(ConstValue::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_literal_forms() {
        assert_eq!(parse_integer_literal("42"), ConstValue::from_int(42));
        assert_eq!(parse_integer_literal("42u"), ConstValue::from_uint(42));
        assert_eq!(parse_integer_literal("0x1F"), ConstValue::from_int(31));
        assert_eq!(parse_integer_literal("017"), ConstValue::from_int(15));
        assert_eq!(parse_integer_literal("0"), ConstValue::from_int(0));
    }

    #[test]
    fn float_literal_forms() {
        assert_eq!(parse_float_literal("1.5"), ConstValue::from_float(1.5));
        assert_eq!(parse_float_literal("2.0f"), ConstValue::from_float(2.0));
        assert_eq!(parse_float_literal("1e3"), ConstValue::from_float(1000.0));
        assert_eq!(parse_float_literal("2.5lf"), ConstValue::from_double(2.5));
    }
}
