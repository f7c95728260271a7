//! Semantic analysis: the second pass over the AST.
//!
//! The checker resolves type names, registers declarations into scopes,
//! deduces a type for every expression, resolves overloaded calls, and
//! marks constant expressions for folding. Results go into side tables
//! keyed by [`NodeId`] (see [`SemanticInfo`]); the AST itself is never
//! mutated, so a checked tree can be shared read-only across threads.

pub mod const_eval;
pub mod symbol_table;

pub use const_eval::{eval_ast_expr, is_const_eval_function, ConstEvalContext};
pub use symbol_table::{DeclScope, FunctionEntry, FunctionLookup, GlobalSymbols, SymbolTable};

use crate::ast::{
    AstContext, AstDecl, AstExpr, AstNodeKind, AstStmt, BinaryOp, DeclView, NodeId,
    QualifierGroup, TypeSpec, UnaryOp, VariableDeclarator,
};
use crate::atom::{AtomString, AtomTable};
use crate::diagnostics::DiagnosticStream;
use crate::lexing::{LexContext, SyntaxTokenId};
use crate::types::{
    arithmetic_type, builtin_type_from_token, error_type, scalar_type, vector_type, ConstValue,
    ScalarKind, StructMemberType, StructType, TypeContext, TypeId, TypeKind, ValueDim,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// What a name-access or invoke expression turned out to mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NameAccessKind {
    Unknown,
    Variable,
    Function,
    Constructor,
    Swizzle,
    /// The receiver of a `.length()` call.
    LengthMethod,
}

/// Validated swizzle selection, as 0-based component positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwizzleDesc {
    pub indices: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ExprInfo {
    pub deduced_type: TypeId,
    pub is_const: bool,
    pub resolved_decl: Option<DeclView>,
    pub access: NameAccessKind,
    pub swizzle: Option<SwizzleDesc>,
    /// For struct member access: flattened member position, used by
    /// constant folding to index aggregates.
    pub member_index: Option<u32>,
}

impl Default for ExprInfo {
    fn default() -> Self {
        ExprInfo {
            deduced_type: error_type(),
            is_const: false,
            resolved_decl: None,
            access: NameAccessKind::Unknown,
            swizzle: None,
            member_index: None,
        }
    }
}

/// The side tables produced by type checking.
#[derive(Debug, Default)]
pub struct SemanticInfo {
    pub expr_info: HashMap<NodeId, ExprInfo>,
    /// Resolved type of every `QualType` node and every struct/interface
    /// block declaration.
    pub resolved_types: HashMap<NodeId, TypeId>,
    /// Type of each declarator, keyed by declaring node and index.
    pub declarator_types: HashMap<(NodeId, u32), TypeId>,
    /// The frozen global scope, for preamble sharing and symbol queries.
    pub symbols: GlobalSymbols,
}

impl SemanticInfo {
    pub fn expr_type(&self, id: NodeId) -> TypeId {
        self.expr_info.get(&id).map(|i| i.deduced_type).unwrap_or_else(error_type)
    }

    pub fn is_const_expr(&self, id: NodeId) -> bool {
        self.expr_info.get(&id).map(|i| i.is_const).unwrap_or(false)
    }

    pub fn resolved_decl(&self, id: NodeId) -> Option<DeclView> {
        self.expr_info.get(&id).and_then(|i| i.resolved_decl)
    }

    pub fn qual_type(&self, id: NodeId) -> TypeId {
        self.resolved_types.get(&id).copied().unwrap_or_else(error_type)
    }

    pub fn declarator_type(&self, decl: NodeId, index: u32) -> TypeId {
        self.declarator_types.get(&(decl, index)).copied().unwrap_or_else(error_type)
    }
}

pub struct TypeChecker<'a> {
    ast: &'a AstContext,
    lex: &'a LexContext,
    atoms: &'a AtomTable,
    types: &'a mut TypeContext,
    diags: &'a mut DiagnosticStream,
    table: SymbolTable,
    info: SemanticInfo,
    /// The compiled preamble's side tables, consulted when a resolved
    /// declaration lives in the shared preamble AST.
    base_sema: Option<Arc<SemanticInfo>>,
    current_return_type: Option<TypeId>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        ast: &'a AstContext,
        lex: &'a LexContext,
        atoms: &'a AtomTable,
        types: &'a mut TypeContext,
        diags: &'a mut DiagnosticStream,
        external: Option<Arc<GlobalSymbols>>,
        base_sema: Option<Arc<SemanticInfo>>,
    ) -> Self {
        TypeChecker {
            ast,
            lex,
            atoms,
            types,
            diags,
            table: SymbolTable::new(external),
            info: SemanticInfo::default(),
            base_sema,
            current_return_type: None,
        }
    }

    fn lookup_declarator_type(&self, decl: NodeId, index: u32) -> TypeId {
        if let Some(&ty) = self.info.declarator_types.get(&(decl, index)) {
            return ty;
        }
        if let Some(base) = &self.base_sema {
            return base.declarator_type(decl, index);
        }
        error_type()
    }

    fn lookup_decl_type(&self, decl: NodeId) -> TypeId {
        if let Some(&ty) = self.info.resolved_types.get(&decl) {
            return ty;
        }
        if let Some(base) = &self.base_sema {
            if let Some(&ty) = base.resolved_types.get(&decl) {
                return ty;
            }
        }
        error_type()
    }

    pub fn check_translation_unit(mut self, tu: NodeId) -> SemanticInfo {
        let decls = match &self.ast.get(tu).kind {
            AstNodeKind::TranslationUnit { decls } => decls.clone(),
            _ => Vec::new(),
        };
        for decl in decls {
            self.check_decl(decl);
        }
        self.info.symbols = self.table.into_global_symbols();
        self.info
    }

    //
    // Shared helpers
    //

    fn token_atom(&self, id: SyntaxTokenId) -> AtomString {
        self.lex.get_token(id).text
    }

    fn token_text(&self, id: SyntaxTokenId) -> &str {
        self.atoms.resolve(self.lex.get_token(id).text)
    }

    fn error(&mut self, at: SyntaxTokenId, message: impl Into<String>) {
        self.diags.error_at_token(at, message);
    }

    fn error_at_node(&mut self, node: NodeId, message: impl Into<String>) {
        self.diags.error_at_token(self.ast.get(node).range.begin, message);
    }

    fn set_expr_info(&mut self, id: NodeId, info: ExprInfo) -> TypeId {
        let ty = info.deduced_type;
        self.info.expr_info.insert(id, info);
        ty
    }

    fn expr_is_const(&self, id: NodeId) -> bool {
        self.info.is_const_expr(id)
    }

    fn eval_const(&self, id: NodeId) -> ConstValue {
        let cx = ConstEvalContext {
            ast: self.ast,
            lex: self.lex,
            atoms: self.atoms,
            types: &*self.types,
            sema: &self.info,
        };
        eval_ast_expr(&cx, id)
    }

    fn type_name(&self, ty: TypeId) -> String {
        self.types.get(ty).name.clone()
    }

    /// The qualifier flags attached to a `QualType` node.
    fn qual_group_of(&self, qual_type: NodeId) -> QualifierGroup {
        if let AstNodeKind::QualType { qualifiers: Some(q), .. } = &self.ast.get(qual_type).kind {
            if let AstNodeKind::QualifierSeq { qualifiers, .. } = &self.ast.get(*q).kind {
                return *qualifiers;
            }
        }
        QualifierGroup::default()
    }

    //
    // Types
    //

    /// Resolve an `AstQualType`: builtin keyword, struct name, or inline
    /// struct definition, wrapped with its array dimensions.
    fn resolve_qual_type(&mut self, id: NodeId) -> TypeId {
        if let Some(&cached) = self.info.resolved_types.get(&id) {
            return cached;
        }
        let AstNodeKind::QualType { spec, array_spec, .. } = self.ast.get(id).kind.clone() else {
            return error_type();
        };

        let base = match spec {
            TypeSpec::Token(tok) => {
                let raw = self.lex.get_token(tok);
                if let Some(builtin) = builtin_type_from_token(raw.kind) {
                    builtin
                } else if raw.kind == crate::tokenizer::TokenKind::Identifier {
                    match self.table.find_symbol(raw.text) {
                        Some(view) if self.is_type_decl(view.decl) => {
                            self.lookup_decl_type(view.decl)
                        }
                        _ => {
                            let name = self.token_text(tok).to_string();
                            self.error(tok, format!("unknown type name '{name}'"));
                            error_type()
                        }
                    }
                } else {
                    // The parser already complained about the missing type.
                    error_type()
                }
            }
            TypeSpec::Struct(decl) => {
                self.check_struct_decl(decl);
                self.info.qual_type(decl)
            }
        };

        let resolved = match array_spec {
            Some(spec) => {
                let dims = self.resolve_array_dimensions(spec);
                self.types.get_array_type(base, &dims)
            }
            None => base,
        };
        self.info.resolved_types.insert(id, resolved);
        resolved
    }

    fn is_type_decl(&self, decl: NodeId) -> bool {
        matches!(self.ast.decl(decl), Some(AstDecl::Struct { .. }) | Some(AstDecl::InterfaceBlock { .. }))
    }

    /// Evaluate the size expressions of an array specifier. A missing or
    /// non-constant size becomes 0, the unsized/error-sized marker.
    fn resolve_array_dimensions(&mut self, array_spec: NodeId) -> Vec<usize> {
        let AstNodeKind::ArraySpec { sizes } = self.ast.get(array_spec).kind.clone() else {
            return Vec::new();
        };
        let mut dims = Vec::with_capacity(sizes.len());
        for size in sizes {
            match size {
                None => dims.push(0),
                Some(expr) => {
                    let ty = self.check_expr(expr);
                    if !self.types.get(ty).is_integral() && !self.types.get(ty).is_error() {
                        self.error_at_node(expr, "array size must be an integral expression");
                        dims.push(0);
                        continue;
                    }
                    match self.eval_const(expr).get_index_value() {
                        Some(value) => dims.push(value),
                        None => {
                            if !self.types.get(ty).is_error() {
                                self.error_at_node(expr, "array size must be a constant expression");
                            }
                            dims.push(0);
                        }
                    }
                }
            }
        }
        dims
    }

    fn apply_declarator_array(&mut self, base: TypeId, array_spec: Option<NodeId>) -> TypeId {
        match array_spec {
            Some(spec) => {
                let dims = self.resolve_array_dimensions(spec);
                self.types.get_array_type(base, &dims)
            }
            None => base,
        }
    }

    //
    // Declarations
    //

    fn check_decl(&mut self, id: NodeId) {
        let Some(decl) = self.ast.decl(id).cloned() else { return };
        match decl {
            AstDecl::Error | AstDecl::Empty | AstDecl::QualifierOnly { .. } => {}
            AstDecl::Precision { qual_type, .. } => {
                self.resolve_qual_type(qual_type);
            }
            AstDecl::Variable { qual_type, declarators } => {
                self.check_variable_decl(id, qual_type, &declarators);
            }
            AstDecl::Struct { .. } => self.check_struct_decl(id),
            AstDecl::Function { .. } => self.check_function_decl(id),
            AstDecl::InterfaceBlock { .. } => self.check_interface_block_decl(id),
            AstDecl::Param { .. } => {}
        }
    }

    fn check_variable_decl(
        &mut self,
        id: NodeId,
        qual_type: NodeId,
        declarators: &[VariableDeclarator],
    ) {
        let base = self.resolve_qual_type(qual_type);
        for (index, declarator) in declarators.iter().enumerate() {
            let declared = self.apply_declarator_array(base, declarator.array_spec);
            self.info.declarator_types.insert((id, index as u32), declared);
            if let Some(init) = declarator.initializer {
                self.check_initializer(init, declared);
            }
            self.table.add_symbol(self.token_atom(declarator.name), DeclView::new(id, index as u32));
        }
    }

    fn check_struct_decl(&mut self, id: NodeId) {
        if self.info.resolved_types.contains_key(&id) {
            return;
        }
        let Some(AstDecl::Struct { name, members }) = self.ast.decl(id).cloned() else { return };

        let member_types = self.check_member_decls(&members);
        let struct_name = name.map(|tok| self.token_text(tok).to_string()).unwrap_or_default();
        let ty = self.types.create_struct_type(StructType {
            name: struct_name,
            decl: id,
            members: member_types,
            is_block: false,
        });
        self.info.resolved_types.insert(id, ty);

        if let Some(name_tok) = name {
            self.table.add_symbol(self.token_atom(name_tok), DeclView::new(id, 0));
        }
    }

    /// Resolve the member declarations of a struct body or interface block
    /// into the flattened member list. Member names do not enter any scope
    /// here.
    fn check_member_decls(&mut self, members: &[NodeId]) -> Vec<StructMemberType> {
        let mut result = Vec::new();
        for &member in members {
            let Some(AstDecl::Variable { qual_type, declarators }) = self.ast.decl(member).cloned()
            else {
                continue;
            };
            let base = self.resolve_qual_type(qual_type);
            for (index, declarator) in declarators.iter().enumerate() {
                let ty = self.apply_declarator_array(base, declarator.array_spec);
                self.info.declarator_types.insert((member, index as u32), ty);
                result.push(StructMemberType {
                    name: self.token_text(declarator.name).to_string(),
                    ty,
                    decl: member,
                    declarator_index: index as u32,
                });
            }
        }
        result
    }

    fn check_function_decl(&mut self, id: NodeId) {
        let Some(AstDecl::Function { return_type, name, params, body }) = self.ast.decl(id).cloned()
        else {
            return;
        };

        let return_ty = self.resolve_qual_type(return_type);
        let mut param_types = Vec::with_capacity(params.len());
        for &param in &params {
            let Some(AstDecl::Param { qual_type, declarator }) = self.ast.decl(param).cloned()
            else {
                param_types.push(error_type());
                continue;
            };
            let base = self.resolve_qual_type(qual_type);
            let ty = self.apply_declarator_array(base, declarator.and_then(|d| d.array_spec));
            self.info.declarator_types.insert((param, 0), ty);
            param_types.push(ty);
        }

        self.table.add_function(FunctionEntry {
            decl: id,
            name: self.token_atom(name),
            param_types,
            return_type: return_ty,
            first_declaration: None,
            has_body: body.is_some(),
        });

        if let Some(body) = body {
            self.table.push_scope();
            for &param in &params {
                if let Some(AstDecl::Param { declarator: Some(declarator), .. }) =
                    self.ast.decl(param)
                {
                    self.table.add_symbol(self.token_atom(declarator.name), DeclView::new(param, 0));
                }
            }
            self.current_return_type = Some(return_ty);
            self.check_stmt(body);
            self.current_return_type = None;
            self.table.pop_scope();
        }
    }

    fn check_interface_block_decl(&mut self, id: NodeId) {
        let Some(AstDecl::InterfaceBlock { name, members, instance, .. }) =
            self.ast.decl(id).cloned()
        else {
            return;
        };

        let member_types = self.check_member_decls(&members);
        let block_ty = self.types.create_struct_type(StructType {
            name: self.token_text(name).to_string(),
            decl: id,
            members: member_types,
            is_block: true,
        });
        self.info.resolved_types.insert(id, block_ty);

        match instance {
            Some(declarator) => {
                let declared = self.apply_declarator_array(block_ty, declarator.array_spec);
                self.info.declarator_types.insert((id, 0), declared);
                self.table.add_symbol(self.token_atom(declarator.name), DeclView::new(id, 0));
            }
            None => {
                // Without an instance name the members are visible
                // unqualified in the enclosing scope.
                for &member in &members {
                    if let Some(AstDecl::Variable { declarators, .. }) = self.ast.decl(member) {
                        for (index, declarator) in declarators.clone().iter().enumerate() {
                            self.table.add_symbol(
                                self.token_atom(declarator.name),
                                DeclView::new(member, index as u32),
                            );
                        }
                    }
                }
            }
        }
    }

    //
    // Statements
    //

    fn check_stmt(&mut self, id: NodeId) {
        let Some(stmt) = self.ast.stmt(id).cloned() else { return };
        match stmt {
            AstStmt::Error | AstStmt::Empty | AstStmt::Jump { .. } => {}
            AstStmt::Compound { stmts } => {
                self.table.push_scope();
                for s in stmts {
                    self.check_stmt(s);
                }
                self.table.pop_scope();
            }
            AstStmt::Expr { expr } => {
                self.check_expr(expr);
            }
            AstStmt::Decl { decl } => self.check_decl(decl),
            AstStmt::If { cond, then_stmt, else_stmt } => {
                self.check_bool_condition(cond);
                self.check_stmt(then_stmt);
                if let Some(else_stmt) = else_stmt {
                    self.check_stmt(else_stmt);
                }
            }
            AstStmt::For { init, cond, iter, body } => {
                self.table.push_scope();
                self.check_stmt(init);
                if let Some(cond) = cond {
                    self.check_bool_condition(cond);
                }
                if let Some(iter) = iter {
                    self.check_expr(iter);
                }
                self.check_stmt(body);
                self.table.pop_scope();
            }
            AstStmt::While { cond, body } => {
                self.check_bool_condition(cond);
                self.check_stmt(body);
            }
            AstStmt::DoWhile { body, cond } => {
                self.check_stmt(body);
                self.check_bool_condition(cond);
            }
            AstStmt::Switch { test, body } => {
                let ty = self.check_expr(test);
                if !self.types.get(ty).is_error() && !self.types.get(ty).is_integral() {
                    self.error_at_node(test, "switch condition must be an integral expression");
                }
                self.check_stmt(body);
            }
            AstStmt::Label { case_expr } => {
                if let Some(expr) = case_expr {
                    let ty = self.check_expr(expr);
                    if !self.types.get(ty).is_error() {
                        if !self.types.get(ty).is_integral() {
                            self.error_at_node(expr, "case label must be an integral expression");
                        } else if !self.expr_is_const(expr) {
                            self.error_at_node(expr, "case label must be a constant expression");
                        }
                    }
                }
            }
            AstStmt::Return { expr } => self.check_return_stmt(id, expr),
        }
    }

    fn check_bool_condition(&mut self, cond: NodeId) {
        let ty = self.check_expr(cond);
        if !self.types.get(ty).is_error() && !self.types.get(ty).is_scalar_bool() {
            self.error_at_node(cond, "condition must have bool type");
        }
    }

    fn check_return_stmt(&mut self, stmt: NodeId, expr: Option<NodeId>) {
        let Some(expected) = self.current_return_type else {
            return;
        };
        match expr {
            Some(expr) => {
                let ty = self.check_expr(expr);
                if !self.types.get(ty).is_error()
                    && !self.types.get(expected).is_error()
                    && !self.types.is_convertible_to(ty, expected)
                {
                    let found = self.type_name(ty);
                    let wanted = self.type_name(expected);
                    self.error_at_node(
                        expr,
                        format!("cannot return '{found}' from a function returning '{wanted}'"),
                    );
                }
            }
            None => {
                if !self.types.get(expected).is_void() && !self.types.get(expected).is_error() {
                    self.error_at_node(stmt, "non-void function must return a value");
                }
            }
        }
    }

    //
    // Expressions
    //

    fn check_initializer(&mut self, id: NodeId, expected: TypeId) {
        if let Some(AstExpr::InitializerList { items }) = self.ast.expr(id).cloned() {
            let declared_count = match &self.types.get(expected).kind {
                TypeKind::Array { dim_sizes, .. } => Some(dim_sizes[0]),
                _ => None,
            };
            if let Some(wanted) = declared_count {
                if wanted != 0 && wanted != items.len() {
                    self.error_at_node(
                        id,
                        format!("initializer list has {} element(s), expected {wanted}", items.len()),
                    );
                }
            }
            let component_types = self.initializer_component_types(expected, items.len());
            for (item, item_ty) in items.iter().zip(component_types) {
                self.check_initializer(*item, item_ty);
            }
            let is_const = items.iter().all(|&item| self.expr_is_const(item));
            self.set_expr_info(
                id,
                ExprInfo { deduced_type: expected, is_const, ..ExprInfo::default() },
            );
            return;
        }

        let ty = self.check_expr(id);
        if !self.types.get(ty).is_error()
            && !self.types.get(expected).is_error()
            && !self.types.is_convertible_to(ty, expected)
        {
            let found = self.type_name(ty);
            let wanted = self.type_name(expected);
            self.error_at_node(id, format!("cannot initialize '{wanted}' with '{found}'"));
        }
    }

    /// Expected type of each item of a brace initializer for `ty`.
    fn initializer_component_types(&mut self, ty: TypeId, count: usize) -> Vec<TypeId> {
        match self.types.get(ty).kind.clone() {
            TypeKind::Array { element, dim_sizes } => {
                let item = {
                    let rest = dim_sizes[1..].to_vec();
                    self.types.get_array_type(element, &rest)
                };
                vec![item; count]
            }
            TypeKind::Struct(desc) => {
                let mut out: Vec<TypeId> = desc.members.iter().map(|m| m.ty).collect();
                out.resize(count, error_type());
                out
            }
            TypeKind::Vector { scalar, .. } => vec![scalar_type(scalar); count],
            TypeKind::Matrix { scalar, rows, .. } => {
                vec![vector_type(scalar, rows as usize); count]
            }
            _ => vec![error_type(); count],
        }
    }

    fn check_expr(&mut self, id: NodeId) -> TypeId {
        if let Some(info) = self.info.expr_info.get(&id) {
            return info.deduced_type;
        }
        let Some(expr) = self.ast.expr(id).cloned() else { return error_type() };

        match expr {
            AstExpr::Error => self.set_expr_info(id, ExprInfo::default()),
            AstExpr::Literal { value } => {
                let deduced = value.type_id();
                self.set_expr_info(
                    id,
                    ExprInfo { deduced_type: deduced, is_const: true, ..ExprInfo::default() },
                )
            }
            AstExpr::NameAccess { name } => self.check_name_access(id, name),
            AstExpr::FieldAccess { base, name } => self.check_field_access(id, base, name),
            AstExpr::IndexAccess { base, array_spec } => {
                self.check_index_access(id, base, array_spec)
            }
            AstExpr::Unary { op, operand } => self.check_unary(id, op, operand),
            AstExpr::Binary { op, lhs, rhs } => self.check_binary(id, op, lhs, rhs),
            AstExpr::Select { cond, true_expr, false_expr } => {
                self.check_select(id, cond, true_expr, false_expr)
            }
            AstExpr::Invoke { invoked, args } => self.check_invoke(id, invoked, &args),
            AstExpr::ConstructorCall { qual_type, args } => {
                self.check_constructor_call(id, qual_type, &args)
            }
            AstExpr::InitializerList { items } => {
                // A bare initializer list without a declared type to guide it.
                for &item in &items {
                    self.check_expr(item);
                }
                let is_const = items.iter().all(|&item| self.expr_is_const(item));
                self.set_expr_info(id, ExprInfo { is_const, ..ExprInfo::default() })
            }
        }
    }

    fn check_name_access(&mut self, id: NodeId, name: SyntaxTokenId) -> TypeId {
        let atom = self.token_atom(name);
        match self.table.find_symbol(atom) {
            Some(view) => {
                let (deduced, is_const) = self.decl_view_info(view);
                self.set_expr_info(
                    id,
                    ExprInfo {
                        deduced_type: deduced,
                        is_const,
                        resolved_decl: Some(view),
                        access: NameAccessKind::Variable,
                        ..ExprInfo::default()
                    },
                )
            }
            None => {
                let text = self.token_text(name).to_string();
                self.error(name, format!("unknown identifier '{text}'"));
                self.set_expr_info(id, ExprInfo::default())
            }
        }
    }

    /// The type and constness a name reference gets from its declaration.
    fn decl_view_info(&self, view: DeclView) -> (TypeId, bool) {
        match self.ast.decl(view.decl) {
            Some(AstDecl::Variable { qual_type, .. }) => {
                let ty = self.lookup_declarator_type(view.decl, view.index);
                let is_const = self.qual_group_of(*qual_type).q_const;
                (ty, is_const)
            }
            Some(AstDecl::Param { .. }) => (self.lookup_declarator_type(view.decl, 0), false),
            Some(AstDecl::InterfaceBlock { .. }) => (self.lookup_declarator_type(view.decl, 0), false),
            // A type name used as a value keeps the error type; constructor
            // uses are resolved at the call site.
            _ => (error_type(), false),
        }
    }

    fn check_field_access(&mut self, id: NodeId, base: NodeId, name: SyntaxTokenId) -> TypeId {
        let base_ty = self.check_expr(base);
        let base_is_const = self.expr_is_const(base);
        let base_kind = self.types.get(base_ty).kind.clone();

        match base_kind {
            TypeKind::Struct(desc) => {
                let field = self.token_text(name).to_string();
                match desc.find_member(&field) {
                    Some((position, member)) => self.set_expr_info(
                        id,
                        ExprInfo {
                            deduced_type: member.ty,
                            is_const: base_is_const,
                            resolved_decl: Some(DeclView::new(member.decl, member.declarator_index)),
                            access: NameAccessKind::Variable,
                            member_index: Some(position as u32),
                            ..ExprInfo::default()
                        },
                    ),
                    None => {
                        self.error(name, format!("'{}' has no member named '{field}'", desc.name));
                        self.set_expr_info(id, ExprInfo::default())
                    }
                }
            }
            TypeKind::Scalar(kind) => self.check_swizzle(id, name, kind, 1, base_is_const),
            TypeKind::Vector { scalar, size } => {
                self.check_swizzle(id, name, scalar, size as usize, base_is_const)
            }
            // Arrays and matrices have no fields; `.length()` is recognized
            // at the call, so the error type stays silent here.
            _ => self.set_expr_info(id, ExprInfo::default()),
        }
    }

    fn check_swizzle(
        &mut self,
        id: NodeId,
        name: SyntaxTokenId,
        kind: ScalarKind,
        base_size: usize,
        base_is_const: bool,
    ) -> TypeId {
        const SETS: [&str; 3] = ["xyzw", "rgba", "stpq"];
        let text = self.token_text(name).to_string();

        if text.is_empty() || text.len() > 4 {
            self.error(name, format!("invalid swizzle '{text}'"));
            return self.set_expr_info(id, ExprInfo::default());
        }

        let set = SETS.iter().find(|set| set.contains(text.chars().next().unwrap()));
        let Some(set) = set else {
            self.error(name, format!("invalid swizzle '{text}'"));
            return self.set_expr_info(id, ExprInfo::default());
        };

        let mut indices = Vec::with_capacity(text.len());
        for ch in text.chars() {
            match set.find(ch) {
                Some(position) => {
                    if position >= base_size {
                        self.error(
                            name,
                            format!("swizzle component '{ch}' is out of range for the operand"),
                        );
                        return self.set_expr_info(id, ExprInfo::default());
                    }
                    indices.push(position as u8);
                }
                None => {
                    // A letter from another set: swizzles cannot mix sets.
                    self.error(name, format!("swizzle '{text}' mixes component sets"));
                    return self.set_expr_info(id, ExprInfo::default());
                }
            }
        }

        let deduced =
            if indices.len() == 1 { scalar_type(kind) } else { vector_type(kind, indices.len()) };
        self.set_expr_info(
            id,
            ExprInfo {
                deduced_type: deduced,
                is_const: base_is_const,
                access: NameAccessKind::Swizzle,
                swizzle: Some(SwizzleDesc { indices }),
                ..ExprInfo::default()
            },
        )
    }

    fn check_index_access(&mut self, id: NodeId, base: NodeId, array_spec: NodeId) -> TypeId {
        let base_ty = self.check_expr(base);
        let base_is_const = self.expr_is_const(base);

        let AstNodeKind::ArraySpec { sizes } = self.ast.get(array_spec).kind.clone() else {
            return self.set_expr_info(id, ExprInfo::default());
        };

        let mut all_const = base_is_const;
        let mut current = base_ty;
        for size in &sizes {
            let Some(index) = size else {
                self.error_at_node(array_spec, "expecting an index expression");
                current = error_type();
                continue;
            };
            let index_ty = self.check_expr(*index);
            if !self.types.get(index_ty).is_error() && !self.types.get(index_ty).is_integral() {
                self.error_at_node(*index, "index must be an integral expression");
            }
            all_const &= self.expr_is_const(*index);

            if self.types.get(current).is_error() {
                continue;
            }
            let element = self.types.index_element_type(current);
            if self.types.get(element).is_error() && !self.types.get(current).is_error() {
                let name = self.type_name(current);
                self.error_at_node(base, format!("'{name}' cannot be indexed"));
            }
            current = element;
        }

        self.set_expr_info(
            id,
            ExprInfo { deduced_type: current, is_const: all_const, ..ExprInfo::default() },
        )
    }

    fn check_unary(&mut self, id: NodeId, op: UnaryOp, operand: NodeId) -> TypeId {
        let operand_ty = self.check_expr(operand);
        let operand_const = self.expr_is_const(operand);
        let operand_is_error = self.types.get(operand_ty).is_error();

        let (deduced, is_const) = match op {
            UnaryOp::Identity => (operand_ty, operand_const),
            UnaryOp::Negate => {
                let ok = self.types.get(operand_ty).is_arithmetic()
                    && self.types.get(operand_ty).element_scalar_kind() != Some(ScalarKind::Bool);
                if ok {
                    (operand_ty, operand_const)
                } else {
                    if !operand_is_error {
                        self.error_at_node(operand, "operand of '-' must be arithmetic");
                    }
                    (error_type(), false)
                }
            }
            UnaryOp::BitwiseNot => {
                if self.types.get(operand_ty).is_integral() {
                    (operand_ty, operand_const)
                } else {
                    if !operand_is_error {
                        self.error_at_node(operand, "operand of '~' must be integral");
                    }
                    (error_type(), false)
                }
            }
            UnaryOp::LogicalNot => {
                if self.types.get(operand_ty).is_scalar_bool() {
                    (operand_ty, operand_const)
                } else {
                    if !operand_is_error {
                        self.error_at_node(operand, "operand of '!' must have bool type");
                    }
                    (error_type(), false)
                }
            }
            UnaryOp::PrefixInc | UnaryOp::PrefixDec | UnaryOp::PostfixInc | UnaryOp::PostfixDec => {
                if !self.is_lvalue(operand) && !operand_is_error {
                    self.error_at_node(operand, "operand of increment/decrement must be an l-value");
                }
                let ok = self.types.get(operand_ty).is_arithmetic()
                    && self.types.get(operand_ty).element_scalar_kind() != Some(ScalarKind::Bool);
                if ok || operand_is_error {
                    (operand_ty, false)
                } else {
                    self.error_at_node(operand, "operand of increment/decrement must be arithmetic");
                    (error_type(), false)
                }
            }
            UnaryOp::Length => (scalar_type(ScalarKind::Int), operand_const),
        };

        self.set_expr_info(id, ExprInfo { deduced_type: deduced, is_const, ..ExprInfo::default() })
    }

    fn is_lvalue(&self, id: NodeId) -> bool {
        match self.ast.expr(id) {
            Some(AstExpr::NameAccess { .. }) => true,
            Some(AstExpr::FieldAccess { base, .. }) => self.is_lvalue(*base),
            Some(AstExpr::IndexAccess { base, .. }) => self.is_lvalue(*base),
            _ => false,
        }
    }

    fn check_binary(&mut self, id: NodeId, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> TypeId {
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.check_expr(rhs);
        let lhs_const = self.expr_is_const(lhs);
        let rhs_const = self.expr_is_const(rhs);
        let either_error =
            self.types.get(lhs_ty).is_error() || self.types.get(rhs_ty).is_error();

        if op.is_assignment() {
            if !self.types.get(lhs_ty).is_error() && !self.is_lvalue(lhs) {
                self.error_at_node(lhs, "assignment target must be an l-value");
            }
            if !either_error && !self.types.is_convertible_to(rhs_ty, lhs_ty) {
                let from = self.type_name(rhs_ty);
                let to = self.type_name(lhs_ty);
                self.error_at_node(rhs, format!("cannot assign '{from}' to '{to}'"));
            }
            return self
                .set_expr_info(id, ExprInfo { deduced_type: lhs_ty, ..ExprInfo::default() });
        }

        if op == BinaryOp::Comma {
            return self
                .set_expr_info(id, ExprInfo { deduced_type: rhs_ty, ..ExprInfo::default() });
        }

        let (deduced, foldable) = self.deduce_binary_type(op, lhs_ty, rhs_ty);
        if self.types.get(deduced).is_error() && !either_error {
            let left = self.type_name(lhs_ty);
            let right = self.type_name(rhs_ty);
            self.error_at_node(id, format!("invalid operands '{left}' and '{right}'"));
        }
        let is_const = lhs_const && rhs_const && foldable && !self.types.get(deduced).is_error();
        self.set_expr_info(id, ExprInfo { deduced_type: deduced, is_const, ..ExprInfo::default() })
    }

    /// Result type of a non-assignment binary operator, plus whether the
    /// operation is element-wise foldable (linear-algebra products are
    /// typed but not folded).
    fn deduce_binary_type(&self, op: BinaryOp, lhs: TypeId, rhs: TypeId) -> (TypeId, bool) {
        use BinaryOp::*;
        let lhs_t = self.types.get(lhs);
        let rhs_t = self.types.get(rhs);

        match op {
            Plus | Minus | Mul | Div | Modulo => {
                if !lhs_t.is_arithmetic() || !rhs_t.is_arithmetic() {
                    return (error_type(), false);
                }
                let (Some(lk), Some(rk)) = (lhs_t.element_scalar_kind(), rhs_t.element_scalar_kind())
                else {
                    return (error_type(), false);
                };
                if lk == ScalarKind::Bool || rk == ScalarKind::Bool {
                    return (error_type(), false);
                }
                let Some(common) = common_scalar_kind(lk, rk) else {
                    return (error_type(), false);
                };
                if op == Modulo && !(lk.is_integral() && rk.is_integral()) {
                    return (error_type(), false);
                }

                let ld = lhs_t.dimension();
                let rd = rhs_t.dimension();
                if ld == rd {
                    return (arithmetic_type(common, ld), true);
                }
                if ld == (ValueDim { rows: 1, cols: 1 }) {
                    return (arithmetic_type(common, rd), true);
                }
                if rd == (ValueDim { rows: 1, cols: 1 }) {
                    return (arithmetic_type(common, ld), true);
                }
                if op == Mul {
                    // Linear algebra: matCxR * vecC -> vecR, vecR * matCxR
                    // -> vecC, matAxB * matCxA -> matCxB.
                    if lhs_t.is_matrix() && rhs_t.is_vector() && rd.cols == ld.cols {
                        return (vector_type(common, ld.rows as usize), false);
                    }
                    if lhs_t.is_vector() && rhs_t.is_matrix() && ld.cols == rd.rows {
                        return (vector_type(common, rd.cols as usize), false);
                    }
                    if lhs_t.is_matrix() && rhs_t.is_matrix() && ld.cols == rd.rows {
                        return (
                            crate::types::matrix_type(common, rd.cols as usize, ld.rows as usize),
                            false,
                        );
                    }
                }
                (error_type(), false)
            }
            ShiftLeft | ShiftRight => {
                if lhs_t.is_integral()
                    && rhs_t.is_integral()
                    && (rhs_t.is_scalar() || rhs_t.dimension() == lhs_t.dimension())
                {
                    (lhs, true)
                } else {
                    (error_type(), false)
                }
            }
            BitwiseAnd | BitwiseOr | BitwiseXor => {
                if !lhs_t.is_integral() || !rhs_t.is_integral() {
                    return (error_type(), false);
                }
                let (Some(lk), Some(rk)) = (lhs_t.element_scalar_kind(), rhs_t.element_scalar_kind())
                else {
                    return (error_type(), false);
                };
                let Some(common) = common_scalar_kind(lk, rk) else {
                    return (error_type(), false);
                };
                let ld = lhs_t.dimension();
                let rd = rhs_t.dimension();
                let one = ValueDim { rows: 1, cols: 1 };
                if ld == rd || rd == one {
                    (arithmetic_type(common, ld), true)
                } else if ld == one {
                    (arithmetic_type(common, rd), true)
                } else {
                    (error_type(), false)
                }
            }
            Equal | NotEqual => {
                let comparable = !self.types.get(lhs).contains_opaque
                    && !self.types.get(rhs).contains_opaque
                    && (self.types.is_convertible_to(lhs, rhs)
                        || self.types.is_convertible_to(rhs, lhs));
                if comparable {
                    (scalar_type(ScalarKind::Bool), true)
                } else {
                    (error_type(), false)
                }
            }
            Less | LessEq | Greater | GreaterEq => {
                let comparable = lhs_t.is_scalar()
                    && rhs_t.is_scalar()
                    && lhs_t.element_scalar_kind() != Some(ScalarKind::Bool)
                    && rhs_t.element_scalar_kind() != Some(ScalarKind::Bool)
                    && (self.types.is_convertible_to(lhs, rhs)
                        || self.types.is_convertible_to(rhs, lhs));
                if comparable {
                    (scalar_type(ScalarKind::Bool), true)
                } else {
                    (error_type(), false)
                }
            }
            LogicalAnd | LogicalOr | LogicalXor => {
                if lhs_t.is_scalar_bool() && rhs_t.is_scalar_bool() {
                    (scalar_type(ScalarKind::Bool), true)
                } else {
                    (error_type(), false)
                }
            }
            Comma | Assign | MulAssign | DivAssign | ModAssign | AddAssign | SubAssign
            | LShiftAssign | RShiftAssign | AndAssign | XorAssign | OrAssign => {
                (error_type(), false)
            }
        }
    }

    fn check_select(
        &mut self,
        id: NodeId,
        cond: NodeId,
        true_expr: NodeId,
        false_expr: NodeId,
    ) -> TypeId {
        let cond_ty = self.check_expr(cond);
        if !self.types.get(cond_ty).is_error() && !self.types.get(cond_ty).is_scalar_bool() {
            self.error_at_node(cond, "selection condition must have bool type");
        }

        let true_ty = self.check_expr(true_expr);
        let false_ty = self.check_expr(false_expr);
        let deduced = if true_ty == false_ty {
            true_ty
        } else if self.types.is_convertible_to(true_ty, false_ty) {
            false_ty
        } else if self.types.is_convertible_to(false_ty, true_ty) {
            true_ty
        } else {
            if !self.types.get(true_ty).is_error() && !self.types.get(false_ty).is_error() {
                let left = self.type_name(true_ty);
                let right = self.type_name(false_ty);
                self.error_at_node(
                    id,
                    format!("incompatible selection branches '{left}' and '{right}'"),
                );
            }
            error_type()
        };

        let is_const = self.expr_is_const(cond)
            && self.expr_is_const(true_expr)
            && self.expr_is_const(false_expr)
            && !self.types.get(deduced).is_error();
        self.set_expr_info(id, ExprInfo { deduced_type: deduced, is_const, ..ExprInfo::default() })
    }

    fn check_constructor_call(&mut self, id: NodeId, qual_type: NodeId, args: &[NodeId]) -> TypeId {
        let mut ty = self.resolve_qual_type(qual_type);
        let arg_types: Vec<TypeId> = args.iter().map(|&arg| self.check_expr(arg)).collect();
        let any_error = arg_types.iter().any(|&t| self.types.get(t).is_error());

        if !any_error {
            ty = self.validate_constructor(id, ty, args, &arg_types);
        }

        let is_const =
            !args.is_empty() && args.iter().all(|&arg| self.expr_is_const(arg)) && !self.types.get(ty).is_error();
        self.set_expr_info(
            id,
            ExprInfo {
                deduced_type: ty,
                is_const,
                access: NameAccessKind::Constructor,
                ..ExprInfo::default()
            },
        )
    }

    /// Arity and component-count validation for constructor calls. Returns
    /// the (possibly completed) constructed type.
    fn validate_constructor(
        &mut self,
        id: NodeId,
        ty: TypeId,
        args: &[NodeId],
        arg_types: &[TypeId],
    ) -> TypeId {
        match self.types.get(ty).kind.clone() {
            TypeKind::Scalar(_) => {
                if args.len() != 1 || !self.types.get(arg_types[0]).is_arithmetic() {
                    self.error_at_node(id, "scalar constructor takes exactly one arithmetic argument");
                    return error_type();
                }
                ty
            }
            TypeKind::Vector { size, .. } => {
                if args.len() == 1 {
                    if !self.types.get(arg_types[0]).is_arithmetic() {
                        self.error_at_node(id, "vector constructor argument must be arithmetic");
                        return error_type();
                    }
                    return ty;
                }
                let mut components = 0usize;
                for &arg_ty in arg_types {
                    match self.types.get(arg_ty).element_scalar_count() {
                        Some(count) => components += count,
                        None => {
                            self.error_at_node(id, "vector constructor arguments must be arithmetic");
                            return error_type();
                        }
                    }
                }
                if components != size as usize {
                    self.error_at_node(
                        id,
                        format!(
                            "vector constructor needs {size} components, got {components}"
                        ),
                    );
                    return error_type();
                }
                ty
            }
            TypeKind::Matrix { cols, rows, .. } => {
                if args.len() == 1 {
                    let arg = self.types.get(arg_types[0]);
                    if !(arg.is_scalar() || arg.is_matrix()) {
                        self.error_at_node(
                            id,
                            "single-argument matrix constructor takes a scalar or a matrix",
                        );
                        return error_type();
                    }
                    return ty;
                }
                let mut components = 0usize;
                for &arg_ty in arg_types {
                    let arg = self.types.get(arg_ty);
                    if arg.is_matrix() {
                        self.error_at_node(id, "matrix constructor arguments must be scalars or vectors");
                        return error_type();
                    }
                    components += arg.element_scalar_count().unwrap_or(0);
                }
                let wanted = cols as usize * rows as usize;
                if components != wanted {
                    self.error_at_node(
                        id,
                        format!("matrix constructor needs {wanted} components, got {components}"),
                    );
                    return error_type();
                }
                ty
            }
            TypeKind::Array { element, dim_sizes } => {
                if dim_sizes[0] == 0 {
                    // `T[](...)` completes its size from the argument count.
                    let mut dims = dim_sizes.clone();
                    dims[0] = args.len();
                    return self.types.get_array_type(element, &dims);
                }
                if args.len() != dim_sizes[0] {
                    self.error_at_node(
                        id,
                        format!(
                            "array constructor needs {} element(s), got {}",
                            dim_sizes[0],
                            args.len()
                        ),
                    );
                    return error_type();
                }
                ty
            }
            TypeKind::Struct(desc) => {
                if args.len() != desc.members.len() {
                    self.error_at_node(
                        id,
                        format!(
                            "constructor of '{}' needs {} argument(s), got {}",
                            desc.name,
                            desc.members.len(),
                            args.len()
                        ),
                    );
                    return error_type();
                }
                ty
            }
            _ => ty,
        }
    }

    fn check_invoke(&mut self, id: NodeId, invoked: NodeId, args: &[NodeId]) -> TypeId {
        // `expr.length()` is a unary length operation, not a method call.
        if let Some(AstExpr::FieldAccess { base, name }) = self.ast.expr(invoked).cloned() {
            if args.is_empty() && self.token_text(name) == "length" {
                return self.check_length_call(id, invoked, base);
            }
        }

        let arg_types: Vec<TypeId> = args.iter().map(|&arg| self.check_expr(arg)).collect();

        if let Some(AstExpr::NameAccess { name }) = self.ast.expr(invoked).cloned() {
            return self.check_named_invoke(id, invoked, name, args, &arg_types);
        }

        // `S[2](...)`: an index access over a struct name is an array
        // constructor.
        if let Some(AstExpr::IndexAccess { base, array_spec }) = self.ast.expr(invoked).cloned() {
            if let Some(AstExpr::NameAccess { name }) = self.ast.expr(base).cloned() {
                if let Some(view) = self.table.find_symbol(self.token_atom(name)) {
                    if self.is_type_decl(view.decl) {
                        let element = self.lookup_decl_type(view.decl);
                        let dims = self.resolve_array_dimensions(array_spec);
                        let array_ty = self.types.get_array_type(element, &dims);
                        let ty = self.validate_constructor(id, array_ty, args, &arg_types);
                        self.set_expr_info(
                            base,
                            ExprInfo {
                                resolved_decl: Some(view),
                                access: NameAccessKind::Constructor,
                                ..ExprInfo::default()
                            },
                        );
                        self.set_expr_info(invoked, ExprInfo::default());
                        let is_const = args.iter().all(|&arg| self.expr_is_const(arg))
                            && !self.types.get(ty).is_error();
                        return self.set_expr_info(
                            id,
                            ExprInfo {
                                deduced_type: ty,
                                is_const,
                                access: NameAccessKind::Constructor,
                                ..ExprInfo::default()
                            },
                        );
                    }
                }
            }
        }

        // Anything else is not invocable.
        let invoked_ty = self.check_expr(invoked);
        if !self.types.get(invoked_ty).is_error() {
            self.error_at_node(invoked, "expression is not callable");
        }
        self.set_expr_info(id, ExprInfo::default())
    }

    fn check_length_call(&mut self, id: NodeId, invoked: NodeId, base: NodeId) -> TypeId {
        let base_ty = self.check_expr(base);
        let base_kind = self.types.get(base_ty).kind.clone();

        // Record the field-access receiver so downstream queries see a
        // total tree.
        self.set_expr_info(
            invoked,
            ExprInfo { access: NameAccessKind::LengthMethod, ..ExprInfo::default() },
        );

        let (deduced, is_const) = match base_kind {
            TypeKind::Array { ref dim_sizes, .. } => {
                (scalar_type(ScalarKind::Int), dim_sizes[0] != 0)
            }
            TypeKind::Vector { .. } | TypeKind::Matrix { .. } => {
                (scalar_type(ScalarKind::Int), true)
            }
            // Not an array or vector: error type without a diagnostic.
            _ => (error_type(), false),
        };

        self.set_expr_info(
            id,
            ExprInfo {
                deduced_type: deduced,
                is_const,
                access: NameAccessKind::LengthMethod,
                ..ExprInfo::default()
            },
        )
    }

    fn check_named_invoke(
        &mut self,
        id: NodeId,
        invoked: NodeId,
        name: SyntaxTokenId,
        args: &[NodeId],
        arg_types: &[TypeId],
    ) -> TypeId {
        let atom = self.token_atom(name);
        let text = self.token_text(name).to_string();

        match self.table.find_function(atom, arg_types, self.types) {
            FunctionLookup::Found(entry) => {
                self.set_expr_info(
                    invoked,
                    ExprInfo {
                        resolved_decl: Some(DeclView::new(entry.first_declaration.unwrap_or(entry.decl), 0)),
                        access: NameAccessKind::Function,
                        ..ExprInfo::default()
                    },
                );
                let is_const = is_const_eval_function(&text)
                    && args.iter().all(|&arg| self.expr_is_const(arg));
                self.set_expr_info(
                    id,
                    ExprInfo {
                        deduced_type: entry.return_type,
                        is_const,
                        access: NameAccessKind::Function,
                        ..ExprInfo::default()
                    },
                )
            }
            FunctionLookup::Ambiguous(candidates) => {
                let mut message = format!("ambiguous call to '{text}'; candidates:");
                for candidate in &candidates {
                    let params: Vec<String> =
                        candidate.param_types.iter().map(|&t| self.type_name(t)).collect();
                    message.push_str(&format!(" {text}({})", params.join(", ")));
                }
                self.error(name, message);
                self.set_expr_info(invoked, ExprInfo::default());
                self.set_expr_info(id, ExprInfo::default())
            }
            FunctionLookup::NotFound => {
                // A user-defined struct name makes this a constructor call.
                if let Some(view) = self.table.find_symbol(atom) {
                    if self.is_type_decl(view.decl) {
                        let ty = self.lookup_decl_type(view.decl);
                        let ty = self.validate_constructor(id, ty, args, arg_types);
                        self.set_expr_info(
                            invoked,
                            ExprInfo {
                                resolved_decl: Some(view),
                                access: NameAccessKind::Constructor,
                                ..ExprInfo::default()
                            },
                        );
                        let is_const = args.iter().all(|&arg| self.expr_is_const(arg))
                            && !self.types.get(ty).is_error();
                        return self.set_expr_info(
                            id,
                            ExprInfo {
                                deduced_type: ty,
                                is_const,
                                access: NameAccessKind::Constructor,
                                ..ExprInfo::default()
                            },
                        );
                    }
                }
                self.error(name, format!("no matching function for call to '{text}'"));
                self.set_expr_info(invoked, ExprInfo::default());
                self.set_expr_info(id, ExprInfo::default())
            }
        }
    }
}

/// Join of two base scalar kinds on the promotion lattice.
fn common_scalar_kind(a: ScalarKind, b: ScalarKind) -> Option<ScalarKind> {
    if a == b {
        return Some(a);
    }
    let ra = a.promotion_rank()?;
    let rb = b.promotion_rank()?;
    Some(if ra >= rb { a } else { b })
}
