//! Constant expression evaluation.
//!
//! Folding is lazy over aggregates: an initializer list or an array/struct
//! constructor is not materialized into a value, it stays a list of nodes
//! that indexing and member access unwrap on demand. Scalar, vector, and
//! matrix computation bottoms out in the element-wise operations of
//! [`ConstValue`]. Only expressions the checker marked constant fold;
//! everything else yields the error value.

use crate::ast::{AstContext, AstDecl, AstExpr, BinaryOp, NodeId, UnaryOp};
use crate::atom::AtomTable;
use crate::lexing::LexContext;
use crate::semantic::{NameAccessKind, SemanticInfo};
use crate::types::{ConstValue, TypeContext, TypeKind};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Documented folding limits for constructor flattening.
pub const MAX_VECTOR_SIZE: usize = 4;
pub const MAX_MATRIX_SIZE: usize = 16;

pub struct ConstEvalContext<'a> {
    pub ast: &'a AstContext,
    pub lex: &'a LexContext,
    pub atoms: &'a AtomTable,
    pub types: &'a TypeContext,
    pub sema: &'a SemanticInfo,
}

/// The builtin functions that participate in constant folding.
pub fn is_const_eval_function(name: &str) -> bool {
    static FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
        HashSet::from([
            "radians",
            "degrees",
            "sin",
            "cos",
            "asin",
            "acos",
            "exp",
            "log",
            "exp2",
            "log2",
            "sqrt",
            "inversesqrt",
            "abs",
            "sign",
            "floor",
            "trunc",
            "round",
            "ceil",
            "min",
            "max",
            "pow",
            "clamp",
        ])
    });
    FUNCTIONS.contains(name)
}

/// Evaluate a constant expression to a value. Aggregate results (array and
/// struct constants) have no scalar representation and collapse to the
/// error value, matching their use sites.
pub fn eval_ast_expr(cx: &ConstEvalContext<'_>, expr: NodeId) -> ConstValue {
    match eval_lazy(cx, expr) {
        LazyResult::Value(value) => value,
        LazyResult::Aggregate(_) => ConstValue::Error,
    }
}

enum LazyResult {
    Value(ConstValue),
    Aggregate(Vec<NodeId>),
}

impl LazyResult {
    fn error() -> Self {
        LazyResult::Value(ConstValue::Error)
    }
}

fn unwrap_element(cx: &ConstEvalContext<'_>, result: LazyResult, index: usize) -> LazyResult {
    match result {
        LazyResult::Value(value) => LazyResult::Value(value.element(index)),
        LazyResult::Aggregate(items) => match items.get(index) {
            Some(&item) => eval_lazy(cx, item),
            None => LazyResult::error(),
        },
    }
}

fn eval_lazy(cx: &ConstEvalContext<'_>, expr: NodeId) -> LazyResult {
    if !cx.sema.is_const_expr(expr) {
        return LazyResult::error();
    }
    let Some(node) = cx.ast.expr(expr) else { return LazyResult::error() };

    match node {
        AstExpr::Error => LazyResult::error(),
        AstExpr::InitializerList { items } => LazyResult::Aggregate(items.clone()),
        AstExpr::Literal { value } => LazyResult::Value(value.clone()),

        AstExpr::NameAccess { .. } => {
            // A const-qualified variable folds through its initializer.
            let Some(view) = cx.sema.resolved_decl(expr) else { return LazyResult::error() };
            let Some(AstDecl::Variable { declarators, .. }) = cx.ast.decl(view.decl) else {
                return LazyResult::error();
            };
            match declarators.get(view.index as usize).and_then(|d| d.initializer) {
                Some(init) => eval_lazy(cx, init),
                None => LazyResult::error(),
            }
        }

        AstExpr::FieldAccess { base, .. } => {
            let info = cx.sema.expr_info.get(&expr);
            if let Some(swizzle) = info.and_then(|i| i.swizzle.as_ref()) {
                // Swizzles evaluate eagerly.
                let base_value = eval_ast_expr(cx, *base);
                return LazyResult::Value(base_value.swizzle(&swizzle.indices));
            }
            match info.and_then(|i| i.member_index) {
                Some(index) => {
                    let base_result = eval_lazy(cx, *base);
                    unwrap_element(cx, base_result, index as usize)
                }
                None => LazyResult::error(),
            }
        }

        AstExpr::IndexAccess { base, array_spec } => {
            let crate::ast::AstNodeKind::ArraySpec { sizes } = &cx.ast.get(*array_spec).kind
            else {
                return LazyResult::error();
            };
            let mut current = eval_lazy(cx, *base);
            for size in sizes {
                let Some(index_expr) = size else { return LazyResult::error() };
                let Some(index) = eval_ast_expr(cx, *index_expr).get_index_value() else {
                    return LazyResult::error();
                };
                current = unwrap_element(cx, current, index);
            }
            current
        }

        AstExpr::Unary { op, operand } => {
            let operand_result = eval_lazy(cx, *operand);
            if let LazyResult::Aggregate(items) = &operand_result {
                // `.length()` is the only operation defined on aggregates.
                if *op == UnaryOp::Length {
                    return LazyResult::Value(ConstValue::from_int(items.len() as i32));
                }
                return LazyResult::error();
            }
            let LazyResult::Value(value) = operand_result else { return LazyResult::error() };
            LazyResult::Value(eval_unary_op(*op, &value))
        }

        AstExpr::Binary { op, lhs, rhs } => {
            let lhs_value = eval_ast_expr(cx, *lhs);
            let rhs_value = eval_ast_expr(cx, *rhs);
            LazyResult::Value(eval_binary_op(*op, &lhs_value, &rhs_value))
        }

        AstExpr::Select { cond, true_expr, false_expr } => {
            match eval_ast_expr(cx, *cond).get_bool_value() {
                Some(true) => eval_lazy(cx, *true_expr),
                Some(false) => eval_lazy(cx, *false_expr),
                None => LazyResult::error(),
            }
        }

        AstExpr::ConstructorCall { qual_type, args } => {
            eval_constructor(cx, cx.sema.qual_type(*qual_type), args)
        }

        AstExpr::Invoke { invoked, args } => {
            let access = cx.sema.expr_info.get(&expr).map(|i| i.access);
            match access {
                Some(NameAccessKind::LengthMethod) => {
                    let Some(AstExpr::FieldAccess { base, .. }) = cx.ast.expr(*invoked) else {
                        return LazyResult::error();
                    };
                    eval_length_of(cx, *base)
                }
                Some(NameAccessKind::Function) => {
                    let Some(AstExpr::NameAccess { name }) = cx.ast.expr(*invoked) else {
                        return LazyResult::error();
                    };
                    let func = cx.atoms.resolve(cx.lex.get_token(*name).text);
                    LazyResult::Value(eval_builtin_function(cx, func, args))
                }
                Some(NameAccessKind::Constructor) => {
                    // Struct or struct-array constructor.
                    LazyResult::Aggregate(args.clone())
                }
                _ => LazyResult::error(),
            }
        }
    }
}

fn eval_length_of(cx: &ConstEvalContext<'_>, base: NodeId) -> LazyResult {
    // Prefer the static type: a sized array's length is known without
    // evaluating the operand.
    let base_ty = cx.sema.expr_type(base);
    if let TypeKind::Array { dim_sizes, .. } = &cx.types.get(base_ty).kind {
        if dim_sizes[0] != 0 {
            return LazyResult::Value(ConstValue::from_int(dim_sizes[0] as i32));
        }
    }
    match eval_lazy(cx, base) {
        LazyResult::Aggregate(items) => LazyResult::Value(ConstValue::from_int(items.len() as i32)),
        LazyResult::Value(value) => LazyResult::Value(value.length()),
    }
}

fn eval_unary_op(op: UnaryOp, operand: &ConstValue) -> ConstValue {
    if operand.is_error() {
        return ConstValue::Error;
    }
    match op {
        UnaryOp::Identity => operand.clone(),
        UnaryOp::Negate => operand.elemwise_negate(),
        UnaryOp::BitwiseNot => operand.elemwise_bit_not(),
        UnaryOp::LogicalNot => operand.elemwise_logical_not(),
        // Constant expressions cannot have side effects.
        UnaryOp::PrefixInc | UnaryOp::PrefixDec | UnaryOp::PostfixInc | UnaryOp::PostfixDec => {
            ConstValue::Error
        }
        UnaryOp::Length => operand.length(),
    }
}

fn eval_binary_op(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> ConstValue {
    if lhs.is_error() || rhs.is_error() {
        return ConstValue::Error;
    }
    match op {
        BinaryOp::Plus => lhs.elemwise_plus(rhs),
        BinaryOp::Minus => lhs.elemwise_minus(rhs),
        BinaryOp::Mul => lhs.elemwise_mul(rhs),
        BinaryOp::Div => lhs.elemwise_div(rhs),
        BinaryOp::Modulo => lhs.elemwise_mod(rhs),
        BinaryOp::Equal => lhs.elemwise_equals(rhs),
        BinaryOp::NotEqual => lhs.elemwise_not_equals(rhs),
        BinaryOp::Less => lhs.elemwise_less_than(rhs),
        BinaryOp::LessEq => lhs.elemwise_less_than_eq(rhs),
        BinaryOp::Greater => lhs.elemwise_greater_than(rhs),
        BinaryOp::GreaterEq => lhs.elemwise_greater_than_eq(rhs),
        BinaryOp::BitwiseAnd => lhs.elemwise_bit_and(rhs),
        BinaryOp::BitwiseOr => lhs.elemwise_bit_or(rhs),
        BinaryOp::BitwiseXor => lhs.elemwise_bit_xor(rhs),
        BinaryOp::LogicalAnd => lhs.elemwise_logical_and(rhs),
        BinaryOp::LogicalOr => lhs.elemwise_logical_or(rhs),
        BinaryOp::LogicalXor => lhs.elemwise_logical_xor(rhs),
        BinaryOp::ShiftLeft => lhs.elemwise_shift_left(rhs),
        BinaryOp::ShiftRight => lhs.elemwise_shift_right(rhs),
        // Assignments and comma cannot produce constants.
        _ => ConstValue::Error,
    }
}

fn eval_constructor(cx: &ConstEvalContext<'_>, target: crate::types::TypeId, args: &[NodeId]) -> LazyResult {
    match cx.types.get(target).kind.clone() {
        TypeKind::Scalar(kind) => {
            if args.len() == 1 {
                let arg = eval_ast_expr(cx, args[0]);
                LazyResult::Value(ConstValue::construct_scalar(&arg, kind))
            } else {
                LazyResult::error()
            }
        }
        TypeKind::Vector { scalar, size } => {
            if args.len() == 1 {
                let arg = eval_ast_expr(cx, args[0]);
                LazyResult::Value(ConstValue::construct_vector(&arg, scalar, size as usize))
            } else if args.len() <= MAX_VECTOR_SIZE {
                let values: Vec<ConstValue> =
                    args.iter().map(|&arg| eval_ast_expr(cx, arg)).collect();
                LazyResult::Value(ConstValue::compose_vector(&values, scalar, size as usize))
            } else {
                LazyResult::error()
            }
        }
        TypeKind::Matrix { scalar, cols, rows } => {
            if args.len() == 1 {
                let arg = eval_ast_expr(cx, args[0]);
                LazyResult::Value(ConstValue::construct_matrix(
                    &arg,
                    scalar,
                    cols as usize,
                    rows as usize,
                ))
            } else if args.len() <= MAX_MATRIX_SIZE {
                let values: Vec<ConstValue> =
                    args.iter().map(|&arg| eval_ast_expr(cx, arg)).collect();
                LazyResult::Value(ConstValue::compose_matrix(
                    &values,
                    scalar,
                    cols as usize,
                    rows as usize,
                ))
            } else {
                LazyResult::error()
            }
        }
        TypeKind::Array { .. } | TypeKind::Struct(_) => LazyResult::Aggregate(args.to_vec()),
        _ => LazyResult::error(),
    }
}

fn eval_builtin_function(cx: &ConstEvalContext<'_>, name: &str, args: &[NodeId]) -> ConstValue {
    match args {
        [a] => {
            let a = eval_ast_expr(cx, *a);
            if a.is_error() {
                return ConstValue::Error;
            }
            match name {
                "radians" => a.elemwise_radians(),
                "degrees" => a.elemwise_degrees(),
                "sin" => a.elemwise_sin(),
                "cos" => a.elemwise_cos(),
                "asin" => a.elemwise_asin(),
                "acos" => a.elemwise_acos(),
                "exp" => a.elemwise_exp(),
                "log" => a.elemwise_log(),
                "exp2" => a.elemwise_exp2(),
                "log2" => a.elemwise_log2(),
                "sqrt" => a.elemwise_sqrt(),
                "inversesqrt" => a.elemwise_inverse_sqrt(),
                "abs" => a.elemwise_abs(),
                "sign" => a.elemwise_sign(),
                "floor" => a.elemwise_floor(),
                "trunc" => a.elemwise_trunc(),
                "round" => a.elemwise_round(),
                "ceil" => a.elemwise_ceil(),
                _ => ConstValue::Error,
            }
        }
        [a, b] => {
            let a = eval_ast_expr(cx, *a);
            let b = eval_ast_expr(cx, *b);
            if a.is_error() || b.is_error() {
                return ConstValue::Error;
            }
            match name {
                "min" => a.elemwise_min(&b),
                "max" => a.elemwise_max(&b),
                "pow" => a.elemwise_pow(&b),
                _ => ConstValue::Error,
            }
        }
        [a, b, c] => {
            let a = eval_ast_expr(cx, *a);
            let b = eval_ast_expr(cx, *b);
            let c = eval_ast_expr(cx, *c);
            if a.is_error() || b.is_error() || c.is_error() {
                return ConstValue::Error;
            }
            match name {
                "clamp" => a.elemwise_clamp(&b, &c),
                _ => ConstValue::Error,
            }
        }
        _ => ConstValue::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_eval_function_set_is_closed() {
        assert!(is_const_eval_function("sin"));
        assert!(is_const_eval_function("clamp"));
        assert!(is_const_eval_function("inversesqrt"));
        assert!(!is_const_eval_function("texture"));
        assert!(!is_const_eval_function("normalize"));
    }
}
