//! Expression nodes.

use super::NodeId;
use crate::lexing::SyntaxTokenId;
use crate::types::ConstValue;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Identity,
    Negate,
    BitwiseNot,
    LogicalNot,
    PrefixInc,
    PrefixDec,
    PostfixInc,
    PostfixDec,
    /// `a.length()`, rewritten from a field-then-call form during type
    /// checking.
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Comma,

    Assign,
    MulAssign,
    DivAssign,
    ModAssign,
    AddAssign,
    SubAssign,
    LShiftAssign,
    RShiftAssign,
    AndAssign,
    XorAssign,
    OrAssign,

    Plus,
    Minus,
    Mul,
    Div,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::ModAssign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::LShiftAssign
                | BinaryOp::RShiftAssign
                | BinaryOp::AndAssign
                | BinaryOp::XorAssign
                | BinaryOp::OrAssign
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEq
                | BinaryOp::Greater
                | BinaryOp::GreaterEq
        )
    }
}

/// Expressions and brace initializer lists form one hierarchy: an
/// initializer is either an expression or a nested `{...}` list.
#[derive(Debug, Clone, PartialEq)]
pub enum AstExpr {
    /// Placeholder produced by parser recovery.
    Error,
    Literal {
        value: ConstValue,
    },
    NameAccess {
        name: SyntaxTokenId,
    },
    /// `base.name`; the checker decides whether this is a struct member, a
    /// swizzle, or the receiver of `.length()`.
    FieldAccess {
        base: NodeId,
        name: SyntaxTokenId,
    },
    IndexAccess {
        base: NodeId,
        /// An `ArraySpec` node carrying the bracketed index expressions.
        array_spec: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Select {
        cond: NodeId,
        true_expr: NodeId,
        false_expr: NodeId,
    },
    /// `callee(args...)` where the callee is an expression (function call or
    /// struct constructor, disambiguated by the checker).
    Invoke {
        invoked: NodeId,
        args: Vec<NodeId>,
    },
    /// `vec3(...)`, `float[2](...)`: the callee is a builtin type specifier,
    /// settled at parse time.
    ConstructorCall {
        qual_type: NodeId,
        args: Vec<NodeId>,
    },
    InitializerList {
        items: Vec<NodeId>,
    },
}

impl AstExpr {
    pub fn tag(&self) -> &'static str {
        match self {
            AstExpr::Error => "ErrorExpr",
            AstExpr::Literal { .. } => "LiteralExpr",
            AstExpr::NameAccess { .. } => "NameAccessExpr",
            AstExpr::FieldAccess { .. } => "FieldAccessExpr",
            AstExpr::IndexAccess { .. } => "IndexAccessExpr",
            AstExpr::Unary { .. } => "UnaryExpr",
            AstExpr::Binary { .. } => "BinaryExpr",
            AstExpr::Select { .. } => "SelectExpr",
            AstExpr::Invoke { .. } => "InvokeExpr",
            AstExpr::ConstructorCall { .. } => "ConstructorCallExpr",
            AstExpr::InitializerList { .. } => "InitializerList",
        }
    }

    pub fn for_each_child(&self, mut f: impl FnMut(NodeId)) {
        match self {
            AstExpr::Error | AstExpr::Literal { .. } | AstExpr::NameAccess { .. } => {}
            AstExpr::FieldAccess { base, .. } => f(*base),
            AstExpr::IndexAccess { base, array_spec } => {
                f(*base);
                f(*array_spec);
            }
            AstExpr::Unary { operand, .. } => f(*operand),
            AstExpr::Binary { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            AstExpr::Select { cond, true_expr, false_expr } => {
                f(*cond);
                f(*true_expr);
                f(*false_expr);
            }
            AstExpr::Invoke { invoked, args } => {
                f(*invoked);
                args.iter().copied().for_each(&mut f);
            }
            AstExpr::ConstructorCall { qual_type, args } => {
                f(*qual_type);
                args.iter().copied().for_each(&mut f);
            }
            AstExpr::InitializerList { items } => items.iter().copied().for_each(&mut f),
        }
    }
}
