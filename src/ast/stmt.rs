//! Statement nodes.

use super::NodeId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JumpType {
    Break,
    Continue,
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstStmt {
    /// Placeholder produced by parser recovery.
    Error,
    /// A lone `;`.
    Empty,
    Compound {
        stmts: Vec<NodeId>,
    },
    Expr {
        expr: NodeId,
    },
    Decl {
        decl: NodeId,
    },
    If {
        cond: NodeId,
        then_stmt: NodeId,
        else_stmt: Option<NodeId>,
    },
    For {
        init: NodeId,
        cond: Option<NodeId>,
        iter: Option<NodeId>,
        body: NodeId,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    DoWhile {
        body: NodeId,
        cond: NodeId,
    },
    Switch {
        test: NodeId,
        body: NodeId,
    },
    /// `case expr:` or (with `case_expr` absent) `default:`.
    Label {
        case_expr: Option<NodeId>,
    },
    Jump {
        jump: JumpType,
    },
    Return {
        expr: Option<NodeId>,
    },
}

impl AstStmt {
    pub fn tag(&self) -> &'static str {
        match self {
            AstStmt::Error => "ErrorStmt",
            AstStmt::Empty => "EmptyStmt",
            AstStmt::Compound { .. } => "CompoundStmt",
            AstStmt::Expr { .. } => "ExprStmt",
            AstStmt::Decl { .. } => "DeclStmt",
            AstStmt::If { .. } => "IfStmt",
            AstStmt::For { .. } => "ForStmt",
            AstStmt::While { .. } => "WhileStmt",
            AstStmt::DoWhile { .. } => "DoWhileStmt",
            AstStmt::Switch { .. } => "SwitchStmt",
            AstStmt::Label { .. } => "LabelStmt",
            AstStmt::Jump { .. } => "JumpStmt",
            AstStmt::Return { .. } => "ReturnStmt",
        }
    }

    pub fn for_each_child(&self, mut f: impl FnMut(NodeId)) {
        match self {
            AstStmt::Error | AstStmt::Empty | AstStmt::Jump { .. } => {}
            AstStmt::Compound { stmts } => stmts.iter().copied().for_each(&mut f),
            AstStmt::Expr { expr } => f(*expr),
            AstStmt::Decl { decl } => f(*decl),
            AstStmt::If { cond, then_stmt, else_stmt } => {
                f(*cond);
                f(*then_stmt);
                if let Some(e) = else_stmt {
                    f(*e);
                }
            }
            AstStmt::For { init, cond, iter, body } => {
                f(*init);
                if let Some(c) = cond {
                    f(*c);
                }
                if let Some(i) = iter {
                    f(*i);
                }
                f(*body);
            }
            AstStmt::While { cond, body } => {
                f(*cond);
                f(*body);
            }
            AstStmt::DoWhile { body, cond } => {
                f(*body);
                f(*cond);
            }
            AstStmt::Switch { test, body } => {
                f(*test);
                f(*body);
            }
            AstStmt::Label { case_expr } => {
                if let Some(e) = case_expr {
                    f(*e);
                }
            }
            AstStmt::Return { expr } => {
                if let Some(e) = expr {
                    f(*e);
                }
            }
        }
    }
}
