//! Declaration nodes.

use super::NodeId;
use crate::lexing::SyntaxTokenId;
use serde::Serialize;

/// The non-layout qualifiers of a qualified type, collapsed into flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QualifierGroup {
    pub q_const: bool,
    pub q_in: bool,
    pub q_out: bool,
    pub q_inout: bool,
    pub q_uniform: bool,
    pub q_buffer: bool,
    pub q_shared: bool,
    pub q_centroid: bool,
    pub q_flat: bool,
    pub q_smooth: bool,
    pub q_noperspective: bool,
    pub q_patch: bool,
    pub q_sample: bool,
    pub q_invariant: bool,
    pub q_precise: bool,
    pub q_coherent: bool,
    pub q_volatile: bool,
    pub q_restrict: bool,
    pub q_readonly: bool,
    pub q_writeonly: bool,
    pub q_highp: bool,
    pub q_mediump: bool,
    pub q_lowp: bool,
}

impl QualifierGroup {
    pub fn is_empty(&self) -> bool {
        *self == QualifierGroup::default()
    }
}

/// The name-plus-optional-array-plus-optional-initializer fragment of a
/// multi-name declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableDeclarator {
    pub name: SyntaxTokenId,
    pub array_spec: Option<NodeId>,
    pub initializer: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstDecl {
    /// Placeholder produced by parser recovery.
    Error,
    /// A lone `;` at declaration position.
    Empty,
    Variable {
        qual_type: NodeId,
        declarators: Vec<VariableDeclarator>,
    },
    /// `struct Name { members };` members are variable declarations.
    Struct {
        name: Option<SyntaxTokenId>,
        members: Vec<NodeId>,
    },
    /// One function parameter; the declarator is absent for unnamed
    /// parameters like `(float)`.
    Param {
        qual_type: NodeId,
        declarator: Option<VariableDeclarator>,
    },
    Function {
        return_type: NodeId,
        name: SyntaxTokenId,
        params: Vec<NodeId>,
        /// `None` for a prototype declaration.
        body: Option<NodeId>,
    },
    /// `uniform Block { ... } instance;`
    InterfaceBlock {
        qualifiers: NodeId,
        name: SyntaxTokenId,
        members: Vec<NodeId>,
        instance: Option<VariableDeclarator>,
    },
    /// `precision highp float;`
    Precision {
        precision: SyntaxTokenId,
        qual_type: NodeId,
    },
    /// A bare qualifier declaration, e.g. `layout(early_fragment_tests) in;`
    QualifierOnly {
        qualifiers: NodeId,
    },
}

impl AstDecl {
    pub fn tag(&self) -> &'static str {
        match self {
            AstDecl::Error => "ErrorDecl",
            AstDecl::Empty => "EmptyDecl",
            AstDecl::Variable { .. } => "VariableDecl",
            AstDecl::Struct { .. } => "StructDecl",
            AstDecl::Param { .. } => "ParamDecl",
            AstDecl::Function { .. } => "FunctionDecl",
            AstDecl::InterfaceBlock { .. } => "InterfaceBlockDecl",
            AstDecl::Precision { .. } => "PrecisionDecl",
            AstDecl::QualifierOnly { .. } => "QualifierDecl",
        }
    }

    pub fn for_each_child(&self, mut f: impl FnMut(NodeId)) {
        let visit_declarator = |declarator: &VariableDeclarator, f: &mut dyn FnMut(NodeId)| {
            if let Some(a) = declarator.array_spec {
                f(a);
            }
            if let Some(init) = declarator.initializer {
                f(init);
            }
        };
        match self {
            AstDecl::Error | AstDecl::Empty => {}
            AstDecl::Variable { qual_type, declarators } => {
                f(*qual_type);
                for d in declarators {
                    visit_declarator(d, &mut f);
                }
            }
            AstDecl::Struct { members, .. } => members.iter().copied().for_each(&mut f),
            AstDecl::Param { qual_type, declarator } => {
                f(*qual_type);
                if let Some(d) = declarator {
                    visit_declarator(d, &mut f);
                }
            }
            AstDecl::Function { return_type, params, body, .. } => {
                f(*return_type);
                params.iter().copied().for_each(&mut f);
                if let Some(b) = body {
                    f(*b);
                }
            }
            AstDecl::InterfaceBlock { qualifiers, members, instance, .. } => {
                f(*qualifiers);
                members.iter().copied().for_each(&mut f);
                if let Some(d) = instance {
                    visit_declarator(d, &mut f);
                }
            }
            AstDecl::Precision { qual_type, .. } => f(*qual_type),
            AstDecl::QualifierOnly { qualifiers } => f(*qualifiers),
        }
    }
}
