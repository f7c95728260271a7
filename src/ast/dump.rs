//! AST dumps for debugging and tests: a JSON view and an indented tree
//! view. Both resolve token text through the atom table so names appear as
//! written.

use super::{AstContext, AstNodeKind, NodeId, TypeSpec};
use crate::atom::AtomTable;
use crate::lexing::{LexContext, SyntaxTokenId};
use serde_json::{json, Value};

pub struct AstDumper<'a> {
    pub ast: &'a AstContext,
    pub lex: &'a LexContext,
    pub atoms: &'a AtomTable,
}

impl AstDumper<'_> {
    fn token_text(&self, id: SyntaxTokenId) -> &str {
        self.atoms.resolve(self.lex.get_token(id).text)
    }

    /// Serialize the subtree at `root` as JSON.
    pub fn to_json(&self, root: NodeId) -> Value {
        let node = self.ast.get(root);
        let range = self.lex.expanded_range_of(node.range);

        let mut object = serde_json::Map::new();
        object.insert("tag".into(), json!(node.tag()));
        object.insert(
            "range".into(),
            json!(format!(
                "{}:{}~{}:{}",
                range.start.line, range.start.character, range.end.line, range.end.character
            )),
        );

        if let Some(name) = self.node_display_name(root) {
            object.insert("name".into(), json!(name));
        }
        if let AstNodeKind::Expr(super::AstExpr::Literal { value }) = &node.kind {
            object.insert("value".into(), serde_json::to_value(value).unwrap_or(Value::Null));
        }

        let mut children = Vec::new();
        node.for_each_child(|child| children.push(self.to_json(child)));
        if !children.is_empty() {
            object.insert("children".into(), Value::Array(children));
        }
        Value::Object(object)
    }

    /// Render the subtree at `root` as an indented tree.
    pub fn to_treeviz(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.treeviz_node(root, 0, &mut out);
        out
    }

    fn treeviz_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.ast.get(id);
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(node.tag());
        if let Some(name) = self.node_display_name(id) {
            out.push_str(" '");
            out.push_str(&name);
            out.push('\'');
        }
        out.push('\n');
        node.for_each_child(|child| self.treeviz_node(child, depth + 1, out));
    }

    fn node_display_name(&self, id: NodeId) -> Option<String> {
        use super::{AstDecl, AstExpr};
        match &self.ast.get(id).kind {
            AstNodeKind::Expr(AstExpr::NameAccess { name })
            | AstNodeKind::Expr(AstExpr::FieldAccess { name, .. }) => {
                Some(self.token_text(*name).to_string())
            }
            AstNodeKind::Expr(AstExpr::Unary { op, .. }) => Some(format!("{op:?}")),
            AstNodeKind::Expr(AstExpr::Binary { op, .. }) => Some(format!("{op:?}")),
            AstNodeKind::Decl(AstDecl::Function { name, .. }) => {
                Some(self.token_text(*name).to_string())
            }
            AstNodeKind::Decl(AstDecl::Variable { declarators, .. }) => {
                let names: Vec<&str> =
                    declarators.iter().map(|d| self.token_text(d.name)).collect();
                Some(names.join(", "))
            }
            AstNodeKind::Decl(AstDecl::Struct { name, .. }) => {
                name.map(|n| self.token_text(n).to_string())
            }
            AstNodeKind::Decl(AstDecl::InterfaceBlock { name, .. }) => {
                Some(self.token_text(*name).to_string())
            }
            AstNodeKind::QualType { spec: TypeSpec::Token(tok), .. } => {
                Some(self.token_text(*tok).to_string())
            }
            _ => None,
        }
    }
}
