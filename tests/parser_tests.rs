//! Parser integration suite: grammar coverage, tie-breaks, recovery, and
//! the halting property.

mod common;

use common::*;
use glsl_front::ast::{AstDecl, AstExpr, AstStmt, BinaryOp, NodeId, UnaryOp};
use proptest::prelude::*;
use rstest::rstest;

/// Tags of the top-level declarations of the parsed TU.
fn decl_tags(result: &glsl_front::CompileResult) -> Vec<&'static str> {
    tu_decls(result).iter().map(|&d| result.ast().get(d).tag()).collect()
}

#[test]
fn declaration_forms_parse() {
    let source = r#"
        precision highp float;
        uniform mat4 viewProj;
        const int kCount = 4, kOther = 2;
        struct Light { vec3 color; float radius; };
        layout(location = 0) in vec3 position;
        layout(std140) uniform Camera { mat4 view; mat4 proj; } camera;
        void helper();
        float helper2(float x, float y) { return x + y; }
        ;
    "#;
    let result = compile(source);
    assert_no_errors(&result);
    assert_eq!(
        decl_tags(&result),
        vec![
            "PrecisionDecl",
            "VariableDecl",
            "VariableDecl",
            "VariableDecl", // struct definition used as a type declaration
            "VariableDecl",
            "InterfaceBlockDecl",
            "FunctionDecl",
            "FunctionDecl",
            "EmptyDecl",
        ]
    );
}

#[test]
fn statement_forms_parse() {
    let source = r#"
        void f(int n) {
            int i = 0;
            for (int j = 0; j < n; ++j) { i += j; }
            while (i > 0) { i--; }
            do { i++; } while (i < 3);
            if (i == 3) discard; else i = 4;
            switch (i) {
                case 0:
                    break;
                default:
                    break;
            }
            ;
            return;
        }
    "#;
    let result = compile(source);
    assert_no_errors(&result);

    let body = match result.ast().decl(find_function(&result, "f").unwrap()) {
        Some(AstDecl::Function { body: Some(body), .. }) => *body,
        other => panic!("expected a function definition, got {other:?}"),
    };
    let stmts = match result.ast().stmt(body) {
        Some(AstStmt::Compound { stmts }) => stmts.clone(),
        other => panic!("expected a compound body, got {other:?}"),
    };
    let tags: Vec<&str> = stmts.iter().map(|&s| result.ast().get(s).tag()).collect();
    assert_eq!(
        tags,
        vec![
            "DeclStmt",
            "ForStmt",
            "WhileStmt",
            "DoWhileStmt",
            "IfStmt",
            "SwitchStmt",
            "EmptyStmt",
            "ReturnStmt",
        ]
    );
}

/// Walk into an expression, asserting the node shape along the way.
fn expr_of_initializer(result: &glsl_front::CompileResult, name: &str) -> NodeId {
    initializer_of(result, name).unwrap_or_else(|| panic!("variable {name} has an initializer"))
}

#[test]
fn precedence_climbing_shapes_the_tree() {
    let result = compile("int x = 1 + 2 * 3;");
    assert_no_errors(&result);
    let root = expr_of_initializer(&result, "x");
    match result.ast().expr(root) {
        Some(AstExpr::Binary { op: BinaryOp::Plus, rhs, .. }) => {
            match result.ast().expr(*rhs) {
                Some(AstExpr::Binary { op: BinaryOp::Mul, .. }) => {}
                other => panic!("rhs should be the multiplication, got {other:?}"),
            }
        }
        other => panic!("root should be the addition, got {other:?}"),
    }
}

#[test]
fn ternary_is_right_associative() {
    let result = compile("int x = true ? 1 : false ? 2 : 3;");
    assert_no_errors(&result);
    let root = expr_of_initializer(&result, "x");
    match result.ast().expr(root) {
        Some(AstExpr::Select { false_expr, .. }) => match result.ast().expr(*false_expr) {
            Some(AstExpr::Select { .. }) => {}
            other => panic!("false branch should nest the second ternary, got {other:?}"),
        },
        other => panic!("root should be a select, got {other:?}"),
    }
}

#[rstest]
#[case("int x = -a;", UnaryOp::Negate)]
#[case("int x = ~a;", UnaryOp::BitwiseNot)]
#[case("int x = a++;", UnaryOp::PostfixInc)]
#[case("int x = --a;", UnaryOp::PrefixDec)]
fn unary_forms(#[case] source: &str, #[case] expected: UnaryOp) {
    let full = format!("int a = 1;\n{source}");
    let result = compile(&full);
    let root = expr_of_initializer(&result, "x");
    match result.ast().expr(root) {
        Some(AstExpr::Unary { op, .. }) => assert_eq!(*op, expected),
        other => panic!("expected unary, got {other:?}"),
    }
}

#[test]
fn constructor_call_from_type_keyword() {
    let result = compile("vec3 v = vec3(1.0, 2.0, 3.0);");
    assert_no_errors(&result);
    let root = expr_of_initializer(&result, "v");
    match result.ast().expr(root) {
        Some(AstExpr::ConstructorCall { args, .. }) => assert_eq!(args.len(), 3),
        other => panic!("expected a constructor call, got {other:?}"),
    }
}

#[test]
fn array_constructor_is_not_an_index() {
    // `float[2](...)` must parse as a constructor call over the array
    // type, not as an index expression.
    let result = compile("float pair[2] = float[2](0.5, 1.5);");
    assert_no_errors(&result);
    let root = expr_of_initializer(&result, "pair");
    match result.ast().expr(root) {
        Some(AstExpr::ConstructorCall { args, .. }) => assert_eq!(args.len(), 2),
        other => panic!("expected a constructor call, got {other:?}"),
    }
}

#[test]
fn function_call_and_member_chain() {
    let result = compile("vec4 c = vec4(1.0);\nfloat y = c.xyz.x;");
    assert_no_errors(&result);
    let root = expr_of_initializer(&result, "y");
    match result.ast().expr(root) {
        Some(AstExpr::FieldAccess { base, .. }) => match result.ast().expr(*base) {
            Some(AstExpr::FieldAccess { .. }) => {}
            other => panic!("expected chained field access, got {other:?}"),
        },
        other => panic!("expected field access, got {other:?}"),
    }
}

#[test]
fn void_parameter_list_is_empty() {
    let result = compile("void f(void) {}\nvoid g() {}");
    assert_no_errors(&result);
    for name in ["f", "g"] {
        match result.ast().decl(find_function(&result, name).unwrap()) {
            Some(AstDecl::Function { params, .. }) => {
                assert!(params.is_empty(), "{name} has no parameters")
            }
            other => panic!("expected function, got {other:?}"),
        }
    }
}

#[test]
fn prototype_vs_definition() {
    let result = compile("float f(float x);\nfloat f(float x) { return x; }");
    assert_no_errors(&result);
    let bodies: Vec<bool> = tu_decls(&result)
        .iter()
        .filter_map(|&d| match result.ast().decl(d) {
            Some(AstDecl::Function { body, .. }) => Some(body.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(bodies, vec![false, true]);
}

#[test]
fn initializer_lists_nest() {
    let result = compile("float m[2][2] = {{1.0, 2.0}, {3.0, 4.0}};");
    assert_no_errors(&result);
    let root = expr_of_initializer(&result, "m");
    match result.ast().expr(root) {
        Some(AstExpr::InitializerList { items }) => {
            assert_eq!(items.len(), 2);
            for &item in items {
                assert!(matches!(
                    result.ast().expr(item),
                    Some(AstExpr::InitializerList { .. })
                ));
            }
        }
        other => panic!("expected an initializer list, got {other:?}"),
    }
}

#[test]
fn recovery_keeps_following_declarations() {
    // The malformed first statement becomes an error node; `int k = 1;`
    // still parses and `k` is in scope at the end of the function.
    let result = compile("void f(){ a b c; int k=1; }");
    assert!(result.diagnostics().error_count() > 0);

    let body = match result.ast().decl(find_function(&result, "f").unwrap()) {
        Some(AstDecl::Function { body: Some(body), .. }) => *body,
        other => panic!("function body survives, got {other:?}"),
    };
    let stmts = match result.ast().stmt(body) {
        Some(AstStmt::Compound { stmts }) => stmts.clone(),
        other => panic!("expected compound, got {other:?}"),
    };
    let k_decl = stmts.iter().any(|&s| {
        matches!(result.ast().stmt(s), Some(AstStmt::Decl { decl })
            if matches!(result.ast().decl(*decl), Some(AstDecl::Variable { declarators, .. })
                if declarators.iter().any(|d| {
                    result.atoms().resolve(result.lex().get_token(d.name).text) == "k"
                })))
    });
    assert!(k_decl, "the k declaration survives recovery");
}

#[test]
fn recovery_resyncs_at_matching_paren() {
    let result = compile("void f(){ g(1,; int k = 2; }");
    assert!(result.diagnostics().error_count() > 0);
    assert!(find_function(&result, "f").is_some());
}

#[test]
fn unbalanced_braces_still_terminate() {
    for source in ["void f() {", "}}}", "void f() { { { int x; }", "((((", "[;]"] {
        let result = compile(source);
        // Termination with a total tree is the property; diagnostics are
        // expected.
        assert!(result.ast().node_count() > 0, "source {source:?}");
    }
}

#[test]
fn ast_snapshot_of_a_small_shader() {
    let source = r#"
uniform vec2 resolution;
float brightness(vec3 color) {
    return dot(color, vec3(0.2126, 0.7152, 0.0722));
}
void main() {
    vec2 uv = gl_FragCoord.xy / resolution;
    gl_FragColor = vec4(vec3(brightness(vec3(uv, 0.5))), 1.0);
}
"#;
    let result = compile(source);
    assert_no_errors(&result);
    insta::assert_snapshot!(result.dump_ast_treeviz());
}

proptest! {
    /// Parser halting: arbitrary token soup terminates with a total tree.
    #[test]
    fn parser_halts_on_arbitrary_input(source in "[ -~\n]{0,160}") {
        let result = compile(&source);
        let _ = result.ast().node_count();
    }

    /// Nested delimiters do not blow the recovery logic up.
    #[test]
    fn parser_halts_on_delimiter_soup(source in "[(){}\\[\\];,a-z0-9 ]{0,120}") {
        let result = compile(&source);
        let _ = result.ast().node_count();
    }
}
