//! Type checker integration suite: name resolution, expression typing,
//! swizzles, and overload resolution.

mod common;

use common::*;
use glsl_front::ast::{AstDecl, AstStmt};
use glsl_front::types::{scalar_type, vector_type, ScalarKind, TypeId};
use rstest::rstest;

/// Deduced type name of the initializer of variable `probe`.
fn probe_type(source: &str) -> String {
    let result = compile(source);
    let expr = initializer_of(&result, "probe").expect("probe has an initializer");
    let ty = result.semantic().expr_type(expr);
    result.types().get(ty).name.clone()
}

fn probe_type_id(source: &str) -> (TypeId, glsl_front::CompileResult) {
    let result = compile(source);
    let expr = initializer_of(&result, "probe").expect("probe has an initializer");
    let ty = result.semantic().expr_type(expr);
    (ty, result)
}

#[rstest]
#[case("int probe = 1;", "int")]
#[case("uint probe = 1u;", "uint")]
#[case("float probe = 1.5;", "float")]
#[case("double probe = 1.5lf;", "double")]
#[case("bool probe = true;", "bool")]
fn literal_types(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(probe_type(source), expected);
}

#[rstest]
#[case("float probe = 1 + 2.5;", "float")]
#[case("float probe = 1.0f + 2;", "float")]
#[case("int probe = 1 + 2;", "int")]
#[case("uint probe = 1u + 1;", "uint")]
#[case("bool probe = 1 < 2;", "bool")]
#[case("bool probe = 1.0 == 1.0;", "bool")]
#[case("bool probe = true && false;", "bool")]
#[case("int probe = 1 << 2;", "int")]
#[case("int probe = 7 % 2;", "int")]
fn binary_expression_types(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(probe_type(source), expected);
}

#[rstest]
#[case("vec3 v = vec3(1.0); vec3 probe = v + 1.0;", "vec3")]
#[case("vec3 v = vec3(1.0); vec3 probe = 2.0 * v;", "vec3")]
#[case("ivec2 v = ivec2(1); ivec2 probe = v + ivec2(2);", "ivec2")]
#[case("mat3 m = mat3(1.0); vec3 v = vec3(1.0); vec3 probe = m * v;", "vec3")]
#[case("mat3 m = mat3(1.0); vec3 v = vec3(1.0); vec3 probe = v * m;", "vec3")]
#[case("mat2 a = mat2(1.0); mat2 probe = a * a;", "mat2x2")]
fn vector_and_matrix_arithmetic(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(probe_type(source), expected);
}

#[test]
fn scalar_swizzle_rules() {
    let (ty, _) = probe_type_id("vec3 v = vec3(1.0); vec2 probe = v.xy;");
    assert_eq!(ty, vector_type(ScalarKind::Float, 2));

    let (ty, _) = probe_type_id("vec3 v = vec3(1.0); vec4 probe = v.xxxx;");
    assert_eq!(ty, vector_type(ScalarKind::Float, 4));

    let (ty, _) = probe_type_id("vec3 v = vec3(1.0); float probe = v.z;");
    assert_eq!(ty, scalar_type(ScalarKind::Float));

    let (ty, _) = probe_type_id("ivec2 v = ivec2(1); ivec2 probe = v.ts;");
    assert_eq!(ty, vector_type(ScalarKind::Int, 2));
}

#[test]
fn mixed_swizzle_sets_diagnose() {
    let result = compile("vec3 v = vec3(1.0); vec2 probe = v.xr;");
    assert_has_error_containing(&result, "mixes component sets");
}

#[test]
fn out_of_range_swizzle_diagnoses() {
    let result = compile("vec3 v = vec3(1.0); vec4 probe = v.xyzw;");
    assert_has_error_containing(&result, "out of range");
}

#[test]
fn struct_member_access_types() {
    let source = "struct Light { vec3 color; float radius; };\nLight light;\nfloat probe = light.radius;";
    assert_eq!(probe_type(source), "float");
}

#[test]
fn unknown_member_diagnoses() {
    let source = "struct Light { vec3 color; };\nLight light;\nfloat probe = light.intensity;";
    let result = compile(source);
    assert_has_error_containing(&result, "no member named 'intensity'");
}

#[test]
fn interface_block_members() {
    let with_instance =
        "uniform Camera { mat4 view; } cam;\nmat4 probe = cam.view;";
    assert_eq!(probe_type(with_instance), "mat4x4");

    let without_instance = "uniform Camera { mat4 view; };\nmat4 probe = view;";
    assert_eq!(probe_type(without_instance), "mat4x4");
}

#[test]
fn index_access_types() {
    assert_eq!(probe_type("float a[4]; float probe = a[0];"), "float");
    assert_eq!(probe_type("vec3 v = vec3(1.0); float probe = v[1];"), "float");
    // Indexing a matrix yields a column vector.
    assert_eq!(probe_type("mat2x3 m = mat2x3(1.0); vec3 probe = m[0];"), "vec3");
    assert_eq!(probe_type("float g[2][3]; float probe = g[0][1];"), "float");
}

#[test]
fn ternary_common_type() {
    assert_eq!(probe_type("float probe = true ? 1 : 2.0;"), "float");
    let result = compile("int probe = 1 ? 2 : 3;");
    assert_has_error_containing(&result, "condition must have bool type");
}

#[test]
fn unary_operator_rules() {
    assert_eq!(probe_type("bool probe = !false;"), "bool");
    assert_eq!(probe_type("int probe = ~3;"), "int");
    let result = compile("float probe = ~1.5;");
    assert_has_error_containing(&result, "must be integral");
    let result = compile("int probe = !3;");
    assert_has_error_containing(&result, "must have bool type");
}

#[test]
fn increment_requires_lvalue() {
    let result = compile("void f() { int a = 1; a++; }");
    assert_no_errors(&result);
    let result = compile("void f() { (1 + 2)++; }");
    assert_has_error_containing(&result, "l-value");
}

#[test]
fn assignment_rules() {
    let result = compile("void f() { float x; x = 1; }");
    assert_no_errors(&result);
    let result = compile("void f() { int x; x = 1.5; }");
    assert_has_error_containing(&result, "cannot assign");
    let result = compile("void f() { 3 = 4; }");
    assert_has_error_containing(&result, "l-value");
}

#[test]
fn length_method_rules() {
    assert_eq!(probe_type("float a[5]; int probe = a.length();"), "int");
    assert_eq!(probe_type("vec3 v = vec3(1.0); int probe = v.length();"), "int");
    // On other types the expression gets the error type silently.
    let result = compile("float x = 1.0; int probe = x.length();");
    let expr = initializer_of(&result, "probe").unwrap();
    assert!(result.types().get(result.semantic().expr_type(expr)).is_error());
}

#[test]
fn overload_resolution_scenarios() {
    let source = r#"
        void f(int x) {}
        void f(float x) {}
        void caller() {
            f(1);
            f(1.0);
            f(true);
        }
    "#;
    let result = compile(source);
    assert_no_errors(&result);

    // Each call resolved to a distinct overload: f(int) for 1 and true
    // (bool -> int promotion), f(float) for 1.0.
    let body = match result.ast().decl(find_function(&result, "caller").unwrap()) {
        Some(AstDecl::Function { body: Some(body), .. }) => *body,
        _ => panic!("caller has a body"),
    };
    let mut resolved = Vec::new();
    if let Some(AstStmt::Compound { stmts }) = result.ast().stmt(body) {
        for &stmt in stmts {
            if let Some(AstStmt::Expr { expr }) = result.ast().stmt(stmt) {
                if let Some(glsl_front::ast::AstExpr::Invoke { invoked, .. }) =
                    result.ast().expr(*expr)
                {
                    resolved.push(result.semantic().resolved_decl(*invoked).unwrap().decl);
                }
            }
        }
    }
    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[0], resolved[2], "f(1) and f(true) pick the int overload");
    assert_ne!(resolved[0], resolved[1], "f(1.0) picks the float overload");
}

#[test]
fn no_viable_overload_diagnoses() {
    let source = "void f(int x) {}\nvoid g() { f(1.5); }";
    let result = compile(source);
    assert_has_error_containing(&result, "no matching function for call to 'f'");
}

#[test]
fn wrong_arity_diagnoses() {
    let source = "void f(int x) {}\nvoid g() { f(1, 2); }";
    let result = compile(source);
    assert_has_error_containing(&result, "no matching function for call to 'f'");
}

#[test]
fn ambiguous_overload_diagnoses() {
    let source = r#"
        void f(uint a, float b) {}
        void f(float a, uint b) {}
        void g() { f(1, 1); }
    "#;
    let result = compile(source);
    assert_has_error_containing(&result, "ambiguous call to 'f'");
}

#[test]
fn builtin_functions_resolve_through_the_preamble() {
    let result = compile("float probe = sin(1.0);\nvec3 n = normalize(vec3(1.0));");
    assert_no_errors(&result);
    assert_eq!(probe_type("float probe = sin(1.0);"), "float");
    assert_eq!(probe_type("vec2 probe = sin(vec2(1.0));"), "vec2");
}

#[test]
fn struct_constructor_calls() {
    let source = "struct P { float x; float y; };\nP probe_decl = P(1.0, 2.0);";
    let result = compile(source);
    assert_no_errors(&result);

    let bad = "struct P { float x; float y; };\nP p = P(1.0);";
    let result = compile(bad);
    assert_has_error_containing(&result, "needs 2 argument(s), got 1");
}

#[test]
fn constructor_component_counts() {
    assert_eq!(probe_type("vec3 probe = vec3(1.0, 2.0, 3.0);"), "vec3");
    assert_eq!(probe_type("vec4 probe = vec4(vec2(1.0), 0.0, 1.0);"), "vec4");
    assert_eq!(probe_type("vec3 probe = vec3(1.0);"), "vec3");
    let result = compile("vec3 v = vec3(1.0, 2.0);");
    assert_has_error_containing(&result, "needs 3 components, got 2");
}

#[test]
fn unknown_identifier_and_type_diagnose() {
    let result = compile("int x = missing;");
    assert_has_error_containing(&result, "unknown identifier 'missing'");
    let result = compile("Missing x;");
    assert_has_error_containing(&result, "unknown type name 'Missing'");
}

#[test]
fn return_type_checking() {
    let result = compile("float f() { return 1; }");
    assert_no_errors(&result);
    let result = compile("int f() { return 1.5; }");
    assert_has_error_containing(&result, "cannot return");
    let result = compile("int f() { return; }");
    assert_has_error_containing(&result, "must return a value");
}

#[test]
fn condition_type_checking() {
    let result = compile("void f() { if (1) {} }");
    assert_has_error_containing(&result, "condition must have bool type");
    let result = compile("void f() { while (true) { break; } }");
    assert_no_errors(&result);
}

#[test]
fn scopes_shadow_and_expire() {
    let source = r#"
        int x = 1;
        void f() {
            float x = 2.0;
            { float probe_inner = x; }
        }
        int probe = x;
    "#;
    let result = compile(source);
    assert_no_errors(&result);
    // At global scope, x is still the int.
    assert_eq!(probe_type(source), "int");
}

#[test]
fn function_prototypes_link_and_resolve() {
    let source = r#"
        float helper(float x);
        float user() { return helper(2.0); }
        float helper(float x) { return x * 2.0; }
    "#;
    let result = compile(source);
    assert_no_errors(&result);
}
