//! Constant folding integration suite.

mod common;

use common::*;
use glsl_front::semantic::eval_ast_expr;
use glsl_front::types::{ConstValue, ScalarElem};
use rstest::rstest;

fn eval(source: &str) -> ConstValue {
    let result = compile(source);
    assert_no_errors(&result);
    eval_initializer(&result, "probe")
}

#[rstest]
#[case("const int probe = 1 + 2 * 3;", ConstValue::from_int(7))]
#[case("const int probe = (9 - 2) % 4;", ConstValue::from_int(3))]
#[case("const int probe = 1 << 4;", ConstValue::from_int(16))]
#[case("const int probe = 0xFF & 0x0F;", ConstValue::from_int(15))]
#[case("const bool probe = 3 > 2;", ConstValue::from_bool(true))]
#[case("const bool probe = !(1 == 1);", ConstValue::from_bool(false))]
#[case("const float probe = 1.5 * 4.0;", ConstValue::from_float(6.0))]
#[case("const int probe = -5;", ConstValue::from_int(-5))]
#[case("const int probe = ~0;", ConstValue::from_int(-1))]
#[case("const uint probe = 6u / 2u;", ConstValue::from_uint(3))]
fn scalar_folding(#[case] source: &str, #[case] expected: ConstValue) {
    assert_eq!(eval(source), expected);
}

#[test]
fn select_folds_the_taken_branch() {
    assert_eq!(eval("const int probe = true ? 10 : 20;"), ConstValue::from_int(10));
    assert_eq!(eval("const int probe = 2 > 3 ? 10 : 20;"), ConstValue::from_int(20));
}

#[test]
fn const_variables_fold_through_initializers() {
    let source = "const int a = 4;\nconst int b = a * 2;\nconst int probe = a + b;";
    assert_eq!(eval(source), ConstValue::from_int(12));
}

#[test]
fn non_const_variables_do_not_fold() {
    let result = compile("int a = 4;\nint probe = a + 1;");
    assert_no_errors(&result);
    assert!(eval_initializer(&result, "probe").is_error());
    let expr = initializer_of(&result, "probe").unwrap();
    assert!(!result.semantic().is_const_expr(expr));
}

#[rstest]
#[case("const float probe = sqrt(16.0);", 4.0)]
#[case("const float probe = abs(-2.5);", 2.5)]
#[case("const float probe = floor(2.9);", 2.0)]
#[case("const float probe = ceil(2.1);", 3.0)]
#[case("const float probe = trunc(-1.5);", -1.0)]
#[case("const float probe = round(2.5);", 3.0)]
#[case("const float probe = exp2(5.0);", 32.0)]
#[case("const float probe = log2(8.0);", 3.0)]
#[case("const float probe = pow(2.0, 8.0);", 256.0)]
#[case("const float probe = min(1.5, 2.5);", 1.5)]
#[case("const float probe = max(1.5, 2.5);", 2.5)]
#[case("const float probe = clamp(5.0, 0.0, 1.0);", 1.0)]
#[case("const float probe = degrees(radians(90.0));", 90.0)]
#[case("const float probe = inversesqrt(4.0);", 0.5)]
#[case("const float probe = sign(-3.5);", -1.0)]
fn builtin_function_folding(#[case] source: &str, #[case] expected: f32) {
    match eval(source) {
        ConstValue::Scalar(ScalarElem::Float(v)) => {
            assert!((v - expected).abs() < 1e-5, "{source}: got {v}, want {expected}")
        }
        other => panic!("{source}: expected a float fold, got {other:?}"),
    }
}

#[test]
fn trig_functions_fold() {
    match eval("const float probe = sin(0.0);") {
        ConstValue::Scalar(ScalarElem::Float(v)) => assert_eq!(v, 0.0),
        other => panic!("got {other:?}"),
    }
    match eval("const float probe = cos(0.0);") {
        ConstValue::Scalar(ScalarElem::Float(v)) => assert_eq!(v, 1.0),
        other => panic!("got {other:?}"),
    }
}

#[test]
fn int_overloads_of_min_max_stay_int() {
    assert_eq!(eval("const int probe = min(3, 5);"), ConstValue::from_int(3));
    assert_eq!(eval("const int probe = clamp(7, 0, 5);"), ConstValue::from_int(5));
    assert_eq!(eval("const int probe = abs(-4);"), ConstValue::from_int(4));
}

#[test]
fn vector_constructor_folding() {
    let expected = ConstValue::Vector(vec![
        ScalarElem::Float(1.0),
        ScalarElem::Float(2.0),
        ScalarElem::Float(3.0),
    ]);
    assert_eq!(eval("const vec3 probe = vec3(1.0, 2.0, 3.0);"), expected);

    let splat = ConstValue::Vector(vec![ScalarElem::Float(7.0); 3]);
    assert_eq!(eval("const vec3 probe = vec3(7.0);"), splat);

    // Components flatten and cast.
    assert_eq!(
        eval("const vec3 probe = vec3(vec2(1, 2), 3);"),
        ConstValue::Vector(vec![
            ScalarElem::Float(1.0),
            ScalarElem::Float(2.0),
            ScalarElem::Float(3.0),
        ])
    );
}

#[test]
fn swizzle_folding() {
    assert_eq!(
        eval("const vec3 v = vec3(1.0, 2.0, 3.0);\nconst vec2 probe = v.zx;"),
        ConstValue::Vector(vec![ScalarElem::Float(3.0), ScalarElem::Float(1.0)])
    );
    assert_eq!(
        eval("const vec3 v = vec3(1.0, 2.0, 3.0);\nconst float probe = v.y;"),
        ConstValue::from_float(2.0)
    );
}

#[test]
fn indexing_folds_into_vectors_and_aggregates() {
    assert_eq!(
        eval("const vec3 v = vec3(4.0, 5.0, 6.0);\nconst float probe = v[1];"),
        ConstValue::from_float(5.0)
    );
    assert_eq!(
        eval("const int a[3] = int[3](10, 20, 30);\nconst int probe = a[2];"),
        ConstValue::from_int(30)
    );
    assert_eq!(
        eval("const int a[2] = {7, 8};\nconst int probe = a[0];"),
        ConstValue::from_int(7)
    );
}

#[test]
fn length_folds_statically() {
    assert_eq!(eval("float a[5];\nconst int probe = a.length();"), ConstValue::from_int(5));
    assert_eq!(
        eval("const vec3 v = vec3(0.0);\nconst int probe = v.length();"),
        ConstValue::from_int(3)
    );
}

#[test]
fn struct_member_folding() {
    let source = "struct P { float x; float y; };\nconst P p = P(1.5, 2.5);\nconst float probe = p.y;";
    assert_eq!(eval(source), ConstValue::from_float(2.5));
}

#[test]
fn matrix_constructor_folding() {
    match eval("const mat2 probe = mat2(3.0);") {
        ConstValue::Matrix { cols: 2, rows: 2, elems } => {
            assert_eq!(
                elems,
                vec![
                    ScalarElem::Float(3.0),
                    ScalarElem::Float(0.0),
                    ScalarElem::Float(0.0),
                    ScalarElem::Float(3.0),
                ]
            );
        }
        other => panic!("expected a mat2 fold, got {other:?}"),
    }
}

#[test]
fn division_by_zero_is_not_a_constant() {
    let result = compile("const int probe = 1 / 0;");
    assert!(eval_initializer(&result, "probe").is_error());
}

/// Const-fold agreement: for every const initializer in this shader, the
/// folded value's type equals the deduced type.
#[test]
fn const_fold_agreement() {
    let source = r#"
        const int a = 2 + 3;
        const float b = 2.0 * 0.5;
        const bool c = a > 4;
        const vec2 d = vec2(1.0, a);
        const float e = sqrt(b);
        const uint f = 3u << 1;
    "#;
    let result = compile(source);
    assert_no_errors(&result);
    for name in ["a", "b", "c", "d", "e", "f"] {
        let expr = initializer_of(&result, name).unwrap();
        assert!(result.semantic().is_const_expr(expr), "{name} is const");
        let folded = eval_ast_expr(&result.const_eval_context(), expr);
        assert_eq!(
            folded.type_id(),
            result.semantic().expr_type(expr),
            "deduced and folded types agree for {name}"
        );
    }
}
