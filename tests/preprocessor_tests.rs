//! Preprocessor integration suite: macros, rescan, conditionals, and the
//! callback event trace.

mod common;

use common::*;
use glsl_front::source::TextPosition;
use glsl_front::tokenizer::TokenKind;
use glsl_front::types::ConstValue;

/// Text of the main-TU tokens, excluding EOF.
fn tu_token_texts(result: &glsl_front::CompileResult) -> Vec<String> {
    result
        .lex()
        .tu_token_ids()
        .map(|id| result.lex().get_token(id))
        .filter(|tok| tok.kind != TokenKind::Eof)
        .map(|tok| result.atoms().resolve(tok.text).to_string())
        .collect()
}

#[test]
fn object_like_macro_substitutes() {
    let result = compile_bare("#define N 3\nint a[N];");
    assert_no_errors(&result);
    assert_eq!(tu_token_texts(&result), vec!["int", "a", "[", "3", "]", ";"]);
}

#[test]
fn object_like_macro_rescans_nested_uses() {
    let result = compile_bare("#define A B\n#define B 42\nint x = A;");
    assert_no_errors(&result);
    assert_eq!(eval_initializer(&result, "x"), ConstValue::from_int(42));
}

#[test]
fn function_like_macro_with_rescan() {
    let result = compile_bare("#define ID(x) x\n#define A 1+2\nint k = ID(A)*3;");
    assert_no_errors(&result);
    // (1+2)*3: argument pre-expansion happens before substitution.
    assert_eq!(eval_initializer(&result, "k"), ConstValue::from_int(9));
}

#[test]
fn function_like_macro_arguments_split_at_depth_zero() {
    let result = compile_bare("#define SECOND(a, b) b\nint x = SECOND((1, 2), 3);");
    assert_no_errors(&result);
    assert_eq!(eval_initializer(&result, "x"), ConstValue::from_int(3));
}

#[test]
fn self_recursive_macro_emits_one_token() {
    let result = compile_bare("#define A A\nint A;");
    assert_no_errors(&result);
    assert_eq!(tu_token_texts(&result), vec!["int", "A", ";"]);
}

#[test]
fn mutually_recursive_macros_terminate() {
    let result = compile_bare("#define A B\n#define B A\nint A;");
    // A -> B -> A(disabled) stops; exactly one identifier comes out.
    assert_eq!(tu_token_texts(&result), vec!["int", "A", ";"]);
}

#[test]
fn function_like_name_without_parens_is_plain() {
    let result = compile_bare("#define F(x) x\nint F;");
    assert_no_errors(&result);
    assert_eq!(tu_token_texts(&result), vec!["int", "F", ";"]);
}

#[test]
fn macro_arity_mismatch_diagnoses_and_emits_verbatim() {
    let result = compile_bare("#define TWO(a, b) a\nint x = TWO(1);");
    assert_has_error_containing(&result, "expects 2 argument(s), got 1");
    // The use survives verbatim so downstream still sees the tokens.
    assert!(tu_token_texts(&result).contains(&"TWO".to_string()));
}

#[test]
fn undef_removes_a_macro() {
    let result = compile_bare("#define N 3\n#undef N\nint x = N;");
    // N is no longer a macro; it becomes an unknown identifier.
    assert_has_error_containing(&result, "unknown identifier 'N'");
}

#[test]
fn undef_of_unknown_macro_warns() {
    let result = compile_bare("#undef NEVER_DEFINED\nint x = 1;");
    assert!(messages(&result).iter().any(|m| m.contains("was not defined")));
    assert_eq!(result.diagnostics().error_count(), 0);
}

#[test]
fn macro_redefinition_warns_and_wins() {
    let result = compile_bare("#define N 1\n#define N 2\nint x = N;");
    assert!(messages(&result).iter().any(|m| m.contains("redefined")));
    assert_eq!(eval_initializer(&result, "x"), ConstValue::from_int(2));
}

#[test]
fn conditional_compilation_selects_branch() {
    let result = compile_bare("#ifdef FOO\nint x;\n#else\nint y;\n#endif\n");
    assert_no_errors(&result);
    assert!(find_global_var(&result, "y").is_some());
    assert!(find_global_var(&result, "x").is_none());
}

#[test]
fn ifdef_sees_defined_macro() {
    let result = compile_bare("#define FOO\n#ifdef FOO\nint x;\n#else\nint y;\n#endif\n");
    assert!(find_global_var(&result, "x").is_some());
    assert!(find_global_var(&result, "y").is_none());
}

#[test]
fn elif_chains_activate_once() {
    let source = "#define V 2\n#if V == 1\nint a;\n#elif V == 2\nint b;\n#elif V == 2\nint c;\n#else\nint d;\n#endif\n";
    let result = compile_bare(source);
    assert_no_errors(&result);
    assert!(find_global_var(&result, "b").is_some());
    for dead in ["a", "c", "d"] {
        assert!(find_global_var(&result, dead).is_none(), "{dead} should be inactive");
    }
}

#[test]
fn nested_inactive_regions_stay_inactive() {
    let source = "#if 0\n#if 1\nint a;\n#endif\n#else\nint b;\n#endif\n";
    let result = compile_bare(source);
    assert_no_errors(&result);
    assert!(find_global_var(&result, "a").is_none());
    assert!(find_global_var(&result, "b").is_some());
}

#[test]
fn if_with_defined_operator() {
    let source = "#define FOO\n#if defined(FOO) && !defined(BAR)\nint x;\n#endif\n";
    let result = compile_bare(source);
    assert_no_errors(&result);
    assert!(find_global_var(&result, "x").is_some());
}

#[test]
fn unterminated_conditional_diagnoses_at_eof() {
    let result = compile_bare("#if 1\nint x;\n");
    assert_has_error_containing(&result, "unterminated conditional");
}

#[test]
fn stray_else_and_endif_diagnose() {
    let result = compile_bare("#else\n");
    assert_has_error_containing(&result, "#else without a matching #if");
    let result = compile_bare("#endif\n");
    assert_has_error_containing(&result, "#endif without a matching #if");
}

#[test]
fn error_directive_reports_its_text() {
    let result = compile_bare("#error unsupported target\n");
    assert_has_error_containing(&result, "#error unsupported target");
}

#[test]
fn unknown_directive_diagnoses() {
    let result = compile_bare("#frobnicate\n");
    assert_has_error_containing(&result, "unknown preprocessor directive");
}

#[test]
fn version_and_pragma_are_tolerated() {
    let result = compile_bare("#version 450 core\n#pragma optimize(off)\nint x;\n");
    assert_no_errors(&result);
    assert!(find_global_var(&result, "x").is_some());
}

#[test]
fn null_directive_is_a_no_op() {
    let result = compile_bare("#\nint x;\n");
    assert_no_errors(&result);
    assert!(find_global_var(&result, "x").is_some());
}

#[test]
fn expanded_range_maps_back_to_macro_use() {
    let result = compile_bare("#define N 3\nint a[N];");
    // The `3` token is spelled in the #define but its expanded position is
    // the use site of N on line 1.
    let three = result
        .lex()
        .tu_token_ids()
        .map(|id| result.lex().get_token(id))
        .find(|tok| result.atoms().resolve(tok.text) == "3")
        .expect("expanded stream contains the 3");
    assert_eq!(three.spelled_range.start, TextPosition::new(0, 10));
    assert_eq!(three.expanded_range.start, TextPosition::new(1, 6));
    assert_eq!(three.expanded_range.end, three.expanded_range.start);
}

#[test]
fn pp_event_trace_records_defines_and_expansions() {
    use glsl_front::api::{process, OutputFormat, ProcessArgs};
    let source = "#define N 3\n#undef N\n#define M 1\n#ifdef M\nint x = M;\n#endif\n";
    let output =
        process(ProcessArgs::new(source, "events.frag", OutputFormat::PpEvents)).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    let events: Vec<&str> = parsed["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(events, vec!["define", "undef", "define", "ifdef", "macro_expansion"]);
}
