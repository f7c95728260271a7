//! End-to-end scenarios over the whole pipeline, plus the cross-phase
//! stream invariants.

mod common;

use common::*;
use glsl_front::compiler::{
    standard_library_preamble, CompilerConfig, CompilerInvocation,
};
use glsl_front::tokenizer::TokenKind;
use glsl_front::types::ConstValue;

#[test]
fn scenario_object_like_macro() {
    let result = compile("#define N 3\nint a[N];");
    assert_no_errors(&result);

    // The declaration's array size folds to 3.
    let (decl, index) = find_global_var(&result, "a").expect("a is declared");
    let ty = result.semantic().declarator_type(decl, index);
    assert_eq!(result.types().get(ty).name, "int[3]");

    // The `3` token's expanded range maps back to N's use position.
    let three = result
        .lex()
        .tu_token_ids()
        .map(|id| result.lex().get_token(id))
        .find(|tok| result.atoms().resolve(tok.text) == "3")
        .unwrap();
    assert_eq!(three.spelled_range.start.line, 0);
    assert_eq!(three.expanded_range.start.line, 1);
}

#[test]
fn scenario_function_like_macro_with_rescan() {
    let result = compile("#define ID(x) x\n#define A 1+2\nint k = ID(A)*3;");
    assert_no_errors(&result);
    assert_eq!(eval_initializer(&result, "k"), ConstValue::from_int(9));
}

#[test]
fn scenario_conditional_compilation() {
    let result = compile("#ifdef FOO\nint x;\n#else\nint y;\n#endif\n");
    assert_no_errors(&result);
    assert!(find_global_var(&result, "y").is_some());
    assert!(find_global_var(&result, "x").is_none());
}

#[test]
fn scenario_parser_recovery() {
    let result = compile("void f(){ a b c; int k=1; }");
    assert!(result.diagnostics().error_count() > 0);
    assert!(find_function(&result, "f").is_some());
    // k is in scope at the end of the function: its declarator was typed.
    let treeviz = result.dump_ast_treeviz();
    assert!(treeviz.contains("'k'"), "k survives in the tree:\n{treeviz}");
}

#[test]
fn scenario_overload_resolution() {
    let source = r#"
        int pick(int x) { return 0; }
        int pick(float x) { return 1; }
        void main() {
            pick(1);
            pick(1.0);
            pick(true);
        }
    "#;
    let result = compile(source);
    assert_no_errors(&result);
}

#[test]
fn scenario_swizzles() {
    let good = compile("vec3 v = vec3(1.0);\nvec2 a = v.xy;\nvec4 b = v.xxxx;");
    assert_no_errors(&good);

    let mixed = compile("vec3 v = vec3(1.0);\nvec2 a = v.xr;");
    assert_has_error_containing(&mixed, "mixes component sets");

    let out_of_range = compile("vec3 v = vec3(1.0);\nvec4 a = v.xyzw;");
    assert_has_error_containing(&out_of_range, "out of range");
}

/// Expanded monotonicity: main-file token starts never go backwards in the
/// expanded coordinate space.
#[test]
fn expanded_positions_are_monotonic() {
    let source = "#define SCALE(v) (v * 2.0)\n#define BIAS 0.5\nfloat a = SCALE(1.0) + BIAS;\nfloat b = SCALE(BIAS);\n";
    let result = compile(source);
    assert_no_errors(&result);

    let mut last = None;
    for id in result.lex().tu_token_ids() {
        let tok = result.lex().get_token(id);
        if tok.kind == TokenKind::Eof {
            break;
        }
        let start = tok.expanded_range.start;
        if let Some(previous) = last {
            assert!(
                previous <= start,
                "token {id:?} moved backwards: {previous:?} then {start:?}"
            );
        }
        last = Some(start);
    }
}

#[test]
fn roundtrip_spelled_ranges_through_the_pipeline() {
    let source = "vec2 uv = vec2(0.25, 0.75);\nfloat t = uv.x;\n";
    let result = compile(source);
    assert_no_errors(&result);

    let lines: Vec<&str> = source.split('\n').collect();
    for id in result.lex().tu_token_ids() {
        let tok = result.lex().get_token(id);
        if tok.kind == TokenKind::Eof {
            break;
        }
        let (file, range) = result.lex().lookup_spelled_range(id);
        assert_eq!(file, result.main_file);
        let line = lines[range.start.line as usize];
        let spelled = &line[range.start.character as usize..range.end.character as usize];
        assert_eq!(spelled, result.atoms().resolve(tok.text));
    }
}

#[test]
fn preamble_is_shared_across_invocations() {
    let preamble = standard_library_preamble();

    let first = CompilerInvocation::new(CompilerConfig::default())
        .with_preamble(preamble.clone())
        .compile_from_buffer("float a = sin(0.5);", None);
    let second = CompilerInvocation::new(CompilerConfig::default())
        .with_preamble(preamble.clone())
        .compile_from_buffer("float b = cos(0.5);", None);

    assert_no_errors(&first);
    assert_no_errors(&second);

    // Both invocations resolved `sin`/`cos` to the same preamble
    // declarations through the shared symbol table.
    assert!(preamble.symbols().functions.len() > 10);
}

#[test]
fn preamble_supports_concurrent_invocations() {
    let preamble = standard_library_preamble();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let preamble = preamble.clone();
            std::thread::spawn(move || {
                let source = format!("float v{i} = sqrt({i}.0 + 1.0);");
                let result = CompilerInvocation::new(CompilerConfig::default())
                    .with_preamble(preamble)
                    .compile_from_buffer(&source, None);
                result.diagnostics().error_count()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 0);
    }
}

#[test]
fn user_preamble_layers_between_stdlib_and_main() {
    let mut invocation = CompilerInvocation::new(CompilerConfig::default());
    invocation.set_user_preamble("#define USER_SCALE 4\nconst int userConstant = 2;\n");
    let preamble = invocation.compile_preamble();

    let result = CompilerInvocation::new(CompilerConfig::default())
        .with_preamble(preamble)
        .compile_from_buffer("int a[USER_SCALE];\nint b = userConstant;", None);
    assert_no_errors(&result);

    let (decl, index) = find_global_var(&result, "a").unwrap();
    let ty = result.semantic().declarator_type(decl, index);
    assert_eq!(result.types().get(ty).name, "int[4]");
}

#[test]
fn compile_without_any_preamble_object() {
    // Without a compiled preamble the invocation lexes the stdlib text
    // itself; builtins still resolve.
    let invocation = CompilerInvocation::new(CompilerConfig::default());
    let result = invocation.compile_from_buffer("float x = max(1.0, 2.0);", None);
    assert_no_errors(&result);
    assert!(find_global_var(&result, "x").is_some());
}

#[test]
fn skip_user_preamble_option() {
    let config = CompilerConfig { skip_user_preamble: true, ..CompilerConfig::default() };
    let mut invocation = CompilerInvocation::new(config);
    invocation.set_user_preamble("int fromUserPreamble;\n");
    let result = invocation.compile_from_buffer("int x = fromUserPreamble;", None);
    assert_has_error_containing(&result, "unknown identifier 'fromUserPreamble'");
}

#[test]
fn compile_from_missing_file_is_an_error() {
    let invocation = CompilerInvocation::new(CompilerConfig::default());
    let error = invocation
        .compile_from_file(std::path::Path::new("/definitely/not/here.frag"), None)
        .err()
        .expect("missing file is an error");
    assert!(error.to_string().contains("cannot open source file"));
}

#[test]
fn utf16_column_mode_changes_positions() {
    let source = "float \u{1D4B6}x = 1.0;"; // a surrogate-pair identifier char
    let utf8 = CompilerInvocation::new(CompilerConfig::default())
        .compile_from_buffer(source, None);
    let utf16 = CompilerInvocation::new(CompilerConfig {
        count_utf16_characters: true,
        ..CompilerConfig::default()
    })
    .compile_from_buffer(source, None);

    let last_utf8 = utf8
        .lex()
        .tu_token_ids()
        .map(|id| utf8.lex().get_token(id))
        .find(|t| t.kind == TokenKind::Semicolon)
        .unwrap();
    let last_utf16 = utf16
        .lex()
        .tu_token_ids()
        .map(|id| utf16.lex().get_token(id))
        .find(|t| t.kind == TokenKind::Semicolon)
        .unwrap();
    assert!(last_utf8.spelled_range.start.character > last_utf16.spelled_range.start.character);
}
