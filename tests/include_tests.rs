//! `#include` handling against real files on disk.

mod common;

use common::*;
use glsl_front::compiler::{standard_library_preamble, CompilerConfig, CompilerInvocation};
use glsl_front::source::TextPosition;
use std::fs;
use tempfile::TempDir;

fn compile_with_includes(source: &str, include_dirs: &[&std::path::Path]) -> glsl_front::CompileResult {
    let config = CompilerConfig {
        include_paths: include_dirs.iter().map(|p| p.to_path_buf()).collect(),
        ..CompilerConfig::default()
    };
    CompilerInvocation::new(config)
        .with_preamble(standard_library_preamble())
        .compile_from_buffer(source, None)
}

#[test]
fn angle_include_resolves_against_include_paths() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("lib.glsl"), "int shared_counter;\n").unwrap();

    let result = compile_with_includes("#include <lib.glsl>\nint x = shared_counter;\n", &[dir.path()]);
    assert_no_errors(&result);
    assert!(find_global_var(&result, "shared_counter").is_some());
    assert!(find_global_var(&result, "x").is_some());
}

#[test]
fn quoted_include_resolves_against_including_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("types.glsl"), "struct Light { vec3 color; };\n").unwrap();
    fs::write(
        dir.path().join("main.frag"),
        "#include \"types.glsl\"\nLight light;\nvec3 c = light.color;\n",
    )
    .unwrap();

    let invocation = CompilerInvocation::new(CompilerConfig::default())
        .with_preamble(standard_library_preamble());
    let result = invocation.compile_from_file(&dir.path().join("main.frag"), None).unwrap();
    assert_no_errors(&result);
}

#[test]
fn missing_include_is_a_diagnostic_not_an_abort() {
    let result = compile_with_includes("#include <nowhere.glsl>\nint x;\n", &[]);
    assert_has_error_containing(&result, "cannot open include file 'nowhere.glsl'");
    // The directive is a no-op; the rest of the file still compiles.
    assert!(find_global_var(&result, "x").is_some());
}

#[test]
fn nested_includes_compile() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("inner.glsl"), "int depth_two;\n").unwrap();
    fs::write(dir.path().join("outer.glsl"), "#include <inner.glsl>\nint depth_one;\n").unwrap();

    let result = compile_with_includes("#include <outer.glsl>\nint x = depth_two + depth_one;\n", &[dir.path()]);
    assert_no_errors(&result);
}

#[test]
fn include_cycle_is_bounded_by_depth() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.glsl"), "#include <b.glsl>\n").unwrap();
    fs::write(dir.path().join("b.glsl"), "#include <a.glsl>\n").unwrap();

    let result = compile_with_includes("#include <a.glsl>\nint x;\n", &[dir.path()]);
    assert_has_error_containing(&result, "maximum include depth");
    assert!(find_global_var(&result, "x").is_some());
}

#[test]
fn include_depth_limit_is_configurable() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.glsl"), "#include <two.glsl>\n").unwrap();
    fs::write(dir.path().join("two.glsl"), "int deep;\n").unwrap();

    let config = CompilerConfig {
        include_paths: vec![dir.path().to_path_buf()],
        max_include_depth: 1,
        ..CompilerConfig::default()
    };
    let result = CompilerInvocation::new(config)
        .with_preamble(standard_library_preamble())
        .compile_from_buffer("#include <one.glsl>\n", None);
    assert_has_error_containing(&result, "maximum include depth of 1 exceeded");
}

#[test]
fn included_tokens_map_to_the_include_directive() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("vals.glsl"), "int from_header;\n").unwrap();

    let result = compile_with_includes("int before;\n#include <vals.glsl>\nint after;\n", &[dir.path()]);
    assert_no_errors(&result);

    let header_tok = result
        .lex()
        .tu_token_ids()
        .map(|id| (id, result.lex().get_token(id)))
        .find(|(_, tok)| result.atoms().resolve(tok.text) == "from_header")
        .expect("included token is in the stream");

    // Spelled in the header file, expanded at the directive on line 1.
    let (spelled_file, _) = result.lex().lookup_spelled_range(header_tok.0);
    assert_ne!(spelled_file, result.main_file);
    let expanded = result.lex().lookup_expanded_range(header_tok.0);
    assert_eq!(expanded.start.line, 1);

    // Main-file tokens around it keep their own positions.
    let after_tok = result
        .lex()
        .tu_token_ids()
        .map(|id| result.lex().get_token(id))
        .find(|tok| result.atoms().resolve(tok.text) == "after")
        .unwrap();
    assert_eq!(after_tok.expanded_range.start, TextPosition::new(2, 4));
}

#[test]
fn macros_cross_include_boundaries() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("defs.glsl"), "#define COUNT 4\n").unwrap();

    let result = compile_with_includes("#include <defs.glsl>\nint a[COUNT];\n", &[dir.path()]);
    assert_no_errors(&result);
    let (decl, index) = find_global_var(&result, "a").unwrap();
    let ty = result.semantic().declarator_type(decl, index);
    assert_eq!(result.types().get(ty).name, "int[4]");
}
