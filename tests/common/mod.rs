//! Shared helpers for the integration suites.
#![allow(dead_code)]

use glsl_front::ast::{AstDecl, AstNodeKind, NodeId};
use glsl_front::compiler::{
    standard_library_preamble, CompileResult, CompilerConfig, CompilerInvocation,
};
use glsl_front::semantic::eval_ast_expr;
use glsl_front::types::ConstValue;

/// Compile a buffer against the shared standard-library preamble.
pub fn compile(source: &str) -> CompileResult {
    CompilerInvocation::new(CompilerConfig::default())
        .with_preamble(standard_library_preamble())
        .compile_from_buffer(source, None)
}

/// Compile without any preamble, for tests that need a bare stream.
pub fn compile_bare(source: &str) -> CompileResult {
    let mut invocation = CompilerInvocation::new(CompilerConfig::default());
    invocation.set_system_preamble("");
    invocation.compile_from_buffer(source, None)
}

/// The declarations of the main translation unit.
pub fn tu_decls(result: &CompileResult) -> Vec<NodeId> {
    match &result.ast().get(result.translation_unit()).kind {
        AstNodeKind::TranslationUnit { decls } => decls.clone(),
        _ => Vec::new(),
    }
}

/// Find a global variable declarator by name. Returns the declaring node
/// and the declarator index.
pub fn find_global_var(result: &CompileResult, name: &str) -> Option<(NodeId, u32)> {
    for decl in tu_decls(result) {
        if let Some(AstDecl::Variable { declarators, .. }) = result.ast().decl(decl) {
            for (index, declarator) in declarators.iter().enumerate() {
                let text = result.atoms().resolve(result.lex().get_token(declarator.name).text);
                if text == name {
                    return Some((decl, index as u32));
                }
            }
        }
    }
    None
}

/// The initializer expression of a named global variable.
pub fn initializer_of(result: &CompileResult, name: &str) -> Option<NodeId> {
    let (decl, index) = find_global_var(result, name)?;
    match result.ast().decl(decl) {
        Some(AstDecl::Variable { declarators, .. }) => {
            declarators[index as usize].initializer
        }
        _ => None,
    }
}

/// Fold the initializer of a named global variable to a constant.
pub fn eval_initializer(result: &CompileResult, name: &str) -> ConstValue {
    match initializer_of(result, name) {
        Some(expr) => eval_ast_expr(&result.const_eval_context(), expr),
        None => ConstValue::Error,
    }
}

/// Find a function definition by name.
pub fn find_function(result: &CompileResult, name: &str) -> Option<NodeId> {
    for decl in tu_decls(result) {
        if let Some(AstDecl::Function { name: name_tok, .. }) = result.ast().decl(decl) {
            let text = result.atoms().resolve(result.lex().get_token(*name_tok).text);
            if text == name {
                return Some(decl);
            }
        }
    }
    None
}

/// All diagnostic messages, for containment asserts.
pub fn messages(result: &CompileResult) -> Vec<String> {
    result.diagnostics().diagnostics().iter().map(|d| d.message.clone()).collect()
}

pub fn assert_no_errors(result: &CompileResult) {
    assert_eq!(
        result.diagnostics().error_count(),
        0,
        "expected a clean compile, got: {:?}",
        messages(result)
    );
}

pub fn assert_has_error_containing(result: &CompileResult, needle: &str) {
    assert!(
        messages(result).iter().any(|m| m.contains(needle)),
        "expected a diagnostic containing {needle:?}, got: {:?}",
        messages(result)
    );
}
