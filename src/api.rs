//! GLSL processing API.
//!
//! Pure functions for compiling GLSL content and serializing the artifacts
//! of each phase. This module contains no I/O, CLI handling, or process
//! exits; everything takes structured input and returns structured output,
//! which keeps it directly testable and reusable by the CLI and by
//! language-tooling hosts.

use std::error::Error;
use std::fmt;

use crate::compiler::{standard_library_preamble, CompilerConfig, CompilerInvocation};
use crate::preprocessor::PpCallback;
use crate::tokenizer::PpToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The final token stream with spelled and expanded positions.
    TokenStream,
    /// The parsed AST as JSON.
    Ast,
    /// The parsed AST as an indented tree.
    AstTreeviz,
    /// Diagnostics of all phases.
    Diagnostics,
    /// The preprocessor event trace (macro uses, includes, define/undef).
    PpEvents,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token-stream" => Ok(OutputFormat::TokenStream),
            "ast" => Ok(OutputFormat::Ast),
            "ast-treeviz" => Ok(OutputFormat::AstTreeviz),
            "diagnostics" => Ok(OutputFormat::Diagnostics),
            "pp-events" => Ok(OutputFormat::PpEvents),
            _ => Err(format!("Unknown format: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessArgs {
    pub content: String,
    pub source_path: String,
    pub format: OutputFormat,
    pub config: CompilerConfig,
}

impl ProcessArgs {
    pub fn new(content: impl Into<String>, source_path: impl Into<String>, format: OutputFormat) -> Self {
        ProcessArgs {
            content: content.into(),
            source_path: source_path.into(),
            format,
            config: CompilerConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ProcessError {
    SerializationError(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl Error for ProcessError {}

/// Captures the preprocessor callback surface into serializable records.
#[derive(Debug, Default)]
pub struct PpEventRecorder {
    pub events: Vec<serde_json::Value>,
    include_depth: usize,
}

impl PpEventRecorder {
    fn token_json(&self, token: &PpToken) -> serde_json::Value {
        serde_json::json!({
            "kind": token.kind,
            "range": format!(
                "{}~{}",
                token.spelled_range.start, token.spelled_range.end
            ),
        })
    }
}

impl PpCallback for PpEventRecorder {
    fn on_include_directive(&mut self, header: &PpToken) {
        let tok = self.token_json(header);
        self.events.push(serde_json::json!({"event": "include", "header": tok}));
    }

    fn on_define_directive(&mut self, name: &PpToken, params: &[PpToken]) {
        let tok = self.token_json(name);
        self.events.push(serde_json::json!({
            "event": "define",
            "name": tok,
            "param_count": params.len(),
        }));
    }

    fn on_undef_directive(&mut self, name: &PpToken) {
        let tok = self.token_json(name);
        self.events.push(serde_json::json!({"event": "undef", "name": tok}));
    }

    fn on_if_def_directive(&mut self, name: &PpToken, is_ndef: bool) {
        let tok = self.token_json(name);
        self.events.push(serde_json::json!({"event": "ifdef", "name": tok, "is_ndef": is_ndef}));
    }

    fn on_enter_included_file(&mut self) {
        self.include_depth += 1;
        self.events.push(serde_json::json!({"event": "enter_include", "depth": self.include_depth}));
    }

    fn on_exit_included_file(&mut self) {
        self.events.push(serde_json::json!({"event": "exit_include", "depth": self.include_depth}));
        self.include_depth = self.include_depth.saturating_sub(1);
    }

    fn on_macro_expansion(&mut self, macro_use: &PpToken) {
        let tok = self.token_json(macro_use);
        self.events.push(serde_json::json!({"event": "macro_expansion", "use": tok}));
    }
}

/// Main processing function - pure, no I/O or side effects.
pub fn process(args: ProcessArgs) -> Result<String, ProcessError> {
    let invocation =
        CompilerInvocation::new(args.config.clone()).with_preamble(standard_library_preamble());

    let mut recorder = PpEventRecorder::default();
    let result = invocation.compile_from_buffer(&args.content, Some(&mut recorder));

    match args.format {
        OutputFormat::TokenStream => Ok(result.dump_tokens_string()),
        OutputFormat::AstTreeviz => Ok(result.dump_ast_treeviz()),
        OutputFormat::Ast => {
            let value = serde_json::json!({
                "source": args.source_path,
                "ast": result.dump_ast_json(),
            });
            serde_json::to_string_pretty(&value)
                .map_err(|e| ProcessError::SerializationError(e.to_string()))
        }
        OutputFormat::Diagnostics => {
            let value = serde_json::json!({
                "source": args.source_path,
                "diagnostics": result.diagnostics().diagnostics(),
            });
            serde_json::to_string_pretty(&value)
                .map_err(|e| ProcessError::SerializationError(e.to_string()))
        }
        OutputFormat::PpEvents => {
            let value = serde_json::json!({
                "source": args.source_path,
                "events": recorder.events,
            });
            serde_json::to_string_pretty(&value)
                .map_err(|e| ProcessError::SerializationError(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_stream_output_lists_tokens() {
        let args = ProcessArgs::new("void main() {}", "test.frag", OutputFormat::TokenStream);
        let output = process(args).expect("processing succeeds");
        assert!(output.contains("KwVoid"));
        assert!(output.contains("'main'"));
    }

    #[test]
    fn diagnostics_output_is_json() {
        let args = ProcessArgs::new("void f() { int x = ; }", "bad.frag", OutputFormat::Diagnostics);
        let output = process(args).expect("processing succeeds");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert!(!parsed["diagnostics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!("nonsense".parse::<OutputFormat>().is_err());
        assert_eq!("ast".parse::<OutputFormat>(), Ok(OutputFormat::Ast));
    }
}
