//! Compilation orchestration.
//!
//! A [`CompilerInvocation`] drives the phases for one translation unit:
//! tokenize → preprocess → parse → type-check, strictly in sequence and on
//! one thread. Invocations can layer over a shared [`CompiledPreamble`]
//! holding the prebuilt standard library (and optionally a user prelude):
//! its contexts are immutable and `Arc`-shared, so a language server can
//! run many invocations concurrently against one preamble.

use crate::ast::{AstContext, NodeId};
use crate::atom::AtomTable;
use crate::diagnostics::DiagnosticStream;
use crate::lexing::{LexContext, SyntaxTokenId};
use crate::parser::{AstBuilder, Parser};
use crate::preprocessor::{MacroRegistry, NullCallback, PpCallback, Preprocessor};
use crate::semantic::{GlobalSymbols, SemanticInfo, TypeChecker};
use crate::source::{FileId, SourceContext};
use crate::types::TypeContext;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options recognized by an invocation.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Dump the TU token stream to stdout after compilation.
    pub dump_tokens: bool,
    /// Dump the parsed AST to stdout after compilation.
    pub dump_ast: bool,
    /// Do not lex the user preamble into the main TU.
    pub skip_user_preamble: bool,
    /// Maximum nesting of `#include`; exceeding it is a diagnostic.
    pub max_include_depth: usize,
    /// Directories searched for angle-form (and quoted-form fallback)
    /// includes.
    pub include_paths: Vec<PathBuf>,
    /// Count columns in UTF-16 code units for LSP position compatibility.
    pub count_utf16_characters: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            dump_tokens: false,
            dump_ast: false,
            skip_user_preamble: false,
            max_include_depth: 16,
            include_paths: Vec::new(),
            count_utf16_characters: false,
        }
    }
}

#[derive(Debug)]
pub enum CompileError {
    FileNotFound(PathBuf),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::FileNotFound(path) => {
                write!(f, "cannot open source file '{}'", path.display())
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// A prebuilt compilation of the standard library and optional user
/// preamble. All contexts are immutable after construction and safe for
/// concurrent reads.
pub struct CompiledPreamble {
    pub(crate) atoms: Arc<AtomTable>,
    pub(crate) sources: Arc<SourceContext>,
    pub(crate) lex: Arc<LexContext>,
    pub(crate) ast: Arc<AstContext>,
    pub(crate) types: Arc<TypeContext>,
    pub(crate) sema: Arc<SemanticInfo>,
    pub(crate) symbols: Arc<GlobalSymbols>,
    pub(crate) macros: MacroRegistry,
}

impl CompiledPreamble {
    pub fn ast(&self) -> &AstContext {
        &self.ast
    }

    pub fn lex(&self) -> &LexContext {
        &self.lex
    }

    pub fn symbols(&self) -> &GlobalSymbols {
        &self.symbols
    }

    pub fn semantic(&self) -> &SemanticInfo {
        &self.sema
    }
}

/// Immutable result of one compilation, referenced by downstream queries.
pub struct CompileResult {
    pub main_file: FileId,
    atoms: AtomTable,
    sources: SourceContext,
    lex: LexContext,
    ast: AstContext,
    types: TypeContext,
    sema: SemanticInfo,
    diagnostics: DiagnosticStream,
    translation_unit: NodeId,
}

impl CompileResult {
    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    pub fn sources(&self) -> &SourceContext {
        &self.sources
    }

    pub fn lex(&self) -> &LexContext {
        &self.lex
    }

    pub fn ast(&self) -> &AstContext {
        &self.ast
    }

    pub fn types(&self) -> &TypeContext {
        &self.types
    }

    pub fn semantic(&self) -> &SemanticInfo {
        &self.sema
    }

    pub fn diagnostics(&self) -> &DiagnosticStream {
        &self.diagnostics
    }

    pub fn translation_unit(&self) -> NodeId {
        self.translation_unit
    }

    /// One line per TU token, for the `dump_tokens` debugging sink.
    pub fn dump_tokens_string(&self) -> String {
        let mut out = String::new();
        for id in self.lex.tu_token_ids() {
            let token = self.lex.get_token(id);
            let range = token.expanded_range;
            out.push_str(&format!(
                "[{:?}]'{}' @ ({},{}~{},{})\n",
                token.kind,
                self.atoms.resolve(token.text),
                range.start.line,
                range.start.character,
                range.end.line,
                range.end.character,
            ));
        }
        out
    }

    pub fn dump_ast_json(&self) -> serde_json::Value {
        let dumper = crate::ast::dump::AstDumper { ast: &self.ast, lex: &self.lex, atoms: &self.atoms };
        dumper.to_json(self.translation_unit)
    }

    pub fn dump_ast_treeviz(&self) -> String {
        let dumper = crate::ast::dump::AstDumper { ast: &self.ast, lex: &self.lex, atoms: &self.atoms };
        dumper.to_treeviz(self.translation_unit)
    }

    /// Evaluation context for constant folding over this result.
    pub fn const_eval_context(&self) -> crate::semantic::ConstEvalContext<'_> {
        crate::semantic::ConstEvalContext {
            ast: &self.ast,
            lex: &self.lex,
            atoms: &self.atoms,
            types: &self.types,
            sema: &self.sema,
        }
    }
}

enum MainSource<'s> {
    Buffer(&'s str),
    File(&'s Path),
}

/// Drives one compilation. Configure, optionally attach a shared preamble,
/// then compile a buffer or file.
pub struct CompilerInvocation {
    config: CompilerConfig,
    preamble: Option<Arc<CompiledPreamble>>,
    system_preamble: Option<String>,
    user_preamble: String,
}

impl Default for CompilerInvocation {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl CompilerInvocation {
    pub fn new(config: CompilerConfig) -> Self {
        CompilerInvocation {
            config,
            preamble: None,
            system_preamble: None,
            user_preamble: String::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Layer this invocation over a prebuilt preamble.
    pub fn with_preamble(mut self, preamble: Arc<CompiledPreamble>) -> Self {
        self.preamble = Some(preamble);
        self
    }

    /// Replace the built-in standard library text. Only meaningful when no
    /// compiled preamble is attached.
    pub fn set_system_preamble(&mut self, text: impl Into<String>) {
        self.system_preamble = Some(text.into());
    }

    pub fn set_user_preamble(&mut self, text: impl Into<String>) {
        self.user_preamble = text.into();
    }

    pub fn compile_from_buffer(
        &self,
        source: &str,
        callback: Option<&mut dyn PpCallback>,
    ) -> CompileResult {
        self.do_compile(MainSource::Buffer(source), callback)
            .expect("buffer compilation cannot fail to open the main file")
    }

    pub fn compile_from_file(
        &self,
        path: &Path,
        callback: Option<&mut dyn PpCallback>,
    ) -> Result<CompileResult, CompileError> {
        self.do_compile(MainSource::File(path), callback)
    }

    /// Compile the preambles alone into a shareable module.
    pub fn compile_preamble(&self) -> Arc<CompiledPreamble> {
        let mut atoms = AtomTable::new();
        let mut sources = SourceContext::new();
        let mut lex = LexContext::new();
        let mut ast = AstContext::new();
        let mut types = TypeContext::new();
        let mut diags = DiagnosticStream::new();

        let system = self.system_preamble.as_deref().unwrap_or(STANDARD_LIBRARY_SOURCE);
        sources.set_system_preamble(system);
        sources.set_user_preamble(&self.user_preamble);

        let macros = {
            let mut callback = NullCallback;
            let mut pp = Preprocessor::new(
                &mut atoms,
                &mut sources,
                &mut lex,
                &mut diags,
                &mut callback,
                &self.config,
            );
            pp.preprocess_source_file(FileId::SYSTEM_PREAMBLE, false);
            pp.preprocess_source_file(FileId::USER_PREAMBLE, true);
            pp.take_macros()
        };

        let tu = {
            let builder = AstBuilder::new(&mut ast, &lex, &atoms);
            let mut parser = Parser::new(&lex, builder, &mut diags, SyntaxTokenId(0));
            parser.parse_translation_unit()
        };

        let sema =
            TypeChecker::new(&ast, &lex, &atoms, &mut types, &mut diags, None, None)
                .check_translation_unit(tu);

        sources.finalize();
        let symbols = Arc::new(sema.symbols.clone());
        Arc::new(CompiledPreamble {
            atoms: Arc::new(atoms),
            sources: Arc::new(sources),
            lex: Arc::new(lex),
            ast: Arc::new(ast),
            types: Arc::new(types),
            sema: Arc::new(sema),
            symbols,
            macros,
        })
    }

    fn do_compile(
        &self,
        main: MainSource<'_>,
        callback: Option<&mut dyn PpCallback>,
    ) -> Result<CompileResult, CompileError> {
        let (mut atoms, mut sources, mut lex, mut ast, mut types, external, base_sema) =
            match &self.preamble {
                Some(preamble) => (
                    AtomTable::layered(preamble.atoms.clone()),
                    SourceContext::layered(preamble.sources.clone()),
                    LexContext::layered(preamble.lex.clone()),
                    AstContext::layered(preamble.ast.clone()),
                    TypeContext::layered(preamble.types.clone()),
                    Some(preamble.symbols.clone()),
                    Some(preamble.sema.clone()),
                ),
                None => (
                    AtomTable::new(),
                    SourceContext::new(),
                    LexContext::new(),
                    AstContext::new(),
                    TypeContext::new(),
                    None,
                    None,
                ),
            };
        let mut diags = DiagnosticStream::new();

        if self.preamble.is_none() {
            let system = self.system_preamble.as_deref().unwrap_or(STANDARD_LIBRARY_SOURCE);
            sources.set_system_preamble(system);
            sources.set_user_preamble(&self.user_preamble);
        }

        let main_file = match main {
            MainSource::Buffer(text) => sources.open_from_buffer(text),
            MainSource::File(path) => {
                let id = sources.open_from_file(path);
                if !id.is_valid() {
                    return Err(CompileError::FileNotFound(path.to_path_buf()));
                }
                id
            }
        };

        {
            let mut null_callback = NullCallback;
            let callback: &mut dyn PpCallback = match callback {
                Some(callback) => callback,
                None => &mut null_callback,
            };
            let mut pp = Preprocessor::new(
                &mut atoms,
                &mut sources,
                &mut lex,
                &mut diags,
                callback,
                &self.config,
            );
            match &self.preamble {
                Some(preamble) => pp.set_macros(preamble.macros.clone()),
                None => {
                    pp.preprocess_source_file(FileId::SYSTEM_PREAMBLE, false);
                    if !self.config.skip_user_preamble {
                        pp.preprocess_source_file(FileId::USER_PREAMBLE, false);
                    }
                }
            }
            pp.mark_tu_start();
            pp.preprocess_source_file(main_file, true);
        }

        let parse_start =
            if self.preamble.is_some() { lex.tu_start() } else { SyntaxTokenId(0) };
        let tu = {
            let builder = AstBuilder::new(&mut ast, &lex, &atoms);
            let mut parser = Parser::new(&lex, builder, &mut diags, parse_start);
            parser.parse_translation_unit()
        };

        let sema = TypeChecker::new(
            &ast,
            &lex,
            &atoms,
            &mut types,
            &mut diags,
            external,
            base_sema,
        )
        .check_translation_unit(tu);

        sources.finalize();
        let result = CompileResult {
            main_file,
            atoms,
            sources,
            lex,
            ast,
            types,
            sema,
            diagnostics: diags,
            translation_unit: tu,
        };

        if self.config.dump_tokens {
            print!("{}", result.dump_tokens_string());
        }
        if self.config.dump_ast {
            println!("{}", result.dump_ast_treeviz());
        }

        Ok(result)
    }
}

/// The process-wide standard library module, compiled once on first use and
/// then shared read-only.
pub fn standard_library_preamble() -> Arc<CompiledPreamble> {
    static MODULE: Lazy<Arc<CompiledPreamble>> =
        Lazy::new(|| CompilerInvocation::new(CompilerConfig::default()).compile_preamble());
    MODULE.clone()
}

/// Declarations of the builtin library surface the checker knows about:
/// the constant-foldable math builtins over their scalar and vector
/// shapes, the common geometric functions, texture sampling entry points,
/// and the builtin pipeline variables.
pub const STANDARD_LIBRARY_SOURCE: &str = r#"
// glsl-front builtin library preamble

vec4 gl_Position;
vec4 gl_FragCoord;
vec4 gl_FragColor;
int gl_VertexID;
int gl_InstanceID;

const int gl_MaxVertexAttribs = 16;
const int gl_MaxDrawBuffers = 8;

float radians(float degrees); vec2 radians(vec2 degrees); vec3 radians(vec3 degrees); vec4 radians(vec4 degrees);
float degrees(float radians); vec2 degrees(vec2 radians); vec3 degrees(vec3 radians); vec4 degrees(vec4 radians);
float sin(float angle); vec2 sin(vec2 angle); vec3 sin(vec3 angle); vec4 sin(vec4 angle);
float cos(float angle); vec2 cos(vec2 angle); vec3 cos(vec3 angle); vec4 cos(vec4 angle);
float tan(float angle); vec2 tan(vec2 angle); vec3 tan(vec3 angle); vec4 tan(vec4 angle);
float asin(float x); vec2 asin(vec2 x); vec3 asin(vec3 x); vec4 asin(vec4 x);
float acos(float x); vec2 acos(vec2 x); vec3 acos(vec3 x); vec4 acos(vec4 x);
float atan(float y, float x); float atan(float y_over_x);
float exp(float x); vec2 exp(vec2 x); vec3 exp(vec3 x); vec4 exp(vec4 x);
float log(float x); vec2 log(vec2 x); vec3 log(vec3 x); vec4 log(vec4 x);
float exp2(float x); vec2 exp2(vec2 x); vec3 exp2(vec3 x); vec4 exp2(vec4 x);
float log2(float x); vec2 log2(vec2 x); vec3 log2(vec3 x); vec4 log2(vec4 x);
float sqrt(float x); vec2 sqrt(vec2 x); vec3 sqrt(vec3 x); vec4 sqrt(vec4 x);
float inversesqrt(float x); vec2 inversesqrt(vec2 x); vec3 inversesqrt(vec3 x); vec4 inversesqrt(vec4 x);
float pow(float x, float y); vec2 pow(vec2 x, vec2 y); vec3 pow(vec3 x, vec3 y); vec4 pow(vec4 x, vec4 y);

float abs(float x); vec2 abs(vec2 x); vec3 abs(vec3 x); vec4 abs(vec4 x);
int abs(int x); ivec2 abs(ivec2 x); ivec3 abs(ivec3 x); ivec4 abs(ivec4 x);
float sign(float x); vec2 sign(vec2 x); vec3 sign(vec3 x); vec4 sign(vec4 x);
int sign(int x); ivec2 sign(ivec2 x); ivec3 sign(ivec3 x); ivec4 sign(ivec4 x);
float floor(float x); vec2 floor(vec2 x); vec3 floor(vec3 x); vec4 floor(vec4 x);
float trunc(float x); vec2 trunc(vec2 x); vec3 trunc(vec3 x); vec4 trunc(vec4 x);
float round(float x); vec2 round(vec2 x); vec3 round(vec3 x); vec4 round(vec4 x);
float ceil(float x); vec2 ceil(vec2 x); vec3 ceil(vec3 x); vec4 ceil(vec4 x);
float fract(float x); vec2 fract(vec2 x); vec3 fract(vec3 x); vec4 fract(vec4 x);
float mod(float x, float y); vec2 mod(vec2 x, vec2 y); vec3 mod(vec3 x, vec3 y); vec4 mod(vec4 x, vec4 y);

float min(float x, float y); vec2 min(vec2 x, vec2 y); vec3 min(vec3 x, vec3 y); vec4 min(vec4 x, vec4 y);
int min(int x, int y); uint min(uint x, uint y);
float max(float x, float y); vec2 max(vec2 x, vec2 y); vec3 max(vec3 x, vec3 y); vec4 max(vec4 x, vec4 y);
int max(int x, int y); uint max(uint x, uint y);
float clamp(float x, float minVal, float maxVal); vec2 clamp(vec2 x, vec2 minVal, vec2 maxVal); vec3 clamp(vec3 x, vec3 minVal, vec3 maxVal); vec4 clamp(vec4 x, vec4 minVal, vec4 maxVal);
int clamp(int x, int minVal, int maxVal); uint clamp(uint x, uint minVal, uint maxVal);
float mix(float x, float y, float a); vec2 mix(vec2 x, vec2 y, vec2 a); vec3 mix(vec3 x, vec3 y, vec3 a); vec4 mix(vec4 x, vec4 y, vec4 a);
vec2 mix(vec2 x, vec2 y, float a); vec3 mix(vec3 x, vec3 y, float a); vec4 mix(vec4 x, vec4 y, float a);
float step(float edge, float x); vec2 step(vec2 edge, vec2 x); vec3 step(vec3 edge, vec3 x); vec4 step(vec4 edge, vec4 x);
float smoothstep(float edge0, float edge1, float x); vec2 smoothstep(vec2 edge0, vec2 edge1, vec2 x); vec3 smoothstep(vec3 edge0, vec3 edge1, vec3 x); vec4 smoothstep(vec4 edge0, vec4 edge1, vec4 x);

float length(vec2 x); float length(vec3 x); float length(vec4 x); float length(float x);
float distance(vec2 p0, vec2 p1); float distance(vec3 p0, vec3 p1); float distance(vec4 p0, vec4 p1);
float dot(vec2 x, vec2 y); float dot(vec3 x, vec3 y); float dot(vec4 x, vec4 y);
vec3 cross(vec3 x, vec3 y);
vec2 normalize(vec2 x); vec3 normalize(vec3 x); vec4 normalize(vec4 x);
vec3 reflect(vec3 I, vec3 N); vec2 reflect(vec2 I, vec2 N);
vec3 refract(vec3 I, vec3 N, float eta);

vec4 texture(sampler2D sampler, vec2 P);
vec4 texture(sampler3D sampler, vec3 P);
vec4 texture(samplerCube sampler, vec3 P);
vec4 texture(sampler1D sampler, float P);
vec4 texelFetch(sampler2D sampler, ivec2 P, int lod);
vec4 textureLod(sampler2D sampler, vec2 P, float lod);
ivec2 textureSize(sampler2D sampler, int lod);
"#;
