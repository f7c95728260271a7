//! GLSL Compilation Dump CLI Tool
//!
//! A command line tool that compiles a GLSL file (or every shader under a
//! directory) and prints the chosen artifact: token stream, AST, the
//! preprocessor event trace, or diagnostics.
//!
//! Usage:
//!   glsl-dump `<input>` [options]
//!
//! Options:
//!   --format `<format>`   Output format: diagnostics (default),
//!                         token-stream, ast, ast-treeviz, pp-events
//!   --include `<dir>`     Add an include search directory (repeatable)
//!   --filter `<regex>`    Only print diagnostics whose message matches
//!   --utf16               Count columns in UTF-16 code units
//!   --no-color            Disable colored diagnostics

use clap::{Arg, Command};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use glsl_front::api::{process, OutputFormat, ProcessArgs};
use glsl_front::compiler::CompilerConfig;
use glsl_front::diagnostics::{DiagnosticAnchor, Severity};
use glsl_front::CompilerInvocation;

const SHADER_EXTENSIONS: [&str; 6] = ["glsl", "vert", "frag", "comp", "geom", "tesc"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("glsl-dump")
        .version("0.1.0")
        .about("GLSL compilation dump tool")
        .arg(Arg::new("input").help("Input GLSL file or directory").required(true).index(1))
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .help("Output format: diagnostics, token-stream, ast, ast-treeviz, pp-events")
                .default_value("diagnostics"),
        )
        .arg(
            Arg::new("include")
                .long("include")
                .short('I')
                .value_name("DIR")
                .help("Add an include search directory")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("filter")
                .long("filter")
                .value_name("REGEX")
                .help("Only print diagnostics whose message matches"),
        )
        .arg(
            Arg::new("utf16")
                .long("utf16")
                .help("Count columns in UTF-16 code units")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored diagnostics")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let input = PathBuf::from(matches.get_one::<String>("input").expect("required"));
    let format: OutputFormat = matches
        .get_one::<String>("format")
        .expect("has default")
        .parse()
        .map_err(|e: String| -> Box<dyn std::error::Error> { e.into() })?;
    let filter = matches
        .get_one::<String>("filter")
        .map(|pattern| Regex::new(pattern))
        .transpose()?;

    let mut config = CompilerConfig {
        count_utf16_characters: matches.get_flag("utf16"),
        ..CompilerConfig::default()
    };
    if let Some(dirs) = matches.get_many::<String>("include") {
        config.include_paths = dirs.map(PathBuf::from).collect();
    }

    let use_color = !matches.get_flag("no-color") && atty::is(atty::Stream::Stdout);

    let files = collect_inputs(&input)?;
    for file in files {
        if format == OutputFormat::Diagnostics {
            print_diagnostics(&file, &config, filter.as_ref(), use_color)?;
        } else {
            let content = std::fs::read_to_string(&file)?;
            let args = ProcessArgs {
                content,
                source_path: file.display().to_string(),
                format,
                config: config.clone(),
            };
            println!("{}", process(args)?);
        }
    }
    Ok(())
}

/// A single file, or every shader source under a directory.
fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(format!("no such file or directory: {}", input.display()).into());
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(input) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_shader = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        if is_shader {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn print_diagnostics(
    file: &Path,
    config: &CompilerConfig,
    filter: Option<&Regex>,
    use_color: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let invocation = CompilerInvocation::new(config.clone())
        .with_preamble(glsl_front::compiler::standard_library_preamble());
    let result = invocation.compile_from_file(file, None)?;

    let choice = if use_color { ColorChoice::Auto } else { ColorChoice::Never };
    let mut stdout = StandardStream::stdout(choice);

    let width = terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(120);

    for diagnostic in result.diagnostics().diagnostics() {
        if let Some(filter) = filter {
            if !filter.is_match(&diagnostic.message) {
                continue;
            }
        }

        let (color, label) = match diagnostic.severity {
            Severity::Error => (Color::Red, "error"),
            Severity::Warning => (Color::Yellow, "warning"),
        };
        let location = match diagnostic.anchor {
            DiagnosticAnchor::Token(token) => {
                let range = result.lex().lookup_expanded_range(token);
                format!("{}:{}", range.start.line + 1, range.start.character + 1)
            }
            DiagnosticAnchor::Spelled { range, .. } => {
                format!("{}:{}", range.start.line + 1, range.start.character + 1)
            }
        };

        stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(stdout, "{label}")?;
        stdout.reset()?;

        let mut line = format!(": {}:{location}: {}", file.display(), diagnostic.message);
        if line.len() > width {
            line.truncate(width.saturating_sub(3));
            line.push_str("...");
        }
        writeln!(stdout, "{line}")?;
    }

    let errors = result.diagnostics().error_count();
    if errors > 0 {
        writeln!(stdout, "{}: {errors} error(s)", file.display())?;
    }
    Ok(())
}
