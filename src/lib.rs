//! Ahead-of-time compiler front-end for L0, lowering to LLVM IR (§1-§2).
//!
//! [`compile`] wires the whole pipeline together: lex + parse each module
//! independently, then run the remaining passes across the whole module set
//! together (§5's ordering requirement), finishing with IR generation and
//! global DCE. The CLI driver (`src/bin/l0c`) is the only caller; this is
//! the crate's one public entry point, modeled on the teacher's
//! `why_lib::compile` top-level function.

pub mod ast;
pub mod codegen;
pub mod identifier;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod scope;
pub mod semantics;
pub mod types;

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use inkwell::context::Context;

use module::Module;

/// Unifies the five error kinds a compilation run can fail with (§7), so
/// the CLI driver can match once and print-then-exit rather than threading
/// five distinct error types through its own call sites.
#[derive(Debug)]
pub enum CompileError {
    Lex(lexer::LexError),
    Parse(parser::ParseError),
    Semantic(semantics::SemanticError),
    Generator(codegen::GeneratorError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "lex error: {e}"),
            CompileError::Parse(e) => write!(f, "parse error: {e}"),
            CompileError::Semantic(e) => write!(f, "semantic error: {e}"),
            CompileError::Generator(e) => write!(f, "codegen error: {e}"),
        }
    }
}

impl Error for CompileError {}

impl From<lexer::LexError> for CompileError {
    fn from(value: lexer::LexError) -> Self {
        CompileError::Lex(value)
    }
}

impl From<parser::ParseError> for CompileError {
    fn from(value: parser::ParseError) -> Self {
        CompileError::Parse(value)
    }
}

impl From<semantics::SemanticError> for CompileError {
    fn from(value: semantics::SemanticError) -> Self {
        CompileError::Semantic(value)
    }
}

impl From<codegen::GeneratorError> for CompileError {
    fn from(value: codegen::GeneratorError) -> Self {
        CompileError::Generator(value)
    }
}

/// One source file, lexed and parsed into a [`Module`] on its own — lexing
/// and parsing never need a sibling module's output, unlike every pass from
/// extern binding onward (§5).
pub fn load_module(path: PathBuf) -> Result<Module, CompileError> {
    let source = std::fs::read_to_string(&path).map_err(|e| {
        CompileError::Lex(lexer::LexError {
            message: format!("failed to read '{}': {e}", path.display()),
            position: lexer::Span::default(),
        })
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    log::debug!("lexing module '{name}'");
    let tokens = lexer::Lexer::new(&source).lex()?;
    log::debug!("parsing module '{name}'");
    let statements = parser::parse_module(tokens)?;

    Ok(Module::new(name, path, statements))
}

/// Runs the full pipeline over every loaded module and returns each
/// module's generated `(name, ir_text)` pair, ready to be written to
/// `<stem>.ll` files beside their sources.
pub fn compile(paths: Vec<PathBuf>) -> Result<Vec<(String, String)>, CompileError> {
    let mut modules: Vec<Module> = paths.into_iter().map(load_module).collect::<Result<_, _>>()?;

    log::debug!("running semantic passes over {} module(s)", modules.len());
    semantics::run_all(&mut modules)?;

    log::debug!("running code generation over {} module(s)", modules.len());
    let context = Context::create();
    let outputs = codegen::compile_modules(&context, &modules)?;
    Ok(outputs)
}
