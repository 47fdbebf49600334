//! `GeneratorError` (§7): the error kind the generator (§4.9) raises. Unlike
//! the semantic passes, generation failures are meant to be unreachable once
//! every earlier pass has succeeded — they exist to surface a bug in one of
//! those passes rather than a user-facing diagnostic, matching the original
//! generator's `assert`-heavy style (`generator.cpp` asserts instead of
//! propagating an error in most of these spots; this crate turns every one
//! of those assertions into a recoverable `Result` instead, per the
//! teacher's no-panics-in-library-code convention).

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// A `Variable`/`Call`/`MemberAccessor` referenced a global name with no
    /// corresponding LLVM declaration in this or any sibling module.
    UndeclaredGlobal(String),
    /// A node reached the generator missing an annotation a prior pass
    /// should have filled in (a `ty`, `return_type`, `captures`, etc.).
    MissingAnnotation(String),
    /// An inkwell builder call failed (`BuilderError`), stringified.
    Builder(String),
    /// The global DCE pass manager failed to run.
    Dce(String),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::UndeclaredGlobal(name) => write!(f, "no LLVM declaration for global '{name}'"),
            GeneratorError::MissingAnnotation(what) => write!(f, "missing annotation at codegen time: {what}"),
            GeneratorError::Builder(msg) => write!(f, "LLVM builder error: {msg}"),
            GeneratorError::Dce(msg) => write!(f, "global DCE pass failed: {msg}"),
        }
    }
}

impl Error for GeneratorError {}

impl From<inkwell::builder::BuilderError> for GeneratorError {
    fn from(value: inkwell::builder::BuilderError) -> Self {
        GeneratorError::Builder(value.to_string())
    }
}
