//! `SemanticError` (§7): the single error kind shared by top-level analysis,
//! the resolver, the type checker, the return-statement pass, and the
//! reference pass. `ScopeError`s from the underlying `Scope` dictionaries
//! fold into it via `From`, matching the original's practice of wrapping
//! lower-level declaration failures into the same diagnostic channel the
//! higher passes already raise.

use std::error::Error;
use std::fmt;

use crate::scope::ScopeError;

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticError {
    Scope(ScopeError),
    InvalidModuleStatement(String),
    TypeMismatch { expected: String, found: String },
    NonBooleanCondition(String),
    UnresolvedName(String),
    AssignmentToConstant(String),
    NonLvalueTarget(String),
    MissingReturn(String),
    DuplicateStructInitializer { ty: String, member: String },
    MissingStructInitializer { ty: String, member: String },
    UnknownStructMember { ty: String, member: String },
    NoViableUnaryOverload { op: String, operand: String },
    NoViableBinaryOverload { op: String, left: String, right: String },
    NotAFunction(String),
    NotAStruct(String),
    NotAReference(String),
    ArityMismatch { expected: usize, found: usize },
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::Scope(e) => write!(f, "{e}"),
            SemanticError::InvalidModuleStatement(msg) => write!(f, "invalid module-level statement: {msg}"),
            SemanticError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected '{expected}', found '{found}'")
            }
            SemanticError::NonBooleanCondition(found) => {
                write!(f, "condition must be a Boolean, found '{found}'")
            }
            SemanticError::UnresolvedName(name) => write!(f, "could not resolve name '{name}'"),
            SemanticError::AssignmentToConstant(name) => {
                write!(f, "cannot assign to constant target '{name}'")
            }
            SemanticError::NonLvalueTarget(msg) => write!(f, "not an lvalue: {msg}"),
            SemanticError::MissingReturn(name) => {
                write!(f, "not every path in '{name}' returns a value")
            }
            SemanticError::DuplicateStructInitializer { ty, member } => {
                write!(f, "member '{member}' of '{ty}' is initialized more than once")
            }
            SemanticError::MissingStructInitializer { ty, member } => {
                write!(f, "member '{member}' of '{ty}' is never initialized")
            }
            SemanticError::UnknownStructMember { ty, member } => {
                write!(f, "'{ty}' has no member named '{member}'")
            }
            SemanticError::NoViableUnaryOverload { op, operand } => {
                write!(f, "no viable overload for unary '{op}' on '{operand}'")
            }
            SemanticError::NoViableBinaryOverload { op, left, right } => {
                write!(f, "no viable overload for '{left} {op} {right}'")
            }
            SemanticError::NotAFunction(found) => write!(f, "'{found}' is not callable"),
            SemanticError::NotAStruct(found) => write!(f, "'{found}' is not a struct"),
            SemanticError::NotAReference(found) => write!(f, "'{found}' is not a reference"),
            SemanticError::ArityMismatch { expected, found } => {
                write!(f, "expected {expected} argument(s), found {found}")
            }
        }
    }
}

impl Error for SemanticError {}

impl From<ScopeError> for SemanticError {
    fn from(value: ScopeError) -> Self {
        SemanticError::Scope(value)
    }
}
