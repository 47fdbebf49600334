//! Per-module scope: variable and type declaration dictionaries.
//!
//! Grounded directly on `ast/scope.h`/`scope.cpp` of the original
//! implementation: declaring a name and giving it a type are distinct
//! operations, and `update_*` is the literal mechanism behind cross-module
//! extern binding (every sibling module's globals get copied in,
//! unconditionally). The original's fourth dictionary (name -> backend
//! value, populated only during IR generation) is not reproduced here —
//! `Scope` stays generation-agnostic and `crate::codegen::CodegenContext`
//! keeps its own value map keyed by scope identity, the way the teacher
//! crate separates `typechecker::Scope` from `codegen::CodegenContext`'s
//! own scope stack.

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::identifier::Identifier;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    DuplicateVariable(String),
    UndeclaredVariable(String),
    VariableTypeAlreadySet(String),
    VariableTypeUnset(String),
    DuplicateType(String),
    UndeclaredType(String),
    TypeAlreadyDefined(String),
    TypeUndefined(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::DuplicateVariable(name) => write!(f, "variable '{name}' is already declared"),
            ScopeError::UndeclaredVariable(name) => write!(f, "usage of undeclared variable '{name}'"),
            ScopeError::VariableTypeAlreadySet(name) => write!(f, "type of variable '{name}' is already set"),
            ScopeError::VariableTypeUnset(name) => write!(f, "type of variable '{name}' has not been set yet"),
            ScopeError::DuplicateType(name) => write!(f, "type '{name}' is already declared"),
            ScopeError::UndeclaredType(name) => write!(f, "usage of undeclared type '{name}'"),
            ScopeError::TypeAlreadyDefined(name) => write!(f, "type '{name}' is already defined"),
            ScopeError::TypeUndefined(name) => write!(f, "type '{name}' has not been defined yet"),
        }
    }
}

impl Error for ScopeError {}

#[derive(Default)]
struct ScopeInner {
    variables: HashMap<String, Option<Type>>,
    types: HashMap<String, Option<Type>>,
}

/// A shared, interior-mutable scope handle. Cloning a `Scope` aliases the
/// same dictionaries — this is how a `Variable`'s resolved scope and a
/// `Function`'s locals scope can both be handed out by value while staying
/// the same underlying object, matching the original's `shared_ptr<Scope>`.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Rc<RefCell<ScopeInner>>,
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({:p})", Rc::as_ptr(&self.inner))
    }
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable identity for this scope, usable as a key in side-tables that
    /// must not live inside the AST itself (e.g. codegen's per-scope LLVM
    /// value maps).
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub fn declare_variable(&self, name: &str) -> Result<(), ScopeError> {
        let mut inner = self.inner.borrow_mut();
        if inner.variables.contains_key(name) {
            return Err(ScopeError::DuplicateVariable(name.into()));
        }
        inner.variables.insert(name.into(), None);
        Ok(())
    }

    pub fn declare_variable_with_type(&self, name: &str, ty: Type) -> Result<(), ScopeError> {
        let mut inner = self.inner.borrow_mut();
        if inner.variables.contains_key(name) {
            return Err(ScopeError::DuplicateVariable(name.into()));
        }
        inner.variables.insert(name.into(), Some(ty));
        Ok(())
    }

    pub fn is_variable_declared(&self, name: &str) -> bool {
        self.inner.borrow().variables.contains_key(name)
    }

    pub fn set_variable_type(&self, name: &str, ty: Type) -> Result<(), ScopeError> {
        let mut inner = self.inner.borrow_mut();
        match inner.variables.get(name) {
            None => Err(ScopeError::UndeclaredVariable(name.into())),
            Some(Some(_)) => Err(ScopeError::VariableTypeAlreadySet(name.into())),
            Some(None) => {
                inner.variables.insert(name.into(), Some(ty));
                Ok(())
            }
        }
    }

    pub fn get_variable_type(&self, name: &str) -> Result<Type, ScopeError> {
        let inner = self.inner.borrow();
        match inner.variables.get(name) {
            None => Err(ScopeError::UndeclaredVariable(name.into())),
            Some(None) => Err(ScopeError::VariableTypeUnset(name.into())),
            Some(Some(ty)) => Ok(ty.clone()),
        }
    }

    pub fn declare_type(&self, name: &str) -> Result<(), ScopeError> {
        let mut inner = self.inner.borrow_mut();
        if inner.types.contains_key(name) {
            return Err(ScopeError::DuplicateType(name.into()));
        }
        inner.types.insert(name.into(), None);
        Ok(())
    }

    pub fn is_type_declared(&self, name: &str) -> bool {
        self.inner.borrow().types.contains_key(name)
    }

    pub fn define_type(&self, name: &str, ty: Type) -> Result<(), ScopeError> {
        let mut inner = self.inner.borrow_mut();
        match inner.types.get(name) {
            None => Err(ScopeError::UndeclaredType(name.into())),
            Some(Some(_)) => Err(ScopeError::TypeAlreadyDefined(name.into())),
            Some(None) => {
                inner.types.insert(name.into(), Some(ty));
                Ok(())
            }
        }
    }

    /// Overwrites an already-declared type's definition, regardless of
    /// whether it was previously defined. Used by the global scope builder
    /// (§4.4) to replace a struct/enum's empty shell (from §4.3) with its
    /// filled-in members, which plain `define_type` (define-once) can't do.
    pub fn redefine_type(&self, name: &str, ty: Type) -> Result<(), ScopeError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.types.contains_key(name) {
            return Err(ScopeError::UndeclaredType(name.into()));
        }
        inner.types.insert(name.into(), Some(ty));
        Ok(())
    }

    pub fn get_type(&self, name: &str) -> Result<Type, ScopeError> {
        let inner = self.inner.borrow();
        match inner.types.get(name) {
            None => Err(ScopeError::UndeclaredType(name.into())),
            Some(None) => Err(ScopeError::TypeUndefined(name.into())),
            Some(Some(ty)) => Ok(ty.clone()),
        }
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.inner.borrow().variables.keys().cloned().collect()
    }

    pub fn type_names(&self) -> Vec<String> {
        self.inner.borrow().types.keys().cloned().collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.variables.clear();
        inner.types.clear();
    }

    /// Direction-blind cross-module extern binding: copy every declared
    /// and defined type from `other` into `self`, unconditionally.
    pub fn update_types(&self, other: &Scope) -> Result<(), ScopeError> {
        for name in other.type_names() {
            self.declare_type(&name)?;
            if let Ok(def) = other.get_type(&name) {
                self.define_type(&name, def)?;
            }
        }
        Ok(())
    }

    /// Direction-blind cross-module extern binding for variables.
    pub fn update_variables(&self, other: &Scope) -> Result<(), ScopeError> {
        for name in other.variable_names() {
            if let Ok(ty) = other.get_variable_type(&name) {
                self.declare_variable_with_type(&name, ty)?;
            } else {
                self.declare_variable(&name)?;
            }
        }
        Ok(())
    }
}

/// Resolve a name against a scope stack, innermost last, returning the
/// first scope (searching from the top) in which it is declared.
pub fn resolve(stack: &[Scope], name: &str) -> Result<Scope, ScopeError> {
    for scope in stack.iter().rev() {
        if scope.is_variable_declared(name) {
            return Ok(scope.clone());
        }
    }
    Err(ScopeError::UndeclaredVariable(name.into()))
}

pub fn resolve_identifier(stack: &[Scope], name: &Identifier) -> Result<Scope, ScopeError> {
    resolve(stack, &name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_declaration_is_an_error() {
        let scope = Scope::new();
        scope.declare_variable("x").unwrap();
        assert_eq!(scope.declare_variable("x"), Err(ScopeError::DuplicateVariable("x".into())));
    }

    #[test]
    fn lookup_of_undeclared_name_is_an_error() {
        let scope = Scope::new();
        assert_eq!(
            scope.get_variable_type("x"),
            Err(ScopeError::UndeclaredVariable("x".into()))
        );
    }

    #[test]
    fn set_type_twice_is_an_error() {
        let scope = Scope::new();
        scope.declare_variable("x").unwrap();
        scope
            .set_variable_type("x", Type::Integer(crate::types::Qualifier::Constant))
            .unwrap();
        assert_eq!(
            scope.set_variable_type("x", Type::Integer(crate::types::Qualifier::Constant)),
            Err(ScopeError::VariableTypeAlreadySet("x".into()))
        );
    }

    #[test]
    fn update_variables_copies_sibling_declarations() {
        let a = Scope::new();
        let b = Scope::new();
        a.declare_variable_with_type("shared", Type::Integer(crate::types::Qualifier::Constant))
            .unwrap();
        b.update_variables(&a).unwrap();
        assert!(b.is_variable_declared("shared"));
    }

    #[test]
    fn scope_clone_aliases_same_storage() {
        let a = Scope::new();
        let b = a.clone();
        a.declare_variable("x").unwrap();
        assert!(b.is_variable_declared("x"));
    }
}
