//! Cross-module extern binding — the prerequisite step between top-level
//! analysis and the resolver (§4.5's scope stack assumes `externals_scope`
//! is already populated). Thin wrapper around [`crate::module::bind_externs`],
//! which holds the actual direction-blind copy grounded on
//! `original_source/ast/scope.cpp`'s `UpdateTypes`/`UpdateVariables`.

use crate::module::{bind_externs, Module};
use crate::semantics::error::SemanticError;

pub fn run(modules: &mut [Module]) -> Result<(), SemanticError> {
    bind_externs(modules)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Qualifier, Type};
    use std::path::PathBuf;

    #[test]
    fn binds_externs_across_every_module_pair() {
        let mut a = Module::new("a", PathBuf::from("a.l0"), vec![]);
        let mut b = Module::new("b", PathBuf::from("b.l0"), vec![]);
        a.globals.declare_variable_with_type("from_a", Type::Integer(Qualifier::Constant)).unwrap();
        b.globals.declare_variable_with_type("from_b", Type::Integer(Qualifier::Constant)).unwrap();
        let mut modules = vec![a, b];
        run(&mut modules).unwrap();
        assert!(modules[0].externals.is_variable_declared("from_b"));
        assert!(modules[1].externals.is_variable_declared("from_a"));
    }
}
