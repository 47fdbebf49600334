//! A single compiled unit: one source file's AST plus its three scopes.
//!
//! Shape grounded on the teacher's legacy `src/loader::Module<T>` (name,
//! source path, AST, exports/imports) crossed with the original
//! implementation's `l0::Module` struct (`environment`/`externals`/`globals`
//! scopes, `callables` list, `global_declarations`/`global_type_declarations`
//! convenience lists) — the latter is what actually shapes this struct,
//! since spec.md's module model (§3) is the original's, not the teacher's
//! import-resolving one.

use std::path::PathBuf;

use crate::ast::expression::Expression;
use crate::ast::statement::{Statement, TypeDefinition};
use crate::identifier::Identifier;
use crate::scope::Scope;

/// A top-level `Declaration` whose initializer must be a `Function`
/// (§4.4). Stored by index into `Module::statements` so passes can walk
/// both the plain statement list and this convenience view without
/// duplicating ownership.
pub type GlobalDeclarationIndex = usize;
pub type GlobalTypeDeclarationIndex = usize;

pub struct Module {
    pub name: String,
    pub source_path: PathBuf,

    pub statements: Vec<Statement>,

    /// Compiler-provided builtins: `printf`, `getchar`.
    pub environment: Scope,
    /// Declarations copied in from every sibling module (§4.5 prerequisite).
    pub externals: Scope,
    /// This module's own top-level declarations.
    pub globals: Scope,

    pub global_declarations: Vec<GlobalDeclarationIndex>,
    pub global_type_declarations: Vec<GlobalTypeDeclarationIndex>,

    /// Ordered worklist of the `global_name`s the generator must declare and
    /// define: top-level functions and struct/enum default-initializer
    /// functions, named per §4.9 (`"__fn__<qualified name>"`, or `"main"`).
    /// Populated by the global scope builder (§4.4) in declaration order.
    ///
    /// Deliberately just names, not cloned `Expression`s: the actual
    /// `Function` node lives exactly once, inside `Module::statements` (a
    /// top-level `Declaration`'s initializer, or nested inside a
    /// `TypeDeclaration`'s member list), and every later pass mutates that
    /// one copy in place. A name-only worklist means there is never a second
    /// copy to keep in sync. `find_callable` walks the tree to recover the
    /// node itself when the generator is ready to lower it. Lambdas are not
    /// listed here — the generator discovers and names them as it walks into
    /// a callable's body.
    pub callables: Vec<String>,
}

impl Module {
    pub fn new(name: impl Into<String>, source_path: PathBuf, statements: Vec<Statement>) -> Self {
        let environment = Scope::new();
        declare_environment(&environment);

        Self {
            name: name.into(),
            source_path,
            statements,
            environment,
            externals: Scope::new(),
            globals: Scope::new(),
            global_declarations: Vec::new(),
            global_type_declarations: Vec::new(),
            callables: Vec::new(),
        }
    }

    pub fn resolve_global(&self, local_name: &str) -> String {
        format!("{}_{}", self.name, local_name)
    }

    pub fn qualify(&self, name: &str) -> Identifier {
        Identifier::new(name)
    }

    /// Locates the `Function` expression whose `global_name` matches, among
    /// every top-level `Declaration` and every struct member's default
    /// initializer. Used by the generator (§4.9) to recover a callable's
    /// fully-resolved AST node from `Module::callables`' worklist.
    pub fn find_callable(&self, global_name: &str) -> Option<&Expression> {
        for statement in &self.statements {
            match statement {
                Statement::Declaration { initializer, .. } => {
                    if matches!(initializer, Expression::Function { global_name: Some(g), .. } if g == global_name) {
                        return Some(initializer);
                    }
                }
                Statement::TypeDeclaration {
                    definition: TypeDefinition::Struct { members },
                    ..
                } => {
                    for member in members {
                        if let Some(initializer) = &member.initializer {
                            if matches!(initializer, Expression::Function { global_name: Some(g), .. } if g == global_name)
                            {
                                return Some(initializer);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Mutable counterpart of [`Module::find_callable`], used by the
    /// semantic passes (resolver onward) to annotate a callable's body in
    /// place.
    pub fn find_callable_mut(&mut self, global_name: &str) -> Option<&mut Expression> {
        for statement in &mut self.statements {
            match statement {
                Statement::Declaration { initializer, .. } => {
                    if matches!(initializer, Expression::Function { global_name: Some(g), .. } if g == global_name) {
                        return Some(initializer);
                    }
                }
                Statement::TypeDeclaration {
                    definition: TypeDefinition::Struct { members },
                    ..
                } => {
                    for member in members {
                        if let Some(initializer) = &mut member.initializer {
                            if matches!(initializer, Expression::Function { global_name: Some(g), .. } if g == global_name)
                            {
                                return Some(initializer);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Populates `printf : (CString) -> I64` and `getchar : () -> C8` per §6.
fn declare_environment(environment: &Scope) {
    use crate::types::{Qualifier, Type};
    use std::rc::Rc;

    let string_ty = Type::Reference(Rc::new(Type::Character(Qualifier::Constant)), Qualifier::Constant);
    let printf_ty = Type::Function {
        params: vec![Rc::new(string_ty)],
        return_type: Rc::new(Type::Integer(Qualifier::Constant)),
        qualifier: Qualifier::Constant,
    };
    environment
        .declare_variable_with_type("printf", printf_ty)
        .expect("environment scope starts empty");

    let getchar_ty = Type::Function {
        params: vec![],
        return_type: Rc::new(Type::Character(Qualifier::Constant)),
        qualifier: Qualifier::Constant,
    };
    environment
        .declare_variable_with_type("getchar", getchar_ty)
        .expect("environment scope starts empty");
}

/// Cross-module extern binding (§2 step 5): every module copies every
/// sibling module's types and globals into its own `externals` scope,
/// direction-blind — regardless of whether anything in the module
/// actually references them.
pub fn bind_externs(modules: &mut [Module]) -> Result<(), crate::scope::ScopeError> {
    let siblings: Vec<(usize, Scope)> = modules.iter().enumerate().map(|(i, m)| (i, m.globals.clone())).collect();

    for (i, module) in modules.iter_mut().enumerate() {
        for (j, globals) in &siblings {
            if *j == i {
                continue;
            }
            module.externals.update_types(globals)?;
            module.externals.update_variables(globals)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_module_has_printf_and_getchar_in_environment() {
        let module = Module::new("main", PathBuf::from("main.l0"), vec![]);
        assert!(module.environment.is_variable_declared("printf"));
        assert!(module.environment.is_variable_declared("getchar"));
    }

    #[test]
    fn bind_externs_copies_sibling_globals_direction_blind() {
        let mut a = Module::new("a", PathBuf::from("a.l0"), vec![]);
        let b = Module::new("b", PathBuf::from("b.l0"), vec![]);
        a.globals
            .declare_variable_with_type("shared", crate::types::Type::Integer(crate::types::Qualifier::Constant))
            .unwrap();
        let mut modules = vec![a, b];
        bind_externs(&mut modules).unwrap();
        assert!(modules[1].externals.is_variable_declared("shared"));
        assert!(!modules[0].externals.is_variable_declared("shared"));
    }
}
