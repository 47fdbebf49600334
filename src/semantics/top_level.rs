//! Top-level analysis (§4.3): validates module shape, then pre-declares an
//! empty shell for every struct/enum so later passes (global scope building,
//! cross-module extern binding, the resolver) can reference a type by name
//! before its members are known.
//!
//! Grounded on `original_source/semantics/declare_global_types.cpp`
//! (`DeclareGlobalType`: declare then immediately define as an empty shell)
//! and `original_source/semantics/module_validator.cpp`, folded in here per
//! `SPEC_FULL.md` §4.3–4.8 rather than kept as a separate pass.

use std::rc::Rc;

use crate::ast::expression::Expression;
use crate::ast::statement::{Statement, TypeDefinition};
use crate::module::Module;
use crate::semantics::error::SemanticError;
use crate::types::{Qualifier, Type};

/// Rejects any top-level statement that isn't a `Declaration` (whose
/// initializer must itself be a `Function`, the only kind of global value
/// L0 has) or a `TypeDeclaration`.
pub fn validate_module(module: &Module) -> Result<(), SemanticError> {
    for statement in &module.statements {
        match statement {
            Statement::Declaration { name, initializer, .. } => {
                if !matches!(initializer, Expression::Function { .. }) {
                    return Err(SemanticError::InvalidModuleStatement(format!(
                        "global '{name}' must be initialized with a function"
                    )));
                }
            }
            Statement::TypeDeclaration { .. } => {}
            other => {
                return Err(SemanticError::InvalidModuleStatement(format!(
                    "'{other:?}' is not allowed at module scope"
                )));
            }
        }
    }
    Ok(())
}

/// Declares and defines an empty shell for every top-level `TypeDeclaration`
/// in `module.globals`, recording the statement's index for the global
/// scope builder to fill in afterwards.
pub fn declare_type_shells(module: &mut Module) -> Result<(), SemanticError> {
    for (index, statement) in module.statements.iter().enumerate() {
        if let Statement::TypeDeclaration { name, definition, .. } = statement {
            let local_name = name.last().to_string();
            module.globals.declare_type(&local_name)?;
            let shell = match definition {
                TypeDefinition::Struct { .. } => Type::Struct {
                    name: name.clone(),
                    members: Rc::new(Vec::new()),
                    qualifier: Qualifier::Constant,
                },
                TypeDefinition::Enum { .. } => Type::Enum {
                    name: name.clone(),
                    members: Rc::new(Vec::new()),
                    qualifier: Qualifier::Constant,
                },
            };
            module.globals.define_type(&local_name, shell)?;
            module.global_type_declarations.push(index);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expression::FunctionParam;
    use crate::ast::statement::TypeDefinition;
    use crate::ast::TypeAnnotation;
    use crate::identifier::Identifier;
    use crate::scope::Scope;
    use std::path::PathBuf;

    fn unit_annotation() -> TypeAnnotation {
        TypeAnnotation::Named {
            qualifier: None,
            name: Identifier::new("()"),
        }
    }

    fn function_expr() -> Expression {
        Expression::Function {
            parameters: Vec::<FunctionParam>::new(),
            return_type_annotation: unit_annotation(),
            return_type: None,
            body: vec![],
            locals: Scope::new(),
            captures: None,
            global_name: None,
            ty: None,
        }
    }

    #[test]
    fn rejects_bare_expression_statement_at_module_scope() {
        let statements = vec![Statement::ExpressionStatement(Expression::UnitLiteral { ty: None })];
        let module = Module::new("m", PathBuf::from("m.l0"), statements);
        assert!(validate_module(&module).is_err());
    }

    #[test]
    fn rejects_non_function_global_initializer() {
        let statements = vec![Statement::Declaration {
            name: Identifier::new("x"),
            annotation: None,
            initializer: Expression::IntegerLiteral { value: 1, ty: None },
            scope: None,
            ty: None,
        }];
        let module = Module::new("m", PathBuf::from("m.l0"), statements);
        assert!(validate_module(&module).is_err());
    }

    #[test]
    fn accepts_function_declaration_and_type_declaration() {
        let statements = vec![
            Statement::Declaration {
                name: Identifier::new("main"),
                annotation: None,
                initializer: function_expr(),
                scope: None,
                ty: None,
            },
            Statement::TypeDeclaration {
                name: Identifier::new("Point"),
                definition: TypeDefinition::Struct { members: vec![] },
                ty: None,
            },
        ];
        let module = Module::new("m", PathBuf::from("m.l0"), statements);
        assert!(validate_module(&module).is_ok());
    }

    #[test]
    fn declare_type_shells_registers_empty_struct_shape() {
        let statements = vec![Statement::TypeDeclaration {
            name: Identifier::new("Point"),
            definition: TypeDefinition::Struct { members: vec![] },
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        declare_type_shells(&mut module).unwrap();
        assert!(module.globals.is_type_declared("Point"));
        assert!(matches!(module.globals.get_type("Point").unwrap(), Type::Struct { .. }));
        assert_eq!(module.global_type_declarations, vec![0]);
    }
}
