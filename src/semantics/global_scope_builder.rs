//! Global scope builder (§4.4): fills each type shell with its members,
//! registers per-member default-initializer globals, registers enum cases as
//! globals of the enum type, and registers every top-level function as a
//! callable.
//!
//! Grounded on `original_source/semantics/global_scope_builder.cpp` /
//! `fill_types.cpp` + `declare_variables.cpp` (`FillStructDetails`,
//! `FillEnumDetails`, `DeclareGlobalVariable`).

use std::rc::Rc;

use crate::ast::expression::Expression;
use crate::ast::statement::{Statement, TypeDefinition};
use crate::ast::TypeAnnotation;
use crate::module::Module;
use crate::semantics::annotations::resolve_annotation;
use crate::semantics::error::SemanticError;
use crate::types::{Qualifier, StructMember, Type};

pub fn run(module: &mut Module) -> Result<(), SemanticError> {
    build_types(module)?;
    build_globals(module)?;
    Ok(())
}

fn build_types(module: &mut Module) -> Result<(), SemanticError> {
    let indices = module.global_type_declarations.clone();
    for index in indices {
        let statement = module.statements[index].clone();
        let Statement::TypeDeclaration { name, definition, .. } = statement else {
            continue;
        };
        match definition {
            TypeDefinition::Struct { members } => {
                let mut filled = Vec::with_capacity(members.len());
                for field in members {
                    let is_method = matches!(field.annotation, TypeAnnotation::Method { .. });
                    let ty = resolve_annotation(&[module.globals.clone()], &field.annotation)?;

                    let mut default_initializer_global_name = None;
                    if let Some(initializer) = field.initializer.clone() {
                        let data_global_name = format!("{}::{}", name.last(), field.name);
                        module.globals.declare_variable_with_type(&data_global_name, ty.clone())?;
                        default_initializer_global_name = Some(data_global_name.clone());

                        if let Expression::Function { .. } = &initializer {
                            let callable_global_name = format!("__fn__{}::{}", name.last(), field.name);
                            let mut function = initializer;
                            if let Expression::Function { global_name, .. } = &mut function {
                                *global_name = Some(callable_global_name.clone());
                            }
                            replace_struct_member_initializer(module, index, &field.name, function);
                            module.callables.push(callable_global_name);
                        }
                    }

                    filled.push(StructMember {
                        name: field.name.clone(),
                        ty,
                        is_method,
                        is_static: is_method,
                        default_initializer_global_name,
                    });
                }
                let struct_ty = Type::Struct {
                    name: name.clone(),
                    members: Rc::new(filled),
                    qualifier: Qualifier::Constant,
                };
                redefine_type(module, name.last(), struct_ty)?;
            }
            TypeDefinition::Enum { members } => {
                let enum_ty = Type::Enum {
                    name: name.clone(),
                    members: Rc::new(members.clone()),
                    qualifier: Qualifier::Constant,
                };
                redefine_type(module, name.last(), enum_ty.clone())?;
                for case in &members {
                    let case_global_name = format!("{}::{}", name.last(), case);
                    module.globals.declare_variable_with_type(&case_global_name, enum_ty.clone())?;
                }
            }
        }
    }
    Ok(())
}

fn build_globals(module: &mut Module) -> Result<(), SemanticError> {
    let count = module.statements.len();
    for index in 0..count {
        let (name, annotation, initializer) = match &module.statements[index] {
            Statement::Declaration {
                name,
                annotation,
                initializer,
                ..
            } => (name.clone(), annotation.clone(), initializer.clone()),
            _ => continue,
        };

        let ty = match &annotation {
            Some(annotation) => resolve_annotation(&[module.globals.clone()], annotation)?,
            None => function_signature_type(&[module.globals.clone()], &initializer)?,
        };

        let local_name = name.last().to_string();
        let global_name = if local_name == "main" {
            "main".to_string()
        } else {
            format!("__fn__{local_name}")
        };

        module.globals.declare_variable_with_type(&local_name, ty)?;

        let mut function = initializer;
        if let Expression::Function { global_name: slot, .. } = &mut function {
            *slot = Some(global_name.clone());
        }
        if let Statement::Declaration { initializer, .. } = &mut module.statements[index] {
            *initializer = function;
        }

        module.global_declarations.push(index);
        module.callables.push(global_name);
    }
    Ok(())
}

/// Builds the `Type::Function` shape directly from a `Function` expression's
/// own parameter/return-type annotations, used when a top-level declaration
/// has no explicit `annotation` (the `fn name(...) { ... }` sugar leaves it
/// `None`, since the function signature already says everything).
fn function_signature_type(type_scopes: &[crate::scope::Scope], initializer: &Expression) -> Result<Type, SemanticError> {
    let Expression::Function {
        parameters,
        return_type_annotation,
        ..
    } = initializer
    else {
        return Err(SemanticError::InvalidModuleStatement(
            "global declaration initializer must be a function".into(),
        ));
    };
    let mut params = Vec::with_capacity(parameters.len());
    for param in parameters {
        params.push(Rc::new(resolve_annotation(type_scopes, &param.annotation)?));
    }
    let return_type = Rc::new(resolve_annotation(type_scopes, return_type_annotation)?);
    Ok(Type::Function {
        params,
        return_type,
        qualifier: Qualifier::Constant,
    })
}

fn redefine_type(module: &mut Module, local_name: &str, ty: Type) -> Result<(), SemanticError> {
    module.globals.redefine_type(local_name, ty)?;
    Ok(())
}

fn replace_struct_member_initializer(module: &mut Module, statement_index: usize, member_name: &str, function: Expression) {
    if let Statement::TypeDeclaration {
        definition: TypeDefinition::Struct { members },
        ..
    } = &mut module.statements[statement_index]
    {
        for member in members.iter_mut() {
            if member.name == member_name {
                member.initializer = Some(function);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expression::FunctionParam;
    use crate::ast::statement::StructFieldDeclaration;
    use crate::identifier::Identifier;
    use crate::scope::Scope;
    use std::path::PathBuf;

    fn named(name: &str) -> TypeAnnotation {
        TypeAnnotation::Named {
            qualifier: None,
            name: Identifier::new(name),
        }
    }

    fn function_expr(return_type_annotation: TypeAnnotation) -> Expression {
        Expression::Function {
            parameters: Vec::<FunctionParam>::new(),
            return_type_annotation,
            return_type: None,
            body: vec![],
            locals: Scope::new(),
            captures: None,
            global_name: None,
            ty: None,
        }
    }

    #[test]
    fn registers_main_under_its_bare_name() {
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: function_expr(named("I64")),
            scope: None,
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        run(&mut module).unwrap();
        assert!(module.globals.is_variable_declared("main"));
        assert_eq!(module.callables, vec!["main".to_string()]);
    }

    #[test]
    fn registers_non_main_function_under_fn_prefix() {
        let statements = vec![Statement::Declaration {
            name: Identifier::new("helper"),
            annotation: None,
            initializer: function_expr(named("I64")),
            scope: None,
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        run(&mut module).unwrap();
        assert_eq!(module.callables, vec!["__fn__helper".to_string()]);
    }

    #[test]
    fn struct_default_initializer_becomes_callable_and_global() {
        let statements = vec![Statement::TypeDeclaration {
            name: Identifier::new("Counter"),
            definition: TypeDefinition::Struct {
                members: vec![StructFieldDeclaration {
                    name: "make".into(),
                    annotation: TypeAnnotation::Method {
                        qualifier: None,
                        params: vec![],
                        return_type: Box::new(named("I64")),
                    },
                    initializer: Some(function_expr(named("I64"))),
                }],
            },
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        crate::semantics::top_level::validate_module(&module).unwrap();
        crate::semantics::top_level::declare_type_shells(&mut module).unwrap();
        run(&mut module).unwrap();
        assert!(module.globals.is_variable_declared("Counter::make"));
        assert_eq!(module.callables, vec!["__fn__Counter::make".to_string()]);
        let ty = module.globals.get_type("Counter").unwrap();
        let Type::Struct { members, .. } = ty else { panic!("expected struct") };
        assert_eq!(members.len(), 1);
        assert!(members[0].is_method);
        assert!(members[0].is_static);
    }

    #[test]
    fn enum_cases_are_registered_as_globals_of_the_enum_type() {
        let statements = vec![Statement::TypeDeclaration {
            name: Identifier::new("Color"),
            definition: TypeDefinition::Enum {
                members: vec!["Red".into(), "Green".into()],
            },
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        crate::semantics::top_level::declare_type_shells(&mut module).unwrap();
        run(&mut module).unwrap();
        assert!(module.globals.is_variable_declared("Color::Red"));
        assert!(module.globals.is_variable_declared("Color::Green"));
    }
}
