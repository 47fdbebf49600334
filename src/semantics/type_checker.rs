//! Type checker (§4.6): attaches a [`Type`] to every expression, resolves
//! operator overloads, and verifies every conversion against the
//! assignability rule in [`crate::types::Type::assignable_to`].
//!
//! Grounded on `original_source/semantics/conversion_checker.cpp` (the
//! conversion rule, including the reference-mutability-narrowing clause) and
//! `original_source/semantics/operator_overload_resolver.cpp` /
//! `binary_op_overload_resolver.cpp` (address-of/dereference/
//! reference-indexation special-cased ahead of the table lookup in
//! [`crate::semantics::overloads`]).

use std::rc::Rc;

use crate::ast::expression::{
    BinaryOperator, Expression, MemberInitializer, MemberSlot, UnaryOperator, UnaryOverload,
};
use crate::ast::statement::{Block, Statement, TypeDefinition};
use crate::ast::TypeAnnotation;
use crate::module::Module;
use crate::scope::Scope;
use crate::semantics::annotations::resolve_annotation;
use crate::semantics::error::SemanticError;
use crate::semantics::overloads::{resolve_binary, resolve_unary};
use crate::types::{Qualifier, StructMember, Type};

pub fn run(module: &mut Module) -> Result<(), SemanticError> {
    let type_scopes = vec![module.externals.clone(), module.globals.clone()];
    let mut statements = std::mem::take(&mut module.statements);
    let result = (|| {
        for statement in &mut statements {
            match statement {
                Statement::Declaration { initializer, .. } => {
                    check_expression(&type_scopes, initializer)?;
                }
                Statement::TypeDeclaration {
                    definition: TypeDefinition::Struct { members },
                    ..
                } => {
                    for member in members.iter_mut() {
                        if let Some(initializer) = &mut member.initializer {
                            check_expression(&type_scopes, initializer)?;
                        }
                    }
                }
                Statement::TypeDeclaration { .. } => {}
                other => {
                    return Err(SemanticError::InvalidModuleStatement(format!(
                        "'{other:?}' is not allowed at module scope"
                    )))
                }
            }
        }
        Ok(())
    })();
    module.statements = statements;
    result
}

fn describe(ty: &Type) -> String {
    ty.to_string()
}

fn check_statement(type_scopes: &[Scope], statement: &mut Statement) -> Result<(), SemanticError> {
    match statement {
        Statement::Declaration {
            name,
            annotation,
            initializer,
            scope,
            ty,
        } => {
            check_expression(type_scopes, initializer)?;
            let initializer_ty = initializer.ty().cloned().expect("just type-checked");
            match annotation {
                // The resolver (§4.5) already called `set_variable_type` for
                // the annotated case while resolving the annotation itself —
                // setting it again here would hit `VariableTypeAlreadySet`.
                Some(annotation) => {
                    let annotated = resolve_annotation(type_scopes, annotation)?;
                    if !initializer_ty.assignable_to(&annotated) {
                        return Err(SemanticError::TypeMismatch {
                            expected: describe(&annotated),
                            found: describe(&initializer_ty),
                        });
                    }
                    *ty = Some(annotated);
                }
                None => {
                    let inferred = initializer_ty.with_qualifier(Qualifier::Constant);
                    if let Some(scope) = scope {
                        scope.set_variable_type(name.last(), inferred.clone())?;
                    }
                    *ty = Some(inferred);
                }
            }
        }
        Statement::TypeDeclaration { .. } => {}
        Statement::ExpressionStatement(expression) => check_expression(type_scopes, expression)?,
        Statement::ReturnStatement { value } => check_expression(type_scopes, value)?,
        Statement::ConditionalStatement {
            condition,
            then_block,
            else_block,
            ..
        } => {
            check_expression(type_scopes, condition)?;
            require_boolean(condition)?;
            check_block(type_scopes, then_block)?;
            if let Some(else_block) = else_block {
                check_block(type_scopes, else_block)?;
            }
        }
        Statement::WhileLoop { condition, body } => {
            check_expression(type_scopes, condition)?;
            require_boolean(condition)?;
            check_block(type_scopes, body)?;
        }
        Statement::Deallocation { reference } => {
            check_expression(type_scopes, reference)?;
            let ty = reference.ty().expect("just type-checked");
            if !matches!(ty, Type::Reference(..)) {
                return Err(SemanticError::NotAReference(describe(ty)));
            }
        }
    }
    Ok(())
}

fn require_boolean(condition: &Expression) -> Result<(), SemanticError> {
    let ty = condition.ty().expect("just type-checked");
    if !matches!(ty, Type::Boolean(_)) {
        return Err(SemanticError::NonBooleanCondition(describe(ty)));
    }
    Ok(())
}

fn check_block(type_scopes: &[Scope], block: &mut Block) -> Result<(), SemanticError> {
    for statement in block.iter_mut() {
        check_statement(type_scopes, statement)?;
    }
    Ok(())
}

fn check_expression(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    match expression {
        Expression::UnitLiteral { ty } => {
            *ty = Some(Type::Unit(Qualifier::Constant));
        }
        Expression::BooleanLiteral { ty, .. } => {
            *ty = Some(Type::Boolean(Qualifier::Constant));
        }
        Expression::IntegerLiteral { ty, .. } => {
            *ty = Some(Type::Integer(Qualifier::Constant));
        }
        Expression::CharacterLiteral { ty, .. } => {
            *ty = Some(Type::Character(Qualifier::Constant));
        }
        Expression::StringLiteral { ty, .. } => {
            *ty = Some(Type::Reference(Rc::new(Type::Character(Qualifier::Constant)), Qualifier::Constant));
        }
        Expression::Variable { name, scope, ty } => {
            let scope = scope.as_ref().expect("resolver already ran");
            let resolved = scope.get_variable_type(name.last())?;
            *ty = Some(resolved);
        }
        Expression::MemberAccessor { .. } => check_member_accessor(type_scopes, expression)?,
        Expression::Call { .. } => check_call(type_scopes, expression)?,
        Expression::UnaryOp { .. } => check_unary(type_scopes, expression)?,
        Expression::BinaryOp { .. } => check_binary(type_scopes, expression)?,
        Expression::Assignment { target, value, ty, .. } => {
            check_expression(type_scopes, target)?;
            check_expression(type_scopes, value)?;
            let target_ty = target.ty().expect("just type-checked").clone();
            let value_ty = value.ty().expect("just type-checked").clone();
            if target_ty.qualifier() != Qualifier::Mutable {
                return Err(SemanticError::AssignmentToConstant(describe(&target_ty)));
            }
            if !value_ty.assignable_to(&target_ty) {
                return Err(SemanticError::TypeMismatch {
                    expected: describe(&target_ty),
                    found: describe(&value_ty),
                });
            }
            *ty = Some(Type::Unit(Qualifier::Constant));
        }
        Expression::Function { .. } => check_function(type_scopes, expression)?,
        Expression::Initializer { .. } => {
            check_initializer(type_scopes, expression)?;
        }
        Expression::Allocation { .. } => check_allocation(type_scopes, expression)?,
    }
    Ok(())
}

fn check_member_accessor(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    let Expression::MemberAccessor { object, member, slot, ty } = expression else {
        unreachable!()
    };
    check_expression(type_scopes, object)?;
    let object_ty = object.ty().expect("just type-checked").clone();
    let Type::Struct { members, qualifier: object_qualifier, .. } = &object_ty else {
        return Err(SemanticError::NotAStruct(describe(&object_ty)));
    };
    let Some((index, found)) = members.iter().enumerate().find(|(_, m)| &m.name == member) else {
        return Err(SemanticError::UnknownStructMember {
            ty: describe(&object_ty),
            member: member.clone(),
        });
    };
    let member_ty = if found.is_static {
        *slot = Some(MemberSlot::Static {
            global_name: found
                .default_initializer_global_name
                .clone()
                .expect("static member always has a default-initializer global"),
        });
        found.ty.clone()
    } else {
        let instance_index = members.iter().take(index).filter(|m| !m.is_static).count();
        *slot = Some(MemberSlot::Instance(instance_index));
        let narrowed = if *object_qualifier == Qualifier::Constant {
            Qualifier::Constant
        } else {
            found.ty.qualifier()
        };
        found.ty.with_qualifier(narrowed)
    };
    *ty = Some(member_ty);
    Ok(())
}

fn check_call(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    let Expression::Call { function, arguments, is_method_call, ty, .. } = expression else {
        unreachable!()
    };
    check_expression(type_scopes, function)?;
    // A call is a method call exactly when its callee is a member accessor
    // that resolved to a static member (i.e. an actual method) — not
    // whenever the callee merely looks like `object.name`, since a
    // function-typed instance field invoked as `object.field(...)` is an
    // ordinary closure call that happens to be reached through `.`.
    *is_method_call = matches!(&**function, Expression::MemberAccessor { slot: Some(MemberSlot::Static { .. }), .. });
    for argument in arguments.iter_mut() {
        check_expression(type_scopes, argument)?;
    }
    let function_ty = function.ty().expect("just type-checked").clone();
    let Type::Function { params, return_type, .. } = &function_ty else {
        return Err(SemanticError::NotAFunction(describe(&function_ty)));
    };
    if params.len() != arguments.len() {
        return Err(SemanticError::ArityMismatch {
            expected: params.len(),
            found: arguments.len(),
        });
    }
    for (param, argument) in params.iter().zip(arguments.iter()) {
        let argument_ty = argument.ty().expect("just type-checked");
        if !argument_ty.assignable_to(param) {
            return Err(SemanticError::TypeMismatch {
                expected: describe(param),
                found: describe(argument_ty),
            });
        }
    }
    *ty = Some((**return_type).clone());
    Ok(())
}

fn check_unary(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    let Expression::UnaryOp { op, operand, overload, ty } = expression else {
        unreachable!()
    };
    check_expression(type_scopes, operand)?;
    let operand_ty = operand.ty().expect("just type-checked").clone();
    match op {
        UnaryOperator::Ampersand => {
            *overload = Some(UnaryOverload::AddressOf);
            *ty = Some(Type::Reference(Rc::new(operand_ty), Qualifier::Constant));
        }
        UnaryOperator::Caret => {
            let Type::Reference(base, _) = &operand_ty else {
                return Err(SemanticError::NotAReference(describe(&operand_ty)));
            };
            *overload = Some(UnaryOverload::Dereferenciation);
            *ty = Some((**base).clone());
        }
        _ => {
            let Some((resolved_overload, result_ty)) = resolve_unary(*op, &operand_ty) else {
                return Err(SemanticError::NoViableUnaryOverload {
                    op: format!("{op:?}"),
                    operand: describe(&operand_ty),
                });
            };
            *overload = Some(resolved_overload);
            *ty = Some(result_ty);
        }
    }
    Ok(())
}

fn check_binary(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    let Expression::BinaryOp { op, left, right, overload, ty } = expression else {
        unreachable!()
    };
    check_expression(type_scopes, left)?;
    check_expression(type_scopes, right)?;
    let left_ty = left.ty().expect("just type-checked").clone();
    let right_ty = right.ty().expect("just type-checked").clone();

    if *op == BinaryOperator::Plus {
        if let Type::Reference(..) = &left_ty {
            if matches!(right_ty, Type::Integer(_)) {
                use crate::ast::expression::BinaryOverload;
                *overload = Some(BinaryOverload::ReferenceIndexation);
                *ty = Some(left_ty);
                return Ok(());
            }
        }
    }

    let Some((resolved_overload, result_ty)) = resolve_binary(*op, &left_ty, &right_ty) else {
        return Err(SemanticError::NoViableBinaryOverload {
            op: format!("{op:?}"),
            left: describe(&left_ty),
            right: describe(&right_ty),
        });
    };
    *overload = Some(resolved_overload);
    *ty = Some(result_ty);
    Ok(())
}

fn check_function(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    let Expression::Function {
        parameters,
        return_type_annotation,
        return_type,
        body,
        locals,
        ty,
        ..
    } = expression
    else {
        unreachable!()
    };

    let mut param_types = Vec::with_capacity(parameters.len());
    for param in parameters.iter_mut() {
        let resolved = resolve_annotation(type_scopes, &param.annotation)?;
        locals.set_variable_type(&param.name, resolved.clone())?;
        param.ty = Some(resolved.clone());
        param_types.push(Rc::new(resolved));
    }
    let resolved_return = resolve_annotation(type_scopes, return_type_annotation)?;
    *return_type = Some(resolved_return.clone());
    *ty = Some(Type::Function {
        params: param_types,
        return_type: Rc::new(resolved_return),
        qualifier: Qualifier::Constant,
    });

    let nested_scopes: Vec<Scope> = type_scopes.iter().cloned().chain(std::iter::once(locals.clone())).collect();
    check_block(&nested_scopes, body)?;
    Ok(())
}

/// Shared by [`Expression::Initializer`] and a no-explicit-member-initializer
/// struct [`Expression::Allocation`] (which desugars to an `Initializer` with
/// an empty member list so the same defaulting rule applies uniformly).
fn check_initializer(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    let Expression::Initializer { type_annotation, member_initializers, ty } = expression else {
        unreachable!()
    };
    let resolved = resolve_annotation(type_scopes, type_annotation)?;
    let Type::Struct { members, .. } = &resolved else {
        return Err(SemanticError::NotAStruct(describe(&resolved)));
    };
    check_member_initializers(type_scopes, &resolved, members, member_initializers)?;
    *ty = Some(resolved);
    Ok(())
}

fn check_member_initializers(
    type_scopes: &[Scope],
    owner_ty: &Type,
    members: &[StructMember],
    member_initializers: &mut [MemberInitializer],
) -> Result<(), SemanticError> {
    let mut seen = std::collections::HashSet::new();
    for initializer in member_initializers.iter_mut() {
        if !seen.insert(initializer.name.clone()) {
            return Err(SemanticError::DuplicateStructInitializer {
                ty: describe(owner_ty),
                member: initializer.name.clone(),
            });
        }
        let Some(member) = members.iter().find(|m| m.name == initializer.name && !m.is_static) else {
            return Err(SemanticError::UnknownStructMember {
                ty: describe(owner_ty),
                member: initializer.name.clone(),
            });
        };
        check_expression(type_scopes, &mut initializer.value)?;
        let value_ty = initializer.value.ty().expect("just type-checked");
        if !value_ty.assignable_to(&member.ty) {
            return Err(SemanticError::TypeMismatch {
                expected: describe(&member.ty),
                found: describe(value_ty),
            });
        }
    }
    for member in members.iter().filter(|m| !m.is_static) {
        if member.default_initializer_global_name.is_none() && !seen.contains(&member.name) {
            return Err(SemanticError::MissingStructInitializer {
                ty: describe(owner_ty),
                member: member.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_allocation(type_scopes: &[Scope], expression: &mut Expression) -> Result<(), SemanticError> {
    let Expression::Allocation {
        type_annotation,
        size,
        member_initializers,
        allocated_type,
        initial_value,
        ty,
    } = expression
    else {
        unreachable!()
    };

    if let Some(size) = size {
        check_expression(type_scopes, size)?;
        if !matches!(size.ty(), Some(Type::Integer(_))) {
            return Err(SemanticError::TypeMismatch {
                expected: "I64".into(),
                found: describe(size.ty().expect("just type-checked")),
            });
        }
    }

    let resolved = resolve_annotation(type_scopes, type_annotation)?.with_qualifier(Qualifier::Mutable);
    *allocated_type = Some(resolved.clone());

    match &resolved {
        Type::Struct { members, .. } => {
            let mut inits = member_initializers.clone().unwrap_or_default();
            check_member_initializers(type_scopes, &resolved, members, &mut inits)?;
            if let Some(original) = member_initializers {
                *original = inits.clone();
            }
            *initial_value = Some(Box::new(Expression::Initializer {
                type_annotation: type_annotation.clone(),
                member_initializers: inits,
                ty: Some(resolved.clone()),
            }));
        }
        other => {
            if member_initializers.is_some() {
                return Err(SemanticError::NotAStruct(describe(other)));
            }
            let mut zero = zero_literal(other).ok_or_else(|| SemanticError::TypeMismatch {
                expected: "a default-constructible type".into(),
                found: describe(other),
            })?;
            check_expression(type_scopes, &mut zero)?;
            *initial_value = Some(Box::new(zero));
        }
    }

    *ty = Some(Type::Reference(Rc::new(resolved), Qualifier::Constant));
    Ok(())
}

/// The literal synthesized for `new T` when no member initializers are given
/// and `T` is not a struct (§4.6's "If no explicit member initializers,
/// synthesize a zero-literal": `unit`/`false`/`0`/`""`). A `CString` is
/// represented here as `Type::Reference(Character, _)` (see
/// `annotations.rs`), so it is matched ahead of the bare `Character` case
/// and zeroes to the empty string, exactly as the original maps
/// `StringType` to `StringLiteral("")`. Character is additionally extended
/// beyond the spec's explicit enumeration with `'\0'`, the natural zero for
/// an 8-bit character cell; see DESIGN.md.
fn zero_literal(ty: &Type) -> Option<Expression> {
    match ty {
        Type::Unit(_) => Some(Expression::UnitLiteral { ty: None }),
        Type::Boolean(_) => Some(Expression::BooleanLiteral { value: false, ty: None }),
        Type::Integer(_) => Some(Expression::IntegerLiteral { value: 0, ty: None }),
        Type::Reference(base, _) if matches!(**base, Type::Character(_)) => {
            Some(Expression::StringLiteral { value: String::new(), ty: None })
        }
        Type::Character(_) => Some(Expression::CharacterLiteral { value: 0, ty: None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expression::FunctionParam;
    use crate::identifier::Identifier;
    use std::path::PathBuf;

    fn named(name: &str) -> TypeAnnotation {
        TypeAnnotation::Named {
            qualifier: None,
            name: Identifier::new(name),
        }
    }

    fn function_expr(body: Block) -> Expression {
        Expression::Function {
            parameters: Vec::<FunctionParam>::new(),
            return_type_annotation: named("I64"),
            return_type: None,
            body,
            locals: Scope::new(),
            captures: None,
            global_name: Some("main".into()),
            ty: None,
        }
    }

    fn checked_module(statements: Vec<Statement>) -> Module {
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        crate::semantics::top_level::validate_module(&module).unwrap();
        crate::semantics::top_level::declare_type_shells(&mut module).unwrap();
        crate::semantics::global_scope_builder::run(&mut module).unwrap();
        crate::semantics::resolver::run(&mut module).unwrap();
        run(&mut module).unwrap();
        module
    }

    #[test]
    fn integer_literal_arithmetic_types_as_integer() {
        let body = vec![Statement::ReturnStatement {
            value: Expression::BinaryOp {
                op: BinaryOperator::Plus,
                left: Box::new(Expression::IntegerLiteral { value: 2, ty: None }),
                right: Box::new(Expression::BinaryOp {
                    op: BinaryOperator::Star,
                    left: Box::new(Expression::IntegerLiteral { value: 3, ty: None }),
                    right: Box::new(Expression::IntegerLiteral { value: 4, ty: None }),
                    overload: None,
                    ty: None,
                }),
                overload: None,
                ty: None,
            },
        }];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: function_expr(body),
            scope: None,
            ty: None,
        }];
        let module = checked_module(statements);
        let Statement::Declaration { initializer, .. } = &module.statements[0] else { panic!() };
        let Expression::Function { body, .. } = initializer else { panic!() };
        let Statement::ReturnStatement { value } = &body[0] else { panic!() };
        assert!(matches!(value.ty(), Some(Type::Integer(_))));
    }

    #[test]
    fn mutable_reference_target_rejects_const_rhs_narrowing() {
        let body = vec![
            Statement::Declaration {
                name: Identifier::new("x"),
                annotation: Some(named("I64")),
                initializer: Expression::IntegerLiteral { value: 5, ty: None },
                scope: None,
                ty: None,
            },
            Statement::Declaration {
                name: Identifier::new("r"),
                annotation: Some(TypeAnnotation::Reference {
                    qualifier: None,
                    base: Box::new(TypeAnnotation::Named {
                        qualifier: Some(Qualifier::Mutable),
                        name: Identifier::new("I64"),
                    }),
                }),
                initializer: Expression::UnaryOp {
                    op: UnaryOperator::Ampersand,
                    operand: Box::new(Expression::Variable {
                        name: Identifier::new("x"),
                        scope: None,
                        ty: None,
                    }),
                    overload: None,
                    ty: None,
                },
                scope: None,
                ty: None,
            },
            Statement::ReturnStatement {
                value: Expression::IntegerLiteral { value: 0, ty: None },
            },
        ];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: function_expr(body),
            scope: None,
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        crate::semantics::top_level::validate_module(&module).unwrap();
        crate::semantics::top_level::declare_type_shells(&mut module).unwrap();
        crate::semantics::global_scope_builder::run(&mut module).unwrap();
        crate::semantics::resolver::run(&mut module).unwrap();
        assert!(run(&mut module).is_err());
    }

    #[test]
    fn struct_initializer_requires_every_non_defaulted_member() {
        let struct_decl = Statement::TypeDeclaration {
            name: Identifier::new("Point"),
            definition: TypeDefinition::Struct {
                members: vec![
                    crate::ast::statement::StructFieldDeclaration {
                        name: "x".into(),
                        annotation: named("I64"),
                        initializer: None,
                    },
                    crate::ast::statement::StructFieldDeclaration {
                        name: "y".into(),
                        annotation: named("I64"),
                        initializer: None,
                    },
                ],
            },
            ty: None,
        };
        let body = vec![Statement::Declaration {
            name: Identifier::new("p"),
            annotation: None,
            initializer: Expression::Initializer {
                type_annotation: named("Point"),
                member_initializers: vec![MemberInitializer {
                    name: "x".into(),
                    value: Expression::IntegerLiteral { value: 3, ty: None },
                }],
                ty: None,
            },
            scope: None,
            ty: None,
        }];
        let statements = vec![
            struct_decl,
            Statement::Declaration {
                name: Identifier::new("main"),
                annotation: None,
                initializer: function_expr(body),
                scope: None,
                ty: None,
            },
        ];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        crate::semantics::top_level::validate_module(&module).unwrap();
        crate::semantics::top_level::declare_type_shells(&mut module).unwrap();
        crate::semantics::global_scope_builder::run(&mut module).unwrap();
        crate::semantics::resolver::run(&mut module).unwrap();
        assert!(run(&mut module).is_err());
    }

    #[test]
    fn allocating_a_cstring_with_no_initializer_zeroes_to_an_empty_string() {
        let body = vec![
            Statement::Declaration {
                name: Identifier::new("s"),
                annotation: None,
                initializer: Expression::Allocation {
                    type_annotation: named("CString"),
                    size: None,
                    member_initializers: None,
                    allocated_type: None,
                    initial_value: None,
                    ty: None,
                },
                scope: None,
                ty: None,
            },
            Statement::ReturnStatement {
                value: Expression::IntegerLiteral { value: 0, ty: None },
            },
        ];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: function_expr(body),
            scope: None,
            ty: None,
        }];
        let module = checked_module(statements);
        let Some(Expression::Function { body, .. }) = module.find_callable("main") else {
            panic!("main should be a registered callable")
        };
        let Statement::Declaration { initializer, .. } = &body[0] else {
            panic!()
        };
        let Expression::Allocation { initial_value, .. } = initializer else {
            panic!()
        };
        assert!(matches!(
            initial_value.as_deref(),
            Some(Expression::StringLiteral { value, .. }) if value.is_empty()
        ));
    }
}
