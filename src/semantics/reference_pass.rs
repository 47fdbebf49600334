//! Reference pass (§4.8): asserts the lvalue rule for `=` and `&`, and
//! synthesizes `Assignment::target_address` — the address the generator
//! stores through, computed once here so codegen never has to re-derive it.
//!
//! Grounded on `original_source/semantics/reference_resolver.cpp`. The type
//! checker (§4.6) already resolves `&x`'s overload and type blindly; this
//! pass is the separate lvalue-ness check the original keeps as its own
//! walk, matching `Expression::is_lvalue` defined in `crate::ast::expression`.

use std::rc::Rc;

use crate::ast::expression::{Expression, UnaryOperator, UnaryOverload};
use crate::ast::statement::{Block, Statement, TypeDefinition};
use crate::module::Module;
use crate::semantics::error::SemanticError;
use crate::types::{Qualifier, Type};

pub fn run(module: &mut Module) -> Result<(), SemanticError> {
    let mut statements = std::mem::take(&mut module.statements);
    let result = (|| {
        for statement in &mut statements {
            match statement {
                Statement::Declaration { initializer, .. } => walk_expression(initializer)?,
                Statement::TypeDeclaration {
                    definition: TypeDefinition::Struct { members },
                    ..
                } => {
                    for member in members.iter_mut() {
                        if let Some(initializer) = &mut member.initializer {
                            walk_expression(initializer)?;
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

fn walk_block(block: &mut Block) -> Result<(), SemanticError> {
    for statement in block.iter_mut() {
        walk_statement(statement)?;
    }
    Ok(())
}

fn walk_statement(statement: &mut Statement) -> Result<(), SemanticError> {
    match statement {
        Statement::Declaration { initializer, .. } => walk_expression(initializer),
        Statement::TypeDeclaration {
            definition: TypeDefinition::Struct { members },
            ..
        } => {
            for member in members.iter_mut() {
                if let Some(initializer) = &mut member.initializer {
                    walk_expression(initializer)?;
                }
            }
            Ok(())
        }
        Statement::TypeDeclaration { .. } => Ok(()),
        Statement::ExpressionStatement(expression) => walk_expression(expression),
        Statement::ReturnStatement { value } => walk_expression(value),
        Statement::ConditionalStatement {
            condition,
            then_block,
            else_block,
            ..
        } => {
            walk_expression(condition)?;
            walk_block(then_block)?;
            if let Some(else_block) = else_block {
                walk_block(else_block)?;
            }
            Ok(())
        }
        Statement::WhileLoop { condition, body } => {
            walk_expression(condition)?;
            walk_block(body)
        }
        Statement::Deallocation { reference } => walk_expression(reference),
    }
}

fn walk_expression(expression: &mut Expression) -> Result<(), SemanticError> {
    match expression {
        Expression::UnitLiteral { .. }
        | Expression::BooleanLiteral { .. }
        | Expression::IntegerLiteral { .. }
        | Expression::CharacterLiteral { .. }
        | Expression::StringLiteral { .. }
        | Expression::Variable { .. } => Ok(()),
        Expression::MemberAccessor { object, .. } => walk_expression(object),
        Expression::Call { function, arguments, .. } => {
            walk_expression(function)?;
            for argument in arguments {
                walk_expression(argument)?;
            }
            Ok(())
        }
        Expression::UnaryOp { op, operand, .. } => {
            walk_expression(operand)?;
            if *op == UnaryOperator::Ampersand && !operand.is_lvalue() {
                return Err(SemanticError::NonLvalueTarget(format!(
                    "cannot take the address of a non-lvalue: {operand:?}"
                )));
            }
            Ok(())
        }
        Expression::BinaryOp { left, right, .. } => {
            walk_expression(left)?;
            walk_expression(right)
        }
        Expression::Assignment { target, value, target_address, .. } => {
            walk_expression(target)?;
            walk_expression(value)?;
            if !target.is_lvalue() {
                return Err(SemanticError::NonLvalueTarget(format!("assignment target is not an lvalue: {target:?}")));
            }
            *target_address = Some(Box::new(synthesize_address(target)));
            Ok(())
        }
        Expression::Function { body, .. } => walk_block(body),
        Expression::Initializer { member_initializers, .. } => {
            for initializer in member_initializers {
                walk_expression(&mut initializer.value)?;
            }
            Ok(())
        }
        Expression::Allocation {
            size,
            member_initializers,
            initial_value,
            ..
        } => {
            if let Some(size) = size {
                walk_expression(size)?;
            }
            if let Some(member_initializers) = member_initializers {
                for initializer in member_initializers {
                    walk_expression(&mut initializer.value)?;
                }
            }
            if let Some(initial_value) = initial_value {
                walk_expression(initial_value)?;
            }
            Ok(())
        }
    }
}

/// The address an assignment stores through. A dereference's address is
/// just its own operand (already a reference); any other lvalue gets wrapped
/// in a fresh `&` node, reusing the address-of overload the type checker
/// already established for explicit `&` expressions.
fn synthesize_address(target: &Expression) -> Expression {
    if let Expression::UnaryOp {
        op: UnaryOperator::Caret,
        operand,
        ..
    } = target
    {
        return (**operand).clone();
    }
    let reference_ty = target.ty().map(|ty| Type::Reference(Rc::new(ty.clone()), Qualifier::Constant));
    Expression::UnaryOp {
        op: UnaryOperator::Ampersand,
        operand: Box::new(target.clone()),
        overload: Some(UnaryOverload::AddressOf),
        ty: reference_ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expression::FunctionParam;
    use crate::ast::TypeAnnotation;
    use crate::identifier::Identifier;
    use crate::scope::Scope;
    use std::path::PathBuf;

    fn named(name: &str) -> TypeAnnotation {
        TypeAnnotation::Named {
            qualifier: None,
            name: Identifier::new(name),
        }
    }

    fn checked_module(statements: Vec<Statement>) -> Module {
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        crate::semantics::top_level::validate_module(&module).unwrap();
        crate::semantics::top_level::declare_type_shells(&mut module).unwrap();
        crate::semantics::global_scope_builder::run(&mut module).unwrap();
        crate::semantics::resolver::run(&mut module).unwrap();
        crate::semantics::type_checker::run(&mut module).unwrap();
        crate::semantics::return_pass::run(&mut module).unwrap();
        module
    }

    fn function_with_body(body: Block) -> Expression {
        Expression::Function {
            parameters: Vec::<FunctionParam>::new(),
            return_type_annotation: named("()"),
            return_type: None,
            body,
            locals: Scope::new(),
            captures: None,
            global_name: None,
            ty: None,
        }
    }

    #[test]
    fn assignment_to_a_mutable_local_gets_a_synthesized_address() {
        let body = vec![
            Statement::Declaration {
                name: Identifier::new("x"),
                annotation: Some(TypeAnnotation::Named {
                    qualifier: Some(Qualifier::Mutable),
                    name: Identifier::new("I64"),
                }),
                initializer: Expression::IntegerLiteral { value: 1, ty: None },
                scope: None,
                ty: None,
            },
            Statement::ExpressionStatement(Expression::Assignment {
                target: Box::new(Expression::Variable {
                    name: Identifier::new("x"),
                    scope: None,
                    ty: None,
                }),
                value: Box::new(Expression::IntegerLiteral { value: 2, ty: None }),
                target_address: None,
                ty: None,
            }),
        ];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: function_with_body(body),
            scope: None,
            ty: None,
        }];
        let mut module = checked_module(statements);
        run(&mut module).unwrap();
        let Statement::Declaration { initializer, .. } = &module.statements[0] else { panic!() };
        let Expression::Function { body, .. } = initializer else { panic!() };
        let Statement::ExpressionStatement(Expression::Assignment { target_address, .. }) = &body[1] else {
            panic!()
        };
        assert!(target_address.is_some());
    }

    #[test]
    fn assignment_to_a_non_lvalue_is_rejected() {
        let body = vec![Statement::ExpressionStatement(Expression::Assignment {
            target: Box::new(Expression::IntegerLiteral { value: 1, ty: None }),
            value: Box::new(Expression::IntegerLiteral { value: 2, ty: None }),
            target_address: None,
            ty: None,
        })];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: function_with_body(body),
            scope: None,
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        crate::semantics::top_level::validate_module(&module).unwrap();
        crate::semantics::top_level::declare_type_shells(&mut module).unwrap();
        crate::semantics::global_scope_builder::run(&mut module).unwrap();
        crate::semantics::resolver::run(&mut module).unwrap();
        // Assignment to an integer literal can never type-check (not
        // Mutable), so this case is caught earlier — confirm the reference
        // pass still rejects it defensively if it were ever reached directly.
        assert!(walk_expression(&mut Expression::Assignment {
            target: Box::new(Expression::IntegerLiteral { value: 1, ty: None }),
            value: Box::new(Expression::IntegerLiteral { value: 2, ty: None }),
            target_address: None,
            ty: None,
        })
        .is_err());
    }
}
