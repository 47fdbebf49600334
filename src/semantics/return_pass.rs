//! Return-statement pass (§4.7): verifies every function body returns on
//! every path, truncates statements that follow a statement that always
//! returns, and inserts the implicit `return;` a `()`-returning function is
//! allowed to omit.
//!
//! Grounded on `original_source/semantics/return_path_checker.cpp`. The
//! original walks bottom-up computing a single `AlwaysReturns` bit per
//! statement; this pass folds that bit directly onto `ConditionalStatement`
//! (`then_block_returns`/`else_block_returns`) so the generator can reuse it
//! without recomputing control flow.

use crate::ast::expression::Expression;
use crate::ast::statement::{Block, Statement, TypeDefinition};
use crate::module::Module;
use crate::semantics::error::SemanticError;
use crate::types::{Qualifier, Type};

pub fn run(module: &mut Module) -> Result<(), SemanticError> {
    let mut statements = std::mem::take(&mut module.statements);
    let result = (|| {
        for statement in &mut statements {
            match statement {
                Statement::Declaration { initializer, .. } => process_expression(initializer)?,
                Statement::TypeDeclaration {
                    definition: TypeDefinition::Struct { members },
                    ..
                } => {
                    for member in members.iter_mut() {
                        if let Some(initializer) = &mut member.initializer {
                            process_expression(initializer)?;
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

/// Processes one function body: truncates dead code, recurses into every
/// nested lambda along the way, and either confirms every path returns or
/// (for a `()`-returning function) appends the implicit `return;`.
fn finalize_function(body: &mut Block, return_type: Option<&Type>, name: Option<&str>) -> Result<(), SemanticError> {
    let returns = process_block(body)?;
    let return_type = return_type.expect("the type checker already set every function's return_type");
    if !returns {
        if matches!(return_type, Type::Unit(_)) {
            body.push(Statement::ReturnStatement {
                value: Expression::UnitLiteral {
                    ty: Some(Type::Unit(Qualifier::Constant)),
                },
            });
        } else {
            return Err(SemanticError::MissingReturn(name.unwrap_or("<lambda>").to_string()));
        }
    }
    Ok(())
}

/// Returns whether the block always returns, having truncated any
/// statements after the first one that does.
fn process_block(block: &mut Block) -> Result<bool, SemanticError> {
    let mut cut_at = None;
    for (index, statement) in block.iter_mut().enumerate() {
        if process_statement(statement)? {
            cut_at = Some(index + 1);
            break;
        }
    }
    if let Some(len) = cut_at {
        block.truncate(len);
        Ok(true)
    } else {
        Ok(false)
    }
}

fn process_statement(statement: &mut Statement) -> Result<bool, SemanticError> {
    match statement {
        Statement::Declaration { initializer, .. } => {
            process_expression(initializer)?;
            Ok(false)
        }
        Statement::TypeDeclaration {
            definition: TypeDefinition::Struct { members },
            ..
        } => {
            for member in members.iter_mut() {
                if let Some(initializer) = &mut member.initializer {
                    process_expression(initializer)?;
                }
            }
            Ok(false)
        }
        Statement::TypeDeclaration { .. } => Ok(false),
        Statement::ExpressionStatement(expression) => {
            process_expression(expression)?;
            Ok(false)
        }
        Statement::ReturnStatement { value } => {
            process_expression(value)?;
            Ok(true)
        }
        Statement::ConditionalStatement {
            condition,
            then_block,
            else_block,
            then_block_returns,
            else_block_returns,
        } => {
            process_expression(condition)?;
            let then_returns = process_block(then_block)?;
            *then_block_returns = Some(then_returns);
            let returns = match else_block {
                Some(else_block) => {
                    let else_returns = process_block(else_block)?;
                    *else_block_returns = Some(else_returns);
                    then_returns && else_returns
                }
                None => {
                    *else_block_returns = Some(false);
                    false
                }
            };
            Ok(returns)
        }
        Statement::WhileLoop { condition, body } => {
            process_expression(condition)?;
            // A loop body may never execute, so it never guarantees the
            // enclosing function returns — but dead code inside it still
            // gets truncated.
            process_block(body)?;
            Ok(false)
        }
        Statement::Deallocation { reference } => {
            process_expression(reference)?;
            Ok(false)
        }
    }
}

fn process_expression(expression: &mut Expression) -> Result<(), SemanticError> {
    match expression {
        Expression::UnitLiteral { .. }
        | Expression::BooleanLiteral { .. }
        | Expression::IntegerLiteral { .. }
        | Expression::CharacterLiteral { .. }
        | Expression::StringLiteral { .. }
        | Expression::Variable { .. } => Ok(()),
        Expression::MemberAccessor { object, .. } => process_expression(object),
        Expression::Call { function, arguments, .. } => {
            process_expression(function)?;
            for argument in arguments {
                process_expression(argument)?;
            }
            Ok(())
        }
        Expression::UnaryOp { operand, .. } => process_expression(operand),
        Expression::BinaryOp { left, right, .. } => {
            process_expression(left)?;
            process_expression(right)
        }
        Expression::Assignment { target, value, target_address, .. } => {
            process_expression(target)?;
            process_expression(value)?;
            if let Some(address) = target_address {
                process_expression(address)?;
            }
            Ok(())
        }
        Expression::Function {
            body,
            return_type,
            global_name,
            ..
        } => finalize_function(body, return_type.as_ref(), global_name.as_deref()),
        Expression::Initializer { member_initializers, .. } => {
            for initializer in member_initializers {
                process_expression(&mut initializer.value)?;
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
                process_expression(size)?;
            }
            if let Some(member_initializers) = member_initializers {
                for initializer in member_initializers {
                    process_expression(&mut initializer.value)?;
                }
            }
            if let Some(initial_value) = initial_value {
                process_expression(initial_value)?;
            }
            Ok(())
        }
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
        module
    }

    #[test]
    fn unit_function_gets_an_implicit_return_appended() {
        let body = vec![Statement::ExpressionStatement(Expression::IntegerLiteral { value: 1, ty: None })];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: Expression::Function {
                parameters: Vec::<FunctionParam>::new(),
                return_type_annotation: named("()"),
                return_type: None,
                body,
                locals: Scope::new(),
                captures: None,
                global_name: None,
                ty: None,
            },
            scope: None,
            ty: None,
        }];
        let mut module = checked_module(statements);
        run(&mut module).unwrap();
        let Statement::Declaration { initializer, .. } = &module.statements[0] else { panic!() };
        let Expression::Function { body, .. } = initializer else { panic!() };
        assert_eq!(body.len(), 2);
        assert!(matches!(body[1], Statement::ReturnStatement { .. }));
    }

    #[test]
    fn integer_function_without_a_return_is_an_error() {
        let body = vec![Statement::ExpressionStatement(Expression::IntegerLiteral { value: 1, ty: None })];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: Expression::Function {
                parameters: Vec::<FunctionParam>::new(),
                return_type_annotation: named("I64"),
                return_type: None,
                body,
                locals: Scope::new(),
                captures: None,
                global_name: None,
                ty: None,
            },
            scope: None,
            ty: None,
        }];
        let mut module = checked_module(statements);
        assert!(run(&mut module).is_err());
    }

    #[test]
    fn statements_after_an_unconditional_return_are_truncated() {
        let body = vec![
            Statement::ReturnStatement {
                value: Expression::IntegerLiteral { value: 1, ty: None },
            },
            Statement::ExpressionStatement(Expression::IntegerLiteral { value: 2, ty: None }),
        ];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: Expression::Function {
                parameters: Vec::<FunctionParam>::new(),
                return_type_annotation: named("I64"),
                return_type: None,
                body,
                locals: Scope::new(),
                captures: None,
                global_name: None,
                ty: None,
            },
            scope: None,
            ty: None,
        }];
        let mut module = checked_module(statements);
        run(&mut module).unwrap();
        let Statement::Declaration { initializer, .. } = &module.statements[0] else { panic!() };
        let Expression::Function { body, .. } = initializer else { panic!() };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn conditional_with_returning_branches_satisfies_the_function_return() {
        let body = vec![Statement::ConditionalStatement {
            condition: Expression::BooleanLiteral { value: true, ty: None },
            then_block: vec![Statement::ReturnStatement {
                value: Expression::IntegerLiteral { value: 1, ty: None },
            }],
            else_block: Some(vec![Statement::ReturnStatement {
                value: Expression::IntegerLiteral { value: 2, ty: None },
            }]),
            then_block_returns: None,
            else_block_returns: None,
        }];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("main"),
            annotation: None,
            initializer: Expression::Function {
                parameters: Vec::<FunctionParam>::new(),
                return_type_annotation: named("I64"),
                return_type: None,
                body,
                locals: Scope::new(),
                captures: None,
                global_name: None,
                ty: None,
            },
            scope: None,
            ty: None,
        }];
        let mut module = checked_module(statements);
        run(&mut module).unwrap();
    }
}
