//! Resolver (§4.5): attaches a scope to every `Declaration` and `Variable`,
//! pushing a fresh scope per `Function` (locals) and per `Conditional`/`While`
//! block, and computes each `Function`'s capture set.
//!
//! Grounded on `original_source/semantics/resolver.cpp`. The original
//! computes captures inline during its single AST walk (`Visit(Function&)`);
//! here the capture set is a genuine pass output recorded on the node
//! (`Expression::Function::captures`), resolved directly against whichever
//! enclosing function's locals the variable's scope turns out to be — a
//! "flat" capture model. A variable used inside a doubly-nested lambda is
//! captured straight onto that lambda, never relayed through the
//! intermediate function, because the lambda's stack frame is always alive
//! (on the native call stack) whenever the lambda itself runs, for as long
//! as every enclosing frame is also live — which is guaranteed, since L0 has
//! no way to return a lambda out of the frame that captured it without also
//! keeping that frame's captured locals heap-allocated via its own capture
//! context. No relay bookkeeping is needed to make a deeper capture visible.

use std::collections::HashSet;

use crate::ast::expression::{Expression, FunctionParam, MemberInitializer};
use crate::ast::statement::{Block, Statement, TypeDefinition};
use crate::identifier::Identifier;
use crate::module::Module;
use crate::scope::{resolve, Scope};
use crate::semantics::annotations::resolve_annotation;
use crate::semantics::error::SemanticError;

/// Number of base (non-function-local) scopes at the bottom of every stack:
/// `environment`, `externals`, `globals`.
const BASE_SCOPE_COUNT: usize = 3;

struct FunctionFrame {
    /// `scope_stack.len()` just before this function's locals scope was
    /// pushed. Any resolved index `< boundary` (and `>= BASE_SCOPE_COUNT`)
    /// belongs to an enclosing function and is therefore a capture.
    boundary: usize,
    captures: Vec<Identifier>,
    seen: HashSet<String>,
}

struct Resolver<'m> {
    module: &'m Module,
    scope_stack: Vec<Scope>,
    functions: Vec<FunctionFrame>,
}

pub fn run(module: &mut Module) -> Result<(), SemanticError> {
    let base_stack = vec![module.environment.clone(), module.externals.clone(), module.globals.clone()];
    let mut statements = std::mem::take(&mut module.statements);
    {
        let mut resolver = Resolver {
            module,
            scope_stack: base_stack,
            functions: Vec::new(),
        };
        // Top-level `Declaration`/`TypeDeclaration` names are already
        // registered in `globals` by the global scope builder (§4.4) — only
        // their nested `Function` bodies need resolving here, not the
        // declarations themselves.
        for statement in &mut statements {
            match statement {
                Statement::Declaration { initializer, .. } => {
                    resolver.expression(initializer)?;
                }
                Statement::TypeDeclaration {
                    definition: TypeDefinition::Struct { members },
                    ..
                } => {
                    for member in members.iter_mut() {
                        if let Some(initializer) = &mut member.initializer {
                            resolver.expression(initializer)?;
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
    }
    module.statements = statements;
    Ok(())
}

impl<'m> Resolver<'m> {
    fn current_scope(&self) -> Scope {
        self.scope_stack.last().expect("base scopes always present").clone()
    }

    fn statement(&mut self, statement: &mut Statement) -> Result<(), SemanticError> {
        match statement {
            Statement::Declaration {
                name,
                annotation,
                initializer,
                scope,
                ty,
            } => {
                self.expression(initializer)?;
                let current = self.current_scope();
                let local_name = name.last().to_string();
                current.declare_variable(&local_name)?;
                if let Some(annotation) = annotation {
                    let resolved = resolve_annotation(&[self.module.externals.clone(), self.module.globals.clone()], annotation)?;
                    current.set_variable_type(&local_name, resolved.clone())?;
                    *ty = Some(resolved);
                }
                *scope = Some(current);
            }
            Statement::TypeDeclaration { .. } => {}
            Statement::ExpressionStatement(expression) => self.expression(expression)?,
            Statement::ReturnStatement { value } => self.expression(value)?,
            Statement::ConditionalStatement {
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.expression(condition)?;
                self.block(then_block)?;
                if let Some(else_block) = else_block {
                    self.block(else_block)?;
                }
            }
            Statement::WhileLoop { condition, body } => {
                self.expression(condition)?;
                self.block(body)?;
            }
            Statement::Deallocation { reference } => self.expression(reference)?,
        }
        Ok(())
    }

    fn block(&mut self, block: &mut Block) -> Result<(), SemanticError> {
        self.scope_stack.push(Scope::new());
        let result = (|| {
            for statement in block.iter_mut() {
                self.statement(statement)?;
            }
            Ok(())
        })();
        self.scope_stack.pop();
        result
    }

    fn expression(&mut self, expression: &mut Expression) -> Result<(), SemanticError> {
        match expression {
            Expression::UnitLiteral { .. }
            | Expression::BooleanLiteral { .. }
            | Expression::IntegerLiteral { .. }
            | Expression::CharacterLiteral { .. }
            | Expression::StringLiteral { .. } => Ok(()),
            Expression::Variable { name, scope, .. } => {
                let resolved = resolve(&self.scope_stack, name.last()).map_err(SemanticError::from)?;
                self.record_if_capture(&resolved, name);
                *scope = Some(resolved);
                Ok(())
            }
            Expression::MemberAccessor { object, .. } => self.expression(object),
            Expression::Call { function, arguments, .. } => {
                self.expression(function)?;
                for argument in arguments {
                    self.expression(argument)?;
                }
                Ok(())
            }
            Expression::UnaryOp { operand, .. } => self.expression(operand),
            Expression::BinaryOp { left, right, .. } => {
                self.expression(left)?;
                self.expression(right)
            }
            Expression::Assignment { target, value, .. } => {
                self.expression(target)?;
                self.expression(value)
            }
            Expression::Function {
                parameters,
                body,
                locals,
                captures,
                ..
            } => {
                for param in parameters.iter() {
                    declare_param(locals, param)?;
                }
                self.functions.push(FunctionFrame {
                    boundary: self.scope_stack.len(),
                    captures: Vec::new(),
                    seen: HashSet::new(),
                });
                self.scope_stack.push(locals.clone());
                let result = (|| {
                    for statement in body.iter_mut() {
                        self.statement(statement)?;
                    }
                    Ok(())
                })();
                self.scope_stack.pop();
                let frame = self.functions.pop().expect("pushed above");
                result?;
                *captures = Some(frame.captures);
                Ok(())
            }
            Expression::Initializer { member_initializers, .. } => {
                for MemberInitializer { value, .. } in member_initializers {
                    self.expression(value)?;
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
                    self.expression(size)?;
                }
                if let Some(member_initializers) = member_initializers {
                    for MemberInitializer { value, .. } in member_initializers {
                        self.expression(value)?;
                    }
                }
                if let Some(initial_value) = initial_value {
                    self.expression(initial_value)?;
                }
                Ok(())
            }
        }
    }

    /// If `scope` sits strictly inside the innermost active function's
    /// boundary (and isn't one of the three base module scopes), records
    /// `name` as a capture of that function.
    fn record_if_capture(&mut self, scope: &Scope, name: &Identifier) {
        let Some(index) = self.scope_stack.iter().position(|s| s == scope) else {
            return;
        };
        if index < BASE_SCOPE_COUNT {
            return;
        }
        let Some(frame) = self.functions.last_mut() else {
            return;
        };
        if index >= frame.boundary {
            return;
        }
        let key = name.last().to_string();
        if frame.seen.insert(key) {
            frame.captures.push(name.clone());
        }
    }
}

fn declare_param(locals: &Scope, param: &FunctionParam) -> Result<(), SemanticError> {
    if !locals.is_variable_declared(&param.name) {
        locals.declare_variable(&param.name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeAnnotation;
    use std::path::PathBuf;

    fn named(name: &str) -> TypeAnnotation {
        TypeAnnotation::Named {
            qualifier: None,
            name: Identifier::new(name),
        }
    }

    fn param(name: &str) -> FunctionParam {
        FunctionParam {
            name: name.into(),
            annotation: named("I64"),
            ty: None,
        }
    }

    fn function_expr(parameters: Vec<FunctionParam>, body: Block) -> Expression {
        Expression::Function {
            parameters,
            return_type_annotation: named("I64"),
            return_type: None,
            body,
            locals: Scope::new(),
            captures: None,
            global_name: Some("__fn__f".into()),
            ty: None,
        }
    }

    #[test]
    fn resolves_parameter_reference_without_capturing() {
        let body = vec![Statement::ReturnStatement {
            value: Expression::Variable {
                name: Identifier::new("x"),
                scope: None,
                ty: None,
            },
        }];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("f"),
            annotation: None,
            initializer: function_expr(vec![param("x")], body),
            scope: None,
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        run(&mut module).unwrap();
        let Statement::Declaration { initializer, .. } = &module.statements[0] else { panic!() };
        let Expression::Function { captures, .. } = initializer else { panic!() };
        assert_eq!(captures.as_ref().unwrap().len(), 0);
    }

    #[test]
    fn nested_lambda_captures_outer_local() {
        let inner_body = vec![Statement::ReturnStatement {
            value: Expression::Variable {
                name: Identifier::new("outer_local"),
                scope: None,
                ty: None,
            },
        }];
        let inner_lambda = function_expr(vec![], inner_body);
        let outer_body = vec![
            Statement::Declaration {
                name: Identifier::new("outer_local"),
                annotation: Some(named("I64")),
                initializer: Expression::IntegerLiteral { value: 1, ty: None },
                scope: None,
                ty: None,
            },
            Statement::ReturnStatement { value: inner_lambda },
        ];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("f"),
            annotation: None,
            initializer: function_expr(vec![], outer_body),
            scope: None,
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        run(&mut module).unwrap();
        let Statement::Declaration { initializer, .. } = &module.statements[0] else { panic!() };
        let Expression::Function { body, .. } = initializer else { panic!() };
        let Statement::ReturnStatement { value: inner } = &body[1] else { panic!() };
        let Expression::Function { captures, .. } = inner else { panic!() };
        let captures = captures.as_ref().unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].last(), "outer_local");
    }

    #[test]
    fn undeclared_variable_is_a_semantic_error() {
        let body = vec![Statement::ReturnStatement {
            value: Expression::Variable {
                name: Identifier::new("nope"),
                scope: None,
                ty: None,
            },
        }];
        let statements = vec![Statement::Declaration {
            name: Identifier::new("f"),
            annotation: None,
            initializer: function_expr(vec![], body),
            scope: None,
            ty: None,
        }];
        let mut module = Module::new("m", PathBuf::from("m.l0"), statements);
        assert!(run(&mut module).is_err());
    }
}
