//! Lowers every [`Statement`] variant (§4.9), including the two state
//! machines from §4.10: a conditional's merge block is emitted iff at least
//! one arm falls through, and a while loop's preheader/header/body/exit
//! chain.

use crate::ast::statement::{Block, Statement, TypeDefinition};
use crate::types::Type;

use super::{GeneratorError, ModuleGenerator};

pub(super) fn codegen_block<'ctx>(generator: &ModuleGenerator<'ctx, '_>, current_fn: &str, block: &Block) -> Result<(), GeneratorError> {
    for statement in block {
        codegen_statement(generator, current_fn, statement)?;
    }
    Ok(())
}

fn codegen_statement<'ctx>(generator: &ModuleGenerator<'ctx, '_>, current_fn: &str, statement: &Statement) -> Result<(), GeneratorError> {
    match statement {
        Statement::Declaration {
            name, initializer, scope, ty, ..
        } => {
            let scope = scope
                .as_ref()
                .ok_or_else(|| GeneratorError::MissingAnnotation(format!("declaration '{name}' has no resolved scope")))?;
            let ty = ty
                .as_ref()
                .ok_or_else(|| GeneratorError::MissingAnnotation(format!("declaration '{name}' has no type")))?;
            let value = generator.codegen_expression(current_fn, initializer)?.require_value("declaration initializer")?;
            let basic = generator.types.basic_type(ty);
            let alloca = generator.builder.build_alloca(basic, name.last())?;
            generator.builder.build_store(alloca, value)?;
            generator.bind_local(scope.identity(), name.last(), alloca);
            Ok(())
        }
        // Type declarations are fully handled at module declare/define time.
        Statement::TypeDeclaration {
            definition: TypeDefinition::Struct { .. } | TypeDefinition::Enum { .. },
            ..
        } => Ok(()),
        Statement::ExpressionStatement(expr) => {
            generator.codegen_expression(current_fn, expr)?;
            Ok(())
        }
        Statement::ReturnStatement { value } => {
            let is_unit = matches!(value.ty(), Some(Type::Unit(_)));
            let result = generator.codegen_expression(current_fn, value)?;
            if is_unit {
                generator.builder.build_return(None)?;
            } else {
                let value = result.require_value("return value")?;
                generator.builder.build_return(Some(&value))?;
            }
            Ok(())
        }
        Statement::ConditionalStatement {
            condition,
            then_block,
            else_block,
            then_block_returns,
            else_block_returns,
        } => codegen_conditional(
            generator,
            current_fn,
            condition,
            then_block,
            else_block.as_ref(),
            then_block_returns.unwrap_or(false),
            else_block_returns.unwrap_or(false),
        ),
        Statement::WhileLoop { condition, body } => codegen_while_loop(generator, current_fn, condition, body),
        Statement::Deallocation { reference } => {
            let ptr = generator.codegen_expression(current_fn, reference)?.require_value("deallocation target")?;
            let free = generator.free_fn();
            generator.builder.build_call(free, &[ptr.into()], "free")?;
            Ok(())
        }
    }
}

fn codegen_conditional<'ctx>(
    generator: &ModuleGenerator<'ctx, '_>,
    current_fn: &str,
    condition: &crate::ast::expression::Expression,
    then_block: &Block,
    else_block: Option<&Block>,
    then_returns: bool,
    else_returns: bool,
) -> Result<(), GeneratorError> {
    let function = generator
        .builder
        .get_insert_block()
        .and_then(|b| b.get_parent())
        .ok_or_else(|| GeneratorError::MissingAnnotation("conditional statement outside a function body".into()))?;

    let cond_value = generator.codegen_expression(current_fn, condition)?.require_value("condition")?;

    let then_bb = generator.context.append_basic_block(function, "then");
    let else_bb = generator.context.append_basic_block(function, "else");
    let merge_needed = !then_returns || !else_returns;
    let merge_bb = if merge_needed {
        Some(generator.context.append_basic_block(function, "merge"))
    } else {
        None
    };

    generator
        .builder
        .build_conditional_branch(cond_value.into_int_value(), then_bb, else_bb)?;

    generator.builder.position_at_end(then_bb);
    codegen_block(generator, current_fn, then_block)?;
    if !then_returns {
        generator.builder.build_unconditional_branch(merge_bb.expect("then falls through, merge exists"))?;
    }

    generator.builder.position_at_end(else_bb);
    if let Some(else_block) = else_block {
        codegen_block(generator, current_fn, else_block)?;
    }
    if !else_returns {
        generator.builder.build_unconditional_branch(merge_bb.expect("else falls through, merge exists"))?;
    }

    if let Some(merge_bb) = merge_bb {
        generator.builder.position_at_end(merge_bb);
    }
    Ok(())
}

fn codegen_while_loop<'ctx>(
    generator: &ModuleGenerator<'ctx, '_>,
    current_fn: &str,
    condition: &crate::ast::expression::Expression,
    body: &Block,
) -> Result<(), GeneratorError> {
    let function = generator
        .builder
        .get_insert_block()
        .and_then(|b| b.get_parent())
        .ok_or_else(|| GeneratorError::MissingAnnotation("while loop outside a function body".into()))?;

    let header_bb = generator.context.append_basic_block(function, "while.header");
    let body_bb = generator.context.append_basic_block(function, "while.body");
    let exit_bb = generator.context.append_basic_block(function, "while.exit");

    generator.builder.build_unconditional_branch(header_bb)?;

    generator.builder.position_at_end(header_bb);
    let cond_value = generator.codegen_expression(current_fn, condition)?.require_value("while condition")?;
    generator.builder.build_conditional_branch(cond_value.into_int_value(), body_bb, exit_bb)?;

    generator.builder.position_at_end(body_bb);
    codegen_block(generator, current_fn, body)?;
    if generator.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
        generator.builder.build_unconditional_branch(header_bb)?;
    }

    generator.builder.position_at_end(exit_bb);
    Ok(())
}
