use crate::ast::expression::{Expression, FunctionParam};
use crate::ast::TypeAnnotation;
use crate::identifier::Identifier;
use crate::scope::Scope;
use crate::types::Type;

pub type Block = Vec<Statement>;

#[derive(Debug, Clone)]
pub struct StructFieldDeclaration {
    pub name: String,
    pub annotation: TypeAnnotation,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone)]
pub enum TypeDefinition {
    Struct { members: Vec<StructFieldDeclaration> },
    Enum { members: Vec<String> },
}

#[derive(Debug, Clone)]
pub enum Statement {
    Declaration {
        name: Identifier,
        annotation: Option<TypeAnnotation>,
        initializer: Expression,
        scope: Option<Scope>,
        ty: Option<Type>,
    },
    TypeDeclaration {
        name: Identifier,
        definition: TypeDefinition,
        ty: Option<Type>,
    },
    ExpressionStatement(Expression),
    ReturnStatement {
        value: Expression,
    },
    ConditionalStatement {
        condition: Expression,
        then_block: Block,
        else_block: Option<Block>,
        then_block_returns: Option<bool>,
        else_block_returns: Option<bool>,
    },
    WhileLoop {
        condition: Expression,
        body: Block,
    },
    Deallocation {
        reference: Expression,
    },
}

/// A top-level function declaration, as produced by desugaring `fn name(...)
/// -> ret { ... }` / `method name(...) -> ret { ... }` at parse time into a
/// `Declaration` whose initializer is a `Function` expression — this struct
/// is only used transiently inside the parser's grammar layer.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<FunctionParam>,
    pub return_type_annotation: TypeAnnotation,
}
