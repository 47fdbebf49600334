use crate::ast::statement::Block;
use crate::ast::TypeAnnotation;
use crate::identifier::Identifier;
use crate::scope::Scope;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Bang,
    Ampersand,
    Caret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOverload {
    IntegerIdentity,
    IntegerNegation,
    BooleanNegation,
    AddressOf,
    Dereferenciation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PipePipe,
    AmpersandAmpersand,
    EqualsEquals,
    BangEquals,
    Less,
    Greater,
    LessEquals,
    GreaterEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOverload {
    BooleanEquality,
    IntegerEquality,
    CharacterEquality,
    BooleanInequality,
    IntegerInequality,
    CharacterInequality,
    IntegerAddition,
    CharacterAddition,
    IntegerSubtraction,
    CharacterSubtraction,
    IntegerMultiplication,
    IntegerDivision,
    IntegerRemainder,
    BooleanDisjunction,
    BooleanConjunction,
    IntegerLess,
    IntegerGreater,
    IntegerLessOrEquals,
    IntegerGreaterOrEquals,
    ReferenceIndexation,
}

/// Where a `MemberAccessor` resolves to: an instance slot (struct layout
/// index) or a static member's backing global (named
/// `"{struct}::{member}"`, reached through the owning type's own scope).
#[derive(Debug, Clone)]
pub enum MemberSlot {
    Instance(usize),
    Static { global_name: String },
}

#[derive(Debug, Clone)]
pub struct FunctionParam {
    pub name: String,
    pub annotation: TypeAnnotation,
    pub ty: Option<Type>,
}

#[derive(Debug, Clone)]
pub struct MemberInitializer {
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub enum Expression {
    UnitLiteral {
        ty: Option<Type>,
    },
    BooleanLiteral {
        value: bool,
        ty: Option<Type>,
    },
    IntegerLiteral {
        value: i64,
        ty: Option<Type>,
    },
    CharacterLiteral {
        value: u8,
        ty: Option<Type>,
    },
    StringLiteral {
        value: String,
        ty: Option<Type>,
    },
    Variable {
        name: Identifier,
        scope: Option<Scope>,
        ty: Option<Type>,
    },
    MemberAccessor {
        object: Box<Expression>,
        member: String,
        slot: Option<MemberSlot>,
        ty: Option<Type>,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
        is_method_call: bool,
        ty: Option<Type>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
        overload: Option<UnaryOverload>,
        ty: Option<Type>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        overload: Option<BinaryOverload>,
        ty: Option<Type>,
    },
    Assignment {
        target: Box<Expression>,
        value: Box<Expression>,
        target_address: Option<Box<Expression>>,
        ty: Option<Type>,
    },
    Function {
        parameters: Vec<FunctionParam>,
        return_type_annotation: TypeAnnotation,
        return_type: Option<Type>,
        body: Block,
        locals: Scope,
        captures: Option<Vec<Identifier>>,
        global_name: Option<String>,
        ty: Option<Type>,
    },
    Initializer {
        type_annotation: TypeAnnotation,
        member_initializers: Vec<MemberInitializer>,
        ty: Option<Type>,
    },
    Allocation {
        type_annotation: TypeAnnotation,
        size: Option<Box<Expression>>,
        member_initializers: Option<Vec<MemberInitializer>>,
        allocated_type: Option<Type>,
        initial_value: Option<Box<Expression>>,
        ty: Option<Type>,
    },
}

impl Expression {
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Expression::UnitLiteral { ty }
            | Expression::BooleanLiteral { ty, .. }
            | Expression::IntegerLiteral { ty, .. }
            | Expression::CharacterLiteral { ty, .. }
            | Expression::StringLiteral { ty, .. }
            | Expression::Variable { ty, .. }
            | Expression::MemberAccessor { ty, .. }
            | Expression::Call { ty, .. }
            | Expression::UnaryOp { ty, .. }
            | Expression::BinaryOp { ty, .. }
            | Expression::Assignment { ty, .. }
            | Expression::Function { ty, .. }
            | Expression::Initializer { ty, .. }
            | Expression::Allocation { ty, .. } => ty.as_ref(),
        }
    }

    pub fn set_ty(&mut self, new_ty: Type) {
        let slot = match self {
            Expression::UnitLiteral { ty }
            | Expression::BooleanLiteral { ty, .. }
            | Expression::IntegerLiteral { ty, .. }
            | Expression::CharacterLiteral { ty, .. }
            | Expression::StringLiteral { ty, .. }
            | Expression::Variable { ty, .. }
            | Expression::MemberAccessor { ty, .. }
            | Expression::Call { ty, .. }
            | Expression::UnaryOp { ty, .. }
            | Expression::BinaryOp { ty, .. }
            | Expression::Assignment { ty, .. }
            | Expression::Function { ty, .. }
            | Expression::Initializer { ty, .. }
            | Expression::Allocation { ty, .. } => ty,
        };
        *slot = Some(new_ty);
    }

    /// An lvalue is a variable, a member accessor, or a dereference (§4.8).
    pub fn is_lvalue(&self) -> bool {
        matches!(self, Expression::Variable { .. } | Expression::MemberAccessor { .. })
            || matches!(
                self,
                Expression::UnaryOp {
                    op: UnaryOperator::Caret,
                    ..
                }
            )
    }
}
