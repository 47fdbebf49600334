//! Unary/binary operator overload tables, encoded as data keyed by
//! `(operator, operand shape[, operand shape])` rather than as a visitor
//! double-dispatch — per `DESIGN NOTES` §9 of the specification. Address-of,
//! dereference, and reference-indexation stay special-cased ahead of these
//! tables in [`crate::semantics::type_checker`], exactly as the original
//! `ResolveUnaryOperator`/`ResolveBinaryOperator` single them out before
//! falling back to table lookup.

use crate::ast::expression::{BinaryOperator, BinaryOverload, UnaryOperator, UnaryOverload};
use crate::types::{Qualifier, Type};

/// Resolves `+`/`-`/`!` against a concrete operand shape. `&` and `^` are
/// handled by the caller before reaching this table.
pub fn resolve_unary(op: UnaryOperator, operand: &Type) -> Option<(UnaryOverload, Type)> {
    match (op, operand) {
        (UnaryOperator::Plus, Type::Integer(_)) => {
            Some((UnaryOverload::IntegerIdentity, Type::Integer(Qualifier::Constant)))
        }
        (UnaryOperator::Minus, Type::Integer(_)) => {
            Some((UnaryOverload::IntegerNegation, Type::Integer(Qualifier::Constant)))
        }
        (UnaryOperator::Bang, Type::Boolean(_)) => {
            Some((UnaryOverload::BooleanNegation, Type::Boolean(Qualifier::Constant)))
        }
        _ => None,
    }
}

/// Resolves a binary operator against two concrete operand shapes.
/// `ref + int` (reference indexation) is handled by the caller before
/// reaching this table.
pub fn resolve_binary(op: BinaryOperator, left: &Type, right: &Type) -> Option<(BinaryOverload, Type)> {
    use BinaryOperator::*;
    use Type::*;

    let boolean = Boolean(Qualifier::Constant);
    let integer = Integer(Qualifier::Constant);
    let character = Character(Qualifier::Constant);

    match (op, left, right) {
        (EqualsEquals, Boolean(_), Boolean(_)) => Some((BinaryOverload::BooleanEquality, boolean)),
        (EqualsEquals, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerEquality, boolean)),
        (EqualsEquals, Character(_), Character(_)) => Some((BinaryOverload::CharacterEquality, boolean)),
        (BangEquals, Boolean(_), Boolean(_)) => Some((BinaryOverload::BooleanInequality, boolean)),
        (BangEquals, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerInequality, boolean)),
        (BangEquals, Character(_), Character(_)) => Some((BinaryOverload::CharacterInequality, boolean)),

        (Plus, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerAddition, integer)),
        (Plus, Character(_), Integer(_)) => Some((BinaryOverload::CharacterAddition, character)),
        (Minus, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerSubtraction, integer)),
        (Minus, Character(_), Character(_)) => Some((BinaryOverload::CharacterSubtraction, integer)),
        (Star, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerMultiplication, integer)),
        (Slash, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerDivision, integer)),
        (Percent, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerRemainder, integer)),

        (PipePipe, Boolean(_), Boolean(_)) => Some((BinaryOverload::BooleanDisjunction, boolean)),
        (AmpersandAmpersand, Boolean(_), Boolean(_)) => Some((BinaryOverload::BooleanConjunction, boolean)),

        (Less, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerLess, boolean)),
        (Greater, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerGreater, boolean)),
        (LessEquals, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerLessOrEquals, boolean)),
        (GreaterEquals, Integer(_), Integer(_)) => Some((BinaryOverload::IntegerGreaterOrEquals, boolean)),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition_resolves() {
        let int = Integer(Qualifier::Constant);
        assert_eq!(
            resolve_binary(BinaryOperator::Plus, &int, &int).map(|(o, _)| o),
            Some(BinaryOverload::IntegerAddition)
        );
    }

    #[test]
    fn character_addition_accepts_character_and_integer() {
        let c = Character(Qualifier::Constant);
        let i = Integer(Qualifier::Constant);
        assert_eq!(
            resolve_binary(BinaryOperator::Plus, &c, &i).map(|(o, _)| o),
            Some(BinaryOverload::CharacterAddition)
        );
    }

    #[test]
    fn character_subtraction_yields_integer() {
        let c = Character(Qualifier::Constant);
        let (_, ty) = resolve_binary(BinaryOperator::Minus, &c, &c).expect("character subtraction overload");
        assert!(matches!(ty, Integer(_)));
    }

    #[test]
    fn boolean_plus_boolean_has_no_overload() {
        let b = Boolean(Qualifier::Constant);
        assert!(resolve_binary(BinaryOperator::Plus, &b, &b).is_none());
    }
}
