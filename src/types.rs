//! The closed type sum and its conversion rule.
//!
//! Every [`Type`] carries a [`Qualifier`]; equality ([`Type::eq_ignoring_qualifier`])
//! ignores it, matching the original `Type::operator==` (see
//! `semantics/conversion_checker.cpp`), which never looks at mutability when
//! deciding whether two types are "the same shape".

use std::fmt;
use std::rc::Rc;

use crate::identifier::Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Constant,
    Mutable,
}

#[derive(Debug, Clone)]
pub enum Type {
    Unit(Qualifier),
    Boolean(Qualifier),
    Integer(Qualifier),
    Character(Qualifier),
    Reference(Rc<Type>, Qualifier),
    Function {
        params: Vec<Rc<Type>>,
        return_type: Rc<Type>,
        qualifier: Qualifier,
    },
    Struct {
        name: Identifier,
        members: Rc<Vec<StructMember>>,
        qualifier: Qualifier,
    },
    Enum {
        name: Identifier,
        members: Rc<Vec<String>>,
        qualifier: Qualifier,
    },
}

#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: String,
    pub ty: Type,
    pub is_method: bool,
    pub is_static: bool,
    /// `"{struct}::{member}"`, set when this member has a default initializer.
    pub default_initializer_global_name: Option<String>,
}

impl Type {
    pub fn qualifier(&self) -> Qualifier {
        match self {
            Type::Unit(q)
            | Type::Boolean(q)
            | Type::Integer(q)
            | Type::Character(q)
            | Type::Reference(_, q)
            | Type::Function { qualifier: q, .. }
            | Type::Struct { qualifier: q, .. }
            | Type::Enum { qualifier: q, .. } => *q,
        }
    }

    /// Shallow copy with a new top-level qualifier. Trivial because the
    /// qualifier is a plain field rather than a wrapping node.
    pub fn with_qualifier(&self, qualifier: Qualifier) -> Type {
        match self {
            Type::Unit(_) => Type::Unit(qualifier),
            Type::Boolean(_) => Type::Boolean(qualifier),
            Type::Integer(_) => Type::Integer(qualifier),
            Type::Character(_) => Type::Character(qualifier),
            Type::Reference(base, _) => Type::Reference(base.clone(), qualifier),
            Type::Function {
                params,
                return_type,
                ..
            } => Type::Function {
                params: params.clone(),
                return_type: return_type.clone(),
                qualifier,
            },
            Type::Struct { name, members, .. } => Type::Struct {
                name: name.clone(),
                members: members.clone(),
                qualifier,
            },
            Type::Enum { name, members, .. } => Type::Enum {
                name: name.clone(),
                members: members.clone(),
                qualifier,
            },
        }
    }

    /// Structural equality (by name for struct/enum), ignoring qualifiers
    /// at every level.
    pub fn shape_eq(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Unit(_), Type::Unit(_)) => true,
            (Type::Boolean(_), Type::Boolean(_)) => true,
            (Type::Integer(_), Type::Integer(_)) => true,
            (Type::Character(_), Type::Character(_)) => true,
            (Type::Reference(a, _), Type::Reference(b, _)) => a.shape_eq(b),
            (
                Type::Function {
                    params: pa,
                    return_type: ra,
                    ..
                },
                Type::Function {
                    params: pb,
                    return_type: rb,
                    ..
                },
            ) => pa.len() == pb.len() && pa.iter().zip(pb).all(|(a, b)| a.shape_eq(b)) && ra.shape_eq(rb),
            (Type::Struct { name: a, .. }, Type::Struct { name: b, .. }) => a == b,
            (Type::Enum { name: a, .. }, Type::Enum { name: b, .. }) => a == b,
            _ => false,
        }
    }

    /// The conversion rule from §4.6: is a value of type `self` assignable
    /// to a target of type `target`?
    pub fn assignable_to(&self, target: &Type) -> bool {
        match (self, target) {
            (Type::Reference(base_value, _), Type::Reference(base_target, _)) => {
                if base_target.qualifier() == Qualifier::Mutable && base_value.qualifier() == Qualifier::Constant {
                    return false;
                }
                base_value.assignable_to(base_target)
            }
            (
                Type::Function {
                    params: pv,
                    return_type: rv,
                    ..
                },
                Type::Function {
                    params: pt,
                    return_type: rt,
                    ..
                },
            ) => pv.len() == pt.len() && pv.iter().zip(pt).all(|(v, t)| v.assignable_to(t)) && rv.assignable_to(rt),
            _ => self.shape_eq(target),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unit(_) => write!(f, "()"),
            Type::Boolean(_) => write!(f, "Boolean"),
            Type::Integer(_) => write!(f, "I64"),
            Type::Character(_) => write!(f, "C8"),
            Type::Reference(base, q) => {
                write!(f, "&{}{base}", if *q == Qualifier::Mutable { "mut " } else { "" })
            }
            Type::Function { params, return_type, .. } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {return_type}")
            }
            Type::Struct { name, .. } => write!(f, "{name}"),
            Type::Enum { name, .. } => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::Integer(Qualifier::Constant)
    }

    #[test]
    fn equality_ignores_qualifier() {
        assert!(Type::Integer(Qualifier::Constant).shape_eq(&Type::Integer(Qualifier::Mutable)));
    }

    #[test]
    fn struct_equality_is_by_name() {
        let a = Type::Struct {
            name: Identifier::new("Point"),
            members: Rc::new(vec![]),
            qualifier: Qualifier::Constant,
        };
        let b = Type::Struct {
            name: Identifier::new("Point"),
            members: Rc::new(vec![StructMember {
                name: "x".into(),
                ty: int(),
                is_method: false,
                is_static: false,
                default_initializer_global_name: None,
            }]),
            qualifier: Qualifier::Mutable,
        };
        assert!(a.shape_eq(&b));
    }

    #[test]
    fn mutable_reference_base_not_assignable_to_mutable_target() {
        let const_ref = Type::Reference(Rc::new(int()), Qualifier::Constant);
        let mut_ref_target = Type::Reference(Rc::new(Type::Integer(Qualifier::Mutable)), Qualifier::Constant);
        // const base -> mut target base: rejected
        assert!(!const_ref.assignable_to(&mut_ref_target));
        // mut base -> const target base: weakening is fine
        let mut_ref = Type::Reference(Rc::new(Type::Integer(Qualifier::Mutable)), Qualifier::Constant);
        let const_ref_target = Type::Reference(Rc::new(int()), Qualifier::Constant);
        assert!(mut_ref.assignable_to(&const_ref_target));
    }

    #[test]
    fn function_types_compare_pointwise() {
        let f1 = Type::Function {
            params: vec![Rc::new(int())],
            return_type: Rc::new(int()),
            qualifier: Qualifier::Constant,
        };
        let f2 = Type::Function {
            params: vec![Rc::new(int())],
            return_type: Rc::new(int()),
            qualifier: Qualifier::Constant,
        };
        assert!(f1.assignable_to(&f2));
    }
}
