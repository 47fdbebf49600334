//! Resolves parsed [`TypeAnnotation`] syntax into a concrete [`Type`].
//!
//! Shared by the global scope builder (§4.4, resolving member/global
//! annotations before the type checker runs) and the type checker itself
//! (§4.6, resolving local declaration/parameter/return annotations). Primitive
//! names (`()`, `Boolean`, `I64`, `C8`, `CString`) are recognized directly;
//! everything else is looked up by name in the supplied type scopes,
//! innermost-last (mirroring the scope stack's search order elsewhere in the
//! pipeline).

use std::rc::Rc;

use crate::ast::TypeAnnotation;
use crate::scope::Scope;
use crate::semantics::error::SemanticError;
use crate::types::{Qualifier, Type};

pub fn resolve_annotation(type_scopes: &[Scope], annotation: &TypeAnnotation) -> Result<Type, SemanticError> {
    match annotation {
        TypeAnnotation::Named { qualifier, name } => {
            let qualifier = qualifier.unwrap_or(Qualifier::Constant);
            if name.is_simple() {
                match name.last() {
                    "()" => return Ok(Type::Unit(qualifier)),
                    "Boolean" => return Ok(Type::Boolean(qualifier)),
                    "I64" => return Ok(Type::Integer(qualifier)),
                    "C8" => return Ok(Type::Character(qualifier)),
                    "CString" => {
                        return Ok(Type::Reference(Rc::new(Type::Character(Qualifier::Constant)), qualifier))
                    }
                    _ => {}
                }
            }
            for scope in type_scopes.iter().rev() {
                if scope.is_type_declared(name.last()) {
                    let ty = scope.get_type(name.last())?;
                    return Ok(ty.with_qualifier(qualifier));
                }
            }
            Err(SemanticError::UnresolvedName(name.to_string()))
        }
        TypeAnnotation::Reference { qualifier, base } => {
            let base_ty = resolve_annotation(type_scopes, base)?;
            Ok(Type::Reference(Rc::new(base_ty), qualifier.unwrap_or(Qualifier::Constant)))
        }
        TypeAnnotation::Function { qualifier, params, return_type }
        | TypeAnnotation::Method { qualifier, params, return_type } => {
            let mut resolved_params = Vec::with_capacity(params.len());
            for param in params {
                resolved_params.push(Rc::new(resolve_annotation(type_scopes, param)?));
            }
            let resolved_return = Rc::new(resolve_annotation(type_scopes, return_type)?);
            Ok(Type::Function {
                params: resolved_params,
                return_type: resolved_return,
                qualifier: qualifier.unwrap_or(Qualifier::Constant),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Identifier;

    #[test]
    fn resolves_primitive_names() {
        let ty = resolve_annotation(
            &[],
            &TypeAnnotation::Named {
                qualifier: None,
                name: Identifier::new("I64"),
            },
        )
        .unwrap();
        assert!(matches!(ty, Type::Integer(Qualifier::Constant)));
    }

    #[test]
    fn resolves_struct_name_from_scope() {
        let scope = Scope::new();
        scope.declare_type("Point").unwrap();
        scope
            .define_type(
                "Point",
                Type::Struct {
                    name: Identifier::new("Point"),
                    members: Rc::new(vec![]),
                    qualifier: Qualifier::Constant,
                },
            )
            .unwrap();
        let ty = resolve_annotation(
            &[scope],
            &TypeAnnotation::Named {
                qualifier: Some(Qualifier::Mutable),
                name: Identifier::new("Point"),
            },
        )
        .unwrap();
        assert!(matches!(ty, Type::Struct { qualifier: Qualifier::Mutable, .. }));
    }

    #[test]
    fn unresolved_name_is_an_error() {
        let err = resolve_annotation(
            &[],
            &TypeAnnotation::Named {
                qualifier: None,
                name: Identifier::new("Nonexistent"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::UnresolvedName(_)));
    }
}
