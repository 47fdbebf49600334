//! The semantic pipeline (§2 steps 3-9, §4.3-4.8): top-level analysis,
//! global scope building, cross-module extern binding, resolution, type
//! checking, the return-statement pass, and the reference pass — in that
//! order, each completing across every module before the next begins.

pub mod annotations;
pub mod error;
pub mod extern_binding;
pub mod global_scope_builder;
pub mod overloads;
pub mod reference_pass;
pub mod resolver;
pub mod return_pass;
pub mod top_level;
pub mod type_checker;

use crate::module::Module;
pub use error::SemanticError;

/// Runs every semantic pass over the whole module set, pass-by-pass: no
/// pass begins for any module until the previous one has finished for
/// every module whose output it might read (§2's ordering requirement,
/// needed because extern binding and the resolver both read every
/// sibling's globals).
pub fn run_all(modules: &mut [Module]) -> Result<(), SemanticError> {
    for module in modules.iter() {
        top_level::validate_module(module)?;
    }
    for module in modules.iter_mut() {
        top_level::declare_type_shells(module)?;
    }
    for module in modules.iter_mut() {
        global_scope_builder::run(module)?;
    }
    extern_binding::run(modules)?;
    for module in modules.iter_mut() {
        resolver::run(module)?;
    }
    for module in modules.iter_mut() {
        type_checker::run(module)?;
    }
    for module in modules.iter_mut() {
        return_pass::run(module)?;
    }
    for module in modules.iter_mut() {
        reference_pass::run(module)?;
    }
    Ok(())
}
