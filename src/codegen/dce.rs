//! Global dead-code elimination (§4.9): after a module's IR is fully
//! generated, strip any declaration or definition nothing reachable from an
//! exported symbol uses — `main`, callables other modules import by name,
//! and the externs they in turn declare keep the real work alive.

use inkwell::module::Module as LlvmModule;
use inkwell::passes::PassManager;

use super::error::GeneratorError;

pub fn run_global_dce(module: &LlvmModule) -> Result<(), GeneratorError> {
    let pass_manager: PassManager<LlvmModule> = PassManager::create(());
    pass_manager.add_global_dce_pass();
    pass_manager.add_strip_dead_prototypes_pass();
    pass_manager.run_on(module);
    Ok(())
}
