//! Generator (§4.9): lowers a fully-annotated [`crate::module::Module`] set
//! to LLVM IR, one `inkwell::module::Module` per source file, then runs the
//! global DCE pass over each.
//!
//! Grounded on `codegen/context.rs` (the `CodegenContext` shape: cached type
//! conversions, a scope stack of variable/function maps) and
//! `codegen/statements/function.rs` (the two-phase declare-then-define
//! driver). The teacher keeps one `CodegenContext` per `inkwell::Module`;
//! here [`TypeCache`] is hoisted out to the run's single `inkwell::Context`
//! (LLVM struct names are registered there, not per-module — see
//! `codegen::types`), while [`ModuleGenerator`] holds everything that is
//! genuinely per-`.ll`-file: the module itself, its builder, and its
//! variable/function/global value maps.

pub mod dce;
pub mod error;
pub mod expressions;
pub mod functions;
pub mod statements;
pub mod types;

use std::cell::RefCell;
use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module as LlvmModule;
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue};

use crate::module::Module;
use crate::scope::Scope;
use types::TypeCache;

pub use error::GeneratorError;

/// The value(s) a `CodeGen`-style expression lowering hands back, replacing
/// the original's `ResultStore` side-channel (§4.9's resolved Open Question:
/// each expression's codegen returns its own `CodegenValue` by value instead
/// of stashing into `&mut self` fields on a shared context).
#[derive(Default, Clone, Copy)]
pub struct CodegenValue<'ctx> {
    /// The expression's value, loaded and ready to feed into another
    /// instruction (absent only for a `()`-typed statement-expression).
    pub value: Option<BasicValueEnum<'ctx>>,
    /// The addressable storage location backing an lvalue (`Variable`,
    /// `MemberAccessor`, a dereferenced reference) — set whenever the
    /// expression is one, `None` for a pure rvalue.
    pub address: Option<PointerValue<'ctx>>,
    /// For a struct/array allocation, the raw heap (or stack) pointer to
    /// the allocated object, distinct from `address` (the pointer *to the
    /// reference value itself*, when the reference is also an lvalue).
    pub object_ptr: Option<PointerValue<'ctx>>,
}

impl<'ctx> CodegenValue<'ctx> {
    pub fn of(value: BasicValueEnum<'ctx>) -> Self {
        Self {
            value: Some(value),
            address: None,
            object_ptr: None,
        }
    }

    pub fn require_value(&self, what: &str) -> Result<BasicValueEnum<'ctx>, GeneratorError> {
        self.value
            .ok_or_else(|| GeneratorError::MissingAnnotation(format!("expected a value from '{what}'")))
    }

    pub fn require_address(&self, what: &str) -> Result<PointerValue<'ctx>, GeneratorError> {
        self.address
            .ok_or_else(|| GeneratorError::MissingAnnotation(format!("expected an address from '{what}'")))
    }
}

/// Everything genuinely per-`.ll`-file: the `inkwell::Module`, its builder,
/// and the three value maps a generation pass consults (functions, global
/// data, and local variables keyed by the declaring `Scope`'s identity so
/// aliased `Scope` clones — captures included — resolve to the same slot).
pub struct ModuleGenerator<'ctx, 'a> {
    pub context: &'ctx Context,
    pub types: &'a TypeCache<'ctx>,
    pub llvm_module: LlvmModule<'ctx>,
    pub builder: Builder<'ctx>,
    functions: RefCell<HashMap<String, FunctionValue<'ctx>>>,
    globals: RefCell<HashMap<String, PointerValue<'ctx>>>,
    locals: RefCell<HashMap<(usize, String), PointerValue<'ctx>>>,
    lambda_counter: RefCell<usize>,
    string_counter: RefCell<usize>,
    /// The enclosing functions' `locals` scopes, innermost last, live only
    /// while that function's body is being generated — a lambda literal
    /// resolves a captured name against this stack the same way the
    /// resolver did (`crate::scope::resolve`), to recover both its type and
    /// its *current* alloca before shadowing it with the unpacked copy.
    function_scopes: RefCell<Vec<Scope>>,
}

impl<'ctx, 'a> ModuleGenerator<'ctx, 'a> {
    pub fn new(context: &'ctx Context, types: &'a TypeCache<'ctx>, module_name: &str) -> Self {
        let llvm_module = context.create_module(module_name);
        Self {
            context,
            types,
            llvm_module,
            builder: context.create_builder(),
            functions: RefCell::new(HashMap::new()),
            globals: RefCell::new(HashMap::new()),
            locals: RefCell::new(HashMap::new()),
            lambda_counter: RefCell::new(0),
            string_counter: RefCell::new(0),
            function_scopes: RefCell::new(Vec::new()),
        }
    }

    pub fn next_string_name(&self) -> String {
        let mut counter = self.string_counter.borrow_mut();
        let name = format!(".str.{counter}");
        *counter += 1;
        name
    }

    pub fn push_function_scope(&self, scope: Scope) {
        self.function_scopes.borrow_mut().push(scope);
    }

    pub fn pop_function_scope(&self) {
        self.function_scopes.borrow_mut().pop();
    }

    /// Resolves a captured identifier's declaring scope by walking the
    /// currently active function scopes innermost-first, exactly as the
    /// resolver walked its own scope stack.
    pub fn resolve_capture_scope(&self, name: &str) -> Option<Scope> {
        crate::scope::resolve(&self.function_scopes.borrow(), name).ok()
    }

    pub fn next_lambda_name(&self, enclosing: &str) -> String {
        let mut counter = self.lambda_counter.borrow_mut();
        let name = format!("{enclosing}$lambda{counter}");
        *counter += 1;
        name
    }

    pub fn find_function(&self, global_name: &str) -> Option<FunctionValue<'ctx>> {
        self.functions.borrow().get(global_name).copied()
    }

    pub fn store_function(&self, global_name: &str, function: FunctionValue<'ctx>) {
        self.functions.borrow_mut().insert(global_name.to_string(), function);
    }

    pub fn find_global(&self, global_name: &str) -> Option<PointerValue<'ctx>> {
        self.globals.borrow().get(global_name).copied()
    }

    pub fn store_global(&self, global_name: &str, pointer: PointerValue<'ctx>) {
        self.globals.borrow_mut().insert(global_name.to_string(), pointer);
    }

    pub fn find_local(&self, scope_identity: usize, name: &str) -> Option<PointerValue<'ctx>> {
        self.locals.borrow().get(&(scope_identity, name.to_string())).copied()
    }

    /// Binds `name` (as seen through `scope`) to `pointer`, returning
    /// whatever was previously bound under the same key so a caller that
    /// temporarily shadows an outer binding (unpacking a closure's captures,
    /// §4.9) can restore it afterwards.
    pub fn bind_local(&self, scope_identity: usize, name: &str, pointer: PointerValue<'ctx>) -> Option<PointerValue<'ctx>> {
        self.locals.borrow_mut().insert((scope_identity, name.to_string()), pointer)
    }

    pub fn restore_local(&self, scope_identity: usize, name: &str, previous: Option<PointerValue<'ctx>>) {
        let mut locals = self.locals.borrow_mut();
        match previous {
            Some(pointer) => {
                locals.insert((scope_identity, name.to_string()), pointer);
            }
            None => {
                locals.remove(&(scope_identity, name.to_string()));
            }
        }
    }

    /// The `malloc` extern every heap-allocating construct (`new`, a
    /// capturing closure's environment) calls through, declared lazily the
    /// first time it's needed — grounded on `generator.cpp`'s
    /// `GenerateMallocCall`.
    pub fn malloc_fn(&self) -> FunctionValue<'ctx> {
        if let Some(existing) = self.llvm_module.get_function("malloc") {
            return existing;
        }
        let fn_type = self.types.ptr_type().fn_type(&[self.context.i64_type().into()], false);
        self.llvm_module.add_function("malloc", fn_type, None)
    }

    pub fn free_fn(&self) -> FunctionValue<'ctx> {
        if let Some(existing) = self.llvm_module.get_function("free") {
            return existing;
        }
        let fn_type = self.context.void_type().fn_type(&[self.types.ptr_type().into()], false);
        self.llvm_module.add_function("free", fn_type, None)
    }
}

/// Lowers every module, fully declaring each before any is defined (§4.9's
/// two-phase ordering, applied at the multi-module level the same way it's
/// applied within a single module's `DeclareCallables`/`DefineCallables`).
/// Returns `(module_name, llvm_ir_text)` pairs, ready to be written out as
/// `<stem>.ll` files.
pub fn compile_modules(context: &Context, modules: &[Module]) -> Result<Vec<(String, String)>, GeneratorError> {
    let types = TypeCache::new(context);
    let mut generators = Vec::with_capacity(modules.len());
    for module in modules {
        let generator = ModuleGenerator::new(context, &types, &module.name);
        generator.declare_module(module)?;
        generators.push(generator);
    }
    for (generator, module) in generators.iter().zip(modules) {
        generator.define_module(module)?;
    }
    let mut outputs = Vec::with_capacity(generators.len());
    for (generator, module) in generators.iter().zip(modules) {
        dce::run_global_dce(&generator.llvm_module)?;
        outputs.push((module.name.clone(), generator.llvm_module.print_to_string().to_string()));
    }
    Ok(outputs)
}
