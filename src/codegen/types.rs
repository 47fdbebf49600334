//! Lowers [`crate::types::Type`] to LLVM types, and owns the one named
//! closure struct type every function value in the program shares.
//!
//! Grounded on `codegen/context.rs`'s `get_llvm_type` (a cached
//! `Type -> BasicMetadataTypeEnum` conversion) and
//! `codegen/statements/function.rs`'s `build_llvm_function_type_from_own_types`
//! (function-returning-function lowered through the closure struct rather
//! than a raw LLVM function pointer). `Type::Unit` has no direct LLVM
//! equivalent as a value type; it is lowered to a zero-field struct (`{}`),
//! the usual encoding for a unit/void value that still needs to occupy a
//! register or a struct field, while a function that *returns* `()` still
//! lowers to an LLVM `void` return per [`function_type`] below.

use std::cell::RefCell;
use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, StructType};
use inkwell::AddressSpace;

use crate::types::{StructMember, Type};

/// Context-level (not per-module) caches: the closure struct's identity and
/// a named struct type are meaningful across every `.ll` file this crate
/// emits, since LLVM struct names are registered on the `Context`, not the
/// `Module` (mirrors `codegen/context.rs`'s single `CodegenContext` per
/// compilation run).
pub struct TypeCache<'ctx> {
    context: &'ctx Context,
    closure_type: StructType<'ctx>,
    struct_types: RefCell<HashMap<String, StructType<'ctx>>>,
}

impl<'ctx> TypeCache<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        let closure_type = context.opaque_struct_type("__closure");
        let ptr = context.ptr_type(AddressSpace::default());
        closure_type.set_body(&[ptr.into(), ptr.into()], false);
        Self {
            context,
            closure_type,
            struct_types: RefCell::new(HashMap::new()),
        }
    }

    pub fn closure_type(&self) -> StructType<'ctx> {
        self.closure_type
    }

    pub fn ptr_type(&self) -> inkwell::types::PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    /// Looks up (or lazily creates) the named LLVM struct type for an L0
    /// struct, laying out its non-static, non-method members in declaration
    /// order — the same order `MemberSlot::Instance` indexes into.
    pub fn struct_type(&self, name: &str, members: &[StructMember]) -> StructType<'ctx> {
        if let Some(existing) = self.struct_types.borrow().get(name) {
            return *existing;
        }
        let llvm_struct = self.context.opaque_struct_type(name);
        self.struct_types.borrow_mut().insert(name.to_string(), llvm_struct);
        let field_types: Vec<BasicTypeEnum<'ctx>> = members
            .iter()
            .filter(|m| !m.is_static)
            .map(|m| self.basic_type(&m.ty))
            .collect();
        llvm_struct.set_body(&field_types, false);
        llvm_struct
    }

    pub fn basic_type(&self, ty: &Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Unit(_) => self.context.struct_type(&[], false).as_basic_type_enum(),
            Type::Boolean(_) => self.context.bool_type().as_basic_type_enum(),
            Type::Integer(_) => self.context.i64_type().as_basic_type_enum(),
            Type::Character(_) => self.context.i8_type().as_basic_type_enum(),
            Type::Reference(..) => self.ptr_type().as_basic_type_enum(),
            Type::Function { .. } => self.closure_type.as_basic_type_enum(),
            Type::Struct { name, members, .. } => self.struct_type(&name.to_string(), members).as_basic_type_enum(),
            // An enum's value representation is its case tag.
            Type::Enum { .. } => self.context.i64_type().as_basic_type_enum(),
        }
    }

    pub fn metadata_type(&self, ty: &Type) -> BasicMetadataTypeEnum<'ctx> {
        self.basic_type(ty).into()
    }

    /// Builds the LLVM function type for an L0 function signature, plus the
    /// implicit trailing `ctx: ptr` parameter every function takes per the
    /// closure ABI (§4.9) — `extra_ctx_param` lets callers that build a
    /// closure's *impl* function (which always takes the context pointer)
    /// share this with callers that build the bare declared signature
    /// (which also always takes it, since every function is potentially
    /// stored as a closure value).
    pub fn function_type(&self, params: &[Type], return_type: &Type) -> FunctionType<'ctx> {
        let mut param_types: Vec<BasicMetadataTypeEnum<'ctx>> = params.iter().map(|p| self.metadata_type(p)).collect();
        param_types.push(self.ptr_type().into());
        match return_type {
            Type::Unit(_) => self.context.void_type().fn_type(&param_types, false),
            other => self.basic_type(other).fn_type(&param_types, false),
        }
    }
}
