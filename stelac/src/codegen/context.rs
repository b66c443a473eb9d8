//! LLVM helper backend.
//!
//! Every helper takes pointers to its operands: `fn(dst)` for default
//! construction and destruction, `fn(dst, src)` for copies and moves.
//! Helpers have internal linkage; refcounted blocks are managed through the
//! runtime ABI in [`super::runtime`].

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, PointerType};
use inkwell::values::{BasicMetadataValueEnum, FunctionValue, PointerValue};
use inkwell::AddressSpace;

use crate::def::TypeId;
use crate::typeck::lifetime::{HandleKind, LifetimeOp, LifetimePlan};
use crate::typeck::types::Ty;

use super::cache::{HelperBackend, HelperBody, HelperEnv};
use super::runtime::functions;
use super::types::{field_offsets, layout_of};
use super::CodegenError;

fn llvm_err(err: impl std::fmt::Display) -> CodegenError {
    CodegenError::Llvm(err.to_string())
}

/// Generates helpers into one LLVM module.
pub struct LlvmBackend<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
}

impl<'ctx> LlvmBackend<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        Self {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
        }
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    pub fn verify(&self) -> Result<(), CodegenError> {
        self.module
            .verify()
            .map_err(|err| CodegenError::Verification(err.to_string()))
    }

    pub fn print_to_string(&self) -> String {
        self.module.print_to_string().to_string()
    }

    fn ptr_type(&self) -> PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    /// A runtime function, declared on first use.
    fn runtime_fn(&self, name: &str) -> FunctionValue<'ctx> {
        if let Some(function) = self.module.get_function(name) {
            return function;
        }
        let ptr = self.ptr_type();
        let size = self.context.i64_type();
        let void = self.context.void_type();
        let fn_type = match name {
            functions::ARRAY_RELEASE => void.fn_type(&[ptr.into(), size.into(), ptr.into()], false),
            functions::ARRAY_NEW => ptr.fn_type(&[size.into(), size.into()], false),
            functions::ARRAY_LEN => size.fn_type(&[ptr.into()], false),
            functions::ARRAY_PUSH => void.fn_type(&[ptr.into(), ptr.into(), size.into()], false),
            functions::CLOSURE_NEW => ptr.fn_type(&[ptr.into(), ptr.into(), size.into()], false),
            functions::CLOSURE_ENV => ptr.fn_type(&[ptr.into()], false),
            _ => void.fn_type(&[ptr.into()], false),
        };
        self.module.add_function(name, fn_type, None)
    }

    fn param(&self, function: FunctionValue<'ctx>, index: u32) -> Result<PointerValue<'ctx>, CodegenError> {
        function
            .get_nth_param(index)
            .map(|param| param.into_pointer_value())
            .ok_or_else(|| CodegenError::Llvm(format!("helper has no parameter {index}")))
    }

    fn call(&self, function: FunctionValue<'ctx>, args: &[BasicMetadataValueEnum<'ctx>]) -> Result<(), CodegenError> {
        self.builder.build_call(function, args, "").map_err(llvm_err)?;
        Ok(())
    }

    fn load_handle(&self, slot: PointerValue<'ctx>) -> Result<PointerValue<'ctx>, CodegenError> {
        Ok(self
            .builder
            .build_load(self.ptr_type(), slot, "handle")
            .map_err(llvm_err)?
            .into_pointer_value())
    }

    fn store_null(&self, slot: PointerValue<'ctx>) -> Result<(), CodegenError> {
        self.builder
            .build_store(slot, self.ptr_type().const_null())
            .map_err(llvm_err)?;
        Ok(())
    }

    fn byte_offset(&self, base: PointerValue<'ctx>, offset: u64) -> Result<PointerValue<'ctx>, CodegenError> {
        let offset = self.context.i64_type().const_int(offset, false);
        // SAFETY: offsets come from the type layout, so they stay inside the object.
        unsafe {
            self.builder
                .build_in_bounds_gep(self.context.i8_type(), base, &[offset], "field")
                .map_err(llvm_err)
        }
    }

    fn release(
        &self,
        env: &HelperEnv<'_>,
        kind: HandleKind,
        handle: PointerValue<'ctx>,
        element_dtor: Option<FunctionValue<'ctx>>,
    ) -> Result<(), CodegenError> {
        match kind {
            HandleKind::Array { element } => {
                let size = layout_of(env.types, env.symbols, element).size;
                let dtor = match element_dtor {
                    Some(dtor) => dtor.as_global_value().as_pointer_value(),
                    None => self.ptr_type().const_null(),
                };
                let args = [
                    handle.into(),
                    self.context.i64_type().const_int(size, false).into(),
                    dtor.into(),
                ];
                self.call(self.runtime_fn(functions::ARRAY_RELEASE), &args)
            }
            HandleKind::Closure => self.call(self.runtime_fn(functions::CLOSURE_RELEASE), &[handle.into()]),
        }
    }

    fn build_body(&self, env: &HelperEnv<'_>, body: &HelperBody<'_, FunctionValue<'ctx>>) -> Result<(), CodegenError> {
        let function = *body.handle;
        let dst = self.param(function, 0)?;
        let src = || self.param(function, 1);
        let i64_type = self.context.i64_type();

        match body.plan {
            LifetimePlan::Noop => {}
            LifetimePlan::Zero { size } => {
                let zero = self.context.i8_type().const_zero();
                self.builder
                    .build_memset(dst, 1, zero, i64_type.const_int(*size, false))
                    .map_err(llvm_err)?;
            }
            LifetimePlan::BitCopy { size } => {
                self.builder
                    .build_memcpy(dst, 1, src()?, 1, i64_type.const_int(*size, false))
                    .map_err(llvm_err)?;
            }
            LifetimePlan::EmptyHandle => self.store_null(dst)?,
            LifetimePlan::Retain => {
                let block = self.load_handle(src()?)?;
                self.call(self.runtime_fn(functions::RC_RETAIN), &[block.into()])?;
                self.builder.build_store(dst, block).map_err(llvm_err)?;
            }
            LifetimePlan::Transfer => {
                let src = src()?;
                let block = self.load_handle(src)?;
                self.builder.build_store(dst, block).map_err(llvm_err)?;
                self.store_null(src)?;
            }
            LifetimePlan::RetainAssign => {
                // Retain first: source and destination may share the block.
                let block = self.load_handle(src()?)?;
                self.call(self.runtime_fn(functions::RC_RETAIN), &[block.into()])?;
                self.destroy_old(dst, body.callees)?;
                self.builder.build_store(dst, block).map_err(llvm_err)?;
            }
            LifetimePlan::TransferAssign => {
                let src = src()?;
                self.destroy_old(dst, body.callees)?;
                let block = self.load_handle(src)?;
                self.builder.build_store(dst, block).map_err(llvm_err)?;
                self.store_null(src)?;
            }
            LifetimePlan::Release(kind) => {
                let block = self.load_handle(dst)?;
                self.release(env, *kind, block, body.callees.first().copied())?;
                self.store_null(dst)?;
            }
            LifetimePlan::Fields(_) => {
                let offsets = field_offsets(env.types, env.symbols, body.ty);
                let binary = !matches!(body.op, LifetimeOp::DefConstruct | LifetimeOp::Destroy);
                for (&(offset, _), &callee) in offsets.iter().zip(body.callees) {
                    let field_dst = self.byte_offset(dst, offset)?;
                    if binary {
                        let field_src = self.byte_offset(src()?, offset)?;
                        self.call(callee, &[field_dst.into(), field_src.into()])?;
                    } else {
                        self.call(callee, &[field_dst.into()])?;
                    }
                }
            }
        }
        self.builder.build_return(None).map_err(llvm_err)?;
        Ok(())
    }

    fn destroy_old(&self, dst: PointerValue<'ctx>, callees: &[FunctionValue<'ctx>]) -> Result<(), CodegenError> {
        match callees.first() {
            Some(&destroy) => self.call(destroy, &[dst.into()]),
            None => Ok(()),
        }
    }
}

impl<'ctx> HelperBackend for LlvmBackend<'ctx> {
    type Handle = FunctionValue<'ctx>;

    fn declare(&mut self, name: &str, op: LifetimeOp, _ty: TypeId) -> Result<Self::Handle, CodegenError> {
        let ptr: BasicMetadataTypeEnum<'ctx> = self.ptr_type().into();
        let params: &[BasicMetadataTypeEnum<'ctx>] = match op {
            LifetimeOp::DefConstruct | LifetimeOp::Destroy => &[ptr],
            _ => &[ptr, ptr],
        };
        let fn_type = self.context.void_type().fn_type(params, false);
        Ok(self.module.add_function(name, fn_type, Some(Linkage::Internal)))
    }

    fn define(&mut self, env: &HelperEnv<'_>, body: HelperBody<'_, Self::Handle>) -> Result<(), CodegenError> {
        if let Ty::Pending(_) | Ty::Alias(_) = env.types.get(body.ty) {
            return Err(CodegenError::Llvm(format!("no layout for type {}", body.ty)));
        }
        // Field helpers are generated while their caller is half built.
        let saved = self.builder.get_insert_block();
        let entry = self.context.append_basic_block(*body.handle, "entry");
        self.builder.position_at_end(entry);
        let result = self.build_body(env, &body);
        if let Some(block) = saved {
            self.builder.position_at_end(block);
        }
        result
    }
}
