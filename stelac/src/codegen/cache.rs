//! Lifetime helper instantiation.
//!
//! Code generation asks for helpers by (operation, type). The cache makes
//! sure each pair is generated at most once per output module. A helper is
//! declared and cached before its body is generated, so helpers of recursive
//! types (a struct holding an array of itself) call each other instead of
//! recursing forever.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::Ast;
use crate::def::TypeId;
use crate::typeck::compare::representation;
use crate::typeck::lifetime::{classify, plan, HandleKind, LifetimeOp, LifetimePlan, TypeCategory};
use crate::typeck::symbol::SymbolTable;
use crate::typeck::types::TypeTable;

use super::mangle::helper_name;
use super::CodegenError;

/// The tables helpers are generated from.
#[derive(Clone, Copy)]
pub struct HelperEnv<'a> {
    pub ast: &'a Ast,
    pub types: &'a TypeTable,
    pub symbols: &'a SymbolTable,
}

/// Everything a backend needs to generate one helper body.
pub struct HelperBody<'h, H> {
    pub handle: &'h H,
    pub op: LifetimeOp,
    pub ty: TypeId,
    pub plan: &'h LifetimePlan,
    /// Helpers the body calls: one per field for [`LifetimePlan::Fields`],
    /// the element destructor for an array release when elements need one,
    /// the type's own destructor for an assignment that releases the old
    /// value.
    pub callees: &'h [H],
}

/// A target for generated helpers.
pub trait HelperBackend {
    type Handle: Clone;

    /// Declare a helper without a body yet.
    fn declare(&mut self, name: &str, op: LifetimeOp, ty: TypeId) -> Result<Self::Handle, CodegenError>;

    /// Generate the body of a declared helper.
    fn define(&mut self, env: &HelperEnv<'_>, body: HelperBody<'_, Self::Handle>) -> Result<(), CodegenError>;
}

/// At most one helper per (operation, type) pair.
pub struct InstantiationCache<B: HelperBackend> {
    backend: B,
    handles: HashMap<(LifetimeOp, TypeId), B::Handle>,
}

impl<B: HelperBackend> InstantiationCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            handles: HashMap::new(),
        }
    }

    /// The helper for `op` on `ty`, generating it on first request.
    ///
    /// Types with the same representation share helpers.
    pub fn get(&mut self, env: &HelperEnv<'_>, op: LifetimeOp, ty: TypeId) -> Result<B::Handle, CodegenError> {
        let ty = representation(env.types, env.symbols, ty);
        if let Some(handle) = self.handles.get(&(op, ty)) {
            return Ok(handle.clone());
        }

        let name = helper_name(env.ast, env.types, env.symbols, op, ty);
        debug!(helper = %name, "instantiating lifetime helper");
        let handle = self.backend.declare(&name, op, ty)?;
        self.handles.insert((op, ty), handle.clone());

        let plan = plan(env.types, env.symbols, op, ty);
        let callees = match &plan {
            LifetimePlan::Fields(steps) => steps
                .iter()
                .map(|step| self.get(env, op, step.ty))
                .collect::<Result<Vec<_>, _>>()?,
            LifetimePlan::Release(HandleKind::Array { element })
                if classify(env.types, env.symbols, *element) != TypeCategory::TriviallyCopyable =>
            {
                vec![self.get(env, LifetimeOp::Destroy, *element)?]
            }
            LifetimePlan::RetainAssign | LifetimePlan::TransferAssign => {
                vec![self.get(env, LifetimeOp::Destroy, ty)?]
            }
            _ => Vec::new(),
        };

        self.backend.define(
            env,
            HelperBody {
                handle: &handle,
                op,
                ty,
                plan: &plan,
                callees: &callees,
            },
        )?;
        Ok(handle)
    }

    /// Number of helpers generated.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::recording::RecordingBackend;
    use crate::typeck::types::BuiltinType;

    #[test]
    fn test_each_pair_is_generated_once() {
        let ast = Ast::new();
        let mut types = TypeTable::new();
        let symbols = SymbolTable::new();
        let sint = types.builtin(BuiltinType::Sint);
        let arr = types.array_of(sint);
        let env = HelperEnv {
            ast: &ast,
            types: &types,
            symbols: &symbols,
        };

        let mut cache = InstantiationCache::new(RecordingBackend::new());
        let first = cache.get(&env, LifetimeOp::Destroy, arr).unwrap();
        let second = cache.get(&env, LifetimeOp::Destroy, arr).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.backend().helpers().len(), 1);
    }

    #[test]
    fn test_nested_array_release_requests_element_destructor() {
        let ast = Ast::new();
        let mut types = TypeTable::new();
        let symbols = SymbolTable::new();
        let real = types.builtin(BuiltinType::Real);
        let inner = types.array_of(real);
        let outer = types.array_of(inner);
        let env = HelperEnv {
            ast: &ast,
            types: &types,
            symbols: &symbols,
        };

        let mut cache = InstantiationCache::new(RecordingBackend::new());
        cache.get(&env, LifetimeOp::Destroy, outer).unwrap();

        let names: Vec<_> = cache.backend().helpers().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["stela_destroy_AAreal", "stela_destroy_Areal"]);
        assert_eq!(cache.backend().helpers()[0].calls, ["stela_destroy_Areal"]);
        assert!(cache.backend().helpers()[1].calls.is_empty());
    }
}
