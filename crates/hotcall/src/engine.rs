//! The engine: compile entry points over one shared accessor cache.
//!
//! Every `compile_*` call derives a call shape from the requested accessor
//! type, then goes through the cache. On the first request for a key the
//! pipeline runs once:
//!
//! ```text
//! descriptor check -> shape -> validate -> synthesize -> lower -> typed accessor
//! ```
//!
//! Later requests for the same key return the cached accessor (or the
//! cached contract error) without touching the pipeline.

use std::sync::Arc;
use std::time::Instant;

use hotcall_meta::{HostValue, MemberDescriptor, MemberKind, TypeRegistry};
use tracing::debug;

use crate::accessor::{
    AccessorPair, Action, Constructor, DynConstructor, FieldAccessor, Getter, Method,
    PropertyAccessor, Setter, StaticAction, StaticMethod,
};
use crate::cache::{AccessorCache, CacheStats};
use crate::compile::{lower, Compiled};
use crate::config::EngineConfig;
use crate::error::{CompileResult, ContractError};
use crate::plan::synthesize;
use crate::shape::{Arity, CallShape, Family};
use crate::validate::{check_descriptor, member_path, validate};

pub struct Engine {
    types: Arc<TypeRegistry>,
    config: EngineConfig,
    cache: AccessorCache,
}

impl Engine {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self::with_config(types, EngineConfig::default())
    }

    pub fn with_config(types: Arc<TypeRegistry>, config: EngineConfig) -> Self {
        let cache = AccessorCache::with_capacity(config.initial_capacity);
        Engine {
            types,
            config,
            cache,
        }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &AccessorCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get or compile the accessor `A` for `member`.
    fn compile<A>(
        &self,
        member: &MemberDescriptor,
        family: Family,
        shape: impl FnOnce(&TypeRegistry) -> CompileResult<CallShape>,
        build: impl FnOnce(Compiled) -> A,
    ) -> CompileResult<A>
    where
        A: Clone + Send + Sync + 'static,
    {
        let allow_non_public = self.config.allow_non_public;
        self.cache.get_or_compile(member, family, allow_non_public, || {
            let started = Instant::now();
            let types = &*self.types;
            let result = check_descriptor(types, member, family)
                .and_then(|()| shape(types))
                .and_then(|shape| {
                    let shape = shape.with_non_public(allow_non_public);
                    validate(types, member, &shape)?;
                    Ok(build(lower(synthesize(types, member, &shape))))
                });
            match &result {
                Ok(_) => debug!(
                    member = %member_path(types, member),
                    family = ?family,
                    arity = member.arity(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "compiled accessor"
                ),
                Err(err) => debug!(
                    member = %member_path(types, member),
                    family = ?family,
                    error = %err,
                    "call shape rejected"
                ),
            }
            result
        })
    }

    // ── Constructors ───────────────────────────────────────────────────

    /// A constructor accessor taking exactly `N` opaque arguments.
    pub fn compile_constructor<const N: usize>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<Constructor<N>> {
        self.compile(
            member,
            Family::Constructor,
            |_| Ok(CallShape::constructor::<Constructor<N>>(Arity::Fixed(N))),
            Constructor::new,
        )
    }

    /// A constructor accessor taking a slice, checked against the declared
    /// arity on every call.
    pub fn compile_dyn_constructor(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<DynConstructor> {
        self.compile(
            member,
            Family::Constructor,
            |_| Ok(CallShape::constructor::<DynConstructor>(Arity::Dynamic)),
            DynConstructor::new,
        )
    }

    // ── Methods ────────────────────────────────────────────────────────

    /// A value-producing instance method. `T = Value` leaves the receiver
    /// opaque; `R = Value` leaves the result opaque.
    pub fn compile_method<T: HostValue, R: HostValue, const N: usize>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<Method<T, R, N>> {
        self.compile(
            member,
            Family::Method,
            |types| CallShape::method::<Method<T, R, N>, T, R>(types, N),
            Method::new,
        )
    }

    pub fn compile_static_method<R: HostValue, const N: usize>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<StaticMethod<R, N>> {
        self.compile(
            member,
            Family::Method,
            |types| CallShape::static_method::<StaticMethod<R, N>, R>(types, N),
            StaticMethod::new,
        )
    }

    /// An effect-only instance method.
    pub fn compile_action<T: HostValue, const N: usize>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<Action<T, N>> {
        self.compile(
            member,
            Family::Method,
            |types| CallShape::action::<Action<T, N>, T>(types, N),
            Action::new,
        )
    }

    pub fn compile_static_action<const N: usize>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<StaticAction<N>> {
        self.compile(
            member,
            Family::Method,
            |_| Ok(CallShape::static_action::<StaticAction<N>>(N)),
            StaticAction::new,
        )
    }

    // ── Fields and properties ──────────────────────────────────────────

    pub fn compile_getter<T: HostValue, V: HostValue>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<Getter<T, V>> {
        self.compile(
            member,
            Family::Getter,
            |types| CallShape::getter::<Getter<T, V>, T, V>(types),
            Getter::new,
        )
    }

    pub fn compile_setter<T: HostValue, V: HostValue>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<Setter<T, V>> {
        self.compile(
            member,
            Family::Setter,
            |types| CallShape::setter::<Setter<T, V>, T, V>(types),
            Setter::new,
        )
    }

    /// Getter and setter for a field. Fails if either half is unavailable.
    pub fn compile_field_accessor<T: HostValue, V: HostValue>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<FieldAccessor<T, V>> {
        self.expect_kind(member, MemberKind::Field)?;
        self.compile_pair(member)
    }

    /// Getter and setter for a property. Fails if either half is
    /// unavailable.
    pub fn compile_property_accessor<T: HostValue, V: HostValue>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<PropertyAccessor<T, V>> {
        self.expect_kind(member, MemberKind::Property)?;
        self.compile_pair(member)
    }

    fn compile_pair<T: HostValue, V: HostValue>(
        &self,
        member: &MemberDescriptor,
    ) -> CompileResult<AccessorPair<T, V>> {
        Ok(AccessorPair {
            getter: self.compile_getter(member)?,
            setter: self.compile_setter(member)?,
        })
    }

    fn expect_kind(&self, member: &MemberDescriptor, kind: MemberKind) -> CompileResult<()> {
        if member.kind == kind {
            return Ok(());
        }
        Err(ContractError::InvalidArgument {
            name: "descriptor",
            reason: format!(
                "expected a {kind} but `{}` is a {}",
                member_path(&self.types, member),
                member.kind
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvokeError;
    use hotcall_meta::{MemberFault, TyId, Value};

    fn engine() -> (Engine, MemberDescriptor, MemberDescriptor, Value) {
        let mut types = TypeRegistry::new();
        let counter = types.define_class("Counter", None, &[]).unwrap();
        let count = types.field(counter, "count", TyId::INT).unwrap();
        let bump = types
            .method(counter, "bump", &[TyId::INT], TyId::VOID, |this, args| {
                let obj = this.as_object().ok_or_else(|| MemberFault::msg("no object"))?;
                let current = obj.get(0).and_then(|v| v.as_int()).unwrap_or(0);
                let by = args[0].as_int().unwrap_or(0);
                obj.set(0, Value::Int(current + by));
                Ok(Value::Null)
            })
            .unwrap();
        let obj = Value::Object(types.allocator(counter).unwrap().alloc());
        (Engine::new(Arc::new(types)), count, bump, obj)
    }

    #[test]
    fn action_mutates_receiver() {
        let (engine, count, bump, obj) = engine();
        let bump = engine.compile_action::<Value, 1>(&bump).unwrap();
        let count = engine.compile_getter::<Value, i64>(&count).unwrap();

        bump.call(&obj, [Value::Int(2)]).unwrap();
        bump.call(&obj, [Value::Int(5)]).unwrap();
        assert_eq!(count.get(&obj).unwrap(), 7);
    }

    #[test]
    fn wrong_kind_is_an_invalid_descriptor() {
        let (engine, count, bump, _) = engine();
        let err = engine.compile_property_accessor::<Value, Value>(&count).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"invalid argument `descriptor`: expected a property but `Counter.count` is a field"
        );
        let err = engine.compile_getter::<Value, Value>(&bump).unwrap_err();
        assert!(matches!(err, ContractError::InvalidArgument { name: "descriptor", .. }));
    }

    #[test]
    fn failed_compilation_is_reported_again_from_cache() {
        let (engine, _, bump, _) = engine();
        let first = engine.compile_method::<Value, Value, 1>(&bump).unwrap_err();
        let second = engine.compile_method::<Value, Value, 1>(&bump).unwrap_err();
        assert_eq!(first, second);
        assert!(matches!(first, ContractError::NotValueProducing { .. }));
        assert_eq!(engine.cache_stats().compilations, 1);
    }

    #[test]
    fn invocation_errors_do_not_poison_the_accessor() {
        let (engine, _, bump, obj) = engine();
        let bump = engine.compile_action::<Value, 1>(&bump).unwrap();
        assert!(matches!(
            bump.call(&obj, [Value::from("x")]),
            Err(InvokeError::ArgumentTypeMismatch { .. })
        ));
        assert!(bump.call(&obj, [Value::Int(1)]).is_ok());
    }

    #[test]
    fn config_sizes_the_cache() {
        let types = Arc::new(TypeRegistry::new());
        let config = EngineConfig {
            allow_non_public: true,
            initial_capacity: 4,
        };
        let engine = Engine::with_config(types, config.clone());
        assert_eq!(engine.config(), &config);
        assert!(engine.cache().is_empty());
    }
}
