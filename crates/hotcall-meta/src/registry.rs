//! The type registry: the host's introspection facility.
//!
//! Owns every `TypeInfo` and `MemberDescriptor`. Types and members are added
//! through `&mut self` builder calls; once populated, the registry is frozen
//! into an `Arc<TypeRegistry>` and shared read-only with the engine.
//!
//! ## Layout
//!
//! Instance fields occupy object slots. A derived class inherits its base's
//! slots as a prefix, so a class's layout is sealed as soon as it gains a
//! subclass or an allocator; adding fields afterwards is an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::member::{
    native_fn, MemberDescriptor, MemberFault, MemberId, MemberImpl, MemberInfo, MemberKind,
    NativeFn, PropertyAccessorDef, Visibility,
};
use crate::ty::{TyId, TypeInfo, TypeKind};
use crate::value::{ObjectRef, Value};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct ClassLayout {
    /// Slot types, base-class slots first.
    slots: Vec<TyId>,
    sealed: bool,
}

/// Options for a method registration.
#[derive(Clone, Debug)]
pub struct MethodDef {
    pub params: Vec<TyId>,
    pub ret: TyId,
    pub is_static: bool,
    pub visibility: Visibility,
}

impl MethodDef {
    pub fn new(params: &[TyId], ret: TyId) -> Self {
        MethodDef {
            params: params.to_vec(),
            ret,
            is_static: false,
            visibility: Visibility::Public,
        }
    }
}

/// Options for a field registration.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldDef {
    pub visibility: Visibility,
    pub read_only: bool,
}

/// Options for a property registration.
#[derive(Clone, Default)]
pub struct PropertyDef {
    pub getter: Option<PropertyAccessorDef>,
    pub setter: Option<PropertyAccessorDef>,
    pub is_static: bool,
}

impl PropertyAccessorDef {
    pub fn public(
        body: impl Fn(&Value, &[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
    ) -> Self {
        PropertyAccessorDef {
            visibility: Visibility::Public,
            body: instance_body(body),
        }
    }

    pub fn non_public(
        body: impl Fn(&Value, &[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
    ) -> Self {
        PropertyAccessorDef {
            visibility: Visibility::NonPublic,
            body: instance_body(body),
        }
    }
}

/// Allocates zero-initialized objects of one class.
#[derive(Clone)]
pub struct Allocator {
    class: Arc<TypeInfo>,
    defaults: Vec<Value>,
}

impl Allocator {
    pub fn alloc(&self) -> ObjectRef {
        ObjectRef::new(self.class.clone(), self.defaults.clone())
    }

    pub fn class(&self) -> &Arc<TypeInfo> {
        &self.class
    }
}

/// The host type system.
pub struct TypeRegistry {
    id: u64,
    types: Vec<Arc<TypeInfo>>,
    by_name: FxHashMap<String, TyId>,
    layouts: FxHashMap<TyId, ClassLayout>,
    members: Vec<MemberDescriptor>,
    members_by_type: FxHashMap<TyId, Vec<MemberId>>,
}

impl TypeRegistry {
    /// Create a registry holding only the built-in types.
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            types: Vec::new(),
            by_name: FxHashMap::default(),
            layouts: FxHashMap::default(),
            members: Vec::new(),
            members_by_type: FxHashMap::default(),
        };
        let builtins = [
            ("Object", TypeKind::Root),
            ("Void", TypeKind::Void),
            ("Int", TypeKind::Primitive),
            ("Float", TypeKind::Primitive),
            ("Bool", TypeKind::Primitive),
            ("String", TypeKind::Primitive),
        ];
        for (name, kind) in builtins {
            registry.push_type(name, kind, None, []);
        }
        debug_assert_eq!(registry.types.len() as u32, TyId::BUILTIN_COUNT);
        registry
    }

    /// Process-unique id of this registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn push_type(
        &mut self,
        name: &str,
        kind: TypeKind,
        base: Option<TyId>,
        inherited: impl IntoIterator<Item = TyId>,
    ) -> TyId {
        let id = TyId(self.types.len() as u32);
        self.types
            .push(Arc::new(TypeInfo::new(id, name, kind, base, inherited)));
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn expect_kind(&self, ty: TyId, kind: TypeKind) -> Result<&Arc<TypeInfo>, RegistryError> {
        let info = self.info(ty).ok_or(RegistryError::UnknownType(ty))?;
        if info.kind != kind {
            return Err(match kind {
                TypeKind::Interface => RegistryError::NotAnInterface(info.name.clone()),
                _ => RegistryError::NotAClass(info.name.clone()),
            });
        }
        Ok(info)
    }

    /// Define a class, optionally deriving from `base` and implementing
    /// `interfaces`. Seals the base's field layout.
    pub fn define_class(
        &mut self,
        name: &str,
        base: Option<TyId>,
        interfaces: &[TyId],
    ) -> Result<TyId, RegistryError> {
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateType(name.to_string()));
        }
        let mut inherited: Vec<TyId> = Vec::new();
        let mut slots = Vec::new();
        if let Some(base) = base {
            inherited.extend(self.expect_kind(base, TypeKind::Class)?.ancestors());
            let layout = self.layouts.entry(base).or_default();
            layout.sealed = true;
            slots = layout.slots.clone();
        }
        for &iface in interfaces {
            inherited.extend(self.expect_kind(iface, TypeKind::Interface)?.ancestors());
        }
        let id = self.push_type(name, TypeKind::Class, base, inherited);
        self.layouts.insert(
            id,
            ClassLayout {
                slots,
                sealed: false,
            },
        );
        Ok(id)
    }

    /// Define an interface extending `extends`.
    pub fn define_interface(
        &mut self,
        name: &str,
        extends: &[TyId],
    ) -> Result<TyId, RegistryError> {
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateType(name.to_string()));
        }
        let mut inherited = Vec::new();
        for &iface in extends {
            inherited.extend(self.expect_kind(iface, TypeKind::Interface)?.ancestors());
        }
        Ok(self.push_type(name, TypeKind::Interface, None, inherited))
    }

    pub fn info(&self, ty: TyId) -> Option<&Arc<TypeInfo>> {
        self.types.get(ty.index())
    }

    pub fn lookup(&self, name: &str) -> Option<TyId> {
        self.by_name.get(name).copied()
    }

    /// Display name of `ty`, or its raw id if it is not registered here.
    pub fn name_of(&self, ty: TyId) -> String {
        match self.info(ty) {
            Some(info) => info.name.clone(),
            None => ty.to_string(),
        }
    }

    /// Whether a value of type `from` may be used where `to` is expected.
    pub fn is_assignable(&self, from: TyId, to: TyId) -> bool {
        self.info(from)
            .map(|info| info.is_assignable_to(to))
            .unwrap_or(false)
    }

    /// An allocator for `ty`. Seals the class layout.
    pub fn allocator(&mut self, ty: TyId) -> Result<Allocator, RegistryError> {
        let class = self.expect_kind(ty, TypeKind::Class)?.clone();
        let layout = self.layouts.entry(ty).or_default();
        layout.sealed = true;
        Ok(Allocator {
            class,
            defaults: layout.slots.iter().map(|&t| Value::default_for(t)).collect(),
        })
    }

    // ── Members ────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn add_member(
        &mut self,
        kind: MemberKind,
        name: &str,
        declaring: TyId,
        params: Vec<TyId>,
        value_ty: TyId,
        is_static: bool,
        visibility: Visibility,
        imp: MemberImpl,
    ) -> MemberDescriptor {
        let id = MemberId(self.members.len() as u32);
        let descriptor = MemberDescriptor::new(MemberInfo {
            id,
            registry: self.id,
            kind,
            name: name.to_string(),
            declaring,
            params,
            value_ty,
            is_static,
            visibility,
            imp,
        });
        self.members.push(descriptor.clone());
        self.members_by_type.entry(declaring).or_default().push(id);
        descriptor
    }

    fn check_params(&self, params: &[TyId]) -> Result<(), RegistryError> {
        for &param in params {
            let info = self.info(param).ok_or(RegistryError::UnknownType(param))?;
            if info.kind == TypeKind::Void {
                return Err(RegistryError::VoidParameter);
            }
        }
        Ok(())
    }

    fn check_unique(&self, ty: TyId, name: &str) -> Result<(), RegistryError> {
        let taken = self
            .own_members(ty)
            .any(|m| m.name == name && matches!(m.kind, MemberKind::Field | MemberKind::Property));
        if taken {
            return Err(RegistryError::DuplicateMember {
                ty: self.name_of(ty),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Register a constructor for the class `ty`.
    pub fn constructor(
        &mut self,
        ty: TyId,
        params: &[TyId],
        body: impl Fn(&[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
    ) -> Result<MemberDescriptor, RegistryError> {
        self.expect_kind(ty, TypeKind::Class)?;
        self.check_params(params)?;
        let name = self.name_of(ty);
        Ok(self.add_member(
            MemberKind::Constructor,
            &name,
            ty,
            params.to_vec(),
            ty,
            false,
            Visibility::Public,
            MemberImpl::Native(static_body(body)),
        ))
    }

    /// Register a parameterless constructor that zero-initializes every slot.
    pub fn default_constructor(&mut self, ty: TyId) -> Result<MemberDescriptor, RegistryError> {
        let allocator = self.allocator(ty)?;
        self.constructor(ty, &[], move |_| Ok(Value::Object(allocator.alloc())))
    }

    /// Register a public instance method.
    pub fn method(
        &mut self,
        ty: TyId,
        name: &str,
        params: &[TyId],
        ret: TyId,
        body: impl Fn(&Value, &[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
    ) -> Result<MemberDescriptor, RegistryError> {
        self.method_with(ty, name, MethodDef::new(params, ret), instance_body(body))
    }

    /// Register a public static method.
    pub fn static_method(
        &mut self,
        ty: TyId,
        name: &str,
        params: &[TyId],
        ret: TyId,
        body: impl Fn(&[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
    ) -> Result<MemberDescriptor, RegistryError> {
        let def = MethodDef {
            is_static: true,
            ..MethodDef::new(params, ret)
        };
        self.method_with(ty, name, def, static_body(body))
    }

    /// Register a method with explicit options and a raw native body.
    pub fn method_with(
        &mut self,
        ty: TyId,
        name: &str,
        def: MethodDef,
        body: NativeFn,
    ) -> Result<MemberDescriptor, RegistryError> {
        self.info(ty).ok_or(RegistryError::UnknownType(ty))?;
        self.check_params(&def.params)?;
        self.info(def.ret).ok_or(RegistryError::UnknownType(def.ret))?;
        Ok(self.add_member(
            MemberKind::Method,
            name,
            ty,
            def.params,
            def.ret,
            def.is_static,
            def.visibility,
            MemberImpl::Native(body),
        ))
    }

    /// Register a public, writable instance field.
    pub fn field(
        &mut self,
        ty: TyId,
        name: &str,
        field_ty: TyId,
    ) -> Result<MemberDescriptor, RegistryError> {
        self.field_with(ty, name, field_ty, FieldDef::default())
    }

    /// Register an instance field with explicit options. Allocates the next
    /// slot of the class layout.
    pub fn field_with(
        &mut self,
        ty: TyId,
        name: &str,
        field_ty: TyId,
        def: FieldDef,
    ) -> Result<MemberDescriptor, RegistryError> {
        let class_name = self.expect_kind(ty, TypeKind::Class)?.name.clone();
        self.check_params(&[field_ty])?;
        self.check_unique(ty, name)?;
        let layout = self.layouts.entry(ty).or_default();
        if layout.sealed {
            return Err(RegistryError::LayoutSealed(class_name));
        }
        let index = layout.slots.len();
        layout.slots.push(field_ty);
        Ok(self.add_member(
            MemberKind::Field,
            name,
            ty,
            Vec::new(),
            field_ty,
            false,
            def.visibility,
            MemberImpl::Slot {
                index,
                read_only: def.read_only,
            },
        ))
    }

    /// Register a property. Its visibility is the most visible of its halves.
    pub fn property(
        &mut self,
        ty: TyId,
        name: &str,
        value_ty: TyId,
        def: PropertyDef,
    ) -> Result<MemberDescriptor, RegistryError> {
        self.info(ty).ok_or(RegistryError::UnknownType(ty))?;
        self.check_params(&[value_ty])?;
        self.check_unique(ty, name)?;
        let visibility = if [&def.getter, &def.setter]
            .into_iter()
            .flatten()
            .any(|half| half.visibility == Visibility::Public)
        {
            Visibility::Public
        } else {
            Visibility::NonPublic
        };
        Ok(self.add_member(
            MemberKind::Property,
            name,
            ty,
            Vec::new(),
            value_ty,
            def.is_static,
            visibility,
            MemberImpl::Property {
                getter: def.getter,
                setter: def.setter,
            },
        ))
    }

    // ── Lookup ─────────────────────────────────────────────────────────

    /// Members declared directly on `ty`.
    pub fn own_members(&self, ty: TyId) -> impl Iterator<Item = &MemberDescriptor> + '_ {
        self.members_by_type
            .get(&ty)
            .into_iter()
            .flatten()
            .map(move |id| &self.members[id.0 as usize])
    }

    /// Members visible on `ty`: its own, then each base class's in turn.
    pub fn members(&self, ty: TyId) -> impl Iterator<Item = &MemberDescriptor> + '_ {
        std::iter::successors(Some(ty), move |t| self.info(*t).and_then(|info| info.base))
            .flat_map(move |t| self.own_members(t))
    }

    pub fn member(&self, id: MemberId) -> Option<&MemberDescriptor> {
        self.members.get(id.0 as usize)
    }

    /// The constructor of `ty` whose parameter list is exactly `params`.
    pub fn find_constructor(&self, ty: TyId, params: &[TyId]) -> Option<MemberDescriptor> {
        self.own_members(ty)
            .find(|m| m.kind == MemberKind::Constructor && m.params == params)
            .cloned()
    }

    /// The first method named `name` visible on `ty`.
    pub fn find_method(&self, ty: TyId, name: &str) -> Option<MemberDescriptor> {
        self.members(ty)
            .find(|m| m.kind == MemberKind::Method && m.name == name)
            .cloned()
    }

    /// The method named `name` visible on `ty` with exactly `params`.
    pub fn find_method_overload(
        &self,
        ty: TyId,
        name: &str,
        params: &[TyId],
    ) -> Option<MemberDescriptor> {
        self.members(ty)
            .find(|m| m.kind == MemberKind::Method && m.name == name && m.params == params)
            .cloned()
    }

    pub fn find_field(&self, ty: TyId, name: &str) -> Option<MemberDescriptor> {
        self.members(ty)
            .find(|m| m.kind == MemberKind::Field && m.name == name)
            .cloned()
    }

    pub fn find_property(&self, ty: TyId, name: &str) -> Option<MemberDescriptor> {
        self.members(ty)
            .find(|m| m.kind == MemberKind::Property && m.name == name)
            .cloned()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn static_body(
    body: impl Fn(&[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
) -> NativeFn {
    native_fn(move |_receiver, args| body(args))
}

fn instance_body(
    body: impl Fn(&Value, &[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
) -> NativeFn {
    native_fn(move |receiver, args| match receiver {
        Some(receiver) => body(receiver, args),
        None => Err(MemberFault::msg("instance member invoked without a receiver")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.lookup("Object"), Some(TyId::OBJECT));
        assert_eq!(reg.lookup("Void"), Some(TyId::VOID));
        assert_eq!(reg.lookup("String"), Some(TyId::STRING));
        assert!(reg.is_assignable(TyId::INT, TyId::OBJECT));
        assert!(!reg.is_assignable(TyId::VOID, TyId::OBJECT));
    }

    #[test]
    fn registries_have_distinct_ids() {
        assert_ne!(TypeRegistry::new().id(), TypeRegistry::new().id());
    }

    #[test]
    fn class_hierarchy_assignability() {
        let mut reg = TypeRegistry::new();
        let shape = reg.define_interface("Shape", &[]).unwrap();
        let base = reg.define_class("Base", None, &[shape]).unwrap();
        let derived = reg.define_class("Derived", Some(base), &[]).unwrap();

        assert!(reg.is_assignable(derived, base));
        assert!(reg.is_assignable(derived, shape));
        assert!(reg.is_assignable(derived, TyId::OBJECT));
        assert!(!reg.is_assignable(base, derived));
        assert!(!reg.is_assignable(shape, base));
    }

    #[test]
    fn duplicate_type_rejected() {
        let mut reg = TypeRegistry::new();
        reg.define_class("Calc", None, &[]).unwrap();
        let err = reg.define_class("Calc", None, &[]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType(name) if name == "Calc"));
    }

    #[test]
    fn base_must_be_a_class() {
        let mut reg = TypeRegistry::new();
        let err = reg.define_class("Bad", Some(TyId::INT), &[]).unwrap_err();
        assert!(matches!(err, RegistryError::NotAClass(_)));
    }

    #[test]
    fn derived_layout_extends_base() {
        let mut reg = TypeRegistry::new();
        let base = reg.define_class("Base", None, &[]).unwrap();
        let x = reg.field(base, "x", TyId::INT).unwrap();
        let derived = reg.define_class("Derived", Some(base), &[]).unwrap();
        let y = reg.field(derived, "y", TyId::STRING).unwrap();

        assert!(matches!(x.imp, MemberImpl::Slot { index: 0, .. }));
        assert!(matches!(y.imp, MemberImpl::Slot { index: 1, .. }));

        let obj = reg.allocator(derived).unwrap().alloc();
        assert_eq!(obj.fields(), vec![Value::Int(0), Value::Null]);
    }

    #[test]
    fn sealed_layout_rejects_fields() {
        let mut reg = TypeRegistry::new();
        let base = reg.define_class("Base", None, &[]).unwrap();
        reg.define_class("Derived", Some(base), &[]).unwrap();
        let err = reg.field(base, "late", TyId::INT).unwrap_err();
        assert!(matches!(err, RegistryError::LayoutSealed(name) if name == "Base"));
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut reg = TypeRegistry::new();
        let ty = reg.define_class("Point", None, &[]).unwrap();
        reg.field(ty, "x", TyId::INT).unwrap();
        assert!(matches!(
            reg.field(ty, "x", TyId::INT),
            Err(RegistryError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn void_parameter_rejected() {
        let mut reg = TypeRegistry::new();
        let ty = reg.define_class("Calc", None, &[]).unwrap();
        let err = reg
            .method(ty, "bad", &[TyId::VOID], TyId::INT, |_, _| Ok(Value::Int(0)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::VoidParameter));
    }

    #[test]
    fn lookup_walks_base_classes() {
        let mut reg = TypeRegistry::new();
        let base = reg.define_class("Base", None, &[]).unwrap();
        reg.method(base, "name", &[], TyId::STRING, |_, _| Ok(Value::from("base")))
            .unwrap();
        reg.field(base, "x", TyId::INT).unwrap();
        let derived = reg.define_class("Derived", Some(base), &[]).unwrap();

        let method = reg.find_method(derived, "name").unwrap();
        assert_eq!(method.declaring, base);
        assert!(reg.find_field(derived, "x").is_some());
        assert!(reg.find_field(derived, "y").is_none());
        assert!(reg.find_property(derived, "x").is_none());
    }

    #[test]
    fn overloads_are_distinguished_by_params() {
        let mut reg = TypeRegistry::new();
        let ty = reg.define_class("Calc", None, &[]).unwrap();
        reg.method(ty, "add", &[TyId::INT], TyId::INT, |_, _| Ok(Value::Int(1)))
            .unwrap();
        let two = reg
            .method(ty, "add", &[TyId::INT, TyId::INT], TyId::INT, |_, _| Ok(Value::Int(2)))
            .unwrap();
        assert_eq!(
            reg.find_method_overload(ty, "add", &[TyId::INT, TyId::INT]),
            Some(two)
        );
    }

    #[test]
    fn default_constructor_allocates() {
        let mut reg = TypeRegistry::new();
        let ty = reg.define_class("Point", None, &[]).unwrap();
        reg.field(ty, "x", TyId::INT).unwrap();
        let ctor = reg.default_constructor(ty).unwrap();
        assert_eq!(reg.find_constructor(ty, &[]), Some(ctor.clone()));

        let MemberImpl::Native(body) = &ctor.imp else {
            panic!("constructor should have a native body");
        };
        let value = body(None, &[]).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.class().id, ty);
        assert_eq!(obj.fields(), vec![Value::Int(0)]);
    }

    #[test]
    fn property_visibility_is_most_visible_half() {
        let mut reg = TypeRegistry::new();
        let ty = reg.define_class("Account", None, &[]).unwrap();
        let prop = reg
            .property(
                ty,
                "balance",
                TyId::INT,
                PropertyDef {
                    getter: Some(PropertyAccessorDef::public(|_, _| Ok(Value::Int(0)))),
                    setter: Some(PropertyAccessorDef::non_public(|_, _| Ok(Value::Null))),
                    is_static: false,
                },
            )
            .unwrap();
        assert_eq!(prop.visibility, Visibility::Public);
    }

    #[test]
    fn registry_error_messages() {
        let mut reg = TypeRegistry::new();
        let base = reg.define_class("Base", None, &[]).unwrap();
        reg.field(base, "x", TyId::INT).unwrap();

        let err = reg.define_class("Base", None, &[]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"type `Base` is already defined");

        let err = reg.define_class("Bad", Some(TyId::INT), &[]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"`Int` is not a class");

        let err = reg.define_class("Bad", None, &[base]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"`Base` is not an interface");

        let err = reg.field(base, "x", TyId::INT).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"`Base` already has a field or property named `x`"
        );

        let err = reg.field(base, "y", TyId::VOID).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"`Void` cannot be used as a parameter or field type"
        );

        reg.define_class("Derived", Some(base), &[]).unwrap();
        let err = reg.field(base, "late", TyId::INT).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"layout of `Base` is sealed; fields must be added before subclasses or allocators"
        );
    }
}
