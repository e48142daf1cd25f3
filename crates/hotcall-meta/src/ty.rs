//! Type identities for the host type system.
//!
//! Defines `TyId` (a copyable type handle), `TypeKind`, and `TypeInfo`, the
//! per-type record that carries its precomputed ancestor set. Assignability
//! is a set-membership test against that ancestor set, so it never walks the
//! registry and can be answered from an object's class alone.

use std::fmt;

use rustc_hash::FxHashSet;

/// A type identity, an index into the owning registry's type table.
///
/// The built-in types occupy fixed indices so they can be named without a
/// registry in hand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyId(pub u32);

impl TyId {
    /// The root type. Every non-void type is assignable to it.
    pub const OBJECT: TyId = TyId(0);
    /// The effect-only marker: the value type of void methods and setters.
    pub const VOID: TyId = TyId(1);
    /// 64-bit signed integer.
    pub const INT: TyId = TyId(2);
    /// 64-bit float.
    pub const FLOAT: TyId = TyId(3);
    /// Boolean.
    pub const BOOL: TyId = TyId(4);
    /// Immutable string.
    pub const STRING: TyId = TyId(5);

    /// Number of built-in types registered by every `TypeRegistry`.
    pub(crate) const BUILTIN_COUNT: u32 = 6;

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_void(self) -> bool {
        self == TyId::VOID
    }
}

impl fmt::Display for TyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The category a type belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `Object`, the top of the hierarchy.
    Root,
    /// `Void`, not a value type at all.
    Void,
    /// A primitive carried inline in `Value` (Int, Float, Bool, String).
    Primitive,
    /// A user class, optionally deriving from another class.
    Class,
    /// An interface a class may implement.
    Interface,
}

/// Everything the engine needs to know about a type.
///
/// `ancestors` contains the type itself, its base-class chain, every
/// interface implemented anywhere on that chain, and `Object` (unless the
/// type is `Void`). It is computed once when the type is defined.
#[derive(Debug)]
pub struct TypeInfo {
    pub id: TyId,
    pub name: String,
    pub kind: TypeKind,
    /// Direct base class, if any.
    pub base: Option<TyId>,
    ancestors: FxHashSet<TyId>,
}

impl TypeInfo {
    pub(crate) fn new(
        id: TyId,
        name: impl Into<String>,
        kind: TypeKind,
        base: Option<TyId>,
        inherited: impl IntoIterator<Item = TyId>,
    ) -> Self {
        let mut ancestors: FxHashSet<TyId> = inherited.into_iter().collect();
        ancestors.insert(id);
        if kind != TypeKind::Void {
            ancestors.insert(TyId::OBJECT);
        }
        TypeInfo {
            id,
            name: name.into(),
            kind,
            base,
            ancestors,
        }
    }

    /// Whether a value of this type may be used where `target` is expected.
    pub fn is_assignable_to(&self, target: TyId) -> bool {
        self.ancestors.contains(&target)
    }

    /// The full ancestor set (including the type itself).
    pub fn ancestors(&self) -> impl Iterator<Item = TyId> + '_ {
        self.ancestors.iter().copied()
    }

    /// Reference types accept `Null`; primitives and `Void` do not.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Root | TypeKind::Class | TypeKind::Interface
        )
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
