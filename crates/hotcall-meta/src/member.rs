//! Member descriptors.
//!
//! A `MemberDescriptor` is the host's handle to one constructor, method,
//! field, or property. It is immutable once registered and cheap to clone.
//! Two descriptors are equal iff they identify the same member of the same
//! registry.

use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::ty::TyId;
use crate::value::Value;

/// Index of a member within its registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Constructor,
    Method,
    Field,
    Property,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Constructor => write!(f, "constructor"),
            MemberKind::Method => write!(f, "method"),
            MemberKind::Field => write!(f, "field"),
            MemberKind::Property => write!(f, "property"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    NonPublic,
}

/// A failure raised by a member's own logic.
///
/// The engine never wraps or inspects these; they reach the caller exactly
/// as the member body produced them.
#[derive(Clone)]
pub struct MemberFault(Arc<dyn Error + Send + Sync>);

impl MemberFault {
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        MemberFault(Arc::new(err))
    }

    /// A fault carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        MemberFault(Arc::new(FaultMessage(message.into())))
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for MemberFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for MemberFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Error for MemberFault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug)]
struct FaultMessage(String);

impl fmt::Display for FaultMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for FaultMessage {}

/// The native body of a constructor, method, or property accessor.
///
/// Receives the receiver (`None` for static members and constructors) and
/// the arguments, already checked against the declared parameter types.
pub type NativeFn =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, MemberFault> + Send + Sync>;

/// Wrap a closure as a `NativeFn`.
pub fn native_fn(
    body: impl Fn(Option<&Value>, &[Value]) -> Result<Value, MemberFault> + Send + Sync + 'static,
) -> NativeFn {
    Arc::new(body)
}

/// One half of a property: its body and its own visibility.
#[derive(Clone)]
pub struct PropertyAccessorDef {
    pub visibility: Visibility,
    pub body: NativeFn,
}

/// How a member is carried out.
#[derive(Clone)]
pub enum MemberImpl {
    /// Constructor or method body.
    Native(NativeFn),
    /// Instance field stored in an object slot.
    Slot { index: usize, read_only: bool },
    /// Property with optional get and set halves.
    Property {
        getter: Option<PropertyAccessorDef>,
        setter: Option<PropertyAccessorDef>,
    },
}

/// The immutable record behind a `MemberDescriptor`.
pub struct MemberInfo {
    pub id: MemberId,
    /// Id of the registry that owns this member.
    pub registry: u64,
    pub kind: MemberKind,
    pub name: String,
    pub declaring: TyId,
    /// Declared parameter types, in order. Empty for fields and properties.
    pub params: Vec<TyId>,
    /// Return or value type. `TyId::VOID` for effect-only members.
    pub value_ty: TyId,
    pub is_static: bool,
    pub visibility: Visibility,
    pub imp: MemberImpl,
}

impl MemberInfo {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// False for void methods.
    pub fn is_value_producing(&self) -> bool {
        !self.value_ty.is_void()
    }
}

/// A shared handle to a registered member.
#[derive(Clone)]
pub struct MemberDescriptor(Arc<MemberInfo>);

impl MemberDescriptor {
    pub(crate) fn new(info: MemberInfo) -> Self {
        MemberDescriptor(Arc::new(info))
    }

    /// The identity used for equality, hashing, and cache keys.
    pub fn key(&self) -> (u64, MemberId) {
        (self.0.registry, self.0.id)
    }
}

impl Deref for MemberDescriptor {
    type Target = MemberInfo;

    fn deref(&self) -> &MemberInfo {
        &self.0
    }
}

impl PartialEq for MemberDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MemberDescriptor {}

impl Hash for MemberDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("declaring", &self.0.declaring)
            .field("params", &self.0.params)
            .field("value_ty", &self.0.value_ty)
            .field("is_static", &self.0.is_static)
            .finish()
    }
}

impl fmt::Display for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.0.kind, self.0.name)
    }
}
