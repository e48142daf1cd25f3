//! Host introspection model for hotcall.
//!
//! Provides the types the accessor engine reads but never mutates:
//!
//! - [`ty`]: type identities and ancestor sets
//! - [`value`]: opaque values and shared host objects
//! - [`member`]: member descriptors (constructors, methods, fields, properties)
//! - [`registry`]: the type registry and name-based descriptor lookup
//! - [`host`]: binding Rust types to host types for typed call shapes

pub mod error;
pub mod host;
pub mod member;
pub mod registry;
pub mod ty;
pub mod value;

pub use error::RegistryError;
pub use host::HostValue;
pub use member::{
    native_fn, MemberDescriptor, MemberFault, MemberId, MemberImpl, MemberInfo, MemberKind,
    NativeFn, PropertyAccessorDef, Visibility,
};
pub use registry::{Allocator, FieldDef, MethodDef, PropertyDef, TypeRegistry};
pub use ty::{TyId, TypeInfo, TypeKind};
pub use value::{ObjectRef, Value};
