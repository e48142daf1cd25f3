//! Errors raised while populating a `TypeRegistry`.

use thiserror::Error;

use crate::ty::TyId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type `{0}` is already defined")]
    DuplicateType(String),
    #[error("type {0} is not registered")]
    UnknownType(TyId),
    #[error("`{0}` is not a class")]
    NotAClass(String),
    #[error("`{0}` is not an interface")]
    NotAnInterface(String),
    #[error("layout of `{0}` is sealed; fields must be added before subclasses or allocators")]
    LayoutSealed(String),
    #[error("`{ty}` already has a field or property named `{name}`")]
    DuplicateMember { ty: String, name: String },
    #[error("`Void` cannot be used as a parameter or field type")]
    VoidParameter,
}
