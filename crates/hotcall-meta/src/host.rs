//! Binding Rust types to host types.
//!
//! Typed call shapes name their receiver and result positions with Rust
//! types. `HostValue` says which host type a Rust type stands for and how to
//! move between it and an opaque `Value`. `Value` itself is the opaque
//! marker: a position typed as `Value` is left untyped.

use crate::registry::TypeRegistry;
use crate::ty::TyId;
use crate::value::{ObjectRef, Value};

pub trait HostValue: Sized + Send + Sync + 'static {
    /// True only for `Value`: the position is not pinned to a host type.
    const OPAQUE: bool = false;

    /// The host type this Rust type stands for, if `types` knows it.
    fn host_type(types: &TypeRegistry) -> Option<TyId>;

    fn to_value(&self) -> Value;

    fn into_value(self) -> Value {
        self.to_value()
    }

    /// Narrow `value` to `Self`. `ty` is the host type resolved by
    /// `host_type` when the accessor was compiled. Hands the value back on
    /// failure so the caller can report what it was.
    fn from_value(value: Value, ty: TyId) -> Result<Self, Value>;
}

impl HostValue for Value {
    const OPAQUE: bool = true;

    fn host_type(_types: &TypeRegistry) -> Option<TyId> {
        Some(TyId::OBJECT)
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value, _ty: TyId) -> Result<Self, Value> {
        Ok(value)
    }
}

impl HostValue for i64 {
    fn host_type(_types: &TypeRegistry) -> Option<TyId> {
        Some(TyId::INT)
    }

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value, _ty: TyId) -> Result<Self, Value> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl HostValue for f64 {
    fn host_type(_types: &TypeRegistry) -> Option<TyId> {
        Some(TyId::FLOAT)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value, _ty: TyId) -> Result<Self, Value> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl HostValue for bool {
    fn host_type(_types: &TypeRegistry) -> Option<TyId> {
        Some(TyId::BOOL)
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value, _ty: TyId) -> Result<Self, Value> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl HostValue for String {
    fn host_type(_types: &TypeRegistry) -> Option<TyId> {
        Some(TyId::STRING)
    }

    fn to_value(&self) -> Value {
        Value::from(self.as_str())
    }

    fn into_value(self) -> Value {
        Value::from(self)
    }

    fn from_value(value: Value, _ty: TyId) -> Result<Self, Value> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(other),
        }
    }
}

/// Any object, pinned to the root type.
impl HostValue for ObjectRef {
    fn host_type(_types: &TypeRegistry) -> Option<TyId> {
        Some(TyId::OBJECT)
    }

    fn to_value(&self) -> Value {
        Value::Object(self.clone())
    }

    fn from_value(value: Value, ty: TyId) -> Result<Self, Value> {
        match value {
            Value::Object(obj) if obj.class().is_assignable_to(ty) => Ok(obj),
            other => Err(other),
        }
    }
}

/// A nullable position: `None` is `Value::Null`.
impl<T: HostValue> HostValue for Option<T> {
    fn host_type(types: &TypeRegistry) -> Option<TyId> {
        T::host_type(types)
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Some(inner) => inner.into_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value, ty: TyId) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, ty).map(Some),
        }
    }
}

/// Declare a newtype over `ObjectRef` bound to a registered class by name.
///
/// ```
/// hotcall_meta::host_class!(pub struct Calc => "Calc");
/// ```
#[macro_export]
macro_rules! host_class {
    ($(#[$meta:meta])* $vis:vis struct $name:ident => $class:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis struct $name(pub $crate::ObjectRef);

        impl $crate::HostValue for $name {
            fn host_type(types: &$crate::TypeRegistry) -> Option<$crate::TyId> {
                types.lookup($class)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Object(self.0.clone())
            }

            fn from_value(
                value: $crate::Value,
                ty: $crate::TyId,
            ) -> Result<Self, $crate::Value> {
                match value {
                    $crate::Value::Object(obj) if obj.class().is_assignable_to(ty) => {
                        Ok($name(obj))
                    }
                    other => Err(other),
                }
            }
        }
    };
}
