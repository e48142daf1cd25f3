//! Opaque runtime values and host objects.
//!
//! `Value` is what crosses an opaque call shape: every argument, receiver
//! and result of an untyped accessor is a `Value`. Objects are shared,
//! thread-safe handles whose field slots sit behind a `parking_lot` lock so
//! compiled accessors may be invoked from any thread without extra
//! synchronization.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ty::{TyId, TypeInfo};

/// An opaque host value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<str>),
    Object(ObjectRef),
}

impl Value {
    /// The dynamic type of this value. `Null` has none.
    pub fn ty(&self) -> Option<TyId> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(TyId::INT),
            Value::Float(_) => Some(TyId::FLOAT),
            Value::Bool(_) => Some(TyId::BOOL),
            Value::Str(_) => Some(TyId::STRING),
            Value::Object(obj) => Some(obj.class().id),
        }
    }

    /// Human-readable name of the dynamic type, for error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Object(obj) => obj.class().name.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value's dynamic type is `target` or derives from it.
    /// `Null` is an instance of nothing.
    pub fn is_instance_of(&self, target: TyId) -> bool {
        match self {
            Value::Null => false,
            Value::Object(obj) => obj.class().is_assignable_to(target),
            primitive => target == TyId::OBJECT || primitive.ty() == Some(target),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The zero value a freshly allocated slot of type `ty` holds.
    pub fn default_for(ty: TyId) -> Value {
        match ty {
            TyId::INT => Value::Int(0),
            TyId::FLOAT => Value::Float(0.0),
            TyId::BOOL => Value::Bool(false),
            _ => Value::Null,
        }
    }
}

/// Primitives compare by value, objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Object(obj) => write!(f, "{obj}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

// ---------------------------------------------------------------------------
// ObjectRef
// ---------------------------------------------------------------------------

struct Object {
    class: Arc<TypeInfo>,
    slots: RwLock<Vec<Value>>,
}

/// A shared handle to a host object.
///
/// Cloning the handle aliases the same object. The class is carried by
/// value so instance-of checks need no registry access.
#[derive(Clone)]
pub struct ObjectRef(Arc<Object>);

impl ObjectRef {
    /// Allocate an object of `class` with the given initial slot values.
    pub fn new(class: Arc<TypeInfo>, slots: Vec<Value>) -> Self {
        ObjectRef(Arc::new(Object {
            class,
            slots: RwLock::new(slots),
        }))
    }

    pub fn class(&self) -> &TypeInfo {
        &self.0.class
    }

    /// Read a field slot. `None` if the slot does not exist.
    pub fn get(&self, slot: usize) -> Option<Value> {
        self.0.slots.read().get(slot).cloned()
    }

    /// Overwrite a field slot. Returns `false` if the slot does not exist.
    pub fn set(&self, slot: usize, value: Value) -> bool {
        match self.0.slots.write().get_mut(slot) {
            Some(current) => {
                *current = value;
                true
            }
            None => false,
        }
    }

    /// A snapshot of every slot, in layout order.
    pub fn fields(&self) -> Vec<Value> {
        self.0.slots.read().clone()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("class", &self.0.class.name)
            .field("slots", &*self.0.slots.read())
            .finish()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.0.class.name)?;
        for (i, value) in self.0.slots.read().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {value}")?;
        }
        write!(f, " }}")
    }
}
