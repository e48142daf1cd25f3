//! Compiled accessors.
//!
//! Each accessor type is the Rust face of one call shape. The type
//! parameters are the shape: `T` is the receiver position, `R`/`V` the
//! result or value position, `N` the fixed arity. A position typed as
//! `Value` is opaque; any other `HostValue` is pinned.
//!
//! Accessors are cheap to clone. Clones share the compiled invoker, and
//! `same_as` reports whether two handles came out of the same compilation.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use hotcall_meta::{HostValue, TyId, Value};

use crate::compile::{Compiled, Invoker};
use crate::error::{InvokeError, InvokeResult};
use crate::plan::ResultStep;

/// Result narrowing resolved at compile time.
#[derive(Clone)]
struct Narrowing {
    ty: TyId,
    expected: Arc<str>,
}

impl Narrowing {
    fn new(step: &ResultStep) -> Self {
        match step {
            ResultStep::Narrow { ty, expected } => Narrowing {
                ty: *ty,
                expected: expected.clone(),
            },
            ResultStep::Box | ResultStep::Discard => Narrowing {
                ty: TyId::OBJECT,
                expected: Arc::from("Object"),
            },
        }
    }

    #[inline]
    fn apply<R: HostValue>(&self, raw: Value) -> InvokeResult<R> {
        R::from_value(raw, self.ty).map_err(|found| InvokeError::ResultTypeMismatch {
            expected: self.expected.to_string(),
            found: found.type_name(),
        })
    }
}

macro_rules! accessor_handle {
    ($name:ident $(<$($param:ident),* $(; const $n:ident)?>)?) => {
        impl$(<$($param,)* $(const $n: usize)?>)? Clone for $name$(<$($param,)* $($n)?>)? {
            fn clone(&self) -> Self {
                $name {
                    invoker: self.invoker.clone(),
                    narrowing: self.narrowing.clone(),
                    _shape: PhantomData,
                }
            }
        }

        impl$(<$($param,)* $(const $n: usize)?>)? fmt::Debug for $name$(<$($param,)* $($n)?>)? {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("result", &&*self.narrowing.expected)
                    .finish_non_exhaustive()
            }
        }

        impl$(<$($param,)* $(const $n: usize)?>)? $name$(<$($param,)* $($n)?>)? {
            pub(crate) fn new(compiled: Compiled) -> Self {
                $name {
                    narrowing: Narrowing::new(&compiled.result),
                    invoker: compiled.invoker,
                    _shape: PhantomData,
                }
            }

            /// True when both handles share one compiled invoker.
            pub fn same_as(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.invoker, &other.invoker)
            }
        }
    };
}

// ── Constructors ───────────────────────────────────────────────────────

/// A constructor with `N` opaque arguments.
pub struct Constructor<const N: usize> {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn([Value; N]) -> Value>,
}

accessor_handle!(Constructor<; const N>);

impl<const N: usize> Constructor<N> {
    pub fn call(&self, args: [Value; N]) -> InvokeResult<Value> {
        (self.invoker)(None, &args)
    }
}

/// A constructor taking its arguments as a slice; the count is checked on
/// every call.
pub struct DynConstructor {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn(&[Value]) -> Value>,
}

accessor_handle!(DynConstructor);

impl DynConstructor {
    pub fn call(&self, args: &[Value]) -> InvokeResult<Value> {
        (self.invoker)(None, args)
    }
}

// ── Methods ────────────────────────────────────────────────────────────

/// A value-producing instance method.
pub struct Method<T, R, const N: usize> {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn(&T, [Value; N]) -> R>,
}

accessor_handle!(Method<T, R; const N>);

impl<T: HostValue, R: HostValue, const N: usize> Method<T, R, N> {
    pub fn call(&self, receiver: &T, args: [Value; N]) -> InvokeResult<R> {
        let receiver = receiver.to_value();
        let raw = (self.invoker)(Some(&receiver), &args)?;
        self.narrowing.apply(raw)
    }
}

/// A value-producing static method.
pub struct StaticMethod<R, const N: usize> {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn([Value; N]) -> R>,
}

accessor_handle!(StaticMethod<R; const N>);

impl<R: HostValue, const N: usize> StaticMethod<R, N> {
    pub fn call(&self, args: [Value; N]) -> InvokeResult<R> {
        let raw = (self.invoker)(None, &args)?;
        self.narrowing.apply(raw)
    }
}

/// An effect-only instance method.
pub struct Action<T, const N: usize> {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn(&T, [Value; N])>,
}

accessor_handle!(Action<T; const N>);

impl<T: HostValue, const N: usize> Action<T, N> {
    pub fn call(&self, receiver: &T, args: [Value; N]) -> InvokeResult<()> {
        let receiver = receiver.to_value();
        (self.invoker)(Some(&receiver), &args).map(drop)
    }
}

/// An effect-only static method.
pub struct StaticAction<const N: usize> {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn([Value; N])>,
}

accessor_handle!(StaticAction<; const N>);

impl<const N: usize> StaticAction<N> {
    pub fn call(&self, args: [Value; N]) -> InvokeResult<()> {
        (self.invoker)(None, &args).map(drop)
    }
}

// ── Fields and properties ──────────────────────────────────────────────

pub struct Getter<T, V> {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn(&T) -> V>,
}

accessor_handle!(Getter<T, V>);

impl<T: HostValue, V: HostValue> Getter<T, V> {
    pub fn get(&self, receiver: &T) -> InvokeResult<V> {
        let receiver = receiver.to_value();
        let raw = (self.invoker)(Some(&receiver), &[])?;
        self.narrowing.apply(raw)
    }
}

pub struct Setter<T, V> {
    invoker: Invoker,
    narrowing: Narrowing,
    _shape: PhantomData<fn(&T, V)>,
}

accessor_handle!(Setter<T, V>);

impl<T: HostValue, V: HostValue> Setter<T, V> {
    pub fn set(&self, receiver: &T, value: V) -> InvokeResult<()> {
        let receiver = receiver.to_value();
        (self.invoker)(Some(&receiver), &[value.into_value()]).map(drop)
    }
}

/// The getter and setter compiled for one field or property.
pub struct AccessorPair<T, V> {
    pub getter: Getter<T, V>,
    pub setter: Setter<T, V>,
}

impl<T, V> Clone for AccessorPair<T, V> {
    fn clone(&self) -> Self {
        AccessorPair {
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<T, V> fmt::Debug for AccessorPair<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorPair")
            .field("getter", &self.getter)
            .field("setter", &self.setter)
            .finish()
    }
}

impl<T, V> AccessorPair<T, V> {
    pub fn same_as(&self, other: &Self) -> bool {
        self.getter.same_as(&other.getter) && self.setter.same_as(&other.setter)
    }
}

pub type FieldAccessor<T, V> = AccessorPair<T, V>;
pub type PropertyAccessor<T, V> = AccessorPair<T, V>;
