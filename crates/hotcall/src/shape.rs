//! Call shapes: how a caller wants to invoke a member.
//!
//! A shape is derived from the Rust signature of the accessor the caller
//! asks for. Positions typed as `Value` are opaque; positions typed with any
//! other `HostValue` are pinned to that host type. The shape's identity is
//! the `TypeId` of the accessor type, so two call sites asking for the same
//! signature share one cache entry.

use std::any::{type_name, TypeId};

use hotcall_meta::{HostValue, TyId, TypeRegistry};

use crate::error::{CompileResult, ContractError};

/// Largest fixed arity a call shape may request.
pub const MAX_ARITY: usize = 9;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    Constructor,
    /// Methods, value-producing or effect-only.
    Method,
    Getter,
    Setter,
}

/// How the receiver is passed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// No receiver: constructors and static methods.
    Static,
    Opaque,
    Pinned(TyId),
}

/// What the accessor hands back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Output {
    /// Nothing: void methods and setters.
    Effect,
    Opaque,
    Pinned(TyId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arity {
    Fixed(usize),
    /// Argument count is known only at call time.
    Dynamic,
}

/// Run-time identity of a requested call shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId {
    pub family: Family,
    pub signature: TypeId,
}

impl ShapeId {
    /// Identity of the accessor type `A` within `family`.
    pub fn of<A: 'static>(family: Family) -> Self {
        ShapeId {
            family,
            signature: TypeId::of::<A>(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallShape {
    pub id: ShapeId,
    pub receiver: Receiver,
    pub output: Output,
    /// Pinned type of the value a setter accepts. `None` when opaque or not
    /// a setter.
    pub assigned: Option<TyId>,
    pub arity: Arity,
    /// Whether non-public field and property accessors may be bound.
    pub allow_non_public: bool,
}

fn pin<T: HostValue>(types: &TypeRegistry) -> CompileResult<Option<TyId>> {
    if T::OPAQUE {
        return Ok(None);
    }
    T::host_type(types)
        .map(Some)
        .ok_or(ContractError::UnknownHostType {
            rust_type: type_name::<T>(),
        })
}

fn receiver<T: HostValue>(types: &TypeRegistry) -> CompileResult<Receiver> {
    Ok(match pin::<T>(types)? {
        Some(ty) => Receiver::Pinned(ty),
        None => Receiver::Opaque,
    })
}

fn output<R: HostValue>(types: &TypeRegistry) -> CompileResult<Output> {
    Ok(match pin::<R>(types)? {
        Some(ty) => Output::Pinned(ty),
        None => Output::Opaque,
    })
}

impl CallShape {
    fn new(id: ShapeId, receiver: Receiver, output: Output, arity: Arity) -> Self {
        CallShape {
            id,
            receiver,
            output,
            assigned: None,
            arity,
            allow_non_public: false,
        }
    }

    pub fn with_non_public(mut self, allow: bool) -> Self {
        self.allow_non_public = allow;
        self
    }

    /// Opaque arguments, opaque result.
    pub fn constructor<A: 'static>(arity: Arity) -> Self {
        CallShape::new(
            ShapeId::of::<A>(Family::Constructor),
            Receiver::Static,
            Output::Opaque,
            arity,
        )
    }

    pub fn method<A: 'static, T: HostValue, R: HostValue>(
        types: &TypeRegistry,
        arity: usize,
    ) -> CompileResult<Self> {
        Ok(CallShape::new(
            ShapeId::of::<A>(Family::Method),
            receiver::<T>(types)?,
            output::<R>(types)?,
            Arity::Fixed(arity),
        ))
    }

    pub fn static_method<A: 'static, R: HostValue>(
        types: &TypeRegistry,
        arity: usize,
    ) -> CompileResult<Self> {
        Ok(CallShape::new(
            ShapeId::of::<A>(Family::Method),
            Receiver::Static,
            output::<R>(types)?,
            Arity::Fixed(arity),
        ))
    }

    pub fn action<A: 'static, T: HostValue>(
        types: &TypeRegistry,
        arity: usize,
    ) -> CompileResult<Self> {
        Ok(CallShape::new(
            ShapeId::of::<A>(Family::Method),
            receiver::<T>(types)?,
            Output::Effect,
            Arity::Fixed(arity),
        ))
    }

    pub fn static_action<A: 'static>(arity: usize) -> Self {
        CallShape::new(
            ShapeId::of::<A>(Family::Method),
            Receiver::Static,
            Output::Effect,
            Arity::Fixed(arity),
        )
    }

    pub fn getter<A: 'static, T: HostValue, V: HostValue>(
        types: &TypeRegistry,
    ) -> CompileResult<Self> {
        Ok(CallShape::new(
            ShapeId::of::<A>(Family::Getter),
            receiver::<T>(types)?,
            output::<V>(types)?,
            Arity::Fixed(0),
        ))
    }

    pub fn setter<A: 'static, T: HostValue, V: HostValue>(
        types: &TypeRegistry,
    ) -> CompileResult<Self> {
        let mut shape = CallShape::new(
            ShapeId::of::<A>(Family::Setter),
            receiver::<T>(types)?,
            Output::Effect,
            Arity::Fixed(1),
        );
        shape.assigned = pin::<V>(types)?;
        Ok(shape)
    }

    pub fn family(&self) -> Family {
        self.id.family
    }

    pub fn is_value_producing(&self) -> bool {
        self.output != Output::Effect
    }
}
