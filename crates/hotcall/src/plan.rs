//! Invocation plans.
//!
//! A plan is the engine's intermediate form between a validated
//! (descriptor, shape) pair and a compiled accessor: which operand goes
//! where, what each operand is checked against, what operation runs, and
//! what happens to its result. Everything that needs the registry is
//! resolved here, so lowering and invocation never consult it.

use std::sync::Arc;

use hotcall_meta::{
    native_fn, MemberDescriptor, MemberFault, MemberImpl, MemberKind, NativeFn,
    PropertyAccessorDef, TyId, TypeKind, TypeRegistry, Value,
};

use crate::error::{InvokeError, InvokeResult, Slot};
use crate::shape::{Arity, CallShape, Family, Output, Receiver};

/// How an opaque operand is narrowed to its target type.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Conversion {
    /// Target is `Object`: every value, including null, is accepted.
    Any,
    /// Target is a primitive: the value must carry exactly that primitive.
    Primitive(TyId),
    /// Target is a class or interface: null, or an instance of the target.
    Instance(TyId),
}

/// Check one operand against its target type.
#[derive(Clone, Debug)]
pub(crate) struct Coercion {
    pub slot: Slot,
    pub conversion: Conversion,
    /// Target type name, resolved when the plan is built.
    pub expected: Arc<str>,
}

impl Coercion {
    pub fn new(types: &TypeRegistry, slot: Slot, target: TyId) -> Self {
        let conversion = match types.info(target).map(|info| info.kind) {
            Some(TypeKind::Root) => Conversion::Any,
            Some(TypeKind::Primitive) => Conversion::Primitive(target),
            _ => Conversion::Instance(target),
        };
        Coercion {
            slot,
            conversion,
            expected: Arc::from(types.name_of(target)),
        }
    }

    pub fn apply(&self, value: &Value) -> InvokeResult<()> {
        let accepted = match &self.conversion {
            Conversion::Any => true,
            Conversion::Primitive(ty) => value.ty() == Some(*ty),
            Conversion::Instance(ty) => value.is_null() || value.is_instance_of(*ty),
        };
        if accepted {
            Ok(())
        } else {
            Err(self.mismatch(value))
        }
    }

    pub fn mismatch(&self, value: &Value) -> InvokeError {
        InvokeError::ArgumentTypeMismatch {
            slot: self.slot,
            expected: self.expected.to_string(),
            found: value.type_name(),
        }
    }
}

/// What happens to the receiver before the operation runs.
#[derive(Clone, Debug)]
pub(crate) enum ReceiverStep {
    /// No receiver: constructors and static members.
    Omit,
    /// Must be non-null and an instance of the declaring type. Pinned
    /// receivers are checked too: a host class newtype can wrap any object.
    Check(Coercion),
}

/// The member access itself.
#[derive(Clone)]
pub(crate) enum Operation {
    Construct(NativeFn),
    Call(NativeFn),
    Load(usize),
    Store(usize),
}

/// What happens to the operation's raw result.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ResultStep {
    /// Effect-only: the result is dropped.
    Discard,
    /// Handed back as an opaque value.
    Box,
    /// Narrowed to the pinned result type.
    Narrow { ty: TyId, expected: Arc<str> },
}

pub(crate) struct InvocationPlan {
    pub member: MemberDescriptor,
    /// Declaring type name, for receiver errors raised after the checks.
    pub owner: Arc<str>,
    pub receiver: ReceiverStep,
    pub args: Vec<Coercion>,
    pub operation: Operation,
    pub result: ResultStep,
    /// Argument count checked at call time, for dynamic shapes only.
    pub arity_guard: Option<usize>,
}

/// Build the plan for a pair that has already passed validation.
pub(crate) fn synthesize(
    types: &TypeRegistry,
    member: &MemberDescriptor,
    shape: &CallShape,
) -> InvocationPlan {
    let receiver = match shape.receiver {
        Receiver::Static => ReceiverStep::Omit,
        Receiver::Opaque | Receiver::Pinned(_) => {
            ReceiverStep::Check(Coercion::new(types, Slot::Receiver, member.declaring))
        }
    };

    let args = match shape.family() {
        Family::Setter => vec![Coercion::new(types, Slot::Assigned, member.value_ty)],
        Family::Getter => Vec::new(),
        Family::Constructor | Family::Method => member
            .params
            .iter()
            .enumerate()
            .map(|(i, &param)| Coercion::new(types, Slot::Arg(i), param))
            .collect(),
    };

    let operation = match (&member.imp, shape.family()) {
        (MemberImpl::Native(body), _) if member.kind == MemberKind::Constructor => {
            Operation::Construct(body.clone())
        }
        (MemberImpl::Native(body), _) => Operation::Call(body.clone()),
        (MemberImpl::Slot { index, .. }, Family::Setter) => Operation::Store(*index),
        (MemberImpl::Slot { index, .. }, _) => Operation::Load(*index),
        (MemberImpl::Property { setter, .. }, Family::Setter) => {
            Operation::Call(property_body(setter.as_ref()))
        }
        (MemberImpl::Property { getter, .. }, _) => {
            Operation::Call(property_body(getter.as_ref()))
        }
    };

    let result = match shape.output {
        Output::Effect => ResultStep::Discard,
        Output::Opaque => ResultStep::Box,
        Output::Pinned(ty) => ResultStep::Narrow {
            ty,
            expected: Arc::from(types.name_of(ty)),
        },
    };

    let arity_guard = match shape.arity {
        Arity::Dynamic => Some(member.arity()),
        Arity::Fixed(_) => None,
    };

    InvocationPlan {
        member: member.clone(),
        owner: Arc::from(types.name_of(member.declaring)),
        receiver,
        args,
        operation,
        result,
        arity_guard,
    }
}

/// Validation guarantees the requested half exists; a missing half lowers to
/// a body that reports the fault instead of panicking.
fn property_body(half: Option<&PropertyAccessorDef>) -> NativeFn {
    match half {
        Some(def) => def.body.clone(),
        None => native_fn(|_, _| Err(MemberFault::msg("property accessor is not defined"))),
    }
}
