//! Engine errors.
//!
//! Two families, raised at different times:
//!
//! - [`ContractError`]: the (descriptor, call shape) pair is invalid. Raised
//!   while compiling, before any plan is built, and cached with the key so a
//!   repeated request reports the same outcome without recompiling.
//! - [`InvokeError`]: a compiled accessor rejected one invocation, or the
//!   member's own body failed. Member faults pass through unchanged.

use std::fmt;

use hotcall_meta::MemberFault;
use thiserror::Error;

pub type CompileResult<T> = Result<T, ContractError>;
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Which half of a field or property an accessor binds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessorHalf {
    Get,
    Set,
}

impl fmt::Display for AccessorHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessorHalf::Get => write!(f, "getter"),
            AccessorHalf::Set => write!(f, "setter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The descriptor is unusable here: wrong kind, or owned by another registry.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("`{member}` takes {expected} parameters but the call shape supplies {actual}")]
    ArityMismatch {
        member: String,
        expected: usize,
        actual: usize,
    },
    #[error("call shapes support at most {max} fixed arguments, got {arity}")]
    UnsupportedArity { arity: usize, max: usize },
    #[error("`{member}` returns Void but a value-producing shape was requested")]
    NotValueProducing { member: String },
    #[error("`{member}` returns {value_ty} but an effect-only shape was requested")]
    NotEffectOnly { member: String, value_ty: String },
    #[error("`{member}` is static but the call shape passes a receiver")]
    StaticMemberRejected { member: String },
    #[error("`{member}` is an instance member but the call shape has no receiver")]
    ReceiverRequired { member: String },
    #[error("receiver type {receiver} is not assignable to declaring type {declaring}")]
    ReceiverTypeMismatch { declaring: String, receiver: String },
    #[error("value type {value_ty} is not assignable to result type {result}")]
    ResultTypeMismatch { value_ty: String, result: String },
    #[error("assigned type {assigned} is not assignable to value type {value_ty}")]
    ValueTypeMismatch { value_ty: String, assigned: String },
    #[error("`{member}` has no {half}")]
    AccessorMissing { member: String, half: AccessorHalf },
    #[error("the {half} of `{member}` is not public")]
    AccessorNotPublic { member: String, half: AccessorHalf },
    #[error("Rust type `{rust_type}` is not bound to a registered host type")]
    UnknownHostType { rust_type: &'static str },
}

/// The operand position an invocation error refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Receiver,
    Arg(usize),
    /// The value handed to a setter.
    Assigned,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Receiver => write!(f, "receiver"),
            Slot::Arg(i) => write!(f, "argument {i}"),
            Slot::Assigned => write!(f, "assigned value"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("{slot} expected {expected}, found {found}")]
    ArgumentTypeMismatch {
        slot: Slot,
        expected: String,
        found: String,
    },
    #[error("receiver is null")]
    NullReceiver,
    #[error("expected {expected} arguments, received {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("result expected {expected}, found {found}")]
    ResultTypeMismatch { expected: String, found: String },
    /// Raised by the member itself.
    #[error(transparent)]
    Member(#[from] MemberFault),
}
