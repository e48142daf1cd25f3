//! Lowering an invocation plan into an executable invoker.
//!
//! The invoker is a closure specialized on the plan's operation. It owns
//! only immutable data resolved during synthesis (coercions, slot indices,
//! the member body), so it can be called concurrently from any thread and
//! never looks at the descriptor or the registry again.

use std::sync::Arc;

use hotcall_meta::{ObjectRef, Value};
use tracing::trace;

use crate::error::{InvokeError, InvokeResult, Slot};
use crate::plan::{Coercion, InvocationPlan, Operation, ReceiverStep, ResultStep};

/// Uniform calling convention shared by every accessor shape: an optional
/// receiver and a slice of opaque operands.
pub(crate) type Invoker =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> InvokeResult<Value> + Send + Sync>;

/// A lowered plan: the invoker plus the result handling the typed wrapper
/// applies on top of it.
pub(crate) struct Compiled {
    pub invoker: Invoker,
    pub result: ResultStep,
}

/// Receiver handling, argument coercion and the dynamic arity guard: the
/// part of every invocation that runs before the member access.
struct Prelude {
    receiver: ReceiverStep,
    args: Box<[Coercion]>,
    arity_guard: Option<usize>,
}

impl Prelude {
    #[inline]
    fn run<'a>(
        &self,
        receiver: Option<&'a Value>,
        values: &[Value],
    ) -> InvokeResult<Option<&'a Value>> {
        if let Some(expected) = self.arity_guard {
            if values.len() != expected {
                return Err(InvokeError::ArityMismatch {
                    expected,
                    actual: values.len(),
                });
            }
        }
        let receiver = match &self.receiver {
            ReceiverStep::Omit => None,
            ReceiverStep::Check(coercion) => {
                let receiver = non_null(receiver)?;
                coercion.apply(receiver)?;
                Some(receiver)
            }
        };
        for (coercion, value) in self.args.iter().zip(values) {
            coercion.apply(value)?;
        }
        Ok(receiver)
    }
}

fn invoker(
    f: impl Fn(Option<&Value>, &[Value]) -> InvokeResult<Value> + Send + Sync + 'static,
) -> Invoker {
    Arc::new(f)
}

fn non_null(receiver: Option<&Value>) -> InvokeResult<&Value> {
    match receiver {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(InvokeError::NullReceiver),
    }
}

fn object<'a>(receiver: Option<&'a Value>, owner: &str) -> InvokeResult<&'a ObjectRef> {
    match receiver {
        Some(Value::Object(obj)) => Ok(obj),
        Some(other) => Err(InvokeError::ArgumentTypeMismatch {
            slot: Slot::Receiver,
            expected: owner.to_string(),
            found: other.type_name(),
        }),
        None => Err(InvokeError::NullReceiver),
    }
}

pub(crate) fn lower(plan: InvocationPlan) -> Compiled {
    let InvocationPlan {
        member,
        owner,
        receiver,
        args,
        operation,
        result,
        arity_guard,
    } = plan;
    trace!(
        member = %member,
        args = args.len(),
        dynamic = arity_guard.is_some(),
        "lowering invocation plan"
    );

    let prelude = Prelude {
        receiver,
        args: args.into_boxed_slice(),
        arity_guard,
    };

    let invoker: Invoker = match operation {
        Operation::Construct(body) | Operation::Call(body) => {
            invoker(move |receiver, values| {
                let receiver = prelude.run(receiver, values)?;
                body(receiver, values).map_err(InvokeError::Member)
            })
        }
        Operation::Load(slot) => invoker(move |receiver, values| {
            let receiver = prelude.run(receiver, values)?;
            let obj = object(receiver, &owner)?;
            obj.get(slot).ok_or_else(|| InvokeError::ArgumentTypeMismatch {
                slot: Slot::Receiver,
                expected: owner.to_string(),
                found: obj.class().name.clone(),
            })
        }),
        Operation::Store(slot) => invoker(move |receiver, values| {
            let receiver = prelude.run(receiver, values)?;
            let obj = object(receiver, &owner)?;
            let value = values.first().cloned().unwrap_or(Value::Null);
            if obj.set(slot, value) {
                Ok(Value::Null)
            } else {
                Err(InvokeError::ArgumentTypeMismatch {
                    slot: Slot::Receiver,
                    expected: owner.to_string(),
                    found: obj.class().name.clone(),
                })
            }
        }),
    };

    Compiled { invoker, result }
}
