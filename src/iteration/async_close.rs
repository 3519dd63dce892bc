//! AsyncIteratorClose
//!
//! Closing an async iterator calls its `return()` and awaits the result. The
//! returned promise settles with the original completion once that is done;
//! an abrupt original completion wins over anything `return()` does.

use crate::error::{messages, Error, Result};
use crate::iteration::record::IteratorRecord;
use crate::promise::capability::{new_promise_capability, promise_resolve_intrinsic, PromiseCapability};
use crate::promise::reaction::{perform_promise_then, PromiseReactionType};
use crate::runtime::{BuiltinClosure, Runtime, Value};
use tracing::trace;

/// The completion an async close was started with
#[derive(Debug, Clone)]
pub enum CloseCompletion {
    Normal(Value),
    Throw(Value),
}

impl CloseCompletion {
    fn settle(&self, rt: &mut Runtime, capability: &PromiseCapability) -> Result<()> {
        match self {
            CloseCompletion::Normal(value) => capability.resolve(rt, value.clone()),
            CloseCompletion::Throw(reason) => capability.reject(rt, reason.clone()),
        }
    }

    /// Settle after `return()` failed with `error`
    fn settle_after_error(&self, rt: &mut Runtime, capability: &PromiseCapability, error: Error) -> Result<()> {
        match self {
            CloseCompletion::Throw(reason) => capability.reject(rt, reason.clone()),
            CloseCompletion::Normal(_) => {
                let reason = rt.error_to_value(error);
                capability.reject(rt, reason)
            }
        }
    }
}

/// AsyncIteratorClose, returning a promise for the completion
pub fn async_iterator_close(
    rt: &mut Runtime,
    record: &IteratorRecord,
    completion: Result<Value>,
) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let iterator = record.iterator.clone();
    let original = match completion {
        Ok(value) => CloseCompletion::Normal(value),
        Err(error) => CloseCompletion::Throw(rt.error_to_value(error)),
    };
    trace!(abrupt = matches!(original, CloseCompletion::Throw(_)), "closing async iterator");

    let inner = match rt.get_method(&iterator, "return") {
        Ok(None) => {
            original.settle(rt, &capability)?;
            return Ok(capability.promise);
        }
        Ok(Some(method)) => rt.call(&method, &iterator, &[]),
        Err(error) => Err(error),
    };
    let awaited = inner.and_then(|inner| promise_resolve_intrinsic(rt, inner));
    let awaited = match awaited {
        Ok(awaited) => awaited,
        Err(error) => {
            original.settle_after_error(rt, &capability, error)?;
            return Ok(capability.promise);
        }
    };

    let on_fulfilled = rt.new_closure(BuiltinClosure::AsyncCloseSettled {
        original: original.clone(),
        capability: capability.clone(),
        reaction_type: PromiseReactionType::Fulfill,
    });
    let on_rejected = rt.new_closure(BuiltinClosure::AsyncCloseSettled {
        original,
        capability: capability.clone(),
        reaction_type: PromiseReactionType::Reject,
    });
    perform_promise_then(rt, &awaited, &on_fulfilled, &on_rejected, None)?;
    Ok(capability.promise)
}

/// Continuation once the awaited `return()` result settles
pub(crate) fn return_settled(
    rt: &mut Runtime,
    original: &CloseCompletion,
    capability: &PromiseCapability,
    reaction_type: PromiseReactionType,
    argument: Value,
) -> Result<Value> {
    match (original, reaction_type) {
        (CloseCompletion::Throw(reason), _) => capability.reject(rt, reason.clone())?,
        (CloseCompletion::Normal(_), PromiseReactionType::Reject) => capability.reject(rt, argument)?,
        (CloseCompletion::Normal(value), PromiseReactionType::Fulfill) => {
            if argument.is_object() {
                capability.resolve(rt, value.clone())?;
            } else {
                let error = rt.error_to_value(Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT));
                capability.reject(rt, error)?;
            }
        }
    }
    Ok(Value::Undefined)
}
