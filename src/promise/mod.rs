//! Promises
//!
//! The promise state machine, capabilities, reactions, the combinators and
//! the `Promise` built-ins. Settlement never runs user code directly: every
//! handler is delivered through a job on the runtime's queue.

pub mod builtins;
pub mod capability;
pub mod combinators;
pub mod reaction;
pub mod state;

pub use capability::{new_promise_capability, promise_resolve, promise_resolve_intrinsic, PromiseCapability};
pub use combinators::{
    get_promise_resolve, perform_promise_all, perform_promise_all_settled, perform_promise_any,
    perform_promise_race, promise_combinator, CombinatorKind,
};
pub use reaction::{perform_promise_then, PromiseReaction, PromiseReactionType, ReactionHandler};
pub use state::{
    create_resolving_functions, is_promise, new_promise, promise_is_handled, promise_result,
    promise_state, PromiseData, PromiseState,
};

use crate::error::Result;
use crate::runtime::{Runtime, Value};

/// `promise.then(onFulfilled, onRejected)` through the property lookup
pub fn promise_then(
    rt: &mut Runtime,
    promise: &Value,
    on_fulfilled: Value,
    on_rejected: Value,
) -> Result<Value> {
    rt.invoke(promise, "then", &[on_fulfilled, on_rejected])
}

/// Create a promise already fulfilled with `value`
pub fn resolved_promise(rt: &mut Runtime, value: Value) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    capability.resolve(rt, value)?;
    Ok(capability.promise)
}

/// Create a promise already rejected with `reason`
pub fn rejected_promise(rt: &mut Runtime, reason: Value) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    capability.reject(rt, reason)?;
    Ok(capability.promise)
}
