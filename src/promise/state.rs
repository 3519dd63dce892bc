//! Promise objects and their state machine
//!
//! A promise starts pending and settles at most once. Resolution goes through
//! a pair of resolving functions that share an "already resolved" flag; the
//! first call wins and later calls are reported to the rejection tracker and
//! otherwise ignored.

use crate::error::{messages, ErrorKind, Result};
use crate::event_loop::{JobKind, RejectionOperation};
use crate::promise::reaction::{self, PromiseReaction};
use crate::runtime::{BuiltinClosure, ObjectKind, ObjectRef, Runtime, Value};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

/// Promise state enum
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PromiseState {
    /// Promise is pending - not yet settled
    Pending,
    /// Promise is fulfilled with a value
    Fulfilled,
    /// Promise is rejected with a reason
    Rejected,
}

/// Internal slots of a promise object
#[derive(Debug)]
pub struct PromiseData {
    /// Current state of the promise
    pub state: PromiseState,
    /// The settled value (fulfillment value or rejection reason)
    pub result: Value,
    /// Reactions to run on fulfillment, in registration order
    pub fulfill_reactions: Vec<PromiseReaction>,
    /// Reactions to run on rejection, in registration order
    pub reject_reactions: Vec<PromiseReaction>,
    /// Whether a handler has ever been attached
    pub is_handled: bool,
}

impl PromiseData {
    pub fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            result: Value::Undefined,
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            is_handled: false,
        }
    }
}

impl Default for PromiseData {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn with_promise_data<R>(promise: &Value, f: impl FnOnce(&PromiseData) -> R) -> Option<R> {
    let Value::Object(obj) = promise else {
        return None;
    };
    let obj = obj.borrow();
    match &obj.kind {
        ObjectKind::Promise(data) => Some(f(data)),
        _ => None,
    }
}

pub(crate) fn with_promise_data_mut<R>(
    promise: &Value,
    f: impl FnOnce(&mut PromiseData) -> R,
) -> Option<R> {
    let Value::Object(obj) = promise else {
        return None;
    };
    let mut obj = obj.borrow_mut();
    match &mut obj.kind {
        ObjectKind::Promise(data) => Some(f(data)),
        _ => None,
    }
}

/// IsPromise
pub fn is_promise(value: &Value) -> bool {
    with_promise_data(value, |_| ()).is_some()
}

/// State of a promise, or `None` for non-promises
pub fn promise_state(value: &Value) -> Option<PromiseState> {
    with_promise_data(value, |data| data.state)
}

/// Settled value of a promise (undefined while pending)
pub fn promise_result(value: &Value) -> Option<Value> {
    with_promise_data(value, |data| data.result.clone())
}

/// Whether a handler has been attached to the promise
pub fn promise_is_handled(value: &Value) -> Option<bool> {
    with_promise_data(value, |data| data.is_handled)
}

/// Allocate a pending promise with the given prototype
pub(crate) fn alloc_promise(rt: &mut Runtime, prototype: ObjectRef) -> Value {
    rt.event_loop_mut().record_promise_created();
    rt.alloc(ObjectKind::Promise(PromiseData::new()), Some(prototype))
}

/// Create a pending promise of the current realm
pub fn new_promise(rt: &mut Runtime) -> Value {
    let proto = rt.intrinsics().promise_prototype.clone();
    alloc_promise(rt, proto)
}

/// CreateResolvingFunctions
///
/// Returns `(resolve, reject)` sharing one "already resolved" flag.
pub fn create_resolving_functions(rt: &mut Runtime, promise: &Value) -> (Value, Value) {
    let already_resolved = Rc::new(Cell::new(false));
    let resolve = rt.new_closure(BuiltinClosure::PromiseResolveFunction {
        promise: promise.clone(),
        already_resolved: already_resolved.clone(),
    });
    let reject = rt.new_closure(BuiltinClosure::PromiseRejectFunction {
        promise: promise.clone(),
        already_resolved,
    });
    (resolve, reject)
}

/// Body of a promise resolve function
pub(crate) fn resolve_function(
    rt: &mut Runtime,
    promise: &Value,
    already_resolved: &Rc<Cell<bool>>,
    resolution: Value,
) -> Result<Value> {
    if already_resolved.get() {
        rt.host_promise_rejection_tracker(promise, RejectionOperation::ResolveAfterResolved);
        return Ok(Value::Undefined);
    }
    already_resolved.set(true);
    resolve_promise(rt, promise, resolution);
    Ok(Value::Undefined)
}

/// Body of a promise reject function
pub(crate) fn reject_function(
    rt: &mut Runtime,
    promise: &Value,
    already_resolved: &Rc<Cell<bool>>,
    reason: Value,
) -> Result<Value> {
    if already_resolved.get() {
        rt.host_promise_rejection_tracker(promise, RejectionOperation::RejectAfterResolved);
        return Ok(Value::Undefined);
    }
    already_resolved.set(true);
    reject_promise(rt, promise, reason);
    Ok(Value::Undefined)
}

/// Resolve `promise` with `resolution`, adopting thenables one job later
fn resolve_promise(rt: &mut Runtime, promise: &Value, resolution: Value) {
    if resolution.same_value(promise) {
        let error = rt.new_error(ErrorKind::TypeError, messages::SELF_RESOLUTION);
        reject_promise(rt, promise, error);
        return;
    }
    if !resolution.is_object() {
        fulfill_promise(rt, promise, resolution);
        return;
    }
    let then = match rt.get(&resolution, "then") {
        Ok(then) => then,
        Err(error) => {
            let reason = rt.error_to_value(error);
            reject_promise(rt, promise, reason);
            return;
        }
    };
    if !then.is_callable() {
        fulfill_promise(rt, promise, resolution);
        return;
    }
    let realm = rt.get_function_realm(&then);
    trace!("resolving promise with a thenable");
    rt.enqueue_job(
        realm,
        JobKind::PromiseResolveThenable {
            promise: promise.clone(),
            thenable: resolution,
            then,
        },
    );
}

/// FulfillPromise
pub(crate) fn fulfill_promise(rt: &mut Runtime, promise: &Value, value: Value) {
    let reactions = with_promise_data_mut(promise, |data| {
        if data.state != PromiseState::Pending {
            return None;
        }
        data.state = PromiseState::Fulfilled;
        data.result = value.clone();
        data.reject_reactions.clear();
        Some(std::mem::take(&mut data.fulfill_reactions))
    })
    .flatten();
    let Some(reactions) = reactions else {
        return;
    };
    rt.event_loop_mut().record_promise_settled();
    trace!(reactions = reactions.len(), "promise fulfilled");
    trigger_promise_reactions(rt, reactions, value);
}

/// RejectPromise
pub(crate) fn reject_promise(rt: &mut Runtime, promise: &Value, reason: Value) {
    let settled = with_promise_data_mut(promise, |data| {
        if data.state != PromiseState::Pending {
            return None;
        }
        data.state = PromiseState::Rejected;
        data.result = reason.clone();
        data.fulfill_reactions.clear();
        Some((std::mem::take(&mut data.reject_reactions), data.is_handled))
    })
    .flatten();
    let Some((reactions, is_handled)) = settled else {
        return;
    };
    rt.event_loop_mut().record_promise_settled();
    trace!(reactions = reactions.len(), is_handled, "promise rejected");
    if !is_handled {
        rt.host_promise_rejection_tracker(promise, RejectionOperation::Reject);
    }
    trigger_promise_reactions(rt, reactions, reason);
}

fn trigger_promise_reactions(rt: &mut Runtime, reactions: Vec<PromiseReaction>, argument: Value) {
    for reaction in reactions {
        reaction::enqueue_reaction_job(rt, reaction, argument.clone());
    }
}

/// PromiseResolveThenableJob
pub(crate) fn promise_resolve_thenable_job(
    rt: &mut Runtime,
    promise: &Value,
    thenable: &Value,
    then: &Value,
) -> Result<()> {
    let (resolve, reject) = create_resolving_functions(rt, promise);
    if let Err(error) = rt.call(then, thenable, &[resolve, reject.clone()]) {
        let reason = rt.error_to_value(error);
        rt.call(&reject, &Value::Undefined, &[reason])?;
    }
    Ok(())
}
