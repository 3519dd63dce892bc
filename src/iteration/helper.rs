//! Async iterator helpers
//!
//! A helper wraps a target async iterator and a step function. Each `next()`
//! chains the step off the promise returned by the previous `next()`, so
//! steps of one helper never overlap even when callers do not wait:
//!
//! ```text
//! nextPromise ──then(step)──▶ call 1 ──then(step)──▶ call 2 ──▶ ...
//! ```
//!
//! A rejected call finishes the helper: every call queued behind it resolves
//! `{ value: undefined, done: true }`. `return()` closes the target right
//! away and does not wait for calls still in flight; results that arrive
//! after that are dropped without running the mapper or predicate.
//!
//! The built-in steps (`map`, `filter`, `take`, `drop`) pull from the target,
//! await mapper and predicate results, and close the target when one of those
//! throws or rejects.

use crate::error::{messages, Error, Result};
use crate::iteration::async_close::async_iterator_close;
use crate::iteration::record::{create_iter_result_object, iterator_complete, iterator_value, IteratorRecord};
use crate::promise::capability::{new_promise_capability, promise_resolve_intrinsic, PromiseCapability};
use crate::promise::reaction::perform_promise_then;
use crate::promise::resolved_promise;
use crate::runtime::realm::{define_method, define_to_string_tag};
use crate::runtime::{arg, describe, BuiltinClosure, Intrinsics, ObjectKind, RealmId, Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

pub(crate) fn install(intrinsics: &Intrinsics, realm: RealmId) {
    let proto = &intrinsics.async_iterator_helper_prototype;
    define_method(proto, intrinsics, realm, "next", "next", async_iterator_helper_next);
    define_method(proto, intrinsics, realm, "return", "return", async_iterator_helper_return);
    define_to_string_tag(proto, "Async Iterator Helper");

    let base = &intrinsics.async_iterator_prototype;
    define_method(base, intrinsics, realm, "map", "map", |rt, this, args| {
        let target = get_iterator_direct(rt, this)?;
        async_iterator_map(rt, target, arg(args, 0))
    });
    define_method(base, intrinsics, realm, "filter", "filter", |rt, this, args| {
        let target = get_iterator_direct(rt, this)?;
        async_iterator_filter(rt, target, arg(args, 0))
    });
    define_method(base, intrinsics, realm, "take", "take", |rt, this, args| {
        let target = get_iterator_direct(rt, this)?;
        async_iterator_take(rt, target, &arg(args, 0))
    });
    define_method(base, intrinsics, realm, "drop", "drop", |rt, this, args| {
        let target = get_iterator_direct(rt, this)?;
        async_iterator_drop(rt, target, &arg(args, 0))
    });
}

/// Per-helper behavior of the built-in step
#[derive(Debug, Clone)]
pub enum HelperKind {
    Map { mapper: Value },
    Filter { predicate: Value },
    Take { remaining: f64 },
    Drop { remaining: f64 },
    /// Caller-supplied step function
    Custom,
}

/// Mutable state shared by a helper and its pending continuations
#[derive(Debug)]
pub struct HelperCore {
    pub target: IteratorRecord,
    pub kind: HelperKind,
    /// Index passed to mappers and predicates
    pub counter: f64,
    /// Set once the helper finished (exhausted, failed or returned)
    pub done: bool,
}

impl HelperCore {
    fn finish(&mut self) {
        self.done = true;
        self.target.done = true;
    }
}

type CoreRef = Rc<RefCell<HelperCore>>;

/// Internal slots of an async iterator helper object
#[derive(Debug, Clone)]
pub struct AsyncIteratorHelperState {
    pub core: CoreRef,
    /// Step function run once per `next()`
    pub step: Value,
    /// Tail of the `next()` chain
    pub next_promise: Value,
    /// Runs instead of `step` when the previous call rejected
    pub after_rejected: Value,
}

/// Continuations of the built-in steps
#[derive(Debug, Clone)]
pub enum HelperContinuation {
    /// The step itself
    Step { core: CoreRef },
    /// The previous `next()` rejected
    AfterRejected { core: CoreRef },
    /// Target's `next()` result arrived
    OnResult {
        core: CoreRef,
        capability: PromiseCapability,
    },
    /// Target's `next()` rejected
    OnTargetRejected {
        core: CoreRef,
        capability: PromiseCapability,
    },
    /// Mapper result settled
    Mapped { capability: PromiseCapability },
    /// Predicate result settled
    FilterVerdict {
        core: CoreRef,
        capability: PromiseCapability,
        value: Value,
    },
    /// Mapper or predicate result rejected
    Abrupt {
        core: CoreRef,
        capability: PromiseCapability,
    },
}

impl HelperContinuation {
    pub fn name(&self) -> &'static str {
        match self {
            HelperContinuation::Step { .. } => "step",
            HelperContinuation::AfterRejected { .. } => "afterRejected",
            HelperContinuation::OnResult { .. } => "onResult",
            HelperContinuation::OnTargetRejected { .. } => "onTargetRejected",
            HelperContinuation::Mapped { .. } => "onMapped",
            HelperContinuation::FilterVerdict { .. } => "onFilterVerdict",
            HelperContinuation::Abrupt { .. } => "onAbrupt",
        }
    }
}

/// GetIteratorDirect
pub fn get_iterator_direct(rt: &mut Runtime, object: &Value) -> Result<IteratorRecord> {
    if !object.is_object() {
        return Err(Error::type_error(messages::not_an_object(&describe(object))));
    }
    let next_method = rt.get(object, "next")?;
    Ok(IteratorRecord {
        iterator: object.clone(),
        next_method,
        done: false,
    })
}

fn alloc_helper(rt: &mut Runtime, core: CoreRef, step: Value) -> Result<Value> {
    let next_promise = resolved_promise(rt, Value::Undefined)?;
    let after_rejected = rt.new_closure(BuiltinClosure::Helper(HelperContinuation::AfterRejected {
        core: core.clone(),
    }));
    let proto = rt.intrinsics().async_iterator_helper_prototype.clone();
    Ok(rt.alloc(
        ObjectKind::AsyncIteratorHelper(AsyncIteratorHelperState {
            core,
            step,
            next_promise,
            after_rejected,
        }),
        Some(proto),
    ))
}

fn new_core(target: IteratorRecord, kind: HelperKind) -> CoreRef {
    Rc::new(RefCell::new(HelperCore {
        target,
        kind,
        counter: 0.0,
        done: false,
    }))
}

fn builtin_helper(rt: &mut Runtime, target: IteratorRecord, kind: HelperKind) -> Result<Value> {
    let core = new_core(target, kind);
    let step = rt.new_closure(BuiltinClosure::Helper(HelperContinuation::Step { core: core.clone() }));
    alloc_helper(rt, core, step)
}

/// Create a helper over `target` driven by a caller-supplied `step`
///
/// `step` is called with the previous call's result and must return the
/// promise (or value) for the next iterator result.
pub fn create_async_iterator_helper(rt: &mut Runtime, target: IteratorRecord, step: Value) -> Result<Value> {
    if !step.is_callable() {
        return Err(Error::type_error(messages::not_a_function(&describe(&step))));
    }
    let core = new_core(target, HelperKind::Custom);
    alloc_helper(rt, core, step)
}

/// `map(mapper)` helper
pub fn async_iterator_map(rt: &mut Runtime, target: IteratorRecord, mapper: Value) -> Result<Value> {
    if !mapper.is_callable() {
        return Err(Error::type_error(messages::not_a_function(&describe(&mapper))));
    }
    builtin_helper(rt, target, HelperKind::Map { mapper })
}

/// `filter(predicate)` helper
pub fn async_iterator_filter(rt: &mut Runtime, target: IteratorRecord, predicate: Value) -> Result<Value> {
    if !predicate.is_callable() {
        return Err(Error::type_error(messages::not_a_function(&describe(&predicate))));
    }
    builtin_helper(rt, target, HelperKind::Filter { predicate })
}

/// `take(limit)` helper
pub fn async_iterator_take(rt: &mut Runtime, target: IteratorRecord, limit: &Value) -> Result<Value> {
    let remaining = to_limit(limit)?;
    builtin_helper(rt, target, HelperKind::Take { remaining })
}

/// `drop(limit)` helper
pub fn async_iterator_drop(rt: &mut Runtime, target: IteratorRecord, limit: &Value) -> Result<Value> {
    let remaining = to_limit(limit)?;
    builtin_helper(rt, target, HelperKind::Drop { remaining })
}

fn to_limit(limit: &Value) -> Result<f64> {
    let number = limit.to_number();
    if number.is_nan() {
        return Err(Error::range_error(messages::must_be("limit", "a number")));
    }
    let integer = number.trunc();
    if integer < 0.0 {
        return Err(Error::range_error(messages::must_be("limit", "non-negative")));
    }
    Ok(integer)
}

fn helper_state(this: &Value) -> Option<AsyncIteratorHelperState> {
    let Value::Object(obj) = this else {
        return None;
    };
    match &obj.borrow().kind {
        ObjectKind::AsyncIteratorHelper(state) => Some(state.clone()),
        _ => None,
    }
}

/// `%AsyncIteratorHelperPrototype%.next()`
fn async_iterator_helper_next(rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let Some(state) = helper_state(this) else {
        let error = Error::type_error(messages::incompatible_receiver("next", &describe(this)));
        return capability.reject_with_error(rt, error);
    };
    perform_promise_then(
        rt,
        &state.next_promise,
        &state.step,
        &state.after_rejected,
        Some(capability.clone()),
    )?;
    if let Value::Object(obj) = this {
        if let ObjectKind::AsyncIteratorHelper(state) = &mut obj.borrow_mut().kind {
            state.next_promise = capability.promise.clone();
        }
    }
    Ok(capability.promise)
}

/// `%AsyncIteratorHelperPrototype%.return()`
fn async_iterator_helper_return(rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let Some(state) = helper_state(this) else {
        let error = Error::type_error(messages::incompatible_receiver("return", &describe(this)));
        return capability.reject_with_error(rt, error);
    };
    let (skip_close, target) = {
        let mut core = state.core.borrow_mut();
        let skip_close = core.done || core.target.done;
        let target = core.target.clone();
        core.finish();
        (skip_close, target)
    };
    let done = create_iter_result_object(rt, Value::Undefined, true);
    if skip_close {
        capability.resolve(rt, done)?;
        return Ok(capability.promise);
    }
    trace!("closing async iterator helper target");
    match async_iterator_close(rt, &target, Ok(done)) {
        Ok(closing) => capability.resolve(rt, closing)?,
        Err(error) => return capability.reject_with_error(rt, error),
    }
    Ok(capability.promise)
}

/// Run a helper continuation
pub(crate) fn run_continuation(rt: &mut Runtime, continuation: &HelperContinuation, argument: Value) -> Result<Value> {
    match continuation {
        HelperContinuation::Step { core } => step(rt, core),
        HelperContinuation::AfterRejected { core } => {
            core.borrow_mut().finish();
            Ok(create_iter_result_object(rt, Value::Undefined, true))
        }
        HelperContinuation::OnResult { core, capability } => {
            on_result(rt, core, capability, argument)?;
            Ok(Value::Undefined)
        }
        HelperContinuation::OnTargetRejected { core, capability } => {
            core.borrow_mut().finish();
            capability.reject(rt, argument)?;
            Ok(Value::Undefined)
        }
        HelperContinuation::Mapped { capability } => {
            let result = create_iter_result_object(rt, argument, false);
            capability.resolve(rt, result)?;
            Ok(Value::Undefined)
        }
        HelperContinuation::FilterVerdict { core, capability, value } => {
            if argument.to_boolean() {
                let result = create_iter_result_object(rt, value.clone(), false);
                capability.resolve(rt, result)?;
            } else {
                pull_into(rt, core, capability)?;
            }
            Ok(Value::Undefined)
        }
        HelperContinuation::Abrupt { core, capability } => {
            close_and_reject(rt, core, capability, Error::Throw(argument))?;
            Ok(Value::Undefined)
        }
    }
}

/// The built-in step: produce a promise for the next result
fn step(rt: &mut Runtime, core: &CoreRef) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let (done, take_exhausted) = {
        let mut core = core.borrow_mut();
        if core.done {
            (true, false)
        } else {
            let take_exhausted = match &mut core.kind {
                HelperKind::Take { remaining } if *remaining == 0.0 => true,
                HelperKind::Take { remaining } => {
                    if remaining.is_finite() {
                        *remaining -= 1.0;
                    }
                    false
                }
                _ => false,
            };
            (false, take_exhausted)
        }
    };

    if done {
        let result = create_iter_result_object(rt, Value::Undefined, true);
        capability.resolve(rt, result)?;
        return Ok(capability.promise);
    }
    if take_exhausted {
        let target = {
            let mut core = core.borrow_mut();
            let target = core.target.clone();
            core.finish();
            target
        };
        let result = create_iter_result_object(rt, Value::Undefined, true);
        let closing = async_iterator_close(rt, &target, Ok(result))?;
        capability.resolve(rt, closing)?;
        return Ok(capability.promise);
    }
    pull_into(rt, core, &capability)?;
    Ok(capability.promise)
}

/// Ask the target for its next result and settle `capability` from it
fn pull_into(rt: &mut Runtime, core: &CoreRef, capability: &PromiseCapability) -> Result<()> {
    if core.borrow().done {
        return resolve_done(rt, capability);
    }
    let target = core.borrow().target.clone();
    let awaited = rt
        .call(&target.next_method, &target.iterator, &[])
        .and_then(|result| promise_resolve_intrinsic(rt, result));
    let awaited = match awaited {
        Ok(awaited) => awaited,
        Err(error) => {
            core.borrow_mut().finish();
            capability.reject_with_error(rt, error)?;
            return Ok(());
        }
    };
    let on_result = rt.new_closure(BuiltinClosure::Helper(HelperContinuation::OnResult {
        core: core.clone(),
        capability: capability.clone(),
    }));
    let on_rejected = rt.new_closure(BuiltinClosure::Helper(HelperContinuation::OnTargetRejected {
        core: core.clone(),
        capability: capability.clone(),
    }));
    perform_promise_then(rt, &awaited, &on_result, &on_rejected, None)?;
    Ok(())
}

fn on_result(rt: &mut Runtime, core: &CoreRef, capability: &PromiseCapability, result: Value) -> Result<()> {
    // returned while the target was still producing this result
    if core.borrow().done {
        return resolve_done(rt, capability);
    }
    if !result.is_object() {
        core.borrow_mut().finish();
        capability.reject_with_error(rt, Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT))?;
        return Ok(());
    }
    let completed = iterator_complete(rt, &result)
        .and_then(|done| if done { Ok(None) } else { iterator_value(rt, &result).map(Some) });
    let value = match completed {
        Ok(Some(value)) => value,
        Ok(None) => {
            core.borrow_mut().finish();
            return resolve_done(rt, capability);
        }
        Err(error) => {
            core.borrow_mut().finish();
            capability.reject_with_error(rt, error)?;
            return Ok(());
        }
    };

    let kind = core.borrow().kind.clone();
    match kind {
        HelperKind::Map { mapper } => {
            let index = next_counter(core);
            let awaited = rt
                .call(&mapper, &Value::Undefined, &[value, Value::Number(index)])
                .and_then(|mapped| promise_resolve_intrinsic(rt, mapped));
            match awaited {
                Ok(awaited) => {
                    let on_mapped = rt.new_closure(BuiltinClosure::Helper(HelperContinuation::Mapped {
                        capability: capability.clone(),
                    }));
                    let on_abrupt = abrupt_closure(rt, core, capability);
                    perform_promise_then(rt, &awaited, &on_mapped, &on_abrupt, None)?;
                }
                Err(error) => close_and_reject(rt, core, capability, error)?,
            }
        }
        HelperKind::Filter { predicate } => {
            let index = next_counter(core);
            let awaited = rt
                .call(&predicate, &Value::Undefined, &[value.clone(), Value::Number(index)])
                .and_then(|verdict| promise_resolve_intrinsic(rt, verdict));
            match awaited {
                Ok(awaited) => {
                    let on_verdict = rt.new_closure(BuiltinClosure::Helper(HelperContinuation::FilterVerdict {
                        core: core.clone(),
                        capability: capability.clone(),
                        value,
                    }));
                    let on_abrupt = abrupt_closure(rt, core, capability);
                    perform_promise_then(rt, &awaited, &on_verdict, &on_abrupt, None)?;
                }
                Err(error) => close_and_reject(rt, core, capability, error)?,
            }
        }
        HelperKind::Drop { .. } => {
            let skip = {
                let mut core = core.borrow_mut();
                match &mut core.kind {
                    HelperKind::Drop { remaining } if *remaining > 0.0 => {
                        if remaining.is_finite() {
                            *remaining -= 1.0;
                        }
                        true
                    }
                    _ => false,
                }
            };
            if skip {
                pull_into(rt, core, capability)?;
            } else {
                let result = create_iter_result_object(rt, value, false);
                capability.resolve(rt, result)?;
            }
        }
        HelperKind::Take { .. } | HelperKind::Custom => {
            let result = create_iter_result_object(rt, value, false);
            capability.resolve(rt, result)?;
        }
    }
    Ok(())
}

fn resolve_done(rt: &mut Runtime, capability: &PromiseCapability) -> Result<()> {
    let done = create_iter_result_object(rt, Value::Undefined, true);
    capability.resolve(rt, done)
}

fn next_counter(core: &CoreRef) -> f64 {
    let mut core = core.borrow_mut();
    let index = core.counter;
    core.counter += 1.0;
    index
}

fn abrupt_closure(rt: &mut Runtime, core: &CoreRef, capability: &PromiseCapability) -> Value {
    rt.new_closure(BuiltinClosure::Helper(HelperContinuation::Abrupt {
        core: core.clone(),
        capability: capability.clone(),
    }))
}

/// Close the target after `error` and reject with it once closing is done
fn close_and_reject(rt: &mut Runtime, core: &CoreRef, capability: &PromiseCapability, error: Error) -> Result<()> {
    let target = {
        let mut core = core.borrow_mut();
        let target = core.target.clone();
        core.finish();
        target
    };
    let closing = async_iterator_close(rt, &target, Err(error))?;
    capability.resolve(rt, closing)
}
