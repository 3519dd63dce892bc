//! Built-in closures
//!
//! Many built-in functions are created on the fly and capture state: the
//! resolving functions of a promise share an "already resolved" flag, the
//! element functions of `Promise.all` remember their index, the async
//! iterator adapters remember whether the result was `done`. Each of these is
//! a variant of [`BuiltinClosure`]; calling the function object dispatches on
//! the variant.

use crate::error::{Error, Result};
use crate::iteration::async_close::{self, CloseCompletion};
use crate::iteration::{async_from_sync, helper, record, wrap};
use crate::promise::builtins;
use crate::promise::capability::{self, CapabilitySlots, PromiseCapability};
use crate::promise::combinators::{self, CombinatorElement};
use crate::promise::reaction::PromiseReactionType;
use crate::promise::state;
use crate::runtime::{Runtime, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// State captured by a built-in function object
#[derive(Debug, Clone)]
pub enum BuiltinClosure {
    /// Promise resolve function
    PromiseResolveFunction {
        promise: Value,
        already_resolved: Rc<Cell<bool>>,
    },
    /// Promise reject function
    PromiseRejectFunction {
        promise: Value,
        already_resolved: Rc<Cell<bool>>,
    },
    /// GetCapabilitiesExecutor function
    CapabilitiesExecutor { slots: Rc<RefCell<CapabilitySlots>> },
    /// Element function of a promise combinator
    CombinatorElement(CombinatorElement),
    /// `finally` fulfillment handler
    ThenFinally { constructor: Value, on_finally: Value },
    /// `finally` rejection handler
    CatchFinally { constructor: Value, on_finally: Value },
    /// Returns the captured value
    ValueThunk { value: Value },
    /// Throws the captured value
    Thrower { reason: Value },
    /// Async-from-sync: wrap the awaited value into an iterator result
    IteratorValueUnwrap { done: bool },
    /// Async-from-sync: close the sync iterator, then rethrow the reason
    CloseSyncIterator { sync_iterator: Value },
    /// AsyncIteratorClose: settle after `return()` has been awaited
    AsyncCloseSettled {
        original: CloseCompletion,
        capability: PromiseCapability,
        reaction_type: PromiseReactionType,
    },
    /// Valid wrapper: check that the awaited `return()` result is an object
    WrapReturnResultCheck,
    /// Async iterator helper continuation
    Helper(helper::HelperContinuation),
}

impl BuiltinClosure {
    /// Function name
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinClosure::PromiseResolveFunction { .. } => "resolve",
            BuiltinClosure::PromiseRejectFunction { .. } => "reject",
            BuiltinClosure::CapabilitiesExecutor { .. } => "executor",
            BuiltinClosure::CombinatorElement(element) => element.kind.name(),
            BuiltinClosure::ThenFinally { .. } => "thenFinally",
            BuiltinClosure::CatchFinally { .. } => "catchFinally",
            BuiltinClosure::ValueThunk { .. } => "valueThunk",
            BuiltinClosure::Thrower { .. } => "thrower",
            BuiltinClosure::IteratorValueUnwrap { .. } => "unwrap",
            BuiltinClosure::CloseSyncIterator { .. } => "closeIterator",
            BuiltinClosure::AsyncCloseSettled { .. } => "closeSettled",
            BuiltinClosure::WrapReturnResultCheck => "checkReturnResult",
            BuiltinClosure::Helper(continuation) => continuation.name(),
        }
    }
}

/// Run a built-in closure
pub(crate) fn call_builtin_closure(
    rt: &mut Runtime,
    closure: &BuiltinClosure,
    args: &[Value],
) -> Result<Value> {
    let argument = args.first().cloned().unwrap_or_default();
    match closure {
        BuiltinClosure::PromiseResolveFunction {
            promise,
            already_resolved,
        } => state::resolve_function(rt, promise, already_resolved, argument),
        BuiltinClosure::PromiseRejectFunction {
            promise,
            already_resolved,
        } => state::reject_function(rt, promise, already_resolved, argument),
        BuiltinClosure::CapabilitiesExecutor { slots } => {
            capability::capabilities_executor(rt, slots, args)
        }
        BuiltinClosure::CombinatorElement(element) => {
            combinators::element_function(rt, element, argument)
        }
        BuiltinClosure::ThenFinally {
            constructor,
            on_finally,
        } => builtins::then_finally(rt, constructor, on_finally, argument),
        BuiltinClosure::CatchFinally {
            constructor,
            on_finally,
        } => builtins::catch_finally(rt, constructor, on_finally, argument),
        BuiltinClosure::ValueThunk { value } => Ok(value.clone()),
        BuiltinClosure::Thrower { reason } => Err(Error::Throw(reason.clone())),
        BuiltinClosure::IteratorValueUnwrap { done } => {
            Ok(record::create_iter_result_object(rt, argument, *done))
        }
        BuiltinClosure::CloseSyncIterator { sync_iterator } => {
            async_from_sync::close_sync_iterator(rt, sync_iterator, argument)
        }
        BuiltinClosure::AsyncCloseSettled {
            original,
            capability,
            reaction_type,
        } => async_close::return_settled(rt, original, capability, *reaction_type, argument),
        BuiltinClosure::WrapReturnResultCheck => wrap::check_return_result(argument),
        BuiltinClosure::Helper(continuation) => helper::run_continuation(rt, continuation, argument),
    }
}
