//! Async-from-sync iterator objects
//!
//! Adapts a synchronous iterator to the async iteration protocol: every
//! method returns a promise, and a value that is itself a promise (or
//! thenable) is awaited before it is handed out as `{ value, done }`.
//!
//! If awaiting the value fails while the sync iterator is not done, the sync
//! iterator is closed before the rejection is reported, for `next` and
//! `throw`. `return` never closes, because the consumer is already closing.

use crate::error::{messages, Error, Result};
use crate::iteration::record::{
    create_iter_result_object, iterator_close, iterator_complete, iterator_next, iterator_value,
    close_with_error, IteratorRecord,
};
use crate::promise::capability::{new_promise_capability, promise_resolve_intrinsic, PromiseCapability};
use crate::promise::reaction::perform_promise_then;
use crate::runtime::realm::{define_method, define_to_string_tag};
use crate::runtime::{arg, describe, BuiltinClosure, Intrinsics, ObjectKind, RealmId, Runtime, Value};

pub(crate) fn install(intrinsics: &Intrinsics, realm: RealmId) {
    let proto = &intrinsics.async_from_sync_iterator_prototype;
    define_method(proto, intrinsics, realm, "next", "next", async_from_sync_next);
    define_method(proto, intrinsics, realm, "return", "return", async_from_sync_return);
    define_method(proto, intrinsics, realm, "throw", "throw", async_from_sync_throw);
    define_to_string_tag(proto, "Async-from-Sync Iterator");
}

/// CreateAsyncFromSyncIterator
pub fn create_async_from_sync_iterator(
    rt: &mut Runtime,
    sync_record: IteratorRecord,
) -> Result<IteratorRecord> {
    let proto = rt.intrinsics().async_from_sync_iterator_prototype.clone();
    let iterator = rt.alloc(ObjectKind::AsyncFromSyncIterator(sync_record), Some(proto));
    let next_method = rt.get(&iterator, "next")?;
    Ok(IteratorRecord {
        iterator,
        next_method,
        done: false,
    })
}

fn sync_record_of(this: &Value) -> Option<IteratorRecord> {
    let Value::Object(obj) = this else {
        return None;
    };
    match &obj.borrow().kind {
        ObjectKind::AsyncFromSyncIterator(record) => Some(record.clone()),
        _ => None,
    }
}

fn incompatible(method: &str, this: &Value) -> Error {
    Error::type_error(messages::incompatible_receiver(method, &describe(this)))
}

/// `%AsyncFromSyncIteratorPrototype%.next(value)`
fn async_from_sync_next(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let Some(sync_record) = sync_record_of(this) else {
        return capability.reject_with_error(rt, incompatible("next", this));
    };
    let result = match iterator_next(rt, &sync_record, args.first().cloned()) {
        Ok(result) => result,
        Err(error) => return capability.reject_with_error(rt, error),
    };
    async_from_sync_iterator_continuation(rt, &result, &capability, &sync_record, true)
}

/// `%AsyncFromSyncIteratorPrototype%.return(value)`
fn async_from_sync_return(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let Some(sync_record) = sync_record_of(this) else {
        return capability.reject_with_error(rt, incompatible("return", this));
    };
    let iterator = sync_record.iterator.clone();
    let method = match rt.get_method(&iterator, "return") {
        Ok(Some(method)) => method,
        Ok(None) => {
            let done = create_iter_result_object(rt, arg(args, 0), true);
            capability.resolve(rt, done)?;
            return Ok(capability.promise);
        }
        Err(error) => return capability.reject_with_error(rt, error),
    };
    let result = match args.first() {
        Some(value) => rt.call(&method, &iterator, std::slice::from_ref(value)),
        None => rt.call(&method, &iterator, &[]),
    };
    let result = match result {
        Ok(result) if result.is_object() => result,
        Ok(_) => {
            return capability
                .reject_with_error(rt, Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT))
        }
        Err(error) => return capability.reject_with_error(rt, error),
    };
    async_from_sync_iterator_continuation(rt, &result, &capability, &sync_record, false)
}

/// `%AsyncFromSyncIteratorPrototype%.throw(value)`
fn async_from_sync_throw(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let Some(sync_record) = sync_record_of(this) else {
        return capability.reject_with_error(rt, incompatible("throw", this));
    };
    let iterator = sync_record.iterator.clone();
    let method = match rt.get_method(&iterator, "throw") {
        Ok(Some(method)) => method,
        Ok(None) => {
            // The delegation protocol was violated; close the sync iterator
            // and report the missing method.
            if let Err(error) = iterator_close(rt, &iterator, Ok(Value::Undefined)) {
                return capability.reject_with_error(rt, error);
            }
            return capability.reject_with_error(rt, Error::type_error(messages::NO_THROW_METHOD));
        }
        Err(error) => return capability.reject_with_error(rt, error),
    };
    let result = match args.first() {
        Some(value) => rt.call(&method, &iterator, std::slice::from_ref(value)),
        None => rt.call(&method, &iterator, &[]),
    };
    let result = match result {
        Ok(result) if result.is_object() => result,
        Ok(_) => {
            return capability
                .reject_with_error(rt, Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT))
        }
        Err(error) => return capability.reject_with_error(rt, error),
    };
    async_from_sync_iterator_continuation(rt, &result, &capability, &sync_record, true)
}

/// AsyncFromSyncIteratorContinuation
fn async_from_sync_iterator_continuation(
    rt: &mut Runtime,
    result: &Value,
    capability: &PromiseCapability,
    sync_record: &IteratorRecord,
    close_on_rejection: bool,
) -> Result<Value> {
    let done = match iterator_complete(rt, result) {
        Ok(done) => done,
        Err(error) => return capability.reject_with_error(rt, error),
    };
    let value = match iterator_value(rt, result) {
        Ok(value) => value,
        Err(error) => return capability.reject_with_error(rt, error),
    };

    let value_wrapper = if rt.config().async_from_sync_uses_promise_resolve {
        promise_resolve_intrinsic(rt, value)
    } else {
        new_promise_capability(rt, None).and_then(|wrapper| {
            wrapper.resolve(rt, value)?;
            Ok(wrapper.promise)
        })
    };
    let value_wrapper = match value_wrapper {
        Ok(wrapper) => wrapper,
        Err(error) => {
            let error = if !done && close_on_rejection {
                close_with_error(rt, &sync_record.iterator, error)
            } else {
                error
            };
            return capability.reject_with_error(rt, error);
        }
    };

    let on_fulfilled = rt.new_closure(BuiltinClosure::IteratorValueUnwrap { done });
    let on_rejected = if done || !close_on_rejection {
        Value::Undefined
    } else {
        rt.new_closure(BuiltinClosure::CloseSyncIterator {
            sync_iterator: sync_record.iterator.clone(),
        })
    };
    perform_promise_then(rt, &value_wrapper, &on_fulfilled, &on_rejected, Some(capability.clone()))?;
    Ok(capability.promise.clone())
}

/// Rejection handler: close the sync iterator, then rethrow `reason`
pub(crate) fn close_sync_iterator(rt: &mut Runtime, sync_iterator: &Value, reason: Value) -> Result<Value> {
    Err(close_with_error(rt, sync_iterator, Error::Throw(reason)))
}
