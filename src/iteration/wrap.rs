//! Wrap-for-async-iterator adapters
//!
//! Gives an iterator-like object that does not inherit from
//! `%AsyncIteratorPrototype%` a conformant `next` / `return` pair. Results
//! that already are promises of the current realm are handed out untouched;
//! anything else is wrapped in a fresh promise.
//!
//! The "valid" variant also checks that what `return()` produces is an
//! object, rejecting with a `TypeError` otherwise.

use crate::error::{messages, Error, Result};
use crate::iteration::async_from_sync::create_async_from_sync_iterator;
use crate::iteration::helper::get_iterator_direct;
use crate::iteration::record::{create_iter_result_object, get_iterator_from_method, IteratorRecord};
use crate::promise::capability::{new_promise_capability, PromiseCapability};
use crate::promise::reaction::perform_promise_then;
use crate::promise::state::is_promise;
use crate::runtime::realm::{define_method, define_to_string_tag};
use crate::runtime::{describe, BuiltinClosure, Intrinsics, ObjectKind, RealmId, Runtime, Value, WellKnownSymbol};

pub(crate) fn install(intrinsics: &Intrinsics, realm: RealmId) {
    for proto in [
        &intrinsics.wrap_for_async_iterator_prototype,
        &intrinsics.wrap_for_valid_async_iterator_prototype,
    ] {
        define_method(proto, intrinsics, realm, "next", "next", wrap_next);
        define_method(proto, intrinsics, realm, "return", "return", wrap_return);
        define_to_string_tag(proto, "Async Iterator");
    }
}

/// Wrap `iterated` in a WrapForAsyncIterator (or WrapForValidAsyncIterator
/// when `valid` is set)
pub fn create_wrap_for_async_iterator(rt: &mut Runtime, iterated: IteratorRecord, valid: bool) -> Value {
    let intrinsics = rt.intrinsics();
    let proto = if valid {
        intrinsics.wrap_for_valid_async_iterator_prototype.clone()
    } else {
        intrinsics.wrap_for_async_iterator_prototype.clone()
    };
    rt.alloc(ObjectKind::WrapForAsyncIterator { iterated, valid }, Some(proto))
}

fn wrapped_record(this: &Value) -> Option<(IteratorRecord, bool)> {
    let Value::Object(obj) = this else {
        return None;
    };
    match &obj.borrow().kind {
        ObjectKind::WrapForAsyncIterator { iterated, valid } => Some((iterated.clone(), *valid)),
        _ => None,
    }
}

/// A promise created by the current realm's `%Promise%`
fn is_realm_promise(rt: &mut Runtime, value: &Value) -> bool {
    if !is_promise(value) {
        return false;
    }
    let expected = rt.promise_constructor();
    matches!(rt.get(value, "constructor"), Ok(constructor) if constructor == expected)
}

fn wrap_next(rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let Some((iterated, _)) = wrapped_record(this) else {
        let error = Error::type_error(messages::incompatible_receiver("next", &describe(this)));
        return capability.reject_with_error(rt, error);
    };
    let result = match rt.call(&iterated.next_method, &iterated.iterator, &[]) {
        Ok(result) => result,
        Err(error) => return capability.reject_with_error(rt, error),
    };
    if is_realm_promise(rt, &result) {
        return Ok(result);
    }
    capability.resolve(rt, result)?;
    Ok(capability.promise)
}

fn wrap_return(rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, None)?;
    let Some((iterated, valid)) = wrapped_record(this) else {
        let error = Error::type_error(messages::incompatible_receiver("return", &describe(this)));
        return capability.reject_with_error(rt, error);
    };
    let iterator = iterated.iterator;
    let method = match rt.get_method(&iterator, "return") {
        Ok(Some(method)) => method,
        Ok(None) => {
            let done = create_iter_result_object(rt, Value::Undefined, true);
            capability.resolve(rt, done)?;
            return Ok(capability.promise);
        }
        Err(error) => return capability.reject_with_error(rt, error),
    };
    let result = match rt.call(&method, &iterator, &[]) {
        Ok(result) => result,
        Err(error) => return capability.reject_with_error(rt, error),
    };

    if is_realm_promise(rt, &result) {
        if !valid {
            return Ok(result);
        }
        return check_settled_result(rt, &result, capability);
    }
    if valid && !result.is_object() {
        return capability.reject_with_error(rt, Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT));
    }
    capability.resolve(rt, result)?;
    Ok(capability.promise)
}

/// Settle `capability` from `promise` once it fulfills with an object
fn check_settled_result(rt: &mut Runtime, promise: &Value, capability: PromiseCapability) -> Result<Value> {
    let check = rt.new_closure(BuiltinClosure::WrapReturnResultCheck);
    perform_promise_then(rt, promise, &check, &Value::Undefined, Some(capability.clone()))?;
    Ok(capability.promise)
}

/// Fulfillment handler validating a `return()` result
pub(crate) fn check_return_result(argument: Value) -> Result<Value> {
    if !argument.is_object() {
        return Err(Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT));
    }
    Ok(argument)
}

/// `AsyncIterator.from(value)`
///
/// Accepts strings and objects. Prefers `@@asyncIterator`, falls back to an
/// async-from-sync adapter over `@@iterator`, and otherwise treats `value`
/// itself as the iterator. Iterators that do not inherit from
/// `%AsyncIteratorPrototype%` come back wrapped.
pub fn async_iterator_from(rt: &mut Runtime, value: &Value) -> Result<Value> {
    if !matches!(value, Value::String(_) | Value::Object(_)) {
        return Err(Error::type_error(messages::not_an_object(&describe(value))));
    }

    let record = if let Some(method) = rt.get_method(value, WellKnownSymbol::AsyncIterator)? {
        get_iterator_from_method(rt, value, &method)?
    } else if let Some(method) = rt.get_method(value, WellKnownSymbol::Iterator)? {
        let sync_record = get_iterator_from_method(rt, value, &method)?;
        create_async_from_sync_iterator(rt, sync_record)?
    } else {
        get_iterator_direct(rt, value)?
    };

    let proto = rt.intrinsics().async_iterator_prototype.clone();
    if rt.inherits_from(&record.iterator, &proto) {
        return Ok(record.iterator);
    }
    Ok(create_wrap_for_async_iterator(rt, record, true))
}
