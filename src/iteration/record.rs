//! Iterator records and the synchronous iteration protocol

use crate::error::{messages, Error, Result};
use crate::iteration::async_from_sync::create_async_from_sync_iterator;
use crate::runtime::{describe, Runtime, Value, WellKnownSymbol};
use tracing::trace;

/// Sync or async iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorKind {
    Sync,
    Async,
}

/// Iterator Record
///
/// `done` is set once the iterator is exhausted or one of its methods threw;
/// after that it must not be closed.
#[derive(Debug, Clone)]
pub struct IteratorRecord {
    pub iterator: Value,
    pub next_method: Value,
    pub done: bool,
}

/// GetIteratorFromMethod
pub fn get_iterator_from_method(
    rt: &mut Runtime,
    object: &Value,
    method: &Value,
) -> Result<IteratorRecord> {
    let iterator = rt.call(method, object, &[])?;
    if !iterator.is_object() {
        return Err(Error::type_error(messages::not_an_object(&format!(
            "Result of the Symbol.iterator method ({})",
            describe(&iterator)
        ))));
    }
    let next_method = rt.get(&iterator, "next")?;
    Ok(IteratorRecord {
        iterator,
        next_method,
        done: false,
    })
}

/// GetIterator
///
/// For [`IteratorKind::Async`], a value with only `@@iterator` is adapted
/// through an async-from-sync iterator.
pub fn get_iterator(rt: &mut Runtime, object: &Value, kind: IteratorKind) -> Result<IteratorRecord> {
    if kind == IteratorKind::Async {
        if let Some(method) = rt.get_method(object, WellKnownSymbol::AsyncIterator)? {
            return get_iterator_from_method(rt, object, &method);
        }
    }
    let Some(method) = rt.get_method(object, WellKnownSymbol::Iterator)? else {
        return Err(Error::type_error(messages::not_iterable(&describe(object))));
    };
    let sync_record = get_iterator_from_method(rt, object, &method)?;
    match kind {
        IteratorKind::Sync => Ok(sync_record),
        IteratorKind::Async => create_async_from_sync_iterator(rt, sync_record),
    }
}

/// IteratorNext
pub fn iterator_next(rt: &mut Runtime, record: &IteratorRecord, value: Option<Value>) -> Result<Value> {
    let result = match value {
        Some(value) => rt.call(&record.next_method, &record.iterator, &[value])?,
        None => rt.call(&record.next_method, &record.iterator, &[])?,
    };
    if !result.is_object() {
        return Err(Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT));
    }
    Ok(result)
}

/// IteratorComplete
pub fn iterator_complete(rt: &mut Runtime, result: &Value) -> Result<bool> {
    Ok(rt.get(result, "done")?.to_boolean())
}

/// IteratorValue
pub fn iterator_value(rt: &mut Runtime, result: &Value) -> Result<Value> {
    rt.get(result, "value")
}

/// IteratorStep: the next result object, or `None` when exhausted
pub fn iterator_step(rt: &mut Runtime, record: &mut IteratorRecord) -> Result<Option<Value>> {
    let result = match iterator_next(rt, record, None) {
        Ok(result) => result,
        Err(error) => {
            record.done = true;
            return Err(error);
        }
    };
    match iterator_complete(rt, &result) {
        Ok(true) => {
            record.done = true;
            Ok(None)
        }
        Ok(false) => Ok(Some(result)),
        Err(error) => {
            record.done = true;
            Err(error)
        }
    }
}

/// IteratorStepValue: the next value, or `None` when exhausted
pub fn iterator_step_value(rt: &mut Runtime, record: &mut IteratorRecord) -> Result<Option<Value>> {
    let Some(result) = iterator_step(rt, record)? else {
        return Ok(None);
    };
    match iterator_value(rt, &result) {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            record.done = true;
            Err(error)
        }
    }
}

/// IteratorClose
///
/// Calls `return()` if present. An abrupt `completion` always wins over
/// anything `return()` does; otherwise a throw from `return()` or a
/// non-object result becomes the error.
pub fn iterator_close(rt: &mut Runtime, iterator: &Value, completion: Result<Value>) -> Result<Value> {
    let inner = match rt.get_method(iterator, "return") {
        Ok(None) => return completion,
        Ok(Some(method)) => {
            trace!(abrupt = completion.is_err(), "closing iterator");
            rt.call(&method, iterator, &[])
        }
        Err(error) => Err(error),
    };
    let value = completion?;
    let inner = inner?;
    if !inner.is_object() {
        return Err(Error::type_error(messages::ITERATOR_RESULT_NOT_OBJECT));
    }
    Ok(value)
}

/// Close `iterator` after `error`, returning the error to propagate
pub fn close_with_error(rt: &mut Runtime, iterator: &Value, error: Error) -> Error {
    match iterator_close(rt, iterator, Err(error)) {
        Err(error) => error,
        Ok(_) => Error::InternalError("abrupt close completed normally".to_string()),
    }
}

/// CreateIterResultObject
pub fn create_iter_result_object(rt: &mut Runtime, value: Value, done: bool) -> Value {
    let result = rt.new_object();
    if let Value::Object(obj) = &result {
        let mut obj = obj.borrow_mut();
        obj.set_property("value".into(), value);
        obj.set_property("done".into(), Value::Boolean(done));
    }
    result
}

/// IteratorToList: drain a sync iterator
pub fn iterator_to_list(rt: &mut Runtime, record: &mut IteratorRecord) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    while let Some(value) = iterator_step_value(rt, record)? {
        values.push(value);
    }
    Ok(values)
}
