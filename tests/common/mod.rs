//! Shared test helpers for integration tests
#![allow(dead_code)]

use settle::iteration::create_iter_result_object;
use settle::promise::{promise_result, promise_state, resolved_promise, PromiseState};
use settle::runtime::arg;
use settle::{Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Install a log subscriber honoring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Ordered record of observed events
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A function that appends `label:<first argument>` to the log
pub fn recorder(rt: &mut Runtime, log: &Log, label: &str) -> Value {
    let log = log.clone();
    let label = label.to_string();
    rt.new_function(&label.clone(), move |_, _, args| {
        log.borrow_mut().push(format!("{}:{}", label, arg(args, 0)));
        Ok(Value::Undefined)
    })
}

/// Property lookup that panics on abrupt completion
pub fn get(rt: &mut Runtime, object: &Value, key: &str) -> Value {
    rt.get(object, key).expect("property lookup failed")
}

/// Value a promise fulfilled with
pub fn fulfilled(promise: &Value) -> Value {
    assert_eq!(promise_state(promise), Some(PromiseState::Fulfilled), "promise is not fulfilled");
    promise_result(promise).expect("fulfilled promise has a result")
}

/// Reason a promise was rejected with
pub fn rejected(promise: &Value) -> Value {
    assert_eq!(promise_state(promise), Some(PromiseState::Rejected), "promise is not rejected");
    promise_result(promise).expect("rejected promise has a result")
}

pub fn assert_pending(promise: &Value) {
    assert_eq!(promise_state(promise), Some(PromiseState::Pending));
}

/// `(value, done)` of an iterator result object
pub fn iter_result(rt: &mut Runtime, result: &Value) -> (Value, bool) {
    let value = get(rt, result, "value");
    let done = get(rt, result, "done").to_boolean();
    (value, done)
}

/// Elements of an array value
pub fn array_values(rt: &mut Runtime, array: &Value) -> Vec<Value> {
    let length = get(rt, array, "length").to_number() as usize;
    (0..length).map(|i| rt.get(array, i).expect("array element")).collect()
}

/// A thenable whose `then` calls its resolve argument with `value`
pub fn thenable_resolving_to(rt: &mut Runtime, value: Value) -> Value {
    let thenable = rt.new_object();
    let then = rt.new_function("then", move |rt, _, args| {
        rt.call(&arg(args, 0), &Value::Undefined, &[value.clone()])
    });
    rt.set(&thenable, "then", then).expect("set then");
    thenable
}

/// A synchronous iterator over `values` that logs `next` and `return` calls
pub fn logging_sync_iterator(rt: &mut Runtime, values: Vec<Value>, log: &Log) -> Value {
    let iterator = rt.new_object();
    let position = Rc::new(RefCell::new(0usize));
    let next_log = log.clone();
    let next = rt.new_function("next", move |rt, _, _| {
        let mut index = position.borrow_mut();
        next_log.borrow_mut().push(format!("next:{}", *index));
        let result = match values.get(*index) {
            Some(value) => create_iter_result_object(rt, value.clone(), false),
            None => create_iter_result_object(rt, Value::Undefined, true),
        };
        *index += 1;
        Ok(result)
    });
    let return_log = log.clone();
    let ret = rt.new_function("return", move |rt, _, _| {
        return_log.borrow_mut().push("return".to_string());
        Ok(create_iter_result_object(rt, Value::Undefined, true))
    });
    rt.set(&iterator, "next", next).expect("set next");
    rt.set(&iterator, "return", ret).expect("set return");
    iterator
}

/// An iterable object whose `@@iterator` returns `iterator`
pub fn iterable_of(rt: &mut Runtime, iterator: Value) -> Value {
    let iterable = rt.new_object();
    let method = rt.new_function("[Symbol.iterator]", move |_, _, _| Ok(iterator.clone()));
    rt.set(&iterable, settle::runtime::WellKnownSymbol::Iterator, method)
        .expect("set @@iterator");
    iterable
}

/// An async iterator over `values`; `next` returns already fulfilled
/// promises and `return` is logged
pub fn async_source(rt: &mut Runtime, values: Vec<Value>, log: &Log) -> Value {
    let iterator = rt.new_object();
    let position = Rc::new(RefCell::new(0usize));
    let next_log = log.clone();
    let next = rt.new_function("next", move |rt, _, _| {
        let mut index = position.borrow_mut();
        next_log.borrow_mut().push(format!("next:{}", *index));
        let result = match values.get(*index) {
            Some(value) => create_iter_result_object(rt, value.clone(), false),
            None => create_iter_result_object(rt, Value::Undefined, true),
        };
        *index += 1;
        resolved_promise(rt, result)
    });
    let return_log = log.clone();
    let ret = rt.new_function("return", move |rt, _, _| {
        return_log.borrow_mut().push("return".to_string());
        let result = create_iter_result_object(rt, Value::Undefined, true);
        resolved_promise(rt, result)
    });
    rt.set(&iterator, "next", next).expect("set next");
    rt.set(&iterator, "return", ret).expect("set return");
    iterator
}

/// Call `next()` on an async iterator `count` times, drain the queue and
/// return the `(value, done)` pairs
pub fn drain_async(rt: &mut Runtime, iterator: &Value, count: usize) -> Vec<(Value, bool)> {
    let promises: Vec<Value> = (0..count)
        .map(|_| rt.invoke(iterator, "next", &[]).expect("next"))
        .collect();
    rt.run_jobs();
    promises
        .iter()
        .map(|promise| {
            let result = fulfilled(promise);
            iter_result(rt, &result)
        })
        .collect()
}
