//! Promise combinators: all, allSettled, any, race
//!
//! Each combinator walks an iterable, coerces every element through the
//! constructor's `resolve`, and subscribes to the result with per-element
//! functions. Results are stored by index, so the output order is iteration
//! order regardless of settlement order. The remaining-elements counter starts
//! at one so the aggregate cannot settle while iteration is still running.

use crate::error::{messages, Error, Result};
use crate::iteration::record::{self, get_iterator, IteratorKind, IteratorRecord};
use crate::promise::capability::{new_promise_capability, PromiseCapability};
use crate::runtime::{describe, BuiltinClosure, Runtime, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

/// Which combinator is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinatorKind {
    All,
    AllSettled,
    Any,
    Race,
}

impl CombinatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            CombinatorKind::All => "Promise.all",
            CombinatorKind::AllSettled => "Promise.allSettled",
            CombinatorKind::Any => "Promise.any",
            CombinatorKind::Race => "Promise.race",
        }
    }
}

/// What an element function does with its argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Promise.all resolve element
    AllResolve,
    /// Promise.allSettled fulfillment element
    AllSettledFulfilled,
    /// Promise.allSettled rejection element
    AllSettledRejected,
    /// Promise.any reject element
    AnyReject,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::AllResolve => "resolveElement",
            ElementKind::AllSettledFulfilled => "allSettledResolveElement",
            ElementKind::AllSettledRejected => "allSettledRejectElement",
            ElementKind::AnyReject => "rejectElement",
        }
    }
}

/// Shared record of one combinator invocation
#[derive(Debug)]
pub struct PromiseGroup {
    /// Collected values (or errors, for `any`), by iteration index
    pub values: RefCell<Vec<Value>>,
    /// Elements still outstanding, plus one while iterating
    pub remaining: Cell<usize>,
    /// Capability of the aggregate promise
    pub capability: PromiseCapability,
}

impl PromiseGroup {
    fn new(capability: PromiseCapability) -> Rc<Self> {
        Rc::new(Self {
            values: RefCell::new(Vec::new()),
            remaining: Cell::new(1),
            capability,
        })
    }

    /// Decrement the counter; true when it reached zero
    fn release(&self) -> bool {
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        remaining == 0
    }

    fn retain(&self) {
        self.remaining.set(self.remaining.get() + 1);
    }

    fn reserve_slot(&self) -> usize {
        let mut values = self.values.borrow_mut();
        values.push(Value::Undefined);
        values.len() - 1
    }

    fn snapshot(&self) -> Vec<Value> {
        self.values.borrow().clone()
    }
}

/// State of a combinator element function
#[derive(Debug, Clone)]
pub struct CombinatorElement {
    pub kind: ElementKind,
    pub index: usize,
    /// Shared by the fulfillment and rejection functions of one element
    pub already_called: Rc<Cell<bool>>,
    pub group: Rc<PromiseGroup>,
}

/// Body of every combinator element function
pub(crate) fn element_function(
    rt: &mut Runtime,
    element: &CombinatorElement,
    argument: Value,
) -> Result<Value> {
    if element.already_called.get() {
        return Ok(Value::Undefined);
    }
    element.already_called.set(true);

    let stored = match element.kind {
        ElementKind::AllResolve | ElementKind::AnyReject => argument,
        ElementKind::AllSettledFulfilled => {
            let entry = rt.new_object();
            rt.set(&entry, "status", Value::from("fulfilled"))?;
            rt.set(&entry, "value", argument)?;
            entry
        }
        ElementKind::AllSettledRejected => {
            let entry = rt.new_object();
            rt.set(&entry, "status", Value::from("rejected"))?;
            rt.set(&entry, "reason", argument)?;
            entry
        }
    };
    let group = &element.group;
    group.values.borrow_mut()[element.index] = stored;

    if group.release() {
        let values = group.snapshot();
        finish(rt, element.kind == ElementKind::AnyReject, group, values)?;
    }
    Ok(Value::Undefined)
}

fn finish(rt: &mut Runtime, reject_aggregate: bool, group: &PromiseGroup, values: Vec<Value>) -> Result<()> {
    if reject_aggregate {
        let error = rt.create_aggregate_error(values, messages::ALL_PROMISES_REJECTED);
        group.capability.reject(rt, error)
    } else {
        let array = rt.new_array(values);
        group.capability.resolve(rt, array)
    }
}

fn element_closure(rt: &mut Runtime, kind: ElementKind, index: usize, already_called: &Rc<Cell<bool>>, group: &Rc<PromiseGroup>) -> Value {
    rt.new_closure(BuiltinClosure::CombinatorElement(CombinatorElement {
        kind,
        index,
        already_called: already_called.clone(),
        group: group.clone(),
    }))
}

/// Coerce the next element with `promiseResolve` and subscribe to it
fn resolve_and_subscribe(
    rt: &mut Runtime,
    constructor: &Value,
    promise_resolve: &Value,
    value: Value,
    on_fulfilled: Value,
    on_rejected: Value,
) -> Result<()> {
    let next_promise = rt.call(promise_resolve, constructor, &[value])?;
    rt.invoke(&next_promise, "then", &[on_fulfilled, on_rejected])?;
    Ok(())
}

/// PerformPromiseAll
pub fn perform_promise_all(
    rt: &mut Runtime,
    iterator_record: &mut IteratorRecord,
    constructor: &Value,
    capability: &PromiseCapability,
    promise_resolve: &Value,
) -> Result<Value> {
    let group = PromiseGroup::new(capability.clone());
    while let Some(value) = record::iterator_step_value(rt, iterator_record)? {
        let index = group.reserve_slot();
        let already_called = Rc::new(Cell::new(false));
        let on_fulfilled = element_closure(rt, ElementKind::AllResolve, index, &already_called, &group);
        group.retain();
        resolve_and_subscribe(rt, constructor, promise_resolve, value, on_fulfilled, capability.reject.clone())?;
    }
    if group.release() {
        let values = group.snapshot();
        finish(rt, false, &group, values)?;
    }
    Ok(capability.promise.clone())
}

/// PerformPromiseAllSettled
pub fn perform_promise_all_settled(
    rt: &mut Runtime,
    iterator_record: &mut IteratorRecord,
    constructor: &Value,
    capability: &PromiseCapability,
    promise_resolve: &Value,
) -> Result<Value> {
    let group = PromiseGroup::new(capability.clone());
    while let Some(value) = record::iterator_step_value(rt, iterator_record)? {
        let index = group.reserve_slot();
        let already_called = Rc::new(Cell::new(false));
        let on_fulfilled = element_closure(rt, ElementKind::AllSettledFulfilled, index, &already_called, &group);
        let on_rejected = element_closure(rt, ElementKind::AllSettledRejected, index, &already_called, &group);
        group.retain();
        resolve_and_subscribe(rt, constructor, promise_resolve, value, on_fulfilled, on_rejected)?;
    }
    if group.release() {
        let values = group.snapshot();
        finish(rt, false, &group, values)?;
    }
    Ok(capability.promise.clone())
}

/// PerformPromiseAny
pub fn perform_promise_any(
    rt: &mut Runtime,
    iterator_record: &mut IteratorRecord,
    constructor: &Value,
    capability: &PromiseCapability,
    promise_resolve: &Value,
) -> Result<Value> {
    let group = PromiseGroup::new(capability.clone());
    while let Some(value) = record::iterator_step_value(rt, iterator_record)? {
        let index = group.reserve_slot();
        let already_called = Rc::new(Cell::new(false));
        let on_rejected = element_closure(rt, ElementKind::AnyReject, index, &already_called, &group);
        group.retain();
        resolve_and_subscribe(rt, constructor, promise_resolve, value, capability.resolve.clone(), on_rejected)?;
    }
    if group.release() {
        let errors = group.snapshot();
        finish(rt, true, &group, errors)?;
    }
    Ok(capability.promise.clone())
}

/// PerformPromiseRace
pub fn perform_promise_race(
    rt: &mut Runtime,
    iterator_record: &mut IteratorRecord,
    constructor: &Value,
    capability: &PromiseCapability,
    promise_resolve: &Value,
) -> Result<Value> {
    while let Some(value) = record::iterator_step_value(rt, iterator_record)? {
        resolve_and_subscribe(
            rt,
            constructor,
            promise_resolve,
            value,
            capability.resolve.clone(),
            capability.reject.clone(),
        )?;
    }
    Ok(capability.promise.clone())
}

type PerformFn =
    fn(&mut Runtime, &mut IteratorRecord, &Value, &PromiseCapability, &Value) -> Result<Value>;

/// GetPromiseResolve
pub fn get_promise_resolve(rt: &mut Runtime, constructor: &Value) -> Result<Value> {
    let resolve = rt.get(constructor, "resolve")?;
    if !resolve.is_callable() {
        return Err(Error::type_error(messages::not_a_function(&format!(
            "{}.resolve",
            describe(constructor)
        ))));
    }
    Ok(resolve)
}

/// Shared driver of the combinator built-ins
///
/// Every failure is turned into a rejection of the returned promise; an
/// iterator that has not finished is closed first, keeping the original error.
pub fn promise_combinator(
    rt: &mut Runtime,
    constructor: &Value,
    iterable: &Value,
    kind: CombinatorKind,
) -> Result<Value> {
    trace!(combinator = kind.name(), "combinator started");
    let capability = new_promise_capability(rt, Some(constructor))?;
    let promise_resolve = match get_promise_resolve(rt, constructor) {
        Ok(resolve) => resolve,
        Err(error) => return capability.reject_with_error(rt, error),
    };
    let mut iterator_record = match get_iterator(rt, iterable, IteratorKind::Sync) {
        Ok(record) => record,
        Err(error) => return capability.reject_with_error(rt, error),
    };

    let perform: PerformFn = match kind {
        CombinatorKind::All => perform_promise_all,
        CombinatorKind::AllSettled => perform_promise_all_settled,
        CombinatorKind::Any => perform_promise_any,
        CombinatorKind::Race => perform_promise_race,
    };
    match perform(rt, &mut iterator_record, constructor, &capability, &promise_resolve) {
        Ok(promise) => Ok(promise),
        Err(error) => {
            let error = if iterator_record.done {
                error
            } else {
                record::close_with_error(rt, &iterator_record.iterator, error)
            };
            capability.reject_with_error(rt, error)
        }
    }
}
