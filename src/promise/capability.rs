//! Promise capabilities
//!
//! A capability bundles a promise with the functions that settle it. For the
//! intrinsic `%Promise%` the capability is built directly; for any other
//! constructor it is obtained by calling the constructor with an executor
//! that captures the resolve/reject pair.

use crate::error::{messages, Error, Result};
use crate::promise::state::{self, is_promise};
use crate::runtime::{describe, BuiltinClosure, Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// PromiseCapability Record
#[derive(Debug, Clone)]
pub struct PromiseCapability {
    pub promise: Value,
    pub resolve: Value,
    pub reject: Value,
}

impl PromiseCapability {
    /// Call the capability's resolve function
    pub fn resolve(&self, rt: &mut Runtime, value: Value) -> Result<()> {
        rt.call(&self.resolve, &Value::Undefined, &[value])?;
        Ok(())
    }

    /// Call the capability's reject function
    pub fn reject(&self, rt: &mut Runtime, reason: Value) -> Result<()> {
        rt.call(&self.reject, &Value::Undefined, &[reason])?;
        Ok(())
    }

    /// IfAbruptRejectPromise: reject with the error and hand back the promise
    pub fn reject_with_error(&self, rt: &mut Runtime, error: Error) -> Result<Value> {
        let reason = rt.error_to_value(error);
        self.reject(rt, reason)?;
        Ok(self.promise.clone())
    }

    /// Settle with a completion: resolve on `Ok`, reject on `Err`
    pub fn settle(&self, rt: &mut Runtime, completion: Result<Value>) -> Result<Value> {
        match completion {
            Ok(value) => {
                self.resolve(rt, value)?;
                Ok(self.promise.clone())
            }
            Err(error) => self.reject_with_error(rt, error),
        }
    }
}

/// Resolve/reject slots filled in by a capabilities executor
#[derive(Debug, Default)]
pub struct CapabilitySlots {
    pub resolve: Value,
    pub reject: Value,
}

/// NewPromiseCapability
///
/// `None` (or the current realm's `%Promise%`) takes the direct path.
pub fn new_promise_capability(
    rt: &mut Runtime,
    constructor: Option<&Value>,
) -> Result<PromiseCapability> {
    let intrinsic = rt.promise_constructor();
    let constructor = match constructor {
        Some(c) if !c.strict_equals(&intrinsic) => c.clone(),
        _ => {
            let promise = state::new_promise(rt);
            let (resolve, reject) = state::create_resolving_functions(rt, &promise);
            return Ok(PromiseCapability {
                promise,
                resolve,
                reject,
            });
        }
    };

    if !constructor.is_constructor() {
        return Err(Error::type_error(messages::not_a_constructor(&describe(
            &constructor,
        ))));
    }
    let slots = Rc::new(RefCell::new(CapabilitySlots::default()));
    let executor = rt.new_closure(BuiltinClosure::CapabilitiesExecutor {
        slots: slots.clone(),
    });
    let promise = rt.construct(&constructor, &[executor])?;

    let (resolve, reject) = {
        let slots = slots.borrow();
        (slots.resolve.clone(), slots.reject.clone())
    };
    if !resolve.is_callable() || !reject.is_callable() {
        return Err(Error::type_error(messages::CAPABILITY_NOT_CALLABLE));
    }
    Ok(PromiseCapability {
        promise,
        resolve,
        reject,
    })
}

/// GetCapabilitiesExecutor function body
pub(crate) fn capabilities_executor(
    _rt: &mut Runtime,
    slots: &Rc<RefCell<CapabilitySlots>>,
    args: &[Value],
) -> Result<Value> {
    let mut slots = slots.borrow_mut();
    if !slots.resolve.is_undefined() || !slots.reject.is_undefined() {
        return Err(Error::type_error(messages::CAPABILITY_EXECUTOR_CALLED_TWICE));
    }
    slots.resolve = args.first().cloned().unwrap_or_default();
    slots.reject = args.get(1).cloned().unwrap_or_default();
    Ok(Value::Undefined)
}

/// PromiseResolve: coerce `value` to a promise built by `constructor`
///
/// A promise whose `constructor` property is `constructor` is returned as is.
pub fn promise_resolve(rt: &mut Runtime, constructor: &Value, value: Value) -> Result<Value> {
    if is_promise(&value) {
        let value_constructor = rt.get(&value, "constructor")?;
        if value_constructor.same_value(constructor) {
            return Ok(value);
        }
    }
    let capability = new_promise_capability(rt, Some(constructor))?;
    capability.resolve(rt, value)?;
    Ok(capability.promise)
}

/// PromiseResolve with the current realm's `%Promise%`
pub fn promise_resolve_intrinsic(rt: &mut Runtime, value: Value) -> Result<Value> {
    let constructor = rt.promise_constructor();
    promise_resolve(rt, &constructor, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::state::{promise_result, promise_state, PromiseState};

    #[test]
    fn test_default_capability_is_pending() {
        let mut rt = Runtime::new();
        let cap = new_promise_capability(&mut rt, None).unwrap();
        assert_eq!(promise_state(&cap.promise), Some(PromiseState::Pending));
        assert!(cap.resolve.is_callable());
        assert!(cap.reject.is_callable());
    }

    #[test]
    fn test_non_constructor_rejected() {
        let mut rt = Runtime::new();
        let err = new_promise_capability(&mut rt, Some(&Value::from(1))).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_custom_constructor_capability() {
        let mut rt = Runtime::new();
        // Calls the executor with its own functions and returns a plain object.
        let ctor = rt.new_constructor(
            "Custom",
            |_, _, _| Ok(Value::Undefined),
            |rt, args, _| {
                let resolve = rt.new_function("customResolve", |_, _, _| Ok(Value::Undefined));
                let reject = rt.new_function("customReject", |_, _, _| Ok(Value::Undefined));
                rt.call(&args[0], &Value::Undefined, &[resolve, reject])?;
                Ok(rt.new_object())
            },
        );
        let cap = new_promise_capability(&mut rt, Some(&ctor)).unwrap();
        assert!(cap.promise.is_object());
        assert!(!is_promise(&cap.promise));
        assert!(cap.resolve.is_callable());
    }

    #[test]
    fn test_executor_called_twice() {
        let mut rt = Runtime::new();
        let ctor = rt.new_constructor(
            "Twice",
            |_, _, _| Ok(Value::Undefined),
            |rt, args, _| {
                let f = rt.new_function("f", |_, _, _| Ok(Value::Undefined));
                rt.call(&args[0], &Value::Undefined, &[f.clone(), f.clone()])?;
                rt.call(&args[0], &Value::Undefined, &[f.clone(), f])?;
                Ok(rt.new_object())
            },
        );
        let err = new_promise_capability(&mut rt, Some(&ctor)).unwrap_err();
        assert!(err.to_string().contains("already called"));
    }

    #[test]
    fn test_missing_resolve_functions() {
        let mut rt = Runtime::new();
        let ctor = rt.new_constructor(
            "Lazy",
            |_, _, _| Ok(Value::Undefined),
            |rt, _, _| Ok(rt.new_object()),
        );
        let err = new_promise_capability(&mut rt, Some(&ctor)).unwrap_err();
        assert!(err.to_string().contains(messages::CAPABILITY_NOT_CALLABLE));
    }

    #[test]
    fn test_promise_resolve_returns_same_promise() {
        let mut rt = Runtime::new();
        let cap = new_promise_capability(&mut rt, None).unwrap();
        let same = promise_resolve_intrinsic(&mut rt, cap.promise.clone()).unwrap();
        assert_eq!(same, cap.promise);

        let wrapped = promise_resolve_intrinsic(&mut rt, Value::from(9)).unwrap();
        assert_eq!(promise_state(&wrapped), Some(PromiseState::Fulfilled));
        assert_eq!(promise_result(&wrapped), Some(Value::from(9)));
    }

    #[test]
    fn test_reject_with_error() {
        let mut rt = Runtime::new();
        let cap = new_promise_capability(&mut rt, None).unwrap();
        let promise = cap.reject_with_error(&mut rt, Error::range_error("limit")).unwrap();
        assert_eq!(promise_state(&promise), Some(PromiseState::Rejected));
        assert_eq!(
            promise_result(&promise).unwrap().to_js_string(),
            "RangeError: limit"
        );
    }
}
