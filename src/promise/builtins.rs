//! The `Promise` constructor, its static methods and `Promise.prototype`

use crate::error::{messages, Error, Result};
use crate::promise::capability::{new_promise_capability, promise_resolve};
use crate::promise::combinators::{promise_combinator, CombinatorKind};
use crate::promise::reaction::perform_promise_then;
use crate::promise::state::{self, create_resolving_functions, is_promise};
use crate::runtime::realm::{define_method, define_to_string_tag, native_function};
use crate::runtime::{arg, describe, BuiltinClosure, Intrinsics, ObjectRef, PropertyKey, RealmId, Runtime, Value, WellKnownSymbol};
use std::rc::Rc;

/// Allocate `%Promise%` for a realm; members are added by [`install`]
pub(crate) fn create_promise_constructor(function_prototype: &ObjectRef, realm: RealmId) -> ObjectRef {
    native_function(
        function_prototype,
        realm,
        "Promise",
        Rc::new(promise_call),
        Some(Rc::new(promise_construct)),
    )
}

pub(crate) fn install(intrinsics: &Intrinsics, realm: RealmId) {
    let ctor = &intrinsics.promise_constructor;
    let proto = &intrinsics.promise_prototype;
    {
        let mut ctor_obj = ctor.borrow_mut();
        ctor_obj.set_property(PropertyKey::from("prototype"), Value::Object(proto.clone()));
        ctor_obj.set_property(
            PropertyKey::Symbol(WellKnownSymbol::Species),
            Value::Object(ctor.clone()),
        );
    }
    proto
        .borrow_mut()
        .set_property(PropertyKey::from("constructor"), Value::Object(ctor.clone()));
    define_to_string_tag(proto, "Promise");

    define_method(ctor, intrinsics, realm, "resolve", "resolve", promise_static_resolve);
    define_method(ctor, intrinsics, realm, "reject", "reject", promise_static_reject);
    define_method(ctor, intrinsics, realm, "all", "all", |rt, this, args| {
        promise_combinator(rt, this, &arg(args, 0), CombinatorKind::All)
    });
    define_method(ctor, intrinsics, realm, "allSettled", "allSettled", |rt, this, args| {
        promise_combinator(rt, this, &arg(args, 0), CombinatorKind::AllSettled)
    });
    define_method(ctor, intrinsics, realm, "any", "any", |rt, this, args| {
        promise_combinator(rt, this, &arg(args, 0), CombinatorKind::Any)
    });
    define_method(ctor, intrinsics, realm, "race", "race", |rt, this, args| {
        promise_combinator(rt, this, &arg(args, 0), CombinatorKind::Race)
    });
    define_method(ctor, intrinsics, realm, "withResolvers", "withResolvers", promise_with_resolvers);

    define_method(proto, intrinsics, realm, "then", "then", promise_prototype_then);
    define_method(proto, intrinsics, realm, "catch", "catch", promise_prototype_catch);
    define_method(proto, intrinsics, realm, "finally", "finally", promise_prototype_finally);
}

fn promise_call(_rt: &mut Runtime, _this: &Value, _args: &[Value]) -> Result<Value> {
    Err(Error::type_error(messages::PROMISE_WITHOUT_NEW))
}

/// `new Promise(executor)`
fn promise_construct(rt: &mut Runtime, args: &[Value], new_target: &Value) -> Result<Value> {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(Error::type_error(format!(
            "Promise resolver {} is not a function",
            describe(&executor)
        )));
    }
    let proto = match rt.get(new_target, "prototype")? {
        Value::Object(proto) => proto,
        _ => rt.intrinsics().promise_prototype.clone(),
    };
    let promise = state::alloc_promise(rt, proto);
    let (resolve, reject) = create_resolving_functions(rt, &promise);
    if let Err(error) = rt.call(&executor, &Value::Undefined, &[resolve, reject.clone()]) {
        let reason = rt.error_to_value(error);
        rt.call(&reject, &Value::Undefined, &[reason])?;
    }
    Ok(promise)
}

fn require_object_receiver(this: &Value, method: &str) -> Result<()> {
    if this.is_object() {
        Ok(())
    } else {
        Err(Error::type_error(messages::incompatible_receiver(
            method,
            &describe(this),
        )))
    }
}

/// `Promise.resolve(value)`
fn promise_static_resolve(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    require_object_receiver(this, "Promise.resolve")?;
    promise_resolve(rt, this, arg(args, 0))
}

/// `Promise.reject(reason)`
fn promise_static_reject(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, Some(this))?;
    capability.reject(rt, arg(args, 0))?;
    Ok(capability.promise)
}

/// `Promise.withResolvers()`
fn promise_with_resolvers(rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    let capability = new_promise_capability(rt, Some(this))?;
    let result = rt.new_object();
    rt.set(&result, "promise", capability.promise)?;
    rt.set(&result, "resolve", capability.resolve)?;
    rt.set(&result, "reject", capability.reject)?;
    Ok(result)
}

/// `Promise.prototype.then(onFulfilled, onRejected)`
fn promise_prototype_then(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    if !is_promise(this) {
        return Err(Error::type_error(messages::incompatible_receiver(
            "Promise.prototype.then",
            &describe(this),
        )));
    }
    let default = rt.promise_constructor();
    let constructor = rt.species_constructor(this, &default)?;
    let capability = new_promise_capability(rt, Some(&constructor))?;
    perform_promise_then(rt, this, &arg(args, 0), &arg(args, 1), Some(capability))
}

/// `Promise.prototype.catch(onRejected)`
fn promise_prototype_catch(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    rt.invoke(this, "then", &[Value::Undefined, arg(args, 0)])
}

/// `Promise.prototype.finally(onFinally)`
fn promise_prototype_finally(rt: &mut Runtime, this: &Value, args: &[Value]) -> Result<Value> {
    require_object_receiver(this, "Promise.prototype.finally")?;
    let default = rt.promise_constructor();
    let constructor = rt.species_constructor(this, &default)?;
    let on_finally = arg(args, 0);
    let (then_finally, catch_finally) = if on_finally.is_callable() {
        (
            rt.new_closure(BuiltinClosure::ThenFinally {
                constructor: constructor.clone(),
                on_finally: on_finally.clone(),
            }),
            rt.new_closure(BuiltinClosure::CatchFinally {
                constructor,
                on_finally,
            }),
        )
    } else {
        (on_finally.clone(), on_finally)
    };
    rt.invoke(this, "then", &[then_finally, catch_finally])
}

/// Fulfillment side of `finally`: run the callback, then pass the value on
pub(crate) fn then_finally(
    rt: &mut Runtime,
    constructor: &Value,
    on_finally: &Value,
    value: Value,
) -> Result<Value> {
    let result = rt.call(on_finally, &Value::Undefined, &[])?;
    let promise = promise_resolve(rt, constructor, result)?;
    let value_thunk = rt.new_closure(BuiltinClosure::ValueThunk { value });
    rt.invoke(&promise, "then", &[value_thunk])
}

/// Rejection side of `finally`: run the callback, then rethrow the reason
pub(crate) fn catch_finally(
    rt: &mut Runtime,
    constructor: &Value,
    on_finally: &Value,
    reason: Value,
) -> Result<Value> {
    let result = rt.call(on_finally, &Value::Undefined, &[])?;
    let promise = promise_resolve(rt, constructor, result)?;
    let thrower = rt.new_closure(BuiltinClosure::Thrower { reason });
    rt.invoke(&promise, "then", &[thrower])
}
