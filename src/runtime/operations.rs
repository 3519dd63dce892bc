//! Object and function abstract operations
//!
//! Property access walks the prototype chain over data properties only.
//! Function calls dispatch on the object kind: native functions run their Rust
//! body, built-in closures run through [`closure::call_builtin_closure`].

use super::closure::{self, BuiltinClosure};
use super::realm::RealmId;
use super::value::{NativeConstructFn, NativeFn, ObjectKind, ObjectRef, PropertyKey, Value, WellKnownSymbol};
use super::Runtime;
use crate::error::{messages, Error, Result};
use std::rc::Rc;

enum Callee {
    Native(NativeFn),
    Closure(BuiltinClosure),
}

/// Short description of a value for error messages
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Object(obj) => match obj.try_borrow() {
            Ok(obj) => match &obj.kind {
                ObjectKind::NativeFunction { name, .. } => name.clone(),
                ObjectKind::Closure { closure, .. } => closure.name().to_string(),
                kind => format!("[object {}]", kind.class_name()),
            },
            Err(_) => "[object Object]".to_string(),
        },
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_js_string(),
    }
}

fn lookup(start: &ObjectRef, key: &PropertyKey) -> Value {
    let mut current = Some(start.clone());
    while let Some(obj) = current {
        let next = {
            let obj = obj.borrow();
            if let Some(value) = obj.get_own_property(key) {
                return value;
            }
            obj.prototype.clone()
        };
        current = next;
    }
    Value::Undefined
}

impl Runtime {
    /// Get a property value (\[\[Get\]\] with the value as receiver)
    pub fn get(&mut self, target: &Value, key: impl Into<PropertyKey>) -> Result<Value> {
        let key: PropertyKey = key.into();
        let start = match target {
            Value::Object(obj) => obj.clone(),
            Value::Undefined | Value::Null => {
                return Err(Error::type_error(messages::cannot_read_property(
                    &key.to_string(),
                    &target.to_js_string(),
                )))
            }
            Value::String(s) => {
                if key.is_string("length") {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = key.as_index() {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::String(c.to_string()))
                        .unwrap_or_default());
                }
                self.intrinsics().string_prototype.clone()
            }
            _ => return Ok(Value::Undefined),
        };
        Ok(lookup(&start, &key))
    }

    /// Set an own data property
    pub fn set(&mut self, target: &Value, key: impl Into<PropertyKey>, value: Value) -> Result<()> {
        let key: PropertyKey = key.into();
        match target {
            Value::Object(obj) => {
                obj.borrow_mut().set_property(key, value);
                Ok(())
            }
            Value::Undefined | Value::Null => Err(Error::type_error(format!(
                "Cannot set property '{}' of {}",
                key,
                target.to_js_string()
            ))),
            _ => Ok(()),
        }
    }

    /// Check for a property anywhere on the prototype chain
    pub fn has_property(&mut self, target: &Value, key: impl Into<PropertyKey>) -> bool {
        let key: PropertyKey = key.into();
        let mut current = target.as_object().cloned();
        while let Some(obj) = current {
            let next = {
                let obj = obj.borrow();
                if obj.has_own_property(&key) {
                    return true;
                }
                obj.prototype.clone()
            };
            current = next;
        }
        false
    }

    /// Delete an own property
    pub fn delete_property(&mut self, target: &Value, key: impl Into<PropertyKey>) -> bool {
        match target {
            Value::Object(obj) => obj.borrow_mut().delete_property(&key.into()),
            _ => false,
        }
    }

    /// GetMethod: `None` for undefined/null, TypeError for non-callables
    pub fn get_method(
        &mut self,
        target: &Value,
        key: impl Into<PropertyKey>,
    ) -> Result<Option<Value>> {
        let key: PropertyKey = key.into();
        let func = self.get(target, key.clone())?;
        if func.is_nullish() {
            return Ok(None);
        }
        if !func.is_callable() {
            return Err(Error::type_error(messages::not_a_function(&format!(
                "{}.{}",
                describe(target),
                key
            ))));
        }
        Ok(Some(func))
    }

    /// Call a function value
    pub fn call(&mut self, func: &Value, this: &Value, args: &[Value]) -> Result<Value> {
        let callee = match func {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::NativeFunction { func, .. } => Some(Callee::Native(func.clone())),
                ObjectKind::Closure { closure, .. } => Some(Callee::Closure(closure.clone())),
                _ => None,
            },
            _ => None,
        };
        match callee {
            Some(Callee::Native(native)) => native(self, this, args),
            Some(Callee::Closure(closure)) => closure::call_builtin_closure(self, &closure, args),
            None => Err(Error::type_error(messages::not_a_function(&describe(func)))),
        }
    }

    /// Construct with `new.target` equal to the constructor
    pub fn construct(&mut self, constructor: &Value, args: &[Value]) -> Result<Value> {
        self.construct_with_new_target(constructor, args, constructor)
    }

    /// Construct with an explicit `new.target`
    pub fn construct_with_new_target(
        &mut self,
        constructor: &Value,
        args: &[Value],
        new_target: &Value,
    ) -> Result<Value> {
        let construct: Option<NativeConstructFn> = match constructor {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::NativeFunction {
                    constructor: Some(construct),
                    ..
                } => Some(construct.clone()),
                _ => None,
            },
            _ => None,
        };
        match construct {
            Some(construct) => construct(self, args, new_target),
            None => Err(Error::type_error(messages::not_a_constructor(&describe(
                constructor,
            )))),
        }
    }

    /// Invoke: get a method by key and call it with `target` as receiver
    pub fn invoke(
        &mut self,
        target: &Value,
        key: impl Into<PropertyKey>,
        args: &[Value],
    ) -> Result<Value> {
        let func = self.get(target, key)?;
        self.call(&func, target, args)
    }

    /// SpeciesConstructor
    pub fn species_constructor(&mut self, object: &Value, default: &Value) -> Result<Value> {
        let constructor = self.get(object, "constructor")?;
        if constructor.is_undefined() {
            return Ok(default.clone());
        }
        if !constructor.is_object() {
            return Err(Error::type_error(messages::not_an_object(&format!(
                "{}.constructor",
                describe(object)
            ))));
        }
        let species = self.get(&constructor, WellKnownSymbol::Species)?;
        if species.is_nullish() {
            return Ok(default.clone());
        }
        if species.is_constructor() {
            return Ok(species);
        }
        Err(Error::type_error(messages::not_a_constructor(&format!(
            "{}[Symbol.species]",
            describe(&constructor)
        ))))
    }

    /// GetFunctionRealm; non-functions report the current realm
    pub fn get_function_realm(&self, func: &Value) -> RealmId {
        if let Value::Object(obj) = func {
            match &obj.borrow().kind {
                ObjectKind::NativeFunction { realm, .. } | ObjectKind::Closure { realm, .. } => {
                    return *realm
                }
                _ => {}
            }
        }
        self.current_realm()
    }

    /// Check whether `proto` is on the prototype chain of `value`
    pub fn inherits_from(&self, value: &Value, proto: &ObjectRef) -> bool {
        let mut current = value.as_object().and_then(|obj| obj.borrow().prototype.clone());
        while let Some(obj) = current {
            if Rc::ptr_eq(&obj, proto) {
                return true;
            }
            current = obj.borrow().prototype.clone();
        }
        false
    }
}
