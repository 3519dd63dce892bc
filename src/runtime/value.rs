//! JavaScript value types
//!
//! This module defines the runtime representation of the values that flow
//! through promises and iterators. The object model is deliberately small:
//! data properties, a prototype link, and an internal-slot payload carried in
//! [`ObjectKind`].

use crate::error::{ErrorKind, Result};
use crate::iteration::helper::AsyncIteratorHelperState;
use crate::iteration::record::IteratorRecord;
use crate::promise::state::PromiseData;
use crate::runtime::closure::BuiltinClosure;
use crate::runtime::realm::RealmId;
use crate::runtime::Runtime;
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable object handle
pub type ObjectRef = Rc<RefCell<Object>>;

/// Type alias for native function implementations
///
/// Receives the runtime, the `this` value and the call arguments.
pub type NativeFn = Rc<dyn Fn(&mut Runtime, &Value, &[Value]) -> Result<Value>>;

/// Type alias for native `[[Construct]]` implementations
///
/// Receives the runtime, the arguments and `new.target`.
pub type NativeConstructFn = Rc<dyn Fn(&mut Runtime, &[Value], &Value) -> Result<Value>>;

/// Well-known symbols used by the promise and iteration protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSymbol {
    /// `Symbol.iterator`
    Iterator,
    /// `Symbol.asyncIterator`
    AsyncIterator,
    /// `Symbol.species`
    Species,
    /// `Symbol.toStringTag`
    ToStringTag,
}

impl WellKnownSymbol {
    pub fn description(&self) -> &'static str {
        match self {
            WellKnownSymbol::Iterator => "Symbol.iterator",
            WellKnownSymbol::AsyncIterator => "Symbol.asyncIterator",
            WellKnownSymbol::Species => "Symbol.species",
            WellKnownSymbol::ToStringTag => "Symbol.toStringTag",
        }
    }
}

/// Property key: a string or a well-known symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(String),
    Symbol(WellKnownSymbol),
}

impl PropertyKey {
    /// Array index encoded by this key, if any
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropertyKey::String(s) => {
                if s.len() > 1 && s.starts_with('0') {
                    return None;
                }
                s.parse::<usize>().ok()
            }
            PropertyKey::Symbol(_) => None,
        }
    }

    pub fn is_string(&self, name: &str) -> bool {
        matches!(self, PropertyKey::String(s) if s == name)
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::String(s)
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::String(index.to_string())
    }
}

impl From<WellKnownSymbol> for PropertyKey {
    fn from(symbol: WellKnownSymbol) -> Self {
        PropertyKey::Symbol(symbol)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Symbol(sym) => write!(f, "[{}]", sym.description()),
        }
    }
}

/// A JavaScript value
#[derive(Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Well-known symbol
    Symbol(WellKnownSymbol),
    /// Object (includes arrays, functions, promises, iterators)
    Object(ObjectRef),
}

impl Value {
    /// Wrap a fresh object
    pub fn from_object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is null or undefined
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Check if value is an object
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Borrow the object handle, if this is an object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get the type of the value as a string (typeof)
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::NativeFunction { .. } | ObjectKind::Closure { .. } => "function",
                _ => "object",
            },
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    /// Convert to number (ToNumber, without user-defined valueOf)
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Symbol(_) | Value::Object(_) => f64::NAN,
        }
    }

    /// Convert to JavaScript string representation
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(true) => "true".to_string(),
            Value::Boolean(false) => "false".to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Symbol(sym) => format!("Symbol({})", sym.description()),
            Value::Object(obj) => {
                let obj = match obj.try_borrow() {
                    Ok(obj) => obj,
                    Err(_) => return "[object Object]".to_string(),
                };
                match &obj.kind {
                    ObjectKind::Array(elements) => elements
                        .iter()
                        .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                        .collect::<Vec<_>>()
                        .join(","),
                    ObjectKind::Error { kind, message } => {
                        if message.is_empty() {
                            kind.name().to_string()
                        } else {
                            format!("{}: {}", kind.name(), message)
                        }
                    }
                    ObjectKind::NativeFunction { name, .. } => {
                        format!("function {}() {{ [native code] }}", name)
                    }
                    ObjectKind::Closure { .. } => "function () { [native code] }".to_string(),
                    kind => format!("[object {}]", kind.class_name()),
                }
            }
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// SameValue: like strict equality, but NaN equals NaN and +0 differs from -0
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.strict_equals(other),
        }
    }

    /// Check whether this value is a function object
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(
                obj.borrow().kind,
                ObjectKind::NativeFunction { .. } | ObjectKind::Closure { .. }
            ),
            _ => false,
        }
    }

    /// Check whether this value has a `[[Construct]]` internal method
    pub fn is_constructor(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(
                obj.borrow().kind,
                ObjectKind::NativeFunction {
                    constructor: Some(_),
                    ..
                }
            ),
            _ => false,
        }
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Symbol(sym) => write!(f, "Symbol({})", sym.description()),
            Value::Object(obj) => match obj.try_borrow() {
                Ok(obj) => match &obj.kind {
                    ObjectKind::Array(arr) => write!(f, "{:?}", arr),
                    ObjectKind::NativeFunction { name, .. } => write!(f, "[Function: {}]", name),
                    ObjectKind::Closure { closure, .. } => {
                        write!(f, "[Function: {}]", closure.name())
                    }
                    ObjectKind::Error { kind, message } => write!(f, "{}: {}", kind, message),
                    ObjectKind::Promise(data) => write!(f, "Promise {{ <{:?}> }}", data.state),
                    kind => write!(f, "[object {}]", kind.class_name()),
                },
                Err(_) => write!(f, "[object <borrowed>]"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

/// JavaScript object
pub struct Object {
    /// Object kind (internal slots)
    pub kind: ObjectKind,
    /// Own data properties
    pub properties: HashMap<PropertyKey, Value>,
    /// Prototype
    pub prototype: Option<ObjectRef>,
}

impl Object {
    /// Create a new ordinary object with the given prototype
    pub fn new(prototype: Option<ObjectRef>) -> Self {
        Self::with_kind(ObjectKind::Ordinary, prototype)
    }

    /// Create an object with internal slots
    pub fn with_kind(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            properties: HashMap::default(),
            prototype,
        }
    }

    /// Get an own property (including array elements and `length`)
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<Value> {
        if let ObjectKind::Array(elements) = &self.kind {
            if key.is_string("length") {
                return Some(Value::Number(elements.len() as f64));
            }
            if let Some(index) = key.as_index() {
                return elements.get(index).cloned();
            }
        }
        self.properties.get(key).cloned()
    }

    /// Check for an own property
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        if let ObjectKind::Array(elements) = &self.kind {
            if key.is_string("length") {
                return true;
            }
            if let Some(index) = key.as_index() {
                return index < elements.len();
            }
        }
        self.properties.contains_key(key)
    }

    /// Set an own data property
    pub fn set_property(&mut self, key: PropertyKey, value: Value) {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if let Some(index) = key.as_index() {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return;
            }
            if key.is_string("length") {
                let len = value.to_number();
                if len.is_finite() && len >= 0.0 {
                    elements.resize(len as usize, Value::Undefined);
                }
                return;
            }
        }
        self.properties.insert(key, value);
    }

    /// Delete an own property, returning whether it existed
    pub fn delete_property(&mut self, key: &PropertyKey) -> bool {
        self.properties.remove(key).is_some()
    }
}

/// Object kinds, each carrying the internal slots of that kind of object
pub enum ObjectKind {
    /// Ordinary object
    Ordinary,
    /// Array exotic object
    Array(Vec<Value>),
    /// Native function, optionally constructible
    NativeFunction {
        name: String,
        func: NativeFn,
        constructor: Option<NativeConstructFn>,
        realm: RealmId,
    },
    /// Built-in closure carrying its captured state
    Closure {
        closure: BuiltinClosure,
        realm: RealmId,
    },
    /// Error object
    Error { kind: ErrorKind, message: String },
    /// Promise object
    Promise(PromiseData),
    /// Iterator over an array or a string
    ListIterator {
        source: Value,
        index: usize,
        exhausted: bool,
    },
    /// Async-from-sync iterator adapter
    AsyncFromSyncIterator(IteratorRecord),
    /// Async iterator helper
    AsyncIteratorHelper(AsyncIteratorHelperState),
    /// Wrapper that gives a foreign iterator `%AsyncIteratorPrototype%` methods
    WrapForAsyncIterator { iterated: IteratorRecord, valid: bool },
}

impl ObjectKind {
    /// Class name used by Object.prototype.toString-style output
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::NativeFunction { .. } | ObjectKind::Closure { .. } => "Function",
            ObjectKind::Error { .. } => "Error",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::ListIterator { .. } => "Array Iterator",
            ObjectKind::AsyncFromSyncIterator(_) => "Async-from-Sync Iterator",
            ObjectKind::AsyncIteratorHelper(_) => "Async Iterator Helper",
            ObjectKind::WrapForAsyncIterator { .. } => "Async Iterator",
        }
    }
}

impl fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_name())
    }
}
