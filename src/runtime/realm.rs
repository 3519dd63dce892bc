//! Realms and their intrinsic objects
//!
//! Every realm owns a complete set of intrinsics. Jobs remember the realm they
//! were created in so that objects allocated while a job runs come from the
//! right set of prototypes.

use crate::runtime::value::{
    NativeConstructFn, NativeFn, Object, ObjectKind, ObjectRef, PropertyKey, Value,
    WellKnownSymbol,
};
use crate::runtime::Runtime;
use crate::error::Result;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identifies a realm owned by a [`Runtime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(usize);

impl RealmId {
    pub(crate) fn new(index: usize) -> Self {
        RealmId(index)
    }

    /// Position of the realm in creation order
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "realm#{}", self.0)
    }
}

/// Intrinsic objects of a realm
pub struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub error_prototype: ObjectRef,
    pub iterator_prototype: ObjectRef,
    pub array_iterator_prototype: ObjectRef,
    pub async_iterator_prototype: ObjectRef,
    pub async_from_sync_iterator_prototype: ObjectRef,
    pub async_iterator_helper_prototype: ObjectRef,
    pub wrap_for_async_iterator_prototype: ObjectRef,
    pub wrap_for_valid_async_iterator_prototype: ObjectRef,
    pub promise_prototype: ObjectRef,
    pub promise_constructor: ObjectRef,
}

/// A realm: intrinsics plus a global object
pub struct Realm {
    pub id: RealmId,
    pub intrinsics: Intrinsics,
    pub global: ObjectRef,
}

impl Realm {
    /// Build a realm with a fresh set of intrinsics
    pub(crate) fn new(id: RealmId) -> Self {
        let object_prototype = plain_object(None);
        let function_prototype = plain_object(Some(&object_prototype));
        let array_prototype = plain_object(Some(&object_prototype));
        let string_prototype = plain_object(Some(&object_prototype));
        let error_prototype = plain_object(Some(&object_prototype));
        let iterator_prototype = plain_object(Some(&object_prototype));
        let array_iterator_prototype = plain_object(Some(&iterator_prototype));
        let async_iterator_prototype = plain_object(Some(&object_prototype));
        let async_from_sync_iterator_prototype = plain_object(Some(&async_iterator_prototype));
        let async_iterator_helper_prototype = plain_object(Some(&async_iterator_prototype));
        let wrap_for_async_iterator_prototype = plain_object(Some(&async_iterator_prototype));
        let wrap_for_valid_async_iterator_prototype =
            plain_object(Some(&async_iterator_prototype));
        let promise_prototype = plain_object(Some(&object_prototype));
        let promise_constructor =
            crate::promise::builtins::create_promise_constructor(&function_prototype, id);

        let intrinsics = Intrinsics {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            error_prototype,
            iterator_prototype,
            array_iterator_prototype,
            async_iterator_prototype,
            async_from_sync_iterator_prototype,
            async_iterator_helper_prototype,
            wrap_for_async_iterator_prototype,
            wrap_for_valid_async_iterator_prototype,
            promise_prototype,
            promise_constructor,
        };

        install_error_prototype(&intrinsics);
        crate::promise::builtins::install(&intrinsics, id);
        crate::iteration::list_iterator::install(&intrinsics, id);
        crate::iteration::async_from_sync::install(&intrinsics, id);
        crate::iteration::helper::install(&intrinsics, id);
        crate::iteration::wrap::install(&intrinsics, id);

        let global = plain_object(Some(&intrinsics.object_prototype));
        global.borrow_mut().set_property(
            PropertyKey::from("Promise"),
            Value::Object(intrinsics.promise_constructor.clone()),
        );

        Realm {
            id,
            intrinsics,
            global,
        }
    }
}

fn plain_object(prototype: Option<&ObjectRef>) -> ObjectRef {
    Rc::new(RefCell::new(Object::new(prototype.cloned())))
}

fn install_error_prototype(intrinsics: &Intrinsics) {
    let mut proto = intrinsics.error_prototype.borrow_mut();
    proto.set_property(PropertyKey::from("name"), Value::from("Error"));
    proto.set_property(PropertyKey::from("message"), Value::from(""));
}

/// Allocate a native function object belonging to `realm`
pub(crate) fn native_function(
    function_prototype: &ObjectRef,
    realm: RealmId,
    name: &str,
    func: NativeFn,
    constructor: Option<NativeConstructFn>,
) -> ObjectRef {
    let mut object = Object::with_kind(
        ObjectKind::NativeFunction {
            name: name.to_string(),
            func,
            constructor,
            realm,
        },
        Some(function_prototype.clone()),
    );
    object.set_property(PropertyKey::from("name"), Value::from(name));
    Rc::new(RefCell::new(object))
}

/// Define a built-in method on `target`
pub(crate) fn define_method<F>(
    target: &ObjectRef,
    intrinsics: &Intrinsics,
    realm: RealmId,
    key: impl Into<PropertyKey>,
    name: &str,
    func: F,
) where
    F: Fn(&mut Runtime, &Value, &[Value]) -> Result<Value> + 'static,
{
    let function = native_function(
        &intrinsics.function_prototype,
        realm,
        name,
        Rc::new(func),
        None,
    );
    target
        .borrow_mut()
        .set_property(key.into(), Value::Object(function));
}

/// `%IteratorPrototype%[@@iterator]` and friends: return the receiver
pub(crate) fn return_this(_rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(this.clone())
}

/// Define `[Symbol.toStringTag]` on a prototype
pub(crate) fn define_to_string_tag(target: &ObjectRef, tag: &str) {
    target.borrow_mut().set_property(
        PropertyKey::Symbol(WellKnownSymbol::ToStringTag),
        Value::from(tag),
    );
}
