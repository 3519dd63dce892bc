//! Built-in iterators over arrays and strings
//!
//! Also installs the `@@iterator` / `@@asyncIterator` methods that return the
//! receiver on `%IteratorPrototype%` and `%AsyncIteratorPrototype%`.

use crate::error::{messages, Error, Result};
use crate::iteration::record::{create_iter_result_object, IteratorRecord};
use crate::runtime::realm::{define_method, define_to_string_tag, return_this};
use crate::runtime::{describe, Intrinsics, ObjectKind, RealmId, Runtime, Value, WellKnownSymbol};

pub(crate) fn install(intrinsics: &Intrinsics, realm: RealmId) {
    define_method(
        &intrinsics.iterator_prototype,
        intrinsics,
        realm,
        WellKnownSymbol::Iterator,
        "[Symbol.iterator]",
        return_this,
    );
    define_method(
        &intrinsics.async_iterator_prototype,
        intrinsics,
        realm,
        WellKnownSymbol::AsyncIterator,
        "[Symbol.asyncIterator]",
        return_this,
    );

    define_method(
        &intrinsics.array_iterator_prototype,
        intrinsics,
        realm,
        "next",
        "next",
        list_iterator_next,
    );
    define_to_string_tag(&intrinsics.array_iterator_prototype, "Array Iterator");

    define_method(&intrinsics.array_prototype, intrinsics, realm, "values", "values", create_iterator_for_receiver);
    define_method(
        &intrinsics.array_prototype,
        intrinsics,
        realm,
        WellKnownSymbol::Iterator,
        "[Symbol.iterator]",
        create_iterator_for_receiver,
    );
    define_method(
        &intrinsics.string_prototype,
        intrinsics,
        realm,
        WellKnownSymbol::Iterator,
        "[Symbol.iterator]",
        create_iterator_for_receiver,
    );
}

fn create_iterator_for_receiver(rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    if this.is_nullish() {
        return Err(Error::type_error(messages::not_iterable(&describe(this))));
    }
    Ok(create_list_iterator(rt, this.clone()))
}

/// Create an iterator object over an array-like `source` (array or string)
pub fn create_list_iterator(rt: &mut Runtime, source: Value) -> Value {
    let proto = rt.intrinsics().array_iterator_prototype.clone();
    rt.alloc(
        ObjectKind::ListIterator {
            source,
            index: 0,
            exhausted: false,
        },
        Some(proto),
    )
}

/// CreateListIteratorRecord: an iterator record over a list of values
pub fn create_list_iterator_record(rt: &mut Runtime, values: Vec<Value>) -> Result<IteratorRecord> {
    let array = rt.new_array(values);
    let iterator = create_list_iterator(rt, array);
    let next_method = rt.get(&iterator, "next")?;
    Ok(IteratorRecord {
        iterator,
        next_method,
        done: false,
    })
}

fn list_iterator_next(rt: &mut Runtime, this: &Value, _args: &[Value]) -> Result<Value> {
    let incompatible =
        || Error::type_error(messages::incompatible_receiver("Array Iterator.prototype.next", &describe(this)));
    let Value::Object(obj) = this else {
        return Err(incompatible());
    };
    let position = {
        let mut obj = obj.borrow_mut();
        match &mut obj.kind {
            ObjectKind::ListIterator {
                source,
                index,
                exhausted,
            } => {
                if *exhausted {
                    None
                } else {
                    let current = *index;
                    *index += 1;
                    Some((source.clone(), current))
                }
            }
            _ => return Err(incompatible()),
        }
    };
    let Some((source, index)) = position else {
        return Ok(create_iter_result_object(rt, Value::Undefined, true));
    };

    let length = rt.get(&source, "length")?.to_number();
    if (index as f64) >= length || length.is_nan() {
        if let ObjectKind::ListIterator { exhausted, .. } = &mut obj.borrow_mut().kind {
            *exhausted = true;
        }
        return Ok(create_iter_result_object(rt, Value::Undefined, true));
    }
    let value = rt.get(&source, index)?;
    Ok(create_iter_result_object(rt, value, false))
}
