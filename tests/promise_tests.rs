//! Integration tests for the promise state machine and built-ins

mod common;
use common::*;
use settle::promise::{new_promise_capability, promise_is_handled, promise_then, resolved_promise};
use settle::runtime::arg;
use settle::{Error, RejectionOperation, Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;

mod settlement {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_settlement_wins() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let executor = rt.new_function("executor", |rt, _, args| {
            let (resolve, reject) = (arg(args, 0), arg(args, 1));
            rt.call(&resolve, &Value::Undefined, &[Value::from(1)])?;
            rt.call(&reject, &Value::Undefined, &[Value::from(2)])?;
            rt.call(&resolve, &Value::Undefined, &[Value::from(3)])?;
            Ok(Value::Undefined)
        });
        let promise = rt.construct(&ctor, &[executor]).unwrap();
        assert_eq!(fulfilled(&promise), Value::from(1));
    }

    #[test]
    fn test_executor_throw_rejects() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let executor = rt.new_function("executor", |_, _, _| Err(Error::throw(Value::from("boom"))));
        let promise = rt.construct(&ctor, &[executor]).unwrap();
        assert_eq!(rejected(&promise), Value::from("boom"));
    }

    #[test]
    fn test_executor_throw_after_resolve_is_ignored() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let executor = rt.new_function("executor", |rt, _, args| {
            rt.call(&arg(args, 0), &Value::Undefined, &[Value::from("ok")])?;
            Err(Error::throw(Value::from("late")))
        });
        let promise = rt.construct(&ctor, &[executor]).unwrap();
        assert_eq!(fulfilled(&promise), Value::from("ok"));
    }

    #[test]
    fn test_promise_requires_new() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let executor = rt.new_function("executor", |_, _, _| Ok(Value::Undefined));
        let err = rt.call(&ctor, &Value::Undefined, &[executor]).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_non_callable_executor() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        assert!(rt.construct(&ctor, &[Value::from(1)]).unwrap_err().is_type_error());
    }

    #[test]
    fn test_thenable_unwrap_defers() {
        let mut rt = Runtime::new();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        let thenable = thenable_resolving_to(&mut rt, Value::from(42));
        capability.resolve(&mut rt, thenable).unwrap();
        assert_pending(&capability.promise);

        rt.run_jobs();
        assert_eq!(fulfilled(&capability.promise), Value::from(42));
    }

    #[test]
    fn test_nested_thenables_unwrap_one_level_per_job() {
        let mut rt = Runtime::new();
        let inner = thenable_resolving_to(&mut rt, Value::from("deep"));
        let outer = thenable_resolving_to(&mut rt, inner);
        let capability = new_promise_capability(&mut rt, None).unwrap();
        capability.resolve(&mut rt, outer).unwrap();

        assert!(rt.run_one_job());
        assert_pending(&capability.promise);
        assert!(rt.run_one_job());
        assert_eq!(fulfilled(&capability.promise), Value::from("deep"));
    }

    #[test]
    fn test_self_resolution_is_type_error() {
        let mut rt = Runtime::new();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        let promise = capability.promise.clone();
        capability.resolve(&mut rt, promise).unwrap();
        let reason = rejected(&capability.promise);
        assert_eq!(get(&mut rt, &reason, "name"), Value::from("TypeError"));
    }

    #[test]
    fn test_then_getter_failure_rejects() {
        let mut rt = Runtime::new();
        let thenable = rt.new_object();
        let then = rt.new_function("then", |_, _, _| Err(Error::throw(Value::from("inner"))));
        rt.set(&thenable, "then", then).unwrap();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        capability.resolve(&mut rt, thenable).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&capability.promise), Value::from("inner"));
    }
}

mod reactions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let mut rt = Runtime::new();
        let log = new_log();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        for label in ["a", "b", "c"] {
            let handler = recorder(&mut rt, &log, label);
            promise_then(&mut rt, &capability.promise, handler, Value::Undefined).unwrap();
        }
        capability.resolve(&mut rt, Value::from(1)).unwrap();
        assert!(entries(&log).is_empty());

        rt.run_jobs();
        assert_eq!(entries(&log), vec!["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn test_already_settled_promise_still_defers() {
        let mut rt = Runtime::new();
        let log = new_log();
        let promise = resolved_promise(&mut rt, Value::from("x")).unwrap();
        let handler = recorder(&mut rt, &log, "then");
        promise_then(&mut rt, &promise, handler, Value::Undefined).unwrap();
        assert!(entries(&log).is_empty());
        assert_eq!(rt.pending_jobs(), 1);
        rt.run_jobs();
        assert_eq!(entries(&log), vec!["then:x"]);
    }

    #[test]
    fn test_reaction_order_follows_settlement_order() {
        let mut rt = Runtime::new();
        let log = new_log();
        let first = new_promise_capability(&mut rt, None).unwrap();
        let second = new_promise_capability(&mut rt, None).unwrap();
        let on_first = recorder(&mut rt, &log, "first");
        let on_second = recorder(&mut rt, &log, "second");
        promise_then(&mut rt, &first.promise, on_first, Value::Undefined).unwrap();
        promise_then(&mut rt, &second.promise, on_second, Value::Undefined).unwrap();

        second.resolve(&mut rt, Value::from(2)).unwrap();
        first.resolve(&mut rt, Value::from(1)).unwrap();
        rt.run_jobs();
        assert_eq!(entries(&log), vec!["second:2", "first:1"]);
    }

    #[test]
    fn test_handler_result_feeds_derived_promise() {
        let mut rt = Runtime::new();
        let promise = resolved_promise(&mut rt, Value::from(20)).unwrap();
        let double = rt.new_function("double", |_, _, args| Ok(Value::from(arg(args, 0).to_number() * 2.0)));
        let derived = promise_then(&mut rt, &promise, double, Value::Undefined).unwrap();
        rt.run_jobs();
        assert_eq!(fulfilled(&derived), Value::from(40));
    }

    #[test]
    fn test_handler_throw_rejects_derived_promise() {
        let mut rt = Runtime::new();
        let promise = resolved_promise(&mut rt, Value::Undefined).unwrap();
        let thrower = rt.new_function("thrower", |_, _, _| Err(Error::throw(Value::from("bad"))));
        let derived = promise_then(&mut rt, &promise, thrower, Value::Undefined).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&derived), Value::from("bad"));
    }

    #[test]
    fn test_missing_handlers_pass_through() {
        let mut rt = Runtime::new();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        let derived = promise_then(&mut rt, &capability.promise, Value::Undefined, Value::Undefined).unwrap();
        capability.reject(&mut rt, Value::from("why")).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&derived), Value::from("why"));
    }

    #[test]
    fn test_catch_and_finally() {
        let mut rt = Runtime::new();
        let log = new_log();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        let on_catch = rt.new_function("recover", |_, _, _| Ok(Value::from("recovered")));
        let caught = rt.invoke(&capability.promise, "catch", &[on_catch]).unwrap();
        let on_finally = recorder(&mut rt, &log, "finally");
        let finished = rt.invoke(&caught, "finally", &[on_finally]).unwrap();

        capability.reject(&mut rt, Value::from("oops")).unwrap();
        rt.run_jobs();
        assert_eq!(fulfilled(&caught), Value::from("recovered"));
        assert_eq!(fulfilled(&finished), Value::from("recovered"));
        // onFinally receives no arguments
        assert_eq!(entries(&log), vec!["finally:undefined"]);
    }

    #[test]
    fn test_finally_preserves_rejection() {
        let mut rt = Runtime::new();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        let on_finally = rt.new_function("cleanup", |_, _, _| Ok(Value::from("ignored")));
        let finished = rt.invoke(&capability.promise, "finally", &[on_finally]).unwrap();
        capability.reject(&mut rt, Value::from("original")).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&finished), Value::from("original"));
    }

    #[test]
    fn test_finally_throw_overrides() {
        let mut rt = Runtime::new();
        let promise = resolved_promise(&mut rt, Value::from(1)).unwrap();
        let on_finally = rt.new_function("cleanup", |_, _, _| Err(Error::throw(Value::from("cleanup failed"))));
        let finished = rt.invoke(&promise, "finally", &[on_finally]).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&finished), Value::from("cleanup failed"));
    }

    #[test]
    fn test_then_on_non_promise_receiver() {
        let mut rt = Runtime::new();
        let promise = resolved_promise(&mut rt, Value::Undefined).unwrap();
        let then = rt.get(&promise, "then").unwrap();
        let other = rt.new_object();
        assert!(rt.call(&then, &other, &[]).unwrap_err().is_type_error());
    }
}

mod statics {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_returns_same_promise() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let promise = resolved_promise(&mut rt, Value::from(1)).unwrap();
        let again = rt.invoke(&ctor, "resolve", &[promise.clone()]).unwrap();
        assert_eq!(again, promise);
    }

    #[test]
    fn test_reject_static() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let promise = rt.invoke(&ctor, "reject", &[Value::from("no")]).unwrap();
        assert_eq!(rejected(&promise), Value::from("no"));
    }

    #[test]
    fn test_with_resolvers() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let record = rt.invoke(&ctor, "withResolvers", &[]).unwrap();
        let promise = get(&mut rt, &record, "promise");
        let resolve = get(&mut rt, &record, "resolve");
        assert_pending(&promise);
        rt.call(&resolve, &Value::Undefined, &[Value::from("done")]).unwrap();
        assert_eq!(fulfilled(&promise), Value::from("done"));
    }

    #[test]
    fn test_species_is_constructor() {
        let mut rt = Runtime::new();
        let ctor = rt.promise_constructor();
        let species = rt.get(&ctor, settle::runtime::WellKnownSymbol::Species).unwrap();
        assert_eq!(species, ctor);
    }

    #[test]
    fn test_custom_constructor_capability() {
        let mut rt = Runtime::new();
        let log = new_log();
        let construct_log = log.clone();
        let custom = rt.new_constructor(
            "Custom",
            |_, _, _| Ok(Value::Undefined),
            move |rt, args, _| {
                let log = construct_log.clone();
                let resolve = rt.new_function("resolve", move |_, _, args| {
                    log.borrow_mut().push(format!("resolve:{}", arg(args, 0)));
                    Ok(Value::Undefined)
                });
                let reject = rt.new_function("reject", |_, _, _| Ok(Value::Undefined));
                rt.call(&arg(args, 0), &Value::Undefined, &[resolve, reject])?;
                Ok(rt.new_object())
            },
        );
        let capability = new_promise_capability(&mut rt, Some(&custom)).unwrap();
        capability.resolve(&mut rt, Value::from(7)).unwrap();
        assert_eq!(entries(&log), vec!["resolve:7"]);
    }

    #[test]
    fn test_executor_called_twice_is_type_error() {
        let mut rt = Runtime::new();
        let custom = rt.new_constructor(
            "Twice",
            |_, _, _| Ok(Value::Undefined),
            |rt, args, _| {
                let executor = arg(args, 0);
                let f = rt.new_function("f", |_, _, _| Ok(Value::Undefined));
                rt.call(&executor, &Value::Undefined, &[f.clone(), f.clone()])?;
                rt.call(&executor, &Value::Undefined, &[f.clone(), f])?;
                Ok(rt.new_object())
            },
        );
        let err = new_promise_capability(&mut rt, Some(&custom)).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_non_constructor_capability() {
        let mut rt = Runtime::new();
        let err = new_promise_capability(&mut rt, Some(&Value::from(1))).unwrap_err();
        assert!(err.is_type_error());
    }
}

mod realms {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_job_runs_in_function_realm() {
        let mut rt = Runtime::new();
        let main = rt.current_realm();
        let other = rt.create_realm();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let previous = rt.enter_realm(other);
        let seen_in_job = seen.clone();
        let callback = rt.new_function("callback", move |rt, _, _| {
            seen_in_job.borrow_mut().push(rt.current_realm());
            Ok(Value::Undefined)
        });
        rt.enter_realm(previous);

        rt.queue_microtask(callback, vec![]).unwrap();
        rt.run_jobs();
        assert_eq!(*seen.borrow(), vec![other]);
        assert_eq!(rt.current_realm(), main);
    }

    #[test]
    fn test_realms_have_distinct_promise_constructors() {
        let mut rt = Runtime::new();
        let main_ctor = rt.promise_constructor();
        let other = rt.create_realm();
        let previous = rt.enter_realm(other);
        let other_ctor = rt.promise_constructor();
        rt.enter_realm(previous);
        assert_ne!(main_ctor, other_ctor);
    }

    #[test]
    fn test_global_object_follows_current_realm() {
        let mut rt = Runtime::new();
        let main_global = rt.global_object();
        assert_eq!(get(&mut rt, &main_global, "Promise"), rt.promise_constructor());

        let other = rt.create_realm();
        let previous = rt.enter_realm(other);
        let other_global = rt.global_object();
        let other_ctor = rt.promise_constructor();
        rt.enter_realm(previous);

        assert_ne!(main_global, other_global);
        assert_eq!(get(&mut rt, &other_global, "Promise"), other_ctor);
    }

    #[test]
    fn test_queue_microtask_requires_callable() {
        let mut rt = Runtime::new();
        assert!(rt.queue_microtask(Value::from(1), vec![]).unwrap_err().is_type_error());
    }
}

mod rejection_tracking {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unhandled_rejection_is_reported() {
        let mut rt = Runtime::new();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        capability.reject(&mut rt, Value::from("lost")).unwrap();
        rt.run_jobs();
        let unhandled = rt.take_unhandled_rejections();
        assert_eq!(unhandled.len(), 1);
        assert_eq!(unhandled[0].reason, Value::from("lost"));
        assert!(rt.take_unhandled_rejections().is_empty());
    }

    #[test]
    fn test_late_handler_untracks() {
        let mut rt = Runtime::new();
        let capability = new_promise_capability(&mut rt, None).unwrap();
        capability.reject(&mut rt, Value::from("caught")).unwrap();
        let handler = rt.new_function("handler", |_, _, _| Ok(Value::Undefined));
        promise_then(&mut rt, &capability.promise, Value::Undefined, handler).unwrap();
        rt.run_jobs();
        assert!(rt.take_unhandled_rejections().is_empty());
        assert_eq!(promise_is_handled(&capability.promise), Some(true));
    }

    #[test]
    fn test_tracker_sees_reject_then_handle() {
        let mut rt = Runtime::new();
        let operations = Rc::new(RefCell::new(Vec::new()));
        let seen = operations.clone();
        rt.set_rejection_tracker(move |_, operation| seen.borrow_mut().push(operation));

        let capability = new_promise_capability(&mut rt, None).unwrap();
        capability.reject(&mut rt, Value::from(1)).unwrap();
        let handler = rt.new_function("handler", |_, _, _| Ok(Value::Undefined));
        promise_then(&mut rt, &capability.promise, Value::Undefined, handler).unwrap();

        assert_eq!(
            *operations.borrow(),
            vec![RejectionOperation::Reject, RejectionOperation::Handle]
        );
    }
}
