//! Integration tests for Promise.all, allSettled, any and race

mod common;
use common::*;
use settle::promise::{new_promise_capability, resolved_promise};
use settle::{Error, Runtime, Value};

fn combinator(rt: &mut Runtime, name: &str, iterable: Value) -> Value {
    let ctor = rt.promise_constructor();
    rt.invoke(&ctor, name, &[iterable]).expect("combinator call")
}

mod all {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_results_keep_input_order() {
        let mut rt = Runtime::new();
        let slow = new_promise_capability(&mut rt, None).unwrap();
        let fast = resolved_promise(&mut rt, Value::from(2)).unwrap();
        let thenable = thenable_resolving_to(&mut rt, Value::from(3));
        let input = rt.new_array(vec![slow.promise.clone(), fast, thenable]);
        let result = combinator(&mut rt, "all", input);

        rt.run_jobs();
        assert_pending(&result);
        slow.resolve(&mut rt, Value::from(1)).unwrap();
        rt.run_jobs();

        let values = fulfilled(&result);
        assert_eq!(
            array_values(&mut rt, &values),
            vec![Value::from(1), Value::from(2), Value::from(3)]
        );
    }

    #[test]
    fn test_first_rejection_wins() {
        let mut rt = Runtime::new();
        let pending = new_promise_capability(&mut rt, None).unwrap();
        let failing = new_promise_capability(&mut rt, None).unwrap();
        let input = rt.new_array(vec![pending.promise.clone(), failing.promise.clone()]);
        let result = combinator(&mut rt, "all", input);

        failing.reject(&mut rt, Value::from("first")).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&result), Value::from("first"));

        pending.resolve(&mut rt, Value::from(1)).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&result), Value::from("first"));
    }

    #[test]
    fn test_empty_resolves_synchronously() {
        let mut rt = Runtime::new();
        let input = rt.new_array(vec![]);
        let result = combinator(&mut rt, "all", input);
        let values = fulfilled(&result);
        assert!(array_values(&mut rt, &values).is_empty());
    }

    #[test]
    fn test_plain_values_are_accepted() {
        let mut rt = Runtime::new();
        let input = rt.new_array(vec![Value::from("a"), Value::from("b")]);
        let result = combinator(&mut rt, "all", input);
        rt.run_jobs();
        let values = fulfilled(&result);
        assert_eq!(array_values(&mut rt, &values), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_non_iterable_rejects() {
        let mut rt = Runtime::new();
        let result = combinator(&mut rt, "all", Value::from(5));
        let reason = rejected(&result);
        assert_eq!(get(&mut rt, &reason, "name"), Value::from("TypeError"));
    }

    #[test]
    fn test_strings_are_iterable() {
        let mut rt = Runtime::new();
        let result = combinator(&mut rt, "all", Value::from("xy"));
        rt.run_jobs();
        let values = fulfilled(&result);
        assert_eq!(array_values(&mut rt, &values), vec![Value::from("x"), Value::from("y")]);
    }
}

mod all_settled {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reports_every_outcome() {
        let mut rt = Runtime::new();
        let ok = resolved_promise(&mut rt, Value::from(1)).unwrap();
        let failing = new_promise_capability(&mut rt, None).unwrap();
        failing.reject(&mut rt, Value::from("x")).unwrap();
        let input = rt.new_array(vec![ok, failing.promise.clone()]);
        let result = combinator(&mut rt, "allSettled", input);
        rt.run_jobs();

        let entries = array_values(&mut rt, &fulfilled(&result));
        assert_eq!(entries.len(), 2);
        assert_eq!(get(&mut rt, &entries[0], "status"), Value::from("fulfilled"));
        assert_eq!(get(&mut rt, &entries[0], "value"), Value::from(1));
        assert_eq!(get(&mut rt, &entries[1], "status"), Value::from("rejected"));
        assert_eq!(get(&mut rt, &entries[1], "reason"), Value::from("x"));
    }

    #[test]
    fn test_empty_resolves_synchronously() {
        let mut rt = Runtime::new();
        let input = rt.new_array(vec![]);
        let result = combinator(&mut rt, "allSettled", input);
        fulfilled(&result);
    }
}

mod any {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_fulfillment_wins() {
        let mut rt = Runtime::new();
        let failing = new_promise_capability(&mut rt, None).unwrap();
        let ok = new_promise_capability(&mut rt, None).unwrap();
        let input = rt.new_array(vec![failing.promise.clone(), ok.promise.clone()]);
        let result = combinator(&mut rt, "any", input);

        failing.reject(&mut rt, Value::from("nope")).unwrap();
        ok.resolve(&mut rt, Value::from("yes")).unwrap();
        rt.run_jobs();
        assert_eq!(fulfilled(&result), Value::from("yes"));
    }

    #[test]
    fn test_all_rejected_aggregates_in_input_order() {
        let mut rt = Runtime::new();
        let first = new_promise_capability(&mut rt, None).unwrap();
        let second = new_promise_capability(&mut rt, None).unwrap();
        let input = rt.new_array(vec![first.promise.clone(), second.promise.clone()]);
        let result = combinator(&mut rt, "any", input);

        second.reject(&mut rt, Value::from("b")).unwrap();
        first.reject(&mut rt, Value::from("a")).unwrap();
        rt.run_jobs();

        let error = rejected(&result);
        assert_eq!(get(&mut rt, &error, "name"), Value::from("AggregateError"));
        let errors = get(&mut rt, &error, "errors");
        assert_eq!(array_values(&mut rt, &errors), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_empty_rejects_with_aggregate_error() {
        let mut rt = Runtime::new();
        let input = rt.new_array(vec![]);
        let result = combinator(&mut rt, "any", input);
        let error = rejected(&result);
        assert_eq!(get(&mut rt, &error, "name"), Value::from("AggregateError"));
        let errors = get(&mut rt, &error, "errors");
        assert!(array_values(&mut rt, &errors).is_empty());
    }
}

mod race {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_settlement_wins() {
        let mut rt = Runtime::new();
        let slow = new_promise_capability(&mut rt, None).unwrap();
        let fast = new_promise_capability(&mut rt, None).unwrap();
        let input = rt.new_array(vec![slow.promise.clone(), fast.promise.clone()]);
        let result = combinator(&mut rt, "race", input);

        fast.reject(&mut rt, Value::from("fast")).unwrap();
        slow.resolve(&mut rt, Value::from("slow")).unwrap();
        rt.run_jobs();
        assert_eq!(rejected(&result), Value::from("fast"));
    }

    #[test]
    fn test_empty_stays_pending() {
        let mut rt = Runtime::new();
        let input = rt.new_array(vec![]);
        let result = combinator(&mut rt, "race", input);
        rt.run_jobs();
        assert_pending(&result);
    }
}

mod iterator_protocol {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failure_after_step_closes_iterator() {
        let mut rt = Runtime::new();
        let log = new_log();
        let ctor = rt.promise_constructor();
        let proto = rt.get(&ctor, "prototype").unwrap();
        let broken_then = rt.new_function("then", |_, _, _| Err(Error::throw(Value::from("then failed"))));
        rt.set(&proto, "then", broken_then).unwrap();

        let iterator = logging_sync_iterator(&mut rt, vec![Value::from(1), Value::from(2)], &log);
        let iterable = iterable_of(&mut rt, iterator);
        let result = combinator(&mut rt, "all", iterable);

        assert_eq!(rejected(&result), Value::from("then failed"));
        assert_eq!(entries(&log), vec!["next:0", "return"]);
    }

    #[test]
    fn test_original_error_survives_throwing_return() {
        let mut rt = Runtime::new();
        let log = new_log();
        let ctor = rt.promise_constructor();
        let proto = rt.get(&ctor, "prototype").unwrap();
        let broken_then = rt.new_function("then", |_, _, _| Err(Error::throw(Value::from("then failed"))));
        rt.set(&proto, "then", broken_then).unwrap();

        let iterator = logging_sync_iterator(&mut rt, vec![Value::from(1), Value::from(2)], &log);
        let return_log = log.clone();
        let throwing_return = rt.new_function("return", move |_, _, _| {
            return_log.borrow_mut().push("return".to_string());
            Err(Error::throw(Value::from("return failed")))
        });
        rt.set(&iterator, "return", throwing_return).unwrap();
        let iterable = iterable_of(&mut rt, iterator);
        let result = combinator(&mut rt, "all", iterable);

        assert_eq!(rejected(&result), Value::from("then failed"));
        assert_eq!(entries(&log), vec!["next:0", "return"]);
    }

    #[test]
    fn test_throwing_next_does_not_close() {
        let mut rt = Runtime::new();
        let log = new_log();
        let iterator = rt.new_object();
        let next = rt.new_function("next", |_, _, _| Err(Error::throw(Value::from("next failed"))));
        let ret = recorder(&mut rt, &log, "return");
        rt.set(&iterator, "next", next).unwrap();
        rt.set(&iterator, "return", ret).unwrap();
        let iterable = iterable_of(&mut rt, iterator);

        let result = combinator(&mut rt, "race", iterable);
        assert_eq!(rejected(&result), Value::from("next failed"));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_non_callable_resolve_rejects_before_iterating() {
        let mut rt = Runtime::new();
        let log = new_log();
        let ctor = rt.promise_constructor();
        rt.set(&ctor, "resolve", Value::from(1)).unwrap();

        let iterator = logging_sync_iterator(&mut rt, vec![Value::from(1)], &log);
        let iterable = iterable_of(&mut rt, iterator);
        let result = combinator(&mut rt, "allSettled", iterable);

        let reason = rejected(&result);
        assert_eq!(get(&mut rt, &reason, "name"), Value::from("TypeError"));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_exhausted_iterator_is_not_closed() {
        let mut rt = Runtime::new();
        let log = new_log();
        let iterator = logging_sync_iterator(&mut rt, vec![Value::from(1)], &log);
        let iterable = iterable_of(&mut rt, iterator);
        let result = combinator(&mut rt, "all", iterable);
        rt.run_jobs();
        fulfilled(&result);
        assert_eq!(entries(&log), vec!["next:0", "next:1"]);
    }
}
