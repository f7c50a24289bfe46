//! Promise.race / all / allSettled / any driven through the event loop

mod common;

use std::rc::Rc;

use common::{assert_pending, elements, error_name, fulfilled, plover, rejected};
use plover_vm_core::object::PropertyDescriptor;
use plover_vm_core::{PropertyKey, VmError};
use plover_vm_runtime::{PloverError, Value};
use proptest::prelude::*;

#[test]
fn test_all_keeps_index_order_for_out_of_order_ticks() {
    let plover = plover();
    let inputs = [(3, "v0"), (1, "v1"), (2, "v2")]
        .into_iter()
        .map(|(tick, value)| plover.fulfill_at(tick, Value::string(value)).unwrap())
        .collect();
    let all = plover.call_static("all", &[plover.create_array(inputs)]).unwrap();

    plover.run_until(2).unwrap();
    assert_pending(&plover, &all);

    plover.run_until(3).unwrap();
    assert_eq!(
        elements(&fulfilled(&plover, &all)),
        vec![Value::string("v0"), Value::string("v1"), Value::string("v2")]
    );
}

#[test]
fn test_all_empty_resolves_immediately() {
    let plover = plover();
    let all = plover.call_static("all", &[plover.create_array(Vec::new())]).unwrap();
    assert!(elements(&fulfilled(&plover, &all)).is_empty());
}

#[test]
fn test_race_empty_never_settles() {
    let plover = plover();
    let race = plover.call_static("race", &[plover.create_array(Vec::new())]).unwrap();
    plover.run_until_idle().unwrap();
    assert_pending(&plover, &race);
}

#[test]
fn test_all_fails_fast_and_ignores_later_settlements() {
    let plover = plover();
    let inputs = vec![
        plover.fulfill_at(1, Value::int32(1)).unwrap(),
        plover.reject_at(2, Value::string("first")).unwrap(),
        plover.reject_at(3, Value::string("second")).unwrap(),
        plover.fulfill_at(4, Value::int32(4)).unwrap(),
    ];
    let all = plover.call_static("all", &[plover.create_array(inputs)]).unwrap();

    plover.run_until(2).unwrap();
    assert_eq!(rejected(&plover, &all), Value::string("first"));

    plover.run_until_idle().unwrap();
    assert_eq!(rejected(&plover, &all), Value::string("first"));
    assert_eq!(plover.current_tick(), 4);
}

#[test]
fn test_race_first_settlement_wins_even_if_rejection() {
    let plover = plover();
    let inputs = vec![
        plover.reject_at(1, Value::string("err")).unwrap(),
        plover.fulfill_at(2, Value::int32(5)).unwrap(),
    ];
    let race = plover.call_static("race", &[plover.create_array(inputs)]).unwrap();

    plover.run_until_idle().unwrap();
    assert_eq!(rejected(&plover, &race), Value::string("err"));
}

#[test]
fn test_race_ties_resolve_in_array_order() {
    let plover = plover();
    let inputs = vec![
        plover.call_static("resolve", &[Value::string("a")]).unwrap(),
        plover.call_static("resolve", &[Value::string("b")]).unwrap(),
    ];
    let race = plover.call_static("race", &[plover.create_array(inputs)]).unwrap();
    assert_pending(&plover, &race);

    plover.drain_jobs().unwrap();
    assert_eq!(fulfilled(&plover, &race), Value::string("a"));
}

#[test]
fn test_all_mixes_plain_values_and_promises() {
    let plover = plover();
    let two = plover.call_static("resolve", &[Value::int32(2)]).unwrap();
    let all = plover
        .call_static("all", &[plover.create_array(vec![Value::int32(1), two])])
        .unwrap();

    plover.run_until_idle().unwrap();
    assert_eq!(
        elements(&fulfilled(&plover, &all)),
        vec![Value::int32(1), Value::int32(2)]
    );
}

#[test]
fn test_all_adopts_thenables() {
    let plover = plover();
    let thenable = plover.realm().create_object();
    let then = plover.native_function("then", 2, |_this, args, ncx| {
        let resolve = args.first().cloned().unwrap_or_default();
        ncx.call_function(&resolve, &Value::undefined(), &[Value::string("adopted")])
    });
    thenable.define_property("then".into(), PropertyDescriptor::data(then));

    let all = plover
        .call_static("all", &[plover.create_array(vec![Value::object(thenable)])])
        .unwrap();
    plover.run_until_idle().unwrap();
    assert_eq!(elements(&fulfilled(&plover, &all)), vec![Value::string("adopted")]);
}

#[test]
fn test_non_array_input_rejects_instead_of_throwing() {
    let plover = plover();
    for kind in ["race", "all", "allSettled", "any"] {
        let object = Value::object(plover.realm().create_object());
        for input in [Value::undefined(), Value::number(1.0), Value::string("abc"), object] {
            let promise = plover.call_static(kind, &[input]).unwrap();
            let reason = rejected(&plover, &promise);
            assert_eq!(error_name(&plover, &reason), "TypeError", "Promise.{kind}");
        }
    }
}

#[test]
fn test_wrong_receiver_throws_synchronously() {
    let plover = plover();
    let items = plover.create_array(Vec::new());
    let plain = Value::object(plover.realm().create_object());
    for kind in ["race", "all", "allSettled", "any"] {
        for receiver in [Value::undefined(), Value::int32(3), plain.clone()] {
            let err = plover
                .call_static_with_receiver(kind, &receiver, &[items.clone()])
                .unwrap_err();
            assert!(
                matches!(err, PloverError::Vm(VmError::TypeError(_))),
                "Promise.{kind} with receiver {receiver:?}"
            );
        }
    }
    assert!(plover.event_loop().js_jobs().is_empty());
}

#[test]
fn test_capability_failure_throws_synchronously() {
    let plover = plover();
    let getter = plover.native_function("get prototype", 0, |_this, _args, _ncx| {
        Err(VmError::exception(Value::string("poisoned")))
    });
    plover.realm().promise_constructor().define_property(
        PropertyKey::string("prototype"),
        PropertyDescriptor::accessor(Some(getter), None),
    );

    let err = plover
        .call_static("all", &[plover.create_array(Vec::new())])
        .unwrap_err();
    let PloverError::Vm(err) = err else {
        panic!("expected VM error");
    };
    assert_eq!(err.into_value(plover.realm()), Value::string("poisoned"));
}

#[test]
fn test_element_read_failure_rejects() {
    let plover = plover();
    let items = plover.realm().create_array(vec![Value::int32(1)]);
    let getter = plover.native_function("", 0, |_this, _args, _ncx| {
        Err(VmError::exception(Value::string("trap")))
    });
    items.define_property(PropertyKey::Index(1), PropertyDescriptor::accessor(Some(getter), None));

    for kind in ["race", "all", "allSettled", "any"] {
        let promise = plover.call_static(kind, &[Value::object(items.clone())]).unwrap();
        // Element 0 is registered before the read fails, but the rejection
        // happens synchronously and wins.
        assert_eq!(rejected(&plover, &promise), Value::string("trap"), "Promise.{kind}");
        plover.run_until_idle().unwrap();
        assert_eq!(rejected(&plover, &promise), Value::string("trap"), "Promise.{kind}");
    }
}

#[test]
fn test_length_is_read_once() {
    let plover = plover();
    let items = plover
        .realm()
        .create_array(vec![Value::undefined(), Value::int32(2), Value::int32(3)]);
    let shrink = plover.native_function("", 0, |this, _args, _ncx| {
        if let Some(array) = this.as_object() {
            array.define_property("length".into(), PropertyDescriptor::data(Value::number(1.0)));
        }
        Ok(Value::int32(1))
    });
    items.define_property(PropertyKey::Index(0), PropertyDescriptor::accessor(Some(shrink), None));

    let all = plover.call_static("all", &[Value::object(items.clone())]).unwrap();
    plover.run_until_idle().unwrap();

    assert_eq!(items.array_length(), 1);
    assert_eq!(
        elements(&fulfilled(&plover, &all)),
        vec![Value::int32(1), Value::undefined(), Value::undefined()]
    );
}

#[test]
fn test_all_settled_reports_every_outcome_in_order() {
    let plover = plover();
    let inputs = vec![
        plover.reject_at(2, Value::string("no")).unwrap(),
        plover.fulfill_at(1, Value::int32(7)).unwrap(),
        Value::string("plain"),
    ];
    let settled = plover
        .call_static("allSettled", &[plover.create_array(inputs)])
        .unwrap();

    plover.run_until(1).unwrap();
    assert_pending(&plover, &settled);
    plover.run_until_idle().unwrap();

    let records = elements(&fulfilled(&plover, &settled));
    let field = |record: &Value, key: &str| plover.get(record, key).unwrap();
    assert_eq!(field(&records[0], "status"), Value::string("rejected"));
    assert_eq!(field(&records[0], "reason"), Value::string("no"));
    assert_eq!(field(&records[1], "status"), Value::string("fulfilled"));
    assert_eq!(field(&records[1], "value"), Value::int32(7));
    assert_eq!(field(&records[2], "value"), Value::string("plain"));
    assert_eq!(field(&records[2], "reason"), Value::undefined());
}

#[test]
fn test_any_fulfills_with_first_success() {
    let plover = plover();
    let inputs = vec![
        plover.reject_at(1, Value::string("a")).unwrap(),
        plover.fulfill_at(3, Value::string("slow")).unwrap(),
        plover.fulfill_at(2, Value::string("fast")).unwrap(),
    ];
    let any = plover.call_static("any", &[plover.create_array(inputs)]).unwrap();
    plover.run_until_idle().unwrap();
    assert_eq!(fulfilled(&plover, &any), Value::string("fast"));
}

#[test]
fn test_any_rejects_with_aggregate_error_in_index_order() {
    let plover = plover();
    let inputs = vec![
        plover.reject_at(2, Value::string("e0")).unwrap(),
        plover.reject_at(1, Value::string("e1")).unwrap(),
    ];
    let any = plover.call_static("any", &[plover.create_array(inputs)]).unwrap();
    plover.run_until_idle().unwrap();

    let error = rejected(&plover, &any);
    assert_eq!(error_name(&plover, &error), "AggregateError");
    assert_eq!(
        plover.get(&error, "message").unwrap(),
        Value::string("All promises were rejected")
    );
    let errors = plover.get(&error, "errors").unwrap();
    assert_eq!(elements(&errors), vec![Value::string("e0"), Value::string("e1")]);
}

#[test]
fn test_combinators_return_before_any_element_settles() {
    let plover = plover();
    let settled = plover.call_static("resolve", &[Value::int32(1)]).unwrap();
    for kind in ["race", "all", "allSettled", "any"] {
        let promise = plover
            .call_static(kind, &[plover.create_array(vec![settled.clone()])])
            .unwrap();
        assert_pending(&plover, &promise);
    }
    plover.run_until_idle().unwrap();
}

#[test]
fn test_each_call_gets_its_own_state() {
    let plover = plover();
    let shared = plover.fulfill_at(1, Value::int32(1)).unwrap();
    let first = plover
        .call_static("all", &[plover.create_array(vec![shared.clone()])])
        .unwrap();
    let second = plover
        .call_static("all", &[plover.create_array(vec![shared.clone(), shared])])
        .unwrap();
    plover.run_until_idle().unwrap();

    let first = fulfilled(&plover, &first);
    let second = fulfilled(&plover, &second);
    assert_eq!(elements(&first).len(), 1);
    assert_eq!(elements(&second).len(), 2);
    assert!(!Rc::ptr_eq(first.as_object().unwrap(), second.as_object().unwrap()));
}

proptest! {
    #[test]
    fn prop_all_output_follows_input_order(
        ticks in (1usize..8).prop_flat_map(|n| Just((1..=n as u64).collect::<Vec<_>>()).prop_shuffle()),
    ) {
        let plover = plover();
        let inputs = ticks
            .iter()
            .enumerate()
            .map(|(i, &tick)| plover.fulfill_at(tick, Value::number(i as f64)).unwrap())
            .collect();
        let all = plover.call_static("all", &[plover.create_array(inputs)]).unwrap();

        let last = ticks.len() as u64;
        plover.run_until(last - 1).unwrap();
        prop_assert_eq!(
            plover.promise_state(&all),
            Some(plover_vm_runtime::PromiseState::Pending)
        );

        plover.run_until_idle().unwrap();
        prop_assert_eq!(plover.current_tick(), last);
        let expected: Vec<Value> = (0..ticks.len()).map(|i| Value::number(i as f64)).collect();
        prop_assert_eq!(elements(&fulfilled(&plover, &all)), expected);
    }

    #[test]
    fn prop_race_settles_with_earliest_tick(
        ticks in prop::collection::vec(1u64..50, 1..8),
    ) {
        let plover = plover();
        let inputs = ticks
            .iter()
            .enumerate()
            .map(|(i, &tick)| plover.fulfill_at(tick, Value::number(i as f64)).unwrap())
            .collect();
        let race = plover.call_static("race", &[plover.create_array(inputs)]).unwrap();
        plover.run_until_idle().unwrap();

        let earliest = ticks.iter().min().copied().unwrap();
        let winner = ticks.iter().position(|&t| t == earliest).unwrap();
        prop_assert_eq!(fulfilled(&plover, &race), Value::number(winner as f64));
    }
}
