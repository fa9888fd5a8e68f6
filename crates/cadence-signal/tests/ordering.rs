use cadence_signal::{HookBus, HookError, Reply, SubscriberId, POST_ACTION, PRE_ACTION};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

// A finishes fully before B starts: each callback records enter/exit
#[test]
fn test_handlers_do_not_interleave() {
    let bus = HookBus::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    for name in ["A", "B"] {
        let log = Rc::clone(&log);
        bus.handler(SubscriberId::next(), PRE_ACTION, move |_| {
            log.borrow_mut().push(format!("{name}:enter"));
            log.borrow_mut().push(format!("{name}:exit"));
            Ok(Reply::done())
        });
    }

    bus.send(SubscriberId::next(), PRE_ACTION, &[]).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["A:enter", "A:exit", "B:enter", "B:exit"]
    );
}

#[test]
fn test_events_are_independent() {
    let bus = HookBus::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let me = SubscriberId::next();

    let pre_log = Rc::clone(&log);
    bus.handler(me, PRE_ACTION, move |_| {
        pre_log.borrow_mut().push("pre");
        Ok(Reply::done())
    });
    let post_log = Rc::clone(&log);
    bus.handler(me, POST_ACTION, move |_| {
        post_log.borrow_mut().push("post");
        Ok(Reply::done())
    });

    bus.send(me, POST_ACTION, &[]).unwrap();
    bus.send(me, "unknown_event", &[]).unwrap();
    assert_eq!(*log.borrow(), vec!["post"]);
}

#[test]
fn test_anyhow_errors_convert() {
    let bus = HookBus::new();
    bus.handler(SubscriberId::next(), PRE_ACTION, |signal| {
        let failure: anyhow::Result<()> = Err(anyhow::anyhow!("database offline"));
        failure.map_err(|e| HookError::from_source(signal.event, e))?;
        Ok(Reply::done())
    });

    let err = bus.send(SubscriberId::next(), PRE_ACTION, &[]).unwrap_err();
    assert_eq!(err.to_string(), "hook error (pre_action): database offline");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn invocation_follows_registration(owners in proptest::collection::vec(0usize..4, 0..20)) {
        let bus = HookBus::new();
        let subscribers: Vec<SubscriberId> = (0..4).map(|_| SubscriberId::next()).collect();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (index, owner) in owners.iter().enumerate() {
            let log = Rc::clone(&log);
            bus.handler(subscribers[*owner], PRE_ACTION, move |_| {
                log.borrow_mut().push(index);
                Ok(Reply::done())
            });
        }

        let responses = bus.send(subscribers[0], PRE_ACTION, &[]).unwrap();
        let expected: Vec<usize> = (0..owners.len()).collect();
        prop_assert_eq!(log.borrow().clone(), expected);
        let order: Vec<SubscriberId> = responses.iter().map(|r| r.subscriber).collect();
        let expected_order: Vec<SubscriberId> = owners.iter().map(|o| subscribers[*o]).collect();
        prop_assert_eq!(order, expected_order);
    }
}
