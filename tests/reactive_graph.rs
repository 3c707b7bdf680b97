use pulse_signals::{
    batch, cloned, computed, create_signal, create_transition, effect, effect_with_cleanup,
    signal, untrack, with_error_boundary,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn end_to_end_pipeline() {
    let count = signal(0);
    let doubled = computed(cloned!(count => move || count.get() * 2));
    let seen = Rc::new(Cell::new(-1));

    let _handle = effect(cloned!(doubled, seen => move || seen.set(doubled.get())));
    assert_eq!(seen.get(), 0);

    count.set(5);
    assert_eq!(seen.get(), 10);

    count.set(21);
    assert_eq!(seen.get(), 42);
}

#[test]
fn diamond_is_glitch_free() {
    // base feeds two computeds that feed one effect: one write, one run,
    // and the effect never sees one branch updated before the other
    let base = signal(1);
    let left = computed(cloned!(base => move || base.get() + 1));
    let right = computed(cloned!(base => move || base.get() + 1));

    let runs = Rc::new(Cell::new(0));
    let mismatches = Rc::new(Cell::new(0));

    let _handle = effect(cloned!(left, right, runs, mismatches => move || {
        runs.set(runs.get() + 1);
        if left.get() != right.get() {
            mismatches.set(mismatches.get() + 1);
        }
    }));
    assert_eq!(runs.get(), 1);

    for i in 2..10 {
        base.set(i);
    }
    assert_eq!(runs.get(), 9);
    assert_eq!(mismatches.get(), 0);
}

#[test]
fn no_op_write_is_silent() {
    let count = signal(7);
    let runs = Rc::new(Cell::new(0));

    let _handle = effect(cloned!(count, runs => move || {
        let _ = count.get();
        runs.set(runs.get() + 1);
    }));
    assert_eq!(runs.get(), 1);

    assert!(!count.set(7));
    assert_eq!(runs.get(), 1);
}

#[test]
fn equal_computed_result_shields_downstream() {
    let n = signal(1);
    let parity = computed(cloned!(n => move || n.get() % 2));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let _handle = effect(cloned!(parity, seen => move || {
        seen.borrow_mut().push(parity.get());
    }));
    assert_eq!(*seen.borrow(), vec![1]);

    // 1 -> 3 keeps parity at 1: effect re-runs (it was invalidated) but
    // observes the cached value
    n.set(3);
    assert_eq!(*seen.borrow(), vec![1, 1]);

    n.set(4);
    assert_eq!(*seen.borrow(), vec![1, 1, 0]);
}

#[test]
fn dynamic_branches_retrack() {
    let show_details = signal(false);
    let summary = signal(String::from("brief"));
    let details = signal(String::from("long"));
    let runs = Rc::new(Cell::new(0));

    let _handle = effect(cloned!(show_details, summary, details, runs => move || {
        runs.set(runs.get() + 1);
        if show_details.get() {
            details.with(|d| d.len());
        } else {
            summary.with(|s| s.len());
        }
    }));
    assert_eq!(runs.get(), 1);

    // details is not a dependency while the flag is false
    details.set(String::from("longer"));
    assert_eq!(runs.get(), 1);

    show_details.set(true);
    assert_eq!(runs.get(), 2);

    // now the roles flip
    summary.set(String::from("briefer"));
    assert_eq!(runs.get(), 2);
    details.set(String::from("longest"));
    assert_eq!(runs.get(), 3);
}

#[test]
fn untrack_reads_are_invisible() {
    let watched = signal(0);
    let peeked = signal(0);
    let sum = Rc::new(Cell::new(0));
    let runs = Rc::new(Cell::new(0));

    let _handle = effect(cloned!(watched, peeked, sum, runs => move || {
        runs.set(runs.get() + 1);
        sum.set(watched.get() + untrack(cloned!(peeked => move || peeked.get())));
    }));
    assert_eq!(sum.get(), 0);

    peeked.set(100);
    assert_eq!(runs.get(), 1); // no re-run

    watched.set(1);
    assert_eq!(runs.get(), 2);
    assert_eq!(sum.get(), 101); // but the fresh peeked value is visible
}

#[test]
fn cleanup_ordering_across_runs() {
    let conn = signal(1);
    let log = Rc::new(RefCell::new(Vec::new()));

    let handle = effect_with_cleanup(cloned!(conn, log => move || {
        let id = conn.get();
        log.borrow_mut().push(format!("open {id}"));
        let log = log.clone();
        Some(Box::new(move || log.borrow_mut().push(format!("close {id}"))) as Box<dyn FnOnce()>)
    }));

    conn.set(2);
    conn.set(3);
    handle.dispose();

    assert_eq!(
        *log.borrow(),
        vec!["open 1", "close 1", "open 2", "close 2", "open 3", "close 3"]
    );
}

#[test]
fn disposal_is_permanent_and_idempotent() {
    let count = signal(0);
    let runs = Rc::new(Cell::new(0));

    let handle = effect(cloned!(count, runs => move || {
        let _ = count.get();
        runs.set(runs.get() + 1);
    }));
    assert_eq!(runs.get(), 1);

    handle.dispose();
    handle.dispose();
    assert!(handle.is_disposed());

    count.set(1);
    count.set(2);
    assert_eq!(runs.get(), 1);
}

#[test]
fn write_during_batch_then_dispose_skips_run() {
    let count = signal(0);
    let runs = Rc::new(Cell::new(0));

    let handle = effect(cloned!(count, runs => move || {
        let _ = count.get();
        runs.set(runs.get() + 1);
    }));
    assert_eq!(runs.get(), 1);

    batch(|| {
        count.set(1);
        // disposed while its run is still queued
        handle.dispose();
    });
    assert_eq!(runs.get(), 1);
}

#[test]
fn error_boundary_contains_effect_panics() {
    let count = signal(1);
    let errors = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::new(Cell::new(0));

    let mut guarded = {
        let (count, errors, seen) = (count.clone(), errors.clone(), seen.clone());
        with_error_boundary(
            move || {
                let (count, seen) = (count.clone(), seen.clone());
                effect(move || {
                    let v = count.get();
                    if v < 0 {
                        panic!("negative value: {v}");
                    }
                    seen.set(v);
                })
            },
            move |err| errors.borrow_mut().push(err.message().to_string()),
        )
    };
    let _handle = guarded().expect("effect creation succeeds");
    assert_eq!(seen.get(), 1);

    count.set(-5);
    assert_eq!(*errors.borrow(), vec!["negative value: -5"]);
    assert_eq!(seen.get(), 1);

    // The rest of the graph is unaffected and the effect recovers
    count.set(3);
    assert_eq!(seen.get(), 3);
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn transition_defers_new_observers_until_start_exits() {
    let t = create_transition();
    let items = signal(0);
    let observed = Rc::new(Cell::new(-1));

    t.start(cloned!(t, items, observed => move || {
        items.set(500);
        let _handle = t.effect(cloned!(items, observed => move || {
            observed.set(items.get());
        }));
        // While the callback runs, the observer is deferred
        assert_eq!(observed.get(), -1);
    }));

    // start released the deferred run on its way out
    assert_eq!(items.get(), 500);
    assert_eq!(observed.get(), 500);
}

#[test]
fn split_signal_read_write_halves() {
    let (door, set_door) = create_signal(false);
    let states = Rc::new(RefCell::new(Vec::new()));

    let _handle = effect(cloned!(door, states => move || {
        states.borrow_mut().push(door.get());
    }));

    set_door.set(true);
    set_door.set_with(|open| !open);

    assert_eq!(*states.borrow(), vec![false, true, false]);
}

#[test]
#[should_panic(expected = "Maximum update depth exceeded")]
fn self_triggering_effect_is_detected() {
    let count = signal(0);

    let _handle = effect(cloned!(count => move || {
        let v = count.get();
        count.set(v + 1); // writes its own dependency
    }));
}

#[test]
fn computed_chain_updates_through_levels() {
    let celsius = signal(0.0f64);
    let fahrenheit = computed(cloned!(celsius => move || celsius.get() * 9.0 / 5.0 + 32.0));
    let label = computed(cloned!(fahrenheit => move || format!("{:.0}F", fahrenheit.get())));

    assert_eq!(label.get(), "32F");

    celsius.set(100.0);
    assert_eq!(label.get(), "212F");
}
