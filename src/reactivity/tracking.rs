// ============================================================================
// pulse-signals - Dependency Tracking
// Automatic read tracking and push-based invalidation
// ============================================================================
//
// Reads register edges, writes push invalidation. A read inside a tracking
// scope links the active node to the source it read. A write walks the
// subscriber graph once: computeds are marked dirty transitively, effects are
// collected and queued after the walk completes, so no effect observes a
// half-invalidated graph.
//
// Borrow safety follows the collect-then-mutate pattern throughout: no
// RefCell borrow is held across a call that might re-enter the graph.
// ============================================================================

use std::rc::Rc;

use crate::core::constants::{COMPUTED, DIRTY, DISPOSED, STATUS_MASK};
use crate::core::context::with_context;
use crate::core::types::{Dependent, Observable};
use crate::reactivity::scheduling::queue_dependent;

// =============================================================================
// TRACK READ - register dependency when reading a source
// =============================================================================

/// Record a read of `source` by the currently active node, if any.
///
/// No-op outside a tracking scope or inside `untrack`. The edge is recorded
/// on both sides: the node holds the source strongly, the source holds the
/// node weakly. Duplicate reads within one run register a single edge.
pub fn track_read(source: Rc<dyn Observable>) {
    let node = with_context(|ctx| {
        if ctx.is_untracking() {
            return None;
        }
        ctx.get_active_node().and_then(|weak| weak.upgrade())
    });

    let Some(node) = node else { return };

    // A node disposed mid-run must not regrow edges
    if node.flags() & DISPOSED != 0 {
        return;
    }

    // One edge per (node, source) pair regardless of read count
    let source_ptr = Rc::as_ptr(&source) as *const ();
    let mut already_tracked = false;
    node.for_each_dependency(&mut |dep| {
        if Rc::as_ptr(dep) as *const () == source_ptr {
            already_tracked = true;
            false
        } else {
            true
        }
    });
    if already_tracked {
        return;
    }

    source.add_subscriber(Rc::downgrade(&node));
    node.add_dependency(source);
}

// =============================================================================
// NOTIFY WRITE - entry point for source mutations
// =============================================================================

/// React to a value change on `source`.
///
/// Writes from inside a computed are rejected: derivations must stay pure or
/// the graph loses its glitch-freedom guarantee.
pub fn notify_write(source: Rc<dyn Observable>) {
    let inside_computed = with_context(|ctx| {
        ctx.get_active_node()
            .and_then(|weak| weak.upgrade())
            .is_some_and(|node| node.is_computed())
    });

    if inside_computed {
        panic!(
            "Cannot write to signals inside a computed. Derived values must be \
             pure functions of their dependencies."
        );
    }

    propagate_change(source);
}

// =============================================================================
// PROPAGATE CHANGE - mark-then-schedule invalidation walk
// =============================================================================

/// Push invalidation through the subscriber graph.
///
/// Computeds are marked dirty and traversed transitively; an already-dirty
/// computed is skipped, so diamonds terminate and each node is visited once.
/// Effects are collected (deduplicated by pointer) and queued only after the
/// whole walk finishes, guaranteeing each affected effect sees the fully
/// invalidated graph and runs at most once per change.
pub fn propagate_change(source: Rc<dyn Observable>) {
    let mut stack: Vec<Rc<dyn Observable>> = vec![source];
    let mut effects: Vec<Rc<dyn Dependent>> = Vec::new();

    while let Some(current) = stack.pop() {
        current.prune_dead_subscribers();
        current.for_each_subscriber(&mut |subscriber| {
            let flags = subscriber.flags();
            if flags & DISPOSED != 0 {
                return true;
            }

            if flags & COMPUTED != 0 {
                if flags & DIRTY == 0 {
                    subscriber.set_flags((flags & STATUS_MASK) | DIRTY);
                    if let Some(observable) = subscriber.as_observable() {
                        stack.push(observable);
                    }
                }
            } else {
                let ptr = Rc::as_ptr(&subscriber) as *const ();
                let seen = effects.iter().any(|e| Rc::as_ptr(e) as *const () == ptr);
                if !seen {
                    effects.push(subscriber);
                }
            }
            true
        });
    }

    for effect in effects {
        queue_dependent(effect);
    }
}

// =============================================================================
// RELEASE DEPENDENCIES - sever edges before re-run or on disposal
// =============================================================================

/// Sever every dependency edge of `node` from both sides.
///
/// Called before each re-run so the node re-tracks a fresh dependency set,
/// and on disposal.
pub fn release_dependencies(node: Rc<dyn Dependent>) {
    let mut deps: Vec<Rc<dyn Observable>> = Vec::new();
    node.for_each_dependency(&mut |dep| {
        deps.push(dep.clone());
        true
    });

    for dep in deps {
        dep.remove_subscriber(&node);
    }
    node.clear_dependencies();
}
