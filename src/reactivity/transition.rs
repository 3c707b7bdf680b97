// ============================================================================
// pulse-signals - Transitions
// Deferred effect work for low-priority updates
// ============================================================================
//
// A transition batches its writes like `batch`, but effects created through
// the transition hold their initial run in an instance queue until the
// `start` callback finishes; `start` drains the queue on exit. A callback
// that kicks off asynchronous work re-enters through `flush_pending` when
// that work completes to release anything queued during the gap.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::core::types::Dependent;
use crate::primitives::effect::{create_effect, CleanupFn, Disposer, EffectFn};
use crate::reactivity::batching::batch;
use crate::reactivity::scheduling::{queue_dependent, Task};

// =============================================================================
// TRANSITION
// =============================================================================

struct TransitionInner {
    active: Cell<bool>,
    pending: RefCell<Vec<Task>>,
}

/// A reusable low-priority update scope.
///
/// `start` runs a closure with the transition active, batching its writes.
/// Effects created through [`Transition::effect`] while active hold their
/// initial run in the transition's pending queue; `start` drains the queue
/// as it exits, so by the time it returns every deferred run has happened.
#[derive(Clone)]
pub struct Transition {
    inner: Rc<TransitionInner>,
}

impl Transition {
    /// Run `f` with this transition active.
    ///
    /// Writes inside `f` are batched and effects created through
    /// [`Transition::effect`] are deferred for the duration of `f`; both are
    /// released when the outermost `start` exits. A nested `start` on an
    /// already-active transition just batches; the outermost call owns the
    /// active flag and the final flush.
    pub fn start<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.inner.active.get() {
            return batch(f);
        }

        self.inner.active.set(true);

        struct ActiveGuard<'a>(&'a Cell<bool>);
        impl Drop for ActiveGuard<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }

        let result = {
            let _guard = ActiveGuard(&self.inner.active);
            batch(f)
        };
        // Guard dropped: deferred runs are released at normal priority,
        // outside the batch and with the flag reset
        self.flush_pending();
        result
    }

    /// Create an effect whose initial run waits for the end of `start`.
    ///
    /// With the transition inactive this behaves exactly like [`effect`].
    ///
    /// [`effect`]: crate::effect
    pub fn effect<F>(&self, mut f: F) -> Disposer
    where
        F: FnMut() + 'static,
    {
        let func: EffectFn = Box::new(move || {
            f();
            None::<CleanupFn>
        });
        let effect = create_effect(func, None);

        if self.inner.active.get() {
            trace!("effect deferred by transition");
            let node = effect.clone() as Rc<dyn Dependent>;
            self.inner
                .pending
                .borrow_mut()
                .push(Box::new(move || queue_dependent(node)));
        } else {
            queue_dependent(effect.clone() as Rc<dyn Dependent>);
        }

        Disposer::from_inner(effect)
    }

    /// Release all deferred initial runs.
    ///
    /// `start` calls this on exit; the public entry point exists for the
    /// two-phase async protocol, where a callback kicks off asynchronous
    /// work and its continuation re-enters here to release effects queued
    /// during the gap. Runs queued while the flush itself executes are
    /// picked up by the same flush, and flushing an empty queue is a no-op.
    pub fn flush_pending(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if tasks.is_empty() {
                break;
            }
            trace!(count = tasks.len(), "flushing transition work");
            for task in tasks {
                task();
            }
        }
    }

    /// Whether the transition is currently active.
    pub fn is_transitioning(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of deferred runs waiting for a flush.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }
}

/// Create a new transition.
///
/// # Example
///
/// ```
/// use pulse_signals::{create_transition, signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let t = create_transition();
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let (count2, seen2, t2) = (count.clone(), seen.clone(), t.clone());
/// t.start(move || {
///     count2.set(10);
///     let (count3, seen3) = (count2.clone(), seen2.clone());
///     let _handle = t2.effect(move || seen3.set(count3.get()));
///     // Deferred: the observer has not run yet
///     assert_eq!(seen2.get(), -1);
/// });
///
/// // start drained its pending queue on the way out
/// assert_eq!(seen.get(), 10);
/// ```
pub fn create_transition() -> Transition {
    Transition {
        inner: Rc::new(TransitionInner {
            active: Cell::new(false),
            pending: RefCell::new(Vec::new()),
        }),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::effect::effect;
    use crate::primitives::signal::signal;

    #[test]
    fn start_batches_writes() {
        let t = create_transition();
        let a = signal(1);
        let b = signal(2);
        let runs = Rc::new(Cell::new(0));

        let _handle = {
            let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
            effect(move || {
                let _ = a.get() + b.get();
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        {
            let (a, b) = (a.clone(), b.clone());
            t.start(move || {
                a.set(10);
                b.set(20);
            });
        }
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn transition_effect_runs_when_start_exits() {
        let t = create_transition();
        let count = signal(5);
        let seen = Rc::new(Cell::new(-1));

        {
            let (t2, count, seen) = (t.clone(), count.clone(), seen.clone());
            t.start(move || {
                count.set(10);
                let seen2 = seen.clone();
                let _handle = t2.effect(move || seen2.set(count.get()));
                // Deferred while the callback is still running
                assert_eq!(seen.get(), -1);
                assert_eq!(t2.pending_count(), 1);
            });
        }

        // start drained its own queue on exit with the flag reset
        assert_eq!(seen.get(), 10);
        assert_eq!(t.pending_count(), 0);
        assert!(!t.is_transitioning());
    }

    #[test]
    fn deferred_effect_tracks_after_start() {
        let t = create_transition();
        let count = signal(0);
        let runs = Rc::new(Cell::new(0));

        {
            let (t2, count, runs) = (t.clone(), count.clone(), runs.clone());
            t.start(move || {
                let runs2 = runs.clone();
                let _handle = t2.effect(move || {
                    let _ = count.get();
                    runs2.set(runs2.get() + 1);
                });
                assert_eq!(runs.get(), 0);
            });
        }
        assert_eq!(runs.get(), 1);

        // After start it behaves like a normal effect
        count.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn effect_outside_transition_runs_immediately() {
        let t = create_transition();
        let ran = Rc::new(Cell::new(false));

        let ran_clone = ran.clone();
        let _handle = t.effect(move || ran_clone.set(true));

        assert!(ran.get());
        assert_eq!(t.pending_count(), 0);
    }

    #[test]
    fn nested_start_is_reentrant() {
        let t = create_transition();
        let a = signal(0);

        {
            let (t2, a2) = (t.clone(), a.clone());
            t.start(move || {
                assert!(t2.is_transitioning());
                let a3 = a2.clone();
                t2.start(move || a3.set(1));
                // Still active after the nested call returns
                assert!(t2.is_transitioning());
            });
        }
        assert!(!t.is_transitioning());
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn flush_is_idempotent() {
        let t = create_transition();
        let count = signal(0);
        let runs = Rc::new(Cell::new(0));

        {
            let (t2, count, runs) = (t.clone(), count.clone(), runs.clone());
            t.start(move || {
                let _handle = t2.effect(move || {
                    let _ = count.get();
                    runs.set(runs.get() + 1);
                });
            });
        }
        assert_eq!(runs.get(), 1);

        // Manual flushes after start find an empty queue
        t.flush_pending();
        t.flush_pending();
        assert_eq!(runs.get(), 1);
    }
}
