// ============================================================================
// pulse-signals - Batching
// Group multiple writes into a single effect flush
// ============================================================================

use crate::core::context::with_context;
use crate::reactivity::scheduling::flush_pending_effects;

// =============================================================================
// BATCH
// =============================================================================

/// Batch multiple signal writes into a single effect flush.
///
/// Writes inside the closure still propagate dirtiness immediately, so
/// computeds read inside the batch are up to date. Effects, however, are
/// queued and deduplicated; each affected effect runs once when the
/// outermost batch exits. Batches nest: only the outermost exit flushes.
///
/// # Example
///
/// ```
/// use pulse_signals::{batch, effect, signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = signal(1);
/// let b = signal(2);
/// let runs = Rc::new(Cell::new(0));
///
/// let _handle = {
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     effect(move || {
///         let _ = a.get() + b.get();
///         runs.set(runs.get() + 1);
///     })
/// };
/// assert_eq!(runs.get(), 1);
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
///
/// // One flush for two writes
/// assert_eq!(runs.get(), 2);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_context(|ctx| ctx.enter_batch());

    // Guard so the batch exits and flushes even if f panics
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let depth = with_context(|ctx| ctx.exit_batch());
            if depth == 0 {
                flush_pending_effects();
            }
        }
    }

    let _guard = BatchGuard;
    f()
}

/// Check if currently inside a batch.
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

// =============================================================================
// UNTRACK
// =============================================================================

/// Read reactive values without registering dependencies.
///
/// Reads inside the closure are invisible to the active effect or computed,
/// so changes to those values do not trigger re-runs.
///
/// # Example
///
/// ```
/// use pulse_signals::{effect, signal, untrack};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let tracked = signal(0);
/// let peeked = signal(0);
/// let runs = Rc::new(Cell::new(0));
///
/// let _handle = {
///     let (tracked, peeked, runs) = (tracked.clone(), peeked.clone(), runs.clone());
///     effect(move || {
///         let _ = tracked.get();
///         let _ = untrack(|| peeked.get());
///         runs.set(runs.get() + 1);
///     })
/// };
/// assert_eq!(runs.get(), 1);
///
/// peeked.set(99); // not a dependency
/// assert_eq!(runs.get(), 1);
///
/// tracked.set(1);
/// assert_eq!(runs.get(), 2);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let was_untracking = with_context(|ctx| ctx.set_untracking(true));

    // Restore the previous state even if f panics; untrack calls can nest
    struct UntrackGuard(bool);

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_untracking(self.0));
        }
    }

    let _guard = UntrackGuard(was_untracking);
    f()
}

/// Check if currently inside an `untrack` scope.
pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

// =============================================================================
// TESTS
// =============================================================================
