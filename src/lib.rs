// ============================================================================
// pulse-signals - A Fine-Grained Reactive State Engine
// ============================================================================
//
// Signals hold state, computeds derive from it, effects observe it. Writes
// push invalidation through the graph; reads pull fresh values on demand.
// Everything is single-threaded: handles are Rc-based and the graph lives in
// thread-local storage.
//
// ```
// use pulse_signals::{computed, effect, signal};
// use std::cell::Cell;
// use std::rc::Rc;
//
// let count = signal(1);
// let doubled = {
//     let count = count.clone();
//     computed(move || count.get() * 2)
// };
//
// let seen = Rc::new(Cell::new(0));
// let _handle = {
//     let (doubled, seen) = (doubled.clone(), seen.clone());
//     effect(move || seen.set(doubled.get()))
// };
//
// count.set(5);
// assert_eq!(seen.get(), 10);
// ```
// ============================================================================

pub mod core;
pub mod primitives;
pub mod reactivity;

#[macro_use]
mod macros;

// Re-export core items at crate root for ergonomic access
pub use crate::core::constants;
pub use crate::core::context::{
    is_batching, is_tracking, is_untracking, with_context, RuntimeContext,
};
pub use crate::core::types::{default_equals, Dependent, EqualsFn, Observable, SignalInner};

// Re-export primitives at crate root
pub use primitives::computed::{computed, Computed};
pub use primitives::effect::{
    effect, effect_with_cleanup, effect_with_options, CleanupFn, Disposer, EffectOptions,
};
pub use primitives::signal::{
    create_signal, signal, signal_with_equals, ReadSignal, Signal, WriteSignal,
};

// Re-export reactivity functions
pub use reactivity::batching::{batch, untrack};
pub use reactivity::boundary::{
    current_boundary, set_error_boundary, take_unhandled_errors, with_error_boundary,
    BoundaryContext, ReactiveError,
};
pub use reactivity::equality::{
    always_equals, equals, never_equals, safe_equals_f32, safe_equals_f64, safe_not_equal_f32,
    safe_not_equal_f64,
};
pub use reactivity::scheduling::{
    current_scheduler, frame_scheduler, microtask_scheduler, set_scheduler, throttled_scheduler,
    FrameScheduler, MicrotaskScheduler, Scheduler, Task, ThrottledScheduler,
};
pub use reactivity::transition::{create_transition, Transition};

// =============================================================================
// TESTS
// =============================================================================
