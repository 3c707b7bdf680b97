// ============================================================================
// pulse-signals - Reactivity Module
// Tracking, invalidation, scheduling, and update scopes
// ============================================================================

pub mod batching;
pub mod boundary;
pub mod equality;
pub mod scheduling;
pub mod tracking;
pub mod transition;

pub use tracking::{notify_write, propagate_change, release_dependencies, track_read};

pub use scheduling::{
    current_scheduler, frame_scheduler, microtask_scheduler, schedule_effect, set_scheduler,
    throttled_scheduler, FrameScheduler, MicrotaskScheduler, Scheduler, Task, ThrottledScheduler,
};

pub use batching::{batch, is_batching, is_untracking, untrack};

pub use transition::{create_transition, Transition};

pub use boundary::{
    current_boundary, set_error_boundary, take_unhandled_errors, with_error_boundary,
    BoundaryContext, ReactiveError,
};
