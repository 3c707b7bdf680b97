// ============================================================================
// pulse-signals - Effect Scheduling
// Pluggable schedulers controlling when queued effect runs execute
// ============================================================================
//
// Invalidation decides WHICH effects must run; the scheduler decides WHEN.
// Three strategies ship with the engine:
//
// - MicrotaskScheduler: runs tasks as soon as the current synchronous extent
//   completes. Without a host event loop this degrades to an immediate,
//   reentrancy-guarded drain, which preserves run-to-completion semantics.
// - FrameScheduler: host-pumped frame clock; every task is deferred to the
//   second upcoming frame.
// - ThrottledScheduler: latest-wins coalescing with a minimum wall-clock
//   interval between runs.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::core::constants::DISPOSED;
use crate::core::context::with_context;
use crate::core::types::Dependent;
use crate::primitives::effect::{run_effect, EffectInner};

// =============================================================================
// SCHEDULER TRAIT
// =============================================================================

/// A unit of deferred work: one effect run.
pub type Task = Box<dyn FnOnce()>;

/// Execution strategy for queued effect runs.
///
/// Implementations decide when a task submitted via `schedule` actually
/// executes. Tasks must run at most once; a task whose effect was disposed
/// in the meantime is a no-op (the task itself checks).
pub trait Scheduler {
    /// Submit a task for execution according to this scheduler's policy.
    fn schedule(&self, task: Task);
}

/// Maximum cascade rounds in one drain before we consider it an infinite loop
const MAX_FLUSH_COUNT: u32 = 1000;

// =============================================================================
// MICROTASK SCHEDULER (default)
// =============================================================================

/// Drains tasks immediately after the current synchronous extent.
///
/// A task scheduled while the queue is idle starts a drain on the spot; tasks
/// scheduled during a drain are appended and picked up by the same drain.
/// This is the closest run-to-completion analogue available without an event
/// loop: by the time the scheduling call returns, all transitively queued
/// work has executed.
pub struct MicrotaskScheduler {
    queue: RefCell<VecDeque<Task>>,
    draining: Cell<bool>,
}

impl MicrotaskScheduler {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        }
    }

    fn drain(&self) {
        self.draining.set(true);

        // Reset the flag even if a task panics
        struct DrainGuard<'a>(&'a Cell<bool>);
        impl Drop for DrainGuard<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }
        let _guard = DrainGuard(&self.draining);

        // Rounds, not tasks: a wide flush of independent effects is one
        // round, while a self-triggering effect adds a round per run.
        let mut rounds = 0u32;
        loop {
            let batch: Vec<Task> = self.queue.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                break;
            }

            rounds += 1;
            if rounds > MAX_FLUSH_COUNT {
                panic!(
                    "Maximum update depth exceeded. This can happen when an effect \
                     continuously triggers itself. Check for effects that write to \
                     signals they depend on without proper guards."
                );
            }

            for task in batch {
                task();
            }
        }
    }
}

impl Default for MicrotaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for MicrotaskScheduler {
    fn schedule(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);

        if !self.draining.get() {
            self.drain();
        }
    }
}

// =============================================================================
// FRAME SCHEDULER
// =============================================================================

/// Number of frame boundaries a task waits before running
const FRAME_DELAY: u8 = 2;

/// Defers every task to the second upcoming frame boundary.
///
/// The engine owns no event loop, so the host pumps the clock by calling
/// `advance_frame()` once per frame. Tasks scheduled during a frame's run
/// wait a full two frames of their own.
///
/// # Example
///
/// ```
/// use pulse_signals::{FrameScheduler, Scheduler};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let frames = Rc::new(FrameScheduler::new());
/// let ran = Rc::new(Cell::new(false));
///
/// let ran_clone = ran.clone();
/// frames.schedule(Box::new(move || ran_clone.set(true)));
///
/// frames.advance_frame();
/// assert!(!ran.get()); // one frame is not enough
///
/// frames.advance_frame();
/// assert!(ran.get());
/// ```
pub struct FrameScheduler {
    queue: RefCell<Vec<(u8, Task)>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(Vec::new()),
        }
    }

    /// Advance the frame clock by one frame, running tasks that come due.
    pub fn advance_frame(&self) {
        let due: Vec<Task> = {
            let mut queue = self.queue.borrow_mut();
            let mut remaining = Vec::with_capacity(queue.len());
            let mut due = Vec::new();
            for (countdown, task) in queue.drain(..) {
                let countdown = countdown - 1;
                if countdown == 0 {
                    due.push(task);
                } else {
                    remaining.push((countdown, task));
                }
            }
            *queue = remaining;
            due
        };
        // Queue borrow is released: due tasks may schedule new work

        for task in due {
            task();
        }
    }

    /// Number of tasks still waiting for a frame boundary
    pub fn queued_count(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for FrameScheduler {
    fn schedule(&self, task: Task) {
        self.queue.borrow_mut().push((FRAME_DELAY, task));
    }
}

// =============================================================================
// THROTTLED SCHEDULER
// =============================================================================

/// Coalesces tasks and enforces a minimum interval between runs.
///
/// A task arriving while the interval has elapsed runs immediately. A task
/// arriving sooner replaces any task already waiting (latest wins; earlier
/// tasks are dropped, never run). The host calls `poll()` to release a
/// pending task once the interval has passed.
pub struct ThrottledScheduler {
    interval: Duration,
    last_run: Cell<Option<Instant>>,
    pending: RefCell<Option<Task>>,
}

impl ThrottledScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: Cell::new(None),
            pending: RefCell::new(None),
        }
    }

    fn is_due(&self) -> bool {
        match self.last_run.get() {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        }
    }

    /// Run the pending task if the interval has elapsed.
    pub fn poll(&self) {
        if !self.is_due() {
            return;
        }
        let task = self.pending.borrow_mut().take();
        if let Some(task) = task {
            self.last_run.set(Some(Instant::now()));
            task();
        }
    }

    /// Whether a coalesced task is waiting for the interval to elapse
    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

impl Scheduler for ThrottledScheduler {
    fn schedule(&self, task: Task) {
        if self.is_due() {
            self.last_run.set(Some(Instant::now()));
            task();
        } else {
            // Latest wins: a task already waiting is replaced, not queued
            *self.pending.borrow_mut() = Some(task);
        }
    }
}

// =============================================================================
// FACTORY FUNCTIONS
// =============================================================================

/// Create a microtask scheduler (the default strategy).
pub fn microtask_scheduler() -> Rc<MicrotaskScheduler> {
    Rc::new(MicrotaskScheduler::new())
}

/// Create a frame scheduler. Pump it with `advance_frame()`.
pub fn frame_scheduler() -> Rc<FrameScheduler> {
    Rc::new(FrameScheduler::new())
}

/// Create a throttled scheduler with the given minimum interval.
/// Pump it with `poll()` to release coalesced tasks.
pub fn throttled_scheduler(interval: Duration) -> Rc<ThrottledScheduler> {
    Rc::new(ThrottledScheduler::new(interval))
}

// =============================================================================
// GLOBAL SCHEDULER
// =============================================================================

thread_local! {
    static CURRENT_SCHEDULER: RefCell<Rc<dyn Scheduler>> =
        RefCell::new(Rc::new(MicrotaskScheduler::new()));
}

/// Replace the global scheduler. Takes effect for subsequently queued work;
/// tasks already submitted run on whichever scheduler captured them.
pub fn set_scheduler(scheduler: Rc<dyn Scheduler>) {
    trace!("global scheduler replaced");
    CURRENT_SCHEDULER.with(|current| {
        *current.borrow_mut() = scheduler;
    });
}

/// Get the current global scheduler.
pub fn current_scheduler() -> Rc<dyn Scheduler> {
    CURRENT_SCHEDULER.with(|current| current.borrow().clone())
}

// =============================================================================
// EFFECT DISPATCH
// =============================================================================

/// Hand an effect run to its scheduler.
///
/// A per-effect scheduler override takes precedence over the global one.
/// The task holds only a weak reference; an effect disposed while its task
/// waits in a queue turns that task into a no-op.
pub fn schedule_effect(effect: &Rc<EffectInner>) {
    if effect.flags() & DISPOSED != 0 {
        return;
    }

    trace!("effect run scheduled");

    let scheduler = effect
        .scheduler_override()
        .unwrap_or_else(current_scheduler);

    let weak = Rc::downgrade(effect);
    scheduler.schedule(Box::new(move || {
        if let Some(effect) = weak.upgrade() {
            run_effect(&effect);
        }
    }));
}

/// Route an effect toward execution, respecting batching.
///
/// Inside a batch the effect joins the pending set (deduplicated) and is
/// scheduled exactly once when the outermost batch exits. Outside a batch it
/// goes straight to its scheduler.
pub(crate) fn queue_dependent(node: Rc<dyn Dependent>) {
    let deferred = with_context(|ctx| {
        if ctx.is_batching() {
            ctx.add_pending(Rc::downgrade(&node));
            true
        } else {
            false
        }
    });

    if !deferred {
        node.schedule();
    }
}

/// Flush the batch-pending set, handing each live effect to its scheduler.
///
/// Called when the outermost batch exits. Disposed effects are skipped.
pub(crate) fn flush_pending_effects() {
    let pending = with_context(|ctx| ctx.take_pending());
    if pending.is_empty() {
        return;
    }

    trace!(count = pending.len(), "flushing batched effects");

    for node_weak in pending {
        if let Some(node) = node_weak.upgrade() {
            if node.flags() & DISPOSED != 0 {
                continue;
            }
            node.schedule();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
