// ============================================================================
// pulse-signals - Effect System
// Side effects that re-run when dependencies change
// ============================================================================
//
// Effects are the graph's leaves: they read reactive values, do something
// with them, and re-run when those values change. Unlike computeds they
// produce no value, so nothing depends on them.
//
// Key features:
// - Automatic dependency tracking with per-run re-tracking
// - Cleanup functions that run before the next execution and on disposal
// - Pluggable scheduling with a per-effect override
// - Explicit disposal through a Disposer handle
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::core::constants::{CLEAN, DISPOSED, EFFECT, STATUS_MASK};
use crate::core::context::with_context;
use crate::core::types::{Dependent, Observable};
use crate::reactivity::boundary::{
    current_boundary, handle_effect_error, BoundaryContext, ReactiveError,
};
use crate::reactivity::scheduling::{queue_dependent, schedule_effect, Scheduler};
use crate::reactivity::tracking::release_dependencies;

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Cleanup function returned by an effect, runs before its next execution
pub type CleanupFn = Box<dyn FnOnce()>;

/// Effect function signature, returning an optional cleanup
pub type EffectFn = Box<dyn FnMut() -> Option<CleanupFn>>;

// =============================================================================
// EFFECT INNER
// =============================================================================

/// The inner effect state.
///
/// Implements Dependent but not Observable: effects sit at the edge of the
/// graph and nothing subscribes to them.
pub struct EffectInner {
    /// Flags bitmask for state tracking
    flags: Cell<u32>,

    /// The effect function, dropped on disposal to release captures
    func: RefCell<Option<EffectFn>>,

    /// Sources this effect read during its last run
    dependencies: RefCell<Vec<Rc<dyn Observable>>>,

    /// Cleanup from the last run, consumed before the next one
    teardown: RefCell<Option<CleanupFn>>,

    /// Per-effect scheduler override; None means the global scheduler
    scheduler: Option<Rc<dyn Scheduler>>,

    /// Error boundary enclosing the effect's creation site, if any
    boundary: Option<Rc<BoundaryContext>>,

    /// Weak self-reference so trait methods can hand out owned handles
    self_weak: RefCell<Weak<EffectInner>>,
}

impl EffectInner {
    pub(crate) fn flags(&self) -> u32 {
        self.flags.get()
    }

    pub(crate) fn scheduler_override(&self) -> Option<Rc<dyn Scheduler>> {
        self.scheduler.clone()
    }
}

impl Dependent for EffectInner {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn dependency_count(&self) -> usize {
        self.dependencies.borrow().len()
    }

    fn add_dependency(&self, source: Rc<dyn Observable>) {
        self.dependencies.borrow_mut().push(source);
    }

    fn clear_dependencies(&self) {
        self.dependencies.borrow_mut().clear();
    }

    fn for_each_dependency(&self, f: &mut dyn FnMut(&Rc<dyn Observable>) -> bool) {
        let dependencies = self.dependencies.borrow();
        for dep in dependencies.iter() {
            if !f(dep) {
                break;
            }
        }
    }

    fn remove_dependency(&self, source: &Rc<dyn Observable>) {
        let source_ptr = Rc::as_ptr(source) as *const ();
        self.dependencies
            .borrow_mut()
            .retain(|dep| Rc::as_ptr(dep) as *const () != source_ptr);
    }

    fn schedule(&self) {
        if self.flags.get() & DISPOSED != 0 {
            return;
        }
        if let Some(effect) = self.self_weak.borrow().upgrade() {
            schedule_effect(&effect);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_observable(&self) -> Option<Rc<dyn Observable>> {
        None
    }
}

// =============================================================================
// EFFECT REGISTRY
// =============================================================================
//
// Effects run for side effects, so dropping the user's handle must not
// silently stop them. Each effect is held strongly here from creation until
// explicit disposal.

thread_local! {
    static REGISTRY: RefCell<Vec<Rc<EffectInner>>> = const { RefCell::new(Vec::new()) };
}

fn register(effect: &Rc<EffectInner>) {
    REGISTRY.with(|registry| registry.borrow_mut().push(effect.clone()));
}

fn unregister(effect: &Rc<EffectInner>) {
    let ptr = Rc::as_ptr(effect);
    REGISTRY.with(|registry| {
        registry.borrow_mut().retain(|e| Rc::as_ptr(e) != ptr);
    });
}

// =============================================================================
// CORE OPERATIONS
// =============================================================================

pub(crate) fn create_effect(
    func: EffectFn,
    scheduler: Option<Rc<dyn Scheduler>>,
) -> Rc<EffectInner> {
    let effect = Rc::new(EffectInner {
        flags: Cell::new(EFFECT | CLEAN),
        func: RefCell::new(Some(func)),
        dependencies: RefCell::new(Vec::new()),
        teardown: RefCell::new(None),
        scheduler,
        boundary: current_boundary(),
        self_weak: RefCell::new(Weak::new()),
    });
    *effect.self_weak.borrow_mut() = Rc::downgrade(&effect);
    register(&effect);
    effect
}

/// Execute one run of an effect.
///
/// Order per run: previous cleanup, release old dependencies, run the
/// function under tracking, store the new cleanup. A panic in the function
/// is caught and routed to the effect's boundary; the dependencies tracked
/// before the panic stay in place so the effect re-runs on the next change.
///
/// The function is taken out of its cell for the duration of the run, so a
/// body that disposes its own handle never contends for the borrow.
pub(crate) fn run_effect(effect: &Rc<EffectInner>) {
    if effect.flags.get() & DISPOSED != 0 {
        return;
    }

    if let Some(teardown) = effect.teardown.borrow_mut().take() {
        teardown();
    }

    let as_dependent: Rc<dyn Dependent> = effect.clone();
    release_dependencies(as_dependent.clone());

    effect
        .flags
        .set((effect.flags.get() & STATUS_MASK) | CLEAN);

    let mut func = effect.func.borrow_mut().take();
    let prev = with_context(|ctx| ctx.set_active_node(Some(Rc::downgrade(&as_dependent))));

    let result = catch_unwind(AssertUnwindSafe(|| func.as_mut().map(|f| f())));

    with_context(|ctx| ctx.set_active_node(prev));

    let disposed = effect.flags.get() & DISPOSED != 0;
    if !disposed {
        *effect.func.borrow_mut() = func;
    }

    match result {
        Ok(Some(cleanup)) => {
            if let Some(cleanup) = cleanup {
                if disposed {
                    // Self-disposal already ran the old teardown; this run's
                    // cleanup is the final one
                    cleanup();
                } else {
                    *effect.teardown.borrow_mut() = Some(cleanup);
                }
            }
        }
        Ok(None) => {} // function already gone, nothing ran
        Err(payload) => {
            handle_effect_error(effect.boundary.clone(), ReactiveError::from_panic(payload));
        }
    }
}

fn dispose_effect(effect: &Rc<EffectInner>) {
    if effect.flags.get() & DISPOSED != 0 {
        return;
    }
    effect.flags.set(effect.flags.get() | DISPOSED);

    debug!("effect disposed");

    if let Some(teardown) = effect.teardown.borrow_mut().take() {
        teardown();
    }

    let as_dependent: Rc<dyn Dependent> = effect.clone();
    release_dependencies(as_dependent);

    // Drop the function so captured values are released promptly
    *effect.func.borrow_mut() = None;

    unregister(effect);
}

// =============================================================================
// DISPOSER - the public effect handle
// =============================================================================

/// Handle to a running effect.
///
/// The effect keeps running if the handle is dropped; only `dispose` stops
/// it. Disposal runs the pending cleanup, severs all dependencies, and is
/// idempotent.
pub struct Disposer {
    inner: Rc<EffectInner>,
}

impl Disposer {
    pub(crate) fn from_inner(inner: Rc<EffectInner>) -> Self {
        Self { inner }
    }

    /// Stop the effect permanently.
    pub fn dispose(&self) {
        dispose_effect(&self.inner);
    }

    /// Whether the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.flags.get() & DISPOSED != 0
    }
}

// =============================================================================
// CREATION FUNCTIONS
// =============================================================================

/// Options accepted by `effect_with_options`.
#[derive(Default)]
pub struct EffectOptions {
    /// Scheduler used for this effect's runs instead of the global one.
    pub scheduler: Option<Rc<dyn Scheduler>>,
}

fn spawn(func: EffectFn, scheduler: Option<Rc<dyn Scheduler>>) -> Disposer {
    let effect = create_effect(func, scheduler);
    // The initial run goes through the same gate as invalidation runs, so
    // effects created inside a batch or transition defer like any other run.
    queue_dependent(effect.clone() as Rc<dyn Dependent>);
    Disposer { inner: effect }
}

/// Create an effect that re-runs whenever a reactive value it reads changes.
///
/// The first run is scheduled immediately on creation; with the default
/// scheduler it completes before this function returns.
///
/// # Example
///
/// ```
/// use pulse_signals::{effect, signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let handle = {
///     let (count, seen) = (count.clone(), seen.clone());
///     effect(move || seen.set(count.get()))
/// };
/// assert_eq!(seen.get(), 0);
///
/// count.set(7);
/// assert_eq!(seen.get(), 7);
///
/// handle.dispose();
/// count.set(100);
/// assert_eq!(seen.get(), 7);
/// ```
pub fn effect<F>(mut f: F) -> Disposer
where
    F: FnMut() + 'static,
{
    spawn(
        Box::new(move || {
            f();
            None::<CleanupFn>
        }),
        None,
    )
}

/// Create an effect whose function returns a cleanup closure.
///
/// The cleanup runs before the next execution and once more on disposal.
///
/// # Example
///
/// ```
/// use pulse_signals::{effect_with_cleanup, signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let cleanups = Rc::new(Cell::new(0));
///
/// let handle = {
///     let (count, cleanups) = (count.clone(), cleanups.clone());
///     effect_with_cleanup(move || {
///         let _ = count.get();
///         let cleanups = cleanups.clone();
///         Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Box<dyn FnOnce()>)
///     })
/// };
///
/// count.set(1);
/// assert_eq!(cleanups.get(), 1); // cleanup of the first run
///
/// handle.dispose();
/// assert_eq!(cleanups.get(), 2); // cleanup of the last run
/// ```
pub fn effect_with_cleanup<F>(f: F) -> Disposer
where
    F: FnMut() -> Option<CleanupFn> + 'static,
{
    spawn(Box::new(f), None)
}

/// Create an effect with explicit options, currently a scheduler override.
///
/// # Example
///
/// ```
/// use pulse_signals::{effect_with_options, frame_scheduler, signal, EffectOptions};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let frames = frame_scheduler();
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let _handle = {
///     let (count, seen) = (count.clone(), seen.clone());
///     effect_with_options(
///         move || seen.set(count.get()),
///         EffectOptions { scheduler: Some(frames.clone()) },
///     )
/// };
///
/// // Even the initial run waits for the frame clock
/// assert_eq!(seen.get(), -1);
/// frames.advance_frame();
/// frames.advance_frame();
/// assert_eq!(seen.get(), 0);
/// ```
pub fn effect_with_options<F>(mut f: F, options: EffectOptions) -> Disposer
where
    F: FnMut() + 'static,
{
    spawn(
        Box::new(move || {
            f();
            None::<CleanupFn>
        }),
        options.scheduler,
    )
}

// =============================================================================
// TESTS
// =============================================================================
