// ============================================================================
// pulse-signals - Computed Primitive
// Memoized derivations with dynamic dependency tracking
// ============================================================================
//
// A computed caches the result of a pure function of other reactive values.
// Invalidation marks it dirty; the next read recomputes. Each recompute
// re-tracks dependencies from scratch, so branches that stop reading a
// source stop depending on it.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::core::constants::{
    CLEAN, COMPUTED, DIRTY, NODE_IS_UPDATING, SOURCE, STATUS_MASK,
};
use crate::core::context::with_context;
use crate::core::types::{Dependent, Observable};
use crate::reactivity::boundary::{
    current_boundary, handle_effect_error, BoundaryContext, ReactiveError,
};
use crate::reactivity::tracking::{release_dependencies, track_read};

// =============================================================================
// COMPUTED INNER - both a subscriber and a source
// =============================================================================

/// Shared state of a computed. Sits on both sides of the graph: it depends
/// on the sources its function reads, and other computeds and effects can
/// depend on it.
pub struct ComputedInner<T> {
    flags: Cell<u32>,
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    subscribers: RefCell<Vec<Weak<dyn Dependent>>>,
    dependencies: RefCell<Vec<Rc<dyn Observable>>>,
    boundary: Option<Rc<BoundaryContext>>,
    self_weak: RefCell<Weak<ComputedInner<T>>>,
}

impl<T> ComputedInner<T>
where
    T: PartialEq + Clone + 'static,
{
    fn new(compute: Box<dyn Fn() -> T>) -> Rc<Self> {
        let inner = Rc::new(Self {
            flags: Cell::new(COMPUTED | SOURCE | DIRTY),
            compute,
            value: RefCell::new(None),
            subscribers: RefCell::new(Vec::new()),
            dependencies: RefCell::new(Vec::new()),
            boundary: current_boundary(),
            self_weak: RefCell::new(Weak::new()),
        });
        *inner.self_weak.borrow_mut() = Rc::downgrade(&inner);
        inner
    }

    /// Re-run the compute function, re-tracking dependencies.
    ///
    /// On success the result replaces the cache if it differs and the node
    /// is marked clean. On panic after a successful first evaluation, the
    /// cached value is retained, the node stays dirty, and the error is
    /// routed to the enclosing boundary. A panic on the very first
    /// evaluation has no last-good value to fall back to and is re-raised.
    fn recompute(self: &Rc<Self>) {
        let as_dependent: Rc<dyn Dependent> = self.clone();
        release_dependencies(as_dependent.clone());

        self.flags.set(self.flags.get() | NODE_IS_UPDATING);
        let prev = with_context(|ctx| ctx.set_active_node(Some(Rc::downgrade(&as_dependent))));

        let result = catch_unwind(AssertUnwindSafe(|| (self.compute)()));

        with_context(|ctx| ctx.set_active_node(prev));
        self.flags.set(self.flags.get() & !NODE_IS_UPDATING);

        match result {
            Ok(new_value) => {
                let changed = {
                    let cached = self.value.borrow();
                    match cached.as_ref() {
                        Some(old) => *old != new_value,
                        None => true,
                    }
                };
                if changed {
                    *self.value.borrow_mut() = Some(new_value);
                }
                // Subscribers were already invalidated by the write cascade;
                // recomputing only refreshes the cache.
                self.flags.set((self.flags.get() & STATUS_MASK) | CLEAN);
            }
            Err(payload) => {
                if self.value.borrow().is_none() {
                    // First evaluation: nothing to fall back to
                    resume_unwind(payload);
                }
                // Retain the last good value; the node stays dirty so the
                // next read retries the computation.
                handle_effect_error(self.boundary.clone(), ReactiveError::from_panic(payload));
            }
        }
    }
}

impl<T: 'static> Observable for ComputedInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    fn add_subscriber(&self, subscriber: Weak<dyn Dependent>) {
        self.subscribers.borrow_mut().push(subscriber);
    }

    fn prune_dead_subscribers(&self) {
        self.subscribers
            .borrow_mut()
            .retain(|weak| weak.strong_count() > 0);
    }

    fn for_each_subscriber(&self, f: &mut dyn FnMut(Rc<dyn Dependent>) -> bool) {
        let subscribers = self.subscribers.borrow();
        for weak in subscribers.iter() {
            if let Some(rc) = weak.upgrade() {
                if !f(rc) {
                    break;
                }
            }
        }
    }

    fn remove_subscriber(&self, subscriber: &Rc<dyn Dependent>) {
        let subscriber_ptr = Rc::as_ptr(subscriber) as *const ();
        self.subscribers.borrow_mut().retain(|weak| {
            weak.upgrade()
                .map(|rc| Rc::as_ptr(&rc) as *const () != subscriber_ptr)
                .unwrap_or(false)
        });
    }

    fn clear_subscribers(&self) {
        self.subscribers.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: 'static> Dependent for ComputedInner<T> {
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

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_observable(&self) -> Option<Rc<dyn Observable>> {
        self.self_weak
            .borrow()
            .upgrade()
            .map(|rc| rc as Rc<dyn Observable>)
    }
}

// =============================================================================
// COMPUTED<T> - the public handle
// =============================================================================

/// A memoized reactive derivation.
///
/// The function runs once at creation and again only when a read finds the
/// cached value stale. Equal results (by `PartialEq`) keep the old cache, so
/// downstream dependents see no change.
///
/// # Example
///
/// ```
/// use pulse_signals::{computed, signal};
///
/// let count = signal(2);
/// let doubled = {
///     let count = count.clone();
///     computed(move || count.get() * 2)
/// };
/// assert_eq!(doubled.get(), 4);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
#[derive(Clone)]
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: PartialEq + Clone + 'static,
{
    /// Get the current value, recomputing first if the cache is stale.
    ///
    /// Registers the computed as a dependency of the active node.
    ///
    /// # Panics
    ///
    /// Panics if the computed's function reads the computed itself.
    pub fn get(&self) -> T {
        if self.inner.flags.get() & NODE_IS_UPDATING != 0 {
            panic!("Cycle detected: a computed cannot read its own value.");
        }

        if self.inner.flags.get() & DIRTY != 0 {
            self.inner.recompute();
        }

        track_read(self.inner.clone() as Rc<dyn Observable>);

        self.inner
            .value
            .borrow()
            .as_ref()
            .expect("computed value missing after recompute")
            .clone()
    }

    /// Access the current value through a closure without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if self.inner.flags.get() & NODE_IS_UPDATING != 0 {
            panic!("Cycle detected: a computed cannot read its own value.");
        }

        if self.inner.flags.get() & DIRTY != 0 {
            self.inner.recompute();
        }

        track_read(self.inner.clone() as Rc<dyn Observable>);

        let value = self.inner.value.borrow();
        f(value
            .as_ref()
            .expect("computed value missing after recompute"))
    }

    /// Whether the cache is stale and the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.flags.get() & DIRTY != 0
    }

    /// Get the inner state as a type-erased observable.
    pub fn as_observable(&self) -> Rc<dyn Observable> {
        self.inner.clone()
    }
}

impl<T: std::fmt::Debug + PartialEq + Clone + 'static> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.get())
            .finish()
    }
}

// =============================================================================
// CREATION FUNCTION
// =============================================================================

/// Create a memoized derivation from a pure function of reactive values.
///
/// The function runs eagerly once, registering its initial dependency set.
///
/// # Example
///
/// ```
/// use pulse_signals::{computed, signal};
///
/// let first = signal(String::from("Ada"));
/// let last = signal(String::from("Lovelace"));
/// let full = {
///     let (first, last) = (first.clone(), last.clone());
///     computed(move || format!("{} {}", first.get(), last.get()))
/// };
/// assert_eq!(full.get(), "Ada Lovelace");
/// ```
pub fn computed<T, F>(f: F) -> Computed<T>
where
    T: PartialEq + Clone + 'static,
    F: Fn() -> T + 'static,
{
    let inner = ComputedInner::new(Box::new(f));
    // Eager initial evaluation establishes the dependency set up front
    inner.recompute();
    Computed { inner }
}

// =============================================================================
// TESTS
// =============================================================================
