// ============================================================================
// pulse-signals - Type Definitions
// Type-erased traits and base types for the reactive graph
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::constants::*;

// =============================================================================
// TYPE-ERASED TRAITS
// =============================================================================
//
// These traits enable heterogeneous storage in the reactive graph.
// Graph operations (mark dirty, walk subscribers, release dependencies)
// don't need to know the value type T. Only reading/writing values needs T.
//
// So we can have:
// - Vec<Weak<dyn Dependent>> for subscriber notification
// - Vec<Rc<dyn Observable>> for dependency bookkeeping
//
// The concrete Signal<T>, Computed<T> and effect types hold the actual
// values and implement these traits for graph operations.
// =============================================================================

/// Type-erased observable interface for reactive graph operations.
///
/// Implemented by `SignalInner<T>` (signals) and `ComputedInner<T>` (computeds).
/// An Observable is anything whose change can invalidate dependents.
pub trait Observable: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// Get the number of live subscribers
    fn subscriber_count(&self) -> usize;

    /// Add a subscriber that depends on this observable
    fn add_subscriber(&self, subscriber: Weak<dyn Dependent>);

    /// Remove dead (dropped) subscribers from the list
    fn prune_dead_subscribers(&self);

    /// Iterate over live subscribers. The callback can return false to stop.
    fn for_each_subscriber(&self, f: &mut dyn FnMut(Rc<dyn Dependent>) -> bool);

    /// Remove a specific subscriber by pointer identity.
    /// Used when a dependent re-tracks and no longer reads this observable.
    fn remove_subscriber(&self, subscriber: &Rc<dyn Dependent>);

    /// Clear all subscribers from this observable.
    fn clear_subscribers(&self);

    /// Check if this is a computed (has COMPUTED flag)
    fn is_computed(&self) -> bool {
        self.flags() & COMPUTED != 0
    }

    /// Check if this observable is dirty
    fn is_dirty(&self) -> bool {
        self.flags() & DIRTY != 0
    }

    /// Check if this observable is clean
    fn is_clean(&self) -> bool {
        self.flags() & CLEAN != 0
    }

    /// Mark as dirty (clear status bits, set DIRTY)
    fn mark_dirty(&self) {
        let flags = (self.flags() & STATUS_MASK) | DIRTY;
        self.set_flags(flags);
    }

    /// Mark as clean (clear status bits, set CLEAN)
    fn mark_clean(&self) {
        let flags = (self.flags() & STATUS_MASK) | CLEAN;
        self.set_flags(flags);
    }

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Type-erased dependent interface for invalidation and scheduling.
///
/// Implemented by effects and `ComputedInner<T>`. A Dependent is something
/// that reads observables and must react when any of them changes.
pub trait Dependent: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// Get the number of dependencies
    fn dependency_count(&self) -> usize;

    /// Add a dependency (an observable this node reads)
    fn add_dependency(&self, source: Rc<dyn Observable>);

    /// Clear all dependencies (called before re-running to rebuild the set)
    fn clear_dependencies(&self);

    /// Iterate over dependencies. The callback can return false to stop.
    fn for_each_dependency(&self, f: &mut dyn FnMut(&Rc<dyn Observable>) -> bool);

    /// Remove a specific dependency by pointer identity.
    fn remove_dependency(&self, source: &Rc<dyn Observable>);

    /// Hand this node to its scheduler for execution.
    ///
    /// Effects override this to enqueue a run task. Computeds are pulled on
    /// read instead, so the default is a no-op.
    fn schedule(&self) {}

    /// Check if this is a computed
    fn is_computed(&self) -> bool {
        self.flags() & COMPUTED != 0
    }

    /// Check if this is an effect
    fn is_effect(&self) -> bool {
        self.flags() & EFFECT != 0
    }

    /// Check if this dependent is dirty
    fn is_dirty(&self) -> bool {
        self.flags() & DIRTY != 0
    }

    /// Check if this dependent is clean
    fn is_clean(&self) -> bool {
        self.flags() & CLEAN != 0
    }

    /// Check if this dependent is disposed
    fn is_disposed(&self) -> bool {
        self.flags() & DISPOSED != 0
    }

    /// Mark as dirty
    fn mark_dirty(&self) {
        let flags = (self.flags() & STATUS_MASK) | DIRTY;
        self.set_flags(flags);
    }

    /// Mark as clean
    fn mark_clean(&self) {
        let flags = (self.flags() & STATUS_MASK) | CLEAN;
        self.set_flags(flags);
    }

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// If this dependent is also an observable (i.e. a Computed), return its
    /// observable side. This enables cascade propagation through computed
    /// chains during invalidation.
    ///
    /// Returns None for effects (which have no dependents of their own).
    fn as_observable(&self) -> Option<Rc<dyn Observable>>;
}

// =============================================================================
// SIGNAL INNER (the data behind Signal<T>)
// =============================================================================

/// Equality function type for comparing signal values
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using PartialEq
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// The internal data for a source signal.
///
/// This is separate from Signal<T> so we can implement Observable on it
/// and store Rc<SignalInner<T>> as Rc<dyn Observable>.
pub struct SignalInner<T> {
    /// Flags bitmask (type + status)
    flags: Cell<u32>,

    /// The current value
    value: RefCell<T>,

    /// Subscribers that depend on this signal (weak refs to avoid cycles)
    subscribers: RefCell<Vec<Weak<dyn Dependent>>>,

    /// Equality function for comparing values
    equals: EqualsFn<T>,
}

impl<T> SignalInner<T> {
    /// Create a new signal source with the given value
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::new_with_equals(value, default_equals)
    }

    /// Create a new signal source with a custom equality function
    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            flags: Cell::new(SOURCE | CLEAN),
            value: RefCell::new(value),
            subscribers: RefCell::new(Vec::new()),
            equals,
        }
    }

    /// Get the current value (cloning)
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Get the current value with a closure (avoids clone)
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Set the value, returning true if it changed.
    ///
    /// Equal values (per the equality function) are a silent no-op: the
    /// stored value is not replaced and no notification happens.
    pub fn set(&self, value: T) -> bool {
        let changed = {
            let current = self.value.borrow();
            !(self.equals)(&current, &value)
        };

        if changed {
            *self.value.borrow_mut() = value;
        }

        changed
    }

    /// Mutate the value in place using a closure.
    /// Returns true if there are subscribers listening (value may have changed).
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        {
            let mut current = self.value.borrow_mut();
            f(&mut current);
        }

        // Mutated in place, so treat as changed if someone is listening
        !self.subscribers.borrow().is_empty()
    }

    /// Get the equality function
    pub fn equals_fn(&self) -> EqualsFn<T> {
        self.equals
    }
}

impl<T: 'static> Observable for SignalInner<T> {
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
        self.subscribers.borrow_mut().retain(|w| w.strong_count() > 0);
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
        // Compare by pointer identity: the Rc points to the same allocation
        let subscriber_ptr = Rc::as_ptr(subscriber) as *const ();
        self.subscribers.borrow_mut().retain(|weak| {
            if let Some(rc) = weak.upgrade() {
                let weak_ptr = Rc::as_ptr(&rc) as *const ();
                weak_ptr != subscriber_ptr
            } else {
                // Drop dead weak references while we're at it
                false
            }
        });
    }

    fn clear_subscribers(&self) {
        self.subscribers.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_inner_creation() {
        let source = SignalInner::new(42);
        assert_eq!(source.get(), 42);
        assert!(source.flags() & SOURCE != 0);
        assert!(source.flags() & CLEAN != 0);
    }

    #[test]
    fn signal_inner_set() {
        let source = SignalInner::new(1);
        assert_eq!(source.get(), 1);

        let changed = source.set(2);
        assert!(changed);
        assert_eq!(source.get(), 2);

        // Setting the same value is a no-op
        let changed = source.set(2);
        assert!(!changed);
    }

    #[test]
    fn signal_inner_with() {
        let source = SignalInner::new(vec![1, 2, 3]);
        let sum = source.with(|v| v.iter().sum::<i32>());
        assert_eq!(sum, 6);
    }

    #[test]
    fn signal_as_observable_trait() {
        let source: Rc<SignalInner<i32>> = Rc::new(SignalInner::new(42));

        // Can coerce to Rc<dyn Observable>
        let observable: Rc<dyn Observable> = source.clone();

        assert!(observable.flags() & SOURCE != 0);
        assert!(observable.is_clean());
        assert!(!observable.is_dirty());
        assert!(!observable.is_computed());
    }

    #[test]
    fn heterogeneous_observable_storage() {
        // Different T types in the same Vec
        let int_source: Rc<dyn Observable> = Rc::new(SignalInner::new(42i32));
        let str_source: Rc<dyn Observable> = Rc::new(SignalInner::new(String::from("hello")));
        let bool_source: Rc<dyn Observable> = Rc::new(SignalInner::new(true));

        let sources: Vec<Rc<dyn Observable>> = vec![int_source, str_source, bool_source];

        assert_eq!(sources.len(), 3);

        for source in &sources {
            assert!(source.flags() & SOURCE != 0);
        }

        sources[0].mark_dirty();
        assert!(sources[0].is_dirty());
        assert!(!sources[0].is_clean());

        assert!(sources[1].is_clean());
        assert!(sources[2].is_clean());
    }

    #[test]
    fn custom_equality_function() {
        fn never_equal<T>(_: &T, _: &T) -> bool {
            false
        }

        let source = SignalInner::new_with_equals(42, never_equal);

        // Even setting the same value "changes" with never_equal
        let changed = source.set(42);
        assert!(changed);
    }

    #[test]
    fn downcast_from_observable() {
        let source: Rc<SignalInner<i32>> = Rc::new(SignalInner::new(42));
        let observable: Rc<dyn Observable> = source.clone();

        let inner = observable
            .as_any()
            .downcast_ref::<SignalInner<i32>>()
            .unwrap();
        assert_eq!(inner.get(), 42);
    }
}
