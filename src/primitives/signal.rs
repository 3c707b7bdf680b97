// ============================================================================
// pulse-signals - Signal Primitive
// The writable reactive source
// ============================================================================

use std::rc::Rc;

use crate::core::types::{EqualsFn, Observable, SignalInner};
use crate::reactivity::tracking::{notify_write, track_read};

// =============================================================================
// SIGNAL<T> - the public signal handle
// =============================================================================

/// A reactive container holding a single value of type T.
///
/// Reading a signal inside a computed or effect registers it as a dependency;
/// writing a new value invalidates dependents and schedules affected effects.
/// Handles are cheap to clone and share the same underlying state.
///
/// # Example
///
/// ```
/// use pulse_signals::signal;
///
/// let count = signal(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
#[derive(Clone)]
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq + 'static,
    {
        Self {
            inner: Rc::new(SignalInner::new(value)),
        }
    }

    /// Create a new signal with a custom equality function.
    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self
    where
        T: 'static,
    {
        Self {
            inner: Rc::new(SignalInner::new_with_equals(value, equals)),
        }
    }

    /// Get the current value (cloning).
    ///
    /// Inside a computed or effect this registers the signal as a dependency.
    pub fn get(&self) -> T
    where
        T: Clone + 'static,
    {
        track_read(self.inner.clone() as Rc<dyn Observable>);
        self.inner.get()
    }

    /// Access the current value through a closure without cloning.
    ///
    /// Registers the dependency exactly like `get`.
    ///
    /// # Example
    ///
    /// ```
    /// use pulse_signals::signal;
    ///
    /// let items = signal(vec![1, 2, 3]);
    /// let sum = items.with(|v| v.iter().sum::<i32>());
    /// assert_eq!(sum, 6);
    /// ```
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R
    where
        T: 'static,
    {
        track_read(self.inner.clone() as Rc<dyn Observable>);
        self.inner.with(f)
    }

    /// Set the signal's value.
    ///
    /// Returns true if the value changed under the signal's equality
    /// function. A write judged equal stores nothing and notifies nobody.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a computed. Derivations must be pure.
    pub fn set(&self, value: T) -> bool
    where
        T: 'static,
    {
        let changed = self.inner.set(value);
        if changed {
            notify_write(self.inner.clone() as Rc<dyn Observable>);
        }
        changed
    }

    /// Compute the next value from the current one, then set it.
    ///
    /// The closure sees the current value by reference without registering a
    /// dependency, so this is safe to call from inside an effect that does
    /// not otherwise read the signal.
    ///
    /// # Example
    ///
    /// ```
    /// use pulse_signals::signal;
    ///
    /// let count = signal(10);
    /// count.set_with(|n| n * 2);
    /// assert_eq!(count.get(), 20);
    /// ```
    pub fn set_with(&self, f: impl FnOnce(&T) -> T) -> bool
    where
        T: 'static,
    {
        let next = self.inner.with(f);
        self.set(next)
    }

    /// Update the value in place through a mutable reference.
    ///
    /// Bypasses the equality check: the closure is assumed to have changed
    /// the value, so dependents are always notified. Useful for large values
    /// where cloning for comparison would be wasteful.
    ///
    /// # Example
    ///
    /// ```
    /// use pulse_signals::signal;
    ///
    /// let items = signal(vec![1, 2]);
    /// items.update(|v| v.push(3));
    /// assert_eq!(items.with(|v| v.len()), 3);
    /// ```
    pub fn update(&self, f: impl FnOnce(&mut T))
    where
        T: 'static,
    {
        let had_subscribers = self.inner.update(f);
        if had_subscribers {
            notify_write(self.inner.clone() as Rc<dyn Observable>);
        }
    }

    /// Get a reference to the inner state (for advanced use).
    pub fn inner(&self) -> &Rc<SignalInner<T>> {
        &self.inner
    }

    /// Get the inner state as a type-erased observable.
    ///
    /// Enables storing signals of different value types in one collection.
    pub fn as_observable(&self) -> Rc<dyn Observable>
    where
        T: 'static,
    {
        self.inner.clone()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Signal<T>
where
    T: Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.get())
            .finish()
    }
}

// =============================================================================
// SPLIT HANDLES - read and write capabilities as separate values
// =============================================================================

/// The read half of a split signal. Clone freely; reads track dependencies.
#[derive(Clone)]
pub struct ReadSignal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> ReadSignal<T> {
    /// Get the current value (cloning), registering the dependency.
    pub fn get(&self) -> T
    where
        T: Clone + 'static,
    {
        track_read(self.inner.clone() as Rc<dyn Observable>);
        self.inner.get()
    }

    /// Access the current value through a closure, registering the dependency.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R
    where
        T: 'static,
    {
        track_read(self.inner.clone() as Rc<dyn Observable>);
        self.inner.with(f)
    }
}

/// The write half of a split signal.
#[derive(Clone)]
pub struct WriteSignal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> WriteSignal<T> {
    /// Set the value. Returns true if it changed under the equality function.
    pub fn set(&self, value: T) -> bool
    where
        T: 'static,
    {
        let changed = self.inner.set(value);
        if changed {
            notify_write(self.inner.clone() as Rc<dyn Observable>);
        }
        changed
    }

    /// Compute the next value from the current one, then set it.
    pub fn set_with(&self, f: impl FnOnce(&T) -> T) -> bool
    where
        T: 'static,
    {
        let next = self.inner.with(f);
        self.set(next)
    }
}

// =============================================================================
// CREATION FUNCTIONS
// =============================================================================

/// Create a new reactive signal.
///
/// # Example
///
/// ```
/// use pulse_signals::signal;
///
/// let count = signal(0);
/// let name = signal(String::from("hello"));
///
/// count.set(42);
/// assert_eq!(count.get(), 42);
/// assert_eq!(name.get(), "hello");
/// ```
pub fn signal<T>(value: T) -> Signal<T>
where
    T: PartialEq + 'static,
{
    Signal::new(value)
}

/// Create a signal with a custom equality function.
///
/// # Example
///
/// ```
/// use pulse_signals::signal_with_equals;
///
/// // A signal that always considers values different (always notifies)
/// let always_notify = signal_with_equals(0, |_, _| false);
/// assert!(always_notify.set(0));
/// ```
pub fn signal_with_equals<T>(value: T, equals: EqualsFn<T>) -> Signal<T>
where
    T: 'static,
{
    Signal::new_with_equals(value, equals)
}

/// Create a signal split into separate read and write handles.
///
/// Both halves share the same state. Useful for handing read-only access to
/// one part of a program and write access to another.
///
/// # Example
///
/// ```
/// use pulse_signals::create_signal;
///
/// let (count, set_count) = create_signal(0);
/// set_count.set(3);
/// assert_eq!(count.get(), 3);
/// ```
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: PartialEq + 'static,
{
    let inner = Rc::new(SignalInner::new(value));
    (
        ReadSignal {
            inner: inner.clone(),
        },
        WriteSignal { inner },
    )
}

// =============================================================================
// TESTS
// =============================================================================
