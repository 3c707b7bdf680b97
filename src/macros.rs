// ============================================================================
// pulse-signals - Ergonomic Macros
// ============================================================================

/// Helper macro to clone variables into a move closure.
///
/// Cuts the boilerplate of cloning `Signal` and `Rc` handles before moving
/// them into a closure.
///
/// # Usage
///
/// ```rust
/// use pulse_signals::{cloned, computed, signal};
///
/// let a = signal(1);
/// let b = signal(2);
///
/// let sum = computed(cloned!(a, b => move || a.get() + b.get()));
/// assert_eq!(sum.get(), 3);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Create a computed with automatic handle capturing.
///
/// Wraps `computed(cloned!(... => move || ...))`.
///
/// # Usage
///
/// ```rust
/// use pulse_signals::{computed, signal};
/// let a = signal(1);
/// let b = signal(2);
///
/// // List captured handles, then the expression
/// let sum = computed!(a, b => a.get() + b.get());
/// assert_eq!(sum.get(), 3);
/// ```
#[macro_export]
macro_rules! computed {
    // Case 1: with captured handles
    ($($deps:ident),+ => $body:expr) => {
        $crate::computed($crate::cloned!($($deps),+ => move || $body))
    };
    // Case 2: plain expression
    ($body:expr) => {
        $crate::computed(move || $body)
    };
}

/// Create an effect with automatic handle capturing.
///
/// Wraps `effect(cloned!(... => move || ...))`.
///
/// # Usage
///
/// ```rust
/// use pulse_signals::{effect, signal};
/// let log = signal(vec![1]);
///
/// let _handle = effect!(log => {
///     println!("log changed: {:?}", log.with(|v| v.len()));
/// });
/// ```
#[macro_export]
macro_rules! effect {
    // Case 1: with captured handles
    ($($deps:ident),+ => $body:expr) => {
        $crate::effect($crate::cloned!($($deps),+ => move || $body))
    };
    // Case 2: plain expression
    ($body:expr) => {
        $crate::effect(move || $body)
    };
}
