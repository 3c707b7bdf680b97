// ============================================================================
// pulse-signals - Equality Functions
// Comparators for gating signal writes
// ============================================================================
//
// Signals reject writes their comparator judges equal, so dependents never
// hear about no-op updates. The default is PartialEq; the functions here
// cover the cases where that default is wrong.
// ============================================================================

use crate::core::types::EqualsFn;

/// Strict equality through PartialEq. The default for `signal()`.
///
/// # Example
/// ```
/// use pulse_signals::reactivity::equality::equals;
///
/// assert!(equals(&42, &42));
/// assert!(!equals(&42, &43));
/// ```
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Never equal: every write notifies, even with an identical value.
///
/// # Example
/// ```
/// use pulse_signals::{reactivity::equality::never_equals, signal_with_equals};
///
/// let s = signal_with_equals(0, never_equals);
/// assert!(s.set(0)); // still counts as a change
/// ```
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

/// Always equal: writes never notify. Useful for values dependents should
/// read once and never re-observe.
pub fn always_equals<T>(_a: &T, _b: &T) -> bool {
    true
}

// =============================================================================
// FLOAT EQUALITY (NaN-aware)
// =============================================================================
//
// IEEE 754 says NaN != NaN, so a signal holding NaN would notify on every
// write of NaN. These comparators treat NaN as equal to NaN.

/// NaN-aware equality for f64: NaN compares equal to NaN.
///
/// # Example
/// ```
/// use pulse_signals::reactivity::equality::safe_equals_f64;
///
/// assert!(safe_equals_f64(&1.0, &1.0));
/// assert!(safe_equals_f64(&f64::NAN, &f64::NAN));
/// assert!(!safe_equals_f64(&f64::NAN, &1.0));
/// ```
pub fn safe_equals_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// NaN-aware inequality for f64.
pub fn safe_not_equal_f64(a: &f64, b: &f64) -> bool {
    !safe_equals_f64(a, b)
}

/// NaN-aware equality for f32.
pub fn safe_equals_f32(a: &f32, b: &f32) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// NaN-aware inequality for f32.
pub fn safe_not_equal_f32(a: &f32, b: &f32) -> bool {
    !safe_equals_f32(a, b)
}

// =============================================================================
// EQUALSFN CONSTRUCTORS
// =============================================================================

/// The default comparator as an `EqualsFn<T>`.
pub fn default_equals_fn<T: PartialEq + 'static>() -> EqualsFn<T> {
    equals
}

/// The never-equals comparator as an `EqualsFn<T>`.
pub fn never_equals_fn<T: 'static>() -> EqualsFn<T> {
    never_equals
}

/// The always-equals comparator as an `EqualsFn<T>`.
pub fn always_equals_fn<T: 'static>() -> EqualsFn<T> {
    always_equals
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_equals_follows_partial_eq() {
        assert!(equals(&7, &7));
        assert!(!equals(&7, &8));
        assert!(equals(&String::from("pulse"), &String::from("pulse")));
    }

    #[test]
    fn never_and_always_ignore_values() {
        assert!(!never_equals(&0, &0));
        assert!(always_equals(&0, &99));
    }

    #[test]
    fn nan_compares_equal_to_nan() {
        assert!(safe_equals_f64(&f64::NAN, &f64::NAN));
        assert!(safe_not_equal_f64(&f64::NAN, &0.5));
        assert!(safe_not_equal_f64(&0.5, &f64::NAN));
        assert!(safe_equals_f32(&f32::NAN, &f32::NAN));
        assert!(safe_not_equal_f32(&f32::NAN, &0.5));
    }

    #[test]
    fn float_comparators_otherwise_match_ieee() {
        assert!(safe_equals_f64(&2.5, &2.5));
        assert!(!safe_equals_f64(&2.5, &2.6));
        assert!(safe_equals_f64(&-0.0, &0.0));
        assert!(safe_equals_f64(&f64::INFINITY, &f64::INFINITY));
        assert!(!safe_equals_f64(&f64::NEG_INFINITY, &f64::INFINITY));
    }

    #[test]
    fn constructors_fit_the_equals_fn_slot() {
        let comparators: [(EqualsFn<i32>, bool); 3] = [
            (default_equals_fn(), true),
            (never_equals_fn(), false),
            (always_equals_fn(), true),
        ];
        for (cmp, expected) in comparators {
            assert_eq!(cmp(&3, &3), expected);
        }
    }

    #[test]
    fn nan_signal_does_not_notify_repeatedly() {
        use crate::primitives::signal::signal_with_equals;

        let s = signal_with_equals(f64::NAN, safe_equals_f64);
        assert!(!s.set(f64::NAN));
        assert!(s.set(1.0));
    }
}
