// ============================================================================
// spark-fiber - Equality Functions
// Ready-made `EqualsFn` values for signals, computeds and store slices
// ============================================================================

use std::rc::Rc;

// =============================================================================
// STRICT EQUALITY (Default)
// =============================================================================

/// Strict equality using PartialEq. This is what `signal()` uses.
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

// =============================================================================
// SPECIAL CASES
// =============================================================================

/// f64 equality where NaN equals NaN, so writing NaN twice is a no-op.
///
/// # Example
/// ```
/// use spark_fiber::reactivity::equality::safe_equals_f64;
///
/// assert!(safe_equals_f64(&f64::NAN, &f64::NAN));
/// assert!(!safe_equals_f64(&f64::NAN, &1.0));
/// assert!(safe_equals_f64(&-0.0, &0.0));
/// ```
pub fn safe_equals_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// Identity equality for shared values: two `Rc`s are equal only when they
/// point at the same allocation.
pub fn rc_ptr_equals<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::ptr_eq(a, b)
}

/// Never equal - every write notifies.
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

/// Always equal - writes after the first never notify.
pub fn always_equals<T>(_a: &T, _b: &T) -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================
