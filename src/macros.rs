// ============================================================================
// spark-fiber - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// Signals, stores and setters are cheap handles, and most closures handed
/// to `computed`, `watch` or an event listener need their own copy.
///
/// # Usage
///
/// ```rust
/// use spark_fiber::{cloned, computed, signal};
///
/// let a = signal(1);
/// let b = signal(2);
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

/// A computed with its dependencies captured by clone.
///
/// # Usage
///
/// ```rust
/// use spark_fiber::{computed, signal};
///
/// let count = signal(5);
/// let double = computed!(count => count.get() * 2);
/// count.set(6);
/// assert_eq!(double.get(), 12);
/// ```
#[macro_export]
macro_rules! computed {
    ($($deps:ident),+ => $body:expr) => {
        $crate::computed($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::computed(move || $body)
    };
}

/// A watch with its dependencies captured by clone.
///
/// # Usage
///
/// ```rust
/// use spark_fiber::{signal, tick, watch};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let name = signal("ada".to_string());
/// let runs = Rc::new(Cell::new(0));
/// let _watch = watch!(name, runs => {
///     let _ = name.get();
///     runs.set(runs.get() + 1);
/// });
/// name.set("grace".to_string());
/// tick();
/// assert_eq!(runs.get(), 2);
/// ```
#[macro_export]
macro_rules! watch {
    ($($deps:ident),+ => $body:expr) => {
        $crate::watch($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::watch(move || $body)
    };
}
