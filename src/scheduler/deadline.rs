// ============================================================================
// spark-fiber - Deadlines
// When the work loop should hand control back to the host
// ============================================================================

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Asked by the work loop after every unit of work. Returning true saves
/// the cursor and returns [`WorkStatus::Yielded`](super::WorkStatus::Yielded).
///
/// Deadlines are advisory: a unit of work is never interrupted midway.
pub trait Deadline {
    fn should_yield(&self) -> bool;
}

/// Run to completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverYield;

impl Deadline for NeverYield {
    fn should_yield(&self) -> bool {
        false
    }
}

/// Yield once a wall-clock budget has elapsed since creation.
#[derive(Debug, Clone, Copy)]
pub struct TimeSlice {
    start: Instant,
    budget: Duration,
}

impl TimeSlice {
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }
}

impl Deadline for TimeSlice {
    fn should_yield(&self) -> bool {
        self.start.elapsed() >= self.budget
    }
}

/// Yield after a fixed number of units. Deterministic, for tests and for
/// hosts that meter work themselves.
///
/// # Example
///
/// ```
/// use spark_fiber::{Deadline, UnitBudget};
///
/// let budget = UnitBudget::new(2);
/// assert!(!budget.should_yield());
/// assert!(budget.should_yield());
/// assert!(budget.should_yield());
/// ```
#[derive(Debug)]
pub struct UnitBudget {
    remaining: Cell<u32>,
}

impl UnitBudget {
    pub fn new(units: u32) -> Self {
        Self {
            remaining: Cell::new(units),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.get()
    }
}

impl Deadline for UnitBudget {
    fn should_yield(&self) -> bool {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        left == 0
    }
}

impl<F: Fn() -> bool> Deadline for F {
    fn should_yield(&self) -> bool {
        self()
    }
}

// =============================================================================
// TESTS
// =============================================================================
