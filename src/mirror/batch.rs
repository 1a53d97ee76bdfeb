//! Bounded-concurrency batch runner for mirror writes.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

use crate::error::Error;
use crate::sync::pause;

/// Pause between items in sequential mode.
pub const SEQUENTIAL_PAUSE: Duration = Duration::from_millis(350);

pub const FOLDER_BATCH: usize = 5;
pub const ROUTINE_BATCH: usize = 10;
pub const WORKOUT_BATCH: usize = 10;
pub const PROGRESS_BATCH: usize = 10;
pub const EXERCISE_BATCH: usize = 15;
pub const SET_BATCH: usize = 20;

/// How many items are in flight at once, and how long to wait between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub size: usize,
    pub pause: Duration,
}

impl BatchPlan {
    pub fn concurrent(size: usize) -> Self {
        Self {
            size: size.max(1),
            pause: Duration::ZERO,
        }
    }

    pub fn sequential() -> Self {
        Self {
            size: 1,
            pause: SEQUENTIAL_PAUSE,
        }
    }

    /// `size` when batching, one-at-a-time otherwise.
    pub fn for_mode(sequential: bool, size: usize) -> Self {
        if sequential {
            Self::sequential()
        } else {
            Self::concurrent(size)
        }
    }
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<Error>,
    /// Set when a group hit a rate limit; later groups were not dispatched.
    pub halted: bool,
}

/// Run `f` over `items` in groups of `plan.size`.
///
/// Each group is dispatched together and awaited as a set before the next
/// starts. Failures are collected, not raised. A rate-limit failure stops
/// dispatch after the current group.
pub async fn run_batches<I, T, F, Fut>(items: Vec<I>, plan: &BatchPlan, f: F) -> BatchOutcome<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = crate::error::Result<T>>,
{
    let mut outcome = BatchOutcome {
        succeeded: Vec::with_capacity(items.len()),
        failed: Vec::new(),
        halted: false,
    };
    let mut remaining = items.into_iter().peekable();
    while remaining.peek().is_some() {
        let group: Vec<I> = remaining.by_ref().take(plan.size).collect();
        for result in join_all(group.into_iter().map(&f)).await {
            match result {
                Ok(value) => outcome.succeeded.push(value),
                Err(e) => {
                    outcome.halted |= e.is_rate_limit();
                    outcome.failed.push(e);
                }
            }
        }
        if outcome.halted {
            break;
        }
        if remaining.peek().is_some() {
            pause(plan.pause).await;
        }
    }
    outcome
}
