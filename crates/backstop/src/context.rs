// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyspawn::Spawner;
use tick::Clock;

/// Shared dependencies for a chain of fault-tolerance middleware.
///
/// Pass a single `Context` to every layer in a chain so they share one
/// [`Clock`] for window math and backoff sleeps, and one [`Spawner`] for the
/// throttle's background refill task.
///
/// # Examples
///
/// ```
/// use anyspawn::Spawner;
/// use backstop::Context;
/// use tick::Clock;
///
/// # fn example(clock: Clock) {
/// let context = Context::new(&clock, Spawner::new_tokio());
/// # let _context = context;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    clock: Clock,
    spawner: Spawner,
}

impl Context {
    /// Creates a context from a clock and a task spawner.
    #[must_use]
    pub fn new(clock: impl AsRef<Clock>, spawner: Spawner) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            spawner,
        }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn spawner(&self) -> &Spawner {
        &self.spawner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let clock = Clock::new_frozen();
        let context = Context::new(&clock, Spawner::new_tokio());
        let cloned = context.clone();

        assert_eq!(context.clock().instant(), cloned.clock().instant());
        assert!(format!("{context:?}").contains("Context"));
    }
}
