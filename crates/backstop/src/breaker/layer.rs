// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use layered::Layer;
use tick::Clock;

use super::service::{Breaker, BreakerShared, BreakerState};
use crate::{Context, Expiry};

pub(crate) const DEFAULT_FAILURE_THRESHOLD: u32 = 1;

/// Builder for the circuit breaker middleware.
///
/// Created by calling [`Breaker::layer`]. Every setting has a default, so the
/// layer can be applied as-is or tuned first:
///
/// - [`failure_threshold`][Self::failure_threshold]: consecutive failures that trip
///   the circuit (default 1)
/// - [`expiry_with`][Self::expiry_with]: backoff function sizing the open window
///   (default exponential, 20ms doubling)
///
/// Applying the layer to a service creates a breaker with fresh state; applying it
/// again creates an independent breaker.
#[derive(Debug)]
pub struct BreakerLayer {
    name: Cow<'static, str>,
    clock: Clock,
    failure_threshold: u32,
    expiry: Expiry,
}

impl BreakerLayer {
    pub(crate) fn new(name: Cow<'static, str>, context: &Context) -> Self {
        Self {
            name,
            clock: context.clock().clone(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            expiry: Expiry::default(),
        }
    }

    /// Sets the number of consecutive failures that trips the circuit.
    ///
    /// Values below 1 are clamped to 1.
    ///
    /// **Default**: 1
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the backoff function sizing the open window.
    ///
    /// The function receives the overshoot index: 0 when the circuit first opens,
    /// growing by one with each failed probe.
    ///
    /// **Default**: [`Expiry::exponential`]
    #[must_use]
    pub fn expiry_with(mut self, expiry_fn: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.expiry = Expiry::new(expiry_fn);
        self
    }
}

impl<S> Layer<S> for BreakerLayer {
    type Service = Breaker<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Breaker {
            shared: Arc::new(BreakerShared {
                name: self.name.clone(),
                clock: self.clock.clone(),
                failure_threshold: self.failure_threshold,
                expiry: self.expiry.clone(),
                state: Mutex::new(BreakerState::default()),
            }),
            inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyspawn::Spawner;
    use layered::Execute;

    use super::*;

    fn context() -> Context {
        Context::new(&Clock::new_frozen(), Spawner::new_tokio())
    }

    #[test]
    fn layer_ensure_defaults() {
        let layer = Breaker::layer("test_breaker", &context());

        assert_eq!(layer.failure_threshold, 1);
        assert_eq!(layer.expiry.call(0), Duration::from_millis(20));
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let layer = Breaker::layer("test_breaker", &context()).failure_threshold(0);

        assert_eq!(layer.failure_threshold, 1);
    }

    #[test]
    fn each_application_gets_fresh_state() {
        let layer = Breaker::layer("test_breaker", &context()).failure_threshold(3);

        let first = layer.layer(Execute::new(|v: u32| async move { Ok::<_, crate::OpenCircuitError>(v) }));
        let second = layer.layer(Execute::new(|v: u32| async move { Ok::<_, crate::OpenCircuitError>(v) }));

        assert!(!Arc::ptr_eq(&first.shared, &second.shared));
        assert_eq!(second.shared.failure_threshold, 3);
    }
}
