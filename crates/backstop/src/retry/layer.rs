// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use layered::Layer;
use tick::Clock;

use super::service::{Retry, RetryShared};
use crate::{Context, Expiry};

pub(crate) const DEFAULT_RETRY_THRESHOLD: u32 = 3;

/// Builder for the retry middleware.
///
/// Created by calling [`Retry::layer`]. Every setting has a default:
///
/// - [`retry_threshold`][Self::retry_threshold]: maximum re-invocations after the
///   initial failed attempt (default 3)
/// - [`expiry_with`][Self::expiry_with]: backoff function sizing the sleep between
///   attempts (default exponential, 20ms doubling)
#[derive(Debug)]
pub struct RetryLayer {
    name: Cow<'static, str>,
    clock: Clock,
    retry_threshold: u32,
    expiry: Expiry,
}

impl RetryLayer {
    pub(crate) fn new(name: Cow<'static, str>, context: &Context) -> Self {
        Self {
            name,
            clock: context.clock().clone(),
            retry_threshold: DEFAULT_RETRY_THRESHOLD,
            expiry: Expiry::default(),
        }
    }

    /// Sets the maximum number of retries after the initial failed attempt.
    ///
    /// A threshold of `T` allows at most `T + 1` total invocations of the wrapped
    /// service. Values below 1 are clamped to 1.
    ///
    /// **Default**: 3
    #[must_use]
    pub fn retry_threshold(mut self, threshold: u32) -> Self {
        self.retry_threshold = threshold.max(1);
        self
    }

    /// Sets the backoff function sizing the sleep between attempts.
    ///
    /// The function receives the zero-based index of the attempt that just failed.
    /// There is no jitter; the schedule is deterministic.
    ///
    /// **Default**: [`Expiry::exponential`][crate::Expiry::exponential]
    #[must_use]
    pub fn expiry_with(mut self, expiry_fn: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.expiry = Expiry::new(expiry_fn);
        self
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            shared: Arc::new(RetryShared {
                name: self.name.clone(),
                clock: self.clock.clone(),
                retry_threshold: self.retry_threshold,
                expiry: self.expiry.clone(),
            }),
            inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyspawn::Spawner;

    use super::*;

    fn context() -> Context {
        Context::new(&Clock::new_frozen(), Spawner::new_tokio())
    }

    #[test]
    fn layer_ensure_defaults() {
        let layer = Retry::layer("test_retry", &context());

        assert_eq!(layer.retry_threshold, 3);
        assert_eq!(layer.expiry.call(1), Duration::from_millis(40));
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let layer = Retry::layer("test_retry", &context()).retry_threshold(0);

        assert_eq!(layer.retry_threshold, 1);
    }
}
