// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use anyspawn::Spawner;
use layered::Layer;
use tick::Clock;

use super::service::{Throttle, ThrottleShared};
use crate::Context;

pub(crate) const DEFAULT_MAX_TOKENS: u32 = 1;
pub(crate) const DEFAULT_REFILL_TOKENS: u32 = 1;
pub(crate) const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(1);

/// Builder for the throttle middleware.
///
/// Created by calling [`Throttle::layer`]. Every setting has a default:
///
/// - [`max_tokens`][Self::max_tokens]: bucket capacity (default 1)
/// - [`refill_tokens`][Self::refill_tokens]: tokens added per interval (default 1)
/// - [`refill_interval`][Self::refill_interval]: time between refills (default 1s)
///
/// Applying the layer to a service creates a throttle with a fresh, full bucket;
/// applying it again creates an independent throttle with its own refill task.
#[derive(Debug)]
pub struct ThrottleLayer {
    name: Cow<'static, str>,
    clock: Clock,
    spawner: Spawner,
    max_tokens: u32,
    refill_tokens: u32,
    refill_interval: Duration,
}

impl ThrottleLayer {
    pub(crate) fn new(name: Cow<'static, str>, context: &Context) -> Self {
        Self {
            name,
            clock: context.clock().clone(),
            spawner: context.spawner().clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            refill_tokens: DEFAULT_REFILL_TOKENS,
            refill_interval: DEFAULT_REFILL_INTERVAL,
        }
    }

    /// Sets the bucket capacity.
    ///
    /// The bucket starts full. Values below 1 are clamped to 1.
    ///
    /// **Default**: 1
    #[must_use]
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens.max(1);
        self
    }

    /// Sets the number of tokens added to the bucket on every refill.
    ///
    /// Refills clamp at the bucket capacity. Values below 1 are clamped to 1.
    ///
    /// **Default**: 1
    #[must_use]
    pub fn refill_tokens(mut self, tokens: u32) -> Self {
        self.refill_tokens = tokens.max(1);
        self
    }

    /// Sets the interval between refills.
    ///
    /// **Default**: 1 second
    #[must_use]
    pub fn refill_interval(mut self, interval: Duration) -> Self {
        self.refill_interval = interval;
        self
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = Throttle<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Throttle {
            shared: Arc::new(ThrottleShared {
                name: self.name.clone(),
                clock: self.clock.clone(),
                spawner: self.spawner.clone(),
                max_tokens: self.max_tokens,
                refill_tokens: self.refill_tokens,
                refill_interval: self.refill_interval,
                tokens: Mutex::new(self.max_tokens),
                refill_task: OnceLock::new(),
            }),
            inner,
        }
    }
}
