// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use anyspawn::{JoinHandle, Spawner};
use futures_util::StreamExt;
use layered::Service;
use tick::{Clock, PeriodicTimer};

use super::ThrottleLayer;
use crate::{Context, ERR_POISONED_LOCK, ThrottledError};

/// Applies token-bucket admission control to service execution.
///
/// `Throttle` wraps an inner [`Service`] and admits a call only when its token
/// bucket is non-empty. The check and the decrement happen in one critical
/// section, so concurrent callers can never drive the bucket below zero or admit
/// more calls than there are tokens. Admitted calls return the inner result or
/// error unchanged; rejected calls fail immediately with [`ThrottledError`].
///
/// `Throttle` is configured by calling [`Throttle::layer`] and using the builder
/// methods on the returned [`ThrottleLayer`].
///
/// # Refill task lifetime
///
/// The first call through a given throttle instance spawns one background refill
/// task, which wakes every refill interval and tops the bucket up. The task holds
/// only a weak reference to the throttle state: it keeps running after all
/// service handles are dropped only until its next tick, at which point it
/// observes the dropped state and exits. It cannot be stopped earlier.
#[derive(Debug)]
pub struct Throttle<S> {
    pub(super) shared: Arc<ThrottleShared>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct ThrottleShared {
    pub(crate) name: Cow<'static, str>,
    pub(crate) clock: Clock,
    pub(crate) spawner: Spawner,
    pub(crate) max_tokens: u32,
    pub(crate) refill_tokens: u32,
    pub(crate) refill_interval: Duration,
    pub(crate) tokens: Mutex<u32>,
    pub(crate) refill_task: OnceLock<JoinHandle<()>>,
}

impl<S: Clone> Clone for Throttle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl Throttle<()> {
    /// Creates a new throttle layer with the specified name.
    ///
    /// Returns a [`ThrottleLayer`] that can be tuned with builder methods before
    /// being applied to a service. Prefer `snake_case` names; they appear in log
    /// events.
    #[must_use]
    pub fn layer(name: impl Into<Cow<'static, str>>, context: &Context) -> ThrottleLayer {
        ThrottleLayer::new(name.into(), context)
    }
}

impl<In, Res, Err, S> Service<In> for Throttle<S>
where
    In: Send,
    Res: Send,
    Err: From<ThrottledError> + Send,
    S: Service<In, Out = Result<Res, Err>>,
{
    type Out = Result<Res, Err>;

    async fn execute(&self, input: In) -> Self::Out {
        ThrottleShared::ensure_refill_task(&self.shared);

        self.shared.try_acquire()?;

        self.inner.execute(input).await
    }
}

impl ThrottleShared {
    /// Starts the background refill task on the first call through this instance.
    fn ensure_refill_task(shared: &Arc<Self>) {
        shared.refill_task.get_or_init(|| {
            tracing::debug!(throttle.name = %shared.name, "starting refill task");

            let weak = Arc::downgrade(shared);
            let clock = shared.clock.clone();
            let interval = shared.refill_interval;

            shared.spawner.spawn(async move {
                refill_loop(weak, &clock, interval).await;
            })
        });
    }

    /// Takes one token, or rejects when the bucket is empty. Check and decrement
    /// are a single critical section.
    fn try_acquire(&self) -> Result<(), ThrottledError> {
        let mut tokens = self.tokens.lock().expect(ERR_POISONED_LOCK);

        if *tokens == 0 {
            tracing::trace!(throttle.name = %self.name, "bucket empty, rejecting call");
            return Err(ThrottledError);
        }

        *tokens -= 1;
        Ok(())
    }

    fn refill(&self) {
        let mut tokens = self.tokens.lock().expect(ERR_POISONED_LOCK);

        *tokens = tokens.saturating_add(self.refill_tokens).min(self.max_tokens);
    }
}

/// Tops the bucket up every interval until the owning throttle is dropped.
async fn refill_loop(shared: Weak<ThrottleShared>, clock: &Clock, interval: Duration) {
    let mut timer = PeriodicTimer::new(clock, interval);

    while timer.next().await.is_some() {
        let Some(shared) = shared.upgrade() else {
            break;
        };

        shared.refill();
    }
}
