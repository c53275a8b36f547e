// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use layered::Service;
use tick::Clock;

use super::RetryLayer;
use crate::{Context, Expiry};

/// Applies bounded re-invocation to service execution.
///
/// `Retry` wraps an inner [`Service`] and re-invokes it with a clone of the same
/// input when it fails, sleeping `expiry(attempt)` between attempts. Attempts are
/// strictly sequential. The error surfaced to the caller is always the final
/// attempt's error, never a wrapped or aggregated one.
///
/// `Retry` is configured by calling [`Retry::layer`] and using the builder methods
/// on the returned [`RetryLayer`].
#[derive(Debug)]
pub struct Retry<S> {
    pub(super) shared: Arc<RetryShared>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct RetryShared {
    pub(crate) name: Cow<'static, str>,
    pub(crate) clock: Clock,
    pub(crate) retry_threshold: u32,
    pub(crate) expiry: Expiry,
}

impl<S: Clone> Clone for Retry<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl Retry<()> {
    /// Creates a new retry layer with the specified name.
    ///
    /// Returns a [`RetryLayer`] that can be tuned with builder methods before
    /// being applied to a service. Prefer `snake_case` names; they appear in log
    /// events.
    #[must_use]
    pub fn layer(name: impl Into<Cow<'static, str>>, context: &Context) -> RetryLayer {
        RetryLayer::new(name.into(), context)
    }
}

impl<In, Res, Err, S> Service<In> for Retry<S>
where
    In: Clone + Send,
    Res: Send,
    Err: Send,
    S: Service<In, Out = Result<Res, Err>>,
{
    type Out = Result<Res, Err>;

    async fn execute(&self, input: In) -> Self::Out {
        for attempt in 0..self.shared.retry_threshold {
            match self.inner.execute(input.clone()).await {
                Ok(value) => return Ok(value),
                Err(_absorbed) => {
                    let delay = self.shared.expiry.call(attempt);
                    tracing::debug!(
                        retry.name = %self.shared.name,
                        attempt,
                        delay = delay.as_secs_f32(),
                        "attempt failed, backing off"
                    );
                    self.shared.clock.delay(delay).await;
                }
            }
        }

        // Final attempt: its outcome goes to the caller as-is.
        self.inner.execute(input).await
    }
}
