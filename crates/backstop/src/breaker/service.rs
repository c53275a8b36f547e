// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use layered::Service;
use tick::Clock;

use super::BreakerLayer;
use crate::{Context, ERR_POISONED_LOCK, Expiry, OpenCircuitError};

/// Applies circuit breaker logic to service execution.
///
/// `Breaker` wraps an inner [`Service`] and tracks consecutive failures. When the
/// count reaches the failure threshold the circuit opens and calls are rejected
/// with [`OpenCircuitError`] until a backoff window elapses, after which a single
/// probe call is let through. The breaker never alters outputs: the inner result
/// or error is returned unchanged whenever the inner service runs.
///
/// `Breaker` is configured by calling [`Breaker::layer`] and using the builder
/// methods on the returned [`BreakerLayer`].
///
/// # Concurrency
///
/// The state mutex is held only across the admission check and across the
/// post-call bookkeeping, never across the inner call itself. The admission
/// decision and the inner invocation are therefore not one atomic transaction:
/// callers racing within the same probe window may each be admitted, so more than
/// one probe can be in flight at once. Bookkeeping stays consistent — each
/// completed call updates the failure counter and the last-attempt timestamp as
/// one unit.
#[derive(Debug)]
pub struct Breaker<S> {
    pub(super) shared: Arc<BreakerShared>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct BreakerShared {
    pub(crate) name: Cow<'static, str>,
    pub(crate) clock: Clock,
    pub(crate) failure_threshold: u32,
    pub(crate) expiry: Expiry,
    pub(crate) state: Mutex<BreakerState>,
}

/// Mutable breaker bookkeeping, updated as one unit under the state mutex.
#[derive(Debug, Default)]
pub(crate) struct BreakerState {
    pub(crate) consecutive_failures: u32,
    pub(crate) last_attempt: Option<Instant>,
}

impl<S: Clone> Clone for Breaker<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl Breaker<()> {
    /// Creates a new circuit breaker layer with the specified name.
    ///
    /// Returns a [`BreakerLayer`] that can be tuned with builder methods before
    /// being applied to a service. Prefer `snake_case` names; they appear in log
    /// events.
    #[must_use]
    pub fn layer(name: impl Into<Cow<'static, str>>, context: &Context) -> BreakerLayer {
        BreakerLayer::new(name.into(), context)
    }
}

impl<In, Res, Err, S> Service<In> for Breaker<S>
where
    In: Send,
    Res: Send,
    Err: From<OpenCircuitError> + Send,
    S: Service<In, Out = Result<Res, Err>>,
{
    type Out = Result<Res, Err>;

    async fn execute(&self, input: In) -> Self::Out {
        self.shared.admit()?;

        let out = self.inner.execute(input).await;

        self.shared.record(out.is_err());
        out
    }
}

impl BreakerShared {
    /// Admission check: rejects while the circuit is open and the current
    /// overshoot's backoff window has not yet elapsed.
    fn admit(&self) -> Result<(), OpenCircuitError> {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        if state.consecutive_failures >= self.failure_threshold
            && let Some(last_attempt) = state.last_attempt
        {
            let overshoot = state.consecutive_failures - self.failure_threshold;
            let retry_at = last_attempt.checked_add(self.expiry.call(overshoot));

            // A window that overflows instant arithmetic never elapses.
            if retry_at.is_none_or(|at| self.clock.instant() < at) {
                tracing::debug!(breaker.name = %self.name, overshoot, "circuit open, rejecting call");
                return Err(OpenCircuitError);
            }

            tracing::debug!(breaker.name = %self.name, overshoot, "circuit probing");
        }

        Ok(())
    }

    /// Post-call bookkeeping: stamps the attempt time and moves the consecutive
    /// failure counter.
    fn record(&self, failed: bool) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        state.last_attempt = Some(self.clock.instant());

        if failed {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);

            if state.consecutive_failures == self.failure_threshold {
                tracing::warn!(breaker.name = %self.name, "circuit opened");
            }
        } else {
            if state.consecutive_failures >= self.failure_threshold {
                tracing::info!(breaker.name = %self.name, "circuit closed");
            }

            state.consecutive_failures = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    use anyspawn::Spawner;
    use layered::{Execute, Layer};
    use tick::ClockControl;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Inner,
        Open,
    }

    impl From<OpenCircuitError> for TestError {
        fn from(_: OpenCircuitError) -> Self {
            Self::Open
        }
    }

    /// A service that counts invocations and fails while the flag is set.
    fn flaky_service(
        calls: Arc<AtomicU32>,
        fail: Arc<AtomicBool>,
    ) -> impl Service<u32, Out = Result<u32, TestError>> {
        Execute::new(move |input: u32| {
            let calls = Arc::clone(&calls);
            let fail = Arc::clone(&fail);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail.load(Ordering::SeqCst) {
                    Err(TestError::Inner)
                } else {
                    Ok(input)
                }
            }
        })
    }

    fn context(control: &ClockControl) -> Context {
        Context::new(&control.to_clock(), Spawner::new_tokio())
    }

    #[tokio::test]
    async fn passes_through_while_closed() {
        let control = ClockControl::new();
        let calls = Arc::new(AtomicU32::new(0));
        let fail = Arc::new(AtomicBool::new(false));

        let service = Breaker::layer("test_breaker", &context(&control))
            .failure_threshold(3)
            .layer(flaky_service(Arc::clone(&calls), fail));

        for i in 0..5 {
            assert_eq!(service.execute(i).await, Ok(i));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn trips_after_threshold_without_invoking_inner() {
        let control = ClockControl::new();
        let calls = Arc::new(AtomicU32::new(0));
        let fail = Arc::new(AtomicBool::new(true));

        let service = Breaker::layer("test_breaker", &context(&control))
            .failure_threshold(3)
            .layer(flaky_service(Arc::clone(&calls), fail));

        for _ in 0..3 {
            assert_eq!(service.execute(0).await, Err(TestError::Inner));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Open: rejected without reaching the inner service.
        for _ in 0..2 {
            assert_eq!(service.execute(0).await, Err(TestError::Open));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn open_window_grows_with_overshoot() {
        let control = ClockControl::new();
        let calls = Arc::new(AtomicU32::new(0));
        let fail = Arc::new(AtomicBool::new(true));

        let service = Breaker::layer("test_breaker", &context(&control))
            .failure_threshold(1)
            .expiry_with(|overshoot| Duration::from_millis(100 << overshoot))
            .layer(flaky_service(Arc::clone(&calls), Arc::clone(&fail)));

        // Trip the circuit; the first overshoot window is expiry(0) = 100ms.
        assert_eq!(service.execute(0).await, Err(TestError::Inner));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        control.advance(Duration::from_millis(99));
        assert_eq!(service.execute(0).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Window elapsed: exactly one probe reaches the inner service. The probe
        // fails, so the next window is expiry(1) = 200ms from the probe.
        control.advance(Duration::from_millis(1));
        assert_eq!(service.execute(0).await, Err(TestError::Inner));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        control.advance(Duration::from_millis(199));
        assert_eq!(service.execute(0).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A successful probe closes the circuit.
        control.advance(Duration::from_millis(1));
        fail.store(false, Ordering::SeqCst);
        assert_eq!(service.execute(7).await, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Closed: calls pass through again.
        assert_eq!(service.execute(8).await, Ok(8));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovery_resets_the_failure_run() {
        let control = ClockControl::new();
        let calls = Arc::new(AtomicU32::new(0));
        let fail = Arc::new(AtomicBool::new(true));

        let service = Breaker::layer("test_breaker", &context(&control))
            .failure_threshold(2)
            .layer(flaky_service(Arc::clone(&calls), Arc::clone(&fail)));

        assert_eq!(service.execute(0).await, Err(TestError::Inner));
        assert_eq!(service.execute(0).await, Err(TestError::Inner));
        assert_eq!(service.execute(0).await, Err(TestError::Open));

        control.advance(Duration::from_millis(20));
        fail.store(false, Ordering::SeqCst);
        assert_eq!(service.execute(1).await, Ok(1));

        // The run restarts from zero: one new failure is short of the threshold.
        fail.store(true, Ordering::SeqCst);
        assert_eq!(service.execute(0).await, Err(TestError::Inner));
        fail.store(false, Ordering::SeqCst);
        assert_eq!(service.execute(2).await, Ok(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_probes_may_exceed_one_but_bookkeeping_stays_consistent() {
        let control = ClockControl::new();
        let calls = Arc::new(AtomicU32::new(0));
        let fail = Arc::new(AtomicBool::new(true));

        let service = Arc::new(
            Breaker::layer("test_breaker", &context(&control))
                .failure_threshold(1)
                .expiry_with(|_| Duration::from_millis(10))
                .layer(Execute::new({
                    let calls = Arc::clone(&calls);
                    let fail = Arc::clone(&fail);
                    move |input: u32| {
                        let calls = Arc::clone(&calls);
                        let fail = Arc::clone(&fail);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Widen the window between admission and bookkeeping.
                            for _ in 0..4 {
                                tokio::task::yield_now().await;
                            }
                            if fail.load(Ordering::SeqCst) {
                                Err(TestError::Inner)
                            } else {
                                Ok(input)
                            }
                        }
                    }
                })),
        );

        // Trip the circuit, then let the window elapse so probes are admitted.
        assert_eq!(service.execute(0).await, Err(TestError::Inner));
        control.advance(Duration::from_millis(10));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move { service.execute(0).await }));
        }

        let mut inner_failures = 0;
        let mut rejections = 0;
        for handle in handles {
            match handle.await.expect("probe task panicked") {
                Err(TestError::Inner) => inner_failures += 1,
                Err(TestError::Open) => rejections += 1,
                Ok(_) => panic!("inner service cannot succeed here"),
            }
        }

        // The admission check and the inner call are not one atomic transaction,
        // so any number of racing callers may have been admitted as probes; every
        // admitted call reached the inner service, every other call was rejected.
        let admitted = calls.load(Ordering::SeqCst) - 1;
        assert!(admitted >= 1);
        assert_eq!(inner_failures, admitted);
        assert_eq!(rejections, 16 - admitted);
    }

    #[tokio::test]
    async fn inner_error_is_returned_verbatim_while_tripping() {
        let control = ClockControl::new();
        let service = Breaker::layer("test_breaker", &context(&control))
            .failure_threshold(1)
            .layer(Execute::new(|_: u32| async move { Err::<u32, TestError>(TestError::Inner) }));

        // The tripping call itself reports the inner error, not a rejection.
        assert_eq!(service.execute(0).await, Err(TestError::Inner));
    }
}
