// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Composes a throttle, a circuit breaker, and a retry layer around a flaky
//! upstream call, then pushes a burst of requests through the stack.
//!
//! Run with: `cargo run --example pipeline`

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyspawn::Spawner;
use backstop::breaker::Breaker;
use backstop::retry::Retry;
use backstop::throttle::Throttle;
use backstop::{Context, OpenCircuitError, ThrottledError};
use layered::{Execute, Service, Stack};
use tick::Clock;

#[derive(Debug)]
enum UpstreamError {
    Busy,
    Unavailable,
    Flaky,
}

impl From<ThrottledError> for UpstreamError {
    fn from(_: ThrottledError) -> Self {
        Self::Busy
    }
}

impl From<OpenCircuitError> for UpstreamError {
    fn from(_: OpenCircuitError) -> Self {
        Self::Unavailable
    }
}

#[tokio::main]
async fn main() {
    let clock = Clock::new_tokio();
    let context = Context::new(&clock, Spawner::new_tokio());

    // Fails twice out of every three calls.
    let attempts = Arc::new(AtomicU32::new(0));
    let flaky_upstream = Execute::new(move |input: u32| {
        let attempts = Arc::clone(&attempts);
        async move {
            if attempts.fetch_add(1, Ordering::SeqCst) % 3 == 0 {
                Ok(input * 10)
            } else {
                Err(UpstreamError::Flaky)
            }
        }
    });

    let service = (
        Throttle::layer("demo_throttle", &context)
            .max_tokens(4)
            .refill_tokens(4)
            .refill_interval(Duration::from_millis(500)),
        Breaker::layer("demo_breaker", &context).failure_threshold(5),
        Retry::layer("demo_retry", &context)
            .retry_threshold(2)
            .expiry_with(|attempt| Duration::from_millis(25 << attempt)),
        flaky_upstream,
    )
        .into_service();

    for request in 0..8u32 {
        match service.execute(request).await {
            Ok(value) => println!("request {request}: ok, value {value}"),
            Err(error) => println!("request {request}: failed, {error:?}"),
        }
    }
}
