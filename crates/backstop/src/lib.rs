// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Composable fault-tolerance middleware for async processing functions.
//!
//! This crate decorates a unit of work — an async function that takes one input and
//! returns a result or a failure — with small, independently configured resilience
//! behaviors. Each decorator wraps a [`Service`][layered::Service] and produces a new
//! service with the identical contract, so decorators can be layered freely without
//! the caller knowing the difference.
//!
//! # Built-in Middleware
//!
//! - [`breaker`]: Trips open after a run of consecutive failures, rejects calls fast
//!   while open, and self-probes for recovery using an expanding backoff.
//! - [`retry`]: Re-invokes a failing call up to a bounded number of times, sleeping
//!   between attempts according to a backoff function.
//! - [`throttle`]: A token-bucket rate limiter that admits a bounded number of calls
//!   per refill interval, replenished by a background timer.
//!
//! # Quick Start
//!
//! Middleware layers stack as tuples, applied outer to inner. The outermost layer
//! sees the caller's input first:
//!
//! ```rust
//! use anyspawn::Spawner;
//! use backstop::breaker::Breaker;
//! use backstop::retry::Retry;
//! use backstop::throttle::Throttle;
//! use backstop::{Context, OpenCircuitError, ThrottledError};
//! use layered::{Execute, Service, Stack};
//! use tick::Clock;
//!
//! #[derive(Debug)]
//! enum ApiError {
//!     Busy,
//!     Unavailable,
//! }
//!
//! impl From<ThrottledError> for ApiError {
//!     fn from(_: ThrottledError) -> Self {
//!         Self::Busy
//!     }
//! }
//!
//! impl From<OpenCircuitError> for ApiError {
//!     fn from(_: OpenCircuitError) -> Self {
//!         Self::Unavailable
//!     }
//! }
//!
//! # async fn example(clock: Clock) {
//! let context = Context::new(&clock, Spawner::new_tokio());
//!
//! let service = (
//!     Throttle::layer("api_throttle", &context).max_tokens(16),
//!     Breaker::layer("api_breaker", &context).failure_threshold(5),
//!     Retry::layer("api_retry", &context).retry_threshold(2),
//!     Execute::new(call_upstream),
//! )
//!     .into_service();
//!
//! let result = service.execute("ping".to_string()).await;
//! # let _result = result;
//! # }
//! # async fn call_upstream(input: String) -> Result<String, ApiError> {
//! #     Ok(input)
//! # }
//! ```
//!
//! # Error Contract
//!
//! Decorators never convert one error kind into another. They only decide whether to
//! invoke the wrapped service and whether to return its error now or later:
//!
//! - [`OpenCircuitError`] and [`ThrottledError`] are produced entirely by decorator
//!   logic; the wrapped service is not invoked. The caller's error type opts into
//!   them through ordinary `From` conversions.
//! - Errors from the wrapped service pass through verbatim. The retry middleware
//!   absorbs intermediate failures and surfaces only the final attempt's error.
//!
//! # Timing
//!
//! All middleware reads time from a [`Clock`][tick::Clock] supplied through
//! [`Context`], so backoff windows and refill intervals can be driven by a
//! controlled clock in tests.

pub mod breaker;
pub mod retry;
pub mod throttle;

mod context;
mod errors;
mod expiry;

pub use context::Context;
pub use errors::{OpenCircuitError, ThrottledError};
pub use expiry::Expiry;

pub(crate) const ERR_POISONED_LOCK: &str =
    "poisoned lock - cannot continue execution because state invariants can no longer be upheld";
