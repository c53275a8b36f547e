// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaker middleware for failing fast against an unhealthy dependency.
//!
//! The breaker counts consecutive failures of the wrapped service. Once the count
//! reaches the configured failure threshold the circuit is open: calls are rejected
//! immediately with [`OpenCircuitError`][crate::OpenCircuitError] and the wrapped
//! service is not invoked. After a backoff window elapses, the next call is allowed
//! through as a probe. A successful probe closes the circuit; a failed probe keeps
//! it open and lengthens the next window.
//!
//! The window for the k-th overshoot past the threshold is `expiry(k)`, so the wait
//! grows with the cumulative overshoot, not merely the attempt count. The default
//! backoff is [`Expiry::exponential`][crate::Expiry::exponential].
//!
//! # Quick Start
//!
//! ```rust
//! use anyspawn::Spawner;
//! use backstop::breaker::Breaker;
//! use backstop::{Context, OpenCircuitError};
//! use layered::{Execute, Service, Stack};
//! use tick::Clock;
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Unavailable,
//!     Upstream,
//! }
//!
//! impl From<OpenCircuitError> for FetchError {
//!     fn from(_: OpenCircuitError) -> Self {
//!         Self::Unavailable
//!     }
//! }
//!
//! # async fn example(clock: Clock) {
//! let context = Context::new(&clock, Spawner::new_tokio());
//!
//! let service = (
//!     Breaker::layer("fetch_breaker", &context).failure_threshold(5),
//!     Execute::new(fetch),
//! )
//!     .into_service();
//!
//! let result = service.execute(42u32).await;
//! # let _result = result;
//! # }
//! # async fn fetch(input: u32) -> Result<u32, FetchError> {
//! #     Ok(input)
//! # }
//! ```
//!
//! # Concurrency
//!
//! The breaker guards its counters with a mutex held only across its own
//! bookkeeping, never across the call into the wrapped service. See [`Breaker`]
//! for the consequences for concurrent probes.

mod layer;
mod service;

pub use layer::BreakerLayer;
pub use service::Breaker;
