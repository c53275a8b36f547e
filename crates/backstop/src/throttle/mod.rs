// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Token-bucket throttle middleware for bounding call rates.
//!
//! The throttle admits a call only when its token bucket is non-empty, taking one
//! token per admitted call and rejecting the rest immediately with
//! [`ThrottledError`][crate::ThrottledError]. The bucket starts full at
//! `max_tokens` and is replenished by `refill_tokens` every `refill_interval`,
//! clamped at `max_tokens`, by a background task on the shared
//! [`Spawner`][anyspawn::Spawner].
//!
//! The refill task is started lazily on the first call through a given throttle
//! instance and runs for as long as the throttle's state is alive; see
//! [`Throttle`] for the task's lifetime.
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use anyspawn::Spawner;
//! use backstop::throttle::Throttle;
//! use backstop::{Context, ThrottledError};
//! use layered::{Execute, Service, Stack};
//! use tick::Clock;
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Busy,
//! }
//!
//! impl From<ThrottledError> for FetchError {
//!     fn from(_: ThrottledError) -> Self {
//!         Self::Busy
//!     }
//! }
//!
//! # async fn example(clock: Clock) {
//! let context = Context::new(&clock, Spawner::new_tokio());
//!
//! let service = (
//!     Throttle::layer("fetch_throttle", &context)
//!         .max_tokens(10)
//!         .refill_tokens(10)
//!         .refill_interval(Duration::from_secs(1)),
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

mod layer;
mod service;

pub use layer::ThrottleLayer;
pub use service::Throttle;
