// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retry middleware for absorbing transient failures.
//!
//! The retry middleware re-invokes a failing call with the same input, sleeping
//! between attempts according to a backoff function. With a retry threshold of `T`,
//! the wrapped service is invoked at most `T + 1` times: the original call plus `T`
//! retries. A success returns immediately; intermediate failures are absorbed and
//! only the final attempt's error reaches the caller, unchanged.
//!
//! Attempts are strictly sequential — there is never more than one in flight for a
//! single call — and the inter-attempt sleep is a cooperative suspension on the
//! shared [`Clock`][tick::Clock], not a thread block. The middleware observes no
//! cancellation signal of its own; callers needing a deadline must race the whole
//! decorated call against an external timeout.
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use anyspawn::Spawner;
//! use backstop::retry::Retry;
//! use backstop::Context;
//! use layered::{Execute, Service, Stack};
//! use tick::Clock;
//!
//! # async fn example(clock: Clock) {
//! let context = Context::new(&clock, Spawner::new_tokio());
//!
//! let service = (
//!     Retry::layer("fetch_retry", &context)
//!         .retry_threshold(2)
//!         .expiry_with(|attempt| Duration::from_millis(50 << attempt)),
//!     Execute::new(fetch),
//! )
//!     .into_service();
//!
//! let result = service.execute("payload".to_string()).await;
//! # let _result = result;
//! # }
//! # async fn fetch(input: String) -> Result<String, String> {
//! #     Ok(input)
//! # }
//! ```

mod layer;
mod service;

pub use layer::RetryLayer;
pub use service::Retry;
