// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// The error returned when a circuit breaker rejects a call without invoking the
/// wrapped service.
///
/// Produced only by the breaker's admission check while the circuit is open. It is
/// never used to wrap or replace an error coming from the wrapped service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker is open")]
pub struct OpenCircuitError;

/// The error returned when a throttle rejects a call because its token bucket is
/// empty.
///
/// Produced only by the throttle's admission check; the wrapped service is not
/// invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("too many calls")]
pub struct ThrottledError;
