// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

/// A backoff function mapping an attempt or overshoot index to a wait duration.
///
/// The breaker uses it to size the open window for the k-th overshoot past the
/// failure threshold; the retry middleware uses it to size the sleep after the
/// k-th failed attempt. Both default to [`Expiry::exponential`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use backstop::Expiry;
///
/// // A fixed 250ms wait regardless of the index.
/// let fixed = Expiry::new(|_| Duration::from_millis(250));
/// ```
#[derive(Clone)]
pub struct Expiry(Arc<dyn Fn(u32) -> Duration + Send + Sync>);

impl Expiry {
    /// Creates a backoff function from a closure.
    #[must_use]
    pub fn new(expiry_fn: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self(Arc::new(expiry_fn))
    }

    /// The default exponential backoff: `2 * 2^index * 10ms`.
    ///
    /// The sequence is 20ms, 40ms, 80ms, 160ms, and so on. Values that would
    /// overflow saturate instead of panicking.
    #[must_use]
    pub fn exponential() -> Self {
        Self::new(|index| {
            let factor = index
                .checked_add(1)
                .and_then(|shift| 1u64.checked_shl(shift))
                .unwrap_or(u64::MAX);
            Duration::from_millis(factor.saturating_mul(10))
        })
    }

    pub(crate) fn call(&self, index: u32) -> Duration {
        (self.0)(index)
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Self::exponential()
    }
}

impl Debug for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expiry").finish_non_exhaustive()
    }
}
