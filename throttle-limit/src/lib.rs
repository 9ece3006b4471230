//! # throttle-limit
//!
//! `throttle-limit` provides two admission-control strategies for guarding a single
//! resource: a [`LeakyBucket`] and a [`TokenBucket`].
//!
//! ## Core Philosophy
//!
//! Both buckets are bounded counters whose state is `(level, last_update)`. Every
//! public operation runs its accounting pass and its decision inside one short
//! critical section, so concurrent callers see a linearizable sequence of
//! admissions and `0 <= level <= capacity` holds at every observable point.
//!
//! ## Key Concepts
//!
//! * **Lazy Evaluation**: Leaks and refills are recalculated at the moment of the
//!   request. There are no background threads or timers.
//! * **Leaky Bucket**: Starts empty and models a draining queue. Bursts up to
//!   `capacity` are queued, the sustained rate is bounded by the leak rate.
//! * **Token Bucket**: Starts full and models spendable credits. Bursts up to
//!   `capacity` are admitted immediately, then credits refill at a fixed rate.
//! * **Strategy Trait**: A unified interface so callers can swap one bucket for
//!   the other without changing the calling convention.
//!
//! ## Example
//!
//! ```rust
//! use throttle_limit::Strategy;
//! use throttle_limit::TokenBucket;
//! use std::num::NonZeroU64;
//!
//! let capacity = NonZeroU64::new(5).unwrap();
//! let rate = NonZeroU64::new(1).unwrap();
//! let bucket = TokenBucket::new(capacity, rate);
//!
//! if let std::ops::ControlFlow::Continue(remaining) = bucket.process() {
//!     // Request allowed, `remaining` tokens left
//!     assert_eq!(remaining, 4);
//! }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod leaky_bucket;
mod token_bucket;

pub use leaky_bucket::LeakyBucket;
pub use token_bucket::TokenBucket;

/// Reasons why a request might be rejected by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The bucket had no room (leaky) or no credit (token).
    Overloaded {
        /// The level observed by the rejected check.
        level: u64,
        /// Time until the next unit leaks out or refills.
        retry_after: Duration,
    },
}

/// The core trait for both bucket algorithms.
///
/// Implementations are `Send` and `Sync` so a single instance can be shared
/// across threads via `Arc`.
pub trait Strategy: Debug + Send + Sync {
    /// Attempts to admit a single unit of work.
    ///
    /// On success returns the level left behind by this admission. The
    /// accounting pass, the decision and the mutation happen atomically.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the bucket cannot admit the request right now.
    fn process(&self) -> ControlFlow<Reason, u64>;

    /// Current level after catching up on elapsed time.
    ///
    /// Observation advances the accounting but never admits anything.
    fn level(&self) -> u64;

    /// Maximum level, fixed at construction.
    fn capacity(&self) -> u64;

    /// Units per second leaked or refilled, fixed at construction.
    fn rate(&self) -> u64;
}

/// Number of whole units accounted for by `elapsed` at `rate` units per second.
///
/// Elapsed time is truncated to milliseconds before scaling. Saturates at
/// `u64::MAX`.
fn units_in(elapsed: Duration, rate: u64) -> u64 {
    elapsed
        .as_millis()
        .checked_mul(u128::from(rate))
        .and_then(|scaled| u64::try_from(scaled / 1000).ok())
        .unwrap_or(u64::MAX)
}

/// Wait until `units_in` next returns at least one unit.
fn time_to_next_unit(elapsed: Duration, rate: u64) -> Duration {
    let period = 1000_u64.div_ceil(rate);
    let elapsed = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(period.saturating_sub(elapsed))
}
