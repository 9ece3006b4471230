use std::num::NonZeroU64;
use std::ops::ControlFlow;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;

use super::Reason;
use super::Strategy;
use super::time_to_next_unit;
use super::units_in;

/// A credit-shaped limiter.
///
/// The bucket starts full. Each admitted request spends one token and tokens
/// refill at `refill_rate` per second up to `capacity`, so bursts up to
/// `capacity` pass immediately.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    refill_rate: u64,
    state: Mutex<State>,
    clock: Clock,
}

#[derive(Debug)]
struct State {
    tokens: u64,
    last_refill: Instant,
}

impl State {
    fn refill(&mut self, now: Instant, refill_rate: u64, capacity: u64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }

        let added = units_in(elapsed, refill_rate);
        if added == 0 {
            return;
        }

        self.tokens = self.tokens.saturating_add(added).min(capacity);
        self.last_refill = now;
    }
}

impl Strategy for TokenBucket {
    fn process(&self) -> ControlFlow<Reason, u64> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.refill(now, self.refill_rate, self.capacity);

        if state.tokens == 0 {
            let elapsed = now.saturating_duration_since(state.last_refill);
            return ControlFlow::Break(Reason::Overloaded {
                level: 0,
                retry_after: time_to_next_unit(elapsed, self.refill_rate),
            });
        }

        state.tokens -= 1;
        ControlFlow::Continue(state.tokens)
    }

    fn level(&self) -> u64 {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.refill(now, self.refill_rate, self.capacity);
        state.tokens
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn rate(&self) -> u64 {
        self.refill_rate
    }
}

impl TokenBucket {
    /// Creates a new, full `TokenBucket`.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of tokens the bucket holds.
    /// * `refill_rate` - The number of tokens added per second.
    pub fn new(capacity: NonZeroU64, refill_rate: NonZeroU64) -> Self {
        Self::with_clock(capacity, refill_rate, Clock::new())
    }

    /// Creates a new, full `TokenBucket` reading time from `clock`.
    pub fn with_clock(capacity: NonZeroU64, refill_rate: NonZeroU64, clock: Clock) -> Self {
        let last_refill = clock.now();
        Self {
            capacity: capacity.get(),
            refill_rate: refill_rate.get(),
            state: Mutex::new(State {
                tokens: capacity.get(),
                last_refill,
            }),
            clock,
        }
    }

    /// Attempts to spend a single token.
    pub fn try_consume(&self) -> bool {
        self.process().is_continue()
    }

    /// Tokens available after accounting for any refill.
    pub fn current_tokens(&self) -> u64 {
        self.level()
    }

    pub fn refill_rate(&self) -> u64 {
        self.refill_rate
    }
}
