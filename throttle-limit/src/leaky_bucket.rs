use std::num::NonZeroU64;
use std::ops::ControlFlow;

use parking_lot::Mutex;
use quanta::Clock;
use quanta::Instant;

use super::Reason;
use super::Strategy;
use super::time_to_next_unit;
use super::units_in;

/// A queue-shaped limiter.
///
/// Every admitted request occupies one slot in the bucket and slots drain out
/// at `leak_rate` per second. Short bursts up to `capacity` are queued, the
/// sustained admission rate converges to the leak rate.
#[derive(Debug)]
pub struct LeakyBucket {
    capacity: u64,
    leak_rate: u64,
    state: Mutex<State>,
    clock: Clock,
}

#[derive(Debug)]
struct State {
    size: u64,
    last_leak: Instant,
}

impl State {
    fn leak(&mut self, now: Instant, leak_rate: u64) {
        let elapsed = now.saturating_duration_since(self.last_leak);
        if elapsed.is_zero() {
            return;
        }

        let leaked = units_in(elapsed, leak_rate);
        // Keep accumulating against the old timestamp until a whole unit leaks
        if leaked == 0 {
            return;
        }

        self.size = self.size.saturating_sub(leaked);
        self.last_leak = now;
    }
}

impl Strategy for LeakyBucket {
    fn process(&self) -> ControlFlow<Reason, u64> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.leak(now, self.leak_rate);

        if state.size >= self.capacity {
            let elapsed = now.saturating_duration_since(state.last_leak);
            return ControlFlow::Break(Reason::Overloaded {
                level: state.size,
                retry_after: time_to_next_unit(elapsed, self.leak_rate),
            });
        }

        state.size += 1;
        ControlFlow::Continue(state.size)
    }

    fn level(&self) -> u64 {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.leak(now, self.leak_rate);
        state.size
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn rate(&self) -> u64 {
        self.leak_rate
    }
}

impl LeakyBucket {
    /// Creates a new, empty `LeakyBucket`.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of queued requests.
    /// * `leak_rate` - The number of queued requests drained per second.
    pub fn new(capacity: NonZeroU64, leak_rate: NonZeroU64) -> Self {
        Self::with_clock(capacity, leak_rate, Clock::new())
    }

    /// Creates a new, empty `LeakyBucket` reading time from `clock`.
    pub fn with_clock(capacity: NonZeroU64, leak_rate: NonZeroU64, clock: Clock) -> Self {
        let last_leak = clock.now();
        Self {
            capacity: capacity.get(),
            leak_rate: leak_rate.get(),
            state: Mutex::new(State { size: 0, last_leak }),
            clock,
        }
    }

    /// Attempts to queue a single request.
    ///
    /// Returns `false` if the bucket is full. A rejected request does not
    /// change the size, although the leak pass that precedes it may.
    pub fn try_add(&self) -> bool {
        self.process().is_continue()
    }

    /// The number of queued requests after accounting for any leaks.
    pub fn current_size(&self) -> u64 {
        self.level()
    }

    pub fn leak_rate(&self) -> u64 {
        self.leak_rate
    }
}
