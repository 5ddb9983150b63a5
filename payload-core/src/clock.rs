//! Mission time sources and the blocking hold primitive.
//!
//! Actuation sequences pause with [`Hold::hold`] while hardware settles. The
//! firmware backs it with a busy wait on the Embassy time driver; tests and the
//! emulator use [`ManualHold`], which advances a shared [`ManualClock`] so the
//! whole mission timeline runs instantly and deterministically.

use core::cell::Cell;
use core::time::Duration;

/// Blocking wait used between actuation steps.
pub trait Hold {
    /// Blocks the caller for `duration`.
    fn hold(&mut self, duration: Duration);
}

impl<H: Hold + ?Sized> Hold for &mut H {
    fn hold(&mut self, duration: Duration) {
        (**self).hold(duration);
    }
}

/// Monotonic elapsed-time reading since the mission loop started.
pub trait MissionClock {
    /// Returns the elapsed mission time. Successive calls never decrease.
    fn now(&self) -> Duration;
}

impl<C: MissionClock + ?Sized> MissionClock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Creates a clock reading zero.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(Duration::ZERO)
    }

    /// Creates a clock reading `at`.
    #[must_use]
    pub const fn starting_at(at: Duration) -> Self {
        Self { now: Cell::new(at) }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    /// Jumps to `at`, ignoring requests to move backwards.
    pub fn advance_to(&self, at: Duration) {
        if at > self.now.get() {
            self.now.set(at);
        }
    }
}

impl MissionClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// [`Hold`] that advances a [`ManualClock`] instead of sleeping.
#[derive(Debug)]
pub struct ManualHold<'a> {
    clock: &'a ManualClock,
    held: Duration,
    holds: u32,
}

impl<'a> ManualHold<'a> {
    #[must_use]
    pub const fn new(clock: &'a ManualClock) -> Self {
        Self {
            clock,
            held: Duration::ZERO,
            holds: 0,
        }
    }

    /// Total time spent in holds so far.
    #[must_use]
    pub const fn total_held(&self) -> Duration {
        self.held
    }

    /// Number of holds performed so far.
    #[must_use]
    pub const fn hold_count(&self) -> u32 {
        self.holds
    }
}

impl Hold for ManualHold<'_> {
    fn hold(&mut self, duration: Duration) {
        self.clock.advance(duration);
        self.held = self.held.saturating_add(duration);
        self.holds = self.holds.saturating_add(1);
    }
}
