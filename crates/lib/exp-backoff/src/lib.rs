//! Reconnect cooldown calculator.
//!
//! A factor of `1` yields a fixed cooldown, anything above grows the delay
//! geometrically up to the clamp.

#![no_std]

use core::time::Duration;

/// A cooldown state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// The delay to start from, and to return to on [`State::reset`].
    initial: Duration,

    /// Factor to multiply the current delay by to calculate the next one.
    factor: u32,

    /// Delay clamp.
    max: Duration,

    /// Precomputed delay value to return next.
    value: Duration,
}

impl State {
    /// Create a new state.
    ///
    /// The clamp is raised to `initial` if it is lower, so the first delay
    /// is always returned as configured.
    pub fn new(initial: Duration, factor: u32, max: Duration) -> Self {
        Self {
            initial,
            factor: factor.max(1),
            max: max.max(initial),
            value: initial,
        }
    }

    /// Obtain the stored delay value and precompute next one.
    pub fn advance(&mut self) -> Duration {
        let current = self.value;
        self.value = current.saturating_mul(self.factor).min(self.max);
        current
    }

    /// Start over from the initial delay.
    pub fn reset(&mut self) {
        self.value = self.initial;
    }
}
