#![cfg_attr(not(test), no_std)]

//! Short-press / long-press detection for polled capacitive touch pads.
//!
//! Each [`CapacitiveButton`] smooths its raw readings with an integer
//! exponential moving average and runs a small debounced state machine over
//! the result. Sampling and time are supplied by the caller, either directly
//! through [`CapacitiveButton::tick`] or through the [`TouchSensor`] and
//! [`Clock`] capabilities with [`CapacitiveButton::poll`].
//!
//! The sensing convention is "lower reading = more touch": a pad is pressed
//! when the smoothed value drops below `press_threshold` and released when it
//! climbs back above `release_threshold`.

#[macro_use]
mod fmt;

pub mod button;
pub mod filter;
pub mod sensor;

pub use button::CapacitiveButton;
pub use filter::Ema;
pub use sensor::{Clock, TouchSensor};

/// Phases of the gesture state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    /// No touch in progress
    Idle,
    /// Touch accepted, long-press duration not yet reached
    Pressed,
    /// Touch held past the long-press duration
    Held,
    /// Touch just ended. Lasts a single tick, then returns to `Idle`.
    Released,
}

/// A classified touch-and-release cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    ShortPress,
    LongPress,
}

pub const DEFAULT_LONG_PRESS_MS: u64 = 1000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;
pub const DEFAULT_EMA_SHIFT: u8 = 2;

/// Configuration for a single touch button
///
/// Thresholds are compared against the smoothed reading. For a working
/// hysteresis band `press_threshold` must be below `release_threshold`; this
/// is not checked; an inverted pair just produces poor gesture detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonConfig {
    /// Smoothed value must fall below this to begin a press
    pub press_threshold: u16,
    /// Smoothed value must rise above this to end a press
    pub release_threshold: u16,
    /// Milliseconds a press must last before it is reported as a long press
    pub long_press_ms: u64,
    /// Minimum milliseconds between accepted press / release transitions
    pub debounce_ms: u64,
    /// EMA weight of a new sample is 1 / 2^ema_shift
    pub ema_shift: u8,
}

impl ButtonConfig {
    pub const fn new(press_threshold: u16, release_threshold: u16) -> Self {
        Self {
            press_threshold,
            release_threshold,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ema_shift: DEFAULT_EMA_SHIFT,
        }
    }

    pub const fn long_press_ms(mut self, ms: u64) -> Self {
        self.long_press_ms = ms;
        self
    }

    pub const fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub const fn ema_shift(mut self, shift: u8) -> Self {
        self.ema_shift = shift;
        self
    }

    /// True when the thresholds leave a gap between press and release
    pub const fn has_hysteresis(&self) -> bool {
        self.press_threshold < self.release_threshold
    }
}
