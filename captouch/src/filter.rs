//! Integer exponential moving average

/// Exponential moving average over raw touch counts, α = 1 / 2^shift.
///
/// The update is `smoothed - (smoothed >> shift) + (raw >> shift)`. Both terms
/// are shifted separately, so the low bits of `raw` are dropped on every
/// sample; the result is slightly biased compared to
/// `smoothed + ((raw - smoothed) >> shift)` but never leaves the range of the
/// samples it has seen.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ema {
    value: u16,
    initialized: bool,
    shift: u8,
}

impl Ema {
    pub const fn new(shift: u8) -> Self {
        Self {
            value: 0,
            initialized: false,
            shift,
        }
    }

    /// Feed a raw sample and return the new smoothed value
    ///
    /// The first sample after construction or [`reset`](Self::reset) is taken
    /// as-is.
    pub fn update(&mut self, raw: u16) -> u16 {
        if !self.initialized {
            self.value = raw;
            self.initialized = true;
            return raw;
        }

        // A shift of 16 or more drops every bit, so both terms are zero and
        // the value holds.
        let shift = self.shift as u32;
        let decay = self.value.checked_shr(shift).unwrap_or(0);
        let gain = raw.checked_shr(shift).unwrap_or(0);
        self.value = self.value.wrapping_sub(decay).wrapping_add(gain);
        self.value
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn shift(&self) -> u8 {
        self.shift
    }

    /// Takes effect from the next sample; the current value is kept.
    pub fn set_shift(&mut self, shift: u8) {
        self.shift = shift;
    }

    /// Forget the smoothed value. The next sample seeds the filter again.
    pub fn reset(&mut self) {
        self.value = 0;
        self.initialized = false;
    }
}
