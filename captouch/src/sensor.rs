//! Capabilities a button needs from the outside world

/// Source of raw touch readings
///
/// `Channel` is whatever identifies a pad to the driver (a pin, a TSC group /
/// channel pair, an index). Readings follow the "lower = more touch"
/// convention. Implementations are expected to return promptly; a driver that
/// cannot fail uses [`core::convert::Infallible`] as its error.
pub trait TouchSensor {
    type Channel;
    type Error;

    fn read_raw_touch(&mut self, channel: Self::Channel) -> Result<u16, Self::Error>;
}

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
