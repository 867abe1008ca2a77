use crate::filter::Ema;
use crate::sensor::{Clock, TouchSensor};
use crate::{ButtonConfig, ButtonState, Gesture};

/// A single capacitive touch pad with short / long press detection
///
/// `C` is the opaque channel handle handed to the [`TouchSensor`] in
/// [`poll`](Self::poll); the button itself never looks at it.
///
/// Short and long press are exclusive outcomes of one touch: once a press has
/// become a long press, releasing it does not also report a short press.
/// Each kind of event is a single-slot mailbox, so a second event of the same
/// kind before it is consumed replaces the first.
#[derive(Clone, Debug)]
pub struct CapacitiveButton<C> {
    channel: C,
    config: ButtonConfig,
    filter: Ema,
    state: ButtonState,
    last_transition_ms: u64,
    press_start_ms: u64,
    short_press: bool,
    long_press: bool,
}

impl<C> CapacitiveButton<C> {
    pub const fn new(channel: C, config: ButtonConfig) -> Self {
        Self {
            channel,
            config,
            filter: Ema::new(config.ema_shift),
            state: ButtonState::Idle,
            last_transition_ms: 0,
            press_start_ms: 0,
            short_press: false,
            long_press: false,
        }
    }

    /// Process one raw reading taken at `now_ms`
    ///
    /// Runs the smoothing filter, then advances the state machine by a single
    /// step. Returns the smoothed value, which is also what gets compared
    /// against the thresholds.
    pub fn tick(&mut self, raw: u16, now_ms: u64) -> u16 {
        let value = self.filter.update(raw);

        let debounced = now_ms.wrapping_sub(self.last_transition_ms) > self.config.debounce_ms;
        let touching = value < self.config.press_threshold;
        let released = value > self.config.release_threshold;

        let next = match self.state {
            ButtonState::Idle => {
                if touching && debounced {
                    self.press_start_ms = now_ms;
                    self.last_transition_ms = now_ms;
                    ButtonState::Pressed
                } else {
                    ButtonState::Idle
                }
            }
            ButtonState::Pressed => {
                if touching {
                    if now_ms.wrapping_sub(self.press_start_ms) > self.config.long_press_ms {
                        self.long_press = true;
                        ButtonState::Held
                    } else {
                        ButtonState::Pressed
                    }
                } else if released && debounced {
                    self.short_press = true;
                    self.last_transition_ms = now_ms;
                    ButtonState::Released
                } else {
                    ButtonState::Pressed
                }
            }
            ButtonState::Held => {
                if released && debounced {
                    self.last_transition_ms = now_ms;
                    ButtonState::Released
                } else {
                    ButtonState::Held
                }
            }
            ButtonState::Released => ButtonState::Idle,
        };

        if next != self.state {
            trace!("touch {} -> {} at {} ms, value {}", self.state, next, now_ms, value);
        }
        self.state = next;

        value
    }

    /// Read this button's channel from `sensor`, timestamp it with `clock` and
    /// [`tick`](Self::tick)
    ///
    /// A sensor error is returned as-is and the button is left untouched.
    pub fn poll<S, K>(&mut self, sensor: &mut S, clock: &K) -> Result<u16, S::Error>
    where
        C: Copy,
        S: TouchSensor<Channel = C>,
        K: Clock,
    {
        let raw = sensor.read_raw_touch(self.channel)?;
        Ok(self.tick(raw, clock.now_ms()))
    }

    /// Returns true once per short press, then false until the next one
    pub fn consume_short_press(&mut self) -> bool {
        if self.short_press {
            self.short_press = false;
            true
        } else {
            false
        }
    }

    /// Returns true once per long press, then false until the next one
    pub fn consume_long_press(&mut self) -> bool {
        if self.long_press {
            self.long_press = false;
            true
        } else {
            false
        }
    }

    /// Consume one pending gesture. A pending long press is returned first.
    pub fn take_gesture(&mut self) -> Option<Gesture> {
        if self.consume_long_press() {
            debug!("long press");
            Some(Gesture::LongPress)
        } else if self.consume_short_press() {
            debug!("short press");
            Some(Gesture::ShortPress)
        } else {
            None
        }
    }

    pub fn current_state(&self) -> ButtonState {
        self.state
    }

    /// Smoothed value from the most recent tick, 0 before the first one
    pub fn last_smoothed_value(&self) -> u16 {
        self.filter.value()
    }

    /// Change the EMA weight, α = 1 / 2^shift. Takes effect on the next tick.
    pub fn set_ema_shift(&mut self, shift: u8) {
        self.config.ema_shift = shift;
        self.filter.set_shift(shift);
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use core::cell::Cell;

    /// Thresholds from the first pad of the reference board, unsmoothed so
    /// that each raw sample is the value the state machine sees.
    const RAW_CONFIG: ButtonConfig = ButtonConfig::new(65, 70).ema_shift(0);

    const TOUCH: u16 = 60;
    const OPEN: u16 = 75;

    fn pressed_at_51() -> CapacitiveButton<()> {
        let mut b = CapacitiveButton::new((), RAW_CONFIG);
        b.tick(TOUCH, 0);
        b.tick(TOUCH, 51);
        assert_eq!(b.current_state(), ButtonState::Pressed);
        b
    }

    #[derive(Debug, PartialEq)]
    struct ReadFailed;

    struct FakePads {
        readings: [u16; 2],
        fail: bool,
    }

    impl TouchSensor for FakePads {
        type Channel = usize;
        type Error = ReadFailed;

        fn read_raw_touch(&mut self, channel: usize) -> Result<u16, ReadFailed> {
            if self.fail {
                Err(ReadFailed)
            } else {
                Ok(self.readings[channel])
            }
        }
    }

    struct FakeClock(Cell<u64>);

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.get()
        }
    }

    #[test]
    fn test_press_waits_for_debounce() {
        let mut b = CapacitiveButton::new((), RAW_CONFIG);

        assert_eq!(b.tick(TOUCH, 0), TOUCH);
        assert_eq!(b.current_state(), ButtonState::Idle);

        b.tick(TOUCH, 50);
        assert_eq!(b.current_state(), ButtonState::Idle, "Pressed without debounce elapsed");

        b.tick(TOUCH, 51);
        assert_eq!(b.current_state(), ButtonState::Pressed);
    }

    #[test]
    fn test_no_press_above_threshold() {
        let mut b = CapacitiveButton::new((), RAW_CONFIG);
        // Exactly at the press threshold is not a touch
        for t in 0..200 {
            b.tick(65, t * 10);
            assert_eq!(b.current_state(), ButtonState::Idle);
        }
    }

    #[test]
    fn test_long_press() {
        let mut b = pressed_at_51();

        b.tick(TOUCH, 1051);
        assert_eq!(b.current_state(), ButtonState::Pressed, "Long press fired early");
        assert!(!b.consume_long_press());

        b.tick(TOUCH, 1052);
        assert_eq!(b.current_state(), ButtonState::Held);
        assert!(b.consume_long_press());
        assert!(!b.consume_long_press());
        assert!(!b.consume_short_press());

        // Holding on does not report again
        b.tick(TOUCH, 5000);
        assert_eq!(b.current_state(), ButtonState::Held);
        assert!(!b.consume_long_press());
    }

    #[test]
    fn test_short_press() {
        let mut b = pressed_at_51();

        b.tick(OPEN, 101);
        assert_eq!(b.current_state(), ButtonState::Pressed, "Released without debounce elapsed");

        b.tick(OPEN, 102);
        assert_eq!(b.current_state(), ButtonState::Released);

        // Released lasts one tick regardless of the reading
        b.tick(TOUCH, 103);
        assert_eq!(b.current_state(), ButtonState::Idle);

        assert!(b.consume_short_press());
        assert!(!b.consume_short_press());
        assert!(!b.consume_long_press());
    }

    #[test]
    fn test_repress_waits_for_debounce_after_release() {
        let mut b = pressed_at_51();
        b.tick(OPEN, 102);
        b.tick(OPEN, 103);
        assert_eq!(b.current_state(), ButtonState::Idle);

        b.tick(TOUCH, 152);
        assert_eq!(b.current_state(), ButtonState::Idle);
        b.tick(TOUCH, 153);
        assert_eq!(b.current_state(), ButtonState::Pressed);
    }

    #[test]
    fn test_reference_scenario() {
        let mut b = CapacitiveButton::new((), RAW_CONFIG);

        b.tick(60, 0);
        assert_eq!(b.current_state(), ButtonState::Idle);

        b.tick(60, 60);
        assert_eq!(b.current_state(), ButtonState::Pressed);

        b.tick(60, 1100);
        assert_eq!(b.current_state(), ButtonState::Held);

        b.tick(75, 1160);
        assert_eq!(b.current_state(), ButtonState::Released);

        b.tick(0, 1161);
        assert_eq!(b.current_state(), ButtonState::Idle);

        assert!(!b.consume_short_press(), "Long press also reported a short press");
        assert!(b.consume_long_press());
        assert!(!b.consume_long_press());
    }

    #[test]
    fn test_hysteresis_band_holds_state() {
        let mut b = pressed_at_51();

        // Inside the band nothing progresses, not even the long press timer
        for t in [200, 2000, 5000] {
            b.tick(67, t);
            assert_eq!(b.current_state(), ButtonState::Pressed);
        }

        b.tick(TOUCH, 5001);
        assert_eq!(b.current_state(), ButtonState::Held);

        b.tick(67, 9000);
        assert_eq!(b.current_state(), ButtonState::Held);
        // Exactly at the release threshold is still touching
        b.tick(70, 9001);
        assert_eq!(b.current_state(), ButtonState::Held);
        b.tick(71, 9002);
        assert_eq!(b.current_state(), ButtonState::Released);
    }

    #[test]
    fn test_short_press_overwrites() {
        let mut b = CapacitiveButton::new((), RAW_CONFIG);
        let script = [
            (TOUCH, 0), (TOUCH, 51), (OPEN, 102), (OPEN, 103),
            (TOUCH, 153), (OPEN, 204), (OPEN, 205),
        ];
        for (raw, t) in script {
            b.tick(raw, t);
        }
        assert_eq!(b.current_state(), ButtonState::Idle);

        // Two presses, one slot
        assert!(b.consume_short_press());
        assert!(!b.consume_short_press());
    }

    #[test]
    fn test_take_gesture_order() {
        let mut b = CapacitiveButton::new((), RAW_CONFIG);
        let script = [
            // long press
            (TOUCH, 0), (TOUCH, 51), (TOUCH, 1052), (OPEN, 1102), (OPEN, 1103),
            // short press
            (TOUCH, 1153), (OPEN, 1204), (OPEN, 1205),
        ];
        for (raw, t) in script {
            b.tick(raw, t);
        }

        assert_eq!(b.take_gesture(), Some(Gesture::LongPress));
        assert_eq!(b.take_gesture(), Some(Gesture::ShortPress));
        assert_eq!(b.take_gesture(), None);
    }

    #[test]
    fn test_smoothing_delays_press() {
        let mut b = CapacitiveButton::new((), ButtonConfig::new(65, 70));

        assert_eq!(b.last_smoothed_value(), 0);
        assert_eq!(b.tick(100, 0), 100);

        // 100 -> 85 -> 74 -> 66 -> 60
        for (t, expected) in [(100, 85), (200, 74), (300, 66)] {
            assert_eq!(b.tick(40, t), expected);
            assert_eq!(b.current_state(), ButtonState::Idle);
        }
        assert_eq!(b.tick(40, 400), 60);
        assert_eq!(b.last_smoothed_value(), 60);
        assert_eq!(b.current_state(), ButtonState::Pressed);
    }

    #[test]
    fn test_set_ema_shift() {
        let mut b = CapacitiveButton::new((), ButtonConfig::new(65, 70));
        b.tick(100, 0);
        b.set_ema_shift(0);
        assert_eq!(b.config().ema_shift, 0);
        assert_eq!(b.tick(40, 100), 40);
        assert_eq!(b.current_state(), ButtonState::Pressed);
    }

    #[test]
    fn test_independent_buttons() {
        let script = [
            (TOUCH, 0), (TOUCH, 51), (TOUCH, 1052), (OPEN, 1102), (OPEN, 1103),
            (TOUCH, 1153), (OPEN, 1204), (OPEN, 1205),
        ];

        let mut a = CapacitiveButton::new(0u8, RAW_CONFIG);
        let mut b = CapacitiveButton::new(1u8, RAW_CONFIG);
        let mut other = CapacitiveButton::new(2u8, ButtonConfig::new(10, 20));

        for (raw, t) in script {
            // Updated in different orders, with an unrelated button in between
            if t % 2 == 0 {
                a.tick(raw, t);
                other.tick(0, t);
                b.tick(raw, t);
            } else {
                b.tick(raw, t);
                other.tick(u16::MAX, t);
                a.tick(raw, t);
            }
            assert_eq!(a.current_state(), b.current_state());
            assert_eq!(a.last_smoothed_value(), b.last_smoothed_value());
        }

        assert_eq!(a.take_gesture(), b.take_gesture());
        assert_eq!(a.take_gesture(), b.take_gesture());
        assert_eq!(a.take_gesture(), None);
        assert_eq!(*a.channel(), 0);
        assert_eq!(*b.channel(), 1);
    }

    #[test]
    fn test_poll() {
        let mut pads = FakePads { readings: [100, TOUCH], fail: false };
        let clock = FakeClock(Cell::new(0));

        let mut open = CapacitiveButton::new(0, RAW_CONFIG);
        let mut touched = CapacitiveButton::new(1, RAW_CONFIG);

        assert_eq!(open.poll(&mut pads, &clock), Ok(100));
        assert_eq!(touched.poll(&mut pads, &clock), Ok(TOUCH));

        clock.0.set(51);
        open.poll(&mut pads, &clock).unwrap();
        touched.poll(&mut pads, &clock).unwrap();
        assert_eq!(open.current_state(), ButtonState::Idle);
        assert_eq!(touched.current_state(), ButtonState::Pressed);

        // A failed read changes nothing
        pads.readings = [TOUCH, 100];
        pads.fail = true;
        clock.0.set(200);
        assert_eq!(touched.poll(&mut pads, &clock), Err(ReadFailed));
        assert_eq!(touched.current_state(), ButtonState::Pressed);
        assert_eq!(touched.last_smoothed_value(), TOUCH);

        pads.fail = false;
        assert_eq!(touched.poll(&mut pads, &clock), Ok(100));
        assert_eq!(touched.current_state(), ButtonState::Released);
        assert!(touched.consume_short_press());
    }

    #[test]
    fn test_poll_infallible_sensor() {
        struct Constant(u16);

        impl TouchSensor for Constant {
            type Channel = ();
            type Error = core::convert::Infallible;

            fn read_raw_touch(&mut self, _: ()) -> Result<u16, Self::Error> {
                Ok(self.0)
            }
        }

        let clock = FakeClock(Cell::new(0));
        let clock_ref = &clock;
        let mut sensor = Constant(TOUCH);
        let mut b = CapacitiveButton::new((), RAW_CONFIG);

        b.poll(&mut sensor, &clock_ref).unwrap();
        clock.0.set(51);
        b.poll(&mut sensor, &clock_ref).unwrap();
        assert_eq!(b.current_state(), ButtonState::Pressed);
    }
}
