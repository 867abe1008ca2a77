use core::fmt;

use captouch::TouchSensor;

use crate::hal::pac;
use crate::hal::rcc::Rcc;
use crate::hal::tsc::{self, Tsc};

/// Location of one pad on the touch sensing controller
#[derive(Clone, Copy, Debug)]
pub struct PadChannel {
    pub group: u8,
    /// IO used for the group's sampling capacitor
    pub sample: u8,
    pub channel: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchError {
    /// The group reached the max count before its sampling cap charged, usually
    /// an open or shorted pad.
    MaxCount,
}

impl fmt::Display for TouchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TouchError::MaxCount => f.write_str("sensor max count"),
        }
    }
}

/// All pads behind the TSC peripheral, read one at a time
pub struct TouchPads {
    tsc: Tsc,
}

impl TouchPads {
    pub fn new(tsc: pac::TSC, rcc: &mut Rcc) -> Self {
        let config = tsc::Config {
            clock_prescale: None,
            max_count: Some(tsc::MaxCount::U8191),
            charge_transfer_high: None,
            charge_transfer_low: None,
        };
        Self {
            tsc: Tsc::tsc(tsc, rcc, Some(config)),
        }
    }
}

impl TouchSensor for TouchPads {
    type Channel = PadChannel;
    type Error = TouchError;

    fn read_raw_touch(&mut self, pad: PadChannel) -> Result<u16, TouchError> {
        // The HAL driver has no per-group setup, so go around it for the IO
        // control registers.
        let regs = unsafe { pac::Peripherals::steal().TSC };

        let group_bit: u32 = 1 << (pad.group - 1);
        let io_offset = (pad.group - 1) * 4;

        regs.iogcsr.write(|w| unsafe { w.bits(group_bit) });
        regs.ioscr.write(|w| unsafe { w.bits(1 << (io_offset + pad.sample - 1)) });
        regs.ioccr.write(|w| unsafe { w.bits(1 << (io_offset + pad.channel - 1)) });

        // A max count error also shows up in the group status below
        self.tsc.acquire().ok();

        // Status bits are only set for groups that completed before max count
        let group_status = regs.iogcsr.read().bits() >> 16;
        if group_status & group_bit == 0 {
            return Err(TouchError::MaxCount);
        }

        Ok(self.tsc.read_unchecked(pad.group))
    }
}
