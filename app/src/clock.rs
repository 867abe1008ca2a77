use core::cell::Cell;

use captouch::Clock;
use cortex_m::interrupt::Mutex;
use cortex_m::peripheral::SYST;
use cortex_m_rt::exception;

use crate::hal::prelude::*;
use crate::hal::rcc::Rcc;
use crate::hal::timers::{Event, Timer};

static MILLIS: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));

/// Millisecond clock counted by the SysTick exception
pub struct SysTickClock {
    _timer: Timer<SYST>,
}

impl SysTickClock {
    pub fn start(syst: SYST, rcc: &mut Rcc) -> Self {
        let mut timer = Timer::syst(syst, 1000.hz(), rcc);
        timer.listen(&Event::TimeOut);
        Self { _timer: timer }
    }
}

impl Clock for SysTickClock {
    fn now_ms(&self) -> u64 {
        // u64 is not read atomically on the M0
        cortex_m::interrupt::free(|cs| MILLIS.borrow(cs).get())
    }
}

#[exception]
fn SysTick() {
    cortex_m::interrupt::free(|cs| {
        let millis = MILLIS.borrow(cs);
        millis.set(millis.get() + 1);
    });
}
