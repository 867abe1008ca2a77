#![no_main]
#![no_std]

use core::fmt::Write;
use cortex_m_rt::entry;
use heapless::Vec;
use panic_halt as _;

use stm32f0xx_hal as hal;

use captouch::{ButtonConfig, CapacitiveButton, Clock, Gesture};

use crate::hal::pac;
use crate::hal::prelude::*;

use clock::SysTickClock;
use sensor::{PadChannel, TouchPads};

mod clock;
mod sensor;
mod serial;

/// Wiring and tuning for one touch button
struct ButtonSpec {
    name: &'static str,
    pad: PadChannel,
    config: ButtonConfig,
}

// Thresholds are in raw TSC counts. Build with the `telemetry` feature to see
// the smoothed readings when retuning for a new board.
static BUTTONS: [ButtonSpec; 4] = [
    ButtonSpec {
        name: "btn1",
        pad: PadChannel { group: 1, sample: 2, channel: 1 },
        config: ButtonConfig::new(65, 70),
    },
    ButtonSpec {
        name: "btn2",
        pad: PadChannel { group: 2, sample: 3, channel: 1 },
        config: ButtonConfig::new(60, 63),
    },
    ButtonSpec {
        name: "btn3",
        pad: PadChannel { group: 3, sample: 4, channel: 2 },
        config: ButtonConfig::new(72, 80),
    },
    ButtonSpec {
        name: "btn4",
        pad: PadChannel { group: 6, sample: 2, channel: 1 },
        config: ButtonConfig::new(72, 80),
    },
];

const MAX_BUTTONS: usize = 8;
const POLL_INTERVAL_MS: u64 = 4;
const TELEMETRY_INTERVAL_MS: u64 = 50;

/// A running button and whether its last read failed
struct Slot {
    name: &'static str,
    button: CapacitiveButton<PadChannel>,
    faulted: bool,
}

type Buttons = Vec<Slot, MAX_BUTTONS>;

fn gesture_name(gesture: Gesture) -> &'static str {
    match gesture {
        Gesture::ShortPress => "Short Press",
        Gesture::LongPress => "Long Press",
    }
}

fn report_telemetry<W: Write>(out: &mut W, buttons: &Buttons) {
    write!(out, "|").ok();
    for slot in buttons.iter() {
        write!(out, " {} |", slot.button.last_smoothed_value()).ok();
    }
    write!(out, "\r\n").ok();
}

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    let mut flash = dp.FLASH;
    let mut rcc = dp.RCC.configure().sysclk(48.mhz()).freeze(&mut flash);
    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpiob = dp.GPIOB.split(&mut rcc);

    // A library requiring a critical section to set a gpio AF register is bad and I just won't.
    let fake_cs = unsafe { cortex_m::interrupt::CriticalSection::new() };

    // Initialize touch pins
    let _btn1 = gpioa.pa0.into_alternate_af3(&fake_cs);
    let _btn2 = gpioa.pa4.into_alternate_af3(&fake_cs);
    let _btn3 = gpiob.pb0.into_alternate_af3(&fake_cs);
    let _btn4 = gpiob.pb11.into_alternate_af3(&fake_cs);
    let _g1_cap = gpioa.pa1.into_alternate_af3(&fake_cs);
    let _g2_cap = gpioa.pa6.into_alternate_af3(&fake_cs);
    let _g3_cap = gpiob.pb2.into_alternate_af3(&fake_cs);
    let _g6_cap = gpiob.pb12.into_alternate_af3(&fake_cs);

    let tx_pin = gpiob.pb6.into_alternate_af0(&fake_cs);
    let rx_pin = gpiob.pb7.into_alternate_af0(&fake_cs);
    let uart = hal::serial::Serial::usart1(dp.USART1, (tx_pin, rx_pin), 115200.bps(), &mut rcc);
    serial::uart1::init(uart, 4);

    let mut pads = TouchPads::new(dp.TSC, &mut rcc);
    let clock = SysTickClock::start(cp.SYST, &mut rcc);

    let mut out = serial::uart1::writer();
    write!(out, "Touch button test\r\n").ok();

    let mut buttons = Buttons::new();
    for spec in BUTTONS.iter() {
        let slot = Slot {
            name: spec.name,
            button: CapacitiveButton::new(spec.pad, spec.config),
            faulted: false,
        };
        if buttons.push(slot).is_err() {
            write!(out, "{} not added, more than {} buttons\r\n", spec.name, MAX_BUTTONS).ok();
        }
    }

    let mut next_poll = 0;
    let mut next_telemetry = 0;

    loop {
        let now = clock.now_ms();
        if now < next_poll {
            continue;
        }
        next_poll = now + POLL_INTERVAL_MS;

        for slot in buttons.iter_mut() {
            match slot.button.poll(&mut pads, &clock) {
                Ok(_) => slot.faulted = false,
                Err(e) => {
                    // Only report the first failure of a run
                    if !slot.faulted {
                        write!(out, "{} {}\r\n", slot.name, e).ok();
                    }
                    slot.faulted = true;
                    continue;
                }
            }

            while let Some(gesture) = slot.button.take_gesture() {
                write!(out, "{} {}\r\n", slot.name, gesture_name(gesture)).ok();
            }
        }

        if cfg!(feature = "telemetry") && now >= next_telemetry {
            next_telemetry = now + TELEMETRY_INTERVAL_MS;
            report_telemetry(&mut out, &buttons);
        }
    }
}
