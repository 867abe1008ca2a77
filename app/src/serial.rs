/// An IRQ driven, transmit-only serial port for reporting
///
pub mod uart1 {
    use core::cell::RefCell;

    use cortex_m::interrupt::Mutex;
    use heapless::spsc::Queue;
    use stm32f0xx_hal::gpio::{
        gpiob,
        Alternate,
        AF0,
    };

    use crate::hal::{
        pac::{self, interrupt},
        prelude::*,
        serial::{
            Event,
            Serial,
        }
    };

    const TX_Q_SIZE: usize = 256;

    type TxPinType = gpiob::PB6<Alternate<AF0>>;
    type RxPinType = gpiob::PB7<Alternate<AF0>>;
    type Port = Serial<pac::USART1, TxPinType, RxPinType>;

    static PORT: Mutex<RefCell<Option<Port>>> = Mutex::new(RefCell::new(None));
    static TX_Q: Mutex<RefCell<Queue<u8, TX_Q_SIZE>>> = Mutex::new(RefCell::new(Queue::new()));

    pub struct Uart1Tx {}

    impl core::fmt::Write for Uart1Tx {
        fn write_str(&mut self, s: &str) -> Result<(), core::fmt::Error> {
            cortex_m::interrupt::free(|cs| {
                let mut tx_q = TX_Q.borrow(cs).borrow_mut();
                for b in s.bytes() {
                    // Drop the byte if the queue is full
                    let _ = tx_q.enqueue(b);
                }
                if let Some(port) = PORT.borrow(cs).borrow_mut().as_mut() {
                    port.listen(Event::Txe);
                }
            });
            Ok(())
        }
    }

    /// Must be called once during application initialization
    pub fn init(serial: Port, irq_prio: u8) {
        let core = unsafe { pac::CorePeripherals::steal() };
        let mut nvic = core.NVIC;

        cortex_m::interrupt::free(|cs| {
            PORT.borrow(cs).borrow_mut().replace(serial);
        });

        unsafe {
            nvic.set_priority(pac::Interrupt::USART1, irq_prio);
            pac::NVIC::unmask(pac::Interrupt::USART1);
        }
    }

    pub fn writer() -> Uart1Tx {
        Uart1Tx {}
    }

    #[interrupt]
    fn USART1() {
        cortex_m::interrupt::free(|cs| {
            let mut port_cell = PORT.borrow(cs).borrow_mut();
            let port = match port_cell.as_mut() {
                Some(port) => port,
                None => return,
            };
            let usart1 = unsafe { pac::Peripherals::steal().USART1 };

            // Check if there is room to transmit a byte
            let isr = usart1.isr.read();
            if isr.txe().bit_is_set() {
                match TX_Q.borrow(cs).borrow_mut().dequeue() {
                    Some(b) => {
                        port.write(b).ok();
                    },
                    None => {
                        // If the Q is empty, mask the TXE interrupt. It is re-enabled when data is written to the queue
                        port.unlisten(Event::Txe);
                    }
                }
            }
        });
    }
}
