/// Bit-banged UART line
/// Steps the TX engine from SysTick and copies its line level onto a GPIO pin

use atsamd_hal as hal;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
use hal::gpio::{Pin, PushPullOutput, PA04};
use hal::prelude::*;

use samd51_uart_tx::{StreamWriter, Transmitter, TxInput};

/// Words buffered between USB and the engine
pub const QUEUE_DEPTH: usize = 64;

pub struct UartLine {
    engine: Transmitter,
    writer: StreamWriter<QUEUE_DEPTH>,
    syst: SYST,
    pin: Pin<PA04, PushPullOutput>,
    released: bool,
}

impl UartLine {
    /// Program SysTick to wrap `engine_hz` times a second. Each wrap is one
    /// engine clock edge. The first edge holds the engine in reset.
    pub fn new(
        engine: Transmitter,
        mut syst: SYST,
        core_hz: u32,
        engine_hz: u32,
        mut pin: Pin<PA04, PushPullOutput>,
    ) -> Self {
        pin.set_high().ok();

        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(core_hz / engine_hz - 1);
        syst.clear_current();
        syst.enable_counter();

        UartLine {
            engine,
            writer: StreamWriter::new(),
            syst,
            pin,
            released: false,
        }
    }

    pub fn engine(&self) -> &Transmitter {
        &self.engine
    }

    /// Free slots in the word queue
    pub fn room(&self) -> usize {
        QUEUE_DEPTH - self.writer.len()
    }

    pub fn queue(&mut self, word: u16) -> Result<(), u16> {
        self.writer.push(word)
    }

    pub fn sent(&self) -> u32 {
        self.writer.sent()
    }

    /// Nothing queued and the line back at idle
    pub fn is_idle(&self) -> bool {
        self.writer.is_empty() && !self.engine.is_busy()
    }

    /// Run one engine edge if SysTick has wrapped since the last call.
    /// Returns the word the engine accepted on that edge.
    ///
    /// Wraps missed while the caller is busy elsewhere are lost, which
    /// stretches the current bit.
    pub fn poll(&mut self) -> Option<u16> {
        if !self.syst.has_wrapped() {
            return None;
        }

        let input = if self.released {
            TxInput {
                reset: false,
                stream: self.writer.beat(),
            }
        } else {
            self.released = true;
            TxInput::reset()
        };

        let output = self.engine.clock(input);
        if output.tx {
            self.pin.set_high().ok();
        } else {
            self.pin.set_low().ok();
        }
        self.writer.complete(output.accepted)
    }
}
