//! Bit-banged SPI reader for the MCP3008 10-bit ADC.
//!
//! Start bit, single-ended mode bit and the 3-bit channel go out on MOSI;
//! a null bit and the 10 data bits come back on MISO. Clock idles low.

use rppal::gpio::{InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};

pub struct Mcp3008 {
    cs: OutputPin,
    clk: OutputPin,
    miso: InputPin,
    mosi: OutputPin,
}

impl Mcp3008 {
    pub fn new(cs: OutputPin, clk: OutputPin, miso: InputPin, mosi: OutputPin) -> Self {
        Self {
            cs,
            clk,
            miso,
            mosi,
        }
    }

    pub fn read_channel(&mut self, channel: u8) -> Result<u16> {
        if channel > 7 {
            return Err(HwError::ChannelOutOfRange(channel));
        }

        self.cs.set_low();
        spin_delay_min();

        // start bit, single-ended bit, then channel MSB-first
        let command = 0b1_1000 | channel;
        for bit in (0..5).rev() {
            if (command >> bit) & 1 == 1 {
                self.mosi.set_high();
            } else {
                self.mosi.set_low();
            }
            self.clock_pulse();
        }

        // one null bit, then 10 data bits MSB-first
        self.clock_pulse();
        let mut value: u16 = 0;
        for _ in 0..10 {
            self.clock_pulse();
            value = (value << 1) | u16::from(self.miso.is_high());
        }

        self.cs.set_high();
        self.mosi.set_low();
        trace!(channel, raw = value, "mcp3008 raw read");
        Ok(value)
    }

    fn clock_pulse(&mut self) {
        self.clk.set_high();
        spin_delay_min();
        self.clk.set_low();
        spin_delay_min();
    }
}

#[inline(always)]
fn spin_delay_min() {
    // a few CPU cycles is enough; the MCP3008 tolerates slow clocks
    std::hint::spin_loop();
}
