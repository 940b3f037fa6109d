//! Eight-channel reflectance array read through an MCP3008 ADC.

use std::error::Error;
use std::time::Duration;

use lf_traits::{LineSensor, SENSOR_COUNT, SensorFrame};
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::error::{HwError, Result};
use crate::util::busy_wait;

pub struct Mcp3008Array {
    spi: Spi,
    emitters: OutputPin,
    settle: Duration,
}

impl Mcp3008Array {
    /// Open the ADC on `bus`/`cs` and claim the emitter enable pin.
    pub fn new(bus: u8, cs: u8, clock_hz: u32, emitter_pin: u8, settle: Duration) -> Result<Self> {
        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(HwError::Spi(format!("unsupported SPI bus {other}"))),
        };
        let ss = match cs {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(HwError::Spi(format!("unsupported chip select {other}"))),
        };
        let spi =
            Spi::new(bus, ss, clock_hz, Mode::Mode0).map_err(|e| HwError::Spi(e.to_string()))?;
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let emitters = gpio
            .get(emitter_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output_low();
        tracing::info!(clock_hz, emitter_pin, "mcp3008 sensor array ready");
        Ok(Self {
            spi,
            emitters,
            settle,
        })
    }

    /// Single-ended conversion of one channel.
    fn read_channel(&mut self, ch: u8) -> Result<u16> {
        let tx = [0x01, (0x08 | ch) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok((u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]))
    }

    fn read_all(&mut self) -> Result<[u16; SENSOR_COUNT]> {
        let mut samples = [0u16; SENSOR_COUNT];
        for (ch, s) in samples.iter_mut().enumerate() {
            *s = self.read_channel(ch as u8)?;
        }
        Ok(samples)
    }
}

impl LineSensor for Mcp3008Array {
    fn acquire_frame(&mut self) -> std::result::Result<SensorFrame, Box<dyn Error + Send + Sync>> {
        self.emitters.set_high();
        busy_wait(self.settle);
        let res = self.read_all();
        self.emitters.set_low();
        match res {
            Ok(samples) => {
                tracing::trace!(?samples, "mcp3008 frame");
                Ok(SensorFrame::new(samples))
            }
            Err(e) => {
                tracing::error!("sensor read error: {}", e);
                Err(Box::new(e))
            }
        }
    }
}
