//! Active-low push buttons on GPIO inputs with internal pull-ups.

use std::error::Error;

use lf_traits::{BUTTON_COUNT, Buttons};
use rppal::gpio::{Gpio, InputPin};

use crate::error::{HwError, Result};

pub struct GpioButtons {
    pins: [InputPin; BUTTON_COUNT],
}

impl GpioButtons {
    pub fn new(pins: [u8; BUTTON_COUNT]) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let input = |n: u8| -> Result<InputPin> {
            Ok(gpio
                .get(n)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_input_pullup())
        };
        Ok(Self {
            pins: [input(pins[0])?, input(pins[1])?, input(pins[2])?],
        })
    }
}

impl Buttons for GpioButtons {
    fn read(&mut self) -> std::result::Result<[bool; BUTTON_COUNT], Box<dyn Error + Send + Sync>> {
        Ok([
            self.pins[0].is_low(),
            self.pins[1].is_low(),
            self.pins[2].is_low(),
        ])
    }
}
