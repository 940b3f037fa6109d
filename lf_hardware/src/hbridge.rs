//! Dual H-bridge driven by software PWM on four direction pins plus a
//! shared enable line.

use std::error::Error;

use lf_traits::DriveMotors;
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};
use crate::util::{clamp_speed, duty_for};

struct Wheel {
    forward: OutputPin,
    reverse: OutputPin,
}

impl Wheel {
    fn drive(&mut self, speed: i16, max_speed: i16, pwm_hz: f64) -> Result<()> {
        let duty = duty_for(speed, max_speed);
        let (on, off) = if speed >= 0 {
            (&mut self.forward, &mut self.reverse)
        } else {
            (&mut self.reverse, &mut self.forward)
        };
        off.clear_pwm().map_err(|e| HwError::Gpio(e.to_string()))?;
        off.set_low();
        if duty == 0.0 {
            on.clear_pwm().map_err(|e| HwError::Gpio(e.to_string()))?;
            on.set_low();
            return Ok(());
        }
        on.set_pwm_frequency(pwm_hz, duty)
            .map_err(|e| HwError::Gpio(e.to_string()))
    }

    fn coast(&mut self) -> Result<()> {
        for pin in [&mut self.forward, &mut self.reverse] {
            pin.clear_pwm().map_err(|e| HwError::Gpio(e.to_string()))?;
            pin.set_low();
        }
        Ok(())
    }
}

/// GPIO numbers for the bridge.
#[derive(Debug, Clone, Copy)]
pub struct HBridgePins {
    pub enable: u8,
    pub left_forward: u8,
    pub left_reverse: u8,
    pub right_forward: u8,
    pub right_reverse: u8,
}

pub struct HBridge {
    enable: OutputPin,
    left: Wheel,
    right: Wheel,
    max_speed: i16,
    pwm_hz: f64,
}

impl HBridge {
    pub fn new(pins: HBridgePins, max_speed: i16, pwm_hz: f64) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let out = |n: u8| -> Result<OutputPin> {
            Ok(gpio
                .get(n)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low())
        };
        Ok(Self {
            enable: out(pins.enable)?,
            left: Wheel {
                forward: out(pins.left_forward)?,
                reverse: out(pins.left_reverse)?,
            },
            right: Wheel {
                forward: out(pins.right_forward)?,
                reverse: out(pins.right_reverse)?,
            },
            max_speed,
            pwm_hz,
        })
    }
}

impl DriveMotors for HBridge {
    fn set_differential_speed(
        &mut self,
        left: i16,
        right: i16,
    ) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        let left = clamp_speed(left, self.max_speed);
        let right = clamp_speed(right, self.max_speed);
        self.left.drive(left, self.max_speed, self.pwm_hz)?;
        self.right.drive(right, self.max_speed, self.pwm_hz)?;
        Ok(())
    }

    fn enable(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.enable.set_high();
        tracing::info!("motor driver enabled");
        Ok(())
    }

    fn disable(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.enable.set_low();
        self.left.coast()?;
        self.right.coast()?;
        tracing::info!("motor driver disabled");
        Ok(())
    }
}

impl Drop for HBridge {
    fn drop(&mut self) {
        self.enable.set_low();
    }
}
