//! Collaborator traits shared by the control core and the device backends.
//!
//! The core never touches pins, buses or PWM directly; everything it consumes
//! from the platform goes through the traits in this crate.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::error::Error;

/// Number of reflectance sensors in the array.
pub const SENSOR_COUNT: usize = 8;

/// Upper bound of a raw sample (10-bit ADC).
pub const SAMPLE_MAX: u16 = 1023;

/// Number of push buttons on the board.
pub const BUTTON_COUNT: usize = 3;

/// One acquisition of the reflectance array, ordered left to right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SensorFrame([u16; SENSOR_COUNT]);

impl SensorFrame {
    pub const fn new(samples: [u16; SENSOR_COUNT]) -> Self {
        Self(samples)
    }

    /// A frame with every sensor reading the same value.
    pub const fn uniform(value: u16) -> Self {
        Self([value; SENSOR_COUNT])
    }

    pub fn samples(&self) -> &[u16; SENSOR_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl From<[u16; SENSOR_COUNT]> for SensorFrame {
    fn from(samples: [u16; SENSOR_COUNT]) -> Self {
        Self(samples)
    }
}

impl std::ops::Index<usize> for SensorFrame {
    type Output = u16;

    fn index(&self, idx: usize) -> &u16 {
        &self.0[idx]
    }
}

/// Identifies one of the board's push buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    One,
    Two,
    Three,
}

impl ButtonId {
    pub const ALL: [ButtonId; BUTTON_COUNT] = [ButtonId::One, ButtonId::Two, ButtonId::Three];

    pub fn index(self) -> usize {
        match self {
            ButtonId::One => 0,
            ButtonId::Two => 1,
            ButtonId::Three => 2,
        }
    }
}

/// Source of raw reflectance frames.
///
/// Implementations own the enable line, the settle delay and the ADC reads.
pub trait LineSensor {
    fn acquire_frame(&mut self) -> Result<SensorFrame, Box<dyn Error + Send + Sync>>;
}

/// Two independently driven wheels behind one driver enable line.
///
/// `set_differential_speed` clamps each side to the driver's own max-speed
/// bound; callers pass unclamped values.
pub trait DriveMotors {
    fn set_differential_speed(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
    fn enable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;
    fn disable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Level-sampled push buttons; `true` means pressed.
pub trait Buttons {
    fn read(&mut self) -> Result<[bool; BUTTON_COUNT], Box<dyn Error + Send + Sync>>;
}

/// Already-decoded IR remote commands, repeats filtered out.
pub trait RemoteReceiver {
    fn poll(&mut self) -> Option<u8>;
}

impl<T: LineSensor + ?Sized> LineSensor for Box<T> {
    fn acquire_frame(&mut self) -> Result<SensorFrame, Box<dyn Error + Send + Sync>> {
        (**self).acquire_frame()
    }
}

impl<T: DriveMotors + ?Sized> DriveMotors for Box<T> {
    fn set_differential_speed(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        (**self).set_differential_speed(left, right)
    }
    fn enable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        (**self).enable()
    }
    fn disable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        (**self).disable()
    }
}

impl<T: Buttons + ?Sized> Buttons for Box<T> {
    fn read(&mut self) -> Result<[bool; BUTTON_COUNT], Box<dyn Error + Send + Sync>> {
        (**self).read()
    }
}

impl<T: RemoteReceiver + ?Sized> RemoteReceiver for Box<T> {
    fn poll(&mut self) -> Option<u8> {
        (**self).poll()
    }
}
