//! Simulated track, drive and operator inputs.
//!
//! `SimTrack` and `SimDrive` share one world: the track renders the line at
//! the current lateral offset, and every command the drive accepts while
//! enabled steers that offset. Offsets are measured in sensor pitches,
//! positive towards sensor 7.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::error::Error;
use std::rc::Rc;

use lf_traits::{
    BUTTON_COUNT, ButtonId, Buttons, DriveMotors, LineSensor, RemoteReceiver, SAMPLE_MAX,
    SENSOR_COUNT, SensorFrame,
};

use crate::error::HwError;
use crate::util::clamp_speed;

/// Shape of the simulated reflectance profile and its response to steering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackParams {
    pub background: f64,
    pub amplitude: f64,
    pub sigma: f64,
    pub initial_offset: f64,
    /// Offset change per unit of `left - right` per accepted command.
    pub steer_gain: f64,
    /// Offset drift per accepted command, modelling a bend in the track.
    pub curvature: f64,
}

impl Default for TrackParams {
    fn default() -> Self {
        Self {
            background: 100.0,
            amplitude: 800.0,
            sigma: 0.8,
            initial_offset: -1.5,
            steer_gain: 0.0005,
            curvature: 0.0,
        }
    }
}

impl TrackParams {
    /// Render one frame with the line centred at `offset`.
    pub fn render(&self, offset: f64) -> SensorFrame {
        let centre = (SENSOR_COUNT as f64 - 1.0) / 2.0 + offset;
        let two_var = 2.0 * self.sigma * self.sigma;
        let mut samples = [0u16; SENSOR_COUNT];
        for (i, s) in samples.iter_mut().enumerate() {
            let x = i as f64 - centre;
            let v = self.background + self.amplitude * (-(x * x) / two_var).exp();
            *s = v.round().clamp(0.0, f64::from(SAMPLE_MAX)) as u16;
        }
        SensorFrame::new(samples)
    }
}

#[derive(Debug, Default)]
struct World {
    offset: Cell<f64>,
    enabled: Cell<bool>,
    last_command: Cell<(i16, i16)>,
    commands: Cell<u64>,
    frames: Cell<u64>,
    sensor_faults: Cell<u32>,
}

/// Build a track and the drive that steers along it.
pub fn sim_pair(params: TrackParams, max_speed: i16) -> (SimTrack, SimDrive) {
    let world = Rc::new(World::default());
    world.offset.set(params.initial_offset);
    (
        SimTrack {
            world: world.clone(),
            params,
        },
        SimDrive {
            world,
            params: Some(params),
            max_speed,
        },
    )
}

/// Simulated eight-channel line sensor.
pub struct SimTrack {
    world: Rc<World>,
    params: TrackParams,
}

impl SimTrack {
    pub fn offset(&self) -> f64 {
        self.world.offset.get()
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.world.offset.set(offset);
    }

    pub fn frames_served(&self) -> u64 {
        self.world.frames.get()
    }

    /// Make the next `n` acquisitions fail with a bus error.
    pub fn inject_faults(&mut self, n: u32) {
        self.world.sensor_faults.set(n);
    }

    pub fn params(&self) -> &TrackParams {
        &self.params
    }
}

impl LineSensor for SimTrack {
    fn acquire_frame(&mut self) -> Result<SensorFrame, Box<dyn Error + Send + Sync>> {
        let pending = self.world.sensor_faults.get();
        if pending > 0 {
            self.world.sensor_faults.set(pending - 1);
            return Err(Box::new(HwError::Spi("simulated transfer failure".into())));
        }
        self.world.frames.set(self.world.frames.get() + 1);
        Ok(self.params.render(self.world.offset.get()))
    }
}

/// Simulated H-bridge. Commands are clamped to `max_speed` and only move
/// the robot while the driver is enabled.
pub struct SimDrive {
    world: Rc<World>,
    params: Option<TrackParams>,
    max_speed: i16,
}

impl SimDrive {
    /// A drive not attached to any track; it only records commands.
    pub fn detached(max_speed: i16) -> Self {
        Self {
            world: Rc::new(World::default()),
            params: None,
            max_speed,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.world.enabled.get()
    }

    pub fn last_command(&self) -> (i16, i16) {
        self.world.last_command.get()
    }

    pub fn commands(&self) -> u64 {
        self.world.commands.get()
    }

    pub fn offset(&self) -> f64 {
        self.world.offset.get()
    }
}

impl DriveMotors for SimDrive {
    fn set_differential_speed(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let left = clamp_speed(left, self.max_speed);
        let right = clamp_speed(right, self.max_speed);
        self.world.last_command.set((left, right));
        self.world.commands.set(self.world.commands.get() + 1);
        if let (true, Some(p)) = (self.world.enabled.get(), self.params) {
            let turn = f64::from(left) - f64::from(right);
            let next = self.world.offset.get() + p.steer_gain * turn + p.curvature;
            self.world.offset.set(next);
        }
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.world.enabled.set(true);
        tracing::debug!("sim drive enabled");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.world.enabled.set(false);
        self.world.last_command.set((0, 0));
        tracing::debug!("sim drive disabled");
        Ok(())
    }
}

/// Replays recorded frames in order; fails once they run out.
pub struct FrameReplay {
    frames: VecDeque<SensorFrame>,
}

impl FrameReplay {
    pub fn new(frames: impl IntoIterator<Item = [u16; SENSOR_COUNT]>) -> Self {
        Self {
            frames: frames.into_iter().map(SensorFrame::from).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LineSensor for FrameReplay {
    fn acquire_frame(&mut self) -> Result<SensorFrame, Box<dyn Error + Send + Sync>> {
        self.frames.pop_front().ok_or_else(|| {
            Box::new(HwError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "replay exhausted",
            ))) as Box<dyn Error + Send + Sync>
        })
    }
}

/// Scripted push buttons. Clones share the same queue.
#[derive(Clone, Default)]
pub struct SimButtons {
    levels: Rc<RefCell<VecDeque<[bool; BUTTON_COUNT]>>>,
}

impl SimButtons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one sample with `id` held down followed by one released sample.
    pub fn press(&self, id: ButtonId) {
        let mut down = [false; BUTTON_COUNT];
        down[id.index()] = true;
        let mut q = self.levels.borrow_mut();
        q.push_back(down);
        q.push_back([false; BUTTON_COUNT]);
    }

    pub fn pending(&self) -> usize {
        self.levels.borrow().len()
    }
}

impl Buttons for SimButtons {
    fn read(&mut self) -> Result<[bool; BUTTON_COUNT], Box<dyn Error + Send + Sync>> {
        Ok(self
            .levels
            .borrow_mut()
            .pop_front()
            .unwrap_or([false; BUTTON_COUNT]))
    }
}

/// Queue of decoded remote codes. Clones share the same queue.
#[derive(Clone, Default)]
pub struct SimRemote {
    codes: Rc<RefCell<VecDeque<u8>>>,
}

impl SimRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, code: u8) {
        self.codes.borrow_mut().push_back(code);
    }

    pub fn pending(&self) -> usize {
        self.codes.borrow().len()
    }
}

impl RemoteReceiver for SimRemote {
    fn poll(&mut self) -> Option<u8> {
        self.codes.borrow_mut().pop_front()
    }
}
