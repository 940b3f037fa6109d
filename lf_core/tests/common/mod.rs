#![allow(dead_code)]

use std::collections::VecDeque;
use std::error::Error;
use std::sync::Arc;

use lf_core::{ControlLoop, LoopBuilder, Missing};
use lf_traits::{BUTTON_COUNT, Buttons, DriveMotors, LineSensor, ManualClock, RemoteReceiver, SensorFrame};

pub const LEFT_HEAVY: [u16; 8] = [900, 900, 900, 900, 100, 100, 100, 100];
pub const CENTERED: [u16; 8] = [100, 100, 100, 800, 800, 100, 100, 100];

/// Plays back scripted frames or errors, then repeats the last good frame.
#[derive(Default)]
pub struct ScriptedSensor {
    script: VecDeque<Result<[u16; 8], &'static str>>,
    last: [u16; 8],
    pub reads: usize,
}

impl ScriptedSensor {
    pub fn steady(frame: [u16; 8]) -> Self {
        Self {
            last: frame,
            ..Self::default()
        }
    }

    pub fn then(mut self, step: Result<[u16; 8], &'static str>) -> Self {
        self.script.push_back(step);
        self
    }
}

impl LineSensor for ScriptedSensor {
    fn acquire_frame(&mut self) -> Result<SensorFrame, Box<dyn Error + Send + Sync>> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(Ok(f)) => {
                self.last = f;
                Ok(SensorFrame::new(f))
            }
            Some(Err(msg)) => Err(msg.into()),
            None => Ok(SensorFrame::new(self.last)),
        }
    }
}

#[derive(Default)]
pub struct RecordingMotors {
    pub commands: Vec<(i16, i16)>,
    pub enabled: bool,
    pub enable_calls: usize,
    pub fail_writes: bool,
    pub fail_enable: bool,
}

impl DriveMotors for RecordingMotors {
    fn set_differential_speed(
        &mut self,
        left: i16,
        right: i16,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.fail_writes {
            return Err("pwm write failed".into());
        }
        self.commands.push((left, right));
        Ok(())
    }
    fn enable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.enable_calls += 1;
        if self.fail_enable {
            return Err("enable pin busy".into());
        }
        self.enabled = true;
        Ok(())
    }
    fn disable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.enabled = false;
        Ok(())
    }
}

/// Returns scripted button levels, then all released.
#[derive(Default)]
pub struct ScriptedButtons {
    script: VecDeque<[bool; BUTTON_COUNT]>,
}

impl ScriptedButtons {
    pub fn new(levels: impl IntoIterator<Item = [bool; BUTTON_COUNT]>) -> Self {
        Self {
            script: levels.into_iter().collect(),
        }
    }
}

impl Buttons for ScriptedButtons {
    fn read(&mut self) -> Result<[bool; BUTTON_COUNT], Box<dyn Error + Send + Sync>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct QueuedRemote(pub VecDeque<u8>);

impl RemoteReceiver for QueuedRemote {
    fn poll(&mut self) -> Option<u8> {
        self.0.pop_front()
    }
}

/// Builder preloaded with a manual clock; the clock handle is returned so the
/// test can advance time.
pub fn builder_with_clock() -> (LoopBuilder<Missing, Missing>, ManualClock) {
    let clock = ManualClock::new();
    let b = LoopBuilder::new().with_clock(Arc::new(clock.clone()));
    (b, clock)
}

/// Advance the clock one millisecond at a time, polling after each step.
pub fn run_for<S: LineSensor, M: DriveMotors>(
    ctl: &mut ControlLoop<S, M>,
    clock: &ManualClock,
    ms: u64,
) {
    for _ in 0..ms {
        clock.advance_ms(1);
        ctl.poll();
    }
}
