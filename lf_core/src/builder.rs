//! Type-state builder for `ControlLoop`.
//!
//! `build()` only exists once both a `LineSensor` and a `DriveMotors` have
//! been supplied; the sensor and motor type parameters start out as `Missing`.

use std::sync::Arc;

use lf_traits::{Buttons, Clock, DriveMotors, LineSensor, MonotonicClock, RemoteReceiver};
use tracing::info;

use crate::config::{DriveCfg, EstimatorCfg, PidCfg, ScheduleCfg};
use crate::control::ControlLoop;
use crate::error::{BuildError, Result};
use crate::estimator::LineEstimator;
use crate::hw_error::map_hw_error;
use crate::input::{ButtonEdges, InputHandler, Keymap};
use crate::pid::{Gains, OutputLimits, Pid};
use crate::scheduler::PeriodicTask;
use crate::telemetry::{FaultCounters, LogFlags, Snapshot};

/// Placeholder for a collaborator that has not been provided yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct Missing;

pub struct LoopBuilder<S = Missing, M = Missing> {
    sensor: S,
    motors: M,
    buttons: Option<Box<dyn Buttons>>,
    remote: Option<Box<dyn RemoteReceiver>>,
    handler: Option<Box<dyn InputHandler>>,
    estimator: EstimatorCfg,
    pid: PidCfg,
    drive: DriveCfg,
    schedule: ScheduleCfg,
    log_flags: LogFlags,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for LoopBuilder {
    fn default() -> Self {
        Self {
            sensor: Missing,
            motors: Missing,
            buttons: None,
            remote: None,
            handler: None,
            estimator: EstimatorCfg::default(),
            pid: PidCfg::default(),
            drive: DriveCfg::default(),
            schedule: ScheduleCfg::default(),
            log_flags: LogFlags::default(),
            clock: None,
        }
    }
}

impl LoopBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Chainable setters that do not affect type-state.
impl<S, M> LoopBuilder<S, M> {
    pub fn with_estimator(mut self, cfg: EstimatorCfg) -> Self {
        self.estimator = cfg;
        self
    }
    pub fn with_pid(mut self, cfg: PidCfg) -> Self {
        self.pid = cfg;
        self
    }
    pub fn with_drive(mut self, cfg: DriveCfg) -> Self {
        self.drive = cfg;
        self
    }
    pub fn with_schedule(mut self, cfg: ScheduleCfg) -> Self {
        self.schedule = cfg;
        self
    }
    pub fn with_log_flags(mut self, flags: LogFlags) -> Self {
        self.log_flags = flags;
        self
    }
    pub fn with_buttons(mut self, buttons: impl Buttons + 'static) -> Self {
        self.buttons = Some(Box::new(buttons));
        self
    }
    pub fn with_remote(mut self, remote: impl RemoteReceiver + 'static) -> Self {
        self.remote = Some(Box::new(remote));
        self
    }
    /// Replace the default `Keymap` handler.
    pub fn with_input_handler(mut self, handler: impl InputHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<M> LoopBuilder<Missing, M> {
    pub fn with_sensor<S: LineSensor>(self, sensor: S) -> LoopBuilder<S, M> {
        LoopBuilder {
            sensor,
            motors: self.motors,
            buttons: self.buttons,
            remote: self.remote,
            handler: self.handler,
            estimator: self.estimator,
            pid: self.pid,
            drive: self.drive,
            schedule: self.schedule,
            log_flags: self.log_flags,
            clock: self.clock,
        }
    }
}

impl<S> LoopBuilder<S, Missing> {
    pub fn with_motors<M: DriveMotors>(self, motors: M) -> LoopBuilder<S, M> {
        LoopBuilder {
            sensor: self.sensor,
            motors,
            buttons: self.buttons,
            remote: self.remote,
            handler: self.handler,
            estimator: self.estimator,
            pid: self.pid,
            drive: self.drive,
            schedule: self.schedule,
            log_flags: self.log_flags,
            clock: self.clock,
        }
    }
}

fn validate(pid: &PidCfg, schedule: &ScheduleCfg) -> Result<Option<OutputLimits>> {
    if schedule.control_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "control_ms must be >= 1",
        )));
    }
    if schedule.housekeeping_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "housekeeping_ms must be >= 1",
        )));
    }
    if ![pid.kp, pid.ki, pid.kd].iter().all(|g| g.is_finite()) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "pid gains must be finite",
        )));
    }
    match pid.output_limits {
        None => Ok(None),
        Some((min, max)) => OutputLimits::new(min, max).map(Some).ok_or_else(|| {
            eyre::Report::new(BuildError::InvalidConfig(
                "pid output limits must be finite with min <= max",
            ))
        }),
    }
}

impl<S: LineSensor, M: DriveMotors> LoopBuilder<S, M> {
    /// Validate configuration and assemble the loop.
    ///
    /// With `start_enabled` the driver is enabled here, and a failure to do so
    /// is reported as `BuildError::DriveEnable`.
    pub fn build(self) -> Result<ControlLoop<S, M>> {
        let limits = validate(&self.pid, &self.schedule)?;

        let mut pid = Pid::new(Gains {
            kp: self.pid.kp,
            ki: self.pid.ki,
            kd: self.pid.kd,
        });
        if let Some(limits) = limits {
            pid.set_output_limits(limits);
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();
        let handler: Box<dyn InputHandler> = match self.handler {
            Some(h) => h,
            None => Box::new(Keymap::default()),
        };

        let mut ctl = ControlLoop {
            sensor: self.sensor,
            motors: self.motors,
            buttons: self.buttons,
            remote: self.remote,
            handler,
            edges: ButtonEdges::default(),
            clock,
            epoch,
            control_task: PeriodicTask::new(self.schedule.control_ms, 0),
            housekeeping_task: PeriodicTask::new(self.schedule.housekeeping_ms, 0),
            estimator: LineEstimator::new(self.estimator),
            pid,
            base_speed: self.drive.base_speed,
            drive_enabled: false,
            log_flags: self.log_flags,
            faults: FaultCounters::default(),
            last_fault: None,
            snapshot: Snapshot::default(),
        };

        if self.drive.start_enabled {
            ctl.motors
                .enable()
                .map_err(|e| eyre::Report::new(BuildError::DriveEnable(map_hw_error(&*e))))?;
            ctl.drive_enabled = true;
        }
        info!(
            control_ms = self.schedule.control_ms,
            housekeeping_ms = self.schedule.housekeeping_ms,
            base_speed = ctl.base_speed,
            drive_enabled = ctl.drive_enabled,
            "control loop ready"
        );
        Ok(ctl)
    }
}
