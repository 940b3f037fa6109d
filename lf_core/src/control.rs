//! The control loop orchestrator (`ControlLoop`).
//!
//! One `poll` reads the clock once and evaluates both periodic tasks against
//! that instant. A due control tick runs exactly one acquire, estimate,
//! compute, actuate chain; a due housekeeping tick samples the buttons. Remote
//! codes are drained on every poll. Nothing in here returns an error:
//! collaborator faults are logged, counted, and the cycle carries on with the
//! last known position.

use std::sync::Arc;
use std::time::Instant;

use lf_traits::{Buttons, Clock, DriveMotors, LineSensor, RemoteReceiver};
use tracing::{info, trace, warn};

use crate::error::ControlError;
use crate::estimator::LineEstimator;
use crate::hw_error::map_hw_error;
use crate::input::{ButtonEdges, DriveAction, InputEvent, InputHandler};
use crate::pid::Pid;
use crate::scheduler::PeriodicTask;
use crate::telemetry::{FaultCounters, LogFlags, Snapshot};
use crate::tuning::{Gain, TuningCommand, TuningReply};
use crate::util::{correction_from_output, differential};

/// Which tasks ran during one `poll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub now_ms: u64,
    pub control: bool,
    pub housekeeping: bool,
    /// Remote codes received during this poll.
    pub remote_codes: u32,
}

impl PollOutcome {
    pub fn idle(&self) -> bool {
        !self.control && !self.housekeeping && self.remote_codes == 0
    }
}

pub struct ControlLoop<S: LineSensor, M: DriveMotors> {
    pub(crate) sensor: S,
    pub(crate) motors: M,
    pub(crate) buttons: Option<Box<dyn Buttons>>,
    pub(crate) remote: Option<Box<dyn RemoteReceiver>>,
    pub(crate) handler: Box<dyn InputHandler>,
    pub(crate) edges: ButtonEdges,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) control_task: PeriodicTask,
    pub(crate) housekeeping_task: PeriodicTask,
    pub(crate) estimator: LineEstimator,
    pub(crate) pid: Pid,
    pub(crate) base_speed: i16,
    pub(crate) drive_enabled: bool,
    pub(crate) log_flags: LogFlags,
    pub(crate) faults: FaultCounters,
    pub(crate) last_fault: Option<ControlError>,
    pub(crate) snapshot: Snapshot,
}

impl<S: LineSensor, M: DriveMotors> core::fmt::Debug for ControlLoop<S, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("base_speed", &self.base_speed)
            .field("drive_enabled", &self.drive_enabled)
            .field("gains", &self.pid.gains())
            .field("cycle", &self.snapshot.cycle)
            .finish_non_exhaustive()
    }
}

impl<S: LineSensor, M: DriveMotors> ControlLoop<S, M> {
    /// Milliseconds since the loop was built, per its clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Read the clock once and run whatever is due.
    pub fn poll(&mut self) -> PollOutcome {
        let now_ms = self.now_ms();
        self.poll_at(now_ms)
    }

    /// Run whatever is due at `now_ms`.
    ///
    /// `now_ms` must not go backwards between calls.
    pub fn poll_at(&mut self, now_ms: u64) -> PollOutcome {
        let mut outcome = PollOutcome {
            now_ms,
            ..PollOutcome::default()
        };
        outcome.remote_codes = self.drain_remote();
        if self.control_task.is_due(now_ms) {
            self.control_cycle(now_ms);
            outcome.control = true;
        }
        if self.housekeeping_task.is_due(now_ms) {
            self.housekeeping();
            outcome.housekeeping = true;
        }
        outcome
    }

    fn control_cycle(&mut self, now_ms: u64) {
        let frame = match self.sensor.acquire_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                let err = map_hw_error(&*e);
                warn!(error = %err, "sensor acquisition failed; holding last position");
                self.faults.sensor += 1;
                self.last_fault = Some(err);
                None
            }
        };
        let estimate = match &frame {
            Some(f) => self.estimator.estimate(f),
            None => self.estimator.hold(),
        };

        let output = self.pid.compute(f64::from(estimate.position));
        let (left, right) = differential(self.base_speed, correction_from_output(output));
        if let Err(e) = self.motors.set_differential_speed(left, right) {
            let err = map_hw_error(&*e);
            warn!(error = %err, left, right, "motor command failed");
            self.faults.motor += 1;
            self.last_fault = Some(err);
        }

        let cycle = self.snapshot.cycle + 1;
        trace!(
            cycle,
            position = estimate.position,
            source = estimate.source.as_str(),
            output,
            left,
            right,
            "control cycle"
        );
        self.snapshot = Snapshot {
            cycle,
            at_ms: now_ms,
            frame: frame.unwrap_or(self.snapshot.frame),
            fresh_frame: frame.is_some(),
            estimate,
            output,
            left,
            right,
            drive_enabled: self.drive_enabled,
            faults: self.faults,
            last_fault: self.last_fault.clone(),
        };
    }

    fn housekeeping(&mut self) {
        let Some(buttons) = self.buttons.as_mut() else {
            return;
        };
        let levels = match buttons.read() {
            Ok(levels) => levels,
            Err(e) => {
                let err = map_hw_error(&*e);
                warn!(error = %err, "button read failed");
                self.faults.input += 1;
                self.last_fault = Some(err);
                return;
            }
        };
        for id in self.edges.update(levels) {
            self.dispatch(InputEvent::Button(id));
        }
    }

    fn drain_remote(&mut self) -> u32 {
        let mut n = 0;
        while let Some(code) = self.remote.as_mut().and_then(|r| r.poll()) {
            n += 1;
            self.dispatch(InputEvent::Remote(code));
        }
        n
    }

    /// Hand an input event to the handler and apply its action.
    pub fn dispatch(&mut self, event: InputEvent) {
        let action = self.handler.handle(event);
        trace!(?event, ?action, "input event");
        if let Some(action) = action {
            self.apply_action(action);
        }
    }

    pub fn apply_action(&mut self, action: DriveAction) {
        match action {
            DriveAction::Start => self.enable_drive(),
            DriveAction::Stop => self.disable_drive(),
            DriveAction::Go { base_speed } => {
                self.set_base_speed(base_speed);
                self.enable_drive();
            }
        }
    }

    /// Enable the motor driver. Coming out of a disabled state resets the PID.
    pub fn enable_drive(&mut self) {
        if self.drive_enabled {
            return;
        }
        match self.motors.enable() {
            Ok(()) => {
                self.pid.reset();
                self.drive_enabled = true;
                info!(base_speed = self.base_speed, "drive enabled");
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                warn!(error = %err, "drive enable failed");
                self.faults.motor += 1;
                self.last_fault = Some(err);
            }
        }
    }

    pub fn disable_drive(&mut self) {
        match self.motors.disable() {
            Ok(()) => {
                if self.drive_enabled {
                    info!("drive disabled");
                }
                self.drive_enabled = false;
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                warn!(error = %err, "drive disable failed");
                self.faults.motor += 1;
                self.last_fault = Some(err);
            }
        }
    }

    /// Apply a live tuning command and report the resulting state.
    pub fn apply(&mut self, cmd: TuningCommand) -> Option<TuningReply> {
        match cmd {
            TuningCommand::GetGain(g) => Some(TuningReply::Gain(g, self.gain(g))),
            TuningCommand::SetGain(g, v) => {
                match g {
                    Gain::P => self.pid.set_kp(v),
                    Gain::I => self.pid.set_ki(v),
                    Gain::D => self.pid.set_kd(v),
                }
                info!(gain = %g.letter(), value = v, "gain updated");
                Some(TuningReply::Gain(g, self.gain(g)))
            }
            TuningCommand::GetBaseSpeed => Some(TuningReply::BaseSpeed(self.base_speed)),
            TuningCommand::SetBaseSpeed(v) => {
                self.set_base_speed(v);
                Some(TuningReply::BaseSpeed(self.base_speed))
            }
            TuningCommand::StartDrive => {
                self.enable_drive();
                Some(TuningReply::Drive {
                    enabled: self.drive_enabled,
                })
            }
            TuningCommand::StopDrive => {
                self.disable_drive();
                Some(TuningReply::Drive {
                    enabled: self.drive_enabled,
                })
            }
            TuningCommand::SetLog(ch, on) => {
                self.log_flags.set(ch, on);
                Some(TuningReply::Log(ch, on))
            }
            TuningCommand::InjectRemote(code) => {
                self.dispatch(InputEvent::Remote(code));
                None
            }
        }
    }

    fn gain(&self, g: Gain) -> f64 {
        match g {
            Gain::P => self.pid.kp(),
            Gain::I => self.pid.ki(),
            Gain::D => self.pid.kd(),
        }
    }

    pub fn base_speed(&self) -> i16 {
        self.base_speed
    }

    pub fn set_base_speed(&mut self, base_speed: i16) {
        if base_speed != self.base_speed {
            info!(from = self.base_speed, to = base_speed, "base speed changed");
        }
        self.base_speed = base_speed;
    }

    pub fn drive_enabled(&self) -> bool {
        self.drive_enabled
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn estimator(&self) -> &LineEstimator {
        &self.estimator
    }

    pub fn log_flags(&self) -> &LogFlags {
        &self.log_flags
    }

    /// State of the last completed control cycle.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn faults(&self) -> FaultCounters {
        self.faults
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }

    /// Disable the drive and hand the collaborators back.
    pub fn into_parts(mut self) -> (S, M) {
        self.disable_drive();
        (self.sensor, self.motors)
    }
}
