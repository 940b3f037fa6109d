mod common;

use common::*;
use lf_core::error::BuildError;
use lf_core::{DriveCfg, LoopBuilder, PidCfg, ScheduleCfg};
use rstest::rstest;

#[rstest]
#[case(ScheduleCfg { control_ms: 0, housekeeping_ms: 100 }, "control_ms must be >= 1")]
#[case(ScheduleCfg { control_ms: 10, housekeeping_ms: 0 }, "housekeeping_ms must be >= 1")]
fn zero_cadence_is_rejected(#[case] schedule: ScheduleCfg, #[case] msg: &str) {
    let err = LoopBuilder::new()
        .with_sensor(ScriptedSensor::default())
        .with_motors(RecordingMotors::default())
        .with_schedule(schedule)
        .build()
        .expect_err("should fail");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(m)) => assert!(m.contains(msg), "got: {m}"),
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
#[case(PidCfg { kp: f64::NAN, ..PidCfg::default() })]
#[case(PidCfg { kd: f64::INFINITY, ..PidCfg::default() })]
#[case(PidCfg { output_limits: Some((10.0, -10.0)), ..PidCfg::default() })]
#[case(PidCfg { output_limits: Some((f64::NEG_INFINITY, 10.0)), ..PidCfg::default() })]
fn bad_pid_settings_are_rejected(#[case] pid: PidCfg) {
    let err = LoopBuilder::new()
        .with_sensor(ScriptedSensor::default())
        .with_motors(RecordingMotors::default())
        .with_pid(pid)
        .build()
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn start_enabled_propagates_enable_failure() {
    let motors = RecordingMotors {
        fail_enable: true,
        ..RecordingMotors::default()
    };
    let err = LoopBuilder::new()
        .with_sensor(ScriptedSensor::default())
        .with_motors(motors)
        .with_drive(DriveCfg {
            base_speed: 20,
            start_enabled: true,
        })
        .build()
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::DriveEnable(_))
    ));
}

#[test]
fn setters_work_in_any_order() {
    // Motors first, then sensor.
    let ctl = LoopBuilder::new()
        .with_drive(DriveCfg {
            base_speed: -15,
            start_enabled: false,
        })
        .with_motors(RecordingMotors::default())
        .with_sensor(ScriptedSensor::default())
        .build()
        .expect("build");
    assert_eq!(ctl.base_speed(), -15);
    assert!(!ctl.drive_enabled());
    assert_eq!(ctl.pid().kd(), 5.0);
}
