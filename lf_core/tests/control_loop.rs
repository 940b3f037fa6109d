mod common;

use common::*;
use lf_core::{
    DriveAction, DriveCfg, EstimateSource, InputEvent, PidCfg, ScheduleCfg,
};
use lf_traits::ButtonId;

fn p_only() -> PidCfg {
    PidCfg {
        kp: 1.0,
        ki: 0.0,
        kd: 0.0,
        output_limits: Some((-255.0, 255.0)),
    }
}

#[test]
fn left_line_steers_right() {
    let (b, clock) = builder_with_clock();
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(LEFT_HEAVY))
        .with_motors(RecordingMotors::default())
        .with_pid(p_only())
        .with_drive(DriveCfg {
            base_speed: 20,
            start_enabled: true,
        })
        .build()
        .expect("build");

    clock.advance_ms(9);
    assert!(!ctl.poll().control);
    clock.advance_ms(1);
    let outcome = ctl.poll();
    assert!(outcome.control);
    assert_eq!(outcome.now_ms, 10);

    let snap = ctl.snapshot();
    assert_eq!(snap.cycle, 1);
    assert_eq!(snap.estimate.position, -72);
    assert_eq!(snap.estimate.source, EstimateSource::Centroid);
    assert_eq!(snap.output, -72.0);
    assert_eq!((snap.left, snap.right), (92, -52));
    assert_eq!(snap.frame.samples(), &LEFT_HEAVY);
    assert!(snap.fresh_frame);
    assert_eq!(ctl.motors().commands, vec![(92, -52)]);
}

#[test]
fn one_chain_per_due_tick() {
    let (b, clock) = builder_with_clock();
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(RecordingMotors::default())
        .build()
        .expect("build");

    run_for(&mut ctl, &clock, 1_000);
    assert_eq!(ctl.sensor().reads, 100);
    assert_eq!(ctl.motors().commands.len(), 100);
    assert_eq!(ctl.snapshot().cycle, 100);
    // Centred line: both wheels at base speed.
    assert!(ctl.motors().commands.iter().all(|c| *c == (20, 20)));
}

#[test]
fn stall_runs_a_single_cycle() {
    let (b, clock) = builder_with_clock();
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(RecordingMotors::default())
        .build()
        .expect("build");

    clock.advance_ms(10);
    ctl.poll();
    clock.advance_ms(250);
    let outcome = ctl.poll();
    assert!(outcome.control);
    assert!(!ctl.poll().control);
    assert_eq!(ctl.motors().commands.len(), 2);
    clock.advance_ms(10);
    assert!(ctl.poll().control);
}

#[test]
fn sensor_fault_holds_last_position_and_still_drives() {
    let (b, clock) = builder_with_clock();
    let sensor = ScriptedSensor::default()
        .then(Ok(LEFT_HEAVY))
        .then(Err("spi transfer failed"));
    let mut ctl = b
        .with_sensor(sensor)
        .with_motors(RecordingMotors::default())
        .with_pid(p_only())
        .build()
        .expect("build");

    run_for(&mut ctl, &clock, 20);
    let snap = ctl.snapshot();
    assert_eq!(snap.cycle, 2);
    assert_eq!(snap.estimate.source, EstimateSource::HeldNoFrame);
    assert_eq!(snap.estimate.position, -72);
    assert!(!snap.fresh_frame);
    assert_eq!(snap.frame.samples(), &LEFT_HEAVY);
    assert_eq!(snap.faults.sensor, 1);
    assert!(snap.last_fault.is_some());
    assert_eq!(ctl.motors().commands, vec![(92, -52), (92, -52)]);
}

#[test]
fn motor_fault_is_counted_not_raised() {
    let (b, clock) = builder_with_clock();
    let motors = RecordingMotors {
        fail_writes: true,
        ..RecordingMotors::default()
    };
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(motors)
        .build()
        .expect("build");

    run_for(&mut ctl, &clock, 30);
    assert_eq!(ctl.faults().motor, 3);
    assert_eq!(ctl.snapshot().cycle, 3);
}

#[test]
fn button_one_starts_and_button_two_stops() {
    let (b, clock) = builder_with_clock();
    let buttons = ScriptedButtons::new([
        [true, false, false],
        [true, false, false],
        [false, true, false],
    ]);
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(RecordingMotors::default())
        .with_buttons(buttons)
        .build()
        .expect("build");

    assert!(!ctl.drive_enabled());
    run_for(&mut ctl, &clock, 100);
    assert!(ctl.drive_enabled());
    assert!(ctl.motors().enabled);
    run_for(&mut ctl, &clock, 100);
    // Still held: no second edge, no second enable.
    assert_eq!(ctl.motors().enable_calls, 1);
    run_for(&mut ctl, &clock, 100);
    assert!(!ctl.drive_enabled());
    assert!(!ctl.motors().enabled);
}

#[test]
fn reenabling_resets_the_controller() {
    let (b, clock) = builder_with_clock();
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(LEFT_HEAVY))
        .with_motors(RecordingMotors::default())
        .build()
        .expect("build");

    run_for(&mut ctl, &clock, 10);
    assert_eq!(ctl.pid().prev_error(), -72.0);
    ctl.enable_drive();
    assert_eq!(ctl.pid().prev_error(), 0.0);
    // Already enabled: no second reset.
    run_for(&mut ctl, &clock, 10);
    ctl.enable_drive();
    assert_eq!(ctl.pid().prev_error(), -72.0);
}

#[test]
fn failed_enable_leaves_drive_disabled() {
    let (b, _clock) = builder_with_clock();
    let motors = RecordingMotors {
        fail_enable: true,
        ..RecordingMotors::default()
    };
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(motors)
        .build()
        .expect("build");
    ctl.enable_drive();
    assert!(!ctl.drive_enabled());
    assert_eq!(ctl.faults().motor, 1);
}

#[test]
fn remote_codes_are_handled_every_poll() {
    let (b, clock) = builder_with_clock();
    let remote = QueuedRemote([0x16].into());
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(RecordingMotors::default())
        .with_remote(remote)
        .build()
        .expect("build");

    clock.advance_ms(1);
    let outcome = ctl.poll();
    assert!(!outcome.control);
    assert_eq!(outcome.remote_codes, 1);
    assert_eq!(ctl.base_speed(), 25);
    assert!(ctl.drive_enabled());
}

#[test]
fn injected_closure_handler_sees_every_event() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let (b, clock) = builder_with_clock();
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(RecordingMotors::default())
        .with_buttons(ScriptedButtons::new([[false, false, true]]))
        .with_remote(QueuedRemote([0x01, 0x02].into()))
        .with_input_handler(move |ev: InputEvent| {
            sink.borrow_mut().push(ev);
            matches!(ev, InputEvent::Remote(0x02)).then_some(DriveAction::Go { base_speed: 40 })
        })
        .build()
        .expect("build");

    run_for(&mut ctl, &clock, 100);
    assert_eq!(
        *seen.borrow(),
        vec![
            InputEvent::Remote(0x01),
            InputEvent::Remote(0x02),
            InputEvent::Button(ButtonId::Three),
        ]
    );
    assert_eq!(ctl.base_speed(), 40);
    assert!(ctl.drive_enabled());
}

#[test]
fn custom_cadence_is_respected() {
    let (b, clock) = builder_with_clock();
    let mut ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(RecordingMotors::default())
        .with_schedule(ScheduleCfg {
            control_ms: 5,
            housekeeping_ms: 50,
        })
        .build()
        .expect("build");
    run_for(&mut ctl, &clock, 100);
    assert_eq!(ctl.snapshot().cycle, 20);
}

#[test]
fn into_parts_disables_the_drive() {
    let (b, _clock) = builder_with_clock();
    let ctl = b
        .with_sensor(ScriptedSensor::steady(CENTERED))
        .with_motors(RecordingMotors::default())
        .with_drive(DriveCfg {
            base_speed: 20,
            start_enabled: true,
        })
        .build()
        .expect("build");
    let (_sensor, motors) = ctl.into_parts();
    assert!(!motors.enabled);
}
