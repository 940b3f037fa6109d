mod cli;
mod console;
mod error_fmt;
mod rt;
mod telemetry;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};
use eyre::{Result, WrapErr};
use lf_config::Config;
use lf_core::{ControlLoop, DriveCfg, InputEvent, Keymap, LoopBuilder, TuningCommand};
use lf_hardware::{FrameReplay, SimButtons, SimDrive, SimRemote, TrackParams, sim_pair};
use lf_traits::{Clock, DriveMotors, LineSensor, ManualClock, MonotonicClock};
use serde_json::json;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::console::{Console, ConsoleCommand, HELP};
use crate::error_fmt::{SelfCheckFailed, exit_code_for_error, format_error_json, humanize};
use crate::telemetry::TelemetryFormatter;

/// Simulated time the self-check runs the closed loop for.
const SELF_CHECK_MS: u64 = 3000;
/// Largest line offset (sensor pitches) the self-check accepts at the end.
const SELF_CHECK_TOLERANCE: f64 = 0.25;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            duration_ms,
            virtual_clock,
            start,
            no_console,
            rt: rt_mode,
            rt_prio,
            stats,
        } => {
            if rt_mode {
                rt::setup_rt_once(rt_prio);
            }
            let opts = RunOpts {
                duration_ms,
                virtual_clock,
                start,
                console: !no_console,
                stats,
                json: cli.json,
            };
            cmd_run(&cfg, &opts)
        }
        Commands::Replay { frames } => cmd_replay(&cfg, &frames, cli.json),
        Commands::SelfCheck => cmd_self_check(&cfg, cli.json),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = lf_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing(json: bool, level: &str, logging: &lf_config::Logging) {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries telemetry; diagnostics always go to stderr.
    let console_layer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_layer = logging.file.as_deref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "linefollow.log".to_string());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = logging
            .level
            .as_deref()
            .and_then(|l| EnvFilter::try_new(l).ok())
            .unwrap_or_else(|| EnvFilter::new("info"));
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(file_filter)
    });

    let _ = tracing_subscriber::registry()
        .with(console_layer.with_filter(filter))
        .with(file_layer)
        .try_init();
}

fn track_params(sim: &lf_config::SimCfg) -> TrackParams {
    TrackParams {
        background: sim.background,
        amplitude: sim.amplitude,
        sigma: sim.sigma,
        initial_offset: sim.initial_offset,
        steer_gain: sim.steer_gain,
        curvature: sim.curvature,
    }
}

/// Builder with every file-driven setting applied.
fn configured_builder(
    cfg: &Config,
    drive: DriveCfg,
    clock: Arc<dyn Clock + Send + Sync>,
) -> LoopBuilder {
    LoopBuilder::new()
        .with_estimator((&cfg.sensor).into())
        .with_pid((&cfg.pid).into())
        .with_drive(drive)
        .with_schedule((&cfg.schedule).into())
        .with_log_flags((&cfg.telemetry).into())
        .with_input_handler(Keymap::from(cfg.remote.as_slice()))
        .with_clock(clock)
}

struct RunOpts {
    duration_ms: Option<u64>,
    virtual_clock: bool,
    start: bool,
    console: bool,
    stats: bool,
    json: bool,
}

fn cmd_run(cfg: &Config, opts: &RunOpts) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let console_rx = if opts.console {
        let (tx, rx) = crossbeam_channel::unbounded();
        console::spawn_stdin_reader(tx).wrap_err("spawn console reader")?;
        Some(rx)
    } else {
        None
    };

    let virtual_clock = opts.virtual_clock.then(ManualClock::new);
    let clock: Arc<dyn Clock + Send + Sync> = match &virtual_clock {
        Some(c) => Arc::new(c.clone()),
        None => Arc::new(MonotonicClock::new()),
    };
    let mut drive: DriveCfg = (&cfg.drive).into();
    drive.start_enabled |= opts.start;
    let builder = configured_builder(cfg, drive, clock);

    let env = LoopEnv {
        cfg,
        opts,
        virtual_clock: virtual_clock.as_ref(),
        shutdown: &shutdown,
    };

    #[cfg(feature = "hardware")]
    if let Some(pins) = &cfg.pins {
        let hw = hardware::open(cfg, pins)?;
        let mut b = builder.with_sensor(hw.sensor).with_motors(hw.motors);
        if let Some(buttons) = hw.buttons {
            b = b.with_buttons(buttons);
        }
        let mut ctl = b.build()?;
        tracing::info!(backend = "hardware", "run start");
        let stats = run_loop(&mut ctl, &env, console_rx, None);
        finish_run(ctl, &env, &stats, None);
        return Ok(());
    }

    let (track, motors) = sim_pair(track_params(&cfg.sim), cfg.drive.max_speed);
    let inputs = SimInputs::default();
    let mut ctl = builder
        .with_sensor(track)
        .with_motors(motors)
        .with_buttons(inputs.buttons.clone())
        .with_remote(inputs.remote.clone())
        .build()?;
    tracing::info!(backend = "sim", virtual_clock = opts.virtual_clock, "run start");
    let stats = run_loop(&mut ctl, &env, console_rx, Some(&inputs));
    let offset = ctl.sensor().offset();
    finish_run(ctl, &env, &stats, Some(offset));
    Ok(())
}

struct LoopEnv<'a> {
    cfg: &'a Config,
    opts: &'a RunOpts,
    virtual_clock: Option<&'a ManualClock>,
    shutdown: &'a AtomicBool,
}

/// Simulated button and remote queues fed by console `button` and `ir`.
#[derive(Clone, Default)]
struct SimInputs {
    buttons: SimButtons,
    remote: SimRemote,
}

impl SimInputs {
    /// Samples and codes the loop has not read yet.
    fn pending(&self) -> usize {
        self.buttons.pending() + self.remote.pending()
    }
}

#[derive(Default)]
struct LoopStats {
    latencies_us: Vec<u64>,
    overruns: usize,
}

/// Poll the loop until shutdown, the duration elapses, or the console closes.
///
/// After console EOF the loop keeps polling until queued simulated input has
/// been read, so the last commands take effect.
fn run_loop<S: LineSensor, M: DriveMotors>(
    ctl: &mut ControlLoop<S, M>,
    env: &LoopEnv<'_>,
    mut console_rx: Option<Receiver<String>>,
    sim_inputs: Option<&SimInputs>,
) -> LoopStats {
    let console = Console::new(env.cfg.drive.max_speed);
    let mut fmt = TelemetryFormatter::new(env.opts.json, env.cfg.telemetry.pid_throttle_ms);
    let idle_sleep = Duration::from_micros(env.cfg.schedule.idle_sleep_us);
    let period_us = env.cfg.schedule.control_ms.saturating_mul(1000);
    let mut stats = LoopStats::default();
    let mut console_closed = false;

    loop {
        if env.shutdown.load(Ordering::Relaxed) {
            tracing::info!("interrupted");
            break;
        }
        if env.opts.duration_ms.is_some_and(|d| ctl.now_ms() > d) {
            break;
        }

        if let Some(rx) = &console_rx {
            let mut closed = false;
            loop {
                match rx.try_recv() {
                    Ok(line) => {
                        handle_console_line(ctl, &console, &line, sim_inputs, env.opts.json);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
            if closed {
                console_rx = None;
                console_closed = true;
            }
        }
        if console_closed
            && env.opts.duration_ms.is_none()
            && sim_inputs.is_none_or(|i| i.pending() == 0)
        {
            tracing::info!("console closed");
            break;
        }

        let t_start = Instant::now();
        let outcome = ctl.poll();
        if outcome.control {
            if env.opts.stats {
                let us = u64::try_from(t_start.elapsed().as_micros()).unwrap_or(u64::MAX);
                if us > period_us {
                    stats.overruns += 1;
                }
                stats.latencies_us.push(us);
            }
            let gains = ctl.pid().gains();
            for line in fmt.cycle_lines(ctl.snapshot(), ctl.log_flags(), gains) {
                println!("{line}");
            }
        }

        match env.virtual_clock {
            Some(clock) => clock.advance_ms(1),
            None if outcome.idle() => std::thread::sleep(idle_sleep),
            None => {}
        }
    }
    stats
}

fn handle_console_line<S: LineSensor, M: DriveMotors>(
    ctl: &mut ControlLoop<S, M>,
    console: &Console,
    line: &str,
    sim_inputs: Option<&SimInputs>,
    json: bool,
) {
    let text = match console.parse(line) {
        Ok(None) => return,
        Ok(Some(ConsoleCommand::Help)) => HELP.to_string(),
        Ok(Some(ConsoleCommand::Press(id))) => {
            match sim_inputs {
                Some(inputs) => inputs.buttons.press(id),
                None => ctl.dispatch(InputEvent::Button(id)),
            }
            return;
        }
        Ok(Some(ConsoleCommand::Tune(cmd))) => {
            // The simulated receiver delivers the code on the next poll.
            if let (TuningCommand::InjectRemote(code), Some(inputs)) = (cmd, sim_inputs) {
                inputs.remote.push(code);
                return;
            }
            match ctl.apply(cmd) {
                Some(reply) => console::format_reply(&reply),
                None => return,
            }
        }
        Err(e) => {
            tracing::debug!(line, error = %e, "console input rejected");
            if json {
                println!("{}", json!({ "console_error": e.to_string() }));
            } else {
                println!("{e}");
            }
            return;
        }
    };
    if json {
        println!("{}", json!({ "console": text }));
    } else {
        println!("{text}");
    }
}

fn finish_run<S: LineSensor, M: DriveMotors>(
    ctl: ControlLoop<S, M>,
    env: &LoopEnv<'_>,
    stats: &LoopStats,
    sim_offset: Option<f64>,
) {
    let snap = ctl.snapshot().clone();
    let t_ms = ctl.now_ms();
    let faults = ctl.faults();
    let drive_on = ctl.drive_enabled();
    let _ = ctl.into_parts();
    tracing::info!(cycles = snap.cycle, t_ms, faults = faults.total(), "run stop");

    if env.opts.stats && !stats.latencies_us.is_empty() {
        print_stats(stats, env.cfg.schedule.control_ms);
    }

    if env.opts.json {
        let mut obj = json!({
            "event": "complete",
            "cycles": snap.cycle,
            "t_ms": t_ms,
            "line": snap.estimate.position,
            "faults": { "sensor": faults.sensor, "motor": faults.motor, "input": faults.input },
            "drive_enabled": drive_on,
        });
        if let Some(off) = sim_offset {
            obj["sim_offset"] = json!(off);
        }
        println!("{obj}");
    } else {
        let mut line = format!(
            "run complete: cycles={} t_ms={} line={} faults={}",
            snap.cycle,
            t_ms,
            snap.estimate.position,
            faults.total()
        );
        if let Some(off) = sim_offset {
            line.push_str(&format!(" sim_offset={off:.3}"));
        }
        line.push_str(if drive_on { " drive=on" } else { " drive=off" });
        println!("{line}");
    }
}

/// Print latency/overrun stats to stderr.
fn print_stats(stats: &LoopStats, control_ms: u64) {
    let l = &stats.latencies_us;
    let min = l.iter().min().copied().unwrap_or(0);
    let max = l.iter().max().copied().unwrap_or(0);
    let avg = l.iter().sum::<u64>() as f64 / l.len() as f64;
    let stdev = if l.len() > 1 {
        let var = l.iter().map(|&x| (x as f64 - avg).powi(2)).sum::<f64>() / (l.len() as f64 - 1.0);
        var.sqrt()
    } else {
        0.0
    };
    eprintln!("\n--- Control Loop Stats ---");
    eprintln!("Cycles: {}", l.len());
    eprintln!("Period (ms): {control_ms}");
    eprintln!("Cycle time min/avg/max/stdev (us): {min} / {avg:.1} / {max} / {stdev:.1}");
    eprintln!("Overruns (> period): {}", stats.overruns);
    eprintln!("--------------------------\n");
}

fn cmd_replay(cfg: &Config, path: &Path, json: bool) -> Result<()> {
    let frames = lf_config::load_frames_csv(path)?;
    let count = frames.len();
    let clock = ManualClock::new();
    let mut drive: DriveCfg = (&cfg.drive).into();
    drive.start_enabled = false;

    let mut ctl = configured_builder(cfg, drive, Arc::new(clock.clone()))
        .with_sensor(FrameReplay::new(frames))
        .with_motors(SimDrive::detached(cfg.drive.max_speed))
        .build()?;

    for idx in 0..count {
        clock.advance_ms(cfg.schedule.control_ms);
        if !ctl.poll().control {
            continue;
        }
        let s = ctl.snapshot();
        let out = lf_core::util::correction_from_output(s.output);
        if json {
            println!(
                "{}",
                json!({
                    "frame": idx,
                    "samples": s.frame.samples(),
                    "position": s.estimate.position,
                    "source": s.estimate.source.as_str(),
                    "output": out,
                    "left": s.left,
                    "right": s.right,
                })
            );
        } else {
            println!(
                "{idx}: line={} ({}) output={out} left={} right={}",
                s.estimate.position,
                s.estimate.source.as_str(),
                s.left,
                s.right
            );
        }
    }
    tracing::info!(frames = count, "replay complete");
    Ok(())
}

fn cmd_self_check(cfg: &Config, json: bool) -> Result<()> {
    #[cfg(feature = "hardware")]
    if let Some(pins) = &cfg.pins {
        hardware::probe(cfg, pins)?;
    }

    let clock = ManualClock::new();
    let mut drive: DriveCfg = (&cfg.drive).into();
    drive.start_enabled = true;
    let (track, motors) = sim_pair(track_params(&cfg.sim), cfg.drive.max_speed);
    let mut ctl = configured_builder(cfg, drive, Arc::new(clock.clone()))
        .with_sensor(track)
        .with_motors(motors)
        .build()?;

    let start_offset = ctl.sensor().offset();
    for _ in 0..SELF_CHECK_MS {
        clock.advance_ms(1);
        ctl.poll();
    }
    let offset = ctl.sensor().offset();
    let faults = ctl.faults().total();
    let cycles = ctl.snapshot().cycle;
    let _ = ctl.into_parts();

    if faults > 0 {
        return Err(SelfCheckFailed(format!("{faults} collaborator faults in simulation")).into());
    }
    if !(offset.abs() <= SELF_CHECK_TOLERANCE) {
        return Err(SelfCheckFailed(format!(
            "line offset {offset:.3} after {SELF_CHECK_MS} ms (tolerance {SELF_CHECK_TOLERANCE})"
        ))
        .into());
    }

    if json {
        println!(
            "{}",
            json!({
                "event": "self_check",
                "ok": true,
                "cycles": cycles,
                "start_offset": start_offset,
                "final_offset": offset,
            })
        );
    } else {
        println!(
            "self-check ok: {cycles} cycles, sim offset {start_offset:.3} -> {offset:.3}"
        );
    }
    Ok(())
}

#[cfg(feature = "hardware")]
mod hardware {
    use std::time::Duration;

    use eyre::{Result, WrapErr};
    use lf_config::{Config, Pins};
    use lf_core::hw_error::map_hw_error;
    use lf_hardware::{GpioButtons, HBridge, HBridgePins, HwError, Mcp3008Array};
    use lf_traits::LineSensor;

    pub struct Hardware {
        pub sensor: Mcp3008Array,
        pub motors: HBridge,
        pub buttons: Option<GpioButtons>,
    }

    fn typed(e: HwError) -> eyre::Report {
        eyre::Report::new(map_hw_error(&e))
    }

    fn open_sensor(cfg: &Config, pins: &Pins) -> Result<Mcp3008Array> {
        Mcp3008Array::new(
            pins.spi_bus,
            pins.spi_cs,
            pins.spi_clock_hz,
            pins.sensor_enable,
            Duration::from_micros(cfg.sensor.settle_us),
        )
        .map_err(typed)
        .wrap_err("open sensor array")
    }

    pub fn open(cfg: &Config, pins: &Pins) -> Result<Hardware> {
        let sensor = open_sensor(cfg, pins)?;
        let motors = HBridge::new(
            HBridgePins {
                enable: pins.motor_enable,
                left_forward: pins.left_forward,
                left_reverse: pins.left_reverse,
                right_forward: pins.right_forward,
                right_reverse: pins.right_reverse,
            },
            cfg.drive.max_speed,
            pins.pwm_hz,
        )
        .map_err(typed)
        .wrap_err("open motor pins")?;
        let buttons = match pins.buttons {
            Some(b) => Some(
                GpioButtons::new(b)
                    .map_err(typed)
                    .wrap_err("open button pins")?,
            ),
            None => None,
        };
        Ok(Hardware {
            sensor,
            motors,
            buttons,
        })
    }

    /// Read one frame from the real sensor array.
    pub fn probe(cfg: &Config, pins: &Pins) -> Result<()> {
        let mut sensor = open_sensor(cfg, pins)?;
        let frame = sensor
            .acquire_frame()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("read sensor frame")?;
        tracing::info!(samples = ?frame.samples(), "sensor array responded");
        Ok(())
    }
}
