use std::time::{Duration, Instant};

/// Spin until `delay` has elapsed.
///
/// Sensor settle times are in the low hundreds of microseconds, well below
/// the scheduler granularity `thread::sleep` gives on a stock kernel.
pub fn busy_wait(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    let deadline = Instant::now() + delay;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// PWM duty cycle in `[0, 1]` for a signed wheel speed, given the speed
/// that maps to full duty.
pub fn duty_for(speed: i16, full_scale: i16) -> f64 {
    if full_scale <= 0 {
        return 0.0;
    }
    let mag = f64::from(speed.unsigned_abs()) / f64::from(full_scale);
    mag.min(1.0)
}

/// Clamp a wheel speed to `[-max, max]`.
pub fn clamp_speed(speed: i16, max: i16) -> i16 {
    let max = max.saturating_abs();
    speed.clamp(-max, max)
}
