//! Discrete PID controller with anti-windup and optional output clamping.
//!
//! The derivative is a plain difference of consecutive errors, not divided by
//! elapsed time: `compute` must be called at a constant cadence. The control
//! loop only calls it from its fixed-interval task.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 5.0,
        }
    }
}

/// Closed output range. Construct through `new` so `min <= max` holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputLimits {
    min: f64,
    max: f64,
}

impl OutputLimits {
    /// `None` when either bound is not finite or `min > max`.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min <= max).then_some(Self { min, max })
    }

    /// `[-magnitude, magnitude]`.
    pub fn symmetric(magnitude: f64) -> Option<Self> {
        Self::new(-magnitude.abs(), magnitude.abs())
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pid {
    gains: Gains,
    integral: f64,
    prev_error: f64,
    limits: Option<OutputLimits>,
}

impl Pid {
    pub fn new(gains: Gains) -> Self {
        Self {
            gains,
            ..Self::default()
        }
    }

    pub fn with_limits(mut self, limits: OutputLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn compute(&mut self, error: f64) -> f64 {
        let Gains { kp, ki, kd } = self.gains;
        let derivative = (error - self.prev_error) * kd;

        if ki != 0.0 {
            self.integral += error;
            if let Some(lim) = self.limits {
                let provisional = kp * error + derivative;
                let unclamped = provisional + ki * self.integral;
                // Sign of this call's contribution to the output.
                let push = ki * error;
                let winds_up_high =
                    push > 0.0 && (provisional >= lim.max || unclamped > lim.max);
                let winds_up_low = push < 0.0 && (provisional <= lim.min || unclamped < lim.min);
                if winds_up_high || winds_up_low {
                    self.integral -= error;
                }
            }
        }

        let mut output = kp * error + ki * self.integral + derivative;
        if let Some(lim) = self.limits {
            output = output.clamp(lim.min, lim.max);
        }
        self.prev_error = error;
        output
    }

    /// Zero the accumulator and the remembered error; gains and limits stay.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: Gains) {
        self.gains = gains;
    }

    pub fn kp(&self) -> f64 {
        self.gains.kp
    }

    pub fn ki(&self) -> f64 {
        self.gains.ki
    }

    pub fn kd(&self) -> f64 {
        self.gains.kd
    }

    pub fn set_kp(&mut self, kp: f64) {
        self.gains.kp = kp;
    }

    pub fn set_ki(&mut self, ki: f64) {
        self.gains.ki = ki;
    }

    pub fn set_kd(&mut self, kd: f64) {
        self.gains.kd = kd;
    }

    pub fn limits(&self) -> Option<OutputLimits> {
        self.limits
    }

    pub fn set_output_limits(&mut self, limits: OutputLimits) {
        self.limits = Some(limits);
    }

    pub fn clear_output_limits(&mut self) {
        self.limits = None;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }
}
