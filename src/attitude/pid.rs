use crate::{constrain_float, finite_or_zero};

/// Terms of the last update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Info {
    pub error: f32,
    pub p: f32,
    pub i: f32,
    pub d: f32,
    /// The raw output was outside `[min, max]`.
    pub limit: bool,
}

/// Gains of one PID stage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl Gains {
    pub fn new(p: f32, i: f32, d: f32) -> Self {
        Self { p, i, d }
    }
}

/// Scalar PID controller with a clamped output.
#[derive(Clone, Debug)]
pub struct Pid {
    pub gains: Gains,
    pub min: f32,
    pub max: f32,
    pub info: Info,
    integral: f32,
    last_error: f32,
    action: f32,
}

impl Pid {
    pub fn new(gains: Gains, min: f32, max: f32) -> Self {
        Self {
            gains,
            min,
            max,
            info: Info::default(),
            integral: 0.,
            last_error: 0.,
            action: 0.,
        }
    }

    pub fn action(&self) -> f32 {
        self.action
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn last_error(&self) -> f32 {
        self.last_error
    }

    /// Override the output, e.g. after filtering it.
    pub fn set_action(&mut self, action: f32) {
        self.action = finite_or_zero(action);
    }

    pub fn clear_integral(&mut self) {
        self.integral = 0.;
    }

    /// Forget everything accumulated so far.
    pub fn reset(&mut self) {
        self.integral = 0.;
        self.last_error = 0.;
        self.action = 0.;
        self.info = Info::default();
    }

    /// Update with the derivative taken from successive errors.
    ///
    /// While the output is saturated the integral keeps its previous value.
    pub fn update(&mut self, error: f32, dt: f32) -> f32 {
        if !error.is_finite() {
            return self.action;
        }
        if self.last_error == 0. {
            self.last_error = error;
        }

        let derivative = if dt > 0. {
            (error - self.last_error) / dt
        } else {
            0.
        };
        let integral_last = self.integral;
        self.integral += error * dt.max(0.);

        let p = self.gains.p * error;
        let i = self.gains.i * self.integral;
        let d = self.gains.d * derivative;
        let output = p + i + d;

        self.action = finite_or_zero(constrain_float(output, self.min, self.max));
        let limit = output != self.action;
        if limit {
            self.integral = integral_last;
        }

        self.info = Info {
            error,
            p,
            i,
            d,
            limit,
        };
        self.last_error = error;
        self.action
    }

    /// Update with a measured rate of change of the error.
    ///
    /// The integral decays instead of growing while the derivative term is large,
    /// and is always kept inside `[min, max]`.
    pub fn update_with_speed(&mut self, error: f32, speed: f32, dt: f32) -> f32 {
        if !error.is_finite() {
            return self.action;
        }
        if self.last_error == 0. {
            self.last_error = error;
        }

        let d = finite_or_zero(self.gains.d * speed);
        let integral = if d.abs() < 0.6 * self.max {
            self.integral + error * self.gains.i * dt.max(0.)
        } else {
            0.9 * self.integral
        };
        self.integral = finite_or_zero(constrain_float(integral, self.min, self.max));

        let p = error * self.gains.p;
        let output = p + self.integral + d;
        if !output.is_nan() {
            self.action = constrain_float(output, self.min, self.max);
        }

        self.info = Info {
            error,
            p,
            i: self.integral,
            d,
            limit: output != self.action,
        };
        self.last_error = error;
        self.action
    }
}
