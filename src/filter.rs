use num_traits::{Float, Zero};

/// First order low pass filter.
///
/// The output moves towards each new sample by `alpha = dt / (dt + tau)`.
#[derive(Clone, Copy, Debug)]
pub struct LowPassFilter<T> {
    output: T,
}

impl<T: Zero> Default for LowPassFilter<T> {
    fn default() -> Self {
        Self { output: T::zero() }
    }
}

impl<T> LowPassFilter<T>
where
    T: Float,
{
    pub fn output(&self) -> T {
        self.output
    }

    /// Filter `sample` with a time constant of `tau` seconds.
    /// A non-finite sample leaves the output untouched.
    pub fn apply_with_tau(&mut self, sample: T, tau: T, dt: T) -> T {
        if !sample.is_finite() {
            return self.output;
        }
        self.output = self.output + (sample - self.output) * alpha_from_tau(dt, tau);
        self.output
    }

    pub fn reset(&mut self, value: T) {
        self.output = value;
    }
}

/// Smoothing factor for a time constant in seconds.
pub fn alpha_from_tau<T: Float>(dt: T, tau: T) -> T {
    if tau <= T::zero() || dt <= T::zero() {
        return T::one();
    }
    (dt / (dt + tau)).min(T::one()).max(T::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_tau_passes_through() {
        let mut filter = LowPassFilter::default();
        assert_relative_eq!(filter.apply_with_tau(0.7f32, 0., 0.02), 0.7);
    }

    #[test]
    fn converges_to_constant_input() {
        let mut filter = LowPassFilter::default();
        let dt = 0.02f32;
        for _ in 0..500 {
            filter.apply_with_tau(1., 3. * dt, dt);
        }
        assert_relative_eq!(filter.output(), 1., epsilon = 1e-4);
    }

    #[test]
    fn first_step_uses_alpha() {
        let mut filter = LowPassFilter::default();
        // alpha = 0.02 / (0.02 + 0.06) = 0.25
        assert_relative_eq!(filter.apply_with_tau(1f32, 0.06, 0.02), 0.25);
    }

    #[test]
    fn ignores_nan() {
        let mut filter = LowPassFilter::default();
        filter.reset(0.5f32);
        assert_relative_eq!(filter.apply_with_tau(f32::NAN, 0.1, 0.02), 0.5);
    }
}
