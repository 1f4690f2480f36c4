//! Hardware output of actuator limits.

use crate::actuator::Actuator;

pub mod pwm;
pub use pwm::{Builder, PwmThrottle};

/// Something that can apply a throttle limit in `[0, 1]`.
pub trait ThrottleOutput {
    fn output(&mut self, limit: f32);
}

impl<T> ThrottleOutput for &mut T
where
    T: ThrottleOutput + ?Sized,
{
    fn output(&mut self, limit: f32) {
        (**self).output(limit)
    }
}

/// Write the limit of every actuator to its output, pairing them by index.
pub fn apply_limits<O>(actuators: &[Actuator], outputs: &mut [O])
where
    O: ThrottleOutput,
{
    for (actuator, output) in actuators.iter().zip(outputs.iter_mut()) {
        output.output(actuator.limit);
    }
}
