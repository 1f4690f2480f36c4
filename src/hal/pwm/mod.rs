mod builder;
pub use builder::Builder;

use super::ThrottleOutput;
use crate::clamp01;
use embedded_hal::PwmPin;
use num_traits::{Num, NumCast, ToPrimitive};

/// Maps a throttle limit onto the duty cycle range of a PWM pin.
pub struct PwmThrottle<T: PwmPin> {
    min: T::Duty,
    max: T::Duty,
    pin: T,
}

impl<T> PwmThrottle<T>
where
    T: PwmPin,
    T::Duty: Num + Clone,
{
    pub fn new(min: T::Duty, max: T::Duty, pin: T) -> Self {
        Self { min, max, pin }
    }

    pub fn builder() -> Builder<T::Duty>
    where
        T::Duty: Default,
    {
        Builder::default()
    }

    pub fn pin(&self) -> &T {
        &self.pin
    }

    pub fn enable(&mut self) {
        self.pin.enable();
    }

    /// Output a zero limit and disable the pin.
    pub fn disable(&mut self) {
        self.pin.set_duty(self.min.clone());
        self.pin.disable();
    }

    pub fn into_inner(self) -> T {
        self.pin
    }
}

impl<T> ThrottleOutput for PwmThrottle<T>
where
    T: PwmPin,
    T::Duty: Num + NumCast + ToPrimitive + Copy,
{
    fn output(&mut self, limit: f32) {
        let (min, max) = match (self.min.to_f32(), self.max.to_f32()) {
            (Some(min), Some(max)) => (min, max),
            _ => return,
        };

        let duty = clamp01(limit) * (max - min) + min;
        let duty = <T::Duty as NumCast>::from(duty.round()).unwrap_or(self.min);
        self.pin.set_duty(duty);
    }
}
