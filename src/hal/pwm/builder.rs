use embedded_hal::PwmPin;

use super::PwmThrottle;

pub struct Builder<T> {
    min: T,
    max: Option<T>,
}

impl<T: Default> Default for Builder<T> {
    fn default() -> Self {
        Self {
            min: T::default(),
            max: None,
        }
    }
}

impl<T> Builder<T> {
    /// Duty cycle of a zero limit.
    pub fn min(mut self, min: T) -> Self {
        self.min = min;
        self
    }

    /// Duty cycle of a full limit. Defaults to the pin's maximum duty.
    pub fn max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }

    pub fn build<P>(self, pin: P) -> PwmThrottle<P>
    where
        P: PwmPin<Duty = T>,
    {
        let max = match self.max {
            Some(max) => max,
            None => pin.get_max_duty(),
        };
        PwmThrottle {
            min: self.min,
            max,
            pin,
        }
    }
}
