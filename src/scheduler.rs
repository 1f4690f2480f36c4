use crate::error::Error;
use embedded_time::{duration::Microseconds, Clock};
use tracing::warn;

/// Runs a control tick at a fixed rate.
///
/// Call [`Scheduler::run`] as often as possible. The tick closure only runs once a full
/// loop period has passed and gets the measured time step in seconds. A tick that takes
/// longer than the loop period is counted as an overrun; nothing else changes, so the
/// state of the controllers simply carries over.
pub struct Scheduler<C> {
    clock: C,
    loop_rate_hz: u32,
    loop_period_us: u32,
    last_tick_us: Option<u32>,
    ticks: u32,
    overruns: u32,
    last_dt: f32,
}

impl<C> Scheduler<C>
where
    C: Clock<T = u32>,
{
    pub fn new(clock: C, loop_rate_hz: u32) -> Self {
        let loop_rate_hz = loop_rate_hz.max(1);
        Self {
            clock,
            loop_rate_hz,
            loop_period_us: 1_000_000 / loop_rate_hz,
            last_tick_us: None,
            ticks: 0,
            overruns: 0,
            last_dt: 0.,
        }
    }

    pub fn loop_rate_hz(&self) -> u32 {
        self.loop_rate_hz
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Number of ticks that took longer than the loop period.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Time step in seconds passed to the last tick.
    pub fn last_dt(&self) -> f32 {
        self.last_dt
    }

    /// Run `tick` if it is due. Returns whether it ran.
    pub fn run<F, E>(&mut self, mut tick: F) -> Result<bool, E>
    where
        F: FnMut(f32) -> Result<(), E>,
        E: From<Error>,
    {
        let sample_time_us = self.micros_since_epoch()?.0;

        let dt = match self.last_tick_us {
            // The first tick runs right away with the nominal period
            None => 1. / self.loop_rate_hz as f32,
            Some(last_tick_us) => {
                let elapsed_us = sample_time_us.wrapping_sub(last_tick_us);
                if elapsed_us < self.loop_period_us {
                    return Ok(false);
                }
                elapsed_us as f32 * 1.0e-6
            }
        };

        self.last_tick_us = Some(sample_time_us);
        self.last_dt = dt;
        tick(dt)?;
        self.ticks = self.ticks.wrapping_add(1);

        let tick_us = self.micros_since_epoch()?.0.wrapping_sub(sample_time_us);
        if tick_us > self.loop_period_us {
            self.overruns = self.overruns.wrapping_add(1);
            warn!(
                tick_us,
                loop_period_us = self.loop_period_us,
                "control tick overran its period"
            );
        }
        Ok(true)
    }

    fn micros_since_epoch(&mut self) -> Result<Microseconds<u32>, Error> {
        let instant = self.clock.try_now()?;
        Microseconds::try_from(instant.duration_since_epoch()).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use embedded_time::{clock, fraction::Fraction, Instant};
    use std::{cell::Cell, rc::Rc};

    #[derive(Clone, Default)]
    struct MockClock {
        now_us: Rc<Cell<u32>>,
    }

    impl MockClock {
        fn advance(&self, us: u32) {
            self.now_us.set(self.now_us.get() + us);
        }
    }

    impl Clock for MockClock {
        type T = u32;

        const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

        fn try_now(&self) -> Result<Instant<Self>, clock::Error> {
            Ok(Instant::new(self.now_us.get()))
        }
    }

    #[test]
    fn runs_at_loop_rate() {
        let clock = MockClock::default();
        let mut scheduler = Scheduler::new(clock.clone(), 50);
        let mut dts = Vec::new();

        for _ in 0..100 {
            scheduler
                .run(|dt| {
                    dts.push(dt);
                    Ok::<_, Error>(())
                })
                .unwrap();
            clock.advance(5_000);
        }

        // 500 ms at 50 Hz
        assert_eq!(scheduler.ticks(), 25);
        assert_eq!(dts.len(), 25);
        assert_relative_eq!(dts[0], 0.02);
        for dt in &dts[1..] {
            assert_relative_eq!(*dt, 0.02, epsilon = 1e-6);
        }
        assert_eq!(scheduler.overruns(), 0);
    }

    #[test]
    fn counts_overruns() {
        let clock = MockClock::default();
        let mut scheduler = Scheduler::new(clock.clone(), 100);

        let slow_clock = clock.clone();
        let ran = scheduler
            .run(|_| {
                slow_clock.advance(15_000);
                Ok::<_, Error>(())
            })
            .unwrap();
        assert!(ran);
        assert_eq!(scheduler.overruns(), 1);

        // The next tick sees the late start as a longer time step
        let ran = scheduler.run(|_| Ok::<_, Error>(())).unwrap();
        assert!(ran);
        assert_relative_eq!(scheduler.last_dt(), 0.015, epsilon = 1e-6);
        assert_eq!(scheduler.overruns(), 1);
    }

    #[test]
    fn tick_errors_are_returned() {
        #[derive(Debug, PartialEq)]
        enum TickError {
            Failed,
            Scheduler,
        }

        impl From<Error> for TickError {
            fn from(_: Error) -> Self {
                TickError::Scheduler
            }
        }

        let mut scheduler = Scheduler::new(MockClock::default(), 50);
        let result = scheduler.run(|_| Err(TickError::Failed));
        assert_eq!(result, Err(TickError::Failed));
    }
}
