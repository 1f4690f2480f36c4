use crate::{config::AuthorityConfig, safe_sqrt};
use tracing::info;

/// Counts down while a condition keeps holding.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Timer {
    pub period: f32,
    remaining: Option<f32>,
}

impl Timer {
    pub fn new(period: f32) -> Self {
        Self {
            period,
            remaining: None,
        }
    }

    /// Advance by `dt`, starting the timer if it is not running.
    /// Returns `true` once the period has elapsed, which also stops the timer.
    pub fn tick(&mut self, dt: f32) -> bool {
        let remaining = self.remaining.get_or_insert(self.period);
        *remaining -= dt.max(0.);
        if *remaining <= 0. {
            self.remaining = None;
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn reset(&mut self) {
        self.remaining = None;
    }
}

/// Time to turn by `angle` with a bang-bang profile at `max_aa`.
/// Infinite when there is no angular acceleration available.
pub fn min_rotation_time(angle: f32, max_aa: f32) -> f32 {
    if max_aa <= 0. {
        return f32::INFINITY;
    }
    2. * safe_sqrt(angle.abs() / max_aa)
}

/// Whether the vehicle is currently able to hold the commanded attitude.
#[derive(Clone, Debug)]
pub struct ControlAuthority {
    pub config: AuthorityConfig,
    has_authority: bool,
    last_error: Option<f32>,
    error_rate: f32,
    timer: Timer,
}

impl ControlAuthority {
    pub fn new(config: AuthorityConfig) -> Self {
        let timer = Timer::new(config.cooldown);
        Self {
            config,
            has_authority: true,
            last_error: None,
            error_rate: 0.,
            timer,
        }
    }

    pub fn has_authority(&self) -> bool {
        self.has_authority
    }

    /// Rate of change of the attitude error in degrees per second.
    pub fn error_rate(&self) -> f32 {
        self.error_rate
    }

    /// Stop a pending transition and forget the error history. The flag itself is kept.
    pub fn reset(&mut self) {
        self.timer.reset();
        self.last_error = None;
        self.error_rate = 0.;
    }

    /// Update with the attitude error in degrees.
    ///
    /// `turn_time` is the projected time to remove the error and `time_to_deadline`
    /// how long the vehicle may take before it has to be pointing there.
    pub fn update(&mut self, error: f32, turn_time: f32, time_to_deadline: f32, dt: f32) -> bool {
        if !error.is_finite() {
            return self.has_authority;
        }
        self.error_rate = match self.last_error {
            Some(last_error) if dt > 0. => (error - last_error) / dt,
            _ => 0.,
        };
        self.last_error = Some(error);

        let config = &self.config;
        let late = turn_time > time_to_deadline;
        if self.has_authority {
            let losing = error > config.max_attitude_error && (self.error_rate >= 0. || late);
            if !losing {
                self.timer.reset();
            } else if self.timer.tick(dt) {
                self.has_authority = false;
                info!(error, error_rate = self.error_rate, "lost control authority");
            }
        } else {
            let regaining = error < config.attitude_error_threshold
                || (error < config.converging_error_threshold && self.error_rate < 0. && !late);
            if !regaining {
                self.timer.reset();
            } else if self.timer.tick(dt) {
                self.has_authority = true;
                info!(error, "regained control authority");
            }
        }
        self.has_authority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.1;

    fn run(authority: &mut ControlAuthority, error: f32, ticks: usize) -> Vec<bool> {
        (0..ticks)
            .map(|_| authority.update(error, 0., f32::INFINITY, DT))
            .collect()
    }

    /// Index of the first `false` → `true` or `true` → `false` change.
    fn first_change(trace: &[bool], from: bool) -> Option<usize> {
        trace.iter().position(|&flag| flag != from)
    }

    #[test]
    fn hysteresis_trace() {
        let mut authority = ControlAuthority::new(AuthorityConfig::default());
        assert!(run(&mut authority, 2., 5).iter().all(|&flag| flag));

        // Above the max error and not shrinking: lost after the cooldown
        let rising = run(&mut authority, 20., 15);
        let lost_at = first_change(&rising, true).unwrap();
        assert!(lost_at as f32 * DT >= 0.9);
        assert!(rising[lost_at..].iter().all(|&flag| !flag));

        let holding = run(&mut authority, 20., 20);
        assert!(holding.iter().all(|&flag| !flag));

        // Back below the threshold: regained after the cooldown
        let falling = run(&mut authority, 1., 15);
        let regained_at = first_change(&falling, false).unwrap();
        assert!(regained_at as f32 * DT >= 0.9);
        assert!(falling[regained_at..].iter().all(|&flag| flag));
    }

    #[test]
    fn short_spikes_do_not_flap() {
        let mut authority = ControlAuthority::new(AuthorityConfig::default());
        for _ in 0..10 {
            run(&mut authority, 20., 5);
            run(&mut authority, 2., 5);
        }
        assert!(authority.has_authority());
    }

    #[test]
    fn shrinking_error_keeps_authority() {
        let mut authority = ControlAuthority::new(AuthorityConfig::default());
        let mut error = 40.;
        for _ in 0..30 {
            assert!(authority.update(error, 0.5, 10., DT));
            error -= 1.;
        }
    }

    #[test]
    fn late_turn_loses_authority_even_when_converging() {
        let mut authority = ControlAuthority::new(AuthorityConfig::default());
        let mut error = 40.;
        for _ in 0..30 {
            authority.update(error, 5., 1., DT);
            error -= 0.5;
        }
        assert!(!authority.has_authority());
    }

    #[test]
    fn converging_error_regains_authority() {
        let mut authority = ControlAuthority::new(AuthorityConfig::default());
        run(&mut authority, 20., 20);
        assert!(!authority.has_authority());

        // Between the threshold and the converging threshold, shrinking in time
        let mut error = 5.9;
        for _ in 0..15 {
            authority.update(error, 0.5, 10., DT);
            error -= 0.1;
        }
        assert!(authority.has_authority());
    }

    #[test]
    fn reset_stops_pending_transition() {
        let mut authority = ControlAuthority::new(AuthorityConfig::default());
        run(&mut authority, 20., 9);
        authority.reset();
        run(&mut authority, 20., 9);
        assert!(authority.has_authority());
    }

    #[test]
    fn timer_runs_until_period_elapses() {
        let mut timer = Timer::new(0.25);
        assert!(!timer.is_running());

        assert!(!timer.tick(0.1));
        assert!(timer.is_running());
        assert!(!timer.tick(0.1));
        assert!(timer.tick(0.1));
        assert!(!timer.is_running());

        timer.tick(0.1);
        timer.reset();
        assert!(!timer.is_running());
    }

    #[test]
    fn rotation_time() {
        assert_eq!(min_rotation_time(1., 0.), f32::INFINITY);
        assert_eq!(min_rotation_time(4., 1.), 4.);
    }
}
