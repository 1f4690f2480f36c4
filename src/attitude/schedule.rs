//! Gain scheduling of the two PID stages.
//!
//! The regime is picked from the fraction of torque that responds instantly.
//! The curves themselves are empirical and live in [`AttitudeConfig`].

use super::pid::Gains;
use crate::{
    clamp_h, clamp_l,
    config::{AttitudeConfig, FastTuning, MixedTuning, SlowTuning},
    constrain_float,
};
use core::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Regime {
    /// Almost all torque is instant.
    Fast,
    /// Mostly instant torque, fast curves with softer attitude gains.
    MixedPlus,
    /// Significant lagging torque. The velocity stage does the work.
    Mixed,
    /// Nearly all torque lags behind the command.
    Slow,
}

impl Regime {
    pub fn select(instant_torque_ratio: f32, config: &AttitudeConfig) -> Self {
        let thresholds = &config.thresholds;
        if instant_torque_ratio > thresholds.fast {
            Regime::Fast
        } else if instant_torque_ratio > thresholds.mixed {
            Regime::MixedPlus
        } else if instant_torque_ratio >= thresholds.slow {
            Regime::Mixed
        } else {
            Regime::Slow
        }
    }
}

/// Everything the schedule needs to know about one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisState {
    /// Signed attitude error in radians.
    pub error: f32,
    /// Angular velocity, positive when it reduces a positive error.
    pub angular_velocity: f32,
    pub angular_momentum: f32,
    /// Largest angular acceleration available. Must be positive.
    pub max_aa: f32,
    pub instant_torque_ratio: f32,
    /// Response time of the lagging torque in seconds.
    pub lag: f32,
    /// Last input of the velocity stage.
    pub av_last_error: f32,
}

impl AxisState {
    /// Error normalized by a half turn.
    pub fn error_f(&self) -> f32 {
        (self.error / PI).abs()
    }
}

/// Gains for both stages.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tuning {
    pub at: Gains,
    pub av: Gains,
    /// The attitude integral has to be dropped.
    pub clear_at_integral: bool,
}

pub fn tune(regime: Regime, axis: &AxisState, config: &AttitudeConfig) -> Tuning {
    match regime {
        Regime::Fast => tune_fast(&config.fast, axis),
        Regime::MixedPlus => tune_fast(&config.mixed_plus, axis),
        Regime::Mixed => tune_mixed(&config.mixed, axis),
        Regime::Slow => tune_slow(&config.slow, axis),
    }
}

fn tune_fast(cfg: &FastTuning, axis: &AxisState) -> Tuning {
    let max_aa = axis.max_aa;
    let i_err_f = 1. - axis.error_f();
    let i_max_aa = 1. / max_aa;
    let momentum_f = clamp_h(i_err_f + axis.angular_momentum.abs(), 1.2);

    let at_p_i_err_f = clamp_l(i_err_f - cfg.at_p_err_threshold, 0.).powf(cfg.at_p_err_curve);
    let (at_p, at_d) = if max_aa >= 1. {
        (
            clamp_h(
                1. + cfg.at_p_high_aa_scale * max_aa.powf(cfg.at_p_high_aa_curve) + at_p_i_err_f,
                cfg.at_p_high_aa_max,
            ),
            cfg.at_d_high_aa_scale * i_max_aa.powf(cfg.at_d_high_aa_curve) * momentum_f,
        )
    } else {
        (
            1. + cfg.at_p_low_aa_scale * max_aa.powf(cfg.at_p_low_aa_curve) + at_p_i_err_f,
            cfg.at_d_low_aa_scale * i_max_aa.powf(cfg.at_d_low_aa_curve) * momentum_f,
        )
    };

    let at_i_i_err_f = clamp_l(i_err_f - cfg.at_i_err_threshold, 0.);
    let overshot = axis.angular_velocity * axis.error < 0.;
    let (at_i, clear_at_integral) = if at_i_i_err_f <= 0. || overshot {
        (0., true)
    } else {
        let f = at_i_i_err_f.powf(cfg.at_i_err_curve);
        let approach = clamp_l(axis.angular_velocity * axis.error.signum(), 0.);
        (
            cfg.at_i_scale * max_aa * f / (1. + approach * cfg.at_i_av_scale * f),
            false,
        )
    };

    let av_p = clamp_l(
        cfg.av_p_intersect - cfg.av_p_inclination * max_aa.powf(cfg.av_p_curve),
        cfg.av_p_min,
    );

    Tuning {
        at: Gains::new(at_p, at_i, at_d),
        av: Gains::new(av_p, cfg.av_i_scale * av_p, 0.),
        clear_at_integral,
    }
}

fn tune_mixed(cfg: &MixedTuning, axis: &AxisState) -> Tuning {
    let max_aa = axis.max_aa;
    let ratio = axis.instant_torque_ratio;
    let noise = constrain_float(
        (50. * (axis.angular_velocity.abs() + axis.error_f())).powf(0.6),
        0.001,
        1.,
    );

    let av_p = (cfg.av_p_a / (ratio.powf(cfg.av_p_d) + cfg.av_p_b) + cfg.av_p_c)
        / clamp_l(axis.angular_momentum.abs(), 1.)
        / max_aa
        * noise;
    let av_d = (cfg.av_d_a / (ratio.powf(cfg.av_d_d) + cfg.av_d_b) + cfg.av_d_c) / max_aa * noise;
    let av_i = cfg.av_i_scale * clamp_h(max_aa, 1.) * noise;

    Tuning {
        at: Gains::new(1., 0., 0.),
        av: Gains::new(av_p, av_i, av_d),
        clear_at_integral: true,
    }
}

fn tune_slow(cfg: &SlowTuning, axis: &AxisState) -> Tuning {
    let max_aa = axis.max_aa;
    let slow_f = 1. + cfg.slow_torque_factor * axis.lag.max(0.);
    let noise = constrain_float(
        (50. * (axis.av_last_error.abs() + axis.error_f())).abs().powf(0.5),
        0.01,
        1.,
    );

    let (av_p, av_d) = if max_aa >= 1. {
        (
            cfg.av_p_high_aa_scale / slow_f * noise,
            clamp_l(
                cfg.av_d_high_aa_intersect - cfg.av_d_high_aa_inclination * max_aa,
                cfg.av_d_high_aa_max,
            ) * noise,
        )
    } else {
        (
            cfg.av_p_low_aa_scale / slow_f * noise,
            (cfg.av_d_low_aa_intersect - cfg.av_d_low_aa_inclination * max_aa) * noise,
        )
    };

    Tuning {
        at: Gains::new(1., 0., 0.),
        av: Gains::new(av_p, cfg.av_i_scale * clamp_h(max_aa, 1.) * noise, av_d),
        clear_at_integral: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axis(error: f32, max_aa: f32) -> AxisState {
        AxisState {
            error,
            max_aa,
            instant_torque_ratio: 1.,
            ..Default::default()
        }
    }

    #[test]
    fn regime_thresholds() {
        let config = AttitudeConfig::default();
        assert_eq!(Regime::select(1., &config), Regime::Fast);
        assert_eq!(Regime::select(0.7, &config), Regime::MixedPlus);
        assert_eq!(Regime::select(0.31, &config), Regime::MixedPlus);
        assert_eq!(Regime::select(0.3, &config), Regime::Mixed);
        assert_eq!(Regime::select(0.005, &config), Regime::Mixed);
        assert_eq!(Regime::select(0.001, &config), Regime::Slow);
        assert_eq!(Regime::select(0., &config), Regime::Slow);
    }

    #[test]
    fn fast_high_authority_at_zero_error() {
        let config = AttitudeConfig::default();
        let tuning = tune(Regime::Fast, &axis(0., 4.), &config);

        // 1 + 0.2 * 4^0.3 + (1 - 0.7)^0.5
        let at_p = 1. + 0.2 * 4f32.powf(0.3) + 0.3f32.powf(0.5);
        assert_relative_eq!(tuning.at.p, at_p, epsilon = 1e-5);
        // 0.25^0.4 * clampH(1, 1.2)
        assert_relative_eq!(tuning.at.d, 0.25f32.powf(0.4), epsilon = 1e-5);
        // (1 - 0.8)^2 * 4
        assert_relative_eq!(tuning.at.i, 0.04 * 4., epsilon = 1e-5);
        assert!(!tuning.clear_at_integral);

        let av_p = 5. - 0.4 * 4f32.powf(0.8);
        assert_relative_eq!(tuning.av.p, av_p, epsilon = 1e-5);
        assert_relative_eq!(tuning.av.i, 0.4 * av_p, epsilon = 1e-5);
        assert_eq!(tuning.av.d, 0.);
    }

    #[test]
    fn fast_attitude_p_is_capped() {
        let config = AttitudeConfig::default();
        let tuning = tune(Regime::Fast, &axis(0., 1e6), &config);
        assert_eq!(tuning.at.p, 4.);
        assert_relative_eq!(tuning.av.p, 0.2);
    }

    #[test]
    fn large_error_or_overshoot_drops_integral() {
        let config = AttitudeConfig::default();

        let tuning = tune(Regime::Fast, &axis(1., 2.), &config);
        assert_eq!(tuning.at.i, 0.);
        assert!(tuning.clear_at_integral);

        let mut overshoot = axis(0.1, 2.);
        overshoot.angular_velocity = -0.5;
        let tuning = tune(Regime::Fast, &overshoot, &config);
        assert_eq!(tuning.at.i, 0.);
        assert!(tuning.clear_at_integral);
    }

    #[test]
    fn approach_speed_damps_attitude_integral() {
        let config = AttitudeConfig::default();
        let still = tune(Regime::Fast, &axis(0.1, 2.), &config);

        let mut approaching = axis(0.1, 2.);
        approaching.angular_velocity = 0.5;
        let damped = tune(Regime::Fast, &approaching, &config);

        // (1 - 0.1 / PI - 0.8)^2
        let f = (1. - 0.1 / PI - 0.8f32).powf(2.);
        assert_relative_eq!(still.at.i, 2. * f, max_relative = 1e-5);
        assert_relative_eq!(damped.at.i, still.at.i / (1. + 0.5 * 10. * f), max_relative = 1e-5);
        assert!(!damped.clear_at_integral);
        assert_eq!(damped.at.p, still.at.p);
    }

    #[test]
    fn mixed_plus_uses_its_own_attitude_curves() {
        let config = AttitudeConfig::default();
        let state = axis(0., 0.5);
        let mixed_plus = tune(Regime::MixedPlus, &state, &config);
        let fast = tune(Regime::Fast, &state, &config);

        // 1 + 0.2 * 0.5^1.2 + (1 - 0.8)^0.5
        let at_p = 1. + 0.2 * 0.5f32.powf(1.2) + 0.2f32.powf(0.5);
        assert_relative_eq!(mixed_plus.at.p, at_p, max_relative = 1e-5);
        // 1.2 * (1 / 0.5)^0.6
        assert_relative_eq!(mixed_plus.at.d, 1.2 * 2f32.powf(0.6), max_relative = 1e-5);
        assert!(mixed_plus.at.p < fast.at.p);
        assert_eq!(mixed_plus.av, fast.av);
    }

    #[test]
    fn mixed_defers_to_velocity_stage() {
        let config = AttitudeConfig::default();
        let mut state = axis(0.5, 2.);
        state.instant_torque_ratio = 0.1;

        let tuning = tune(Regime::Mixed, &state, &config);
        assert_eq!(tuning.at, Gains::new(1., 0., 0.));

        let av_p = (100. / (0.1f32.powf(0.7) + 0.04) - 100.) / 2.;
        let av_d = (0.65 / (0.1f32.powf(0.7) - 0.01) + 0.5) / 2.;
        assert_relative_eq!(tuning.av.p, av_p, max_relative = 1e-5);
        assert_relative_eq!(tuning.av.d, av_d, max_relative = 1e-5);
        assert_relative_eq!(tuning.av.i, 0.03, max_relative = 1e-5);
    }

    #[test]
    fn slow_gains_fall_with_lag() {
        let config = AttitudeConfig::default();
        let mut state = axis(0.5, 0.5);
        state.instant_torque_ratio = 0.;

        let quick = tune(Regime::Slow, &state, &config);
        state.lag = 5.;
        let lagging = tune(Regime::Slow, &state, &config);

        assert_relative_eq!(quick.av.p, 8.);
        assert_relative_eq!(lagging.av.p, 4.);
        assert_relative_eq!(quick.av.d, 20.);
        assert_relative_eq!(quick.av.i, 0.0025);
    }
}
