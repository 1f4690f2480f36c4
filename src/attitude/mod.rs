//! Cascaded attitude control.
//!
//! Each axis runs two PID stages. The attitude stage turns the attitude error into
//! an angular velocity setpoint and the velocity stage turns the velocity error into
//! a normalized torque demand in `[-1, 1]`, smoothed by a low pass filter.
//! Gains are rescheduled every tick from the available angular acceleration and the
//! fraction of torque that responds without lag.

use crate::{
    clamp01,
    config::{AttitudeConfig, AuthorityConfig},
    filter::LowPassFilter,
    finite_or_zero,
    torque,
};
use core::f32::consts::PI;
use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

mod authority;
pub use authority::{min_rotation_time, ControlAuthority, Timer};

mod pid;
pub use pid::{Gains, Info, Pid};

mod schedule;
pub use schedule::{AxisState, Regime, Tuning};

/// Vehicle state for one tick, expressed in the control frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleState {
    pub angular_velocity: Vector3<f32>,
    pub moment_of_inertia: Vector3<f32>,
    /// Largest angular acceleration available on each axis.
    pub max_angular_acceleration: Vector3<f32>,
    /// Fraction of the torque authority that responds without lag, in `[0, 1]`.
    pub instant_torque_ratio: f32,
    /// Response time of the lagging torque on each axis, in seconds.
    pub response_lag: Vector3<f32>,
    /// Time left before the vehicle has to point at the target, in seconds.
    pub time_to_deadline: Option<f32>,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            angular_velocity: Vector3::zeros(),
            moment_of_inertia: Vector3::new(1., 1., 1.),
            max_angular_acceleration: Vector3::zeros(),
            instant_torque_ratio: 1.,
            response_lag: Vector3::zeros(),
            time_to_deadline: None,
        }
    }
}

impl VehicleState {
    pub fn angular_momentum(&self) -> Vector3<f32> {
        self.angular_velocity.component_mul(&self.moment_of_inertia)
    }
}

#[derive(Clone, Debug)]
struct AxisController {
    at_pid: Pid,
    av_pid: Pid,
    filter: LowPassFilter<f32>,
}

impl Default for AxisController {
    fn default() -> Self {
        Self {
            at_pid: Pid::new(Gains::default(), 0., 10. * PI),
            av_pid: Pid::new(Gains::default(), -1., 1.),
            filter: LowPassFilter::default(),
        }
    }
}

impl AxisController {
    fn reset(&mut self) {
        self.at_pid.reset();
        self.av_pid.reset();
        self.filter.reset(0.);
    }

    fn update(&mut self, tuning: &Tuning, axis: &AxisState, tau: f32, dt: f32) -> f32 {
        self.at_pid.gains = tuning.at;
        self.av_pid.gains = tuning.av;
        if tuning.clear_at_integral {
            self.at_pid.clear_integral();
        }

        let error = axis.error;
        let av = axis.angular_velocity;
        let sign = if error < 0. { -1. } else { 1. };

        self.at_pid.update_with_speed(error.abs(), -av * sign, dt);
        let av_error = self.at_pid.action().abs() * sign - av;
        self.av_pid.update(av_error, dt);

        let output = self
            .filter
            .apply_with_tau(self.av_pid.action().clamp(-1., 1.), tau, dt);
        self.av_pid.set_action(output);
        self.av_pid.action()
    }
}

/// Two stage PID attitude controller with a control authority flag.
///
/// ```
/// use nalgebra::{UnitQuaternion, Vector3};
/// use thrust_control::{AttitudeConfig, AttitudeController, AuthorityConfig, VehicleState};
///
/// let mut controller = AttitudeController::new(AttitudeConfig::default(), AuthorityConfig::default());
/// let state = VehicleState {
///     max_angular_acceleration: Vector3::new(2., 2., 2.),
///     ..Default::default()
/// };
///
/// let error = UnitQuaternion::from_euler_angles(0.3, 0., 0.);
/// let steering = controller.update_steering(error, &state, 0.02);
/// assert!(steering.x > 0.);
/// ```
#[derive(Clone, Debug)]
pub struct AttitudeController {
    pub config: AttitudeConfig,
    axes: [AxisController; 3],
    regime: Option<Regime>,
    authority: ControlAuthority,
    rotation_axis: Vector3<f32>,
    steering: Vector3<f32>,
    enabled: bool,
    reference_frame: u32,
}

impl AttitudeController {
    pub fn new(config: AttitudeConfig, authority: AuthorityConfig) -> Self {
        Self {
            config,
            axes: Default::default(),
            regime: None,
            authority: ControlAuthority::new(authority),
            rotation_axis: Vector3::zeros(),
            steering: Vector3::zeros(),
            enabled: true,
            reference_frame: 0,
        }
    }

    pub fn has_control_authority(&self) -> bool {
        self.authority.has_authority()
    }

    pub fn authority(&self) -> &ControlAuthority {
        &self.authority
    }

    /// Regime used by the last update.
    pub fn regime(&self) -> Option<Regime> {
        self.regime
    }

    /// Unit axis of the last attitude error, zero when there was none.
    pub fn rotation_axis(&self) -> Vector3<f32> {
        self.rotation_axis
    }

    /// Last torque demand.
    pub fn steering(&self) -> Vector3<f32> {
        self.steering
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Attitude and velocity stage of `axis` (0 = x, 1 = y, 2 = z).
    pub fn pids(&self, axis: usize) -> Option<(&Pid, &Pid)> {
        self.axes.get(axis).map(|axis| (&axis.at_pid, &axis.av_pid))
    }

    /// Clear every integrator, filter and timer.
    pub fn reset(&mut self) {
        for axis in &mut self.axes {
            axis.reset();
        }
        self.authority.reset();
        self.rotation_axis = Vector3::zeros();
        self.steering = Vector3::zeros();
        self.regime = None;
    }

    /// Enable or disable the controller. Any change resets it.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.enabled = enabled;
            self.reset();
        }
    }

    /// Switch the frame the attitude error is expressed in. Any change resets the controller.
    pub fn set_reference_frame(&mut self, frame: u32) {
        if frame != self.reference_frame {
            debug!(from = self.reference_frame, to = frame, "reference frame changed");
            self.reference_frame = frame;
            self.reset();
        }
    }

    /// Compute the normalized torque demand for `attitude_error`, the rotation that
    /// takes the current attitude to the target attitude.
    ///
    /// A disabled controller demands no torque. Axes without angular acceleration
    /// produce zero.
    pub fn update_steering(
        &mut self,
        attitude_error: UnitQuaternion<f32>,
        state: &VehicleState,
        dt: f32,
    ) -> Vector3<f32> {
        if !self.enabled {
            self.steering = Vector3::zeros();
            return self.steering;
        }

        let error = attitude_error.scaled_axis().map(finite_or_zero);
        let angle = error.norm();
        self.rotation_axis = error
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros);

        let angular_velocity = self.corrected_angular_velocity(state.angular_velocity, angle);
        let angular_momentum = state.angular_momentum();

        let regime = Regime::select(state.instant_torque_ratio, &self.config);
        if self.regime != Some(regime) {
            debug!(?regime, ratio = state.instant_torque_ratio, "attitude regime");
            self.regime = Some(regime);
        }

        let tau = self.config.output_filter.ticks * dt;
        let mut steering = Vector3::zeros();
        for (i, axis) in self.axes.iter_mut().enumerate() {
            let max_aa = state.max_angular_acceleration[i];
            if !(max_aa > 0.) || !max_aa.is_finite() {
                continue;
            }

            let axis_state = AxisState {
                error: error[i],
                angular_velocity: angular_velocity[i],
                angular_momentum: angular_momentum[i],
                max_aa,
                instant_torque_ratio: state.instant_torque_ratio,
                lag: state.response_lag[i],
                av_last_error: axis.av_pid.last_error(),
            };
            let tuning = schedule::tune(regime, &axis_state, &self.config);
            steering[i] = finite_or_zero(axis.update(&tuning, &axis_state, tau, dt));
        }
        self.steering = steering;

        let max_aa = state
            .max_angular_acceleration
            .map(|aa| aa.max(0.))
            .dot(&self.rotation_axis.abs());
        self.authority.update(
            angle.to_degrees(),
            min_rotation_time(angle, max_aa),
            state.time_to_deadline.unwrap_or(f32::INFINITY),
            dt,
        );

        self.steering
    }

    /// Blend the angular velocity towards its projection on the rotation axis so the
    /// axes do not fight each other while turning around an oblique axis.
    fn corrected_angular_velocity(&self, angular_velocity: Vector3<f32>, angle: f32) -> Vector3<f32> {
        let av_sqr = angular_velocity.norm_squared();
        if torque::is_zero(&self.rotation_axis) || av_sqr <= 0. {
            return angular_velocity;
        }
        let correction = &self.config.axis_correction;
        let projection = torque::project(&angular_velocity, &self.rotation_axis);
        let weight = (projection.norm_squared() / av_sqr).min(correction.max_weight)
            * clamp01(angle / PI * correction.error_scale);
        angular_velocity * (1. - weight) + projection * weight
    }
}
