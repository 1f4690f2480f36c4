use super::{Allocation, ControlAllocator};
use crate::{
    actuator::{Actuator, Role},
    torque::{self, TorqueEnvelope, TorqueSnapshot},
};
use nalgebra::Vector3;
use tracing::warn;

/// Outcome of [`ControlAllocator::steer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AllocationStatus {
    /// Torque the group was asked to produce.
    pub demand: Vector3<f32>,
    /// Result of the last optimization run.
    pub allocation: Allocation,
    /// The demand could not be met and the group was rebalanced to zero torque instead.
    pub unoptimized: bool,
    /// Thrust is commanded but the limits had to be cut below the usable minimum.
    pub thrust_disabled: bool,
}

impl Default for AllocationStatus {
    fn default() -> Self {
        Self {
            demand: Vector3::zeros(),
            allocation: Allocation::default(),
            unoptimized: false,
            thrust_disabled: false,
        }
    }
}

impl AllocationStatus {
    pub fn max_limit(&self) -> f32 {
        self.allocation.max_limit
    }
}

impl ControlAllocator {
    /// Turn a normalized steering vector into a torque demand for `actuators`.
    /// Steering inside the configured dead zone produces no torque.
    pub fn demand(
        &self,
        actuators: &[Actuator],
        steering: Vector3<f32>,
        envelope: &TorqueEnvelope,
    ) -> Vector3<f32> {
        if steering.norm_squared() < self.config.steering_dead_zone {
            return Vector3::zeros();
        }
        demand_from_steering(actuators, steering, envelope)
    }

    /// Optimize for `demand`, falling back to a zero torque balance on failure.
    pub fn steer(
        &mut self,
        actuators: &mut [Actuator],
        demand: Vector3<f32>,
        snapshot: &TorqueSnapshot,
    ) -> AllocationStatus {
        let mut status = AllocationStatus {
            demand,
            ..Default::default()
        };
        if actuators.is_empty() {
            return status;
        }

        status.allocation = self.optimize(actuators, demand, snapshot);
        if !status.allocation.success && !torque::is_zero(&demand) {
            warn!(?demand, "unable to meet torque demand, balancing to zero torque");
            for actuator in actuators.iter_mut() {
                actuator.init_limits();
            }
            status.allocation = self.optimize(actuators, Vector3::zeros(), snapshot);
            status.unoptimized = true;
        }

        if thrust_disabled(actuators, status.allocation.max_limit, self.config.min_limit) {
            warn!(
                max_limit = status.allocation.max_limit,
                "thrust disabled, actuators cannot be balanced"
            );
            status.thrust_disabled = true;
        }
        status
    }
}

/// Whether `max_limit` is below `min_limit` scaled by the largest throttle
/// commanded to a non-manual actuator. Never true while no thrust is commanded.
fn thrust_disabled(actuators: &[Actuator], max_limit: f32, min_limit: f32) -> bool {
    let max_throttle = actuators
        .iter()
        .filter(|actuator| actuator.role != Role::Manual)
        .fold(0f32, |max, actuator| max.max(actuator.throttle));
    max_throttle > 0. && max_limit < min_limit * max_throttle
}

/// Torque demand for a normalized `steering` vector.
///
/// Sums the current torque of every actuator that turns the vehicle along
/// `steering`, projects the sum on it, scales by its magnitude and clamps the
/// result to `envelope`.
pub fn demand_from_steering(
    actuators: &[Actuator],
    steering: Vector3<f32>,
    envelope: &TorqueEnvelope,
) -> Vector3<f32> {
    if torque::is_zero(&steering) {
        return Vector3::zeros();
    }
    let available: Vector3<f32> = actuators
        .iter()
        .filter(|actuator| actuator.current_torque.dot(&steering) > 0.)
        .map(|actuator| actuator.current_torque)
        .sum();

    envelope.clamp(torque::project(&available, &steering) * steering.norm())
}

/// Preset the limits of maneuver actuators for a translation command.
pub fn preset_translation(actuators: &mut [Actuator], translation: Vector3<f32>) {
    if torque::is_zero(&translation) {
        return;
    }
    for actuator in actuators
        .iter_mut()
        .filter(|actuator| actuator.role == Role::Maneuver)
    {
        actuator.limit = actuator.thrust_direction.dot(&translation).clamp(0., 1.);
    }
}
