//! Iterative torque allocation over thrust-limited actuators.
//!
//! Every actuator can only have its thrust reduced, so the allocator searches for
//! a set of throttle limits whose combined torque matches the demand. Each
//! iteration suppresses the actuators that push against the remaining error
//! and keeps the best assignment seen so far.

use crate::{
    actuator::{Actuator, Role},
    clamp01,
    config::AllocatorConfig,
    constrain_float,
    finite_or_zero,
    torque::{self, TorqueSnapshot},
};
use nalgebra::Vector3;
use tracing::{debug, trace};

mod steering;
pub use steering::{demand_from_steering, preset_translation, AllocationStatus};

/// Result of one [`ControlAllocator::optimize`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Allocation {
    /// The best error or angle is inside the configured cutoffs.
    pub success: bool,
    /// Largest final limit.
    pub max_limit: f32,
    /// Best angular acceleration error reached.
    pub torque_error: f32,
    /// Angle in degrees between the best imbalance and the demand.
    pub torque_angle: f32,
    /// Number of iterations run.
    pub iterations: usize,
}

/// State of the search after one iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Iteration {
    pub index: usize,
    pub angle: f32,
    pub error: f32,
    pub best_angle: f32,
    pub best_error: f32,
}

/// Assigns throttle limits to a group of actuators.
///
/// The scratch buffers are owned by the allocator and sized to the actuator slice
/// on every call, so they are never shared with anything else.
#[derive(Clone, Debug)]
pub struct ControlAllocator {
    pub config: AllocatorConfig,
    limit_tmp: Vec<f32>,
    best_limit: Vec<f32>,
}

impl ControlAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            limit_tmp: Vec::new(),
            best_limit: Vec::new(),
        }
    }

    /// Optimize the limits of `actuators` so their torque, added to `snapshot.torque`,
    /// matches `demand`.
    ///
    /// On return every limit is in `[0, 1]`. With more than one actuator the limits
    /// are the best assignment found, which is not necessarily the last one tried.
    /// A single actuator is switched fully on when the allocation succeeded and off otherwise.
    pub fn optimize(
        &mut self,
        actuators: &mut [Actuator],
        demand: Vector3<f32>,
        snapshot: &TorqueSnapshot,
    ) -> Allocation {
        self.optimize_with(actuators, demand, snapshot, |_| {})
    }

    /// Same as [`ControlAllocator::optimize`], calling `on_iteration` after the
    /// bookkeeping step of every iteration.
    pub fn optimize_with<F>(
        &mut self,
        actuators: &mut [Actuator],
        demand: Vector3<f32>,
        snapshot: &TorqueSnapshot,
        mut on_iteration: F,
    ) -> Allocation
    where
        F: FnMut(&Iteration),
    {
        let num_actuators = actuators.len();
        if num_actuators == 0 {
            return Allocation::default();
        }

        self.limit_tmp.clear();
        self.limit_tmp.resize(num_actuators, 0.);
        self.best_limit.clear();
        self.best_limit
            .extend(actuators.iter().map(|actuator| actuator.limit));

        let precision = self.config.precision;
        let zero_demand = torque::is_zero(&demand);

        let mut best_angle = -1f32;
        let mut best_error = -1f32;
        let mut last_error = -1f32;
        let mut iterations = 0;

        for index in 0..self.config.max_iterations {
            iterations = index + 1;

            let imbalance = actuators
                .iter()
                .fold(snapshot.torque, |sum, actuator| sum + actuator.limited_torque());
            let angle = if zero_demand {
                0.
            } else {
                torque::angle_deg(&imbalance, &demand)
            };
            let target = demand - imbalance;
            // NaN and overflow count as the worst possible error
            let error = snapshot.angular_acceleration(target).norm().min(f32::MAX);

            if (angle <= 0. && error < best_error)
                || angle + error < best_angle + best_error
                || best_angle < 0.
            {
                for (best, actuator) in self.best_limit.iter_mut().zip(actuators.iter()) {
                    *best = actuator.limit;
                }
                best_angle = angle;
                best_error = error;
            }

            let iteration = Iteration {
                index,
                angle,
                error,
                best_angle,
                best_error,
            };
            trace!(?iteration, "allocation step");
            on_iteration(&iteration);

            if error < self.config.torque_cutoff * precision
                || (last_error > 0. && (error - last_error).abs() < precision * last_error)
            {
                break;
            }
            last_error = error;

            normalize_limits(actuators);

            if !self.pass(actuators, target, precision) {
                break;
            }
        }

        let success = best_error < self.config.torque_cutoff
            || (!zero_demand && best_angle < self.config.angle_cutoff);

        if num_actuators == 1 {
            actuators[0].limit = if success { 1. } else { 0. };
        } else {
            for (actuator, best) in actuators.iter_mut().zip(self.best_limit.iter()) {
                actuator.limit = clamp01(*best);
            }
        }

        let max_limit = actuators
            .iter()
            .map(|actuator| actuator.limit)
            .fold(0f32, f32::max);

        let allocation = Allocation {
            success,
            max_limit,
            torque_error: best_error,
            torque_angle: best_angle,
            iterations,
        };
        debug!(?allocation, "torque allocation");
        allocation
    }

    /// One adjustment pass. Returns `false` when no actuator can change the imbalance.
    fn pass(&mut self, actuators: &mut [Actuator], target: Vector3<f32>, eps: f32) -> bool {
        let target_m = target.norm();
        let mut compensation = Vector3::zeros();
        let mut maneuver = Vector3::zeros();

        for (tmp, actuator) in self.limit_tmp.iter_mut().zip(actuators.iter_mut()) {
            *tmp = if actuator.role == Role::Manual {
                0.
            } else {
                contribution(actuator, &target, target_m)
            };

            if *tmp > 0. {
                compensation += actuator.limited_torque();
            } else if actuator.role == Role::Maneuver {
                if actuator.limit == 0. {
                    actuator.limit = eps;
                }
                maneuver += actuator.limited_torque();
            } else {
                *tmp = 0.;
            }
        }

        let compensation_m = compensation.norm();
        let maneuver_m = maneuver.norm();
        if compensation_m < eps && maneuver_m == 0. {
            return false;
        }

        let limits_norm = norm(target_m, compensation_m);
        let maneuver_norm = norm(target_m, maneuver_m);

        for (tmp, actuator) in self.limit_tmp.iter().zip(actuators.iter_mut()) {
            let scale = if *tmp > 0. { limits_norm } else { maneuver_norm };
            actuator.limit = clamp01(actuator.limit * (1. - *tmp * scale));
        }
        true
    }
}

/// How strongly an actuator works against `target`, weighted by its torque ratio.
/// Positive values mean reducing the actuator helps.
fn contribution(actuator: &Actuator, target: &Vector3<f32>, target_m: f32) -> f32 {
    let torque_m = actuator.current_torque.norm();
    if target_m <= 0. || torque_m <= 0. {
        return 0.;
    }
    finite_or_zero(-actuator.current_torque.dot(target) / target_m / torque_m * actuator.torque_ratio)
}

fn norm(target_m: f32, compensation_m: f32) -> f32 {
    if compensation_m > 0. {
        constrain_float(target_m / compensation_m, 0., 1.)
    } else {
        1.
    }
}

/// Scale the limits of the normalized group so the largest one is 1.
fn normalize_limits(actuators: &mut [Actuator]) {
    let max_limit = actuators
        .iter()
        .filter(|actuator| actuator.role.is_normalized())
        .map(|actuator| actuator.limit)
        .fold(0f32, f32::max);

    if max_limit > 0. {
        for actuator in actuators
            .iter_mut()
            .filter(|actuator| actuator.role.is_normalized())
        {
            actuator.limit = clamp01(actuator.limit / max_limit);
        }
    }
}
