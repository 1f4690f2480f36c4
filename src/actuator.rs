use crate::clamp01;
use nalgebra::Vector3;

/// How an actuator takes part in torque allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Primary thrust and steering.
    Main,
    /// Only used to produce torque and translation. Starts switched off.
    Maneuver,
    /// Fixed limit set by the operator. Never touched by the allocator.
    Manual,
    /// Primary thrust that is balanced but not used for steering.
    Balance,
    /// Thrust that is intentionally left unbalanced.
    Unbalance,
}

impl Role {
    /// Whether the allocator renormalizes this actuator's limit together with its group.
    pub fn is_normalized(self) -> bool {
        !matches!(self, Role::Manual | Role::Maneuver)
    }
}

/// A thrust-producing unit whose thrust can only be reduced by a limit in `[0, 1]`.
///
/// ```
/// use nalgebra::Vector3;
/// use thrust_control::{Actuator, Role};
///
/// let mut actuator = Actuator::new(Vector3::new(0., 2., 0.), 10., Role::Main);
/// actuator.limit = 0.5;
///
/// assert_eq!(actuator.torque(actuator.throttle * actuator.limit), Vector3::new(0., 10., 0.));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Actuator {
    /// Torque per unit of thrust.
    pub specific_torque: Vector3<f32>,
    /// Unit direction of the thrust in the vehicle frame.
    pub thrust_direction: Vector3<f32>,
    /// Thrust at full throttle and full limit.
    pub max_thrust: f32,
    /// Throttle commanded by the outer layer, in `[0, 1]`.
    pub throttle: f32,
    /// Throttle ceiling being optimized, in `[0, 1]`.
    pub limit: f32,
    /// Limit of a [`Role::Manual`] actuator.
    pub manual_limit: f32,
    pub torque_ratio: f32,
    /// Torque at the commanded throttle, refreshed by [`Actuator::update_current_torque`].
    pub current_torque: Vector3<f32>,
    pub role: Role,
}

impl Actuator {
    /// Create an actuator at full throttle with a torque ratio of 1.
    pub fn new(specific_torque: Vector3<f32>, max_thrust: f32, role: Role) -> Self {
        let mut actuator = Self {
            specific_torque,
            thrust_direction: Vector3::zeros(),
            max_thrust,
            throttle: 1.,
            limit: 1.,
            manual_limit: 1.,
            torque_ratio: 1.,
            current_torque: Vector3::zeros(),
            role,
        };
        actuator.init_limits();
        actuator.update_current_torque();
        actuator
    }

    /// Create an actuator from its mounting geometry.
    ///
    /// `position` and `center_of_mass` are in the same frame as `thrust_direction`.
    /// Thrust pointing straight through the center of mass gets a torque ratio of 0.
    pub fn from_geometry(
        position: Vector3<f32>,
        thrust_direction: Vector3<f32>,
        center_of_mass: Vector3<f32>,
        max_thrust: f32,
        role: Role,
        ratio_factor: f32,
    ) -> Self {
        let thrust_direction = thrust_direction
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        let lever = position - center_of_mass;

        let mut actuator = Self::new(lever.cross(&thrust_direction), max_thrust, role);
        actuator.thrust_direction = thrust_direction;
        actuator.torque_ratio = torque_ratio(&lever, &thrust_direction, ratio_factor);
        actuator.update_current_torque();
        actuator
    }

    pub fn with_torque_ratio(mut self, torque_ratio: f32) -> Self {
        self.torque_ratio = torque_ratio.max(0.);
        self
    }

    pub fn with_throttle(mut self, throttle: f32) -> Self {
        self.throttle = clamp01(throttle);
        self.update_current_torque();
        self
    }

    pub fn with_manual_limit(mut self, manual_limit: f32) -> Self {
        self.manual_limit = clamp01(manual_limit);
        self.init_limits();
        self
    }

    /// Reset the limit to the starting value of the actuator's role.
    pub fn init_limits(&mut self) {
        self.limit = match self.role {
            Role::Main | Role::Balance | Role::Unbalance => 1.,
            Role::Maneuver => 0.,
            Role::Manual => self.manual_limit,
        };
    }

    /// Thrust at `throttle` (already multiplied by any limit).
    /// Manual actuators always produce their fixed thrust.
    pub fn thrust(&self, throttle: f32) -> f32 {
        match self.role {
            Role::Manual => self.max_thrust * self.throttle * self.manual_limit,
            _ => self.max_thrust * clamp01(throttle),
        }
    }

    /// Torque produced at `throttle`.
    pub fn torque(&self, throttle: f32) -> Vector3<f32> {
        self.specific_torque * self.thrust(throttle)
    }

    /// Torque with the current throttle and limit.
    pub fn limited_torque(&self) -> Vector3<f32> {
        self.torque(self.throttle * self.limit)
    }

    /// Refresh `current_torque` from the commanded throttle.
    pub fn update_current_torque(&mut self) {
        self.current_torque = self.torque(self.throttle);
    }

    pub fn set_throttle(&mut self, throttle: f32) {
        self.throttle = clamp01(throttle);
        self.update_current_torque();
    }
}

/// Weight of how much of an actuator's thrust turns into torque.
pub fn torque_ratio(lever: &Vector3<f32>, thrust_direction: &Vector3<f32>, ratio_factor: f32) -> f32 {
    let lever = match lever.try_normalize(f32::EPSILON) {
        Some(lever) => lever,
        None => return 0.,
    };
    clamp01(1. - lever.dot(thrust_direction).abs()).powf(ratio_factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn init_limits_by_role() {
        let torque = Vector3::x();
        assert_eq!(Actuator::new(torque, 1., Role::Main).limit, 1.);
        assert_eq!(Actuator::new(torque, 1., Role::Balance).limit, 1.);
        assert_eq!(Actuator::new(torque, 1., Role::Unbalance).limit, 1.);
        assert_eq!(Actuator::new(torque, 1., Role::Maneuver).limit, 0.);

        let manual = Actuator::new(torque, 1., Role::Manual).with_manual_limit(0.3);
        assert_eq!(manual.limit, 0.3);
    }

    #[test]
    fn manual_thrust_ignores_requested_throttle() {
        let manual = Actuator::new(Vector3::x(), 2., Role::Manual).with_manual_limit(0.5);
        assert_relative_eq!(manual.torque(0.), Vector3::new(1., 0., 0.));
        assert_relative_eq!(manual.torque(1.), Vector3::new(1., 0., 0.));
    }

    #[test]
    fn from_geometry() {
        // Thrust up from an arm along +X
        let actuator = Actuator::from_geometry(
            Vector3::new(1., 0., 0.),
            Vector3::new(0., 0., 2.),
            Vector3::zeros(),
            4.,
            Role::Main,
            0.1,
        );
        assert_relative_eq!(actuator.thrust_direction, Vector3::z());
        assert_relative_eq!(actuator.specific_torque, Vector3::new(0., -1., 0.));
        assert_relative_eq!(actuator.torque_ratio, 1.);
        assert_relative_eq!(actuator.current_torque, Vector3::new(0., -4., 0.));
    }

    #[test]
    fn thrust_through_center_of_mass_has_no_ratio() {
        let actuator = Actuator::from_geometry(
            Vector3::new(0., 0., -1.),
            Vector3::new(0., 0., 1.),
            Vector3::zeros(),
            1.,
            Role::Main,
            0.1,
        );
        assert_eq!(actuator.torque_ratio, 0.);
        assert_relative_eq!(actuator.current_torque, Vector3::zeros());
    }
}
