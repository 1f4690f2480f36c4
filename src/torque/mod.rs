//! Torque bookkeeping shared by the allocator and the attitude controller.

use nalgebra::Vector3;

mod envelope;
pub use envelope::TorqueEnvelope;

/// Squared norm below which a vector counts as zero.
pub const ZERO_EPSILON: f32 = 1e-10;

/// Static torque state of the vehicle for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TorqueSnapshot {
    /// Torque produced by everything the allocator does not control.
    pub torque: Vector3<f32>,
    /// Principal moments of inertia.
    pub moment_of_inertia: Vector3<f32>,
    /// Torque the vehicle can produce on each axis direction.
    pub envelope: TorqueEnvelope,
}

impl TorqueSnapshot {
    /// Create a snapshot with an unbounded torque envelope.
    pub fn new(torque: Vector3<f32>, moment_of_inertia: Vector3<f32>) -> Self {
        Self {
            torque,
            moment_of_inertia,
            envelope: TorqueEnvelope::unbounded(),
        }
    }

    pub fn with_envelope(mut self, envelope: TorqueEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    /// Angular acceleration produced by `torque`.
    /// An axis with no inertia yields zero acceleration.
    pub fn angular_acceleration(&self, torque: Vector3<f32>) -> Vector3<f32> {
        Vector3::from_fn(|i, _| {
            let moi = self.moment_of_inertia[i];
            if moi > 0. && moi.is_finite() {
                torque[i] / moi
            } else {
                0.
            }
        })
    }

    /// Largest angular acceleration the envelope allows on every axis.
    pub fn max_angular_acceleration(&self) -> Vector3<f32> {
        self.angular_acceleration(self.envelope.max())
    }
}

pub fn is_zero(v: &Vector3<f32>) -> bool {
    v.norm_squared() < ZERO_EPSILON
}

/// Angle between two vectors in degrees. Zero when either vector is (almost) zero.
pub fn angle_deg(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let denominator = (a.norm_squared() * b.norm_squared()).sqrt();
    if denominator < 1e-15 {
        return 0.;
    }
    let cos = crate::constrain_float(a.dot(b) / denominator, -1., 1.);
    cos.acos().to_degrees()
}

/// Projection of `v` on `on`. Zero when `on` is zero.
pub fn project(v: &Vector3<f32>, on: &Vector3<f32>) -> Vector3<f32> {
    let sqr = on.norm_squared();
    if sqr < f32::EPSILON {
        return Vector3::zeros();
    }
    on * (v.dot(on) / sqr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn angular_acceleration_ignores_zero_inertia() {
        let snapshot = TorqueSnapshot::new(Vector3::zeros(), Vector3::new(2., 0., 4.));
        let aa = snapshot.angular_acceleration(Vector3::new(1., 1., 1.));
        assert_relative_eq!(aa, Vector3::new(0.5, 0., 0.25));
    }

    #[test]
    fn max_angular_acceleration_uses_envelope() {
        let snapshot = TorqueSnapshot::new(Vector3::zeros(), Vector3::new(2., 2., 2.))
            .with_envelope(TorqueEnvelope {
                positive: Vector3::new(1., 4., 2.),
                negative: Vector3::new(-3., -1., -2.),
            });
        assert_relative_eq!(
            snapshot.max_angular_acceleration(),
            Vector3::new(1.5, 2., 1.)
        );
    }

    #[test]
    fn angle_between_vectors() {
        assert_relative_eq!(angle_deg(&Vector3::x(), &Vector3::y()), 90.);
        assert_relative_eq!(angle_deg(&Vector3::x(), &-Vector3::x()), 180.);
        assert_relative_eq!(angle_deg(&Vector3::x(), &Vector3::x()), 0.);
        assert_eq!(angle_deg(&Vector3::zeros(), &Vector3::x()), 0.);
    }

    #[test]
    fn project_on_zero_is_zero() {
        assert_eq!(project(&Vector3::x(), &Vector3::zeros()), Vector3::zeros());
        assert_relative_eq!(
            project(&Vector3::new(1., 1., 0.), &Vector3::new(2., 0., 0.)),
            Vector3::new(1., 0., 0.)
        );
    }
}
