use nalgebra::Vector3;

/// Six directional torque limits.
///
/// `positive` holds the largest achievable torque along +X, +Y and +Z,
/// `negative` the (non-positive) limits along -X, -Y and -Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TorqueEnvelope {
    pub positive: Vector3<f32>,
    pub negative: Vector3<f32>,
}

impl Default for TorqueEnvelope {
    fn default() -> Self {
        Self::zeros()
    }
}

impl TorqueEnvelope {
    pub fn zeros() -> Self {
        Self {
            positive: Vector3::zeros(),
            negative: Vector3::zeros(),
        }
    }

    /// An envelope that does not limit anything.
    pub fn unbounded() -> Self {
        Self {
            positive: Vector3::repeat(f32::MAX),
            negative: Vector3::repeat(-f32::MAX),
        }
    }

    /// A symmetric envelope of `limit` in both directions of every axis.
    pub fn symmetric(limit: Vector3<f32>) -> Self {
        let limit = limit.abs();
        Self {
            positive: limit,
            negative: -limit,
        }
    }

    /// Accumulate a torque vector, splitting it into its positive and negative parts.
    pub fn add(&mut self, torque: Vector3<f32>) {
        for i in 0..3 {
            if torque[i] >= 0. {
                self.positive[i] += torque[i];
            } else {
                self.negative[i] += torque[i];
            }
        }
    }

    /// Clamp every component of `torque` to the limit on its side of the axis.
    pub fn clamp(&self, torque: Vector3<f32>) -> Vector3<f32> {
        Vector3::from_fn(|i, _| {
            let t = torque[i];
            if t >= 0. {
                t.min(self.positive[i])
            } else {
                t.max(self.negative[i])
            }
        })
    }

    /// Scale the envelope by a direction with components in `[-1, 1]`.
    pub fn scale(&self, dir: Vector3<f32>) -> Vector3<f32> {
        Vector3::from_fn(|i, _| {
            let d = dir[i];
            if d >= 0. {
                self.positive[i] * d.abs()
            } else {
                self.negative[i] * d.abs()
            }
        })
    }

    /// Largest magnitude available on every axis.
    pub fn max(&self) -> Vector3<f32> {
        Vector3::from_fn(|i, _| (-self.negative[i]).max(self.positive[i]))
    }

    /// Sum of every directional limit projected on `normal`, counting only the
    /// limits that point along it.
    pub fn project(&self, normal: Vector3<f32>) -> Vector3<f32> {
        let mut proj = Vector3::zeros();
        for i in 0..3 {
            for limit in [self.positive[i], self.negative[i]] {
                let projm = limit * normal[i];
                if projm > 0. {
                    proj += normal * projm;
                }
            }
        }
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn add_splits_by_sign() {
        let mut envelope = TorqueEnvelope::zeros();
        envelope.add(Vector3::new(1., -2., 0.5));
        envelope.add(Vector3::new(-1., 3., 0.5));

        assert_eq!(envelope.positive, Vector3::new(1., 3., 1.));
        assert_eq!(envelope.negative, Vector3::new(-1., -2., 0.));
        assert_eq!(envelope.max(), Vector3::new(1., 3., 1.));
    }

    #[test]
    fn clamp_respects_each_side() {
        let envelope = TorqueEnvelope {
            positive: Vector3::new(1., 1., 1.),
            negative: Vector3::new(-2., -0.5, 0.),
        };
        let clamped = envelope.clamp(Vector3::new(3., -3., -1.));
        assert_eq!(clamped, Vector3::new(1., -0.5, 0.));
    }

    #[test]
    fn scale_picks_the_side_of_the_direction() {
        let envelope = TorqueEnvelope {
            positive: Vector3::new(2., 2., 2.),
            negative: Vector3::new(-4., -4., -4.),
        };
        let scaled = envelope.scale(Vector3::new(0.5, -0.5, 0.));
        assert_relative_eq!(scaled, Vector3::new(1., -2., 0.));
    }

    #[test]
    fn project_counts_limits_along_normal() {
        let envelope = TorqueEnvelope::symmetric(Vector3::new(2., 1., 1.));
        let proj = envelope.project(Vector3::x());
        assert_relative_eq!(proj, Vector3::new(2., 0., 0.));
    }
}
