use crate::{
    actuator::Actuator,
    allocator::{preset_translation, AllocationStatus, ControlAllocator},
    attitude::{AttitudeController, VehicleState},
    config::FlightConfig,
    torque::{TorqueEnvelope, TorqueSnapshot},
};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

/// Inputs of one control tick.
#[derive(Clone, Copy, Debug)]
pub struct TickInput {
    /// Rotation from the current to the target attitude.
    pub attitude_error: UnitQuaternion<f32>,
    pub state: VehicleState,
    /// External torque, inertia and engine torque envelope.
    pub snapshot: TorqueSnapshot,
    /// Torque envelope of the reaction thrusters.
    pub rcs_envelope: TorqueEnvelope,
    /// Normalized translation command for maneuver engines.
    pub translation: Vector3<f32>,
    pub dt: f32,
}

impl TickInput {
    pub fn new(
        attitude_error: UnitQuaternion<f32>,
        state: VehicleState,
        snapshot: TorqueSnapshot,
        dt: f32,
    ) -> Self {
        Self {
            attitude_error,
            state,
            snapshot,
            rcs_envelope: TorqueEnvelope::zeros(),
            translation: Vector3::zeros(),
            dt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutput {
    /// Normalized torque demand from the attitude controller.
    pub steering: Vector3<f32>,
    pub engines: AllocationStatus,
    pub rcs: AllocationStatus,
    pub has_control_authority: bool,
}

impl Default for TickOutput {
    fn default() -> Self {
        Self {
            steering: Vector3::zeros(),
            engines: AllocationStatus::default(),
            rcs: AllocationStatus::default(),
            has_control_authority: true,
        }
    }
}

/// Attitude controller followed by the engine and reaction thruster allocators.
#[derive(Clone, Debug)]
pub struct FlightCore {
    pub attitude: AttitudeController,
    pub engines: ControlAllocator,
    pub rcs: ControlAllocator,
}

impl FlightCore {
    pub fn new(config: FlightConfig) -> Self {
        Self {
            attitude: AttitudeController::new(config.attitude, config.authority),
            engines: ControlAllocator::new(config.engines),
            rcs: ControlAllocator::new(config.rcs),
        }
    }

    /// Run one tick. Engine and thruster limits are updated in place.
    ///
    /// The thrusters are given the torque the engines left uncorrected as their
    /// external torque, on top of their own share of the steering demand.
    pub fn tick(
        &mut self,
        input: &TickInput,
        engines: &mut [Actuator],
        rcs: &mut [Actuator],
    ) -> TickOutput {
        let steering = self
            .attitude
            .update_steering(input.attitude_error, &input.state, input.dt);

        preset_translation(engines, input.translation);
        let engine_demand = self
            .engines
            .demand(engines, steering, &input.snapshot.envelope);
        let engine_status = self.engines.steer(engines, engine_demand, &input.snapshot);

        let engine_torque = engines
            .iter()
            .fold(input.snapshot.torque, |sum, engine| sum + engine.limited_torque());
        let rcs_snapshot = TorqueSnapshot {
            torque: engine_torque - engine_demand,
            ..input.snapshot
        }
        .with_envelope(input.rcs_envelope);
        let rcs_demand = self.rcs.demand(rcs, steering, &input.rcs_envelope);
        let rcs_status = self.rcs.steer(rcs, rcs_demand, &rcs_snapshot);

        let output = TickOutput {
            steering,
            engines: engine_status,
            rcs: rcs_status,
            has_control_authority: self.attitude.has_control_authority(),
        };
        debug!(?steering, authority = output.has_control_authority, "control tick");
        output
    }
}
