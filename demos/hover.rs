//! Levels a tilted quadcopter with four thrust-limited motors.
//!
//! Run with `RUST_LOG=debug cargo run --example hover` to see the allocator output.

use std::{cell::Cell, rc::Rc};

use embedded_time::{clock, fraction::Fraction, Clock, Instant};
use nalgebra::{UnitQuaternion, Vector3};
use thrust_control::{
    hal::{apply_limits, ThrottleOutput},
    Actuator, Error, FlightConfig, FlightCore, Role, Scheduler, TickInput, TorqueEnvelope,
    TorqueSnapshot, VehicleState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulated microsecond clock.
#[derive(Clone, Default)]
struct SimClock(Rc<Cell<u32>>);

impl Clock for SimClock {
    type T = u32;

    const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

    fn try_now(&self) -> Result<Instant<Self>, clock::Error> {
        Ok(Instant::new(self.0.get()))
    }
}

#[derive(Default)]
struct ExampleMotor {
    limit: f32,
}

impl ThrottleOutput for ExampleMotor {
    fn output(&mut self, limit: f32) {
        self.limit = limit;
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = FlightConfig::default();
    let mut core = FlightCore::new(config.clone());

    let moment_of_inertia = Vector3::new(0.5, 0.5, 1.);
    let arm = |x: f32, y: f32| {
        Actuator::from_geometry(
            Vector3::new(x, y, 0.),
            Vector3::z(),
            Vector3::zeros(),
            2.,
            Role::Main,
            config.engines.torque_ratio_factor,
        )
    };
    let mut engines = [arm(0.5, 0.), arm(-0.5, 0.), arm(0., 0.5), arm(0., -0.5)];
    let mut motors: [ExampleMotor; 4] = Default::default();

    let mut envelope = TorqueEnvelope::zeros();
    for engine in &engines {
        envelope.add(engine.current_torque);
    }
    let snapshot =
        TorqueSnapshot::new(Vector3::zeros(), moment_of_inertia).with_envelope(envelope);

    let mut attitude = UnitQuaternion::from_euler_angles(0.4, -0.2, 0.);
    let mut angular_velocity = Vector3::zeros();

    let clock = SimClock::default();
    let mut scheduler = Scheduler::new(clock.clone(), config.loop_rate_hz);

    while scheduler.ticks() < 250 {
        scheduler.run(|dt| {
            let state = VehicleState {
                angular_velocity,
                moment_of_inertia,
                max_angular_acceleration: snapshot.max_angular_acceleration(),
                ..Default::default()
            };
            let input = TickInput::new(attitude.inverse(), state, snapshot, dt);
            let output = core.tick(&input, &mut engines, &mut []);
            apply_limits(&engines, &mut motors);

            let torque = engines
                .iter()
                .fold(Vector3::zeros(), |sum, engine| sum + engine.limited_torque());
            angular_velocity += snapshot.angular_acceleration(torque) * dt;
            attitude *= UnitQuaternion::from_scaled_axis(angular_velocity * dt);

            if is_tilted(&attitude) {
                info!(
                    error_deg = attitude.angle().to_degrees(),
                    authority = output.has_control_authority,
                    limits = ?motors.iter().map(|motor| motor.limit).collect::<Vec<_>>(),
                );
            }
            Ok::<_, Error>(())
        })?;
        clock.0.set(clock.0.get() + 1_000);
    }

    info!(
        error_deg = attitude.angle().to_degrees(),
        overruns = scheduler.overruns(),
        "done"
    );
    Ok(())
}

fn is_tilted(attitude: &UnitQuaternion<f32>) -> bool {
    attitude.angle() > 0.01
}
