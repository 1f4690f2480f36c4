//! # thrust-control
//! Torque allocation and cascaded attitude control for vehicles whose actuators
//! can only have their thrust *reduced* from a nominal value.
//!
//! # Components
//! [`ControlAllocator`] assigns a throttle limit in `[0, 1]` to every [`Actuator`]
//! so that the resulting torque matches a demand as closely as possible.
//!
//! [`AttitudeController`] turns an attitude error and the current angular velocity into
//! the normalized torque demand fed into the allocator, and keeps track of whether the
//! vehicle currently has control authority.
//!
//! [`FlightCore`] runs both in order for one control tick.
//! [`Scheduler`] runs ticks at a fixed rate from an [`embedded_time::Clock`].
//!
//! [`hal`] contains the hardware output layer.
//!
//! ```
//! use nalgebra::Vector3;
//! use thrust_control::{Actuator, AllocatorConfig, ControlAllocator, Role, TorqueSnapshot};
//!
//! let mut actuators = [
//!     Actuator::new(Vector3::new(1., 0., 0.), 1., Role::Main),
//!     Actuator::new(Vector3::new(-1., 0., 0.), 1., Role::Main),
//! ];
//! let snapshot = TorqueSnapshot::new(Vector3::zeros(), Vector3::new(1., 1., 1.));
//!
//! let mut allocator = ControlAllocator::new(AllocatorConfig::engines());
//! let allocation = allocator.optimize(&mut actuators, Vector3::zeros(), &snapshot);
//! assert!(allocation.success);
//! ```

pub mod actuator;
pub use actuator::{Actuator, Role};

pub mod allocator;
pub use allocator::{Allocation, AllocationStatus, ControlAllocator};

pub mod attitude;
pub use attitude::{AttitudeController, ControlAuthority, VehicleState};

pub mod config;
pub use config::{AllocatorConfig, AttitudeConfig, AuthorityConfig, FlightConfig};

pub mod error;
pub use error::{ConfigError, Error};

pub mod filter;
pub use filter::LowPassFilter;

pub mod hal;

pub mod pipeline;
pub use pipeline::{FlightCore, TickInput, TickOutput};

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod torque;
pub use torque::{TorqueEnvelope, TorqueSnapshot};

/// Constrain `amt` to `[low, high]`. NaN maps to the middle of the range.
pub fn constrain_float(amt: f32, low: f32, high: f32) -> f32 {
    if amt.is_nan() {
        return (low + high) / 2.0;
    }

    if amt < low {
        return low;
    }

    if amt > high {
        return high;
    }

    amt
}

/// Constrain `amt` to `[0, 1]`. Anything that is not finite becomes 0.
pub fn clamp01(amt: f32) -> f32 {
    constrain_float(finite_or_zero(amt), 0., 1.)
}

/// Replace NaN and infinities with 0.
pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.
    }
}

pub fn safe_sqrt(v: f32) -> f32 {
    let ret = v.sqrt();
    if ret.is_nan() {
        return 0.0;
    }
    ret
}

/// Clamp `value` from below.
pub(crate) fn clamp_l(value: f32, low: f32) -> f32 {
    if value > low {
        value
    } else {
        low
    }
}

/// Clamp `value` from above.
pub(crate) fn clamp_h(value: f32, high: f32) -> f32 {
    if value < high {
        value
    } else {
        high
    }
}
