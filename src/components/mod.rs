mod drone;
mod phase;
mod plan;
mod setpoint;

pub use drone::{DroneConfig, DroneId, DroneOutcome, FailureReason};
pub use phase::Phase;
pub use plan::{FlightPlan, PatternPlan, RampProfile, Waypoint, DEFAULT_TICK_INTERVAL};
pub use setpoint::{ControlMode, Setpoint};
