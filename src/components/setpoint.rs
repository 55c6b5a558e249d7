use serde::{Deserialize, Serialize};

/// How the fourth setpoint field is interpreted by the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// `z` is an absolute altitude in metres, `vx`/`vy` are body velocities in m/s.
    Hover,
    /// `z` is raw motor thrust, `vx`/`vy` carry roll/pitch in degrees.
    Thrust,
}

/// One command sent to a vehicle for one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    pub vx: f64,
    pub vy: f64,
    /// Yaw rate (deg/s)
    pub yaw_rate: f64,
    /// Altitude or thrust, depending on `mode`
    pub z: f64,
    pub mode: ControlMode,
}

impl Setpoint {
    pub fn hover(vx: f64, vy: f64, yaw_rate: f64, altitude: f64) -> Self {
        Self {
            vx,
            vy,
            yaw_rate,
            z: altitude,
            mode: ControlMode::Hover,
        }
    }

    /// Zero velocity at a fixed altitude.
    pub fn hold(altitude: f64) -> Self {
        Self::hover(0.0, 0.0, 0.0, altitude)
    }

    /// Level attitude with the given raw thrust.
    pub fn thrust(thrust: f64) -> Self {
        Self {
            vx: 0.0,
            vy: 0.0,
            yaw_rate: 0.0,
            z: thrust,
            mode: ControlMode::Thrust,
        }
    }

    /// Terminal command: motors off, zero on every axis.
    pub fn stop() -> Self {
        Self::thrust(0.0)
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::stop()
    }

    pub fn altitude(&self) -> Option<f64> {
        match self.mode {
            ControlMode::Hover => Some(self.z),
            ControlMode::Thrust => None,
        }
    }
}
