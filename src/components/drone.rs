use serde::{Deserialize, Serialize};
use std::fmt;

use crate::components::Phase;

pub type DroneId = u32;

/// Static roster entry for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneConfig {
    pub id: DroneId,
    /// Link address, e.g. `radio://0/80/2M`
    pub address: String,
    /// Altitude held during hover and pattern (m)
    pub target_height: f64,
}

impl DroneConfig {
    pub fn new(id: DroneId, address: impl Into<String>, target_height: f64) -> Self {
        Self {
            id,
            address: address.into(),
            target_height,
        }
    }
}

/// Why a drone left the flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FailureReason {
    LinkUnavailable { detail: String },
    SendTimeout { phase: Phase, tick: u64 },
    LinkLost { phase: Phase, tick: u64 },
    LoopPanicked { phase: Phase },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::LinkUnavailable { .. } => write!(f, "LinkUnavailable"),
            FailureReason::SendTimeout { phase, tick } => {
                write!(f, "SendTimeout ({} tick {})", phase, tick)
            }
            FailureReason::LinkLost { phase, tick } => {
                write!(f, "LinkLost ({} tick {})", phase, tick)
            }
            FailureReason::LoopPanicked { phase } => write!(f, "LoopPanicked ({})", phase),
        }
    }
}

/// Final per-drone result reported at fleet teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DroneOutcome {
    Completed,
    Disconnected(FailureReason),
    /// Stopped by the fleet emergency stop before the sequence finished.
    Aborted,
}

impl DroneOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DroneOutcome::Completed)
    }
}

impl fmt::Display for DroneOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DroneOutcome::Completed => write!(f, "Completed"),
            DroneOutcome::Disconnected(reason) => write!(f, "Disconnected: {}", reason),
            DroneOutcome::Aborted => write!(f, "Aborted"),
        }
    }
}
