use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the flight sequence a drone is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    TakingOff,
    Hovering,
    Pattern,
    Landing,
    Disconnected,
}

impl Phase {
    /// Phases a control loop can execute.
    pub const FLIGHT: [Phase; 4] = [
        Phase::TakingOff,
        Phase::Hovering,
        Phase::Pattern,
        Phase::Landing,
    ];

    pub fn is_flight_phase(&self) -> bool {
        Self::FLIGHT.contains(self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::TakingOff => "TakingOff",
            Phase::Hovering => "Hovering",
            Phase::Pattern => "Pattern",
            Phase::Landing => "Landing",
            Phase::Disconnected => "Disconnected",
        };
        f.write_str(name)
    }
}
