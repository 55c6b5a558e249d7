mod control_loop;
mod fleet;
mod trajectory;

pub use control_loop::{DroneControlLoop, PhaseReport, PhaseResult};
pub use fleet::{DroneRecord, FailurePolicy, Fleet, FleetReport};
pub use trajectory::TrajectoryGenerator;
