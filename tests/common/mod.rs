#![allow(dead_code)]

mod harness;
mod helpers;

// Re-export
pub use assertions::{assert_barrier_respected, assert_log_ordered, assert_stopped, phases_flown};

pub use helpers::*;

pub use fixtures::{LinkTrace, MockConnector, MockLink, Script};
pub use harness::{FleetHarness, FleetHarnessBuilder};
