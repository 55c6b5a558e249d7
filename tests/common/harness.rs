use choreo::{
    components::{DroneConfig, FlightPlan, Phase},
    resources::MemoryTelemetryLog,
    systems::{FailurePolicy, Fleet, FleetReport},
    utils::Result,
};
use std::sync::Arc;

use super::{create_quick_plan, LinkTrace, MockConnector, MockLink, Script};

/// Builder for a fleet flying mock links
pub struct FleetHarnessBuilder {
    drones: Vec<DroneConfig>,
    plan: FlightPlan,
    policy: FailurePolicy,
    connector: MockConnector,
}

impl Default for FleetHarnessBuilder {
    fn default() -> Self {
        Self {
            drones: Vec::new(),
            plan: create_quick_plan(),
            policy: FailurePolicy::Isolate,
            connector: MockConnector::new(),
        }
    }
}

impl FleetHarnessBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drones(mut self, drones: Vec<DroneConfig>) -> Self {
        self.drones.extend(drones);
        self
    }

    pub fn with_plan(mut self, plan: FlightPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_script(mut self, address: &str, script: Script) -> Self {
        self.connector.script(address, script);
        self
    }

    pub fn try_build(self) -> Result<FleetHarness> {
        let log = Arc::new(MemoryTelemetryLog::new());
        let fleet = Fleet::connect(
            &self.connector,
            self.drones,
            self.plan,
            self.policy,
            log.clone(),
        )?;
        Ok(FleetHarness {
            fleet: Some(fleet),
            plan: self.plan,
            connector: self.connector,
            log,
        })
    }

    pub fn build(self) -> FleetHarness {
        self.try_build().expect("fleet should connect")
    }
}

pub struct FleetHarness {
    pub fleet: Option<Fleet<MockLink>>,
    pub plan: FlightPlan,
    pub connector: MockConnector,
    pub log: Arc<MemoryTelemetryLog>,
}

impl FleetHarness {
    /// Fly the plan's own phase sequence
    pub fn run(&mut self) -> FleetReport {
        let sequence = self.plan.phase_sequence();
        self.run_phases(&sequence)
    }

    pub fn run_phases(&mut self, phases: &[Phase]) -> FleetReport {
        self.fleet
            .take()
            .expect("fleet already flown")
            .run_sequence(phases)
            .expect("sequence should be valid")
    }

    pub fn trace(&self, address: &str) -> LinkTrace {
        self.connector.trace(address)
    }
}
