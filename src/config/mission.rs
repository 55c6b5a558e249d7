use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::components::{DroneConfig, FlightPlan};
use crate::link::SimConfig;
use crate::systems::FailurePolicy;
use crate::utils::{ChoreoError, Result};

/// Everything needed to fly one mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub drones: Vec<DroneConfig>,
    pub plan: FlightPlan,
    pub failure_policy: FailurePolicy,
    /// CSV destination for telemetry, none to keep samples in memory
    pub telemetry_log: Option<PathBuf>,
    pub simulation: SimConfig,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            drones: vec![
                DroneConfig::new(0, "radio://0/80/2M", 0.5),
                DroneConfig::new(1, "radio://0/81/2M", 0.8),
                DroneConfig::new(2, "radio://0/82/2M", 1.1),
            ],
            plan: FlightPlan::default(),
            failure_policy: FailurePolicy::Isolate,
            telemetry_log: Some(PathBuf::from("telemetry.csv")),
            simulation: SimConfig::default(),
        }
    }
}

impl MissionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.plan.validate()?;
        if self.drones.is_empty() {
            return Err(ChoreoError::InvalidConfig("no drones configured".to_string()));
        }
        for (i, drone) in self.drones.iter().enumerate() {
            if self.drones[..i].iter().any(|d| d.id == drone.id) {
                return Err(ChoreoError::InvalidConfig(format!(
                    "drone id {} listed twice",
                    drone.id
                )));
            }
            if !(drone.target_height.is_finite() && drone.target_height > 0.0) {
                return Err(ChoreoError::InvalidConfig(format!(
                    "drone {} target height must be positive, got {}",
                    drone.id, drone.target_height
                )));
            }
        }

        let sim = &self.simulation;
        if !(sim.telemetry_period.is_finite() && sim.telemetry_period > 0.0) {
            return Err(ChoreoError::InvalidConfig(
                "simulation telemetry period must be positive".to_string(),
            ));
        }
        if sim.balance_thrust <= 0.0 {
            return Err(ChoreoError::InvalidConfig(
                "simulation balance thrust must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
