use approx::assert_relative_eq;
use choreo::{
    components::{DroneOutcome, FailureReason, Phase, RampProfile},
    config::MissionConfig,
    link::{SimConfig, SimFault, SimulatedConnector},
    resources::{CsvTelemetryLog, LogRecord},
    systems::Fleet,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{create_quick_plan, create_test_roster};

fn quick_mission(dir: &TempDir) -> MissionConfig {
    MissionConfig {
        drones: create_test_roster(3),
        plan: create_quick_plan(),
        telemetry_log: Some(dir.path().join("telemetry.csv")),
        simulation: SimConfig {
            telemetry_period: 0.01,
            ..SimConfig::default()
        },
        ..MissionConfig::default()
    }
}

fn fly(config: &MissionConfig) -> (choreo::systems::FleetReport, Vec<LogRecord>) {
    let path = config.telemetry_log.clone().unwrap();
    let logger = Arc::new(CsvTelemetryLog::create(&path).unwrap());
    let fleet = Fleet::connect(
        &SimulatedConnector::new(config.simulation.clone()),
        config.drones.clone(),
        config.plan,
        config.failure_policy,
        logger,
    )
    .unwrap();
    let report = fleet.run_sequence(&config.plan.phase_sequence()).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["timestamp", "drone_id", "x", "y", "z"]
    );
    let records = reader.deserialize().collect::<Result<Vec<_>, _>>().unwrap();
    (report, records)
}

#[test]
fn test_simulated_mission_logs_every_drone() {
    let dir = TempDir::new().unwrap();
    let (report, records) = fly(&quick_mission(&dir));

    assert!(report.is_success());
    for id in 0..3 {
        let stamps: Vec<f64> = records
            .iter()
            .filter(|r| r.drone_id == id)
            .map(|r| r.timestamp)
            .collect();
        assert!(stamps.len() > 5, "drone {} logged {} samples", id, stamps.len());
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
    }
    assert!(records.iter().all(|r| r.z >= 0.0));
}

#[test]
fn test_unreachable_simulated_drone_absent_from_log() {
    let dir = TempDir::new().unwrap();
    let mut config = quick_mission(&dir);
    config
        .simulation
        .faults
        .insert(config.drones[1].address.clone(), SimFault::Unreachable);
    let (report, records) = fly(&config);

    assert_eq!(report.exit_code(), 2);
    assert!(matches!(
        report.outcomes[&1],
        DroneOutcome::Disconnected(FailureReason::LinkUnavailable { .. })
    ));
    assert!(records.iter().all(|r| r.drone_id != 1));
    assert!(records.iter().any(|r| r.drone_id == 0));
    assert!(records.iter().any(|r| r.drone_id == 2));
}

#[test]
fn test_telemetry_dropout_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = quick_mission(&dir);
    config
        .simulation
        .faults
        .insert(config.drones[0].address.clone(), SimFault::TelemetryDropout);
    let (report, records) = fly(&config);

    assert!(report.is_success());
    assert!(records.iter().all(|r| r.drone_id != 0));
    assert_eq!(report.reports_for(0).count(), 3);
    assert!(report.reports_for(0).all(|r| r.telemetry_gaps > 0));
}

#[test]
fn test_thrust_ramp_mission() {
    let dir = TempDir::new().unwrap();
    let mut config = quick_mission(&dir);
    config.plan.ramp = RampProfile::thrust_defaults();
    let (report, _) = fly(&config);

    assert!(report.is_success());
    let landing = report
        .reports_for(2)
        .find(|r| r.phase == Phase::Landing)
        .unwrap();
    // ramp ticks plus the terminal stop
    assert_eq!(landing.ticks_sent, 6);
}

#[test]
fn test_report_serialises_to_json() {
    let dir = TempDir::new().unwrap();
    let (report, _) = fly(&quick_mission(&dir));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["aborted"], false);
    assert_eq!(json["outcomes"]["0"], "Completed");
    assert_eq!(json["sequence"][1], "Pattern");
    assert_eq!(json["phases"].as_array().unwrap().len(), 9);

    let takeoff = &json["phases"][0];
    let started = takeoff["started_at"].as_f64().unwrap();
    let finished = takeoff["finished_at"].as_f64().unwrap();
    assert!(started >= 0.0 && finished > started);
}

#[test]
fn test_default_mission_pattern_samples() {
    let config = MissionConfig::default();
    let waypoints = config.plan.pattern.waypoints();
    assert_eq!(waypoints.len(), 19);
    assert_eq!(waypoints[0].angle_degrees, 0);
    assert_eq!(waypoints[18].angle_degrees, 360);

    let quarter = config.plan.pattern.waypoint_at(90);
    assert_relative_eq!(quarter.x, 0.0, epsilon = 1e-9);
    assert_relative_eq!(quarter.y, 0.6, epsilon = 1e-9);
    assert_relative_eq!(quarter.vx, -0.2693, epsilon = 1e-4);
    assert_relative_eq!(quarter.vy, 0.0, epsilon = 1e-9);
}
