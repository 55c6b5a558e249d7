use choreo::{
    components::{DroneOutcome, FailureReason, Phase},
    systems::{FailurePolicy, PhaseResult},
    utils::ChoreoError,
};
use pretty_assertions::assert_eq;
use std::thread;
use std::time::{Duration, Instant};

use crate::common::{
    address, assert_barrier_respected, assert_log_ordered, assert_stopped, create_hover_plan,
    create_test_roster, phases_flown, FleetHarnessBuilder, Script,
};

const ALL: [Phase; 3] = [Phase::TakingOff, Phase::Pattern, Phase::Landing];

#[test]
fn test_all_drones_complete_sequence() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(3))
        .build();
    let report = harness.run();

    assert!(report.is_success());
    assert_eq!(report.exit_code(), 0);
    for id in 0..3 {
        assert_eq!(phases_flown(&report, id), ALL.to_vec());
        assert_eq!(report.outcomes[&id], DroneOutcome::Completed);
        assert_stopped(&harness.trace(&address(id)));
    }
    assert_barrier_respected(&report);
    assert_log_ordered(&harness.log);
}

#[test]
fn test_barrier_waits_for_slow_drone() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(3))
        .with_script(&address(1), Script::SendDelay(Duration::from_millis(15)))
        .build();
    let report = harness.run();

    assert!(report.is_success());
    assert_barrier_respected(&report);

    // the slow drone skipped ticks but every drone reported every phase
    assert!(report.reports_for(1).any(|r| r.overruns > 0));
    assert_eq!(report.phases.len(), 9);
}

#[test]
fn test_failed_drone_is_isolated() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(3))
        .with_script(&address(1), Script::FailAfter(2))
        .build();
    let report = harness.run();

    assert!(!report.aborted);
    assert_eq!(report.exit_code(), 2);
    assert_eq!(
        report.outcomes[&1],
        DroneOutcome::Disconnected(FailureReason::SendTimeout {
            phase: Phase::TakingOff,
            tick: 2,
        })
    );
    assert_eq!(phases_flown(&report, 1), vec![Phase::TakingOff]);

    for id in [0, 2] {
        assert_eq!(report.outcomes[&id], DroneOutcome::Completed);
        assert_eq!(phases_flown(&report, id), ALL.to_vec());
        assert_stopped(&harness.trace(&address(id)));
    }

    let failed = harness.trace(&address(1));
    assert_eq!(failed.sent.len(), 2);
    assert_eq!(failed.disconnects, 1);
}

#[test]
fn test_unreachable_drone_excluded_before_flight() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(3))
        .with_script(&address(2), Script::Unreachable)
        .build();
    let report = harness.run();

    assert_eq!(report.exit_code(), 2);
    assert_eq!(
        report.summary_lines(),
        vec![
            "drone 0: Completed",
            "drone 1: Completed",
            "drone 2: Disconnected: LinkUnavailable",
        ]
    );
    assert!(phases_flown(&report, 2).is_empty());
    assert_eq!(harness.log.drone_ids(), vec![0, 1]);
}

#[test]
fn test_abort_all_stops_every_drone() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(3))
        .with_policy(FailurePolicy::AbortAll)
        .with_script(&address(0), Script::FailAfter(8))
        .build();
    let report = harness.run();

    assert!(report.aborted);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        report.outcomes[&0],
        DroneOutcome::Disconnected(FailureReason::SendTimeout {
            phase: Phase::Pattern,
            tick: 3,
        })
    );
    for id in [1, 2] {
        assert_eq!(report.outcomes[&id], DroneOutcome::Aborted);
        assert_stopped(&harness.trace(&address(id)));
        let pattern = report
            .reports_for(id)
            .find(|r| r.phase == Phase::Pattern)
            .unwrap();
        assert_eq!(pattern.result, PhaseResult::Cancelled);
    }
    assert!(report.phases.iter().all(|r| r.phase != Phase::Landing));
}

#[test]
fn test_external_emergency_stop() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(2))
        .build();
    let stop = harness.fleet.as_ref().unwrap().emergency_stop_handle();

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        stop.trigger();
    });
    let report = harness.run();
    trigger.join().unwrap();

    assert!(report.aborted);
    assert_eq!(report.exit_code(), 1);
    for id in 0..2 {
        assert_eq!(report.outcomes[&id], DroneOutcome::Aborted);
        assert_stopped(&harness.trace(&address(id)));
    }
    assert!(report.phases.iter().all(|r| r.phase != Phase::Landing));
}

#[test]
fn test_emergency_stop_reaches_drone_waiting_at_barrier() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(2))
        .with_script(&address(1), Script::SendDelay(Duration::from_millis(500)))
        .build();
    let stop = harness.fleet.as_ref().unwrap().emergency_stop_handle();

    // drone 0 finishes takeoff in ~50ms and parks behind drone 1
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let fired = Instant::now();
        stop.trigger();
        fired
    });
    let report = harness.run();
    let fired = trigger.join().unwrap();

    assert!(report.aborted);
    for id in 0..2 {
        assert_eq!(report.outcomes[&id], DroneOutcome::Aborted);
    }

    let trace = harness.trace(&address(0));
    let (last, sent_at) = *trace.sent.last().unwrap();
    assert!(last.is_stop());
    let latency = sent_at.saturating_duration_since(fired);
    assert!(latency < Duration::from_millis(50), "stop took {:?}", latency);
    assert_eq!(trace.setpoints().iter().filter(|s| s.is_stop()).count(), 1);
    assert_stopped(&trace);
}

#[test]
fn test_teardown_in_id_order() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(4).into_iter().rev().collect())
        .build();
    harness.run();

    let closed: Vec<_> = (0..4)
        .map(|id| harness.trace(&address(id)).disconnected_at.unwrap())
        .collect();
    assert!(closed.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_landing_stop_not_repeated_at_release() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(1))
        .build();
    harness.run();

    let setpoints = harness.trace(&address(0)).setpoints();
    let stops = setpoints.iter().filter(|s| s.is_stop()).count();
    assert_eq!(stops, 1);
    assert!(setpoints.last().unwrap().is_stop());
}

#[test]
fn test_panicking_loop_reported_and_isolated() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(2))
        .with_script(&address(1), Script::PanicAt(3))
        .build();
    let report = harness.run();

    assert_eq!(report.outcomes[&0], DroneOutcome::Completed);
    assert_eq!(
        report.outcomes[&1],
        DroneOutcome::Disconnected(FailureReason::LoopPanicked {
            phase: Phase::TakingOff
        })
    );
    assert_stopped(&harness.trace(&address(1)));
}

#[test]
fn test_hover_phase_flown_when_configured() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(2))
        .with_plan(create_hover_plan())
        .build();
    let report = harness.run();

    assert!(report.is_success());
    assert_eq!(
        phases_flown(&report, 0),
        vec![Phase::TakingOff, Phase::Hovering, Phase::Pattern, Phase::Landing]
    );
    assert_barrier_respected(&report);
}

#[test]
fn test_non_flight_phase_rejected() {
    let mut harness = FleetHarnessBuilder::new()
        .with_drones(create_test_roster(1))
        .build();
    let fleet = harness.fleet.take().unwrap();
    let result = fleet.run_sequence(&[Phase::TakingOff, Phase::Disconnected]);

    assert!(matches!(result, Err(ChoreoError::InvalidPlan(_))));
    assert!(harness.trace(&address(0)).sent.is_empty());
}
