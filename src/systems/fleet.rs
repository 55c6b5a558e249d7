use chrono::{DateTime, Utc};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

use crate::{
    components::{DroneConfig, DroneId, DroneOutcome, FailureReason, FlightPlan, Phase},
    link::{FlightLink, LinkConnector},
    resources::{EmergencyStop, MissionClock, TelemetryLogger},
    systems::{DroneControlLoop, PhaseReport, PhaseResult, TrajectoryGenerator},
    utils::{ChoreoError, Result},
};

/// What the fleet does when one drone fails mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the failed drone, keep flying the rest.
    #[default]
    Isolate,
    /// First failure triggers the emergency stop for everyone.
    AbortAll,
}

/// Roster entry as seen by the synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub struct DroneRecord {
    pub config: DroneConfig,
    pub phase: Phase,
    /// Set once the drone's fate is known
    pub outcome: Option<DroneOutcome>,
}

impl DroneRecord {
    fn is_active(&self) -> bool {
        self.outcome.is_none() && self.phase != Phase::Disconnected
    }
}

enum LoopCommand {
    RunPhase(Phase),
    Shutdown,
}

/// Why an idle worker woke up.
enum Wake {
    Command(LoopCommand),
    Closed,
    Stop,
}

struct Worker<'scope> {
    id: DroneId,
    commands: Sender<LoopCommand>,
    handle: thread::ScopedJoinHandle<'scope, ()>,
}

/// Summary of one flight sequence.
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Phases requested, in order
    pub sequence: Vec<Phase>,
    pub outcomes: BTreeMap<DroneId, DroneOutcome>,
    pub phases: Vec<PhaseReport>,
    pub aborted: bool,
}

impl FleetReport {
    pub fn is_success(&self) -> bool {
        !self.aborted && self.outcomes.values().all(DroneOutcome::is_completed)
    }

    /// Process exit status: 0 all completed, 1 aborted, 2 drones lost.
    pub fn exit_code(&self) -> u8 {
        if self.aborted {
            1
        } else if self.is_success() {
            0
        } else {
            2
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|(id, outcome)| format!("drone {}: {}", id, outcome))
            .collect()
    }

    pub fn reports_for(&self, drone_id: DroneId) -> impl Iterator<Item = &PhaseReport> {
        self.phases.iter().filter(move |r| r.drone_id == drone_id)
    }
}

/// Runs every drone through the same phases in lockstep.
///
/// Each control loop gets its own thread for the whole sequence. A phase
/// starts for all active drones at once and the fleet only advances after
/// every one of them has reported back.
pub struct Fleet<L: FlightLink> {
    policy: FailurePolicy,
    stop: EmergencyStop,
    logger: Arc<dyn TelemetryLogger>,
    roster: BTreeMap<DroneId, DroneRecord>,
    // ascending drone id
    loops: Vec<DroneControlLoop<L>>,
}

impl<L: FlightLink> Fleet<L> {
    /// Validates the plan and roster, then opens one link per drone.
    ///
    /// Drones whose link cannot be opened are marked
    /// `Disconnected(LinkUnavailable)` and sit out the sequence.
    pub fn connect<C>(
        connector: &C,
        drones: Vec<DroneConfig>,
        plan: FlightPlan,
        policy: FailurePolicy,
        logger: Arc<dyn TelemetryLogger>,
    ) -> Result<Self>
    where
        C: LinkConnector<Link = L>,
    {
        let generator = Arc::new(TrajectoryGenerator::new(plan)?);
        validate_roster(&drones)?;

        let stop = EmergencyStop::new();
        let clock = MissionClock::start();
        let mut roster = BTreeMap::new();
        let mut loops = Vec::with_capacity(drones.len());

        let mut drones = drones;
        drones.sort_by_key(|d| d.id);
        for drone in drones {
            let mut record = DroneRecord {
                config: drone.clone(),
                phase: Phase::Idle,
                outcome: None,
            };
            match connector.connect(&drone.address) {
                Ok(link) => {
                    info!(drone_id = drone.id, address = %drone.address, "drone connected");
                    loops.push(DroneControlLoop::new(
                        drone.clone(),
                        link,
                        Arc::clone(&generator),
                        Arc::clone(&logger),
                        clock,
                        stop.clone(),
                    ));
                }
                Err(e) => {
                    warn!(drone_id = drone.id, address = %drone.address, error = %e, "drone excluded from flight");
                    record.phase = Phase::Disconnected;
                    record.outcome = Some(DroneOutcome::Disconnected(
                        FailureReason::LinkUnavailable {
                            detail: e.to_string(),
                        },
                    ));
                }
            }
            roster.insert(drone.id, record);
        }

        Ok(Self {
            policy,
            stop,
            logger,
            roster,
            loops,
        })
    }

    /// Handle that cuts every motor when triggered, from any thread.
    pub fn emergency_stop_handle(&self) -> EmergencyStop {
        self.stop.clone()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn roster(&self) -> impl Iterator<Item = &DroneRecord> {
        self.roster.values()
    }

    pub fn active_count(&self) -> usize {
        self.roster.values().filter(|r| r.is_active()).count()
    }

    /// Flies `phases` in order, then releases every link.
    pub fn run_sequence(mut self, phases: &[Phase]) -> Result<FleetReport> {
        if let Some(bad) = phases.iter().find(|p| !p.is_flight_phase()) {
            return Err(ChoreoError::InvalidPlan(format!(
                "{} is not a runnable phase",
                bad
            )));
        }

        let started_at = Utc::now();
        let loops = std::mem::take(&mut self.loops);
        info!(
            drones = loops.len(),
            phases = phases.len(),
            policy = ?self.policy,
            "flight sequence started"
        );

        let (report_tx, report_rx) = unbounded::<PhaseReport>();
        let mut reports = Vec::new();
        let mut aborted = false;

        thread::scope(|scope| {
            let workers: Vec<Worker<'_>> = loops
                .into_iter()
                .map(|control| {
                    let (commands, command_rx) = unbounded();
                    let report_tx = report_tx.clone();
                    let id = control.id();
                    let handle = scope.spawn(move || drive(control, command_rx, report_tx));
                    Worker {
                        id,
                        commands,
                        handle,
                    }
                })
                .collect();
            drop(report_tx);

            for &phase in phases {
                if self.stop.is_triggered() {
                    warn!(%phase, "emergency stop before phase start");
                    aborted = true;
                    break;
                }

                let mut expected = 0;
                for worker in &workers {
                    if !self.roster.get(&worker.id).map_or(false, DroneRecord::is_active) {
                        continue;
                    }
                    if worker.commands.send(LoopCommand::RunPhase(phase)).is_ok() {
                        if let Some(record) = self.roster.get_mut(&worker.id) {
                            record.phase = phase;
                        }
                        expected += 1;
                    } else {
                        self.mark_failed(worker.id, FailureReason::LoopPanicked { phase });
                    }
                }
                if expected == 0 {
                    warn!(%phase, "no drones left to fly");
                    break;
                }
                info!(%phase, drones = expected, "phase broadcast");

                // barrier
                for _ in 0..expected {
                    match report_rx.recv() {
                        Ok(report) => {
                            aborted |= self.absorb(&report);
                            reports.push(report);
                        }
                        Err(_) => {
                            error!(%phase, "every control loop is gone");
                            aborted = true;
                            break;
                        }
                    }
                }
                info!(%phase, "phase barrier released");

                if aborted {
                    break;
                }
            }

            for worker in workers {
                let _ = worker.commands.send(LoopCommand::Shutdown);
                if worker.handle.join().is_err() {
                    error!(drone_id = worker.id, "control loop panicked during release");
                }
            }
        });
        self.logger.flush();

        let mut outcomes = BTreeMap::new();
        for (id, record) in self.roster.iter_mut() {
            let outcome = record.outcome.take().unwrap_or(if aborted {
                DroneOutcome::Aborted
            } else {
                DroneOutcome::Completed
            });
            if record.phase != Phase::Disconnected {
                record.phase = Phase::Idle;
            }
            outcomes.insert(*id, outcome.clone());
            record.outcome = Some(outcome);
        }

        let report = FleetReport {
            started_at,
            finished_at: Utc::now(),
            sequence: phases.to_vec(),
            outcomes,
            phases: reports,
            aborted,
        };
        for line in report.summary_lines() {
            info!("{}", line);
        }
        Ok(report)
    }

    /// Records a phase report; returns true when the fleet must abort.
    fn absorb(&mut self, report: &PhaseReport) -> bool {
        match &report.result {
            PhaseResult::Completed => false,
            PhaseResult::Cancelled => true,
            PhaseResult::Failed(reason) => {
                self.mark_failed(report.drone_id, reason.clone());
                match self.policy {
                    FailurePolicy::Isolate => false,
                    FailurePolicy::AbortAll => {
                        if !self.stop.is_triggered() {
                            error!(drone_id = report.drone_id, "aborting fleet after drone failure");
                            self.stop.trigger();
                        }
                        true
                    }
                }
            }
        }
    }

    fn mark_failed(&mut self, drone_id: DroneId, reason: FailureReason) {
        if let Some(record) = self.roster.get_mut(&drone_id) {
            warn!(drone_id, %reason, "drone disconnected");
            record.phase = Phase::Disconnected;
            record.outcome = Some(DroneOutcome::Disconnected(reason));
        }
    }
}

impl<L: FlightLink> Drop for Fleet<L> {
    fn drop(&mut self) {
        // links never handed to a worker
        for control in self.loops.iter_mut() {
            control.release();
        }
    }
}

fn validate_roster(drones: &[DroneConfig]) -> Result<()> {
    if drones.is_empty() {
        return Err(ChoreoError::InvalidConfig("roster is empty".to_string()));
    }
    let mut ids = BTreeSet::new();
    for drone in drones {
        if !ids.insert(drone.id) {
            return Err(ChoreoError::InvalidConfig(format!(
                "duplicate drone id {}",
                drone.id
            )));
        }
        if !(drone.target_height.is_finite() && drone.target_height > 0.0) {
            return Err(ChoreoError::InvalidConfig(format!(
                "drone {} target height must be positive",
                drone.id
            )));
        }
    }
    Ok(())
}

/// Worker thread body: run commanded phases until told to shut down, then release.
///
/// While waiting for a command the worker also watches the emergency stop, so
/// a drone parked at the barrier cuts its motors as soon as the stop fires.
fn drive<L: FlightLink>(
    mut control: DroneControlLoop<L>,
    commands: Receiver<LoopCommand>,
    reports: Sender<PhaseReport>,
) {
    let id = control.id();
    let stop = control.emergency_stop().clone();
    let mut halted = false;

    loop {
        let wake = if halted {
            commands.recv().map_or(Wake::Closed, Wake::Command)
        } else {
            select! {
                recv(commands) -> command => command.map_or(Wake::Closed, Wake::Command),
                recv(stop.signal()) -> _ => Wake::Stop,
            }
        };

        match wake {
            Wake::Stop => {
                control.halt();
                halted = true;
            }
            Wake::Command(LoopCommand::RunPhase(phase)) => {
                let report = panic::catch_unwind(AssertUnwindSafe(|| control.run_phase(phase)))
                    .unwrap_or_else(|_| {
                        error!(drone_id = id, %phase, "control loop panicked");
                        let reason = FailureReason::LoopPanicked { phase };
                        PhaseReport::failed(id, phase, reason, control.clock())
                    });
                if reports.send(report).is_err() {
                    break;
                }
            }
            Wake::Command(LoopCommand::Shutdown) | Wake::Closed => break,
        }
    }
    control.release();
}
