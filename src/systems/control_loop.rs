use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    components::{DroneConfig, DroneId, FailureReason, Phase, Setpoint},
    link::{FlightLink, TelemetrySample},
    resources::{EmergencyStop, LogRecord, MissionClock, TelemetryLogger, TickSchedule},
    systems::TrajectoryGenerator,
    utils::LinkError,
};

/// How a single phase ended for one drone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PhaseResult {
    Completed,
    Failed(FailureReason),
    /// Interrupted by the fleet emergency stop.
    Cancelled,
}

/// What one control loop reports to the synchronizer after a phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub drone_id: DroneId,
    pub phase: Phase,
    pub result: PhaseResult,
    /// Setpoints accepted by the link, terminal stop included
    pub ticks_sent: u64,
    /// Ticks skipped because the loop woke past their window
    pub overruns: u64,
    /// Ticks during which no telemetry arrived
    pub telemetry_gaps: u64,
    /// Mission clock at phase start (s)
    pub started_at: f64,
    /// Mission clock at phase end (s)
    pub finished_at: f64,
    #[serde(skip)]
    pub started: Instant,
    #[serde(skip)]
    pub finished: Instant,
}

impl PhaseReport {
    fn begin(drone_id: DroneId, phase: Phase, clock: &MissionClock) -> Self {
        let now = Instant::now();
        Self {
            drone_id,
            phase,
            result: PhaseResult::Completed,
            ticks_sent: 0,
            overruns: 0,
            telemetry_gaps: 0,
            started_at: clock.seconds_at(now),
            finished_at: clock.seconds_at(now),
            started: now,
            finished: now,
        }
    }

    fn finish(mut self, result: PhaseResult, clock: &MissionClock) -> Self {
        self.result = result;
        self.finished = Instant::now();
        self.finished_at = clock.seconds_at(self.finished);
        self
    }

    /// Report for a phase the loop could not report on itself.
    pub(crate) fn failed(
        drone_id: DroneId,
        phase: Phase,
        reason: FailureReason,
        clock: &MissionClock,
    ) -> Self {
        Self::begin(drone_id, phase, clock).finish(PhaseResult::Failed(reason), clock)
    }
}

/// Forwards link telemetry into the shared log on the link's own thread.
struct TelemetryForwarder {
    drone_id: DroneId,
    logger: Arc<dyn TelemetryLogger>,
    clock: MissionClock,
    received: Arc<AtomicU64>,
    last_vehicle_stamp: Option<f64>,
    last_logged: f64,
}

impl TelemetryForwarder {
    fn on_sample(&mut self, sample: TelemetrySample) {
        if let Some(last) = self.last_vehicle_stamp {
            if sample.timestamp <= last {
                debug!(
                    drone_id = self.drone_id,
                    stamp = sample.timestamp,
                    "dropping out-of-order telemetry sample"
                );
                return;
            }
        }
        self.last_vehicle_stamp = Some(sample.timestamp);
        self.received.fetch_add(1, Ordering::Relaxed);

        // per-drone stream must stay strictly increasing
        let mut stamp = self.clock.now();
        if stamp <= self.last_logged {
            stamp = self.last_logged + 1e-9;
        }
        self.last_logged = stamp;
        self.logger
            .record(LogRecord::new(stamp, self.drone_id, &sample.position));
    }
}

/// Drives one vehicle's link at a fixed cadence for the phase it is told to fly.
///
/// The loop is the only owner of its link. It never changes phase on its own
/// except to enter [`Phase::Disconnected`] after a fatal link failure.
pub struct DroneControlLoop<L: FlightLink> {
    drone: DroneConfig,
    link: Option<L>,
    phase: Phase,
    generator: Arc<TrajectoryGenerator>,
    stop: EmergencyStop,
    clock: MissionClock,
    telemetry_received: Arc<AtomicU64>,
    last_sent: Option<Setpoint>,
}

impl<L: FlightLink> DroneControlLoop<L> {
    /// Takes ownership of `link` and subscribes its telemetry to `logger`.
    pub fn new(
        drone: DroneConfig,
        mut link: L,
        generator: Arc<TrajectoryGenerator>,
        logger: Arc<dyn TelemetryLogger>,
        clock: MissionClock,
        stop: EmergencyStop,
    ) -> Self {
        let received = Arc::new(AtomicU64::new(0));
        let mut forwarder = TelemetryForwarder {
            drone_id: drone.id,
            logger,
            clock,
            received: Arc::clone(&received),
            last_vehicle_stamp: None,
            last_logged: f64::NEG_INFINITY,
        };
        if let Err(e) = link.subscribe(Box::new(move |sample| forwarder.on_sample(sample))) {
            warn!(drone_id = drone.id, error = %e, "telemetry subscription failed, flying without position log");
        }

        Self {
            drone,
            link: Some(link),
            phase: Phase::Idle,
            generator,
            stop,
            clock,
            telemetry_received: received,
            last_sent: None,
        }
    }

    pub fn id(&self) -> DroneId {
        self.drone.id
    }

    pub fn drone(&self) -> &DroneConfig {
        &self.drone
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn clock(&self) -> &MissionClock {
        &self.clock
    }

    pub fn emergency_stop(&self) -> &EmergencyStop {
        &self.stop
    }

    /// Telemetry samples accepted so far.
    pub fn telemetry_received(&self) -> u64 {
        self.telemetry_received.load(Ordering::Relaxed)
    }

    /// Flies `phase` to completion, failure or emergency stop.
    pub fn run_phase(&mut self, phase: Phase) -> PhaseReport {
        let report = PhaseReport::begin(self.drone.id, phase, &self.clock);
        if self.link.is_none() || self.phase == Phase::Disconnected {
            return report.finish(
                PhaseResult::Failed(FailureReason::LinkLost { phase, tick: 0 }),
                &self.clock,
            );
        }

        self.phase = phase;
        let plan = *self.generator.plan();
        let ticks = plan.tick_count(phase);
        let schedule = TickSchedule::start_now(plan.tick_interval);
        info!(drone_id = self.drone.id, %phase, ticks, "phase started");

        let mut report = report;
        let mut tick = 0;
        let mut seen = self.telemetry_received();
        let mut pattern_step = None;

        while tick < ticks {
            if self.stop.is_triggered() {
                return self.cancel(report, tick);
            }

            let elapsed = schedule.tick_time(tick);
            let setpoint = self.generator.next_setpoint(phase, elapsed, &self.drone);
            if let Err(e) = self.transmit(&setpoint) {
                return self.fail(report, e, tick);
            }
            report.ticks_sent += 1;

            if phase == Phase::Pattern {
                let step = self.generator.pattern_step(elapsed);
                if step.is_some() && step != pattern_step {
                    let waypoint = self.generator.plan().pattern.waypoint(step.unwrap_or(0));
                    debug!(
                        drone_id = self.drone.id,
                        angle = waypoint.angle_degrees,
                        x = waypoint.x,
                        y = waypoint.y,
                        "pattern step"
                    );
                }
                pattern_step = step;
            }

            tick += 1;
            if !self.stop.sleep_until(schedule.deadline(tick)) {
                return self.cancel(report, tick);
            }

            let received = self.telemetry_received();
            if received == seen {
                report.telemetry_gaps += 1;
                debug!(drone_id = self.drone.id, %phase, tick, "no telemetry during tick");
            }
            seen = received;

            let current = schedule.current_tick(Instant::now());
            if current > tick {
                let skipped = current - tick;
                report.overruns += skipped;
                warn!(drone_id = self.drone.id, %phase, tick, skipped, "control loop overran, skipping ticks");
                tick = current;
            }
        }

        if let Some(terminal) = self.generator.terminal_setpoint(phase) {
            if let Err(e) = self.transmit(&terminal) {
                return self.fail(report, e, tick);
            }
            report.ticks_sent += 1;
        }

        if report.telemetry_gaps > 0 {
            warn!(
                drone_id = self.drone.id,
                %phase,
                gaps = report.telemetry_gaps,
                "telemetry gaps during phase"
            );
        }
        info!(
            drone_id = self.drone.id,
            %phase,
            sent = report.ticks_sent,
            overruns = report.overruns,
            "phase completed"
        );
        report.finish(PhaseResult::Completed, &self.clock)
    }

    /// Cuts the motors between phases, when the emergency stop fires while
    /// the loop is waiting for its next command.
    pub fn halt(&mut self) {
        if !self.needs_stop() {
            return;
        }
        warn!(
            drone_id = self.drone.id,
            phase = %self.phase,
            "emergency stop while idle, cutting motors"
        );
        if let Err(e) = self.transmit(&Setpoint::stop()) {
            error!(drone_id = self.drone.id, error = %e, "emergency stop not acknowledged");
        }
    }

    /// Sends a final stop if the vehicle has not had one, then closes the link.
    pub fn release(&mut self) {
        let needs_stop = self.needs_stop();
        if let Some(mut link) = self.link.take() {
            if needs_stop {
                if let Err(e) = link.send(&Setpoint::stop()) {
                    warn!(drone_id = self.drone.id, error = %e, "stop before disconnect not acknowledged");
                }
            }
            link.disconnect();
            info!(drone_id = self.drone.id, "link released");
        }
        if self.phase != Phase::Disconnected {
            self.phase = Phase::Idle;
        }
    }

    fn needs_stop(&self) -> bool {
        self.link.is_some()
            && self.phase != Phase::Disconnected
            && !self.last_sent.map_or(true, |s| s.is_stop())
    }

    fn transmit(&mut self, setpoint: &Setpoint) -> Result<(), LinkError> {
        let link = self.link.as_mut().ok_or(LinkError::Disconnected)?;
        link.send(setpoint)?;
        self.last_sent = Some(*setpoint);
        Ok(())
    }

    fn fail(&mut self, report: PhaseReport, err: LinkError, tick: u64) -> PhaseReport {
        let phase = report.phase;
        let reason = match err {
            LinkError::SendTimeout => FailureReason::SendTimeout { phase, tick },
            _ => FailureReason::LinkLost { phase, tick },
        };
        error!(drone_id = self.drone.id, %phase, tick, error = %err, "link failure, drone leaves the flight");

        if let Some(link) = self.link.as_mut() {
            if let Err(e) = link.send(&Setpoint::stop()) {
                debug!(drone_id = self.drone.id, error = %e, "best-effort stop failed");
            }
        }
        self.phase = Phase::Disconnected;
        report.finish(PhaseResult::Failed(reason), &self.clock)
    }

    fn cancel(&mut self, report: PhaseReport, tick: u64) -> PhaseReport {
        warn!(drone_id = self.drone.id, phase = %report.phase, tick, "emergency stop, cutting motors");
        if let Err(e) = self.transmit(&Setpoint::stop()) {
            error!(drone_id = self.drone.id, error = %e, "emergency stop not acknowledged");
        }
        report.finish(PhaseResult::Cancelled, &self.clock)
    }
}
