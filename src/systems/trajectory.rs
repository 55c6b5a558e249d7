use crate::components::{DroneConfig, FlightPlan, Phase, RampProfile, Setpoint};
use crate::utils::Result;

const TIME_EPSILON: f64 = 1e-9;

/// Converts phase progress into setpoints.
///
/// Holds nothing but a validated [`FlightPlan`]; every query is a pure
/// function of its arguments, so the same phase, elapsed time and drone
/// always give the same setpoint.
#[derive(Debug, Clone)]
pub struct TrajectoryGenerator {
    plan: FlightPlan,
}

impl TrajectoryGenerator {
    /// Fails with `InvalidPlan` before any vehicle moves.
    pub fn new(plan: FlightPlan) -> Result<Self> {
        plan.validate()?;
        Ok(Self { plan })
    }

    pub fn plan(&self) -> &FlightPlan {
        &self.plan
    }

    /// Setpoint for `drone` at `elapsed` seconds into `phase`.
    pub fn next_setpoint(&self, phase: Phase, elapsed: f64, drone: &DroneConfig) -> Setpoint {
        let height = drone.target_height;
        match phase {
            Phase::TakingOff => self.takeoff(elapsed, height),
            Phase::Hovering => self.hold(height),
            Phase::Pattern => self.pattern(elapsed, height),
            Phase::Landing => self.landing(elapsed, height),
            Phase::Idle | Phase::Disconnected => Setpoint::stop(),
        }
    }

    /// Command the link must accept once a phase's ticks are exhausted.
    pub fn terminal_setpoint(&self, phase: Phase) -> Option<Setpoint> {
        match phase {
            Phase::Landing => Some(Setpoint::stop()),
            _ => None,
        }
    }

    /// Pattern sample being flown at `elapsed`, `None` during a pause or after the sweep.
    pub fn pattern_step(&self, elapsed: f64) -> Option<usize> {
        let pattern = &self.plan.pattern;
        if elapsed + TIME_EPSILON >= pattern.total_duration {
            return None;
        }
        let period = pattern.step_period();
        let step = ((elapsed / period + TIME_EPSILON).floor() as usize)
            .min(pattern.sample_count() - 1);
        let offset = elapsed - step as f64 * period;
        (offset + TIME_EPSILON < pattern.move_time_per_step()).then_some(step)
    }

    fn hold(&self, height: f64) -> Setpoint {
        match self.plan.ramp {
            RampProfile::Hover => Setpoint::hold(height),
            RampProfile::Thrust { hover_thrust, .. } => Setpoint::thrust(hover_thrust),
        }
    }

    fn takeoff(&self, elapsed: f64, height: f64) -> Setpoint {
        let ticks = self.plan.tick_count(Phase::TakingOff).max(1);
        let tick = self.plan.tick_index(elapsed);
        let progress = ((tick + 1) as f64 / ticks as f64).min(1.0);

        match self.plan.ramp {
            RampProfile::Hover => Setpoint::hold(height * progress),
            RampProfile::Thrust { hover_thrust, .. } => Setpoint::thrust(hover_thrust),
        }
    }

    fn landing(&self, elapsed: f64, height: f64) -> Setpoint {
        let ticks = self.plan.tick_count(Phase::Landing).max(1);
        let tick = self.plan.tick_index(elapsed);
        if tick >= ticks {
            return Setpoint::stop();
        }
        let progress = (tick + 1) as f64 / ticks as f64;

        match self.plan.ramp {
            RampProfile::Hover => {
                let floor = self.plan.landing_height.min(height);
                Setpoint::hold(height - (height - floor) * progress)
            }
            RampProfile::Thrust {
                hover_thrust,
                ramp_step,
            } => Setpoint::thrust((hover_thrust - ramp_step * (tick + 1) as f64).max(0.0)),
        }
    }

    fn pattern(&self, elapsed: f64, height: f64) -> Setpoint {
        match self.pattern_step(elapsed) {
            Some(step) => {
                let waypoint = self.plan.pattern.waypoint(step);
                Setpoint::hover(waypoint.vx, waypoint.vy, 0.0, height)
            }
            // pause sub-phase damps overshoot between velocity commands
            None => Setpoint::hold(height),
        }
    }
}
