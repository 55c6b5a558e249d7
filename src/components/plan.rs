use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::components::Phase;
use crate::utils::{ChoreoError, Result};

/// Default control loop period (s)
pub const DEFAULT_TICK_INTERVAL: f64 = 0.1;

const FULL_TURN_DEGREES: u32 = 360;
const TIME_EPSILON: f64 = 1e-9;

/// Closed circular path flown in discrete angular steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternPlan {
    /// Circle radius (m)
    pub radius: f64,
    /// Time for the whole circle, pauses included (s)
    pub total_duration: f64,
    /// Angle between consecutive samples, must divide 360
    pub step_angle_degrees: u32,
    /// Zero-velocity hold after every step (s)
    pub pause_duration: f64,
}

impl Default for PatternPlan {
    fn default() -> Self {
        Self {
            radius: 0.6,          // m
            total_duration: 14.0, // s
            step_angle_degrees: 20,
            pause_duration: 0.2, // s
        }
    }
}

/// Planned state at one angular sample of the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub angle_degrees: u32,
    pub x: f64,
    pub y: f64,
    /// Feed-forward velocity (m/s)
    pub vx: f64,
    pub vy: f64,
}

impl PatternPlan {
    pub fn new(
        radius: f64,
        total_duration: f64,
        step_angle_degrees: u32,
        pause_duration: f64,
    ) -> Result<Self> {
        let plan = Self {
            radius,
            total_duration,
            step_angle_degrees,
            pause_duration,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<()> {
        if self.step_angle_degrees == 0 || FULL_TURN_DEGREES % self.step_angle_degrees != 0 {
            return Err(ChoreoError::InvalidPlan(format!(
                "step angle {}° does not evenly divide 360°",
                self.step_angle_degrees
            )));
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(ChoreoError::InvalidPlan(format!(
                "pattern radius must be non-negative, got {}",
                self.radius
            )));
        }
        if !(self.total_duration.is_finite() && self.total_duration > 0.0) {
            return Err(ChoreoError::InvalidPlan(format!(
                "pattern duration must be positive, got {}",
                self.total_duration
            )));
        }
        if !(self.pause_duration.is_finite() && self.pause_duration >= 0.0) {
            return Err(ChoreoError::InvalidPlan(format!(
                "pause duration must be non-negative, got {}",
                self.pause_duration
            )));
        }
        if self.move_time_per_step() <= 0.0 {
            return Err(ChoreoError::InvalidPlan(format!(
                "{} pauses of {}s leave no move time within {}s",
                self.sample_count(),
                self.pause_duration,
                self.total_duration
            )));
        }
        Ok(())
    }

    /// Samples on the closed path, both 0° and 360° included.
    pub fn sample_count(&self) -> usize {
        (FULL_TURN_DEGREES / self.step_angle_degrees.max(1)) as usize + 1
    }

    pub fn angles(&self) -> impl Iterator<Item = u32> {
        (0..=FULL_TURN_DEGREES).step_by(self.step_angle_degrees.max(1) as usize)
    }

    /// Uniform angular rate (rad/s)
    pub fn angular_rate(&self) -> f64 {
        2.0 * PI / self.total_duration
    }

    pub fn move_time_per_step(&self) -> f64 {
        let steps = self.sample_count() as f64;
        (self.total_duration - steps * self.pause_duration) / steps
    }

    /// Move plus pause for one sample (s)
    pub fn step_period(&self) -> f64 {
        self.move_time_per_step() + self.pause_duration
    }

    /// Planned state for the `index`-th sample.
    pub fn waypoint(&self, index: usize) -> Waypoint {
        self.waypoint_at((index as u32 * self.step_angle_degrees).min(FULL_TURN_DEGREES))
    }

    /// Planned state at any angle on the circle, sampled or not.
    pub fn waypoint_at(&self, angle_degrees: u32) -> Waypoint {
        let rad = (angle_degrees as f64).to_radians();
        let speed = self.radius * self.angular_rate();

        Waypoint {
            angle_degrees,
            x: self.radius * rad.cos(),
            y: self.radius * rad.sin(),
            vx: -speed * rad.sin(),
            vy: speed * rad.cos(),
        }
    }

    pub fn waypoints(&self) -> Vec<Waypoint> {
        (0..self.sample_count()).map(|i| self.waypoint(i)).collect()
    }
}

/// Open-loop profile used for takeoff, hover and landing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RampProfile {
    /// Altitude setpoints ramped between ground and target height.
    #[default]
    Hover,
    /// Raw thrust: constant on the way up, decreasing by `ramp_step` per tick on the way down.
    Thrust { hover_thrust: f64, ramp_step: f64 },
}

impl RampProfile {
    pub fn thrust_defaults() -> Self {
        RampProfile::Thrust {
            hover_thrust: 40000.0,
            ramp_step: 500.0,
        }
    }
}

/// Everything the trajectory generator needs besides the drone itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightPlan {
    /// Control loop period (s)
    pub tick_interval: f64,
    pub takeoff_duration: f64,
    /// Height hold between takeoff and pattern, skipped when zero (s)
    pub hover_duration: f64,
    pub landing_duration: f64,
    /// Altitude the hover landing ramp ends at before the stop command (m)
    pub landing_height: f64,
    pub ramp: RampProfile,
    pub pattern: PatternPlan,
}

impl Default for FlightPlan {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            takeoff_duration: 2.0,
            hover_duration: 0.0,
            landing_duration: 2.0,
            landing_height: 0.2,
            ramp: RampProfile::Hover,
            pattern: PatternPlan::default(),
        }
    }
}

impl FlightPlan {
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_interval.is_finite() && self.tick_interval > 0.0) {
            return Err(ChoreoError::InvalidPlan(format!(
                "tick interval must be positive, got {}",
                self.tick_interval
            )));
        }
        for (name, value) in [
            ("takeoff", self.takeoff_duration),
            ("landing", self.landing_duration),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ChoreoError::InvalidPlan(format!(
                    "{} duration must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.hover_duration.is_finite() && self.hover_duration >= 0.0) {
            return Err(ChoreoError::InvalidPlan(format!(
                "hover duration must be non-negative, got {}",
                self.hover_duration
            )));
        }
        if !(self.landing_height.is_finite() && self.landing_height >= 0.0) {
            return Err(ChoreoError::InvalidPlan(format!(
                "landing height must be non-negative, got {}",
                self.landing_height
            )));
        }
        if let RampProfile::Thrust {
            hover_thrust,
            ramp_step,
        } = self.ramp
        {
            if !(hover_thrust.is_finite() && hover_thrust >= 0.0)
                || !(ramp_step.is_finite() && ramp_step >= 0.0)
            {
                return Err(ChoreoError::InvalidPlan(format!(
                    "thrust ramp needs non-negative values, got {} / {}",
                    hover_thrust, ramp_step
                )));
            }
        }

        for phase in [Phase::TakingOff, Phase::Landing] {
            if self.tick_count(phase) == 0 {
                return Err(ChoreoError::InvalidPlan(format!(
                    "{} lasts less than one tick of {}s",
                    phase, self.tick_interval
                )));
            }
        }
        if self.hover_duration > 0.0 && self.tick_count(Phase::Hovering) == 0 {
            return Err(ChoreoError::InvalidPlan(format!(
                "hover of {}s lasts less than one tick of {}s",
                self.hover_duration, self.tick_interval
            )));
        }

        self.pattern.validate()?;
        if self.pattern.move_time_per_step() + TIME_EPSILON < self.tick_interval {
            return Err(ChoreoError::InvalidPlan(format!(
                "pattern move time {:.3}s is shorter than one tick of {}s",
                self.pattern.move_time_per_step(),
                self.tick_interval
            )));
        }
        Ok(())
    }

    /// Nominal length of a phase (s)
    pub fn phase_duration(&self, phase: Phase) -> f64 {
        match phase {
            Phase::TakingOff => self.takeoff_duration,
            Phase::Hovering => self.hover_duration,
            Phase::Pattern => self.pattern.total_duration,
            Phase::Landing => self.landing_duration,
            Phase::Idle | Phase::Disconnected => 0.0,
        }
    }

    /// Number of setpoints a loop sends for `phase`.
    ///
    /// Ramps are time-sliced, `round(duration / tick)`. The pattern runs until
    /// the angle sweep is exhausted, i.e. every tick whose start lies before
    /// `total_duration`.
    pub fn tick_count(&self, phase: Phase) -> u64 {
        let ticks = self.phase_duration(phase) / self.tick_interval;
        match phase {
            Phase::Pattern => (ticks - TIME_EPSILON).ceil().max(0.0) as u64,
            _ => ticks.round() as u64,
        }
    }

    /// Index of the tick that starts at `elapsed` seconds into a phase.
    pub fn tick_index(&self, elapsed: f64) -> u64 {
        (elapsed / self.tick_interval + TIME_EPSILON).floor().max(0.0) as u64
    }

    /// Phases flown by every drone, in order.
    pub fn phase_sequence(&self) -> Vec<Phase> {
        let mut phases = vec![Phase::TakingOff];
        if self.tick_count(Phase::Hovering) > 0 {
            phases.push(Phase::Hovering);
        }
        phases.push(Phase::Pattern);
        phases.push(Phase::Landing);
        phases
    }
}
