use choreo::components::{DroneConfig, FlightPlan, PatternPlan};

/// Address of drone `id` on the mock radio.
pub fn address(id: u32) -> String {
    format!("radio://0/{}/2M", 80 + id)
}

/// Roster of `count` drones stacked 0.3 m apart.
pub fn create_test_roster(count: u32) -> Vec<DroneConfig> {
    (0..count)
        .map(|id| DroneConfig::new(id, address(id), 0.5 + 0.3 * id as f64))
        .collect()
}

/// Short plan so a whole sequence flies in well under a second.
pub fn create_quick_plan() -> FlightPlan {
    FlightPlan {
        tick_interval: 0.01,
        takeoff_duration: 0.05,
        hover_duration: 0.0,
        landing_duration: 0.05,
        pattern: PatternPlan {
            radius: 0.6,
            total_duration: 0.2,
            step_angle_degrees: 90,
            pause_duration: 0.01,
        },
        ..FlightPlan::default()
    }
}

/// Quick plan including a hover phase.
pub fn create_hover_plan() -> FlightPlan {
    FlightPlan {
        hover_duration: 0.05,
        ..create_quick_plan()
    }
}
