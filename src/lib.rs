//! Fleet flight choreography: fly several small aerial vehicles through the
//! same scripted sequence in lockstep, streaming open-loop setpoints at a
//! fixed rate and logging every position they report.

pub mod components;
pub mod config;
pub mod link;
pub mod resources;
pub mod systems;
pub mod utils;
