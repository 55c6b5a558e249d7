mod mission;

pub use mission::MissionConfig;
