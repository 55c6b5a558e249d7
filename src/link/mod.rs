//! Flight link interface: the radio side of the engine.
//!
//! The engine only ever talks to vehicles through these traits. A link is
//! opened by a [`LinkConnector`], handed to exactly one control loop, and
//! released by that loop at teardown.

mod sim;

use nalgebra::Vector3;

use crate::components::Setpoint;
use crate::utils::LinkError;

pub use sim::{SimConfig, SimFault, SimulatedConnector, SimulatedLink};

/// Position report delivered by a vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Vehicle-side timestamp (s)
    pub timestamp: f64,
    pub position: Vector3<f64>,
}

pub type TelemetryCallback = Box<dyn FnMut(TelemetrySample) + Send + 'static>;

/// An open connection to one vehicle.
pub trait FlightLink: Send {
    /// Pushes one setpoint over the air.
    fn send(&mut self, setpoint: &Setpoint) -> Result<(), LinkError>;

    /// Registers the telemetry callback. Samples are delivered on a thread
    /// owned by the link, never on the caller's.
    fn subscribe(&mut self, on_telemetry: TelemetryCallback) -> Result<(), LinkError>;

    fn disconnect(&mut self);
}

impl<L: FlightLink + ?Sized> FlightLink for Box<L> {
    fn send(&mut self, setpoint: &Setpoint) -> Result<(), LinkError> {
        (**self).send(setpoint)
    }

    fn subscribe(&mut self, on_telemetry: TelemetryCallback) -> Result<(), LinkError> {
        (**self).subscribe(on_telemetry)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}

/// Opens links by address.
pub trait LinkConnector {
    type Link: FlightLink;

    fn connect(&self, address: &str) -> Result<Self::Link, LinkError>;
}
