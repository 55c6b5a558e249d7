use crossbeam_channel::{at, bounded, select, Sender};
use nalgebra::Vector3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{FlightLink, LinkConnector, TelemetryCallback, TelemetrySample};
use crate::components::{ControlMode, Setpoint};
use crate::utils::{vehicle_noise, LinkError};

/// Behaviour of the simulated vehicles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Telemetry period (s)
    pub telemetry_period: f64,
    /// First-order altitude response in hover mode (1/s)
    pub altitude_response: f64,
    /// Thrust that exactly balances weight
    pub balance_thrust: f64,
    /// Vertical speed per unit of relative excess thrust (m/s)
    pub thrust_climb_rate: f64,
    /// Uniform noise added to every reported axis (m)
    pub position_noise: f64,
    pub seed: u64,
    /// Faults injected per link address
    pub faults: BTreeMap<String, SimFault>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            telemetry_period: 0.1,   // s
            altitude_response: 3.0,  // 1/s
            balance_thrust: 36000.0, // raw
            thrust_climb_rate: 5.0,  // m/s
            position_noise: 0.0,     // m
            seed: 0,
            faults: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimFault {
    /// `connect` fails.
    Unreachable,
    /// Every send after the first `sends` times out.
    SendTimeoutAfter { sends: u64 },
    /// Subscription succeeds but no sample is ever delivered.
    TelemetryDropout,
}

/// Kinematic point-mass vehicle, integrated lazily whenever it is touched.
#[derive(Debug, Clone)]
struct SimVehicle {
    position: Vector3<f64>,
    command: Setpoint,
    updated: Instant,
}

impl SimVehicle {
    fn on_ground(now: Instant) -> Self {
        Self {
            position: Vector3::zeros(),
            command: Setpoint::stop(),
            updated: now,
        }
    }

    fn advance(&mut self, now: Instant, config: &SimConfig) {
        let dt = now.saturating_duration_since(self.updated).as_secs_f64();
        self.updated = now;
        if dt <= 0.0 {
            return;
        }

        let command = self.command;
        match command.mode {
            ControlMode::Hover => {
                self.position.x += command.vx * dt;
                self.position.y += command.vy * dt;
                let blend = 1.0 - (-config.altitude_response * dt).exp();
                self.position.z += (command.z - self.position.z) * blend;
            }
            ControlMode::Thrust => {
                let excess = command.z / config.balance_thrust - 1.0;
                self.position.z += excess * config.thrust_climb_rate * dt;
            }
        }
        self.position.z = self.position.z.max(0.0);
    }
}

fn lock(vehicle: &Mutex<SimVehicle>) -> std::sync::MutexGuard<'_, SimVehicle> {
    vehicle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opens [`SimulatedLink`]s; addresses listed as unreachable fail to connect.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    config: SimConfig,
}

impl SimulatedConnector {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl LinkConnector for SimulatedConnector {
    type Link = SimulatedLink;

    fn connect(&self, address: &str) -> Result<SimulatedLink, LinkError> {
        let fault = self.config.faults.get(address).cloned();
        if fault == Some(SimFault::Unreachable) {
            return Err(LinkError::Unavailable(format!("{} did not answer", address)));
        }
        info!(address, "simulated link connected");
        Ok(SimulatedLink::new(
            address,
            self.config.clone(),
            vehicle_noise(self.config.seed, address),
            fault,
        ))
    }
}

/// In-process stand-in for a radio link.
pub struct SimulatedLink {
    address: String,
    config: SimConfig,
    vehicle: Arc<Mutex<SimVehicle>>,
    epoch: Instant,
    fault: Option<SimFault>,
    sends: u64,
    connected: bool,
    rng: Option<ChaCha8Rng>,
    telemetry: Option<(Sender<()>, JoinHandle<()>)>,
}

impl SimulatedLink {
    pub fn new(
        address: &str,
        config: SimConfig,
        rng: ChaCha8Rng,
        fault: Option<SimFault>,
    ) -> Self {
        let epoch = Instant::now();
        Self {
            address: address.to_string(),
            config,
            vehicle: Arc::new(Mutex::new(SimVehicle::on_ground(epoch))),
            epoch,
            fault,
            sends: 0,
            connected: true,
            rng: Some(rng),
            telemetry: None,
        }
    }

    /// Current simulated position.
    pub fn position(&self) -> Vector3<f64> {
        let mut vehicle = lock(&self.vehicle);
        vehicle.advance(Instant::now(), &self.config);
        vehicle.position
    }

    pub fn sends(&self) -> u64 {
        self.sends
    }
}

impl FlightLink for SimulatedLink {
    fn send(&mut self, setpoint: &Setpoint) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::Disconnected);
        }
        self.sends += 1;
        if let Some(SimFault::SendTimeoutAfter { sends }) = self.fault {
            if self.sends > sends {
                return Err(LinkError::SendTimeout);
            }
        }

        let mut vehicle = lock(&self.vehicle);
        vehicle.advance(Instant::now(), &self.config);
        vehicle.command = *setpoint;
        Ok(())
    }

    fn subscribe(&mut self, mut on_telemetry: TelemetryCallback) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::Disconnected);
        }
        if self.telemetry.is_some() {
            return Err(LinkError::Subscribe(format!(
                "{} already has a subscriber",
                self.address
            )));
        }
        if self.fault == Some(SimFault::TelemetryDropout) {
            debug!(address = %self.address, "telemetry dropout injected");
            return Ok(());
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let vehicle = Arc::clone(&self.vehicle);
        let config = self.config.clone();
        let epoch = self.epoch;
        let mut rng = self
            .rng
            .take()
            .ok_or_else(|| LinkError::Subscribe("noise stream already taken".to_string()))?;
        let period = Duration::from_secs_f64(config.telemetry_period);

        let handle = thread::Builder::new()
            .name(format!("telemetry {}", self.address))
            .spawn(move || {
                let mut next = Instant::now() + period;
                loop {
                    let timeout = at(next);
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(timeout) -> _ => {}
                    }
                    let now = Instant::now();
                    let mut position = {
                        let mut vehicle = lock(&vehicle);
                        vehicle.advance(now, &config);
                        vehicle.position
                    };
                    if config.position_noise > 0.0 {
                        let a = config.position_noise;
                        position += Vector3::new(
                            rng.gen_range(-a..=a),
                            rng.gen_range(-a..=a),
                            rng.gen_range(-a..=a),
                        );
                    }
                    on_telemetry(TelemetrySample {
                        timestamp: now.saturating_duration_since(epoch).as_secs_f64(),
                        position,
                    });
                    next += period;
                }
            })
            .map_err(|e| LinkError::Subscribe(e.to_string()))?;

        self.telemetry = Some((stop_tx, handle));
        Ok(())
    }

    fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        if let Some((stop_tx, handle)) = self.telemetry.take() {
            drop(stop_tx);
            if handle.join().is_err() {
                warn!(address = %self.address, "telemetry thread panicked");
            }
        }
        info!(address = %self.address, sends = self.sends, "simulated link closed");
    }
}

impl Drop for SimulatedLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}
