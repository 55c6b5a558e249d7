use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::components::DroneId;
use crate::utils::{ChoreoError, Result};

/// One telemetry sample as persisted: `timestamp, drone_id, x, y, z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Mission clock (s)
    pub timestamp: f64,
    pub drone_id: DroneId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LogRecord {
    pub fn new(timestamp: f64, drone_id: DroneId, position: &Vector3<f64>) -> Self {
        Self {
            timestamp,
            drone_id,
            x: position.x,
            y: position.y,
            z: position.z,
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Append-only telemetry sink shared by every control loop.
///
/// `record` is called from link delivery threads and must never fail or
/// block for long; persistence problems are the sink's own business.
pub trait TelemetryLogger: Send + Sync {
    fn record(&self, record: LogRecord);

    fn flush(&self) {}
}

/// CSV sink, one row per sample, serialised behind a single lock.
pub struct CsvTelemetryLog<W: Write> {
    writer: Mutex<csv::Writer<W>>,
    write_failures: AtomicU64,
}

impl CsvTelemetryLog<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_writer_inner(csv::Writer::from_path(path)?))
    }
}

impl<W: Write> CsvTelemetryLog<W> {
    pub fn from_writer(writer: W) -> Self {
        Self::from_writer_inner(csv::Writer::from_writer(writer))
    }

    fn from_writer_inner(writer: csv::Writer<W>) -> Self {
        Self {
            writer: Mutex::new(writer),
            write_failures: AtomicU64::new(0),
        }
    }

    /// Samples that could not be persisted.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> Result<W> {
        let writer = self
            .writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        writer.into_inner().map_err(|e| {
            ChoreoError::Io(std::io::Error::new(e.error().kind(), e.error().to_string()))
        })
    }
}

impl<W: Write + Send> TelemetryLogger for CsvTelemetryLog<W> {
    fn record(&self, record: LogRecord) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writer
            .serialize(record)
            .and_then(|_| writer.flush().map_err(csv::Error::from));

        if let Err(e) = result {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            warn!(drone_id = record.drone_id, error = %e, "failed to persist telemetry sample");
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.flush() {
            warn!(error = %e, "failed to flush telemetry log");
        }
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryTelemetryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryTelemetryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn for_drone(&self, drone_id: DroneId) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.drone_id == drone_id)
            .collect()
    }

    /// Distinct drone ids present in the log, ascending.
    pub fn drone_ids(&self) -> Vec<DroneId> {
        let mut ids: Vec<DroneId> = self.records().iter().map(|r| r.drone_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

impl TelemetryLogger for MemoryTelemetryLog {
    fn record(&self, record: LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
