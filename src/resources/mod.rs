mod cancel;
mod telemetry;
mod time;

pub use cancel::EmergencyStop;
pub use telemetry::{CsvTelemetryLog, LogRecord, MemoryTelemetryLog, TelemetryLogger};
pub use time::{MissionClock, TickSchedule};
