use crossbeam_channel::{at, bounded, select, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Fleet-wide emergency stop.
///
/// Nothing is ever sent on the channel: triggering drops the only sender, and
/// every clone of the receiver observes the disconnect at once, including
/// loops blocked in [`EmergencyStop::sleep_until`].
#[derive(Debug, Clone)]
pub struct EmergencyStop {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl EmergencyStop {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    pub fn trigger(&self) {
        let mut guard = self.trigger.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            tracing::warn!("emergency stop triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Becomes ready (disconnected) once the stop fires; for use in `select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Blocks until `deadline`. Returns `false` if the stop fired first.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let timeout = at(deadline);
        select! {
            recv(self.signal) -> _ => false,
            recv(timeout) -> _ => !self.is_triggered(),
        }
    }
}

impl Default for EmergencyStop {
    fn default() -> Self {
        Self::new()
    }
}
