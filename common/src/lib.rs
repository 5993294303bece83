//! Client core for a networked temperature/humidity sensor: the TCP session,
//! the polling pipeline with its bounded history, and the LED command path.
//! Front ends plug in through [`DisplaySink`].

pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod poller;
pub mod protocol;
pub mod reading;
pub mod session;
pub mod sink;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, LedInputMode, PollMode};
pub use controller::{set_led, ActionQueue, SensorController};
pub use error::{CommandError, ConfigError, ConnectionError, Error, ProtocolError, ValidationError};
pub use history::HistoryWindow;
pub use poller::{poll_once, run_periodic, sample, stop_signal, PollOutcome, Poller, PollerHandle};
pub use protocol::LedLevel;
pub use reading::Reading;
pub use session::{Connector, Endpoint, Session, TcpConnector, Transport};
pub use sink::{ChannelSink, DisplaySink, DisplaySinkPointer, SinkEvent};

use std::sync::{Arc, Mutex, PoisonError};

/// Convenience helper for passing the last of a value between threads. For example from the
/// poller thread to the UI thread, which picks it up on its next timer tick.
#[derive(Clone)]
pub struct ValueStore<T>(Arc<Mutex<Option<T>>>);

impl<T> Default for ValueStore<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }
}

impl<T> ValueStore<T> {
    /// Sets `value` as the last value, replacing one that was not taken yet.
    pub fn set(&self, value: T) {
        let mut data = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = data.insert(value);
    }

    /// Takes the stored value, leaving the store empty.
    pub fn take(&self) -> Option<T> {
        let mut data = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        data.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_store_keeps_only_the_last_value() {
        let store = ValueStore::default();
        let writer = store.clone();

        std::thread::spawn(move || {
            writer.set(1);
            writer.set(2);
        })
        .join()
        .unwrap();

        assert_eq!(store.take(), Some(2));
        assert_eq!(store.take(), None);
    }
}
