// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{CommandError, ProtocolError};
use crate::history::HistoryWindow;
use crate::protocol;
use crate::reading::Reading;
use crate::session::Session;
use crate::sink::DisplaySinkPointer;

/// What a single poll produced.
#[derive(Debug)]
pub enum PollOutcome {
    /// The session was not connected; nothing was sent.
    Disconnected,
    /// A reading was received (and, for [`poll_once`], appended).
    Updated(Reading),
    /// The server answered something that is not a reading.
    Unparseable(ProtocolError),
    /// The exchange itself failed.
    Failed(CommandError),
}

/// Requests one reading from the server without touching any history.
pub fn sample(session: &Session) -> PollOutcome {
    if !session.is_connected() {
        return PollOutcome::Disconnected;
    }

    let response = match session.send_command(protocol::GET_TEMP) {
        Ok(response) => response,
        // Lost the race against a local disconnect.
        Err(CommandError::NotConnected) => return PollOutcome::Disconnected,
        Err(CommandError::Closed) if !session.is_connected() => return PollOutcome::Disconnected,
        Err(e) => return PollOutcome::Failed(e),
    };

    match protocol::parse_reading(&response) {
        Ok((temperature, humidity)) => PollOutcome::Updated(Reading::now(temperature, humidity)),
        Err(e) => PollOutcome::Unparseable(e),
    }
}

/// Requests one reading and appends it to `history` on success. Any other
/// outcome leaves `history` untouched.
pub fn poll_once(session: &Session, history: &mut HistoryWindow) -> PollOutcome {
    let outcome = sample(session);
    if let PollOutcome::Updated(reading) = &outcome {
        history.push(*reading);
    }
    outcome
}

/// Fired to end a [`run_periodic`] loop. Dropping it has the same effect.
pub struct StopHandle(Sender<()>);

impl StopHandle {
    pub fn stop(&self) {
        // Already stopped when the loop is gone.
        let _ = self.0.send(());
    }
}

/// Waited on by [`run_periodic`] between ticks.
pub struct StopSignal(Receiver<()>);

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (sender, receiver) = channel();
    (StopHandle(sender), StopSignal(receiver))
}

/// Calls `tick` every `interval` until `stop` fires. The first tick runs
/// immediately. Waiting happens on the stop channel, so a stop request is
/// noticed without sleeping out the interval.
pub fn run_periodic<F>(interval: Duration, stop: &StopSignal, mut tick: F)
where
    F: FnMut(),
{
    loop {
        tick();
        match stop.0.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Periodic acquisition of readings into a shared history window.
pub struct Poller {
    session: Arc<Session>,
    history: Arc<Mutex<HistoryWindow>>,
    sink: DisplaySinkPointer,
}

impl Poller {
    pub fn new(
        session: Arc<Session>,
        history: Arc<Mutex<HistoryWindow>>,
        sink: DisplaySinkPointer,
    ) -> Self {
        Self {
            session,
            history,
            sink,
        }
    }

    /// Polls once and publishes the result. The history lock is only held
    /// for the push, never across network I/O.
    pub fn tick(&self) -> PollOutcome {
        let outcome = sample(&self.session);
        match &outcome {
            PollOutcome::Disconnected => {}
            PollOutcome::Updated(reading) => {
                let snapshot = {
                    let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
                    history.push(*reading);
                    history.clone()
                };
                log::debug!(
                    "Temp: {:.2}°C, Humidity: {:.2}%",
                    reading.temperature_celsius(),
                    reading.humidity_percent()
                );
                self.sink.on_reading_update(&snapshot);
            }
            PollOutcome::Unparseable(e) => {
                log::warn!("Skipping poll: {e}");
                let message = format!("server response error: {}", e.raw());
                self.sink.on_status_change(self.session.is_connected(), &message);
            }
            PollOutcome::Failed(e) => {
                log::warn!("Polling failed: {e}");
                self.sink
                    .on_status_change(self.session.is_connected(), &format!("read failed: {e}"));
            }
        }
        outcome
    }

    /// Runs [`Poller::tick`] every `interval` on a background thread.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> std::io::Result<PollerHandle> {
        let (stop, signal) = stop_signal();
        let thread = std::thread::Builder::new()
            .name("poller".into())
            .spawn(move || {
                log::info!("Polling every {interval:?}");
                run_periodic(interval, &signal, || {
                    self.tick();
                });
                log::info!("Polling stopped");
            })?;

        Ok(PollerHandle { stop, thread })
    }
}

/// A running poller thread.
pub struct PollerHandle {
    stop: StopHandle,
    thread: JoinHandle<()>,
}

impl PollerHandle {
    /// Asks the thread to stop without waiting for an exchange in flight.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stops the thread and waits until it has finished.
    pub fn join(self) {
        self.stop.stop();
        if self.thread.join().is_err() {
            log::error!("Poller thread panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
