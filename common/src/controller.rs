// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{ClientConfig, PollMode};
use crate::error::{CommandError, Error};
use crate::history::HistoryWindow;
use crate::poller::{PollOutcome, Poller, PollerHandle};
use crate::protocol::LedLevel;
use crate::session::{ConnectorPointer, Endpoint, Session};
use crate::sink::DisplaySinkPointer;

const CONNECT_FIRST: &str = "connect to the server first";

/// Validates `value` and sends it as an LED command. Out-of-range values are
/// rejected before anything is written. Any reply counts as acknowledgement.
pub fn set_led(session: &Session, value: i64) -> Result<String, Error> {
    let level = LedLevel::new(value)?;
    Ok(session.send_command(&level.command())?)
}

/// Ties a [`Session`], the shared history window, the poller and the
/// display sink together, reporting every user action to the sink.
///
/// All methods take `&self` and block on network I/O, so front ends should
/// call them off their UI thread.
pub struct SensorController {
    config: ClientConfig,
    session: Arc<Session>,
    history: Arc<Mutex<HistoryWindow>>,
    poller: Arc<Poller>,
    sink: DisplaySinkPointer,
    polling: Mutex<Option<PollerHandle>>,
}

impl SensorController {
    /// Creates the controller. In [`PollMode::Continuous`] the poller starts
    /// right away and keeps running until the controller is dropped.
    pub fn new(
        config: ClientConfig,
        connector: ConnectorPointer,
        sink: DisplaySinkPointer,
    ) -> std::io::Result<Self> {
        let session = Arc::new(Session::new(connector));
        let history = Arc::new(Mutex::new(HistoryWindow::new()));
        let poller = Arc::new(Poller::new(session.clone(), history.clone(), sink.clone()));

        let controller = Self {
            config,
            session,
            history,
            poller,
            sink,
            polling: Mutex::new(None),
        };

        if controller.config.poll_mode == PollMode::Continuous {
            let handle = controller.poller.clone().spawn(controller.config.poll_interval())?;
            *lock(&controller.polling) = Some(handle);
        }

        controller.sink.on_status_change(false, "not connected");
        Ok(controller)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Validates the address fields and connects.
    pub fn connect(&self, host: &str, port: &str) -> Result<(), Error> {
        let endpoint = match Endpoint::parse(host, port) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.sink.on_status_change(self.is_connected(), &e.to_string());
                return Err(e.into());
            }
        };

        match self.session.connect(&endpoint) {
            Ok(()) => {
                self.sink
                    .on_status_change(true, &format!("connected to {endpoint}"));
                Ok(())
            }
            Err(e) => {
                log::warn!("Connecting to {endpoint} failed: {e}");
                self.sink
                    .on_status_change(self.is_connected(), &format!("connection failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Closes the connection. In [`PollMode::Toggle`] the poller is stopped
    /// too, and a tick in flight finishes before the final status is sent.
    pub fn disconnect(&self) {
        let polling = match self.config.poll_mode {
            PollMode::Toggle => lock(&self.polling).take(),
            PollMode::Continuous => None,
        };
        if let Some(handle) = &polling {
            handle.stop();
        }

        self.session.disconnect();
        if let Some(handle) = polling {
            handle.join();
        }
        self.sink.on_status_change(false, "disconnected");
    }

    /// Starts periodic polling ([`PollMode::Toggle`] only). Refused while
    /// disconnected.
    pub fn start_auto(&self) -> Result<(), Error> {
        if self.config.poll_mode == PollMode::Continuous {
            return Ok(());
        }
        if !self.is_connected() {
            self.sink.on_status_change(false, CONNECT_FIRST);
            return Err(CommandError::NotConnected.into());
        }

        let mut polling = lock(&self.polling);
        if polling.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let handle = self
            .poller
            .clone()
            .spawn(self.config.poll_interval())
            .map_err(CommandError::Io)?;
        *polling = Some(handle);
        drop(polling);

        self.sink.on_status_change(true, "automatic reading started");
        Ok(())
    }

    /// Stops periodic polling ([`PollMode::Toggle`] only).
    pub fn stop_auto(&self) {
        if self.config.poll_mode == PollMode::Continuous {
            return;
        }
        if self.stop_polling() {
            self.sink
                .on_status_change(self.is_connected(), "automatic reading stopped");
        }
    }

    pub fn is_auto_running(&self) -> bool {
        lock(&self.polling)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Polls once right now.
    pub fn read_now(&self) -> PollOutcome {
        if !self.is_connected() {
            self.sink.on_status_change(false, CONNECT_FIRST);
            return PollOutcome::Disconnected;
        }
        self.poller.tick()
    }

    /// Sends an LED level coming from a slider.
    pub fn set_led(&self, value: i64) -> Result<String, Error> {
        let result = set_led(&self.session, value);
        self.report_led(&result);
        result
    }

    /// Sends an LED level typed into a text field.
    pub fn set_led_text(&self, text: &str) -> Result<String, Error> {
        let result = LedLevel::parse(text)
            .map_err(Error::from)
            .and_then(|level| set_led(&self.session, level.value().into()));
        self.report_led(&result);
        result
    }

    pub fn history(&self) -> HistoryWindow {
        lock(&self.history).clone()
    }

    fn report_led(&self, result: &Result<String, Error>) {
        match result {
            Ok(reply) => self.sink.on_led_ack(reply),
            Err(e) => {
                if !matches!(e, Error::Validation(_)) {
                    log::warn!("LED command failed: {e}");
                }
                self.sink.on_led_ack(&e.to_string());
            }
        }
    }

    /// Returns whether a poller was running.
    fn stop_polling(&self) -> bool {
        match lock(&self.polling).take() {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }
}

type Action = Box<dyn FnOnce(&SensorController) + Send>;

/// Runs controller actions one after another on a background thread, in the
/// order they were queued. The thread ends once every clone is dropped.
#[derive(Clone)]
pub struct ActionQueue(Sender<Action>);

impl ActionQueue {
    pub fn spawn(controller: Arc<SensorController>) -> std::io::Result<Self> {
        let (sender, actions) = channel::<Action>();
        std::thread::Builder::new()
            .name("actions".into())
            .spawn(move || {
                for action in actions {
                    action(&controller);
                }
            })?;
        Ok(Self(sender))
    }

    pub fn run<F>(&self, action: F)
    where
        F: FnOnce(&SensorController) + Send + 'static,
    {
        if self.0.send(Box::new(action)).is_err() {
            log::error!("Action thread is gone");
        }
    }
}

impl Drop for SensorController {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
