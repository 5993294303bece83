// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use crate::history::HistoryWindow;

/// Receives everything the client has to show. To be implemented by each
/// front end.
///
/// Methods are called from the poller thread as well as from whichever thread
/// drives the controller, so implementations should only hand the values over
/// to their UI thread.
pub trait DisplaySink: Send + Sync {
    /// The history window changed.
    fn on_reading_update(&self, history: &HistoryWindow);

    /// Connection state or a message for the status line.
    fn on_status_change(&self, connected: bool, message: &str);

    /// Reply (or error) of an LED command.
    fn on_led_ack(&self, message: &str);
}

pub type DisplaySinkPointer = Arc<dyn DisplaySink>;

/// Everything a [`DisplaySink`] can receive, as a value.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkEvent {
    ReadingUpdate(HistoryWindow),
    StatusChange { connected: bool, message: String },
    LedAck(String),
}

/// A [`DisplaySink`] forwarding each call as a [`SinkEvent`] over a channel.
pub struct ChannelSink {
    sender: Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<SinkEvent>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }

    fn post(&self, event: SinkEvent) {
        // Nobody listening anymore.
        let _ = self.sender.send(event);
    }
}

impl DisplaySink for ChannelSink {
    fn on_reading_update(&self, history: &HistoryWindow) {
        self.post(SinkEvent::ReadingUpdate(history.clone()));
    }

    fn on_status_change(&self, connected: bool, message: &str) {
        self.post(SinkEvent::StatusChange {
            connected,
            message: message.to_string(),
        });
    }

    fn on_led_ack(&self, message: &str) {
        self.post(SinkEvent::LedAck(message.to_string()));
    }
}
