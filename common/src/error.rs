// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::io;

/// Failure while opening a connection to the server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid port {0}")]
    InvalidPort(u16),

    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("{host} did not resolve to any address")]
    NoAddress { host: String },

    #[error("connection to {addr} refused")]
    Refused { addr: String },

    #[error("connection to {addr} timed out")]
    Timeout { addr: String },

    #[error("could not connect to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Failure of a request/response exchange on an established session.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The session has no open connection. This is an expected condition,
    /// callers are not supposed to treat it as a fault.
    #[error("NOT_CONNECTED")]
    NotConnected,

    /// The connection was closed by the peer or by a local disconnect while
    /// the exchange was in flight.
    #[error("connection closed")]
    Closed,

    /// No reply within the read timeout. The reply is skipped when it
    /// arrives late.
    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A response that does not follow the reading grammar.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unexpected response: {raw:?}")]
    UnexpectedResponse { raw: String },
}

impl ProtocolError {
    /// The response text as received.
    pub fn raw(&self) -> &str {
        match self {
            Self::UnexpectedResponse { raw } => raw,
        }
    }
}

/// Rejected user input. Raised before any I/O happens.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("server address must not be empty")]
    EmptyHost,

    #[error("port must be a number, got {0:?}")]
    PortNotANumber(String),

    #[error("port must be between 1 and 65535, got {0}")]
    PortOutOfRange(i64),

    #[error("LED value must be a number, got {0:?}")]
    LedNotANumber(String),

    #[error("LED value must be between 0 and 15, got {0}")]
    LedOutOfRange(i64),
}

/// Failure while loading the client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Umbrella error for the controller operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
