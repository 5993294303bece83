// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{CommandError, ConnectionError, ValidationError};

/// Upper bound of a single reply, terminator included.
pub const MAX_REPLY_LEN: usize = 1024;

/// A validated server address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Builds an endpoint from the text of the address and port fields.
    pub fn parse(host: &str, port: &str) -> Result<Self, ValidationError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ValidationError::EmptyHost);
        }

        let port = port.trim();
        let port = port
            .parse::<i64>()
            .map_err(|_| ValidationError::PortNotANumber(port.to_string()))?;
        match u16::try_from(port) {
            Ok(valid) if valid > 0 => Ok(Self {
                host: host.to_string(),
                port: valid,
            }),
            _ => Err(ValidationError::PortOutOfRange(port)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A byte stream to the server that can be shut down from another thread
/// while a read is blocked on it.
pub trait Transport: Send + Sync {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()>;

    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Closes both directions. Blocked reads return afterwards.
    fn shutdown(&self) -> io::Result<()>;
}

/// Opens transports to an endpoint.
pub trait Connector: Send + Sync {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, ConnectionError>;
}

pub type ConnectorPointer = Box<dyn Connector>;

/// [`Connector`] for plain TCP.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
    /// Bounds every reply so that a dead peer cannot block an exchange forever.
    pub read_timeout: Option<Duration>,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl Connector for TcpConnector {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, ConnectionError> {
        if endpoint.port == 0 {
            return Err(ConnectionError::InvalidPort(endpoint.port));
        }

        let addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|source| ConnectionError::Resolve {
                host: endpoint.host.clone(),
                source,
            })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    let io_error = |source| ConnectionError::Io {
                        addr: addr.to_string(),
                        source,
                    };
                    stream.set_read_timeout(self.read_timeout).map_err(io_error)?;
                    stream.set_nodelay(true).map_err(io_error)?;
                    log::debug!("Opened TCP stream to {addr}");
                    return Ok(Box::new(TcpTransport(stream)));
                }
                Err(e) => {
                    log::debug!("Connecting to {addr} failed: {e}");
                    let addr = addr.to_string();
                    last_error = Some(match e.kind() {
                        io::ErrorKind::ConnectionRefused => ConnectionError::Refused { addr },
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                            ConnectionError::Timeout { addr }
                        }
                        _ => ConnectionError::Io { addr, source: e },
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ConnectionError::NoAddress {
            host: endpoint.host.clone(),
        }))
    }
}

struct TcpTransport(TcpStream);

impl Transport for TcpTransport {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        (&self.0).write_all(bytes)
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.0).read(buf)
    }

    fn shutdown(&self) -> io::Result<()> {
        self.0.shutdown(Shutdown::Both)
    }
}

/// Receive side of a [`Link`]. `buffered` holds bytes received past the end
/// of the previous reply. `unanswered` counts requests whose reply line has
/// not been consumed yet: one that timed out, or the rest of a reply that was
/// cut at [`MAX_REPLY_LEN`].
#[derive(Default)]
struct Inbox {
    buffered: Vec<u8>,
    unanswered: usize,
}

/// An open connection. The inbox lock also serializes exchanges.
struct Link {
    transport: Box<dyn Transport>,
    inbox: Mutex<Inbox>,
}

impl Link {
    fn exchange(&self, command: &str) -> Result<String, CommandError> {
        let mut inbox = lock(&self.inbox);

        let mut request = Vec::with_capacity(command.len() + 1);
        request.extend_from_slice(command.as_bytes());
        request.push(b'\n');
        self.transport.write_all(&request)?;
        inbox.unanswered += 1;

        // The server answers every line in order, so late replies come first.
        while inbox.unanswered > 1 {
            let stale = self.read_line(&mut inbox.buffered)?;
            inbox.unanswered -= 1;
            log::debug!("Discarding late reply {:?}", String::from_utf8_lossy(&stale).trim());
        }

        let line = self.read_line(&mut inbox.buffered)?;
        if line.ends_with(b"\n") || line.len() < MAX_REPLY_LEN {
            inbox.unanswered -= 1;
        } else {
            log::warn!("Reply longer than {MAX_REPLY_LEN} bytes, dropping the rest of it");
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Reads until a newline, the peer closing after some data, or
    /// [`MAX_REPLY_LEN`] bytes, whichever comes first.
    fn read_line(&self, pending: &mut Vec<u8>) -> Result<Vec<u8>, CommandError> {
        let mut buf = [0u8; MAX_REPLY_LEN];
        loop {
            if let Some(end) = pending.iter().position(|&b| b == b'\n') {
                let rest = pending.split_off(end + 1);
                return Ok(std::mem::replace(pending, rest));
            }
            if pending.len() >= MAX_REPLY_LEN {
                let rest = pending.split_off(MAX_REPLY_LEN);
                return Ok(std::mem::replace(pending, rest));
            }

            let wanted = MAX_REPLY_LEN - pending.len();
            match self.transport.read(&mut buf[..wanted]) {
                Ok(0) if pending.is_empty() => return Err(CommandError::Closed),
                Ok(0) => return Ok(std::mem::take(pending)),
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Err(CommandError::Timeout)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&self) {
        if let Err(e) = self.transport.shutdown() {
            log::debug!("Ignoring error while closing connection: {e}");
        }
    }
}

/// The connection to the sensor server.
///
/// All methods take `&self`, so a session can be shared between the UI
/// thread and the poller. [`Session::disconnect`] may run while another
/// thread is blocked in [`Session::send_command`]; that call then fails with
/// [`CommandError::Closed`].
pub struct Session {
    connector: ConnectorPointer,
    link: Mutex<Option<Arc<Link>>>,
}

impl Session {
    pub fn new(connector: ConnectorPointer) -> Self {
        Self {
            connector,
            link: Mutex::new(None),
        }
    }

    /// Opens a connection to `endpoint`, replacing any open one. On failure
    /// the session is left as it was.
    pub fn connect(&self, endpoint: &Endpoint) -> Result<(), ConnectionError> {
        let transport = self.connector.open(endpoint)?;
        let link = Arc::new(Link {
            transport,
            inbox: Mutex::default(),
        });

        if let Some(previous) = lock(&self.link).replace(link) {
            previous.close();
        }
        log::info!("Connected to {endpoint}");
        Ok(())
    }

    /// Closes the connection if one is open. Always leaves the session
    /// disconnected; close errors are not reported.
    pub fn disconnect(&self) {
        if let Some(link) = lock(&self.link).take() {
            link.close();
            log::info!("Disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.link).is_some()
    }

    /// Sends `command` as one line and returns the trimmed reply line.
    ///
    /// Returns [`CommandError::NotConnected`] when there is no connection.
    /// I/O errors and timeouts leave the session connected. An exchange that
    /// overlaps a disconnect fails with [`CommandError::Closed`], even when
    /// part of a reply had already arrived.
    pub fn send_command(&self, command: &str) -> Result<String, CommandError> {
        let link = lock(&self.link).clone().ok_or(CommandError::NotConnected)?;

        log::debug!("-> {command}");
        let result = link.exchange(command);
        if !self.is_current(&link) {
            return Err(CommandError::Closed);
        }
        let reply = result?;
        log::debug!("<- {reply}");
        Ok(reply)
    }

    fn is_current(&self, link: &Arc<Link>) -> bool {
        lock(&self.link)
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, link))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedConnector;

    fn endpoint() -> Endpoint {
        Endpoint::parse("sensor.local", "8080").unwrap()
    }

    #[test]
    fn endpoint_requires_a_positive_port() {
        assert_eq!(
            Endpoint::parse(" 10.0.0.2 ", "8080"),
            Ok(Endpoint {
                host: "10.0.0.2".into(),
                port: 8080
            })
        );
        assert_eq!(Endpoint::parse("", "8080"), Err(ValidationError::EmptyHost));
        assert_eq!(
            Endpoint::parse("host", "http"),
            Err(ValidationError::PortNotANumber("http".into()))
        );
        assert_eq!(Endpoint::parse("host", "0"), Err(ValidationError::PortOutOfRange(0)));
        assert_eq!(Endpoint::parse("host", "-80"), Err(ValidationError::PortOutOfRange(-80)));
        assert_eq!(
            Endpoint::parse("host", "70000"),
            Err(ValidationError::PortOutOfRange(70000))
        );
    }

    #[test]
    fn send_command_without_connection_is_a_sentinel() {
        let connector = ScriptedConnector::new(["TEMP=1,HUM=2"]);
        let session = Session::new(Box::new(connector.clone()));

        let err = session.send_command("GET_TEMP").unwrap_err();
        assert!(matches!(err, CommandError::NotConnected));
        assert_eq!(err.to_string(), "NOT_CONNECTED");
        assert!(connector.written().is_empty());
    }

    #[test]
    fn writes_one_line_and_returns_the_trimmed_reply() {
        let connector = ScriptedConnector::new(["  TEMP=23.50,HUM=55.10 \r\n"]);
        let session = Session::new(Box::new(connector.clone()));
        session.connect(&endpoint()).unwrap();

        assert_eq!(session.send_command("GET_TEMP").unwrap(), "TEMP=23.50,HUM=55.10");
        assert_eq!(connector.written(), ["GET_TEMP\n"]);
    }

    #[test]
    fn reassembles_replies_split_across_reads() {
        let connector = ScriptedConnector::from_chunks(["TEMP=2", "1.5,HU", "M=40\nLED", " OK\n"]);
        let session = Session::new(Box::new(connector));
        session.connect(&endpoint()).unwrap();

        assert_eq!(session.send_command("GET_TEMP").unwrap(), "TEMP=21.5,HUM=40");
        assert_eq!(session.send_command("LED=3").unwrap(), "LED OK");
    }

    #[test]
    fn peer_close_without_data_is_closed() {
        let connector = ScriptedConnector::new(Vec::<String>::new());
        let session = Session::new(Box::new(connector));
        session.connect(&endpoint()).unwrap();

        assert!(matches!(session.send_command("GET_TEMP"), Err(CommandError::Closed)));
        assert!(session.is_connected());
    }

    #[test]
    fn unterminated_reply_is_returned_on_close() {
        let connector = ScriptedConnector::from_chunks(["TEMP=1,HUM=2"]);
        let session = Session::new(Box::new(connector));
        session.connect(&endpoint()).unwrap();

        assert_eq!(session.send_command("GET_TEMP").unwrap(), "TEMP=1,HUM=2");
    }

    #[test]
    fn oversized_reply_is_cut_and_its_rest_dropped() {
        let long = format!("{}\n", "x".repeat(MAX_REPLY_LEN + 10));
        let connector = ScriptedConnector::from_chunks([long, "LED OK\n".to_string()]);
        let session = Session::new(Box::new(connector));
        session.connect(&endpoint()).unwrap();

        assert_eq!(session.send_command("GET_TEMP").unwrap().len(), MAX_REPLY_LEN);
        assert_eq!(session.send_command("LED=3").unwrap(), "LED OK");
    }

    #[test]
    fn timed_out_reply_is_skipped_when_it_arrives() {
        let connector =
            ScriptedConnector::from_chunks(["", "TEMP=20,HUM=40\n", "ACK LED=5\n", "TEMP=21,HUM=41\n"]);
        let session = Session::new(Box::new(connector.clone()));
        session.connect(&endpoint()).unwrap();

        let err = session.send_command("GET_TEMP").unwrap_err();
        assert!(matches!(err, CommandError::Timeout));
        assert_eq!(err.to_string(), "timed out waiting for a reply");
        assert!(session.is_connected());

        assert_eq!(session.send_command("LED=5").unwrap(), "ACK LED=5");
        assert_eq!(session.send_command("GET_TEMP").unwrap(), "TEMP=21,HUM=41");
        assert_eq!(connector.written(), ["GET_TEMP\n", "LED=5\n", "GET_TEMP\n"]);
    }

    #[test]
    fn partial_reply_of_a_timed_out_request_is_skipped_too() {
        let connector = ScriptedConnector::from_chunks(["TEMP=2", "", "0,HUM=40\nOK\n"]);
        let session = Session::new(Box::new(connector));
        session.connect(&endpoint()).unwrap();

        assert!(matches!(session.send_command("GET_TEMP"), Err(CommandError::Timeout)));
        assert_eq!(session.send_command("LED=1").unwrap(), "OK");
    }

    #[test]
    fn failed_connect_keeps_the_previous_state() {
        let connector = ScriptedConnector::refusing();
        let session = Session::new(Box::new(connector));

        assert!(matches!(
            session.connect(&endpoint()),
            Err(ConnectionError::Refused { .. })
        ));
        assert!(!session.is_connected());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let connector = ScriptedConnector::new(["ok"]);
        let session = Session::new(Box::new(connector.clone()));
        session.connect(&endpoint()).unwrap();

        session.disconnect();
        session.disconnect();

        assert!(!session.is_connected());
        assert_eq!(connector.shutdowns(), 1);
        assert!(matches!(session.send_command("GET_TEMP"), Err(CommandError::NotConnected)));
    }
}
