//! In-memory transports for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::error::ConnectionError;
use crate::session::{Connector, Endpoint, Transport};

#[derive(Default)]
struct Script {
    chunks: VecDeque<Vec<u8>>,
    written: Vec<String>,
    shutdowns: usize,
    refuse: bool,
}

/// A connector whose transports serve pre-recorded reply chunks and record
/// every request written to them. Clones share the same script.
#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector(Arc<Mutex<Script>>);

impl ScriptedConnector {
    /// One reply line per item; a newline is appended where missing.
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_chunks(replies.into_iter().map(|reply| {
            let mut reply = reply.into();
            if !reply.ends_with('\n') {
                reply.push('\n');
            }
            reply
        }))
    }

    /// Raw chunks, each returned by a separate read. An empty chunk makes
    /// its read time out.
    pub(crate) fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = Script {
            chunks: chunks.into_iter().map(|c| c.into().into_bytes()).collect(),
            ..Script::default()
        };
        Self(Arc::new(Mutex::new(script)))
    }

    pub(crate) fn refusing() -> Self {
        let script = Script {
            refuse: true,
            ..Script::default()
        };
        Self(Arc::new(Mutex::new(script)))
    }

    pub(crate) fn push_reply(&self, reply: &str) {
        let mut script = self.0.lock().unwrap();
        script.chunks.push_back(format!("{reply}\n").into_bytes());
    }

    pub(crate) fn written(&self) -> Vec<String> {
        self.0.lock().unwrap().written.clone()
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.0.lock().unwrap().shutdowns
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, ConnectionError> {
        if self.0.lock().unwrap().refuse {
            return Err(ConnectionError::Refused {
                addr: endpoint.to_string(),
            });
        }
        Ok(Box::new(ScriptedTransport(self.0.clone())))
    }
}

struct ScriptedTransport(Arc<Mutex<Script>>);

impl Transport for ScriptedTransport {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut script = self.0.lock().unwrap();
        script.written.push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.0.lock().unwrap();
        let Some(mut chunk) = script.chunks.pop_front() else {
            return Ok(0);
        };

        if chunk.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            script.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn shutdown(&self) -> io::Result<()> {
        self.0.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}
