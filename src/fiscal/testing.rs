//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::protocol::{decode_framed, encode};
use super::transport::Transport;
use super::types::{ACK, ENQ};
use crate::error::{AppError, Result};

pub(crate) type WriteLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// Replays one scripted reply per write and records everything written.
pub(crate) struct ScriptedTransport {
    open: bool,
    log: WriteLog,
    replies: VecDeque<Vec<u8>>,
    fallback: Option<Vec<u8>>,
    inbox: VecDeque<u8>,
    write_delay: Duration,
    write_limit: Option<usize>,
}

impl ScriptedTransport {
    /// Open transport that answers writes with `replies` in order, then stays silent.
    pub fn new(replies: Vec<Vec<u8>>) -> Self {
        Self {
            open: true,
            log: Arc::new(Mutex::new(Vec::new())),
            replies: replies.into(),
            fallback: None,
            inbox: VecDeque::new(),
            write_delay: Duration::ZERO,
            write_limit: None,
        }
    }

    /// Open transport that answers every write with ACK.
    pub fn acking() -> Self {
        Self::new(Vec::new()).with_fallback(vec![ACK])
    }

    /// Reply used once the script is exhausted.
    pub fn with_fallback(mut self, reply: Vec<u8>) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Fail every write after the first `n`.
    pub fn failing_writes_after(mut self, n: usize) -> Self {
        self.write_limit = Some(n);
        self
    }

    pub fn closed(mut self) -> Self {
        self.open = false;
        self
    }

    pub fn log(&self) -> WriteLog {
        Arc::clone(&self.log)
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(AppError::NotConnected);
        }
        if self.write_limit.is_some_and(|n| self.log.lock().unwrap().len() >= n) {
            return Err(AppError::transport("write failed"));
        }
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        self.log.lock().unwrap().push(bytes.to_vec());
        self.inbox.clear();
        if let Some(reply) = self.replies.pop_front().or_else(|| self.fallback.clone()) {
            self.inbox.extend(reply);
        }
        Ok(())
    }

    fn read_until(&mut self, marker: u8, _timeout: Duration) -> Result<Vec<u8>> {
        match self.inbox.iter().position(|&b| b == marker) {
            Some(pos) => Ok(self.inbox.drain(..=pos).collect()),
            None => {
                self.inbox.clear();
                Err(AppError::Timeout(format!("marker 0x{marker:02X} not received")))
            }
        }
    }

    fn read_exact(&mut self, n: usize, _timeout: Duration) -> Result<Vec<u8>> {
        if self.inbox.len() < n {
            let got = self.inbox.len();
            self.inbox.clear();
            return Err(AppError::Timeout(format!("expected {n} bytes, got {got}")));
        }
        Ok(self.inbox.drain(..n).collect())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Encode a data frame as the device would send it.
pub(crate) fn data_frame(payload: &str) -> Vec<u8> {
    encode(payload.as_bytes())
}

/// Payloads of every frame written so far, ENQ shown as `<ENQ>`.
pub(crate) fn sent_commands(log: &WriteLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|bytes| {
            if bytes.as_slice() == [ENQ] {
                "<ENQ>".to_string()
            } else {
                let payload = decode_framed(bytes).expect("engine wrote a malformed frame");
                String::from_utf8_lossy(payload).into_owned()
            }
        })
        .collect()
}
