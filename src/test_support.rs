//! In-memory scripted `Transport`. Test-only: a deterministic
//! double used by this crate's own unit tests and by `tests/` integration
//! tests, playing back a fixed script of bytes instead of talking to a
//! real shell or a channel-backed I/O task against a live connection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use regex::Regex;

use crate::error::SessionError;
use crate::transport::{ExpectMatch, ExpectOutcome, Transport};

/// One step of a scripted session: either bytes the "device" sends
/// unprompted, or a closure invoked when the test transport receives a
/// `send`, producing the device's canned reply to that input.
pub enum Script {
    /// Emit this text the next time `expect` is polled, with no input
    /// required first.
    Say(&'static str),
    /// The connection closes (no more bytes ever arrive).
    Eof,
}

/// A scripted `Transport`: each call to `expect` consumes the next
/// `Script` entry and matches `patterns` against its accumulated text.
pub struct ScriptedTransport {
    queue: VecDeque<Script>,
    buffer: String,
    sent: Vec<Vec<u8>>,
    eof: bool,
    closed: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            queue: script.into_iter().collect(),
            buffer: String::new(),
            sent: Vec::new(),
            eof: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every byte string this transport was asked to `send`, in order —
    /// lets a test assert on what the engine actually wrote.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Whether `close` was actually invoked on this transport, as opposed
    /// to the script merely running out (`eof`) — lets a test distinguish
    /// "the engine released the connection" from "the script ended".
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// A handle that keeps reporting `closed` after the transport itself has
    /// been moved into a `Device`/`Connector` — grab this before handing the
    /// transport over, since a failed login drops it without returning it.
    pub fn closed_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Transport for ScriptedTransport {
    async fn expect(
        &mut self,
        patterns: &[Regex],
        _timeout: Duration,
    ) -> Result<ExpectOutcome, SessionError> {
        if self.eof && self.buffer.is_empty() {
            return Ok(ExpectOutcome::Eof(String::new()));
        }

        // Pull in the next scripted chunk (if any) before matching, so a
        // single `expect` call can see text queued across several `Say`
        // entries without the caller having to poll once per entry.
        while let Some(step) = self.queue.pop_front() {
            match step {
                Script::Say(text) => self.buffer.push_str(text),
                Script::Eof => {
                    self.eof = true;
                    break;
                }
            }
            if let Some(outcome) = self.try_match(patterns) {
                return Ok(outcome);
            }
        }

        if let Some(outcome) = self.try_match(patterns) {
            return Ok(outcome);
        }

        if self.eof {
            let leftover = std::mem::take(&mut self.buffer);
            return Ok(ExpectOutcome::Eof(leftover));
        }

        // Script exhausted with no match: the real transport would block
        // until `timeout`; here that's indistinguishable from "no more
        // scripted input", so report a timeout carrying what we have.
        Ok(ExpectOutcome::TimedOut(self.buffer.clone()))
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.eof = true;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl ScriptedTransport {
    fn try_match(&mut self, patterns: &[Regex]) -> Option<ExpectOutcome> {
        let mut best: Option<(usize, usize, usize)> = None; // (start, pattern_idx, end)
        for (idx, pattern) in patterns.iter().enumerate() {
            if let Some(m) = pattern.find(&self.buffer) {
                let candidate = (m.start(), idx, m.end());
                match &best {
                    Some((start, pidx, _)) if *start < candidate.0 || (*start == candidate.0 && *pidx <= idx) => {}
                    _ => best = Some(candidate),
                }
            }
        }
        best.map(|(start, idx, end)| {
            let before = self.buffer[..start].to_string();
            let after = self.buffer[start..end].to_string();
            self.buffer = self.buffer[end..].to_string();
            ExpectOutcome::Matched(ExpectMatch { index: idx, before, after })
        })
    }
}

/// A transport that never produces any bytes and immediately reports EOF
/// on `expect`. Used where a test needs a `Device` but never drives I/O
/// through it (e.g. plugin-hook and URL-parsing tests).
#[derive(Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    async fn expect(
        &mut self,
        _patterns: &[Regex],
        _timeout: Duration,
    ) -> Result<ExpectOutcome, SessionError> {
        Ok(ExpectOutcome::Eof(String::new()))
    }

    async fn send(&mut self, _bytes: &[u8]) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}
