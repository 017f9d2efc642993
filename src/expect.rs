//! The Expect Loop's transport-facing half: a thin owner of one live
//! `Transport`, responsible only for issuing I/O and recording the
//! diagnostic interaction log. The FSM-facing half — translating
//! matched patterns into events, dispatching them, and deciding when to
//! stop — lives on `Device` in `device.rs`, since that logic needs the
//! device's state, pattern map, and FSM tables.

use std::time::Duration;

use regex::Regex;

use crate::error::{InteractionEntry, InteractionLog, SessionError};
use crate::transport::{ExpectOutcome, Transport};

/// Owns the transport handle for one connected `Device` (item 5,
/// `ExpectSession`). Generic over `Transport`, monomorphized rather than
/// boxed: a device owns exactly one live transport for its lifetime.
pub struct ExpectSession<T: Transport> {
    transport: T,
    log: InteractionLog,
}

impl<T: Transport> ExpectSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            log: InteractionLog::new(),
        }
    }

    /// Writes raw bytes to the peer.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.transport.send(bytes).await
    }

    /// Reads until one of `patterns` matches, `timeout` elapses, or the
    /// peer closes the connection. Records every outcome into the
    /// interaction log so a raised error can carry the lead-up to it.
    pub async fn expect(
        &mut self,
        patterns: &[Regex],
        timeout: Duration,
    ) -> Result<ExpectOutcome, SessionError> {
        let outcome = self.transport.expect(patterns, timeout).await?;
        match &outcome {
            ExpectOutcome::Matched(m) => {
                self.log.push(InteractionEntry::RawChunk {
                    data: format!("{}{}", m.before, m.after),
                });
            }
            ExpectOutcome::TimedOut(text) | ExpectOutcome::Eof(text) => {
                if !text.is_empty() {
                    self.log.push(InteractionEntry::RawChunk { data: text.clone() });
                }
            }
        }
        Ok(outcome)
    }

    /// Releases the underlying connection. Idempotent by contract of the
    /// concrete `Transport`; `Device::close` only
    /// ever calls this once per live session regardless.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.transport.close().await
    }

    pub fn record_state_change(&mut self, from: &str, to: &str) {
        self.log.push(InteractionEntry::StateChanged {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn record_prompt_change(&mut self, state: &str, prompt: &str) {
        self.log.push(InteractionEntry::PromptChanged {
            state: state.to_string(),
            prompt: prompt.to_string(),
        });
    }

    pub fn record_command_sent(&mut self, command: &str) {
        self.log.push(InteractionEntry::CommandSent {
            command: command.to_string(),
        });
    }

    /// A copy of the interaction log as captured so far, for attaching to a
    /// raised error without consuming the session.
    pub fn log_snapshot(&self) -> InteractionLog {
        self.log.clone()
    }

    pub fn logfile(&mut self) -> Option<&mut Vec<u8>> {
        self.transport.logfile()
    }
}
