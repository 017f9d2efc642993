//! Error types for the interactive session engine.
//!
//! This module defines every typed error the engine can raise, plus the
//! diagnostic interaction log attached to connection-phase failures.

use thiserror::Error;

use crate::event::Event;

/// A single entry in the bounded interaction log attached to a raised error.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionEntry {
    /// A chunk of raw bytes read from the transport.
    RawChunk { data: String },
    /// The FSM left one state and entered another.
    StateChanged { from: String, to: String },
    /// The device prompt for a state changed (including discovery confirmations).
    PromptChanged { state: String, prompt: String },
    /// A command was sent to the device.
    CommandSent { command: String },
}

/// A bounded ring of interaction entries, most recent last.
///
/// Attached to connection-phase and command-phase errors so a caller can
/// see what the device actually said leading up to the failure.
#[derive(Debug, Clone, Default)]
pub struct InteractionLog {
    capacity: usize,
    entries: Vec<InteractionEntry>,
}

const DEFAULT_INTERACTION_LOG_CAPACITY: usize = 64;

impl InteractionLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INTERACTION_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: InteractionEntry) {
        if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[InteractionEntry] {
        &self.entries
    }

    pub fn as_jsonl(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            if let Ok(line) = serde_json::to_string(entry) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

/// Errors that can occur while loading configuration, constructing a
/// `Device`, or driving its interactive session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The device URL did not parse (bad scheme, missing host, ...).
    #[error("invalid device url: {0}")]
    WrongDeviceUrl(String),

    /// A required device parameter was missing (e.g. ssh without a username).
    #[error("missing device parameter: {0}")]
    MissingDeviceParameter(String),

    /// The URL scheme is not `ssh` or `telnet`.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// The named driver is not present in the registry.
    #[error("driver not found: {0}")]
    DriverNotFound(String),

    /// The configuration file failed to parse or validate.
    #[error("configuration file error: {0}")]
    ConfigFileError(String),

    /// The transport refused the connection.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The peer closed the connection unexpectedly.
    #[error("connection closed unexpectedly{}", interaction_suffix(.log))]
    ConnectionClosed { log: Option<InteractionLog> },

    /// A read timed out with no recovery path available.
    #[error("connection timed out: {reason}{}", interaction_suffix(.log))]
    ConnectionTimedOut {
        reason: String,
        log: Option<InteractionLog>,
    },

    /// Authentication failed.
    #[error("permission denied{}", interaction_suffix(.log))]
    PermissionDenied { log: Option<InteractionLog> },

    /// The login sequence completed without leaving the ground state.
    #[error("login failed: {reason}")]
    LoginFailed { reason: String },

    /// The driver matched a known device error pattern.
    #[error("command execution error: {0}")]
    CommandExecutionError(String),

    /// An action name could not be resolved against the action registry.
    #[error("event handler undefined: {0}")]
    EventHandlerUndefined(String),

    /// `process` could not find any transition for `(event, state)`, or
    /// synthesized-event recursion exceeded its depth cap.
    #[error("fsm exception: {0}")]
    FSMException(String),
}

fn interaction_suffix(log: &Option<InteractionLog>) -> String {
    match log {
        Some(log) if !log.entries().is_empty() => {
            format!(" ({} interaction log entries attached)", log.entries().len())
        }
        _ => String::new(),
    }
}

impl SessionError {
    /// The interaction log attached to this error, if any.
    pub fn interaction_log(&self) -> Option<&InteractionLog> {
        match self {
            SessionError::ConnectionClosed { log }
            | SessionError::ConnectionTimedOut { log, .. }
            | SessionError::PermissionDenied { log } => log.as_ref(),
            _ => None,
        }
    }

    /// Whether this error should force the device closed before propagating,
    /// per the propagation rule in the error handling design: every error
    /// other than a driver/config lookup failure leaves the device in a
    /// state that must be torn down before the caller observes it.
    pub fn forces_close(&self) -> bool {
        !matches!(
            self,
            SessionError::DriverNotFound(_) | SessionError::ConfigFileError(_)
        )
    }

    /// Tags a login-phase error with which hop in the chain it happened
    /// against.
    pub(crate) fn with_hop_context(self, hop_name: &str) -> Self {
        match self {
            SessionError::ConnectionTimedOut { reason, log } => SessionError::ConnectionTimedOut {
                reason: format!("hop '{hop_name}': {reason}"),
                log,
            },
            SessionError::LoginFailed { reason } => SessionError::LoginFailed {
                reason: format!("hop '{hop_name}': {reason}"),
            },
            SessionError::ConnectionRefused(reason) => {
                SessionError::ConnectionRefused(format!("hop '{hop_name}': {reason}"))
            }
            other => other,
        }
    }
}

/// Raised internally by the FSM dispatcher; never escapes a well-formed
/// driver, but surfaces `currentEvent` for diagnostics when it does.
#[derive(Debug)]
pub(crate) struct DispatchFailure {
    pub event: Event,
    pub state: String,
}

impl From<DispatchFailure> for SessionError {
    fn from(failure: DispatchFailure) -> Self {
        SessionError::FSMException(format!(
            "no transition defined for event '{}' in state '{}'",
            failure.event.name, failure.state
        ))
    }
}
