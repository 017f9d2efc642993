//! The transport seam: the engine drives a byte stream without assuming a
//! specific child-process or socket library.

use std::time::Duration;

use regex::Regex;

use crate::error::SessionError;

/// The result of a successful pattern match: which pattern in the slice
/// passed to `expect` matched, the text preceding the match (`before`),
/// and the matched text itself plus anything read alongside it (`after`).
#[derive(Debug, Clone)]
pub struct ExpectMatch {
    pub index: usize,
    pub before: String,
    pub after: String,
}

/// What a single `expect` call observed.
///
/// `TimedOut`/`Eof` still carry whatever bytes were read before the read
/// gave up: prompt discovery derives a tentative prompt from "the
/// last `\r\n`-separated line of captured text" on a `timeout`, which only
/// makes sense if the buffered-so-far text survives the timeout.
#[derive(Debug, Clone)]
pub enum ExpectOutcome {
    Matched(ExpectMatch),
    TimedOut(String),
    Eof(String),
}

/// A live connection to a device's CLI.
///
/// `ExpectSession` is generic over `Transport` (monomorphized, not boxed):
/// a `Device` owns exactly one live transport for its lifetime, so there
/// is no need to erase the type across an API boundary.
///
/// No concrete production implementation ships in this crate — the
/// pseudo-terminal/child-process transport and the telnet test simulator
/// are both external collaborators.
pub trait Transport: Send {
    /// Reads until one of `patterns` matches, `timeout` elapses, or the
    /// peer closes the connection.
    fn expect(
        &mut self,
        patterns: &[Regex],
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<ExpectOutcome, SessionError>> + Send;

    /// Writes raw bytes to the peer.
    fn send(&mut self, bytes: &[u8]) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;

    /// Releases the underlying connection. Idempotent.
    fn close(&mut self) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;

    /// A diagnostic sink raw bytes may optionally be mirrored to.
    fn logfile(&mut self) -> Option<&mut Vec<u8>> {
        None
    }
}

/// Opens a `Transport` given one hop's rendered connect command (/// `login`). The concrete mechanics — spawning a pseudo-terminal running
/// `ssh`/`telnet`, dialing a test simulator — are external collaborators
///; this trait is the seam a caller implements to supply
/// them. `login` calls it exactly once, against the first hop in the
/// chain (or the target itself, if there are no hops): subsequent hops'
/// connect commands are relayed as typed input over the same transport,
/// not opened as separate connections.
pub trait Connector<T: Transport>: Send {
    fn connect(&mut self, rendered_command: &str) -> impl std::future::Future<Output = Result<T, SessionError>> + Send;
}
