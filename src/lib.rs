//! # cliexpect - prompt-driven interactive session engine
//!
//! `cliexpect` automates interactive command-line sessions with remote
//! network devices (routers, switches, generic hosts) over telnet or ssh.
//! A caller identifies a device by URL, sends one or more command lines,
//! and receives captured output from the device's CLI. Behind that simple
//! surface the engine drives a stateful, prompt-based dialogue: it
//! authenticates, tracks which CLI mode the session is in, recognizes
//! device prompts even when their literal text is unknown in advance,
//! handles paging and error responses, and tears down cleanly on I/O
//! failure.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cliexpect::actions::ActionRegistry;
//! use cliexpect::cache::NullCache;
//! use cliexpect::device::Device;
//! use cliexpect::driver::Registry;
//! use cliexpect::plugin::ResolverChain;
//! use cliexpect::transport::{Connector, Transport};
//!
//! # async fn run<T: Transport, C: Connector<T>>(connector: &mut C) -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! cliexpect::config::load_into(&registry, "drivers.toml")?;
//!
//! let actions = ActionRegistry::new();
//! let mut device: Device<T> = Device::new("ssh://admin@192.168.1.1/cisco", &registry, &actions)?;
//! let resolvers = ResolverChain::new();
//!
//! let output = device.send(connector, &resolvers, &NullCache, "show version").await?;
//! println!("{output}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Main components
//!
//! - [`driver::Registry`] / [`driver::Driver`] — the Configuration Registry.
//! - [`fsm::Fsm`] / [`pattern_map::PatternMap`] — the per-device transition tables and pattern-to-event map.
//! - [`device::Device`] — the facade binding a driver's FSM to one target: `send`/`send_line`/`login`/`close`.
//! - [`cache::PromptCache`] — the optional prompt-cache interface.
//! - [`plugin::ResolverChain`] — ordered authentication hooks run before `connect`.
//! - [`error::SessionError`] — the error taxonomy, with an attached [`error::InteractionLog`] for diagnostics.
//! - [`transport::Transport`] — the seam a caller implements for the concrete child-process/pseudo-terminal connection.

pub mod actions;
pub mod cache;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod expect;
pub mod fsm;
pub mod pattern_map;
pub mod plugin;
pub mod test_support;
pub mod transport;
