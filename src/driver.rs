//! Driver records and the process-wide Configuration Registry.
//!
//! A `Driver` is a named, read-only bundle of patterns, transitions, and
//! tunables describing one class of device. Drivers are created once
//! (typically by loading a TOML configuration file, see [`crate::config`])
//! and are thereafter shared by `Arc` across every `Device` built from them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;
use once_cell::sync::Lazy;

use crate::error::SessionError;

/// Default `maxWait` (seconds) when neither the driver nor any ancestor
/// sets one.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 10;

/// An `events.<key>` or `transitions.<key>` entry.
///
/// `transitions` entries always have `pattern == None`; `events` entries
/// commonly (but not necessarily) carry one.
#[derive(Debug, Clone)]
pub struct TransitionSpec {
    pub pattern: Option<String>,
    pub action: Option<String>,
    pub begin_state: String,
    pub end_state: String,
}

/// A named, immutable device-class record.
///
/// Scalar tunables fall through to `parent` when unset locally; `events`
/// and `transitions` are merged across the inheritance chain with the
/// most specific (closest to `self`) definition for a given key winning.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    pub name: String,
    pub parent: Option<Arc<Driver>>,
    pub events: HashMap<String, TransitionSpec>,
    pub transitions: HashMap<String, TransitionSpec>,

    pub max_wait: Option<u64>,
    pub discover_prompt: Option<bool>,
    pub rediscover_prompt: Option<bool>,
    pub check_if_output_complete: Option<bool>,
    pub wait_before_clearing_buffer: Option<u64>,
    pub ssh_command: Option<String>,
    pub telnet_command: Option<String>,
    pub prompt_regexp: Option<String>,
    pub prompt_pattern: Option<String>,
    /// Path to an on-disk prompt cache; only meaningful on the `common`
    /// driver per the configuration file grammar.
    pub cache: Option<String>,
}

macro_rules! fallthrough_attr {
    ($name:ident, $ty:ty, $default:expr) => {
        pub fn $name(&self) -> $ty {
            let mut cur = self;
            loop {
                if let Some(v) = cur.$name {
                    return v;
                }
                match &cur.parent {
                    Some(p) => cur = p,
                    None => return $default,
                }
            }
        }
    };
}

macro_rules! fallthrough_attr_opt_string {
    ($name:ident) => {
        pub fn $name(&self) -> Option<&str> {
            let mut cur = self;
            loop {
                if let Some(v) = &cur.$name {
                    return Some(v.as_str());
                }
                match &cur.parent {
                    Some(p) => cur = p,
                    None => return None,
                }
            }
        }
    };
}

impl Driver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: Arc<Driver>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_event(
        mut self,
        key: impl Into<String>,
        pattern: impl Into<String>,
        action: Option<&str>,
        begin_state: impl Into<String>,
        end_state: impl Into<String>,
    ) -> Self {
        self.events.insert(
            key.into(),
            TransitionSpec {
                pattern: Some(pattern.into()),
                action: action.map(|s| s.to_string()),
                begin_state: begin_state.into(),
                end_state: end_state.into(),
            },
        );
        self
    }

    pub fn with_transition(
        mut self,
        key: impl Into<String>,
        action: Option<&str>,
        begin_state: impl Into<String>,
        end_state: impl Into<String>,
    ) -> Self {
        self.transitions.insert(
            key.into(),
            TransitionSpec {
                pattern: None,
                action: action.map(|s| s.to_string()),
                begin_state: begin_state.into(),
                end_state: end_state.into(),
            },
        );
        self
    }

    fallthrough_attr!(max_wait, u64, DEFAULT_MAX_WAIT_SECS);
    fallthrough_attr!(discover_prompt, bool, false);
    fallthrough_attr!(rediscover_prompt, bool, false);
    fallthrough_attr!(check_if_output_complete, bool, false);
    fallthrough_attr!(wait_before_clearing_buffer, u64, 0);
    fallthrough_attr_opt_string!(ssh_command);
    fallthrough_attr_opt_string!(telnet_command);
    fallthrough_attr_opt_string!(prompt_regexp);
    fallthrough_attr_opt_string!(prompt_pattern);
    fallthrough_attr_opt_string!(cache);

    /// Every `(event_name, spec)` registration visible to this driver,
    /// merging `events` and `transitions` across the whole parent chain.
    /// Walks root-to-leaf so a child's definition for a given key replaces
    /// its ancestor's.
    pub fn merged_registrations(&self) -> Vec<(String, TransitionSpec)> {
        let mut chain = Vec::new();
        let mut cur = Some(self);
        while let Some(d) = cur {
            chain.push(d);
            cur = d.parent.as_deref();
        }
        chain.reverse();

        let mut merged: HashMap<String, TransitionSpec> = HashMap::new();
        for driver in chain {
            for (key, spec) in &driver.events {
                merged.insert(key.clone(), spec.clone());
            }
            for (key, spec) in &driver.transitions {
                merged.insert(key.clone(), spec.clone());
            }
        }
        merged.into_iter().collect()
    }
}

/// Process-wide set of named drivers, keyed by name.
///
/// Read-mostly after `load`: `get` hands out cheap `Arc` clones, safe for
/// concurrent readers. `load`/`reset`/`reload` take the write lock and
/// must be externally synchronized against any in-flight `Device`
/// construction, per the concurrency model.
pub struct Registry {
    drivers: RwLock<HashMap<String, Arc<Driver>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up a driver by name.
    pub fn get(&self, name: &str) -> Result<Arc<Driver>, SessionError> {
        self.drivers
            .read()
            .expect("driver registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::DriverNotFound(name.to_string()))
    }

    /// Installs a freshly-built driver set, replacing any previously
    /// loaded one. Callers should validate acyclicity before calling this
    /// (see [`crate::config::load`]) — `install` itself trusts its input.
    pub fn install(&self, drivers: HashMap<String, Arc<Driver>>) {
        debug!("installing {} driver(s)", drivers.len());
        *self.drivers.write().expect("driver registry lock poisoned") = drivers;
    }

    /// Wipes all registered drivers. Used before a `reload`, and by tests
    /// that want a clean registry.
    pub fn reset(&self) {
        self.drivers
            .write()
            .expect("driver registry lock poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.drivers.read().expect("driver registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide Configuration Registry singleton.
///
/// A `Lazy`-backed singleton, the same way a connection-pool handle
/// might be held process-wide, but holding a driver table instead.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
