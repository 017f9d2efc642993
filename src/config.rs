//! Configuration file loading.
//!
//! Deserializes the declarative driver configuration (one `[drivers.*]`
//! table per driver) into the `Driver` records the Configuration Registry
//! holds. `parent` references are resolved, and checked for cycles, after
//! every table in the file has been parsed — `load` is all-or-nothing: a
//! malformed file registers nothing.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::Deserialize;

use crate::driver::{Driver, Registry, TransitionSpec, REGISTRY};
use crate::error::SessionError;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    drivers: HashMap<String, DriverToml>,
}

#[derive(Debug, Deserialize, Default)]
struct DriverToml {
    parent: Option<String>,
    #[serde(rename = "maxWait")]
    max_wait: Option<u64>,
    #[serde(rename = "discoverPrompt")]
    discover_prompt: Option<bool>,
    #[serde(rename = "rediscoverPrompt")]
    rediscover_prompt: Option<bool>,
    #[serde(rename = "checkIfOutputComplete")]
    check_if_output_complete: Option<bool>,
    #[serde(rename = "waitBeforeClearingBuffer")]
    wait_before_clearing_buffer: Option<u64>,
    #[serde(rename = "sshCommand")]
    ssh_command: Option<String>,
    #[serde(rename = "telnetCommand")]
    telnet_command: Option<String>,
    #[serde(rename = "promptRegexp")]
    prompt_regexp: Option<String>,
    #[serde(rename = "promptPattern")]
    prompt_pattern: Option<String>,
    cache: Option<String>,
    #[serde(default)]
    events: HashMap<String, EventToml>,
    #[serde(default)]
    transitions: HashMap<String, TransitionToml>,
}

#[derive(Debug, Deserialize)]
struct EventToml {
    pattern: Option<String>,
    action: Option<String>,
    #[serde(rename = "beginState")]
    begin_state: String,
    #[serde(rename = "endState")]
    end_state: String,
}

#[derive(Debug, Deserialize)]
struct TransitionToml {
    action: Option<String>,
    #[serde(rename = "beginState")]
    begin_state: String,
    #[serde(rename = "endState")]
    end_state: String,
}

/// Parses `toml_source` and returns the fully-resolved driver set without
/// touching the global registry. Exposed for tests and for callers that
/// want to build their own `Registry` instance instead of using the
/// process-wide singleton.
pub fn parse(toml_source: &str) -> Result<HashMap<String, Arc<Driver>>, SessionError> {
    let file: ConfigFile = toml::from_str(toml_source)
        .map_err(|e| SessionError::ConfigFileError(format!("toml parse error: {e}")))?;

    check_parents_exist(&file)?;
    check_acyclic(&file)?;

    let mut resolved: HashMap<String, Arc<Driver>> = HashMap::new();
    let order = topo_order(&file)?;
    for name in order {
        let raw = &file.drivers[&name];
        let parent = match &raw.parent {
            Some(p) => Some(
                resolved
                    .get(p)
                    .cloned()
                    .expect("parent resolved before child by topo order"),
            ),
            None => None,
        };
        let driver = build_driver(&name, raw, parent);
        resolved.insert(name, Arc::new(driver));
    }
    Ok(resolved)
}

/// Loads a configuration file from `path` and installs it into the
/// process-wide [`REGISTRY`].
pub fn load(path: &str) -> Result<(), SessionError> {
    load_into(&REGISTRY, path)
}

/// Loads a configuration file from `path` and installs it into `registry`.
pub fn load_into(registry: &Registry, path: &str) -> Result<(), SessionError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| SessionError::ConfigFileError(format!("reading {path}: {e}")))?;
    let drivers = parse(&contents)?;
    debug!("loaded {} driver(s) from {}", drivers.len(), path);
    registry.install(drivers);
    Ok(())
}

fn check_parents_exist(file: &ConfigFile) -> Result<(), SessionError> {
    for (name, raw) in &file.drivers {
        if let Some(parent) = &raw.parent {
            if !file.drivers.contains_key(parent) {
                return Err(SessionError::ConfigFileError(format!(
                    "driver '{name}' names parent '{parent}' which is not defined in this file"
                )));
            }
        }
    }
    Ok(())
}

fn check_acyclic(file: &ConfigFile) -> Result<(), SessionError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = file
        .drivers
        .keys()
        .map(|k| (k.as_str(), Mark::Unvisited))
        .collect();

    fn visit<'a>(
        name: &'a str,
        file: &'a ConfigFile,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), SessionError> {
        match marks.get(name).copied() {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                return Err(SessionError::ConfigFileError(format!(
                    "driver '{name}' has a cyclic parent chain"
                )));
            }
            _ => {}
        }
        marks.insert(name, Mark::InProgress);
        if let Some(parent) = file.drivers[name].parent.as_deref() {
            visit(parent, file, marks)?;
        }
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for name in file.drivers.keys() {
        visit(name, file, &mut marks)?;
    }
    Ok(())
}

/// Returns driver names in an order where every parent precedes its
/// children; acyclicity has already been checked by `check_acyclic`.
fn topo_order(file: &ConfigFile) -> Result<Vec<String>, SessionError> {
    let mut order = Vec::with_capacity(file.drivers.len());
    let mut done: HashMap<&str, bool> = HashMap::new();

    fn visit<'a>(
        name: &'a str,
        file: &'a ConfigFile,
        done: &mut HashMap<&'a str, bool>,
        order: &mut Vec<String>,
    ) {
        if done.get(name).copied().unwrap_or(false) {
            return;
        }
        if let Some(parent) = file.drivers[name].parent.as_deref() {
            visit(parent, file, done, order);
        }
        done.insert(name, true);
        order.push(name.to_string());
    }

    for name in file.drivers.keys() {
        visit(name, file, &mut done, &mut order);
    }
    Ok(order)
}

fn build_driver(name: &str, raw: &DriverToml, parent: Option<Arc<Driver>>) -> Driver {
    let events = raw
        .events
        .iter()
        .map(|(key, e)| {
            (
                key.clone(),
                TransitionSpec {
                    pattern: e.pattern.clone(),
                    action: e.action.clone(),
                    begin_state: e.begin_state.clone(),
                    end_state: e.end_state.clone(),
                },
            )
        })
        .collect();

    let transitions = raw
        .transitions
        .iter()
        .map(|(key, t)| {
            (
                key.clone(),
                TransitionSpec {
                    pattern: None,
                    action: t.action.clone(),
                    begin_state: t.begin_state.clone(),
                    end_state: t.end_state.clone(),
                },
            )
        })
        .collect();

    if raw.cache.is_some() && name != "common" {
        warn!("driver '{name}' sets 'cache' outside of [drivers.common]; ignoring placement, value still applied to this driver");
    }

    Driver {
        name: name.to_string(),
        parent,
        events,
        transitions,
        max_wait: raw.max_wait,
        discover_prompt: raw.discover_prompt,
        rediscover_prompt: raw.rediscover_prompt,
        check_if_output_complete: raw.check_if_output_complete,
        wait_before_clearing_buffer: raw.wait_before_clearing_buffer,
        ssh_command: raw.ssh_command.clone(),
        telnet_command: raw.telnet_command.clone(),
        prompt_regexp: raw.prompt_regexp.clone(),
        prompt_pattern: raw.prompt_pattern.clone(),
        cache: raw.cache.clone(),
    }
}
