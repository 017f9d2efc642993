//! Per-device, per-state mapping from regex pattern to event name.
//!
//! Backed by an insertion-ordered `Vec` of `(pattern, event)` pairs per
//! state rather than `indexmap::IndexMap`: driver state and per-state
//! pattern counts are both small, and a linear scan avoids pulling in a
//! dependency with no other use in the crate (see DESIGN.md).

use std::collections::HashMap;

use regex::Regex;

use crate::error::SessionError;

/// The wildcard bucket key: patterns registered here are active in every
/// state, scanned after the state's own patterns.
pub const WILDCARD_STATE: &str = "*";

#[derive(Debug, Clone)]
struct PatternEntry {
    pattern: String,
    event: String,
}

/// Compiled, ordered pattern set for one device.
#[derive(Debug, Default)]
pub struct PatternMap {
    per_state: HashMap<String, Vec<PatternEntry>>,
    compiled: HashMap<String, Regex>,
}

impl PatternMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&mut self, pattern: &str) -> Result<(), SessionError> {
        if !self.compiled.contains_key(pattern) {
            let regex = Regex::new(pattern).map_err(|e| {
                SessionError::ConfigFileError(format!("invalid pattern '{pattern}': {e}"))
            })?;
            self.compiled.insert(pattern.to_string(), regex);
        }
        Ok(())
    }

    /// Binds `pattern` to `event` within `state`, replacing any prior
    /// pattern registered for that event in that state (the pattern
    /// uniqueness-per-event-per-state invariant).
    pub fn insert(&mut self, state: &str, pattern: &str, event: &str) -> Result<(), SessionError> {
        self.compile(pattern)?;
        let entries = self.per_state.entry(state.to_string()).or_default();
        entries.retain(|e| e.event != event);
        entries.push(PatternEntry {
            pattern: pattern.to_string(),
            event: event.to_string(),
        });
        Ok(())
    }

    /// Removes a literal pattern from `state`'s bucket, if present.
    /// No-op if the pattern was never registered.
    pub fn remove_pattern(&mut self, state: &str, pattern: &str) {
        if let Some(entries) = self.per_state.get_mut(state) {
            entries.retain(|e| e.pattern != pattern);
        }
    }

    /// Active pattern set for `state`: the state's own patterns (in
    /// registration order) followed by the wildcard bucket.
    pub fn active_patterns(&self, state: &str) -> Vec<(&Regex, &str, &str)> {
        let mut out = Vec::new();
        if let Some(entries) = self.per_state.get(state) {
            for entry in entries {
                out.push((
                    self.compiled.get(&entry.pattern).expect("compiled"),
                    entry.pattern.as_str(),
                    entry.event.as_str(),
                ));
            }
        }
        if state != WILDCARD_STATE {
            if let Some(entries) = self.per_state.get(WILDCARD_STATE) {
                for entry in entries {
                    out.push((
                        self.compiled.get(&entry.pattern).expect("compiled"),
                        entry.pattern.as_str(),
                        entry.event.as_str(),
                    ));
                }
            }
        }
        out
    }
}
