//! Per-device transition tables and the fixed dispatch precedence over them.
use std::collections::HashMap;

use log::trace;

use crate::actions::{ActionRegistry, BoundAction};
use crate::driver::Driver;
use crate::error::SessionError;
use crate::pattern_map::PatternMap;
use crate::transport::Transport;

/// Bounded so a misconfigured driver whose synthesized state-named events
/// keep triggering further state changes can't livelock the dispatch loop.
pub const MAX_SYNTHESIZED_EVENT_DEPTH: u32 = 8;

type TableEntry<T> = (Option<BoundAction<T>>, Option<String>);

/// Per-device transition tables plus the fixed dispatch precedence.
///
/// Built once from a `Driver`'s merged registrations by [`build`], then
/// consulted (read-only) by `Device::process` for the lifetime of the
/// device — except during prompt discovery, which installs and later
/// removes callbacks via `add_event_action`/`remove_event_action`.
pub struct Fsm<T: Transport> {
    state_transitions: HashMap<(String, String), TableEntry<T>>,
    state_transitions_any: HashMap<String, TableEntry<T>>,
    input_transitions_any: HashMap<String, TableEntry<T>>,
    default_transition: Option<TableEntry<T>>,
}

impl<T: Transport> Default for Fsm<T> {
    fn default() -> Self {
        Self {
            state_transitions: HashMap::new(),
            state_transitions_any: HashMap::new(),
            input_transitions_any: HashMap::new(),
            default_transition: None,
        }
    }
}

/// `begin_state`/`event` of `"*"` or `""` both mean "any".
fn is_wildcard(s: &str) -> bool {
    s.is_empty() || s == "*"
}

fn normalize_end_state(end_state: &str) -> Option<String> {
    if end_state.is_empty() {
        None
    } else {
        Some(end_state.to_string())
    }
}

impl<T: Transport> Fsm<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `(action, next_state)` for `event` in `begin_state`, and,
    /// if `pattern` is non-empty, the matching `pattern_map` binding.
    /// Selects the dispatch scope by whether `event`/`begin_state` are
    /// wildcards: both wildcard -> `default_transition`; state wildcard ->
    /// `input_transitions_any`; event wildcard -> `state_transitions_any`;
    /// neither -> `state_transitions`.
    pub fn add_event_action(
        &mut self,
        pattern_map: &mut PatternMap,
        event: &str,
        pattern: Option<&str>,
        begin_state: &str,
        end_state: &str,
        action: Option<BoundAction<T>>,
    ) -> Result<(), SessionError> {
        let next_state = normalize_end_state(end_state);
        let event_is_any = is_wildcard(event);
        let state_is_any = is_wildcard(begin_state);

        let pattern_state = if state_is_any {
            crate::pattern_map::WILDCARD_STATE
        } else {
            begin_state
        };
        if let Some(p) = pattern {
            if !p.is_empty() {
                let pattern_event = if event_is_any { "*" } else { event };
                pattern_map.insert(pattern_state, p, pattern_event)?;
            }
        }

        match (event_is_any, state_is_any) {
            (true, true) => {
                self.default_transition = Some((action, next_state));
            }
            (true, false) => {
                self.state_transitions_any
                    .insert(begin_state.to_string(), (action, next_state));
            }
            (false, true) => {
                self.input_transitions_any
                    .insert(event.to_string(), (action, next_state));
            }
            (false, false) => {
                self.state_transitions.insert(
                    (event.to_string(), begin_state.to_string()),
                    (action, next_state),
                );
            }
        }
        Ok(())
    }

    /// No-ops when the named entry was never registered.
    pub fn remove_event_action(&mut self, event: &str, begin_state: &str) {
        let event_is_any = is_wildcard(event);
        let state_is_any = is_wildcard(begin_state);
        match (event_is_any, state_is_any) {
            (true, true) => {
                self.default_transition = None;
            }
            (true, false) => {
                self.state_transitions_any.remove(begin_state);
            }
            (false, true) => {
                self.input_transitions_any.remove(event);
            }
            (false, false) => {
                self.state_transitions
                    .remove(&(event.to_string(), begin_state.to_string()));
            }
        }
    }

    /// Whether a driver (or an earlier call to `add_event_action`) already
    /// installed a `*`/`*` fallback. `Device::new` installs the built-in
    /// default handler only when this is `false`.
    pub fn has_default(&self) -> bool {
        self.default_transition.is_some()
    }

    /// Temporarily overrides `(event, state)` with a no-op entry (no
    /// action, no transition), returning whatever was registered there so
    /// the caller can put it back with `restore_intercepted`. Because
    /// `dispatch` checks `state_transitions` before any wildcard tier, the
    /// override wins regardless of which tier the real registration (if
    /// any) lives in.
    pub fn intercept(&mut self, event: &str, state: &str) -> Option<TableEntry<T>> {
        self.state_transitions
            .insert((event.to_string(), state.to_string()), (None, None))
    }

    /// Undoes `intercept`: puts `previous` back if it was `Some`,
    /// otherwise removes the override so a lower-precedence tier (if any)
    /// is consulted again.
    pub fn restore_intercepted(&mut self, event: &str, state: &str, previous: Option<TableEntry<T>>) {
        let key = (event.to_string(), state.to_string());
        match previous {
            Some(entry) => {
                self.state_transitions.insert(key, entry);
            }
            None => {
                self.state_transitions.remove(&key);
            }
        }
    }

    /// Dispatch precedence, cloning out the resolved entry so the
    /// caller can invoke the action without holding a borrow on `self`.
    pub fn dispatch(&self, event_name: &str, state: &str) -> Option<TableEntry<T>> {
        if let Some(entry) = self
            .state_transitions
            .get(&(event_name.to_string(), state.to_string()))
        {
            trace!("fsm: state_transitions[({event_name}, {state})] matched");
            return Some(entry.clone());
        }
        if let Some(entry) = self.state_transitions_any.get(state) {
            trace!("fsm: state_transitions_any[{state}] matched");
            return Some(entry.clone());
        }
        if let Some(entry) = self.input_transitions_any.get(event_name) {
            trace!("fsm: input_transitions_any[{event_name}] matched");
            return Some(entry.clone());
        }
        if let Some(entry) = &self.default_transition {
            trace!("fsm: default_transition matched");
            return Some(entry.clone());
        }
        None
    }
}

/// Builds `(Fsm, PatternMap)` from a driver's merged event/transition
/// registrations, resolving each `action` string against `actions`.
/// An action name with no registered handler raises `EventHandlerUndefined`
/// here, at build time, rather than at dispatch time.
pub fn build<T: Transport>(
    driver: &Driver,
    actions: &ActionRegistry<T>,
) -> Result<(Fsm<T>, PatternMap), SessionError> {
    let mut fsm = Fsm::new();
    let mut pattern_map = PatternMap::new();

    for (event_name, spec) in driver.merged_registrations() {
        let action = match &spec.action {
            Some(name) => Some(actions.resolve(name)?),
            None => None,
        };
        fsm.add_event_action(
            &mut pattern_map,
            &event_name,
            spec.pattern.as_deref(),
            &spec.begin_state,
            &spec.end_state,
            action,
        )?;
    }

    Ok((fsm, pattern_map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullTransport;

    #[test]
    fn dispatch_precedence_most_specific_wins() {
        let mut fsm: Fsm<NullTransport> = Fsm::new();
        let mut patterns = PatternMap::new();
        fsm.add_event_action(&mut patterns, "*", None, "*", "DEFAULT", None)
            .unwrap();
        fsm.add_event_action(&mut patterns, "timeout", None, "*", "ANY_EVENT", None)
            .unwrap();
        fsm.add_event_action(&mut patterns, "*", None, "GROUND", "ANY_STATE", None)
            .unwrap();
        fsm.add_event_action(&mut patterns, "timeout", None, "GROUND", "SPECIFIC", None)
            .unwrap();

        let (_, next) = fsm.dispatch("timeout", "GROUND").unwrap();
        assert_eq!(next.as_deref(), Some("SPECIFIC"));

        let (_, next) = fsm.dispatch("timeout", "PASSWD").unwrap();
        assert_eq!(next.as_deref(), Some("ANY_EVENT"));

        let (_, next) = fsm.dispatch("eof", "GROUND").unwrap();
        assert_eq!(next.as_deref(), Some("ANY_STATE"));

        let (_, next) = fsm.dispatch("eof", "PASSWD").unwrap();
        assert_eq!(next.as_deref(), Some("DEFAULT"));
    }

    #[test]
    fn missing_entry_returns_none() {
        let fsm: Fsm<NullTransport> = Fsm::new();
        assert!(fsm.dispatch("timeout", "GROUND").is_none());
    }

    #[test]
    fn remove_never_added_is_noop() {
        let mut fsm: Fsm<NullTransport> = Fsm::new();
        fsm.remove_event_action("timeout", "GROUND");
        assert!(fsm.dispatch("timeout", "GROUND").is_none());
    }

    #[test]
    fn intercept_suppresses_existing_transition_until_restored() {
        let mut fsm: Fsm<NullTransport> = Fsm::new();
        let mut patterns = PatternMap::new();
        fsm.add_event_action(&mut patterns, "prompt-match", None, "GROUND", "ENABLE", None)
            .unwrap();

        let saved = fsm.intercept("prompt-match", "GROUND");
        let (_, next) = fsm.dispatch("prompt-match", "GROUND").unwrap();
        assert_eq!(next, None);

        fsm.restore_intercepted("prompt-match", "GROUND", saved);
        let (_, next) = fsm.dispatch("prompt-match", "GROUND").unwrap();
        assert_eq!(next.as_deref(), Some("ENABLE"));
    }

    #[test]
    fn intercept_with_nothing_previously_registered_restores_to_none() {
        let mut fsm: Fsm<NullTransport> = Fsm::new();
        let saved = fsm.intercept("timeout", "GROUND");
        assert!(saved.is_none());
        assert!(fsm.dispatch("timeout", "GROUND").is_some());

        fsm.restore_intercepted("timeout", "GROUND", saved);
        assert!(fsm.dispatch("timeout", "GROUND").is_none());
    }

    #[test]
    fn build_rejects_unresolved_action_name() {
        let driver = Driver::new("bare").with_event(
            "password_prompt",
            "Password:",
            Some("no_such_handler"),
            "GROUND",
            "PASSWD",
        );
        let actions: ActionRegistry<NullTransport> = ActionRegistry::new();
        let err = build(&driver, &actions).unwrap_err();
        assert!(matches!(err, SessionError::EventHandlerUndefined(_)));
    }
}
