//! Explicit name -> handler registry, replacing dynamic multi-namespace
//! action resolution with handlers resolved once at FSM-build time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::device::Device;
use crate::error::SessionError;
use crate::transport::Transport;

/// A driver action: runs against the device that owns the FSM invoking it.
pub type ActionFn<T> = Arc<dyn Fn(&mut Device<T>) -> Result<(), SessionError> + Send + Sync>;

/// A resolved action, optionally partially applied with arguments bound at
/// registration time (the `:name:arg1:arg2:` form from the configuration
/// file grammar).
pub struct BoundAction<T: Transport> {
    name: String,
    args: Vec<String>,
    handler: ActionFn<T>,
}

// Written by hand rather than `#[derive(Clone)]`: the derive would add a
// spurious `T: Clone` bound even though cloning only touches the `Arc`.
impl<T: Transport> Clone for BoundAction<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            args: self.args.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for BoundAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl<T: Transport> BoundAction<T> {
    pub fn invoke(&self, device: &mut Device<T>) -> Result<(), SessionError> {
        if !self.args.is_empty() {
            device.bound_action_args = self.args.clone();
        }
        (self.handler)(device)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds an action programmatically rather than resolving a name
    /// against the registry. Used for the engine's own built-in default
    /// handler, which is installed unless a driver declares its own
    /// `*`/`*` transition.
    pub(crate) fn engine_builtin(name: impl Into<String>, handler: ActionFn<T>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            handler,
        }
    }
}

/// A process-wide (or caller-owned) mapping from action name to handler.
///
/// Built-ins cover the handful of actions a bare driver configuration
/// commonly wants; callers extend it before constructing a `Registry` so
/// that every driver's actions resolve at FSM-build time rather than at
/// dispatch time.
pub struct ActionRegistry<T: Transport> {
    handlers: HashMap<String, ActionFn<T>>,
}

impl<T: Transport> Clone for ActionRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<T: Transport> Default for ActionRegistry<T> {
    fn default() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register("ignore", Arc::new(|_device| Ok(())));
        registry.register(
            "disconnect",
            Arc::new(|device: &mut Device<T>| {
                device.request_close();
                Ok(())
            }),
        );
        registry.register(
            "fail",
            Arc::new(|device: &mut Device<T>| {
                let reason = if device.bound_action_args.is_empty() {
                    "driver action 'fail' invoked".to_string()
                } else {
                    device.bound_action_args.join(" ")
                };
                Err(SessionError::CommandExecutionError(reason))
            }),
        );
        registry.register(
            "permission_denied",
            Arc::new(|device: &mut Device<T>| {
                Err(SessionError::PermissionDenied {
                    log: Some(device.interaction_log.clone()),
                })
            }),
        );
        registry.register(
            "send_username",
            Arc::new(|device: &mut Device<T>| {
                device.queue_send(device.username.clone().unwrap_or_default());
                Ok(())
            }),
        );
        registry.register(
            "send_password",
            Arc::new(|device: &mut Device<T>| {
                device.queue_send(device.password.clone().unwrap_or_default());
                Ok(())
            }),
        );
        registry.register(
            "send_line",
            Arc::new(|device: &mut Device<T>| {
                device.queue_send(device.bound_action_args.join(" "));
                Ok(())
            }),
        );
        registry
    }
}

impl<T: Transport> ActionRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a zero-argument handler under `name`, replacing any prior
    /// registration.
    pub fn register(&mut self, name: impl Into<String>, handler: ActionFn<T>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Resolves an action string from the configuration file grammar:
    /// either a bare name, or `:name:arg1:arg2:` for partial application.
    ///
    /// Returns `EventHandlerUndefined` if the named handler was never
    /// registered; this is checked at FSM-build time so a misconfigured
    /// driver fails before any I/O is attempted.
    pub fn resolve(&self, action: &str) -> Result<BoundAction<T>, SessionError> {
        let (name, args) = parse_action_string(action);
        let handler = self
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::EventHandlerUndefined(name.to_string()))?;
        Ok(BoundAction {
            name: name.to_string(),
            args,
            handler,
        })
    }
}

/// Splits `:name:arg1:arg2:` into `(name, args)`; a bare name with no
/// leading/trailing colons is returned with an empty argument list.
fn parse_action_string(action: &str) -> (&str, Vec<String>) {
    if action.len() >= 2 && action.starts_with(':') && action.ends_with(':') {
        let inner = &action[1..action.len() - 1];
        let mut parts = inner.split(':');
        let name = parts.next().unwrap_or("");
        let args = parts.map(|s| s.to_string()).collect();
        (name, args)
    } else {
        (action, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullTransport;

    #[test]
    fn bare_name_has_no_args() {
        let (name, args) = parse_action_string("ignore");
        assert_eq!(name, "ignore");
        assert!(args.is_empty());
    }

    #[test]
    fn partial_application_splits_args() {
        let (name, args) = parse_action_string(":send_line:su:root:");
        assert_eq!(name, "send_line");
        assert_eq!(args, vec!["su".to_string(), "root".to_string()]);
    }

    #[test]
    fn unresolved_name_is_event_handler_undefined() {
        let registry = ActionRegistry::new();
        let err = registry.resolve("no_such_handler").unwrap_err();
        assert!(matches!(err, SessionError::EventHandlerUndefined(_)));
    }

    #[test]
    fn builtin_ignore_resolves() {
        let registry = ActionRegistry::new();
        assert!(registry.resolve("ignore").is_ok());
    }
}
