//! Plugin authentication hooks: an ordered list of credential
//! resolvers tried before `connect`. The engine does not define discovery
//! of resolver implementations — callers register them
//! explicitly.

use std::sync::{Arc, RwLock};

use log::debug;

use crate::device::Device;
use crate::transport::Transport;

/// Takes the target `Device`, returns whether it resolved credentials.
/// May mutate `username`/`password` on the device as a side effect.
pub type CredentialResolver<T> = Arc<dyn Fn(&mut Device<T>) -> bool + Send + Sync>;

/// An ordered, per-caller list of registered resolvers (design
/// note: unlike the Configuration Registry this is not a process-wide
/// singleton — the caller threads it explicitly through to `connect`).
pub struct ResolverChain<T: Transport> {
    resolvers: RwLock<Vec<CredentialResolver<T>>>,
}

impl<T: Transport> Default for ResolverChain<T> {
    fn default() -> Self {
        Self {
            resolvers: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Transport> ResolverChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, resolver: CredentialResolver<T>) {
        self.resolvers.write().expect("resolver chain lock poisoned").push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.read().expect("resolver chain lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs resolvers in registration order against `device`, stopping at
    /// the first truthy result. Returns whether any resolver fired.
    pub fn resolve(&self, device: &mut Device<T>) -> bool {
        let resolvers: Vec<CredentialResolver<T>> =
            self.resolvers.read().expect("resolver chain lock poisoned").clone();
        for (i, resolver) in resolvers.iter().enumerate() {
            if resolver(device) {
                debug!("credential resolver #{i} resolved credentials for '{}'", device.name);
                return true;
            }
        }
        false
    }
}
