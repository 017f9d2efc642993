//! Optional on-disk prompt cache interface. The storage engine is
//! out of scope for this crate; only the trait and a `NullCache`
//! default ship here.

use log::warn;

use crate::error::SessionError;
use crate::event::Prompt;

/// A `(device name, state) -> prompt text` store.
///
/// Both operations are best-effort: a failing implementation returns
/// `Err`, but every call site in the Expect Loop maps that to a logged
/// `warn!` and proceeds as though the cache had missed/succeeded. The
/// cache's own fallibility is real (a disk-backed implementation can
/// fail); the Expect Loop's behavior under that fallibility is not.
pub trait PromptCache: Send + Sync {
    fn get(&self, name: &str, state: &str) -> Result<Option<Prompt>, SessionError>;
    fn save(&self, name: &str, state: &str, prompt_text: &str) -> Result<(), SessionError>;
}

/// Always misses; `save` is a no-op. The default when no cache is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl PromptCache for NullCache {
    fn get(&self, _name: &str, _state: &str) -> Result<Option<Prompt>, SessionError> {
        Ok(None)
    }

    fn save(&self, _name: &str, _state: &str, _prompt_text: &str) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Looks up `(name, state)` in `cache`, logging and treating any error as
/// a miss. Never propagates into the Expect Loop.
pub fn get_or_log(cache: &dyn PromptCache, name: &str, state: &str) -> Option<Prompt> {
    match cache.get(name, state) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!("prompt cache get({name}, {state}) failed, treating as miss: {e}");
            None
        }
    }
}

/// Saves `(name, state) -> prompt_text` into `cache`, logging and
/// swallowing any error.
pub fn save_or_log(cache: &dyn PromptCache, name: &str, state: &str, prompt_text: &str) {
    if let Err(e) = cache.save(name, state, prompt_text) {
        warn!("prompt cache save({name}, {state}) failed, ignoring: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryCache {
        entries: Mutex<HashMap<(String, String), String>>,
    }

    impl PromptCache for InMemoryCache {
        fn get(&self, name: &str, state: &str) -> Result<Option<Prompt>, SessionError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .get(&(name.to_string(), state.to_string()))
                .cloned()
                .map(Prompt::confirmed))
        }

        fn save(&self, name: &str, state: &str, prompt_text: &str) -> Result<(), SessionError> {
            self.entries.lock().unwrap().insert(
                (name.to_string(), state.to_string()),
                prompt_text.to_string(),
            );
            Ok(())
        }
    }

    #[test]
    fn null_cache_always_misses() {
        let cache = NullCache;
        assert!(cache.get("d", "GROUND").unwrap().is_none());
        assert!(cache.save("d", "GROUND", "foo# ").is_ok());
    }

    #[test]
    fn cache_round_trip() {
        let cache = InMemoryCache::default();
        cache.save("router1", "ENABLE", "router1# ").unwrap();
        let got = cache.get("router1", "ENABLE").unwrap().unwrap();
        assert_eq!(got.value, "router1# ");
    }

    struct FailingCache;
    impl PromptCache for FailingCache {
        fn get(&self, _name: &str, _state: &str) -> Result<Option<Prompt>, SessionError> {
            Err(SessionError::ConfigFileError("disk offline".to_string()))
        }
        fn save(&self, _name: &str, _state: &str, _prompt_text: &str) -> Result<(), SessionError> {
            Err(SessionError::ConfigFileError("disk offline".to_string()))
        }
    }

    #[test]
    fn failing_cache_is_treated_as_miss_not_propagated() {
        let cache = FailingCache;
        assert!(get_or_log(&cache, "d", "GROUND").is_none());
        save_or_log(&cache, "d", "GROUND", "foo# ");
    }
}
