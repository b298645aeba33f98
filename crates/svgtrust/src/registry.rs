//! Process-wide fallback security options.
//!
//! Meant to be set once at startup. Loaders take a [`SecurityRegistry`] handle
//! explicitly; [`SecurityRegistry::global`] hands out the shared process-wide
//! instance.

use std::sync::{Arc, OnceLock, RwLock};

use crate::policy::SecurityOptions;

/// Shared handle to the fallback options.
#[derive(Debug, Clone, Default)]
pub struct SecurityRegistry {
    inner: Arc<RwLock<Option<SecurityOptions>>>,
}

impl SecurityRegistry {
    /// Empty registry (no fallback policy).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `options`.
    pub fn with_options(options: SecurityOptions) -> Self {
        let registry = Self::new();
        registry.set(Some(options));
        registry
    }

    /// The process-wide registry.
    pub fn global() -> &'static SecurityRegistry {
        static GLOBAL: OnceLock<SecurityRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SecurityRegistry::new)
    }

    /// Replace the fallback options (`None` removes them).
    pub fn set(&self, options: Option<SecurityOptions>) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = options;
    }

    /// Snapshot of the current fallback options.
    pub fn get(&self) -> Option<SecurityOptions> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove the fallback options.
    pub fn clear(&self) {
        self.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::KeyMaterial;
    use serial_test::serial;

    #[test]
    fn test_set_get_clear() {
        let registry = SecurityRegistry::new();
        assert!(registry.get().is_none());

        registry.set(Some(SecurityOptions::default().with_public_key("k")));
        assert_eq!(
            registry.get().and_then(|o| o.public_key),
            Some(KeyMaterial::from("k"))
        );

        registry.clear();
        assert!(registry.get().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SecurityRegistry::new();
        let handle = registry.clone();
        handle.set(Some(SecurityOptions::disabled()));
        assert_eq!(registry.get().and_then(|o| o.enabled), Some(false));
    }

    #[test]
    #[serial]
    fn test_global_is_shared() {
        SecurityRegistry::global().set(Some(SecurityOptions::default().with_max_bytes(1)));
        assert_eq!(
            SecurityRegistry::global().get().and_then(|o| o.max_bytes),
            Some(1)
        );
        SecurityRegistry::global().clear();
        assert!(SecurityRegistry::global().get().is_none());
    }
}
