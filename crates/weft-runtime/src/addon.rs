//! Addon registry: named factories producing extensions.
//!
//! Graph nodes name their `addon`; at `start_graph` time the engine asks
//! the registry for one instance per extension node. Factories receive
//! the instance name so one addon can serve many nodes.

use crate::graph::GraphError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use weft_extension::Extension;

/// Factory producing one extension instance per graph node.
pub type ExtensionFactory = Box<dyn Fn(&str) -> Box<dyn Extension> + Send + Sync>;

/// Thread-safe registry of extension factories.
///
/// # Example
///
/// ```
/// use weft_runtime::AddonRegistry;
/// use weft_extension::Extension;
///
/// struct Echo;
/// impl Extension for Echo {}
///
/// let registry = AddonRegistry::new();
/// registry.register_extension("echo", Box::new(|_name| Box::new(Echo)));
/// assert!(registry.has_extension("echo"));
///
/// let _instance = registry.create_extension("echo", "a").unwrap();
/// assert!(registry.create_extension("ghost", "a").is_err());
/// ```
#[derive(Default)]
pub struct AddonRegistry {
    extensions: Mutex<HashMap<String, ExtensionFactory>>,
}

impl AddonRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry behind an [`Arc`], ready to share with
    /// an app.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Registers a factory under `addon`, replacing any previous one.
    pub fn register_extension(&self, addon: impl Into<String>, factory: ExtensionFactory) {
        self.extensions.lock().insert(addon.into(), factory);
    }

    /// Returns `true` if a factory is registered under `addon`.
    #[must_use]
    pub fn has_extension(&self, addon: &str) -> bool {
        self.extensions.lock().contains_key(addon)
    }

    /// Instantiates an extension for a node named `instance`.
    ///
    /// # Errors
    ///
    /// [`GraphError::MissingAddon`] when no factory is registered.
    pub fn create_extension(
        &self,
        addon: &str,
        instance: &str,
    ) -> Result<Box<dyn Extension>, GraphError> {
        let extensions = self.extensions.lock();
        let factory = extensions
            .get(addon)
            .ok_or_else(|| GraphError::MissingAddon(addon.to_string()))?;
        Ok(factory(instance))
    }
}

impl std::fmt::Debug for AddonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonRegistry")
            .field("extensions", &self.extensions.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use weft_extension::testing::TestEnv;
    use weft_msg::Message;

    struct Passive;
    impl Extension for Passive {}

    #[test]
    fn factories_receive_the_instance_name() {
        let registry = AddonRegistry::new();
        let seen: Arc<PlMutex<Vec<String>>> = Arc::new(PlMutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            registry.register_extension(
                "named",
                Box::new(move |name| {
                    seen.lock().push(name.to_string());
                    Box::new(Passive)
                }),
            );
        }

        // The factory runs per instance; drive the default on_cmd to make
        // sure the boxed instance is a live extension.
        let mut ext = registry.create_extension("named", "worker-3").unwrap();
        let mut env = TestEnv::new("worker-3");
        ext.on_cmd(&mut env, Message::cmd("ping"));

        assert_eq!(env.returned().len(), 1);
        assert_eq!(*seen.lock(), vec!["worker-3".to_string()]);
    }

    #[test]
    fn missing_addon_is_reported() {
        let registry = AddonRegistry::new();
        let err = match registry.create_extension("ghost", "a") {
            Err(e) => e,
            Ok(_) => panic!("expected missing addon error"),
        };
        assert!(matches!(err, GraphError::MissingAddon(_)));
    }

    #[test]
    fn registration_replaces() {
        let registry = AddonRegistry::new();
        registry.register_extension("x", Box::new(|_| Box::new(Passive)));
        registry.register_extension("x", Box::new(|_| Box::new(Passive)));
        assert!(registry.has_extension("x"));
    }
}
