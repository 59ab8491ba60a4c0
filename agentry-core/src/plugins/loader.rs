//! PluginLoader - resolves implementation references to fresh instances

use std::collections::BTreeMap;
use std::sync::Arc;

use agentry_plugin_api::{Plugin, PluginDescriptor, PluginError};

use super::builtin;
use super::error::{LoadCause, RuntimeError};

/// Builds a new, uninitialized instance of one variant
pub type PluginFactory = Arc<dyn Fn() -> Result<Box<dyn Plugin>, PluginError> + Send + Sync>;

/// Closed map of known variants keyed by implementation reference.
///
/// New variants are added explicitly at startup through [`register`];
/// there is no dynamic code loading.
///
/// [`register`]: PluginLoader::register
#[derive(Clone, Default)]
pub struct PluginLoader {
    providers: BTreeMap<String, PluginFactory>,
}

impl PluginLoader {
    /// A loader with no providers
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader with the built-in variants registered
    pub fn with_builtins() -> Self {
        let mut loader = Self::new();
        for (reference, factory) in builtin::factories() {
            // Built-in references are distinct, so registration cannot collide.
            loader.providers.insert(reference.to_string(), factory);
        }
        loader
    }

    /// Register a provider. Fails if the reference is already taken.
    pub fn register(
        &mut self,
        reference: impl Into<String>,
        factory: PluginFactory,
    ) -> Result<(), RuntimeError> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(RuntimeError::Config(
                "implementation reference must not be empty".to_string(),
            ));
        }
        if self.providers.contains_key(&reference) {
            return Err(RuntimeError::Config(format!(
                "implementation '{reference}' is already registered"
            )));
        }
        tracing::debug!(implementation = %reference, "Registered plugin provider");
        self.providers.insert(reference, factory);
        Ok(())
    }

    /// Convenience wrapper around [`register`](Self::register) for closures
    pub fn register_fn<F>(&mut self, reference: impl Into<String>, f: F) -> Result<(), RuntimeError>
    where
        F: Fn() -> Result<Box<dyn Plugin>, PluginError> + Send + Sync + 'static,
    {
        self.register(reference, Arc::new(f))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.providers.contains_key(reference)
    }

    /// Known implementation references, sorted
    pub fn references(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Resolve a reference and build an uninitialized instance.
    ///
    /// The produced instance must describe itself with a non-empty name and
    /// version, and its schema defaults must match their declared types.
    pub fn instantiate(&self, reference: &str) -> Result<Box<dyn Plugin>, RuntimeError> {
        let factory = self.providers.get(reference).ok_or_else(|| {
            RuntimeError::load(
                reference,
                LoadCause::UnknownImplementation(reference.to_string()),
            )
        })?;

        let instance = factory().map_err(|e| {
            RuntimeError::load(reference, LoadCause::Construction(e.to_string()))
        })?;

        validate(&instance.descriptor())
            .map_err(|reason| RuntimeError::load(reference, LoadCause::Construction(reason)))?;

        Ok(instance)
    }

    /// Descriptors of every known variant, built from throwaway instances
    pub fn describe_all(&self) -> Vec<(String, Result<PluginDescriptor, RuntimeError>)> {
        self.providers
            .keys()
            .map(|reference| {
                let descriptor = self.instantiate(reference).map(|p| p.descriptor());
                (reference.clone(), descriptor)
            })
            .collect()
    }
}

fn validate(descriptor: &PluginDescriptor) -> Result<(), String> {
    if descriptor.name.trim().is_empty() {
        return Err("descriptor has an empty name".to_string());
    }
    if descriptor.version.trim().is_empty() {
        return Err(format!("'{}' has an empty version", descriptor.name));
    }
    let mistyped = descriptor.schema.mistyped_defaults();
    if !mistyped.is_empty() {
        return Err(format!(
            "'{}' declares defaults of the wrong type: {}",
            descriptor.name,
            mistyped.join(", ")
        ));
    }
    Ok(())
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
