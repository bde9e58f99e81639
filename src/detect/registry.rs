use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};

use super::backend::{DetectorBackend, PrimaryInput};
use super::result::RawDetections;

/// Thread-safe registry of primary detector backends.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
/// Worker threads scanning different images share one loaded model through the registry.
/// A backend that panicked mid-call leaves its lock poisoned; the guard is recovered so
/// the next image still reaches the backend.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    /// Name of the default backend.
    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Model file of the default backend, if it has one.
    pub fn default_model_name(&self) -> Option<String> {
        let backend = self.default_backend()?;
        let guard = backend.lock().unwrap_or_else(PoisonError::into_inner);
        guard.model_name()
    }

    /// Warm up every registered backend.
    pub fn warm_up(&self) -> Result<()> {
        for (name, backend) in &self.backends {
            let mut guard = backend.lock().unwrap_or_else(PoisonError::into_inner);
            guard
                .warm_up()
                .map_err(|e| anyhow!("backend '{}' warm-up failed: {:#}", name, e))?;
        }
        Ok(())
    }

    /// Run detection with the default backend.
    pub fn detect_with_default(
        &self,
        input: &PrimaryInput<'_>,
        threshold: f32,
    ) -> Result<RawDetections> {
        let backend = self
            .default_backend()
            .ok_or_else(|| anyhow!("no primary detector registered"))?;
        let mut guard = backend.lock().unwrap_or_else(PoisonError::into_inner);
        guard.detect(input, threshold)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
