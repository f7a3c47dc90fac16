//! Adapter registry -- the closed set of language adapters, keyed by
//! [`LanguageId`].

use std::collections::HashMap;
use std::sync::Arc;

use super::trait_def::Adapter;
use super::{AplAdapter, BqnAdapter, JAdapter, KapAdapter, TinyAplAdapter, UiuaAdapter};
use crate::config::HarnessConfig;
use crate::language::LanguageId;
use crate::probe::Prober;

/// A collection of registered [`Adapter`] implementations.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<LanguageId, Box<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// One adapter for every [`LanguageId`], sharing `config` and `prober`.
    pub fn with_defaults(config: Arc<HarnessConfig>, prober: Arc<Prober>) -> Self {
        let mut registry = Self::new();
        registry.register(BqnAdapter::new());
        registry.register(AplAdapter::new(config.clone(), prober.clone()));
        registry.register(JAdapter::new(config.clone(), prober.clone()));
        registry.register(UiuaAdapter::new(config.clone(), prober.clone()));
        registry.register(KapAdapter::new(config.clone(), prober.clone()));
        registry.register(TinyAplAdapter::new(config, prober));
        registry
    }

    /// Register an adapter under [`Adapter::language`], returning any
    /// adapter it replaces.
    pub fn register(&mut self, adapter: impl Adapter + 'static) -> Option<Box<dyn Adapter>> {
        self.adapters.insert(adapter.language(), Box::new(adapter))
    }

    pub fn get(&self, language: LanguageId) -> Option<&dyn Adapter> {
        self.adapters.get(&language).map(|b| b.as_ref())
    }

    /// Registered languages in [`LanguageId`] order.
    pub fn list(&self) -> Vec<LanguageId> {
        let mut languages: Vec<_> = self.adapters.keys().copied().collect();
        languages.sort();
        languages
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.list())
            .finish()
    }
}
