//! Requestor discovery
//!
//! Providers contribute requestors; the registry indexes them by id,
//! category and provider. It is populated once at startup and read-only
//! afterwards, so lookups take no locks.

use super::{AnyRequestor, Requestor};
use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A source of requestors (one per external service)
pub trait Provider: Send + Sync {
    fn provider_id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn requestors(&self) -> Vec<Arc<dyn AnyRequestor>>;
}

/// A provider with a fixed requestor list
pub struct StaticProvider {
    provider_id: String,
    display_name: String,
    requestors: Vec<Arc<dyn AnyRequestor>>,
}

impl Provider for StaticProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn requestors(&self) -> Vec<Arc<dyn AnyRequestor>> {
        self.requestors.clone()
    }
}

/// Builder for [`StaticProvider`]
pub struct ProviderBuilder {
    provider_id: String,
    display_name: String,
    requestors: Vec<Arc<dyn AnyRequestor>>,
}

impl ProviderBuilder {
    pub fn new(provider_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            display_name: display_name.into(),
            requestors: Vec::new(),
        }
    }

    pub fn requestor(mut self, requestor: impl Requestor) -> Self {
        self.requestors.push(Arc::new(requestor));
        self
    }

    /// Every requestor must belong to this provider.
    pub fn build(self) -> Result<StaticProvider> {
        if let Some(stray) = self
            .requestors
            .iter()
            .find(|r| r.describe().provider_id() != self.provider_id)
        {
            return Err(Error::Registry(format!(
                "requestor {} does not belong to provider {}",
                stray.describe().requestor_id(),
                self.provider_id
            )));
        }
        Ok(StaticProvider {
            provider_id: self.provider_id,
            display_name: self.display_name,
            requestors: self.requestors,
        })
    }
}

/// Index of all known requestors, in declaration order
#[derive(Default)]
pub struct RequestorRegistry {
    entries: Vec<Arc<dyn AnyRequestor>>,
    by_id: HashMap<String, usize>,
    providers: Vec<(String, String)>,
}

impl RequestorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one requestor. Duplicate ids are rejected.
    pub fn register(&mut self, requestor: Arc<dyn AnyRequestor>) -> Result<()> {
        let id = requestor.describe().requestor_id().to_string();
        if self.by_id.contains_key(&id) {
            return Err(Error::Registry(format!("duplicate requestor id: {}", id)));
        }
        self.by_id.insert(id, self.entries.len());
        self.entries.push(requestor);
        Ok(())
    }

    /// Add every requestor a provider declares. Nothing is registered if
    /// any id collides.
    pub fn register_provider(&mut self, provider: &dyn Provider) -> Result<usize> {
        let requestors = provider.requestors();
        let mut seen = std::collections::HashSet::new();
        for r in &requestors {
            let id = r.describe().requestor_id();
            if self.by_id.contains_key(id) || !seen.insert(id.to_string()) {
                return Err(Error::Registry(format!("duplicate requestor id: {}", id)));
            }
        }

        let count = requestors.len();
        for r in requestors {
            self.register(r)?;
        }
        self.providers.push((
            provider.provider_id().to_string(),
            provider.display_name().to_string(),
        ));
        tracing::debug!(
            provider = provider.provider_id(),
            requestors = count,
            "Registered provider"
        );
        Ok(count)
    }

    pub fn get(&self, requestor_id: &str) -> Option<&Arc<dyn AnyRequestor>> {
        self.by_id.get(requestor_id).map(|&i| &self.entries[i])
    }

    /// Look up a requestor by id as its concrete type
    pub fn typed<R: Requestor>(&self, requestor_id: &str) -> Option<&R> {
        self.get(requestor_id)?.as_any().downcast_ref::<R>()
    }

    pub fn by_category(&self, category: ProviderCategory) -> Vec<&Arc<dyn AnyRequestor>> {
        self.entries
            .iter()
            .filter(|r| r.describe().category() == category)
            .collect()
    }

    pub fn by_provider(&self, provider_id: &str) -> Vec<&Arc<dyn AnyRequestor>> {
        self.entries
            .iter()
            .filter(|r| r.describe().provider_id() == provider_id)
            .collect()
    }

    pub fn all(&self) -> &[Arc<dyn AnyRequestor>] {
        &self.entries
    }

    /// Registered providers as `(id, display name)`
    pub fn providers(&self) -> &[(String, String)] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
