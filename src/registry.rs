use std::sync::Arc;

use crate::{Adapter, Error};

/// Process-wide map of attached interfaces, keyed by name.
///
/// The control path resolves the interface named in a request to its
/// adapter here; detach hands the adapter back so the caller can restore
/// the interface before dropping it.
pub struct Registry {
    adapters: dashmap::DashMap<String, Arc<Adapter>>,
}
impl Registry {
    pub fn new() -> Self {
        Self { adapters: dashmap::DashMap::new() }
    }

    /// Attach an adapter under its interface name; rejects duplicates
    pub fn attach(&self, adapter: Arc<Adapter>) -> Result<(), Error> {
        let name = adapter.name().to_string();
        match self.adapters.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::InterfaceExists { name }),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(adapter);
                Ok(())
            }
        }
    }

    /// Grab a reference to the adapter for interface `name`
    pub fn lookup(&self, name: &str) -> Result<Arc<Adapter>, Error> {
        self.adapters
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UnknownInterface { name: name.to_string() })
    }

    /// Remove and return the adapter for interface `name`
    pub fn detach(&self, name: &str) -> Result<Arc<Adapter>, Error> {
        self.adapters
            .remove(name)
            .map(|(_, adapter)| adapter)
            .ok_or_else(|| Error::UnknownInterface { name: name.to_string() })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
