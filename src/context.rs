use crate::config::EngineConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Interned name handle. Comparisons are integer compares; the owning
/// [`IdTable`] resolves back to the string form for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId(u32);

impl NameId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Name → id table built while assets load. One table per engine context;
/// ids from different contexts must not be mixed.
#[derive(Default)]
pub struct IdTable {
    names: Vec<Arc<str>>,
    lookup: HashMap<Arc<str>, NameId>,
}

impl IdTable {
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let arc: Arc<str> = Arc::from(name);
        let id = NameId(self.names.len() as u32);
        self.names.push(Arc::clone(&arc));
        self.lookup.insert(arc, id);
        id
    }

    pub fn get(&self, name: &str) -> Option<NameId> {
        self.lookup.get(name).copied()
    }

    pub fn resolve(&self, id: NameId) -> Option<&str> {
        self.names.get(id.index()).map(|name| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Owns everything the engine components share: the interner and the loaded
/// configuration. Passed by reference into whatever needs it, so several
/// independent puppet instances can coexist with their own contexts; dropping
/// the context releases the table.
pub struct EngineContext {
    pub config: EngineConfig,
    ids: IdTable,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, ids: IdTable::default() }
    }

    pub fn ids(&self) -> &IdTable {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdTable {
        &mut self.ids
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_and_resolvable() {
        let mut table = IdTable::default();
        let angle = table.intern("ParamAngleX");
        let same = table.intern("ParamAngleX");
        let other = table.intern("ParamAngleY");
        assert_eq!(angle, same);
        assert_ne!(angle, other);
        assert_eq!(table.resolve(angle), Some("ParamAngleX"));
        assert_eq!(table.get("ParamAngleY"), Some(other));
        assert_eq!(table.get("ParamMissing"), None);
    }
}
