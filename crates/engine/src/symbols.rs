//! Symbol table: variable name -> defining cell and its latest result.
//!
//! The engine rebuilds the table into a fresh value and swaps it in at the
//! start of every evaluation, then publishes bindings one by one as
//! assignments succeed during a pass.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::cell_id::EquationId;
use crate::formula::Bindings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub owner: EquationId,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    bindings: FxHashMap<String, Binding>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(|b| b.value.as_str())
    }

    pub fn owner(&self, name: &str) -> Option<EquationId> {
        self.bindings.get(name).map(|b| b.owner)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Publish or overwrite a binding.
    pub fn insert(&mut self, name: impl Into<String>, owner: EquationId, value: impl Into<String>) {
        self.bindings.insert(
            name.into(),
            Binding {
                owner,
                value: value.into(),
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.bindings.remove(name)
    }

    /// Drop every binding published by `owner`.
    pub fn remove_owner(&mut self, owner: EquationId) {
        self.bindings.retain(|_, b| b.owner != owner);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All bindings, sorted by name.
    pub fn entries(&self) -> BTreeMap<&str, &Binding> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    /// Look up every name in `names`. Returns the bindings, or the sorted
    /// list of names that are not bound.
    pub fn resolve(&self, names: &BTreeSet<String>) -> Result<Bindings, Vec<String>> {
        let mut resolved = Bindings::new();
        let mut missing = Vec::new();
        for name in names {
            match self.bindings.get(name) {
                Some(b) => {
                    resolved.insert(name.clone(), b.value.clone());
                }
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(missing)
        }
    }

    /// Look up what can be resolved; unbound names are skipped.
    pub fn resolve_partial(&self, names: &BTreeSet<String>) -> Bindings {
        names
            .iter()
            .filter_map(|n| self.bindings.get(n).map(|b| (n.clone(), b.value.clone())))
            .collect()
    }
}

impl FromIterator<(String, Binding)> for SymbolTable {
    fn from_iter<T: IntoIterator<Item = (String, Binding)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}
