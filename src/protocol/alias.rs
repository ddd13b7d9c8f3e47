//! Alias tables: integer ↔ name maps that keep repeated strings off the
//! wire.
//!
//! The world model assigns aliases and announces them in ATTRIBUTE_ALIAS /
//! ORIGIN_ALIAS frames; clients only consume them ([`AliasTable`]). Solvers
//! assign their own aliases when announcing solution types, with a counter
//! owned by the connection ([`AliasRegistry`]).

use std::collections::HashMap;

use crate::error::{GrailError, Result};

/// Server-assigned alias → name map, client side.
///
/// Entries are append-only for the connection's lifetime; the server never
/// reassigns or retires an alias.
#[derive(Debug, Default)]
pub struct AliasTable {
    names: HashMap<u32, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one alias announcement.
    pub fn insert(&mut self, alias: u32, name: String) {
        if let Some(previous) = self.names.insert(alias, name) {
            tracing::warn!(alias, %previous, "alias reannounced");
        }
    }

    /// Resolve an alias referenced by a data frame.
    ///
    /// An unknown alias is a decode error, never a silent placeholder:
    /// returning data under a wrong or empty name would corrupt results.
    pub fn resolve(&self, alias: u32, kind: &str) -> Result<&str> {
        self.names
            .get(&alias)
            .map(String::as_str)
            .ok_or_else(|| GrailError::Decode(format!("unresolved {kind} alias {alias}")))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Name → alias map with an explicit counter, solver side.
///
/// The counter belongs to one connection; two connections may assign the
/// same alias to different names without interfering.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    aliases: HashMap<String, u32>,
    next: u32,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the alias for `name`, assigning the next free one if the name
    /// is new. The boolean is true when an assignment happened.
    pub fn intern(&mut self, name: &str) -> (u32, bool) {
        if let Some(&alias) = self.aliases.get(name) {
            return (alias, false);
        }
        let alias = self.next;
        self.next += 1;
        self.aliases.insert(name.to_string(), alias);
        (alias, true)
    }

    /// Look up a previously interned name.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.aliases.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_alias() {
        let mut table = AliasTable::new();
        table.insert(3, "location.gps".to_string());
        assert_eq!(table.resolve(3, "attribute").unwrap(), "location.gps");
    }

    #[test]
    fn test_unresolved_alias_is_decode_error() {
        let table = AliasTable::new();
        let err = table.resolve(7, "origin").unwrap_err();
        assert!(matches!(err, GrailError::Decode(_)));
        assert!(err.to_string().contains("origin alias 7"));
    }

    #[test]
    fn test_registry_interns_sequentially() {
        let mut registry = AliasRegistry::new();
        assert_eq!(registry.intern("a"), (0, true));
        assert_eq!(registry.intern("b"), (1, true));
        assert_eq!(registry.intern("a"), (0, false));
        assert_eq!(registry.get("b"), Some(1));
        assert_eq!(registry.get("c"), None);
    }

    #[test]
    fn test_registries_are_independent() {
        let mut first = AliasRegistry::new();
        let mut second = AliasRegistry::new();
        first.intern("x");
        assert_eq!(second.intern("y"), (0, true));
    }
}
