//! Bidirectional string/id maps for enumerated-string columns.

use std::collections::HashMap;

use crate::error::{Result, SchemaError};

/// One column's mapping. Ids are assigned densely in interning order and
/// are stable for the process lifetime.
#[derive(Debug, Default)]
struct BiMap {
    to_id: HashMap<String, i64>,
    to_str: Vec<String>,
}

impl BiMap {
    fn byte_size(&self) -> u64 {
        // Each string is stored twice (map key and reverse vector) plus
        // the id; close enough for the accountant.
        self.to_str
            .iter()
            .map(|s| 2 * s.len() as u64 + 8)
            .sum()
    }
}

/// Catalogue of enumerated-string columns, keyed by `(relation, slot)`.
///
/// Raw strings are never compressed; the category id is what attribute
/// vectors carry and what the model encodes. Owned by the table set and
/// accessed only from its single execution thread.
#[derive(Debug, Default)]
pub struct EnumCatalog {
    columns: HashMap<(&'static str, usize), BiMap>,
}

impl EnumCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `s` to its id, assigning the next free id on a miss. Assigning
    /// an id at or beyond `cap` fails with `EnumCapacityExceeded` rather
    /// than letting the column outgrow the model fitted over it.
    pub fn intern(
        &mut self,
        relation: &'static str,
        slot: usize,
        cap: usize,
        s: &str,
    ) -> Result<i64> {
        let column = self.columns.entry((relation, slot)).or_default();
        if let Some(&id) = column.to_id.get(s) {
            return Ok(id);
        }
        let id = column.to_str.len();
        if id >= cap {
            return Err(SchemaError::EnumCapacityExceeded { relation, slot, cap }.into());
        }
        column.to_id.insert(s.to_owned(), id as i64);
        column.to_str.push(s.to_owned());
        Ok(id as i64)
    }

    /// Reverse lookup. A miss means the stored data and the catalogue
    /// disagree, which is corruption, not bad input.
    pub fn reveal(&self, relation: &'static str, slot: usize, id: i64) -> Result<&str> {
        self.columns
            .get(&(relation, slot))
            .and_then(|c| usize::try_from(id).ok().and_then(|i| c.to_str.get(i)))
            .map(String::as_str)
            .ok_or_else(|| SchemaError::UnknownEnumId { relation, slot, id }.into())
    }

    /// Total bytes held, reported to the footprint accountant as part of
    /// the model footprint.
    pub fn byte_size(&self) -> u64 {
        self.columns.values().map(BiMap::byte_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut cat = EnumCatalog::new();
        let a = cat.intern("customer", 9, 4, "GC").unwrap();
        let b = cat.intern("customer", 9, 4, "BC").unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        // Re-interning returns the same id.
        assert_eq!(cat.intern("customer", 9, 4, "GC").unwrap(), 0);
        assert_eq!(cat.reveal("customer", 9, 0).unwrap(), "GC");
        assert_eq!(cat.reveal("customer", 9, 1).unwrap(), "BC");
    }

    #[test]
    fn test_columns_are_independent() {
        let mut cat = EnumCatalog::new();
        cat.intern("customer", 9, 8, "GC").unwrap();
        let id = cat.intern("customer", 12, 8, "OE").unwrap();
        assert_eq!(id, 0);
        assert!(cat.reveal("customer", 12, 1).is_err());
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut cat = EnumCatalog::new();
        cat.intern("stock", 4, 2, "a").unwrap();
        cat.intern("stock", 4, 2, "b").unwrap();
        let err = cat.intern("stock", 4, 2, "c").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Schema(SchemaError::EnumCapacityExceeded { cap: 2, .. })
        ));
        // Existing entries still intern fine.
        assert_eq!(cat.intern("stock", 4, 2, "b").unwrap(), 1);
    }

    #[test]
    fn test_unknown_enum_id() {
        let cat = EnumCatalog::new();
        assert!(cat.reveal("customer", 9, 0).is_err());
    }

    #[test]
    fn test_byte_size_grows() {
        let mut cat = EnumCatalog::new();
        let before = cat.byte_size();
        cat.intern("stock", 4, 100, "some stock data words").unwrap();
        assert!(cat.byte_size() > before);
    }
}
