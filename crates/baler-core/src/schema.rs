//! Relation schemas and the typed attribute vector rows travel in.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Base type of one schema slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SlotKind {
    /// Signed integer, optionally lossy within the slot tolerance.
    Int,
    /// Real number, lossy within the slot's relative tolerance.
    Real,
    /// Small-integer category id with a declared cardinality cap.
    Enum { cap: usize },
    /// Bounded string.
    Str,
}

/// One slot descriptor: base type plus the error the compressor may
/// introduce (integer delta for `Int`, relative for `Real`, unused
/// otherwise).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlotDesc {
    pub kind: SlotKind,
    pub tolerance: f64,
}

impl SlotDesc {
    pub const fn int(tolerance: f64) -> Self {
        Self { kind: SlotKind::Int, tolerance }
    }

    pub const fn real(tolerance: f64) -> Self {
        Self { kind: SlotKind::Real, tolerance }
    }

    pub const fn enumerated(cap: usize) -> Self {
        Self { kind: SlotKind::Enum { cap }, tolerance: 0.0 }
    }

    pub const fn string() -> Self {
        Self { kind: SlotKind::Str, tolerance: 0.0 }
    }
}

/// An ordered list of slot descriptors. Slot order is access-frequency
/// order: readers that only need the first `k` attributes decode a prefix
/// and skip the tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    slots: Vec<SlotDesc>,
}

impl Schema {
    pub fn new(slots: Vec<SlotDesc>) -> Self {
        Self { slots }
    }

    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, i: usize) -> &SlotDesc {
        &self.slots[i]
    }

    pub fn slots(&self) -> &[SlotDesc] {
        &self.slots
    }

    /// A fresh all-default attribute vector for this schema.
    pub fn new_vector(&self) -> AttrVector {
        let values = self
            .slots
            .iter()
            .map(|d| match d.kind {
                SlotKind::Int | SlotKind::Enum { .. } => AttrValue::Int(0),
                SlotKind::Real => AttrValue::Real(0.0),
                SlotKind::Str => AttrValue::Str(String::new()),
            })
            .collect();
        AttrVector { values }
    }
}

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Real(f64),
    Str(String),
}

impl AttrValue {
    fn kind_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Real(_) => "real",
            AttrValue::Str(_) => "str",
        }
    }
}

/// A typed fixed-arity row value. Mismatched-tag reads fail loudly with
/// `SchemaViolation`; they never silently return a default.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrVector {
    values: Vec<AttrValue>,
}

impl AttrVector {
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get_int(&self, i: usize) -> Result<i64> {
        match self.get(i)? {
            AttrValue::Int(v) => Ok(*v),
            other => Err(SchemaError::SchemaViolation {
                slot: i,
                expected: "int",
                actual: other.kind_name(),
            }
            .into()),
        }
    }

    pub fn get_real(&self, i: usize) -> Result<f64> {
        match self.get(i)? {
            AttrValue::Real(v) => Ok(*v),
            other => Err(SchemaError::SchemaViolation {
                slot: i,
                expected: "real",
                actual: other.kind_name(),
            }
            .into()),
        }
    }

    pub fn get_str(&self, i: usize) -> Result<&str> {
        match self.get(i)? {
            AttrValue::Str(v) => Ok(v.as_str()),
            other => Err(SchemaError::SchemaViolation {
                slot: i,
                expected: "str",
                actual: other.kind_name(),
            }
            .into()),
        }
    }

    pub fn get(&self, i: usize) -> Result<&AttrValue> {
        self.values.get(i).ok_or_else(|| {
            SchemaError::SlotOutOfRange { slot: i, arity: self.values.len() }.into()
        })
    }

    /// Overwrite slot `i`. The new value must carry the same tag the slot
    /// already holds; an attribute vector never changes shape after
    /// construction.
    pub fn set(&mut self, i: usize, value: AttrValue) -> Result<()> {
        let arity = self.values.len();
        let slot = self
            .values
            .get_mut(i)
            .ok_or(SchemaError::SlotOutOfRange { slot: i, arity })?;
        if std::mem::discriminant(slot) != std::mem::discriminant(&value) {
            return Err(SchemaError::SchemaViolation {
                slot: i,
                expected: slot.kind_name(),
                actual: value.kind_name(),
            }
            .into());
        }
        *slot = value;
        Ok(())
    }

    pub fn set_int(&mut self, i: usize, v: i64) -> Result<()> {
        self.set(i, AttrValue::Int(v))
    }

    pub fn set_real(&mut self, i: usize, v: f64) -> Result<()> {
        self.set(i, AttrValue::Real(v))
    }

    pub fn set_str(&mut self, i: usize, v: impl Into<String>) -> Result<()> {
        self.set(i, AttrValue::Str(v.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            SlotDesc::enumerated(100),
            SlotDesc::real(0.0025),
            SlotDesc::string(),
            SlotDesc::int(0.5),
        ])
    }

    #[test]
    fn test_new_vector_defaults() {
        let v = sample_schema().new_vector();
        assert_eq!(v.arity(), 4);
        assert_eq!(v.get_int(0).unwrap(), 0);
        assert_eq!(v.get_real(1).unwrap(), 0.0);
        assert_eq!(v.get_str(2).unwrap(), "");
        assert_eq!(v.get_int(3).unwrap(), 0);
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let mut v = sample_schema().new_vector();
        v.set_int(0, 42).unwrap();
        v.set_real(1, 1.25).unwrap();
        v.set_str(2, "hello").unwrap();
        assert_eq!(v.get_int(0).unwrap(), 42);
        assert_eq!(v.get_real(1).unwrap(), 1.25);
        assert_eq!(v.get_str(2).unwrap(), "hello");
    }

    #[test]
    fn test_type_mismatch_fails_loudly() {
        let mut v = sample_schema().new_vector();
        assert!(v.get_real(0).is_err());
        assert!(v.get_str(0).is_err());
        assert!(v.set_real(0, 1.0).is_err());
        assert!(v.set_int(2, 1).is_err());
    }

    #[test]
    fn test_slot_out_of_range() {
        let mut v = sample_schema().new_vector();
        assert!(v.get_int(4).is_err());
        assert!(v.set_int(99, 0).is_err());
    }
}
