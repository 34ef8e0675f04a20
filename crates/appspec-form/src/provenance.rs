//! Per-field provenance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when an edit targets a source-locked field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("field is locked by the app document")]
pub struct FieldLocked;

/// A form value plus whether the declarative source owns it.
///
/// Source-locked values are always refreshed from the latest canonical
/// specification and refuse local edits. Editable values keep whatever the
/// user last entered across reconciliations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldProvenance<T> {
    value: T,
    source_locked: bool,
}

impl<T> FieldProvenance<T> {
    pub fn new(value: T, source_locked: bool) -> Self {
        Self {
            value,
            source_locked,
        }
    }

    /// A value the user may change.
    pub fn editable(value: T) -> Self {
        Self::new(value, false)
    }

    /// A value owned by the declarative source.
    pub fn locked(value: T) -> Self {
        Self::new(value, true)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_source_locked(&self) -> bool {
        self.source_locked
    }

    /// Replace the value, unless the field is source-locked.
    pub fn set(&mut self, value: T) -> Result<(), FieldLocked> {
        if self.source_locked {
            return Err(FieldLocked);
        }
        self.value = value;
        Ok(())
    }
}

impl<T: Default> Default for FieldProvenance<T> {
    fn default() -> Self {
        Self::editable(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editable_field_accepts_edits() {
        let mut port = FieldProvenance::editable(80u32);
        port.set(8080).unwrap();
        assert_eq!(*port.value(), 8080);
        assert!(!port.is_source_locked());
    }

    #[test]
    fn locked_field_refuses_edits() {
        let mut port = FieldProvenance::locked(80u32);
        assert_eq!(port.set(8080), Err(FieldLocked));
        assert_eq!(port.into_value(), 80);
    }

    #[test]
    fn serializes_with_camel_case_flag() {
        let json = serde_json::to_value(FieldProvenance::locked("ls".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({ "value": "ls", "sourceLocked": true }));
    }
}
