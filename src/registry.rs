//! Object registry: every business object by (kind, id), with partitioned id ranges.
//!
//! Populated once at startup, then shared immutably (`&ObjectRegistry` or `Arc`).
//! Reads take no lock; there is no API for mutation through a shared reference.

use crate::config::{validate, ObjectDescriptor, ObjectKind};
use crate::error::AppError;
use crate::service::Record;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// A named, disjoint object id range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdRange {
    pub name: &'static str,
    pub ids: RangeInclusive<u32>,
}

/// Base application objects shipped by the vendor.
pub const VENDOR_RANGE: RangeInclusive<u32> = 1..=49_999;
/// Per-installation customizations.
pub const CUSTOMER_RANGE: RangeInclusive<u32> = 50_000..=99_999;
pub const ADDON_RANGE: RangeInclusive<u32> = 1_000_000..=69_999_999;
pub const ADDON2_RANGE: RangeInclusive<u32> = 70_000_000..=74_999_999;

pub fn id_ranges() -> [IdRange; 4] {
    [
        IdRange { name: "Base Application", ids: VENDOR_RANGE },
        IdRange { name: "Customer Customization", ids: CUSTOMER_RANGE },
        IdRange { name: "Add-on Range 1", ids: ADDON_RANGE },
        IdRange { name: "Add-on Range 2", ids: ADDON2_RANGE },
    ]
}

/// The range an id falls in, or None for ids outside every range.
pub fn object_range(id: u32) -> Option<IdRange> {
    id_ranges().into_iter().find(|r| r.ids.contains(&id))
}

#[derive(Clone, Debug, Default)]
pub struct ObjectRegistry {
    by_key: HashMap<(ObjectKind, u32), ObjectDescriptor>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        ObjectRegistry {
            by_key: HashMap::new(),
        }
    }

    /// Register a descriptor under its own kind and id. Table descriptors are validated.
    pub fn register(&mut self, descriptor: ObjectDescriptor) -> Result<(), AppError> {
        let (kind, id) = (descriptor.kind, descriptor.id);
        if object_range(id).is_none() {
            return Err(AppError::OutOfRange { kind, id });
        }
        if self.by_key.contains_key(&(kind, id)) {
            return Err(AppError::DuplicateId { kind, id });
        }
        validate(&descriptor)?;
        tracing::debug!(%kind, id, name = %descriptor.name, "registered object");
        self.by_key.insert((kind, id), descriptor);
        Ok(())
    }

    /// Register the descriptor generated from a record type's field list.
    pub fn register_record<R: Record>(&mut self) -> Result<(), AppError> {
        self.register(R::descriptor())
    }

    pub fn lookup(&self, kind: ObjectKind, id: u32) -> Result<&ObjectDescriptor, AppError> {
        self.by_key
            .get(&(kind, id))
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, id)))
    }

    /// Registered ids of one kind, ascending.
    pub fn list_ids(&self, kind: ObjectKind) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .by_key
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Table descriptors carrying a schema, in id order. This is the reconciler's work list.
    pub fn tables_with_schema(&self) -> Vec<&ObjectDescriptor> {
        self.list_ids(ObjectKind::Table)
            .into_iter()
            .filter_map(|id| self.by_key.get(&(ObjectKind::Table, id)))
            .filter(|d| d.has_schema())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;

    fn terms(id: u32) -> ObjectDescriptor {
        ObjectDescriptor::table(id, "Payment Terms", vec![ColumnSpec::key("code", "VARCHAR(10)")])
    }

    #[test]
    fn ranges_are_disjoint() {
        let ranges = id_ranges();
        for (i, a) in ranges.iter().enumerate() {
            for b in ranges.iter().skip(i + 1) {
                assert!(a.ids.end() < b.ids.start() || b.ids.end() < a.ids.start());
            }
        }
        assert_eq!(object_range(3).map(|r| r.name), Some("Base Application"));
        assert_eq!(object_range(50_013).map(|r| r.name), Some("Customer Customization"));
        assert!(object_range(0).is_none());
        assert!(object_range(100_000).is_none());
        assert!(object_range(75_000_000).is_none());
    }

    #[test]
    fn register_rejects_duplicates_per_kind_only() {
        let mut reg = ObjectRegistry::new();
        reg.register(terms(3)).unwrap();
        assert!(matches!(
            reg.register(terms(3)),
            Err(AppError::DuplicateId { kind: ObjectKind::Table, id: 3 })
        ));
        reg.register(ObjectDescriptor::object(ObjectKind::Page, 3, "Payment Terms")).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn register_rejects_out_of_range() {
        let mut reg = ObjectRegistry::new();
        assert!(matches!(
            reg.register(terms(100_000)),
            Err(AppError::OutOfRange { id: 100_000, .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn lookup_and_sorted_listing() {
        let mut reg = ObjectRegistry::new();
        for id in [50_000, 3, 1_000_000] {
            reg.register(terms(id)).unwrap();
        }
        reg.register(ObjectDescriptor::object(ObjectKind::Codeunit, 50_013, "Demo")).unwrap();
        assert_eq!(reg.list_ids(ObjectKind::Table), vec![3, 50_000, 1_000_000]);
        assert_eq!(reg.lookup(ObjectKind::Table, 3).unwrap().name, "Payment Terms");
        assert!(matches!(reg.lookup(ObjectKind::Report, 3), Err(AppError::NotFound(_))));
        assert_eq!(reg.tables_with_schema().len(), 3);
    }
}
