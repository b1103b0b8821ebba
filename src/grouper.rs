//! Record grouping: master rows become per-volunteer groups with stable,
//! collision-safe output names.

use crate::field::Field;
use crate::paths::sanitize_component;
use crate::source::SourceTable;
use std::collections::{BTreeMap, HashMap};

/// Zero-based column of the volunteer name in the master sheet.
pub const NAME_COL: usize = 7;
/// Zero-based column of the volunteer's own phone number.
pub const PHONE_COL: usize = 8;

/// Identity of one volunteer. Names are not unique on their own; the phone
/// disambiguates. The phone is kept exactly as the source spelled it (after
/// numeric-to-digit-string rendering), with no normalization at keying time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub name: String,
    pub phone: String,
}

/// Grouped rows of one master tab. Iteration order is sorted by volunteer
/// name (case-sensitive), then phone; rows inside a group keep source order.
#[derive(Debug, Default)]
pub struct EntityGroups {
    groups: BTreeMap<EntityKey, Vec<Vec<Field>>>,
    name_counts: HashMap<String, usize>,
    pub rows_seen: usize,
    pub rows_skipped: usize,
}

impl EntityGroups {
    /// Group data rows by (name, phone). Rows with an empty name, or with
    /// fewer than nine fields, are dropped. Rows sharing both name and phone
    /// merge into one group, the normal "several assignment rows per
    /// volunteer" case.
    pub fn build(table: &SourceTable) -> Self {
        let mut out = Self::default();
        for row in &table.rows {
            out.rows_seen += 1;
            if row.len() <= PHONE_COL {
                out.rows_skipped += 1;
                continue;
            }
            let name = row[NAME_COL].display_string();
            if name.trim().is_empty() {
                out.rows_skipped += 1;
                continue;
            }
            let phone = row[PHONE_COL].display_string();
            out.groups
                .entry(EntityKey { name, phone })
                .or_default()
                .push(row.clone());
        }
        for key in out.groups.keys() {
            *out.name_counts.entry(key.name.clone()).or_insert(0) += 1;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Names that appear under more than one phone number.
    pub fn duplicate_names(&self) -> usize {
        self.name_counts.values().filter(|&&c| c > 1).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &[Vec<Field>])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Sanitized output stem for a group. The phone is appended whenever the
    /// same name exists under more than one key, so sibling files never
    /// collide within a tab. Text-typed phones can carry path-unsafe
    /// characters, so the suffix is sanitized too.
    pub fn file_stem(&self, key: &EntityKey) -> String {
        let safe = sanitize_component(&key.name);
        if self.name_counts.get(&key.name).copied().unwrap_or(0) > 1 {
            format!("{}_{}", safe, sanitize_component(&key.phone))
        } else {
            safe
        }
    }
}
