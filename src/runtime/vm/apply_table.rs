//! Process-wide apply-schema table.
//!
//! Each entry maps an ordered sequence of argument kinds to the register
//! layout a saturated call with those kinds uses. A hit loads the registers
//! straight from the precomputed layout; a miss goes through apply frames and
//! computes the layout when the frames are gathered. Both routes end in the
//! same single invocation of the callee's body.
//!
//! The table is built once on first use and is read-only afterwards, so
//! workers share it without synchronization.

use std::{collections::HashMap, sync::LazyLock};

use crate::runtime::{
    registers::{RegisterSlot, layout_for},
    value::{ArgKind, Value, schema_code},
};

/// Longest argument sequence the table holds a layout for.
pub const MAX_SCHEMA_LEN: usize = 6;

/// A precomputed calling schema: the kinds it accepts and where each
/// argument lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySchema {
    pub kinds: Vec<ArgKind>,
    pub slots: Vec<RegisterSlot>,
}

impl ApplySchema {
    fn new(kinds: Vec<ArgKind>) -> Option<Self> {
        let slots = layout_for(kinds.iter().copied()).ok()?;
        Some(Self { kinds, slots })
    }

    pub fn code(&self) -> String {
        schema_code(&self.kinds)
    }
}

#[derive(Debug)]
pub struct ApplyTable {
    entries: HashMap<Vec<ArgKind>, ApplySchema>,
}

impl ApplyTable {
    /// The standard schema set: every single kind, every pair containing a
    /// boxed argument, and runs of three to six boxed arguments.
    pub fn standard() -> Self {
        let mut schemas: Vec<Vec<ArgKind>> = Vec::new();
        for kind in ArgKind::ALL {
            schemas.push(vec![kind]);
        }
        for first in ArgKind::ALL {
            for second in ArgKind::ALL {
                if first == ArgKind::Boxed || second == ArgKind::Boxed {
                    schemas.push(vec![first, second]);
                }
            }
        }
        for n in 3..=MAX_SCHEMA_LEN {
            schemas.push(vec![ArgKind::Boxed; n]);
        }
        Self::from_schemas(schemas)
    }

    pub fn from_schemas(schemas: impl IntoIterator<Item = Vec<ArgKind>>) -> Self {
        let entries = schemas
            .into_iter()
            .filter(|kinds| !kinds.is_empty() && kinds.len() <= MAX_SCHEMA_LEN)
            .filter_map(ApplySchema::new)
            .map(|schema| (schema.kinds.clone(), schema))
            .collect();
        Self { entries }
    }

    /// Finds the schema matching the kinds of `args`, if the table has one.
    #[inline]
    pub fn lookup(&self, args: &[Value]) -> Option<&ApplySchema> {
        if args.is_empty() || args.len() > MAX_SCHEMA_LEN {
            return None;
        }
        let mut kinds = [ArgKind::Boxed; MAX_SCHEMA_LEN];
        for (slot, arg) in kinds.iter_mut().zip(args) {
            *slot = arg.kind();
        }
        self.entries.get(&kinds[..args.len()])
    }

    pub fn contains(&self, kinds: &[ArgKind]) -> bool {
        self.entries.contains_key(kinds)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schema codes in sorted order, e.g. `["C", "CO", "D", ...]`.
    pub fn schema_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.entries.values().map(ApplySchema::code).collect();
        codes.sort();
        codes
    }
}

static APPLY_TABLE: LazyLock<ApplyTable> = LazyLock::new(ApplyTable::standard);

/// The shared table used by the apply dispatcher.
pub fn global() -> &'static ApplyTable {
    &APPLY_TABLE
}
