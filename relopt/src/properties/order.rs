use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::properties::{RelTrait, TraitDef};

/// Ordering of one column.
#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct FieldOrdering {
    /// Index of the field in the row type.
    field: usize,
    /// Ascending or descending.
    asc: bool,
    /// Should null be treated first.
    nulls_first: bool,
}

impl FieldOrdering {
    pub fn new(field: usize, asc: bool, nulls_first: bool) -> Self {
        Self {
            field,
            asc,
            nulls_first,
        }
    }

    pub fn asc(field: usize) -> Self {
        Self::new(field, true, false)
    }

    pub fn desc(field: usize) -> Self {
        Self::new(field, false, false)
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn is_asc(&self) -> bool {
        self.asc
    }

    pub fn nulls_first(&self) -> bool {
        self.nulls_first
    }
}

impl Display for FieldOrdering {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, if self.asc { "ASC" } else { "DESC" })?;
        if self.nulls_first {
            write!(f, " NULLS FIRST")?;
        }
        Ok(())
    }
}

/// Sort order of a row stream. Empty means unordered.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct Collation {
    orders: Vec<FieldOrdering>,
}

impl Collation {
    pub fn new(orders: Vec<FieldOrdering>) -> Self {
        Self { orders }
    }

    pub fn orders(&self) -> &[FieldOrdering] {
        &self.orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl RelTrait for Collation {
    fn def(&self) -> TraitDef {
        TraitDef::Collation
    }

    /// A stream sorted on `[a, b]` is also sorted on `[a]`.
    fn satisfies(&self, required: &Self) -> bool {
        self.orders.starts_with(&required.orders)
    }
}

impl Display for Collation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.orders.iter().join(", "))
    }
}
