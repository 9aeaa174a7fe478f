//! Traits of relational expressions.
//!
//! A trait describes a physical property of an expression, such as calling convention or sort
//! order. Each expression carries a [`TraitSet`], which holds exactly one trait per
//! [`TraitDef`]. Logical properties like the row type live on the expression itself.

use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

use enum_as_inner::EnumAsInner;
use enumset::{EnumSet, EnumSetType};

mod convention;
pub use convention::*;
mod order;
pub use order::*;

/// Dimensions of a trait set.
#[derive(EnumSetType, Debug, Hash)]
pub enum TraitDef {
    Convention,
    Collation,
}

impl TraitDef {
    /// All dimensions known to the engine, in trait set order.
    pub fn all() -> EnumSet<TraitDef> {
        EnumSet::all()
    }
}

pub trait RelTrait: Debug + Hash {
    fn def(&self) -> TraitDef;

    /// Tests whether `self` satisfies `required`, e.g. is equal to or a refinement of it.
    fn satisfies(&self, required: &Self) -> bool;
}

/// A single trait of any dimension.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
pub enum Trait {
    Convention(Convention),
    Collation(Collation),
}

impl Trait {
    pub fn def(&self) -> TraitDef {
        match self {
            Trait::Convention(c) => c.def(),
            Trait::Collation(c) => c.def(),
        }
    }

    /// Traits of different dimensions never satisfy each other.
    pub fn satisfies(&self, required: &Trait) -> bool {
        match (self, required) {
            (Trait::Convention(this), Trait::Convention(that)) => this.satisfies(that),
            (Trait::Collation(this), Trait::Collation(that)) => this.satisfies(that),
            _ => false,
        }
    }
}

impl Display for Trait {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Trait::Convention(c) => write!(f, "{}", c),
            Trait::Collation(c) => write!(f, "{}", c),
        }
    }
}

impl From<Convention> for Trait {
    fn from(c: Convention) -> Self {
        Trait::Convention(c)
    }
}

impl From<Collation> for Trait {
    fn from(c: Collation) -> Self {
        Trait::Collation(c)
    }
}

/// One trait per dimension.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct TraitSet {
    convention: Convention,
    collation: Collation,
}

impl TraitSet {
    pub fn new(convention: Convention) -> Self {
        Self {
            convention,
            collation: Collation::default(),
        }
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    pub fn collation(&self) -> &Collation {
        &self.collation
    }

    pub fn get(&self, def: TraitDef) -> Trait {
        match def {
            TraitDef::Convention => Trait::Convention(self.convention),
            TraitDef::Collation => Trait::Collation(self.collation.clone()),
        }
    }

    /// Returns a copy with the trait of `new_trait`'s dimension replaced.
    pub fn replace<T: Into<Trait>>(&self, new_trait: T) -> TraitSet {
        let mut traits = self.clone();
        match new_trait.into() {
            Trait::Convention(c) => traits.convention = c,
            Trait::Collation(c) => traits.collation = c,
        }
        traits
    }

    /// Whether the trait of `t`'s dimension equals `t`.
    pub fn contains(&self, t: &Trait) -> bool {
        &self.get(t.def()) == t
    }

    pub fn contains_convention(&self, convention: Convention) -> bool {
        self.convention == convention
    }

    pub fn satisfies(&self, required: &TraitSet) -> bool {
        self.convention.satisfies(&required.convention)
            && self.collation.satisfies(&required.collation)
    }

    pub fn iter(&self) -> impl Iterator<Item = Trait> + '_ {
        TraitDef::all().iter().map(move |def| self.get(def))
    }
}

impl Display for TraitSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.convention)?;
        if !self.collation.is_empty() {
            write!(f, ".{}", self.collation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHYSICAL: Convention = Convention::new("PHYSICAL");

    #[test]
    fn test_satisfies_per_dimension() {
        let sorted = Collation::new(vec![FieldOrdering::asc(0), FieldOrdering::desc(1)]);
        let provided = TraitSet::new(PHYSICAL).with_collation(sorted);
        let required =
            TraitSet::new(PHYSICAL).with_collation(Collation::new(vec![FieldOrdering::asc(0)]));

        assert!(provided.satisfies(&required));
        assert!(!required.satisfies(&provided));
        assert!(provided.satisfies(&TraitSet::new(PHYSICAL)));
        assert!(!provided.satisfies(&TraitSet::default()));
    }

    #[test]
    fn test_replace_and_contains() {
        let traits = TraitSet::default();
        assert!(traits.contains(&Convention::NONE.into()));

        let replaced = traits.replace(PHYSICAL);
        assert!(replaced.contains_convention(PHYSICAL));
        assert!(!replaced.contains(&Convention::NONE.into()));
        assert_eq!(traits.collation(), replaced.collation());
        assert_eq!(
            vec![Trait::Convention(PHYSICAL), Trait::Collation(Collation::default())],
            replaced.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_display() {
        let traits = TraitSet::new(PHYSICAL)
            .with_collation(Collation::new(vec![FieldOrdering::desc(2)]));
        assert_eq!("PHYSICAL.[2 DESC]", traits.to_string());
        assert_eq!("NONE", TraitSet::default().to_string());
    }
}
