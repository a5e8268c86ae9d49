//! Voice effects
//!
//! Declarative effect definitions and the catalog that lists them.

mod catalog;
mod definition;

pub use catalog::{list_effects, EffectCatalog};
pub use definition::{EffectDefinition, EffectSettings, FilterKind, FilterSettings};
