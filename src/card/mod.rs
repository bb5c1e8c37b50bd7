pub mod database;
pub mod effects;
pub mod types;

pub use database::{actions_to_descriptors, CatalogError, EffectCatalog};
pub use effects::{CardPredicate, EffectDescriptor};
pub use types::{CardId, CardPool, CardRef, Category};
