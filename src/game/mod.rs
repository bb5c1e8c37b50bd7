pub mod resolver;
pub mod state;
pub mod zones;

pub use resolver::{ActiveEffect, EffectResolver, ResolveReport};
pub use state::{GameError, GameState};
pub use zones::{DeckComposition, Library, Pile, Zone};
