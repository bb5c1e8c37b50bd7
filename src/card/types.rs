use crate::card::effects::EffectDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Coarse card category used for targets and predicates.
/// Derived outside the core from the card's type line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Land,
    Creature,
    Artifact,
    Instant,
    Sorcery,
    Enchantment,
    Planeswalker,
    Battle,
    Spell,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Land,
        Category::Creature,
        Category::Artifact,
        Category::Instant,
        Category::Sorcery,
        Category::Enchantment,
        Category::Planeswalker,
        Category::Battle,
        Category::Spell,
        Category::Other,
    ];

    /// Position in [`Category::ALL`], used for per-category tallies
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Land => "land",
            Category::Creature => "creature",
            Category::Artifact => "artifact",
            Category::Instant => "instant",
            Category::Sorcery => "sorcery",
            Category::Enchantment => "enchantment",
            Category::Planeswalker => "planeswalker",
            Category::Battle => "battle",
            Category::Spell => "spell",
            Category::Other => "other",
        }
    }

    /// Pick a single category from a type line.
    /// Priority: land, creature, artifact, instant, sorcery, enchantment, planeswalker, battle.
    pub fn from_type_line(type_line: &str) -> Category {
        let tl = type_line.to_lowercase();
        const PRIORITY: [(&str, Category); 8] = [
            ("land", Category::Land),
            ("creature", Category::Creature),
            ("artifact", Category::Artifact),
            ("instant", Category::Instant),
            ("sorcery", Category::Sorcery),
            ("enchantment", Category::Enchantment),
            ("planeswalker", Category::Planeswalker),
            ("battle", Category::Battle),
        ];
        PRIORITY
            .iter()
            .find(|(word, _)| tl.contains(word))
            .map(|(_, category)| *category)
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown category '{}'", s.trim()))
    }
}

/// Immutable reference to a distinct card in a deck context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRef {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub effects: Vec<EffectDescriptor>,
}

impl CardRef {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        CardRef {
            name: name.into(),
            category,
            effects: Vec::new(),
        }
    }
}

/// Index of a card within a [`CardPool`]
pub type CardId = usize;

/// The distinct cards of one scenario, in declaration order.
///
/// Declaration order is the per-name enumeration order used everywhere a
/// deterministic choice between names is needed (tutor tie-breaking).
#[derive(Debug, Clone, Default)]
pub struct CardPool {
    cards: Vec<CardRef>,
    by_name: HashMap<String, CardId>,
}

impl CardPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card, returning its id. A second registration of the same
    /// name returns the existing id and keeps the first category.
    pub fn intern(&mut self, card: CardRef) -> CardId {
        if let Some(&id) = self.by_name.get(&card.name) {
            return id;
        }
        let id = self.cards.len();
        self.by_name.insert(card.name.clone(), id);
        self.cards.push(card);
        id
    }

    pub fn id(&self, name: &str) -> Option<CardId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: CardId) -> &CardRef {
        &self.cards[id]
    }

    pub fn name(&self, id: CardId) -> &str {
        &self.cards[id].name
    }

    pub fn category(&self, id: CardId) -> Category {
        self.cards[id].category
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CardId, &CardRef)> {
        self.cards.iter().enumerate()
    }
}
