//! Typed draw-relevant card behaviour.
//!
//! Descriptors are pure data. They are produced outside the core (see
//! [`crate::card::EffectCatalog`]) and interpreted by
//! [`crate::game::resolver`].

use crate::card::types::{CardRef, Category};
use crate::game::zones::Zone;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate over a card's name and category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardPredicate {
    Any,
    Category(Category),
    Name(String),
    Not(Box<CardPredicate>),
    AnyOf(Vec<CardPredicate>),
}

impl CardPredicate {
    pub fn category(category: Category) -> Self {
        CardPredicate::Category(category)
    }

    pub fn name(name: impl Into<String>) -> Self {
        CardPredicate::Name(name.into())
    }

    pub fn not(inner: CardPredicate) -> Self {
        CardPredicate::Not(Box::new(inner))
    }

    pub fn matches(&self, card: &CardRef) -> bool {
        match self {
            CardPredicate::Any => true,
            CardPredicate::Category(c) => card.category == *c,
            CardPredicate::Name(n) => card.name == *n,
            CardPredicate::Not(inner) => !inner.matches(card),
            CardPredicate::AnyOf(options) => options.iter().any(|p| p.matches(card)),
        }
    }

    /// Every card name this predicate refers to explicitly
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            CardPredicate::Name(n) => out.push(n),
            CardPredicate::Not(inner) => inner.collect_names(out),
            CardPredicate::AnyOf(options) => options.iter().for_each(|p| p.collect_names(out)),
            CardPredicate::Any | CardPredicate::Category(_) => {}
        }
    }
}

impl fmt::Display for CardPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardPredicate::Any => write!(f, "any card"),
            CardPredicate::Category(c) => write!(f, "{}", c),
            CardPredicate::Name(n) => write!(f, "\"{}\"", n),
            CardPredicate::Not(inner) => write!(f, "not {}", inner),
            CardPredicate::AnyOf(options) => {
                let parts: Vec<String> = options.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join(" or "))
            }
        }
    }
}

/// One draw-relevant effect.
///
/// `Unknown` carries the tag of an action the producer emitted but the core
/// does not model. It resolves as a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectDescriptor {
    /// Draw `count` cards
    Draw { count: u32 },
    /// Look at the top `count`, keep matches on top, bottom the rest
    Scry { count: u32, keep: CardPredicate },
    /// Look at the top `count`, keep matches on top, bin the rest
    Surveil { count: u32, keep: CardPredicate },
    /// Search the unknown library portion for one matching card
    Tutor {
        predicate: CardPredicate,
        destination: Zone,
        #[serde(default)]
        shuffle: bool,
    },
    /// Put the bottom card of the library on top
    RevealBottomSwap,
    /// Put `count` cards from hand on top of the library. Cards not matching
    /// `keep` go back first, most recently drawn first.
    TopdeckFromHand { count: u32, keep: CardPredicate },
    /// Top `count` cards to the graveyard
    Mill { count: u32 },
    /// Shuffle the whole library, forgetting known positions
    Shuffle,
    NoOp,
    Unknown { tag: String },
}

impl EffectDescriptor {
    pub fn draw(count: u32) -> Self {
        EffectDescriptor::Draw { count }
    }

    pub fn scry(count: u32, keep: CardPredicate) -> Self {
        EffectDescriptor::Scry { count, keep }
    }

    pub fn surveil(count: u32, keep: CardPredicate) -> Self {
        EffectDescriptor::Surveil { count, keep }
    }

    pub fn topdeck_from_hand(count: u32, keep: CardPredicate) -> Self {
        EffectDescriptor::TopdeckFromHand { count, keep }
    }

    pub fn tutor(predicate: CardPredicate, destination: Zone) -> Self {
        EffectDescriptor::Tutor {
            predicate,
            destination,
            shuffle: false,
        }
    }

    /// Short lowercase tag, matching the serialized `kind`
    pub fn kind(&self) -> &str {
        match self {
            EffectDescriptor::Draw { .. } => "draw",
            EffectDescriptor::Scry { .. } => "scry",
            EffectDescriptor::Surveil { .. } => "surveil",
            EffectDescriptor::Tutor { .. } => "tutor",
            EffectDescriptor::RevealBottomSwap => "reveal_bottom_swap",
            EffectDescriptor::TopdeckFromHand { .. } => "topdeck_from_hand",
            EffectDescriptor::Mill { .. } => "mill",
            EffectDescriptor::Shuffle => "shuffle",
            EffectDescriptor::NoOp => "no_op",
            EffectDescriptor::Unknown { tag } => tag,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EffectDescriptor::Unknown { .. })
    }
}

impl fmt::Display for EffectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectDescriptor::Draw { count } => write!(f, "draw {}", count),
            EffectDescriptor::Scry { count, keep } => write!(f, "scry {} (keep {})", count, keep),
            EffectDescriptor::Surveil { count, keep } => {
                write!(f, "surveil {} (keep {})", count, keep)
            }
            EffectDescriptor::Tutor {
                predicate,
                destination,
                shuffle,
            } => {
                write!(f, "tutor {} to {}", predicate, destination)?;
                if *shuffle {
                    write!(f, ", then shuffle")?;
                }
                Ok(())
            }
            EffectDescriptor::RevealBottomSwap => write!(f, "reveal bottom card, put it on top"),
            EffectDescriptor::TopdeckFromHand { count, keep } => {
                write!(f, "put {} from hand on top (keep {})", count, keep)
            }
            EffectDescriptor::Mill { count } => write!(f, "mill {}", count),
            EffectDescriptor::Shuffle => write!(f, "shuffle library"),
            EffectDescriptor::NoOp => write!(f, "no effect"),
            EffectDescriptor::Unknown { tag } => write!(f, "unknown effect '{}'", tag),
        }
    }
}
