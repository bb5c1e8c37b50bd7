use crate::card::CardId;
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Where a card instance can be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    LibraryUnknown,
    KnownTop,
    KnownBottom,
    Hand,
    Battlefield,
    Graveyard,
}

impl Zone {
    pub fn is_library(&self) -> bool {
        matches!(self, Zone::LibraryUnknown | Zone::KnownTop | Zone::KnownBottom)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Zone::LibraryUnknown => "library",
            Zone::KnownTop => "top of library",
            Zone::KnownBottom => "bottom of library",
            Zone::Hand => "hand",
            Zone::Battlefield => "battlefield",
            Zone::Graveyard => "graveyard",
        };
        f.write_str(s)
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "library" | "library_unknown" => Ok(Zone::LibraryUnknown),
            "top" | "library_top" | "known_top" => Ok(Zone::KnownTop),
            "bottom" | "library_bottom" | "known_bottom" => Ok(Zone::KnownBottom),
            "hand" => Ok(Zone::Hand),
            "battlefield" => Ok(Zone::Battlefield),
            "graveyard" => Ok(Zone::Graveyard),
            other => Err(format!("unknown zone '{}'", other)),
        }
    }
}

/// Per-name counts of the unknown-order part of the library.
///
/// Order is never materialised: a draw is a weighted pick over the counts,
/// which is the same distribution as taking the top card of a uniformly
/// shuffled pile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckComposition {
    counts: Vec<u32>,
    total: u64,
}

impl DeckComposition {
    /// Empty composition over `distinct` card ids
    pub fn new(distinct: usize) -> Self {
        DeckComposition {
            counts: vec![0; distinct],
            total: 0,
        }
    }

    pub fn from_counts(counts: Vec<u32>) -> Self {
        let total = counts.iter().map(|&c| c as u64).sum();
        DeckComposition { counts, total }
    }

    pub fn count(&self, id: CardId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Add `n` copies, saturating at `u32::MAX` copies per card
    pub fn add(&mut self, id: CardId, n: u32) {
        if id >= self.counts.len() {
            self.counts.resize(id + 1, 0);
        }
        let before = self.counts[id];
        self.counts[id] = before.saturating_add(n);
        self.total += (self.counts[id] - before) as u64;
    }

    /// Remove one copy; false if none is left
    pub fn remove_one(&mut self, id: CardId) -> bool {
        match self.counts.get_mut(id) {
            Some(c) if *c > 0 => {
                *c -= 1;
                self.total -= 1;
                true
            }
            _ => false,
        }
    }

    /// Remove and return one card, uniformly over all remaining copies
    pub fn sample(&mut self, rng: &mut GameRng) -> Option<CardId> {
        if self.total == 0 {
            return None;
        }
        let mut pick = rng.random_range(self.total);
        let mut chosen = None;
        for (id, &count) in self.counts.iter().enumerate() {
            if pick < count as u64 {
                chosen = Some(id);
                break;
            }
            pick -= count as u64;
        }
        let id = chosen?;
        self.remove_one(id);
        Some(id)
    }

    /// First id in enumeration order with copies left that satisfies `pred`
    pub fn first_matching(&self, mut pred: impl FnMut(CardId) -> bool) -> Option<CardId> {
        self.counts
            .iter()
            .enumerate()
            .find(|&(id, &count)| count > 0 && pred(id))
            .map(|(id, _)| id)
    }
}

/// The player's library: unknown multiset plus ordered known ends
#[derive(Debug, Clone, Default)]
pub struct Library {
    unknown: DeckComposition,
    top: VecDeque<CardId>,
    bottom: VecDeque<CardId>,
}

impl Library {
    pub fn new(unknown: DeckComposition) -> Self {
        Library {
            unknown,
            top: VecDeque::new(),
            bottom: VecDeque::new(),
        }
    }

    pub fn with_known(
        unknown: DeckComposition,
        top: impl IntoIterator<Item = CardId>,
        bottom: impl IntoIterator<Item = CardId>,
    ) -> Self {
        Library {
            unknown,
            top: top.into_iter().collect(),
            bottom: bottom.into_iter().collect(),
        }
    }

    pub fn size(&self) -> u64 {
        self.unknown.total() + self.top.len() as u64 + self.bottom.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn unknown(&self) -> &DeckComposition {
        &self.unknown
    }

    pub fn unknown_mut(&mut self) -> &mut DeckComposition {
        &mut self.unknown
    }

    /// Known top cards, top first
    pub fn known_top(&self) -> &VecDeque<CardId> {
        &self.top
    }

    /// Known bottom cards, the one nearest the top first
    pub fn known_bottom(&self) -> &VecDeque<CardId> {
        &self.bottom
    }

    /// Take the top card: known top, else the unknown portion, else known bottom
    pub fn take_top(&mut self, rng: &mut GameRng) -> Option<CardId> {
        if let Some(id) = self.top.pop_front() {
            return Some(id);
        }
        if let Some(id) = self.unknown.sample(rng) {
            return Some(id);
        }
        self.bottom.pop_front()
    }

    /// Take the bottom card: known bottom, else the unknown portion, else known top
    pub fn take_bottom(&mut self, rng: &mut GameRng) -> Option<CardId> {
        if let Some(id) = self.bottom.pop_back() {
            return Some(id);
        }
        if let Some(id) = self.unknown.sample(rng) {
            return Some(id);
        }
        self.top.pop_back()
    }

    /// Put cards on top so that `cards[0]` ends up as the top card
    pub fn put_on_top(&mut self, cards: &[CardId]) {
        for &id in cards.iter().rev() {
            self.top.push_front(id);
        }
    }

    /// Put cards on the bottom in order, `cards.last()` ending up lowest
    pub fn put_on_bottom(&mut self, cards: &[CardId]) {
        self.bottom.extend(cards.iter().copied());
    }

    /// The unknown portion has no order to shuffle
    pub fn shuffle_unknown(&mut self) {}

    /// Shuffle the whole library: known positions are forgotten
    pub fn shuffle(&mut self) {
        for id in self.top.drain(..).chain(self.bottom.drain(..)) {
            self.unknown.add(id, 1);
        }
    }

    /// Copies of `id` anywhere in the library
    pub fn count(&self, id: CardId) -> u32 {
        let known = self.top.iter().chain(self.bottom.iter()).filter(|&&c| c == id).count();
        self.unknown.count(id).saturating_add(known as u32)
    }
}

/// An unordered zone (hand, battlefield, graveyard)
#[derive(Debug, Clone, Default)]
pub struct Pile {
    cards: Vec<CardId>,
}

impl Pile {
    pub fn new() -> Self {
        Pile { cards: Vec::new() }
    }

    pub fn with_cards(cards: Vec<CardId>) -> Self {
        Pile { cards }
    }

    pub fn add_card(&mut self, id: CardId) {
        self.cards.push(id);
    }

    pub fn remove_card(&mut self, index: usize) -> Option<CardId> {
        if index < self.cards.len() {
            Some(self.cards.remove(index))
        } else {
            None
        }
    }

    pub fn drain(&mut self) -> Vec<CardId> {
        std::mem::take(&mut self.cards)
    }

    /// Remove and return the cards added at or after position `at`
    pub fn split_off(&mut self, at: usize) -> Vec<CardId> {
        if at >= self.cards.len() {
            return Vec::new();
        }
        self.cards.split_off(at)
    }

    pub fn size(&self) -> usize {
        self.cards.len()
    }

    pub fn cards(&self) -> &[CardId] {
        &self.cards
    }

    pub fn count(&self, id: CardId) -> u32 {
        self.cards.iter().filter(|&&c| c == id).count() as u32
    }
}
