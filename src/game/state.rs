use crate::card::CardId;
use crate::game::zones::{Library, Pile, Zone};
use crate::rng::GameRng;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("attempted to draw from an empty library")]
    EmptyLibraryDraw,
}

/// Zone state of a single trial
#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub library: Library,
    pub hand: Pile,
    pub battlefield: Pile,
    pub graveyard: Pile,
}

impl GameState {
    pub fn new(library: Library) -> Self {
        GameState {
            library,
            hand: Pile::new(),
            battlefield: Pile::new(),
            graveyard: Pile::new(),
        }
    }

    /// Draw a card from the library to hand
    pub fn draw_one(&mut self, rng: &mut GameRng) -> Result<CardId, GameError> {
        let id = self
            .library
            .take_top(rng)
            .ok_or(GameError::EmptyLibraryDraw)?;
        self.hand.add_card(id);
        Ok(id)
    }

    pub fn draw_n(&mut self, n: u32, rng: &mut GameRng) -> Result<(), GameError> {
        for _ in 0..n {
            self.draw_one(rng)?;
        }
        Ok(())
    }

    /// Identities of the top `k` cards. Cards taken from the unknown
    /// portion to answer this stay revealed on top.
    pub fn peek_top(&mut self, k: usize, rng: &mut GameRng) -> Vec<CardId> {
        let revealed = self.take_top_cards(k, rng);
        self.library.put_on_top(&revealed);
        revealed
    }

    /// Scry `k`: kept cards return to the top in revealed order, the rest go
    /// under the known bottom.
    pub fn scry(&mut self, k: usize, rng: &mut GameRng, keep: impl Fn(CardId) -> bool) {
        if k == 0 {
            return;
        }
        let revealed = self.take_top_cards(k, rng);
        let (kept, bottomed): (Vec<CardId>, Vec<CardId>) = revealed.into_iter().partition(|&id| keep(id));
        self.library.put_on_bottom(&bottomed);
        self.library.put_on_top(&kept);
    }

    /// Surveil `k`: like scry, but cards not kept go to the graveyard
    pub fn surveil(&mut self, k: usize, rng: &mut GameRng, keep: impl Fn(CardId) -> bool) {
        if k == 0 {
            return;
        }
        let revealed = self.take_top_cards(k, rng);
        let (kept, binned): (Vec<CardId>, Vec<CardId>) = revealed.into_iter().partition(|&id| keep(id));
        for id in binned {
            self.graveyard.add_card(id);
        }
        self.library.put_on_top(&kept);
    }

    /// Mill up to `k` cards; an empty library just stops the mill
    pub fn mill(&mut self, k: usize, rng: &mut GameRng) -> usize {
        let milled = self.take_top_cards(k, rng);
        let n = milled.len();
        for id in milled {
            self.graveyard.add_card(id);
        }
        n
    }

    /// Search the unknown portion for the first matching name and move one
    /// copy to `destination`. `None` is a fizzle.
    pub fn tutor(&mut self, destination: Zone, matches: impl FnMut(CardId) -> bool) -> Option<CardId> {
        let id = self.library.unknown().first_matching(matches)?;
        self.library.unknown_mut().remove_one(id);
        self.place(id, destination);
        Some(id)
    }

    /// Reveal the bottom card of the library and put it on top
    pub fn reveal_bottom_swap(&mut self, rng: &mut GameRng) -> Option<CardId> {
        let id = self.library.take_bottom(rng)?;
        self.library.put_on_top(&[id]);
        Some(id)
    }

    /// Put up to `k` cards from hand on top of the library, one at a time.
    /// Cards rejected by `keep` go first, most recently drawn first, then
    /// kept cards in the same order. The last card put back is drawn next.
    pub fn topdeck_from_hand(&mut self, k: usize, keep: impl Fn(CardId) -> bool) -> usize {
        let mut moved = 0;
        for put_back_kept in [false, true] {
            let mut i = self.hand.size();
            while i > 0 && moved < k {
                i -= 1;
                if keep(self.hand.cards()[i]) != put_back_kept {
                    continue;
                }
                if let Some(id) = self.hand.remove_card(i) {
                    self.library.put_on_top(&[id]);
                    moved += 1;
                }
            }
        }
        moved
    }

    pub fn shuffle_unknown(&mut self) {
        self.library.shuffle_unknown();
    }

    pub fn shuffle_library(&mut self) {
        self.library.shuffle();
    }

    /// Put a card that is not in any zone into `zone`
    pub fn place(&mut self, id: CardId, zone: Zone) {
        match zone {
            Zone::Hand => self.hand.add_card(id),
            Zone::Battlefield => self.battlefield.add_card(id),
            Zone::Graveyard => self.graveyard.add_card(id),
            Zone::KnownTop => self.library.put_on_top(&[id]),
            Zone::KnownBottom => self.library.put_on_bottom(&[id]),
            Zone::LibraryUnknown => self.library.unknown_mut().add(id, 1),
        }
    }

    /// Copies of `id` in `zone`
    pub fn count_in(&self, zone: Zone, id: CardId) -> u32 {
        match zone {
            Zone::Hand => self.hand.count(id),
            Zone::Battlefield => self.battlefield.count(id),
            Zone::Graveyard => self.graveyard.count(id),
            Zone::KnownTop => self.library.known_top().iter().filter(|&&c| c == id).count() as u32,
            Zone::KnownBottom => self.library.known_bottom().iter().filter(|&&c| c == id).count() as u32,
            Zone::LibraryUnknown => self.library.unknown().count(id),
        }
    }

    /// Call `f` for every card instance in the listed zones
    pub fn visit_cards(&self, zones: &[Zone], mut f: impl FnMut(CardId)) {
        for zone in zones {
            match zone {
                Zone::Hand => self.hand.cards().iter().copied().for_each(&mut f),
                Zone::Battlefield => self.battlefield.cards().iter().copied().for_each(&mut f),
                Zone::Graveyard => self.graveyard.cards().iter().copied().for_each(&mut f),
                Zone::KnownTop => self.library.known_top().iter().copied().for_each(&mut f),
                Zone::KnownBottom => self.library.known_bottom().iter().copied().for_each(&mut f),
                Zone::LibraryUnknown => {
                    for (id, &count) in self.library.unknown().counts().iter().enumerate() {
                        for _ in 0..count {
                            f(id);
                        }
                    }
                }
            }
        }
    }

    /// Total card instances across every zone
    pub fn total_cards(&self) -> u64 {
        self.library.size()
            + self.hand.size() as u64
            + self.battlefield.size() as u64
            + self.graveyard.size() as u64
    }

    fn take_top_cards(&mut self, k: usize, rng: &mut GameRng) -> Vec<CardId> {
        let mut taken = Vec::with_capacity(k);
        for _ in 0..k {
            match self.library.take_top(rng) {
                Some(id) => taken.push(id),
                None => break,
            }
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::zones::DeckComposition;
    use proptest::prelude::*;

    const LAND: CardId = 0;
    const SPELL: CardId = 1;

    fn state(lands: u32, spells: u32) -> GameState {
        GameState::new(Library::new(DeckComposition::from_counts(vec![lands, spells])))
    }

    #[test]
    fn test_draw_prefers_known_top() {
        let mut rng = GameRng::new(Some(3));
        let mut s = GameState::new(Library::with_known(DeckComposition::from_counts(vec![5, 0]), [SPELL], []));
        assert_eq!(s.draw_one(&mut rng), Ok(SPELL));
        assert_eq!(s.draw_one(&mut rng), Ok(LAND));
        assert_eq!(s.hand.size(), 2);
    }

    #[test]
    fn test_draw_from_empty_library_is_an_error() {
        let mut rng = GameRng::new(Some(3));
        let mut s = state(1, 0);
        assert!(s.draw_one(&mut rng).is_ok());
        assert_eq!(s.draw_one(&mut rng), Err(GameError::EmptyLibraryDraw));
        assert_eq!(s.draw_n(2, &mut rng), Err(GameError::EmptyLibraryDraw));
    }

    #[test]
    fn test_scry_reveals_from_unknown_and_reorders() {
        let mut rng = GameRng::new(Some(11));
        let mut s = state(2, 2);
        s.scry(4, &mut rng, |id| id == LAND);

        let top: Vec<_> = s.library.known_top().iter().copied().collect();
        let bottom: Vec<_> = s.library.known_bottom().iter().copied().collect();
        assert_eq!(top, vec![LAND, LAND]);
        assert_eq!(bottom, vec![SPELL, SPELL]);
        assert!(s.library.unknown().is_empty());

        assert_eq!(s.draw_one(&mut rng), Ok(LAND));
    }

    #[test]
    fn test_scry_zero_is_a_no_op() {
        let mut rng = GameRng::new(Some(11));
        let mut s = state(2, 2);
        s.scry(0, &mut rng, |_| false);
        assert!(s.library.known_top().is_empty());
        assert_eq!(s.library.unknown().total(), 4);
    }

    #[test]
    fn test_surveil_bins_unkept_cards() {
        let mut rng = GameRng::new(Some(5));
        let mut s = state(0, 3);
        s.surveil(2, &mut rng, |id| id == LAND);
        assert_eq!(s.graveyard.count(SPELL), 2);
        assert_eq!(s.library.size(), 1);
    }

    #[test]
    fn test_mill_stops_at_empty_library() {
        let mut rng = GameRng::new(Some(5));
        let mut s = state(1, 1);
        assert_eq!(s.mill(5, &mut rng), 2);
        assert_eq!(s.graveyard.size(), 2);
        assert!(s.library.is_empty());
    }

    #[test]
    fn test_tutor_moves_first_match_or_fizzles() {
        let mut s = state(3, 1);
        assert_eq!(s.tutor(Zone::Battlefield, |id| id == SPELL), Some(SPELL));
        assert_eq!(s.battlefield.count(SPELL), 1);
        assert_eq!(s.tutor(Zone::Hand, |id| id == SPELL), None);
        assert_eq!(s.tutor(Zone::Hand, |_| true), Some(LAND));
        assert_eq!(s.library.unknown().count(LAND), 2);
    }

    #[test]
    fn test_tutor_ignores_known_positions() {
        let mut s = GameState::new(Library::with_known(DeckComposition::from_counts(vec![0, 0]), [SPELL], []));
        assert_eq!(s.tutor(Zone::Hand, |_| true), None);
    }

    #[test]
    fn test_reveal_bottom_swap_uses_known_bottom_first() {
        let mut rng = GameRng::new(Some(5));
        let mut s = GameState::new(Library::with_known(DeckComposition::from_counts(vec![4, 0]), [], [SPELL]));
        assert_eq!(s.reveal_bottom_swap(&mut rng), Some(SPELL));
        assert_eq!(s.draw_one(&mut rng), Ok(SPELL));
    }

    #[test]
    fn test_topdeck_from_hand_returns_unkept_cards_first() {
        let mut rng = GameRng::new(Some(4));
        let mut s = GameState::new(Library::new(DeckComposition::from_counts(vec![10, 10])));
        s.hand = Pile::with_cards(vec![SPELL, LAND, SPELL, LAND]);

        assert_eq!(s.topdeck_from_hand(3, |id| id == SPELL), 3);
        assert_eq!(s.hand.cards(), &[SPELL]);
        assert_eq!(
            s.library.known_top().iter().copied().collect::<Vec<_>>(),
            vec![SPELL, LAND, LAND]
        );
        assert_eq!(s.draw_one(&mut rng), Ok(SPELL));

        assert_eq!(s.topdeck_from_hand(5, |_| true), 2);
        assert_eq!(s.hand.size(), 0);
    }

    #[test]
    fn test_peek_top_makes_cards_known_without_moving_them() {
        let mut rng = GameRng::new(Some(8));
        let mut s = state(3, 3);
        let seen = s.peek_top(2, &mut rng);
        assert_eq!(seen.len(), 2);
        assert_eq!(s.library.known_top().iter().copied().collect::<Vec<_>>(), seen);
        assert_eq!(s.library.size(), 6);
        assert_eq!(s.draw_one(&mut rng), Ok(seen[0]));
    }

    proptest! {
        #[test]
        fn prop_operations_conserve_card_instances(
            lands in 0u32..20,
            spells in 0u32..20,
            seed in any::<u64>(),
            ops in proptest::collection::vec(0u8..7, 0..12),
        ) {
            let mut rng = GameRng::new(Some(seed));
            let mut s = state(lands, spells);
            let total = s.total_cards();
            for op in ops {
                match op {
                    0 => { let _ = s.draw_one(&mut rng); }
                    1 => s.scry(2, &mut rng, |id| id == LAND),
                    2 => s.surveil(2, &mut rng, |id| id == SPELL),
                    3 => { s.mill(1, &mut rng); }
                    4 => { s.tutor(Zone::Battlefield, |id| id == LAND); }
                    5 => { s.topdeck_from_hand(2, |id| id == LAND); }
                    _ => { s.reveal_bottom_swap(&mut rng); s.shuffle_library(); }
                }
                prop_assert_eq!(s.total_cards(), total);
            }
        }
    }
}
