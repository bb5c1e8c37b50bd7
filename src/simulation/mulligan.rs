use crate::card::{CardId, CardPool, Category};
use crate::game::{GameError, GameState};
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};

/// London mulligan policy based on the land count of the opening hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MulliganRule {
    pub hand_size: u32,
    pub min_lands: u32,
    pub max_lands: u32,
    pub max_mulligans: u32,
}

impl Default for MulliganRule {
    fn default() -> Self {
        MulliganRule {
            hand_size: 7,
            min_lands: 2,
            max_lands: 5,
            max_mulligans: 2,
        }
    }
}

impl MulliganRule {
    pub fn validate(&self) -> Result<(), String> {
        if self.hand_size == 0 {
            return Err("mulligan hand size must be at least 1".to_string());
        }
        if self.min_lands > self.max_lands {
            return Err(format!(
                "mulligan min_lands {} exceeds max_lands {}",
                self.min_lands, self.max_lands
            ));
        }
        if self.max_mulligans >= self.hand_size {
            return Err(format!(
                "{} mulligans would bottom the whole {}-card hand",
                self.max_mulligans, self.hand_size
            ));
        }
        Ok(())
    }
}

/// Count the number of lands in a hand
pub fn count_lands(hand: &[CardId], pool: &CardPool) -> u32 {
    hand.iter().filter(|&&id| pool.category(id) == Category::Land).count() as u32
}

/// Decide whether to mulligan a hand
pub fn should_mulligan(hand: &[CardId], pool: &CardPool, rule: &MulliganRule) -> bool {
    let lands = count_lands(hand, pool);
    lands < rule.min_lands || lands > rule.max_lands
}

/// Draw an opening hand and mulligan it until it is kept or the rule runs
/// out of mulligans. Each mulligan puts the hand back, shuffles and draws a
/// fresh hand of `hand_size`; the kept hand then bottoms one card per
/// mulligan. Cards already in hand are left alone.
///
/// Returns the number of mulligans taken.
pub fn resolve_mulligans(
    state: &mut GameState,
    pool: &CardPool,
    rule: &MulliganRule,
    rng: &mut GameRng,
) -> Result<u32, GameError> {
    let start = state.hand.size();
    state.draw_n(rule.hand_size, rng)?;

    let mut mulligans = 0;
    while mulligans < rule.max_mulligans && should_mulligan(&state.hand.cards()[start..], pool, rule) {
        for id in state.hand.split_off(start) {
            state.library.unknown_mut().add(id, 1);
        }
        state.shuffle_library();
        state.draw_n(rule.hand_size, rng)?;
        mulligans += 1;
    }

    for _ in 0..mulligans {
        bottom_one(state, pool, start);
    }

    Ok(mulligans)
}

/// Bottom the last land of a land-heavy hand, otherwise the last spell
fn bottom_one(state: &mut GameState, pool: &CardPool, start: usize) {
    let kept = &state.hand.cards()[start..];
    let lands = count_lands(kept, pool) as usize;
    let want_land = lands * 2 > kept.len();

    let pick = kept
        .iter()
        .rposition(|&id| (pool.category(id) == Category::Land) == want_land)
        .or_else(|| kept.len().checked_sub(1));

    if let Some(offset) = pick {
        if let Some(id) = state.hand.remove_card(start + offset) {
            state.library.put_on_bottom(&[id]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardRef;
    use crate::game::{DeckComposition, Library};

    const FOREST: CardId = 0;
    const OPT: CardId = 1;

    fn pool() -> CardPool {
        let mut pool = CardPool::new();
        pool.intern(CardRef::new("Forest", Category::Land));
        pool.intern(CardRef::new("Opt", Category::Instant));
        pool
    }

    #[test]
    fn test_count_lands() {
        let pool = pool();
        assert_eq!(count_lands(&[FOREST, OPT, FOREST], &pool), 2);
    }

    #[test]
    fn test_should_mulligan_bad_hand() {
        let pool = pool();
        let rule = MulliganRule::default();
        let one_land = [FOREST, OPT, OPT, OPT, OPT, OPT, OPT];
        assert!(should_mulligan(&one_land, &pool, &rule), "Hand with 1 land should mulligan");

        let flood = [FOREST; 7];
        assert!(should_mulligan(&flood, &pool, &rule));

        let keep = [FOREST, FOREST, FOREST, OPT, OPT, OPT, OPT];
        assert!(!should_mulligan(&keep, &pool, &rule));
    }

    #[test]
    fn test_resolve_mulligans_all_lands_bottoms_lands() {
        let pool = pool();
        let rule = MulliganRule::default();
        let mut rng = GameRng::new(Some(42));
        let mut state = GameState::new(Library::new(DeckComposition::from_counts(vec![60, 0])));

        let mulligans = resolve_mulligans(&mut state, &pool, &rule, &mut rng).unwrap();
        assert_eq!(mulligans, rule.max_mulligans);
        assert_eq!(state.hand.size(), 5);
        assert_eq!(state.library.known_bottom().len(), 2);
        assert_eq!(state.total_cards(), 60);
    }

    #[test]
    fn test_good_hand_is_kept() {
        let pool = pool();
        let rule = MulliganRule {
            min_lands: 0,
            max_lands: 7,
            ..MulliganRule::default()
        };
        let mut rng = GameRng::new(Some(7));
        let mut state = GameState::new(Library::new(DeckComposition::from_counts(vec![24, 36])));

        assert_eq!(resolve_mulligans(&mut state, &pool, &rule, &mut rng), Ok(0));
        assert_eq!(state.hand.size(), 7);
    }

    #[test]
    fn test_rule_validation() {
        assert!(MulliganRule::default().validate().is_ok());
        let bad = MulliganRule {
            min_lands: 4,
            max_lands: 3,
            ..MulliganRule::default()
        };
        assert!(bad.validate().is_err());
        let bad = MulliganRule {
            max_mulligans: 7,
            ..MulliganRule::default()
        };
        assert!(bad.validate().is_err());
    }
}
