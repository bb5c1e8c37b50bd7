//! Applies active effect descriptors to a trial's game state.
//!
//! Effects resolve once each, in declaration order, before the draw phase.
//! Tutors that find nothing fizzle and unknown effect kinds are skipped;
//! neither is an error.

use crate::card::{CardId, CardPool, EffectDescriptor};
use crate::game::state::{GameError, GameState};
use crate::game::zones::Zone;
use crate::rng::GameRng;
use serde::{Deserialize, Serialize};

/// An effect together with the card that owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    /// Card whose presence makes the effect eligible. `None` always resolves.
    #[serde(default)]
    pub source: Option<String>,
    pub effect: EffectDescriptor,
}

impl ActiveEffect {
    pub fn new(effect: EffectDescriptor) -> Self {
        ActiveEffect { source: None, effect }
    }

    pub fn from_card(source: impl Into<String>, effect: EffectDescriptor) -> Self {
        ActiveEffect {
            source: Some(source.into()),
            effect,
        }
    }
}

/// What happened while resolving one trial's effects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub resolved: u32,
    pub fizzled: u32,
    pub unknown: u32,
    pub ineligible: u32,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Unconditional,
    Card(CardId),
    /// Named card that is not part of the deck
    Absent,
}

#[derive(Debug, Clone)]
struct BoundEffect {
    source: Source,
    effect: EffectDescriptor,
}

/// Effects of one request, bound to the request's card pool
#[derive(Debug, Clone, Default)]
pub struct EffectResolver {
    effects: Vec<BoundEffect>,
    eligible_zones: Option<Vec<Zone>>,
}

impl EffectResolver {
    /// Bind effects to card ids. With `eligible_zones` set, an effect whose
    /// source is not in `pool` never resolves.
    pub fn new(pool: &CardPool, effects: &[ActiveEffect], eligible_zones: Option<Vec<Zone>>) -> Self {
        let effects = effects
            .iter()
            .map(|active| {
                if active.effect.is_unknown() {
                    tracing::warn!(
                        kind = active.effect.kind(),
                        source = active.source.as_deref().unwrap_or("-"),
                        "unknown effect kind will resolve as a no-op"
                    );
                }
                let source = match active.source.as_deref() {
                    None => Source::Unconditional,
                    Some(name) => pool.id(name).map(Source::Card).unwrap_or(Source::Absent),
                };
                BoundEffect {
                    source,
                    effect: active.effect.clone(),
                }
            })
            .collect();
        EffectResolver {
            effects,
            eligible_zones,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// True when at least one effect can change the state
    pub fn has_active_effects(&self) -> bool {
        self.effects
            .iter()
            .any(|b| !matches!(b.effect, EffectDescriptor::NoOp | EffectDescriptor::Unknown { .. }))
    }

    fn is_eligible(&self, state: &GameState, source: Source) -> bool {
        let Some(zones) = &self.eligible_zones else {
            return true;
        };
        match source {
            Source::Unconditional => true,
            Source::Card(id) => zones.iter().any(|&zone| state.count_in(zone, id) > 0),
            Source::Absent => false,
        }
    }

    /// Resolve every eligible effect once, in order
    pub fn resolve(
        &self,
        state: &mut GameState,
        pool: &CardPool,
        rng: &mut GameRng,
    ) -> Result<ResolveReport, GameError> {
        let mut report = ResolveReport::default();

        for bound in &self.effects {
            if !self.is_eligible(state, bound.source) {
                report.ineligible += 1;
                continue;
            }
            apply_effect(&bound.effect, state, pool, rng, &mut report)?;
        }

        Ok(report)
    }
}

/// Apply one effect to the state
pub fn apply_effect(
    effect: &EffectDescriptor,
    state: &mut GameState,
    pool: &CardPool,
    rng: &mut GameRng,
    report: &mut ResolveReport,
) -> Result<(), GameError> {
    match effect {
        EffectDescriptor::Draw { count } => {
            state.draw_n(*count, rng)?;
        }
        EffectDescriptor::Scry { count, keep } => {
            state.scry(*count as usize, rng, |id| keep.matches(pool.get(id)));
        }
        EffectDescriptor::Surveil { count, keep } => {
            state.surveil(*count as usize, rng, |id| keep.matches(pool.get(id)));
        }
        EffectDescriptor::Tutor {
            predicate,
            destination,
            shuffle,
        } => {
            let found = state.tutor(*destination, |id| predicate.matches(pool.get(id)));
            if found.is_none() {
                report.fizzled += 1;
                tracing::trace!(%predicate, "tutor fizzled");
            }
            if *shuffle {
                state.shuffle_library();
            }
        }
        EffectDescriptor::RevealBottomSwap => {
            state.reveal_bottom_swap(rng);
        }
        EffectDescriptor::TopdeckFromHand { count, keep } => {
            state.topdeck_from_hand(*count as usize, |id| keep.matches(pool.get(id)));
        }
        EffectDescriptor::Mill { count } => {
            state.mill(*count as usize, rng);
        }
        EffectDescriptor::Shuffle => {
            state.shuffle_library();
        }
        EffectDescriptor::NoOp => {}
        EffectDescriptor::Unknown { tag } => {
            report.unknown += 1;
            tracing::debug!(kind = %tag, "skipping unknown effect kind");
            return Ok(());
        }
    }
    report.resolved += 1;
    Ok(())
}
