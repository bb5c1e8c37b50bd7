use crate::card::{CardPool, CardPredicate, CardRef, Category};
use crate::game::{ActiveEffect, DeckComposition, EffectResolver, GameState, Library, Pile, Zone};
use crate::simulation::error::SimulationError;
use crate::simulation::mulligan::MulliganRule;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TRIALS: u64 = 10_000;

fn default_trials() -> u64 {
    DEFAULT_TRIALS
}

fn default_category() -> Category {
    Category::Other
}

/// One line of a deck composition: copies of `name` in the unknown part of
/// the library. Counts are signed so a negative count can be rejected
/// instead of failing to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckEntry {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: Category,
    pub count: i64,
}

impl DeckEntry {
    pub fn new(name: impl Into<String>, category: Category, count: i64) -> Self {
        DeckEntry {
            name: name.into(),
            category,
            count,
        }
    }
}

/// Zones checked when a trial is evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitScope {
    /// Cards that left the library: hand, battlefield, graveyard
    Drawn,
    /// Also cards whose library position is known
    #[default]
    Revealed,
}

impl HitScope {
    pub fn zones(self) -> &'static [Zone] {
        match self {
            HitScope::Drawn => &[Zone::Hand, Zone::Battlefield, Zone::Graveyard],
            HitScope::Revealed => &[
                Zone::Hand,
                Zone::Battlefield,
                Zone::Graveyard,
                Zone::KnownTop,
                Zone::KnownBottom,
            ],
        }
    }
}

/// What counts as a hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCondition {
    /// At least one matching card
    Has(CardPredicate),
    /// At least `count` matching cards
    AtLeast { predicate: CardPredicate, count: u32 },
    All(Vec<TargetCondition>),
    Any(Vec<TargetCondition>),
}

impl TargetCondition {
    pub fn category(category: Category) -> Self {
        TargetCondition::Has(CardPredicate::Category(category))
    }

    /// Hit when any of the names is found
    pub fn any_name<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TargetCondition::Has(CardPredicate::AnyOf(
            names.into_iter().map(|n| CardPredicate::Name(n.into())).collect(),
        ))
    }

    /// Hit when every one of the names is found
    pub fn all_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TargetCondition::All(
            names
                .into_iter()
                .map(|n| TargetCondition::Has(CardPredicate::Name(n.into())))
                .collect(),
        )
    }

    pub fn referenced_names(&self) -> Vec<&str> {
        match self {
            TargetCondition::Has(p) => p.referenced_names(),
            TargetCondition::AtLeast { predicate, .. } => predicate.referenced_names(),
            TargetCondition::All(parts) | TargetCondition::Any(parts) => {
                parts.iter().flat_map(|p| p.referenced_names()).collect()
            }
        }
    }

    /// Resolve predicates against the pool once so trials only index masks
    pub fn compile(&self, pool: &CardPool) -> CompiledTarget {
        let mask = |p: &CardPredicate| -> Vec<bool> { pool.iter().map(|(_, card)| p.matches(card)).collect() };
        match self {
            TargetCondition::Has(p) => CompiledTarget::Has(mask(p)),
            TargetCondition::AtLeast { predicate, count } => CompiledTarget::AtLeast {
                mask: mask(predicate),
                count: *count,
            },
            TargetCondition::All(parts) => {
                CompiledTarget::All(parts.iter().map(|p| p.compile(pool)).collect())
            }
            TargetCondition::Any(parts) => {
                CompiledTarget::Any(parts.iter().map(|p| p.compile(pool)).collect())
            }
        }
    }
}

impl fmt::Display for TargetCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |parts: &[TargetCondition], sep: &str| {
            parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(sep)
        };
        match self {
            TargetCondition::Has(p) => write!(f, "{}", p),
            TargetCondition::AtLeast { predicate, count } => write!(f, "{}+ {}", count, predicate),
            TargetCondition::All(parts) => write!(f, "[{}]", join(parts, " and ")),
            TargetCondition::Any(parts) => write!(f, "[{}]", join(parts, " or ")),
        }
    }
}

/// Target condition with predicates turned into per-card masks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledTarget {
    Has(Vec<bool>),
    AtLeast { mask: Vec<bool>, count: u32 },
    All(Vec<CompiledTarget>),
    Any(Vec<CompiledTarget>),
}

impl CompiledTarget {
    /// `held[id]` is the number of copies of card `id` in the evaluated zones
    pub fn is_met(&self, held: &[u32]) -> bool {
        match self {
            CompiledTarget::Has(mask) => mask.iter().zip(held).any(|(&m, &h)| m && h > 0),
            CompiledTarget::AtLeast { mask, count } => {
                let n: u32 = mask.iter().zip(held).filter(|(&m, _)| m).map(|(_, &h)| h).sum();
                n >= *count
            }
            CompiledTarget::All(parts) => parts.iter().all(|p| p.is_met(held)),
            CompiledTarget::Any(parts) => parts.iter().any(|p| p.is_met(held)),
        }
    }
}

/// How many cards the draw phase takes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawPlan {
    pub draws: u32,
    #[serde(default)]
    pub mulligan: Option<MulliganRule>,
}

impl DrawPlan {
    pub const OPENING_HAND: u32 = 7;

    pub fn opening_hand() -> Self {
        Self::draws(Self::OPENING_HAND)
    }

    pub fn draws(draws: u32) -> Self {
        DrawPlan { draws, mulligan: None }
    }

    /// Opening hand plus the draw steps up to and including `turn` (1-based).
    /// The player on the play skips the first draw.
    pub fn until_turn(turn: u32, on_the_play: bool) -> Self {
        let extra = if on_the_play { turn.saturating_sub(1) } else { turn };
        Self::draws(Self::OPENING_HAND + extra)
    }

    pub fn with_mulligan(mut self, rule: MulliganRule) -> Self {
        self.mulligan = Some(rule);
        self
    }
}

impl Default for DrawPlan {
    fn default() -> Self {
        Self::opening_hand()
    }
}

/// A complete scenario to estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Unknown-order part of the library
    pub deck: Vec<DeckEntry>,
    #[serde(default)]
    pub known_top: Vec<String>,
    #[serde(default)]
    pub known_bottom: Vec<String>,
    #[serde(default)]
    pub hand: Vec<String>,
    #[serde(default)]
    pub battlefield: Vec<String>,
    #[serde(default)]
    pub graveyard: Vec<String>,
    #[serde(default)]
    pub effects: Vec<ActiveEffect>,
    /// When set, an effect with a source card only resolves while a copy of
    /// the source sits in one of these zones
    #[serde(default)]
    pub effect_zones: Option<Vec<Zone>>,
    pub target: TargetCondition,
    #[serde(default)]
    pub draw: DrawPlan,
    #[serde(default = "default_trials")]
    pub trials: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Report per-name and per-category probabilities
    #[serde(default)]
    pub breakdown: bool,
    #[serde(default)]
    pub scope: HitScope,
}

impl SimulationRequest {
    pub fn new(deck: Vec<DeckEntry>, target: TargetCondition) -> Self {
        SimulationRequest {
            deck,
            known_top: Vec::new(),
            known_bottom: Vec::new(),
            hand: Vec::new(),
            battlefield: Vec::new(),
            graveyard: Vec::new(),
            effects: Vec::new(),
            effect_zones: None,
            target,
            draw: DrawPlan::default(),
            trials: DEFAULT_TRIALS,
            seed: None,
            breakdown: false,
            scope: HitScope::default(),
        }
    }

    pub fn with_trials(mut self, trials: u64) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_draw(mut self, draw: DrawPlan) -> Self {
        self.draw = draw;
        self
    }

    pub fn with_effect(mut self, effect: ActiveEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = ActiveEffect>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn with_effect_zones(mut self, zones: Vec<Zone>) -> Self {
        self.effect_zones = Some(zones);
        self
    }

    pub fn with_known_top<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.known_top = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_known_bottom<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.known_bottom = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hand<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.hand = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_battlefield<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.battlefield = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_graveyard<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.graveyard = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_breakdown(mut self, breakdown: bool) -> Self {
        self.breakdown = breakdown;
        self
    }

    pub fn with_scope(mut self, scope: HitScope) -> Self {
        self.scope = scope;
        self
    }

    /// Validate the request and build the shared, immutable trial setup
    pub fn prepare(&self) -> Result<Scenario, SimulationError> {
        if self.trials == 0 {
            return Err(SimulationError::malformed("trial count must be at least 1"));
        }

        let mut pool = CardPool::new();
        let mut unknown = DeckComposition::new(0);
        for entry in &self.deck {
            if entry.name.trim().is_empty() {
                return Err(SimulationError::malformed("deck entry with an empty card name"));
            }
            if entry.count < 0 {
                return Err(SimulationError::malformed(format!(
                    "negative count {} for '{}'",
                    entry.count, entry.name
                )));
            }
            let count = u32::try_from(entry.count).map_err(|_| {
                SimulationError::malformed(format!("count {} for '{}' is too large", entry.count, entry.name))
            })?;
            let id = pool.intern(CardRef::new(entry.name.clone(), entry.category));
            if unknown.count(id).checked_add(count).is_none() {
                return Err(SimulationError::malformed(format!(
                    "combined count for '{}' is too large",
                    entry.name
                )));
            }
            unknown.add(id, count);
        }

        let placed = |names: &[String], zone: Zone| -> Result<Vec<usize>, SimulationError> {
            names
                .iter()
                .map(|name| {
                    pool.id(name).ok_or_else(|| {
                        SimulationError::malformed(format!("'{}' in {} is not part of the deck", name, zone))
                    })
                })
                .collect()
        };
        let top = placed(&self.known_top, Zone::KnownTop)?;
        let bottom = placed(&self.known_bottom, Zone::KnownBottom)?;
        let hand = placed(&self.hand, Zone::Hand)?;
        let battlefield = placed(&self.battlefield, Zone::Battlefield)?;
        let graveyard = placed(&self.graveyard, Zone::Graveyard)?;

        let library = Library::with_known(unknown, top, bottom);
        if library.is_empty() {
            return Err(SimulationError::malformed("library has no cards"));
        }

        let base = GameState {
            library,
            hand: Pile::with_cards(hand),
            battlefield: Pile::with_cards(battlefield),
            graveyard: Pile::with_cards(graveyard),
        };

        for name in self.target.referenced_names() {
            let present = pool.id(name).map(|id| {
                base.library.count(id)
                    + base.hand.count(id)
                    + base.battlefield.count(id)
                    + base.graveyard.count(id)
            });
            if present.unwrap_or(0) == 0 {
                return Err(SimulationError::malformed(format!(
                    "target card '{}' is not in the deck",
                    name
                )));
            }
        }

        if self.effect_zones.is_some() {
            for effect in &self.effects {
                if let Some(source) = &effect.source {
                    if pool.id(source).is_none() {
                        return Err(SimulationError::malformed(format!(
                            "effect source '{}' is not part of the deck",
                            source
                        )));
                    }
                }
            }
        }

        if let Some(rule) = &self.draw.mulligan {
            rule.validate().map_err(SimulationError::malformed)?;
            if self.draw.draws < rule.hand_size {
                return Err(SimulationError::malformed(format!(
                    "draw plan takes {} cards but the mulligan rule needs an opening hand of {}",
                    self.draw.draws, rule.hand_size
                )));
            }
            if !self.hand.is_empty() {
                return Err(SimulationError::malformed(
                    "a mulligan rule cannot be combined with cards already in hand",
                ));
            }
        }

        let resolver = EffectResolver::new(&pool, &self.effects, self.effect_zones.clone());
        let target = self.target.compile(&pool);

        Ok(Scenario {
            pool,
            base,
            resolver,
            target,
            draw: self.draw.clone(),
            scope: self.scope,
            breakdown: self.breakdown,
            trials: self.trials,
        })
    }
}

/// A validated request: the immutable state every trial starts from
#[derive(Debug, Clone)]
pub struct Scenario {
    pub pool: CardPool,
    pub base: GameState,
    pub resolver: EffectResolver,
    pub target: CompiledTarget,
    pub draw: DrawPlan,
    pub scope: HitScope,
    pub breakdown: bool,
    pub trials: u64,
}

impl Scenario {
    pub fn library_size(&self) -> u64 {
        self.base.library.size()
    }

    pub fn deck_size(&self) -> u64 {
        self.base.total_cards()
    }
}
