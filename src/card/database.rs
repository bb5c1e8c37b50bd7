use crate::card::effects::{CardPredicate, EffectDescriptor};
use crate::card::types::{CardRef, Category};
use crate::game::zones::Zone;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Card not found in effect catalog: {0}")]
    CardNotFound(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    type_line: Option<String>,
    #[serde(default)]
    actions: Vec<Value>,
}

/// Either the versioned layout or a bare `name -> actions` map
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Versioned {
        #[serde(default)]
        version: Option<String>,
        cards: HashMap<String, CatalogEntry>,
    },
    Flat(HashMap<String, Vec<Value>>),
}

/// Read-only lookup from card name to effect descriptors.
///
/// Loaded once and never mutated; requests hold descriptor lists, not the
/// catalog. Name lookup is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct EffectCatalog {
    version: Option<String>,
    // lowercase name -> (display name, entry)
    cards: HashMap<String, (String, CatalogEntry)>,
}

impl EffectCatalog {
    /// Load a catalog from a JSON file
    pub fn from_file(path: &str) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        tracing::info!(
            path,
            cards = catalog.card_count(),
            version = catalog.version().unwrap_or("unversioned"),
            "loaded effect catalog"
        );
        Ok(catalog)
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        let (version, entries) = match file {
            CatalogFile::Versioned { version, cards } => (version, cards),
            CatalogFile::Flat(map) => (
                None,
                map.into_iter()
                    .map(|(name, actions)| {
                        (
                            name,
                            CatalogEntry {
                                actions,
                                ..CatalogEntry::default()
                            },
                        )
                    })
                    .collect(),
            ),
        };

        let cards = entries
            .into_iter()
            .map(|(name, entry)| (name.to_lowercase(), (name, entry)))
            .collect();

        Ok(EffectCatalog { version, cards })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cards.contains_key(&name.to_lowercase())
    }

    /// Effect descriptors for a card, in action order
    pub fn resolve_effects(&self, name: &str) -> Result<Vec<EffectDescriptor>, CatalogError> {
        let (_, entry) = self
            .cards
            .get(&name.to_lowercase())
            .ok_or_else(|| CatalogError::CardNotFound(name.to_string()))?;
        Ok(actions_to_descriptors(&entry.actions))
    }

    /// Category recorded for a card, falling back to its type line
    pub fn category_for(&self, name: &str) -> Option<Category> {
        let (_, entry) = self.cards.get(&name.to_lowercase())?;
        entry
            .category
            .or_else(|| entry.type_line.as_deref().map(Category::from_type_line))
    }

    /// Full card reference (catalog spelling of the name, category, effects)
    pub fn card_ref(&self, name: &str) -> Result<CardRef, CatalogError> {
        let (display, _) = self
            .cards
            .get(&name.to_lowercase())
            .ok_or_else(|| CatalogError::CardNotFound(name.to_string()))?;
        Ok(CardRef {
            name: display.clone(),
            category: self.category_for(name).unwrap_or(Category::Other),
            effects: self.resolve_effects(name)?,
        })
    }
}

/// Convert catalog actions into descriptors.
///
/// `sequence` steps are flattened and `choice` picks one option by its
/// strategy. Anything unrecognised becomes [`EffectDescriptor::Unknown`].
pub fn actions_to_descriptors(actions: &[Value]) -> Vec<EffectDescriptor> {
    let mut out = Vec::new();
    for action in actions {
        push_action(action, &mut out);
    }
    out
}

fn push_action(action: &Value, out: &mut Vec<EffectDescriptor>) {
    let Some(obj) = action.as_object() else {
        out.push(EffectDescriptor::Unknown {
            tag: "malformed".to_string(),
        });
        return;
    };
    let kind = obj
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    match kind.as_str() {
        "draw" => out.push(EffectDescriptor::Draw { count: count_of(action) }),
        "mill" => out.push(EffectDescriptor::Mill { count: count_of(action) }),
        "shuffle" => out.push(EffectDescriptor::Shuffle),
        "scry" => out.push(EffectDescriptor::Scry {
            count: count_of(action),
            keep: keep_strategy(action),
        }),
        "surveil" => out.push(EffectDescriptor::Surveil {
            count: count_of(action),
            keep: keep_strategy(action),
        }),
        "tutor" => out.push(tutor_of(action)),
        "reveal_bottom" | "reveal_bottom_swap" => out.push(EffectDescriptor::RevealBottomSwap),
        "topdeck_from_hand" => out.push(EffectDescriptor::TopdeckFromHand {
            count: count_of(action),
            keep: keep_strategy(action),
        }),
        "noop" | "no_op" | "none" => out.push(EffectDescriptor::NoOp),
        "sequence" => {
            if let Some(steps) = obj.get("steps").and_then(Value::as_array) {
                for step in steps {
                    push_action(step, out);
                }
            }
        }
        "choice" => out.extend(choose_option(action)),
        "" => out.push(EffectDescriptor::Unknown {
            tag: "missing_action".to_string(),
        }),
        other => out.push(EffectDescriptor::Unknown {
            tag: other.to_string(),
        }),
    }
}

fn count_of(action: &Value) -> u32 {
    match action.get("count") {
        None => 1,
        Some(v) => v
            .as_i64()
            .map(|n| n.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(1),
    }
}

fn keep_strategy(action: &Value) -> CardPredicate {
    match action.get("strategy").and_then(Value::as_str) {
        Some("keep_lands") => CardPredicate::category(Category::Land),
        Some("keep_nonlands") => CardPredicate::not(CardPredicate::category(Category::Land)),
        _ => CardPredicate::Any,
    }
}

fn tutor_of(action: &Value) -> EffectDescriptor {
    let target = action
        .get("target")
        .and_then(Value::as_str)
        .unwrap_or("any");
    let predicate = if target.eq_ignore_ascii_case("any") {
        CardPredicate::Any
    } else if let Ok(category) = target.parse::<Category>() {
        CardPredicate::category(category)
    } else {
        CardPredicate::name(target)
    };
    let destination = action
        .get("destination")
        .and_then(Value::as_str)
        .and_then(|d| d.parse::<Zone>().ok())
        .unwrap_or(Zone::Hand);
    let shuffle = action
        .get("shuffle")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    EffectDescriptor::Tutor {
        predicate,
        destination,
        shuffle,
    }
}

fn choose_option(action: &Value) -> Vec<EffectDescriptor> {
    let options: Vec<Vec<EffectDescriptor>> = action
        .get("options")
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .map(|opt| match opt.as_array() {
                    Some(steps) => actions_to_descriptors(steps),
                    None => actions_to_descriptors(std::slice::from_ref(opt)),
                })
                .collect()
        })
        .unwrap_or_default();

    let preferred = match action.get("strategy").and_then(Value::as_str) {
        Some("prefer_draw") => options
            .iter()
            .position(|o| o.iter().any(|e| matches!(e, EffectDescriptor::Draw { .. }))),
        Some("prefer_mill") => options
            .iter()
            .position(|o| o.iter().any(|e| matches!(e, EffectDescriptor::Mill { .. }))),
        _ => None,
    };

    options
        .into_iter()
        .nth(preferred.unwrap_or(0))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG: &str = r#"{
        "version": "2024-06-01",
        "cards": {
            "Brainstorm": { "category": "instant", "actions": [
                {"action": "draw", "count": 3},
                {"action": "topdeck_from_hand", "count": 2}
            ]},
            "Sylvan Scrying": { "type_line": "Sorcery", "actions": [
                {"action": "tutor", "target": "land", "shuffle": true}
            ]},
            "Forest": { "type_line": "Basic Land — Forest", "actions": [] }
        }
    }"#;

    #[test]
    fn test_load_versioned_catalog() {
        let catalog = EffectCatalog::from_json_str(CATALOG).expect("catalog should parse");
        assert_eq!(catalog.card_count(), 3);
        assert_eq!(catalog.version(), Some("2024-06-01"));
        assert_eq!(catalog.category_for("forest"), Some(Category::Land));
        assert_eq!(catalog.category_for("Sylvan Scrying"), Some(Category::Sorcery));
    }

    #[test]
    fn test_resolve_effects_is_case_insensitive() {
        let catalog = EffectCatalog::from_json_str(CATALOG).unwrap();
        let effects = catalog.resolve_effects("BRAINSTORM").unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], EffectDescriptor::draw(3));
        assert_eq!(effects[1], EffectDescriptor::topdeck_from_hand(2, CardPredicate::Any));
    }

    #[test]
    fn test_missing_card_is_an_error() {
        let catalog = EffectCatalog::from_json_str(CATALOG).unwrap();
        assert!(matches!(
            catalog.resolve_effects("Ancestral Recall"),
            Err(CatalogError::CardNotFound(_))
        ));
    }

    #[test]
    fn test_card_ref_uses_catalog_spelling() {
        let catalog = EffectCatalog::from_json_str(CATALOG).unwrap();
        let card = catalog.card_ref("sylvan scrying").unwrap();
        assert_eq!(card.name, "Sylvan Scrying");
        assert_eq!(card.category, Category::Sorcery);
        assert_eq!(
            card.effects,
            vec![EffectDescriptor::Tutor {
                predicate: CardPredicate::category(Category::Land),
                destination: Zone::Hand,
                shuffle: true,
            }]
        );
    }

    #[test]
    fn test_flat_catalog_layout() {
        let catalog = EffectCatalog::from_json_str(r#"{"Opt": [{"action": "scry", "count": 1}, {"action": "draw"}]}"#)
            .unwrap();
        assert_eq!(catalog.version(), None);
        assert_eq!(
            catalog.resolve_effects("opt").unwrap(),
            vec![EffectDescriptor::scry(1, CardPredicate::Any), EffectDescriptor::draw(1)]
        );
    }

    #[test]
    fn test_sequence_and_choice_conversion() {
        let actions = vec![
            json!({"action": "sequence", "steps": [
                {"action": "mill", "count": 2},
                {"action": "scry", "count": 1, "strategy": "keep_nonlands"}
            ]}),
            json!({"action": "choice", "strategy": "prefer_draw", "options": [
                [{"action": "mill", "count": 4}],
                [{"action": "draw", "count": 1}]
            ]}),
        ];
        let effects = actions_to_descriptors(&actions);
        assert_eq!(
            effects,
            vec![
                EffectDescriptor::Mill { count: 2 },
                EffectDescriptor::scry(1, CardPredicate::not(CardPredicate::category(Category::Land))),
                EffectDescriptor::draw(1),
            ]
        );
    }

    #[test]
    fn test_negative_and_missing_counts() {
        let effects = actions_to_descriptors(&[
            json!({"action": "draw", "count": -3}),
            json!({"action": "draw"}),
            json!("draw"),
        ]);
        assert_eq!(effects[0], EffectDescriptor::draw(0));
        assert_eq!(effects[1], EffectDescriptor::draw(1));
        assert!(effects[2].is_unknown());
    }

    #[test]
    fn test_topdeck_strategy_names_the_cards_kept_in_hand() {
        let effects = actions_to_descriptors(&[json!({
            "action": "topdeck_from_hand", "count": 2, "strategy": "keep_lands"
        })]);
        assert_eq!(
            effects,
            vec![EffectDescriptor::topdeck_from_hand(2, CardPredicate::category(Category::Land))]
        );
    }

    #[test]
    fn test_tutor_by_name_to_battlefield() {
        let effects = actions_to_descriptors(&[json!({
            "action": "tutor", "target": "Dryad Arbor", "destination": "battlefield", "shuffle": false
        })]);
        assert_eq!(
            effects,
            vec![EffectDescriptor::Tutor {
                predicate: CardPredicate::name("Dryad Arbor"),
                destination: Zone::Battlefield,
                shuffle: false,
            }]
        );
    }
}
