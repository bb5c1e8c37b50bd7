use crate::card::{CatalogError, Category, EffectCatalog};
use crate::simulation::full_state::FullStateRequest;
use crate::simulation::request::{DeckEntry, SimulationRequest, TargetCondition};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid deck format at line {line}: {reason}")]
    InvalidFormat { line: usize, reason: String },
    #[error("Effect catalog error: {0}")]
    CatalogError(#[from] CatalogError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Library,
    Top,
    Bottom,
    Hand,
    Battlefield,
    Graveyard,
}

impl Section {
    fn from_header(header: &str) -> Option<Section> {
        match header.trim().to_ascii_lowercase().as_str() {
            "library" | "deck" => Some(Section::Library),
            "top" => Some(Section::Top),
            "bottom" => Some(Section::Bottom),
            "hand" => Some(Section::Hand),
            "battlefield" => Some(Section::Battlefield),
            "graveyard" => Some(Section::Graveyard),
            _ => None,
        }
    }
}

/// Contents of a deck file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckFile {
    pub entries: Vec<DeckEntry>,
    pub known_top: Vec<String>,
    pub known_bottom: Vec<String>,
    pub hand: Vec<String>,
    pub battlefield: Vec<String>,
    pub graveyard: Vec<String>,
}

impl DeckFile {
    /// Cards in the unknown part of the library
    pub fn library_count(&self) -> i64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn request(&self, target: TargetCondition) -> SimulationRequest {
        SimulationRequest::new(self.entries.clone(), target)
            .with_known_top(self.known_top.iter().cloned())
            .with_known_bottom(self.known_bottom.iter().cloned())
            .with_hand(self.hand.iter().cloned())
            .with_battlefield(self.battlefield.iter().cloned())
            .with_graveyard(self.graveyard.iter().cloned())
    }

    pub fn full_state_request(&self, horizon: u32) -> FullStateRequest {
        let mut request = FullStateRequest::new(self.entries.clone());
        request.known_top = self.known_top.clone();
        request.known_bottom = self.known_bottom.clone();
        request.horizon = horizon;
        request
    }

    fn declare(&mut self, name: &str, category: Category) {
        if !self.entries.iter().any(|e| e.name == name) {
            self.entries.push(DeckEntry::new(name, category, 0));
        }
    }
}

/// Parse a deck file.
/// Format: "4 Card Name" per line with an optional "| category" suffix,
/// comments with # or //, and [top] / [bottom] / [hand] / [battlefield] /
/// [graveyard] sections listing placed cards in order.
pub fn parse_deck_file(path: &str, catalog: Option<&EffectCatalog>) -> Result<DeckFile, DeckError> {
    let content = std::fs::read_to_string(path)?;
    let deck = parse_deck_str(&content, catalog)?;
    tracing::info!(path, entries = deck.entries.len(), cards = deck.library_count(), "loaded deck");
    Ok(deck)
}

pub fn parse_deck_str(content: &str, catalog: Option<&EffectCatalog>) -> Result<DeckFile, DeckError> {
    let mut deck = DeckFile::default();
    let mut section = Section::Library;

    for (line_num, line) in content.lines().enumerate() {
        let line_no = line_num + 1;
        let trimmed = line.trim();

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            section = Section::from_header(header).ok_or_else(|| DeckError::InvalidFormat {
                line: line_no,
                reason: format!("unknown section '[{}]'", header),
            })?;
            continue;
        }

        let (body, category) = match trimmed.split_once('|') {
            Some((body, category)) => {
                let category: Category = category.trim().parse().map_err(|_| DeckError::InvalidFormat {
                    line: line_no,
                    reason: format!("'{}' is not a card category", category.trim()),
                })?;
                (body.trim(), Some(category))
            }
            None => (trimmed, None),
        };

        let (count, name) = split_count(body, line_no, section == Section::Library)?;
        let category = category
            .or_else(|| catalog.and_then(|c| c.category_for(name)))
            .unwrap_or(Category::Other);

        let placed = match section {
            Section::Library => {
                deck.entries.push(DeckEntry::new(name, category, count));
                continue;
            }
            Section::Top => &mut deck.known_top,
            Section::Bottom => &mut deck.known_bottom,
            Section::Hand => &mut deck.hand,
            Section::Battlefield => &mut deck.battlefield,
            Section::Graveyard => &mut deck.graveyard,
        };
        if count < 0 {
            return Err(DeckError::InvalidFormat {
                line: line_no,
                reason: format!("negative count {} for '{}'", count, name),
            });
        }
        for _ in 0..count {
            placed.push(name.to_string());
        }
        deck.declare(name, category);
    }

    Ok(deck)
}

/// Split "N Card Name". The count is required in the library section and
/// defaults to 1 elsewhere. Negative counts parse here and are rejected when
/// the request is validated.
fn split_count(body: &str, line: usize, count_required: bool) -> Result<(i64, &str), DeckError> {
    let parts: Vec<&str> = body.splitn(2, ' ').collect();
    let parsed = parts[0].parse::<i64>();

    match (parsed, parts.get(1)) {
        (Ok(count), Some(name)) if !name.trim().is_empty() => Ok((count, name.trim())),
        (Ok(_), _) => Err(DeckError::InvalidFormat {
            line,
            reason: "missing card name".to_string(),
        }),
        (Err(_), _) if count_required => Err(DeckError::InvalidFormat {
            line,
            reason: format!("'{}' is not a valid number; expected 'COUNT CARD_NAME'", parts[0]),
        }),
        (Err(_), _) => Ok((1, body)),
    }
}
