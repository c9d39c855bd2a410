//! Per-session card dealing with sampling-without-replacement per category.

use crate::catalog::CardCatalog;
use crate::types::{Card, Category, CategoryMap, Participant};
use rand::seq::IndexedRandom;
use std::collections::{HashMap, HashSet};

/// When a category's catalog is exhausted mid-session, the used-set is cleared
/// and dealing continues from the full catalog. Availability wins over strict
/// session-wide uniqueness at that point.
pub const RESET_CATEGORY_ON_EXHAUSTION: bool = true;

pub struct CardDeck {
    catalog: CardCatalog,
    used: HashMap<Category, HashSet<String>>,
}

impl CardDeck {
    pub fn new(catalog: CardCatalog) -> Self {
        Self {
            catalog,
            used: HashMap::new(),
        }
    }

    /// Deal a full set to every participant that has none. Participants that
    /// already hold cards (restored from a reconnection record) get their
    /// values folded into the used-sets instead of a redraw.
    pub fn deal_all<'a>(&mut self, participants: impl Iterator<Item = &'a mut Participant>) {
        // Two passes: existing holdings claim their values first so fresh
        // draws cannot collide with a reconnected player's cards.
        let mut pending: Vec<&mut Participant> = Vec::new();
        for participant in participants {
            match &participant.characteristics {
                Some(held) => {
                    let held = held.clone();
                    self.mark_used(&held);
                }
                None => pending.push(participant),
            }
        }
        for participant in pending {
            let mut dealt = CategoryMap::new();
            for category in Category::ALL {
                dealt.insert(category, self.draw(category));
            }
            participant.characteristics = Some(dealt);
        }
    }

    /// Draw uniformly among values of `category` not yet dealt this session.
    pub fn draw(&mut self, category: Category) -> Card {
        let used = self.used.entry(category).or_default();
        if used.len() >= self.catalog.len(category) {
            debug_assert!(RESET_CATEGORY_ON_EXHAUSTION);
            tracing::info!("card category '{}' exhausted, resetting its used-set", category);
            used.clear();
        }

        let candidates: Vec<_> = self
            .catalog
            .items(category)
            .iter()
            .filter(|item| !used.contains(&item.value))
            .collect();
        // Non-empty: the used-set was cleared above if it covered the catalog.
        let entry = candidates
            .choose(&mut rand::rng())
            .expect("catalog category is never empty");
        used.insert(entry.value.clone());
        Card::from(*entry)
    }

    /// Fold an already-held card set into the used-sets. Idempotent.
    pub fn mark_used(&mut self, characteristics: &CategoryMap) {
        for (category, card) in characteristics {
            self.used
                .entry(*category)
                .or_default()
                .insert(card.value.clone());
        }
    }

    /// Clear every category's used-set; invoked on session reset.
    pub fn reset_all(&mut self) {
        self.used.clear();
    }

    #[cfg(test)]
    pub fn used_count(&self, category: Category) -> usize {
        self.used.get(&category).map_or(0, |s| s.len())
    }
}
