//! Host-triggered card effects.
//!
//! Every action names its targets and (sometimes) a characteristic in
//! `ActionParameters`. A malformed shape is rejected; a target that vanished
//! between the host's click and the message arriving is a race with a
//! disconnect and the action becomes a logged no-op.

use super::Session;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{ActionParameters, ActionType, ServerMessage};
use crate::types::{Category, CategoryMap, ConnectionId, Participant};
use rand::seq::IndexedRandom;

impl Session {
    pub(crate) fn execute_action(
        &mut self,
        action: ActionType,
        params: &ActionParameters,
    ) -> SessionResult<()> {
        let targets_needed = match action {
            ActionType::SwapCharacteristic
            | ActionType::SwapAll
            | ActionType::StealCharacteristic => 2,
            _ => 1,
        };
        if params.selected_players.len() != targets_needed {
            return Err(SessionError::validation(format!(
                "Action requires exactly {} target player(s)",
                targets_needed
            )));
        }

        let category = params.selected_characteristics.first().copied();
        let require_category = || {
            category.ok_or_else(|| {
                SessionError::validation("Action requires a characteristic type")
            })
        };

        for id in &params.selected_players {
            if self.registry.find_by_id(id).is_none() {
                tracing::warn!("action {:?} target {} is gone, skipping", action, id);
                return Ok(());
            }
        }
        let first = &params.selected_players[0];
        let second = params.selected_players.get(1);

        match action {
            ActionType::RevealCharacteristic => self.action_reveal(first, require_category()?)?,
            ActionType::RevealRandom => self.action_reveal_random(first)?,
            ActionType::RevealAll => self.action_set_all_revealed(first, true)?,
            ActionType::HideCharacteristic => self.action_hide(first, require_category()?)?,
            ActionType::RerollCharacteristic => self.action_reroll(first, require_category()?)?,
            ActionType::RerollAll => self.action_reroll_all(first)?,
            ActionType::CureHealth => self.action_reroll(first, Category::Health)?,
            ActionType::ChangeProfession => self.action_reroll(first, Category::Profession)?,
            ActionType::ChangePhobia => self.action_reroll(first, Category::Phobia)?,
            ActionType::ChangeAge => self.action_reroll(first, Category::Age)?,
            ActionType::SwapCharacteristic => {
                let other = second
                    .ok_or_else(|| SessionError::validation("Missing second target"))?;
                self.action_swap_one(first, other, require_category()?)?
            }
            ActionType::SwapAll => {
                let other = second
                    .ok_or_else(|| SessionError::validation("Missing second target"))?;
                self.action_swap_all(first, other)?
            }
            ActionType::StealCharacteristic => {
                let other = second
                    .ok_or_else(|| SessionError::validation("Missing second target"))?;
                self.action_steal(first, other, require_category()?)?
            }
            ActionType::MutePlayer => self.participant_mut(first)?.muted = true,
            ActionType::UnmutePlayer => self.participant_mut(first)?.muted = false,
            ActionType::GrantImmunity => self.participant_mut(first)?.immunity = true,
            ActionType::RevokeImmunity => self.participant_mut(first)?.immunity = false,
        }

        tracing::info!("action {:?} applied to {:?}", action, params.selected_players);
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn participant_mut(&mut self, id: &ConnectionId) -> SessionResult<&mut Participant> {
        self.registry
            .find_by_id_mut(id)
            .ok_or_else(|| SessionError::not_found("Player not found"))
    }

    fn cards_mut(&mut self, id: &ConnectionId) -> SessionResult<&mut CategoryMap> {
        self.participant_mut(id)?
            .characteristics
            .as_mut()
            .ok_or_else(|| SessionError::phase("Player has no cards"))
    }

    fn action_reveal(&mut self, id: &ConnectionId, category: Category) -> SessionResult<()> {
        let card = {
            let cards = self.cards_mut(id)?;
            let card = cards
                .get_mut(&category)
                .ok_or_else(|| SessionError::not_found("Characteristic not found"))?;
            card.revealed = true;
            card.clone()
        };
        self.broadcast(
            &ServerMessage::CharacteristicRevealed {
                player_id: id.clone(),
                characteristic_type: category,
                card,
            },
            None,
        );
        Ok(())
    }

    fn action_reveal_random(&mut self, id: &ConnectionId) -> SessionResult<()> {
        let hidden: Vec<Category> = self
            .cards_mut(id)?
            .iter()
            .filter(|(_, card)| !card.revealed)
            .map(|(category, _)| *category)
            .collect();
        let Some(category) = hidden.choose(&mut rand::rng()).copied() else {
            return Err(SessionError::validation(
                "All characteristics are already revealed",
            ));
        };
        self.action_reveal(id, category)
    }

    fn action_set_all_revealed(&mut self, id: &ConnectionId, revealed: bool) -> SessionResult<()> {
        for card in self.cards_mut(id)?.values_mut() {
            card.revealed = revealed;
        }
        Ok(())
    }

    fn action_hide(&mut self, id: &ConnectionId, category: Category) -> SessionResult<()> {
        self.cards_mut(id)?
            .get_mut(&category)
            .ok_or_else(|| SessionError::not_found("Characteristic not found"))?
            .revealed = false;
        Ok(())
    }

    fn action_reroll(&mut self, id: &ConnectionId, category: Category) -> SessionResult<()> {
        self.cards_mut(id)?;
        let fresh = self.deck.draw(category);
        self.cards_mut(id)?.insert(category, fresh);
        Ok(())
    }

    fn action_reroll_all(&mut self, id: &ConnectionId) -> SessionResult<()> {
        self.cards_mut(id)?;
        let mut dealt = CategoryMap::new();
        for category in Category::ALL {
            dealt.insert(category, self.deck.draw(category));
        }
        *self.cards_mut(id)? = dealt;
        Ok(())
    }

    /// Swap one characteristic between two players, revealed state included.
    fn action_swap_one(
        &mut self,
        a: &ConnectionId,
        b: &ConnectionId,
        category: Category,
    ) -> SessionResult<()> {
        let card_a = self
            .cards_mut(a)?
            .get(&category)
            .cloned()
            .ok_or_else(|| SessionError::not_found("Characteristic not found"))?;
        let card_b = self
            .cards_mut(b)?
            .get(&category)
            .cloned()
            .ok_or_else(|| SessionError::not_found("Characteristic not found"))?;
        self.cards_mut(a)?.insert(category, card_b);
        self.cards_mut(b)?.insert(category, card_a);
        Ok(())
    }

    fn action_swap_all(&mut self, a: &ConnectionId, b: &ConnectionId) -> SessionResult<()> {
        let cards_a = self.cards_mut(a)?.clone();
        let cards_b = self.cards_mut(b)?.clone();
        *self.cards_mut(a)? = cards_b;
        *self.cards_mut(b)? = cards_a;
        Ok(())
    }

    /// The first target takes the second's card; the victim draws a fresh one.
    fn action_steal(
        &mut self,
        thief: &ConnectionId,
        victim: &ConnectionId,
        category: Category,
    ) -> SessionResult<()> {
        let stolen = self
            .cards_mut(victim)?
            .get(&category)
            .cloned()
            .ok_or_else(|| SessionError::not_found("Characteristic not found"))?;
        self.cards_mut(thief)?;
        let replacement = self.deck.draw(category);
        self.cards_mut(victim)?.insert(category, replacement);
        self.cards_mut(thief)?.insert(category, stolen);
        Ok(())
    }
}
