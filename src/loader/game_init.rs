//! Game initialization from decks
//!
//! Creates games from deck lists and a card registry. Libraries are filled
//! in deck-list order; shuffling happens when the engine starts the game.

use crate::config::GameConfig;
use crate::core::{CardRegistry, PlayerId};
use crate::game::GameState;
use crate::loader::DeckList;
use crate::zones::Zone;
use crate::{Result, RulesError};

/// Game builder for initializing games from decks
pub struct GameInitializer<'a> {
    registry: &'a dyn CardRegistry,
}

impl<'a> GameInitializer<'a> {
    pub fn new(registry: &'a dyn CardRegistry) -> Self {
        GameInitializer { registry }
    }

    /// Initialize a game with one player per `(name, deck)` pair
    pub fn init_game(&self, config: GameConfig, seats: &[(&str, &DeckList)]) -> Result<GameState> {
        if seats.len() < 2 {
            return Err(RulesError::invalid("a game needs at least two players"));
        }
        self.check_decks(seats)?;

        let names: Vec<&str> = seats.iter().map(|(name, _)| *name).collect();
        let mut game = GameState::new(config, &names);
        let players: Vec<PlayerId> = game.players.iter().map(|p| p.id).collect();
        for (player, (_, deck)) in players.into_iter().zip(seats) {
            self.load_deck_into_game(&mut game, player, deck)?;
        }
        Ok(game)
    }

    /// Every main-deck card must have printed characteristics in the registry
    fn check_decks(&self, seats: &[(&str, &DeckList)]) -> Result<()> {
        let missing: Vec<&str> = seats
            .iter()
            .flat_map(|(_, deck)| deck.main_deck.iter())
            .map(|entry| entry.card_name.as_str())
            .filter(|name| self.registry.script(name).and_then(|s| s.card.as_ref()).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RulesError::InvalidDeckFormat(format!("unknown cards: {}", missing.join(", "))))
        }
    }

    fn load_deck_into_game(&self, game: &mut GameState, player: PlayerId, deck: &DeckList) -> Result<()> {
        for name in deck.card_names() {
            let card = self
                .registry
                .script(name)
                .and_then(|s| s.card.clone())
                .ok_or_else(|| RulesError::InvalidDeckFormat(format!("unknown card: {}", name)))?;
            game.create_card(player, card, Zone::Library);
        }
        Ok(())
    }
}
