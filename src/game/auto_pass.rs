//! Automatic priority passing
//!
//! A session layer keeps one [`AutoPassManager`] per game and asks it, each
//! time priority changes hands, whether the holder would pass anyway. The
//! manager never answers decisions and never passes for a player who does
//! not hold priority.

use crate::core::{EntityId, PlayerId};
use crate::game::actions::Action;
use crate::game::engine::RulesEngine;
use crate::game::events::GameEvent;
use crate::game::phase::Step;
use crate::game::state::GameState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoPassMode {
    #[default]
    Never,
    /// Pass for the rest of the turn the mode was set in
    UntilEndOfTurn,
    /// Pass until the item that was on top of the stack has left it
    UntilStackResolves,
    /// Pass when there is nothing else to do
    Smart,
}

/// One player's auto-pass configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoPassSetting {
    pub mode: AutoPassMode,
    /// Turn number in which an end-of-turn pass was requested
    pub turn: u32,
    /// Stack object the player is waiting on
    pub stack_item: Option<EntityId>,
    /// Steps at which smart passing always stops
    pub stop_steps: Vec<Step>,
}

/// Result of running auto-passes forward
#[derive(Debug, Clone)]
pub struct AutoPassRun {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    pub passes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoPassManager {
    settings: BTreeMap<PlayerId, AutoPassSetting>,
}

impl AutoPassManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a player's mode, capturing the turn or stack top it refers to
    pub fn set_mode(&mut self, game: &GameState, player: PlayerId, mode: AutoPassMode) {
        let setting = self.settings.entry(player).or_default();
        setting.mode = mode;
        setting.turn = game.turn.turn_number;
        setting.stack_item = match mode {
            AutoPassMode::UntilStackResolves => game.stack.peek_top(),
            _ => None,
        };
        if mode == AutoPassMode::UntilStackResolves && setting.stack_item.is_none() {
            setting.mode = AutoPassMode::Never;
        }
    }

    pub fn mode(&self, player: PlayerId) -> AutoPassMode {
        self.settings.get(&player).map(|s| s.mode).unwrap_or_default()
    }

    pub fn add_stop(&mut self, player: PlayerId, step: Step) {
        let setting = self.settings.entry(player).or_default();
        if !setting.stop_steps.contains(&step) {
            setting.stop_steps.push(step);
        }
    }

    pub fn remove_stop(&mut self, player: PlayerId, step: Step) {
        if let Some(setting) = self.settings.get_mut(&player) {
            setting.stop_steps.retain(|s| *s != step);
        }
    }

    /// Drop turn- and stack-bound modes whose condition has passed
    pub fn refresh(&mut self, game: &GameState) {
        for setting in self.settings.values_mut() {
            if mode_expired(setting, game) {
                setting.mode = AutoPassMode::Never;
                setting.stack_item = None;
            }
        }
    }

    /// Whether `player` would pass priority right now
    pub fn should_pass(&self, engine: &RulesEngine, game: &GameState, player: PlayerId) -> bool {
        if game.game_over || game.pending_decision.is_some() || game.turn.priority_player != Some(player) {
            return false;
        }
        let Some(setting) = self.settings.get(&player) else {
            return false;
        };
        if mode_expired(setting, game) {
            return false;
        }
        match setting.mode {
            AutoPassMode::Never => false,
            AutoPassMode::UntilEndOfTurn | AutoPassMode::UntilStackResolves => true,
            AutoPassMode::Smart => {
                if setting.stop_steps.contains(&game.turn.current_step) {
                    return false;
                }
                let own_main = game.turn.active_player == player
                    && game.turn.current_step.is_main()
                    && game.stack.is_empty();
                if own_main {
                    return false;
                }
                !engine.legal_actions(game, player).iter().any(is_meaningful)
            }
        }
    }

    /// Pass for priority holders while their settings allow, up to `max_passes`
    pub fn run(&mut self, engine: &RulesEngine, state: &GameState, max_passes: usize) -> AutoPassRun {
        let mut run = AutoPassRun { state: state.clone(), events: Vec::new(), passes: 0 };
        while run.passes < max_passes {
            self.refresh(&run.state);
            let Some(player) = run.state.turn.priority_player else { break };
            if !self.should_pass(engine, &run.state, player) {
                break;
            }
            let result = engine.execute(&run.state, &Action::PassPriority { player });
            if result.error.is_some() {
                break;
            }
            run.events.extend(result.events);
            run.state = result.state;
            run.passes += 1;
        }
        run
    }
}

fn mode_expired(setting: &AutoPassSetting, game: &GameState) -> bool {
    match setting.mode {
        AutoPassMode::UntilEndOfTurn => game.turn.turn_number != setting.turn,
        AutoPassMode::UntilStackResolves => setting.stack_item.map_or(true, |id| !game.stack.contains(id)),
        AutoPassMode::Never | AutoPassMode::Smart => false,
    }
}

/// Anything besides passing, conceding or floating mana
fn is_meaningful(action: &Action) -> bool {
    !matches!(
        action,
        Action::PassPriority { .. } | Action::Concede { .. } | Action::ActivateManaAbility { .. }
    )
}
