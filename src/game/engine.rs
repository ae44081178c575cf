//! The rules engine entry point
//!
//! [`RulesEngine::execute`] is a pure function of a state and an action: it
//! works on a copy, applies the action, then settles the game (state-based
//! actions, trigger detection, putting triggers on the stack, running
//! deferred continuations) and finally hands out priority. A rejected action
//! returns the input state untouched together with the reason.

use crate::core::{CardRegistry, PlayerId};
use crate::game::actions::{self, Action};
use crate::game::context::EngineContext;
use crate::game::continuation;
use crate::game::decision::PendingDecision;
use crate::game::events::GameEvent;
use crate::game::hand_setup;
use crate::game::legality;
use crate::game::logger::GameLogger;
use crate::game::sba;
use crate::game::state::GameState;
use crate::game::triggers;
use crate::game::turn;
use crate::Result;

/// Upper bound on settle rounds after one action
const MAX_SETTLE_ROUNDS: usize = 64;

/// Outcome of executing one action
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    /// Why the action was rejected; the state is then the unchanged input
    pub error: Option<String>,
    /// The decision the game is waiting for, if any
    pub pending_decision: Option<PendingDecision>,
}

impl ExecutionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.error.is_none() && self.pending_decision.is_some()
    }

    fn rejected(state: &GameState, reason: String) -> Self {
        ExecutionResult {
            state: state.clone(),
            events: Vec::new(),
            error: Some(reason),
            pending_decision: state.pending_decision.clone(),
        }
    }
}

/// Card registry plus logger; holds no game state of its own
pub struct RulesEngine<'r> {
    registry: &'r dyn CardRegistry,
    logger: GameLogger,
}

impl<'r> RulesEngine<'r> {
    pub fn new(registry: &'r dyn CardRegistry) -> Self {
        Self::with_logger(registry, GameLogger::new())
    }

    pub fn with_logger(registry: &'r dyn CardRegistry, logger: GameLogger) -> Self {
        RulesEngine { registry, logger }
    }

    pub fn registry(&self) -> &'r dyn CardRegistry {
        self.registry
    }

    pub fn logger(&self) -> &GameLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut GameLogger {
        &mut self.logger
    }

    /// Shuffle, deal opening hands and start the pregame (or turn 1)
    pub fn start_game(&self, state: &GameState) -> ExecutionResult {
        self.run(state, |game, cx| hand_setup::start_game(game, cx).map(|_| ()))
    }

    /// Apply one action and settle the game
    pub fn execute(&self, state: &GameState, action: &Action) -> ExecutionResult {
        #[cfg(feature = "verbose-logging")]
        self.logger.categorized(crate::game::logger::VerbosityLevel::Verbose, "action", &format!("{:?}", action));
        let result = self.run(state, |game, cx| actions::apply(game, cx, action).map(|_| ()));
        if let Some(reason) = &result.error {
            self.logger.normal(&format!("{} rejected: {}", action.name(), reason));
        }
        result
    }

    /// Apply actions in order, stopping at the first rejection
    pub fn execute_all(&self, state: &GameState, actions: &[Action]) -> (GameState, Vec<ExecutionResult>) {
        let mut current = state.clone();
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let result = self.execute(&current, action);
            let failed = result.error.is_some();
            current = result.state.clone();
            results.push(result);
            if failed {
                break;
            }
        }
        (current, results)
    }

    pub fn legal_actions(&self, state: &GameState, player: PlayerId) -> Vec<Action> {
        let cx = EngineContext::new(self.registry, &self.logger);
        legality::legal_actions(state, &cx, player)
    }

    fn run<F>(&self, state: &GameState, body: F) -> ExecutionResult
    where
        F: FnOnce(&mut GameState, &mut EngineContext) -> Result<()>,
    {
        let mut game = state.clone();
        let mut cx = EngineContext::new(self.registry, &self.logger);
        match body(&mut game, &mut cx).and_then(|_| settle(&mut game, &mut cx)) {
            Ok(()) => {
                let pending_decision = game.pending_decision.clone();
                ExecutionResult { state: game, events: cx.events, error: None, pending_decision }
            }
            Err(e) => ExecutionResult::rejected(state, e.to_string()),
        }
    }
}

/// State-based actions and trigger detection until neither finds anything
fn check_state(game: &mut GameState, cx: &mut EngineContext) {
    for _ in 0..sba::MAX_PASSES {
        triggers::detect(game, cx);
        if !sba::check_once(game, cx) {
            break;
        }
    }
    triggers::detect(game, cx);
}

/// Post-processing shared by every action
///
/// Repeats until a round emits no events: SBA and trigger detection, the
/// next turn when the active player has left the game, pending triggers
/// onto the stack, then deferred continuations. Ends by assigning priority.
pub fn settle(game: &mut GameState, cx: &mut EngineContext) -> Result<()> {
    for _ in 0..MAX_SETTLE_ROUNDS {
        let before = cx.event_count();
        check_state(game, cx);
        if game.game_over {
            break;
        }
        if game.pending_decision.is_none() {
            if !game.turn.pregame && !game.is_in_game(game.turn.active_player) {
                game.turn.priority_player = None;
                if turn::start_next_turn(game, cx)?.is_paused() {
                    continue;
                }
            }
            if !triggers::put_pending(game, cx).is_paused() && continuation::drain(game, cx)?.is_paused() {
                continue;
            }
        }
        if cx.event_count() == before {
            break;
        }
    }
    turn::assign_priority(game);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::core::{
        Amount, CardData, CardScript, Color, Effect, EffectTarget, InMemoryRegistry, ManaAbility, ManaProductionKind,
        Target, TargetKind, TargetRequirement,
    };
    use crate::game::mana_engine::Payment;
    use crate::game::phase::Step;
    use crate::zones::Zone;

    fn registry() -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        registry.register(
            CardScript::with_card(CardData::basic_land("Mountain"))
                .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Red))),
        );
        registry.register(CardScript::with_card(CardData::instant("Lightning Bolt", "R")).spell(
            Effect::DealDamage { amount: Amount::Fixed(3), to: EffectTarget::Targets(0) },
            vec![TargetRequirement::single(TargetKind::AnyTarget)],
        ));
        registry
    }

    fn main_phase_game() -> (GameState, PlayerId, PlayerId) {
        let mut game = GameState::new_two_player("Alice", "Bob", GameConfig::default().without_mulligans());
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        for _ in 0..10 {
            game.create_card(p1, CardData::basic_land("Mountain"), Zone::Library);
            game.create_card(p2, CardData::basic_land("Mountain"), Zone::Library);
        }
        game.turn.current_step = Step::Main1;
        game.turn.give_priority(p1);
        (game, p1, p2)
    }

    #[test]
    fn test_rejected_action_returns_input_state() {
        let (game, p1, _) = main_phase_game();
        let registry = registry();
        let engine = RulesEngine::new(&registry);
        let result = engine.execute(&game, &Action::PlayLand { player: p1, card: crate::core::EntityId::new(999) });
        assert!(result.error.is_some());
        assert_eq!(result.state, game);
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_bolt_resolves_after_both_pass() {
        let (mut game, p1, p2) = main_phase_game();
        let registry = registry();
        let engine = RulesEngine::new(&registry);
        game.create_card(p1, CardData::basic_land("Mountain"), Zone::Battlefield);
        let bolt = game.create_card(p1, CardData::instant("Lightning Bolt", "R"), Zone::Hand);

        let cast = Action::CastSpell {
            player: p1,
            card: bolt,
            targets: vec![vec![Target::Player(p2)]],
            x_value: 0,
            payment: Payment::Auto,
        };
        let result = engine.execute(&game, &cast);
        assert!(result.is_ok(), "{:?}", result.error);
        let game = result.state;
        assert_eq!(game.turn.priority_player, Some(p1));

        let game = engine.execute(&game, &Action::PassPriority { player: p1 }).state;
        assert_eq!(game.turn.priority_player, Some(p2));
        let result = engine.execute(&game, &Action::PassPriority { player: p2 });
        let game = result.state;
        assert_eq!(game.player(p2).unwrap().life, 17);
        assert_eq!(game.zone_of(bolt), Some(Zone::Graveyard));
        assert_eq!(game.turn.current_step, Step::Main1);
        assert_eq!(game.turn.priority_player, Some(p1));
    }

    #[test]
    fn test_start_game_gives_priority_in_upkeep() {
        let (mut game, p1, _) = main_phase_game();
        game.turn.current_step = Step::Untap;
        game.turn.priority_player = None;
        let registry = registry();
        let engine = RulesEngine::new(&registry);
        let result = engine.start_game(&game);
        assert!(result.is_ok());
        assert_eq!(result.state.turn.current_step, Step::Upkeep);
        assert_eq!(result.state.turn.priority_player, Some(p1));
        assert!(result.events.iter().any(|e| matches!(e, GameEvent::GameStarted { .. })));
    }

    #[test]
    fn test_concede_declares_winner() {
        let (game, p1, p2) = main_phase_game();
        let registry = registry();
        let engine = RulesEngine::new(&registry);
        let result = engine.execute(&game, &Action::Concede { player: p1 });
        assert!(result.state.game_over);
        assert_eq!(result.state.winner, Some(p2));
        let again = engine.execute(&result.state, &Action::PassPriority { player: p2 });
        assert!(again.error.is_some());
    }
}
