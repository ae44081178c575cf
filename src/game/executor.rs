//! Effect tree interpreter
//!
//! A resolving effect is flattened into a work queue held by an
//! [`EffectFrame`]. Leaves run one at a time; a leaf that needs a player
//! choice records what it is waiting for, and the whole frame becomes the
//! continuation of the decision. Answering the decision finishes that leaf
//! and carries on with the rest of the queue.

use crate::core::{
    Amount, AttachedTo, CardData, ChosenTarget, Color, Condition, Counters, CounterType, Duration, Effect,
    EffectTarget, EntityId, FilterContext, Keyword, ManaCost, ManaSpec, Modification, ObjectFilter, PlayerId,
    PlayerRef, SpellOnStack, SummoningSickness, Tapped, Target,
};
use crate::game::context::{EngineContext, Flow};
use crate::game::continuation::{self, Continuation};
use crate::game::decision::{DecisionKind, DecisionResponse};
use crate::game::events::GameEvent;
use crate::game::layers::{self, Projection};
use crate::game::mana_engine::{self, ManaEngine, Payment};
use crate::game::replacement;
use crate::game::stack;
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Who and what an effect resolves for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectContext {
    pub source: EntityId,
    pub controller: PlayerId,
    /// Still-legal targets, one list per requirement
    pub targets: Vec<Vec<ChosenTarget>>,
    pub x_value: u32,
    pub trigger_subject: Option<EntityId>,
    pub chosen_number: Option<u32>,
    pub chosen_color: Option<Color>,
}

impl EffectContext {
    pub fn new(source: EntityId, controller: PlayerId) -> Self {
        EffectContext {
            source,
            controller,
            targets: Vec::new(),
            x_value: 0,
            trigger_subject: None,
            chosen_number: None,
            chosen_color: None,
        }
    }

    pub fn with_targets(mut self, targets: Vec<Vec<ChosenTarget>>) -> Self {
        self.targets = targets;
        self
    }

    fn filter_context(&self) -> FilterContext {
        FilterContext { you: self.controller, source: Some(self.source) }
    }

    fn slot(&self, slot: usize) -> impl Iterator<Item = Target> + '_ {
        self.targets.get(slot).into_iter().flatten().map(|t| t.target)
    }
}

/// The choice a paused leaf is waiting for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AwaitingChoice {
    MayDo(Effect),
    Mode(Vec<Effect>),
    Color(Effect),
    AddManaOfColor { player: PlayerId, amount: u8 },
    Number(Effect),
    Divide,
    Discard { player: PlayerId },
    Sacrifice { player: PlayerId },
    PayOrCounter { spell: EntityId, payer: PlayerId, cost: ManaCost },
    Scry { player: PlayerId },
    Search { player: PlayerId, to: Zone, tapped: bool },
    SplitPiles { cards: Vec<EntityId>, chooser: PlayerId },
    ChoosePile { piles: [Vec<EntityId>; 2], player: PlayerId },
}

/// A partially executed effect tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectFrame {
    pub ctx: EffectContext,
    pub work: VecDeque<Effect>,
    pub awaiting: Option<AwaitingChoice>,
}

enum Step {
    Done,
    Ask {
        player: PlayerId,
        kind: DecisionKind,
        prompt: String,
        awaiting: AwaitingChoice,
    },
}

impl Step {
    fn ask(player: PlayerId, kind: DecisionKind, prompt: impl Into<String>, awaiting: AwaitingChoice) -> Self {
        Step::Ask { player, kind, prompt: prompt.into(), awaiting }
    }
}

/// Execute an effect tree to completion or until it needs a decision
pub fn run_effect(game: &mut GameState, cx: &mut EngineContext, ctx: EffectContext, effect: Effect) -> Flow {
    let frame = EffectFrame {
        ctx,
        work: VecDeque::from([effect]),
        awaiting: None,
    };
    run_frame(game, cx, frame)
}

pub fn run_frame(game: &mut GameState, cx: &mut EngineContext, mut frame: EffectFrame) -> Flow {
    while let Some(effect) = frame.work.pop_front() {
        match execute(game, cx, &mut frame, effect) {
            Step::Done => {}
            Step::Ask { player, kind, prompt, awaiting } => {
                frame.awaiting = Some(awaiting);
                let source = Some(frame.ctx.source);
                return continuation::ask(game, cx, player, kind, source, prompt, Continuation::Effect(frame));
            }
        }
    }
    Flow::Continue
}

/// Finish the awaited leaf with the player's answer, then continue the queue
pub fn resume_frame(
    game: &mut GameState,
    cx: &mut EngineContext,
    mut frame: EffectFrame,
    response: DecisionResponse,
) -> Result<Flow> {
    let awaiting = frame
        .awaiting
        .take()
        .ok_or_else(|| RulesError::DecisionMismatch("effect was not waiting for a decision".into()))?;
    let source = frame.ctx.source;

    let follow_up = match (awaiting, response) {
        (AwaitingChoice::MayDo(effect), DecisionResponse::YesNo(yes)) => {
            if yes {
                frame.work.push_front(effect);
            }
            Step::Done
        }
        (AwaitingChoice::Mode(mut modes), DecisionResponse::Mode(i)) if i < modes.len() => {
            frame.work.push_front(modes.swap_remove(i));
            Step::Done
        }
        (AwaitingChoice::Color(then), DecisionResponse::Color(color)) => {
            frame.ctx.chosen_color = Some(color);
            frame.work.push_front(then);
            Step::Done
        }
        (AwaitingChoice::AddManaOfColor { player, amount }, DecisionResponse::Color(color)) => {
            add_mana(game, cx, player, &vec![color; amount as usize]);
            Step::Done
        }
        (AwaitingChoice::Number(then), DecisionResponse::Number(n)) => {
            frame.ctx.chosen_number = Some(n);
            frame.work.push_front(then);
            Step::Done
        }
        (AwaitingChoice::Divide, DecisionResponse::Distribution(split)) => {
            let assignments = split.into_iter().map(|(target, n)| (source, target, n)).collect();
            replacement::deal_damage_simultaneously(game, cx, assignments, false);
            Step::Done
        }
        (AwaitingChoice::Discard { player }, DecisionResponse::Cards(cards)) => {
            discard(game, cx, player, &cards);
            Step::Done
        }
        (AwaitingChoice::Sacrifice { player }, DecisionResponse::Cards(cards)) => {
            sacrifice(game, cx, player, &cards);
            Step::Done
        }
        (AwaitingChoice::PayOrCounter { spell, payer, cost }, DecisionResponse::ManaSources(ids)) => {
            let paid = !ids.is_empty() && {
                let mut attempt = game.clone();
                let mark = cx.event_count();
                match mana_engine::pay_mana(&mut attempt, cx, payer, &cost, &Payment::Sources(ids), None) {
                    Ok(()) => {
                        *game = attempt;
                        true
                    }
                    Err(e) => {
                        cx.events.truncate(mark);
                        cx.logger.verbose(&format!("payment for {} failed: {}", spell, e));
                        false
                    }
                }
            };
            if !paid {
                counter(game, cx, spell);
            }
            Step::Done
        }
        (AwaitingChoice::Scry { player }, DecisionResponse::Reorder { top, bottom }) => {
            if let Ok(zones) = game.zones_mut(player) {
                for card in top.iter().chain(&bottom) {
                    zones.library.remove(*card);
                }
                for card in top.iter().rev() {
                    zones.library.add(*card);
                }
                for card in &bottom {
                    zones.library.add_to_bottom(*card);
                }
            }
            Step::Done
        }
        (AwaitingChoice::Search { player, to, tapped }, DecisionResponse::Cards(cards)) => {
            for card in cards {
                if to == Zone::Battlefield {
                    replacement::enter_battlefield(game, cx, card, player);
                    if tapped {
                        if let Some(entity) = game.entity_mut(card) {
                            entity.insert(Tapped);
                        }
                    }
                } else {
                    replacement::move_object(game, cx, card, to);
                }
            }
            game.shuffle_library(player);
            cx.emit(GameEvent::Shuffled { player });
            Step::Done
        }
        (AwaitingChoice::SplitPiles { cards, chooser }, DecisionResponse::Piles(first)) => {
            let second: Vec<EntityId> = cards.iter().filter(|c| !first.contains(c)).copied().collect();
            let labels = vec![
                format!("Pile 1 ({} card(s))", first.len()),
                format!("Pile 2 ({} card(s))", second.len()),
            ];
            Step::ask(
                chooser,
                DecisionKind::ChooseOption { labels },
                "Choose a pile to put into your hand",
                AwaitingChoice::ChoosePile { piles: [first, second], player: chooser },
            )
        }
        (AwaitingChoice::ChoosePile { piles, .. }, DecisionResponse::Option(i)) if i < 2 => {
            let [first, second] = piles;
            let (kept, lost) = if i == 0 { (first, second) } else { (second, first) };
            for card in kept {
                replacement::move_object(game, cx, card, Zone::Hand);
            }
            for card in lost {
                replacement::move_object(game, cx, card, Zone::Graveyard);
            }
            Step::Done
        }
        (awaiting, response) => {
            return Err(RulesError::DecisionMismatch(format!(
                "{:?} does not answer {:?}",
                response, awaiting
            )))
        }
    };

    if let Step::Ask { player, kind, prompt, awaiting } = follow_up {
        frame.awaiting = Some(awaiting);
        return Ok(continuation::ask(game, cx, player, kind, Some(source), prompt, Continuation::Effect(frame)));
    }
    Ok(run_frame(game, cx, frame))
}

// ---- evaluation ----

fn players(game: &GameState, projection: &Projection, ctx: &EffectContext, who: PlayerRef) -> Vec<PlayerId> {
    let mut result: Vec<PlayerId> = match who {
        PlayerRef::You => vec![ctx.controller],
        PlayerRef::EachOpponent => game.opponents(ctx.controller),
        PlayerRef::EachPlayer => game.apnap_order(),
        PlayerRef::ActivePlayer => vec![game.turn.active_player],
        PlayerRef::Targets(slot) => ctx.slot(slot).filter_map(|t| t.as_player()).collect(),
        PlayerRef::ControllerOfTargets(slot) => ctx
            .slot(slot)
            .filter_map(|t| t.as_object())
            .filter_map(|id| projection.controller(id).or_else(|| game.controller_of(id)))
            .collect(),
        PlayerRef::Player(player) => vec![player],
    };
    let mut seen = Vec::new();
    result.retain(|p| {
        let fresh = !seen.contains(p);
        seen.push(*p);
        fresh && game.is_in_game(*p)
    });
    result
}

fn objects(game: &GameState, projection: &Projection, ctx: &EffectContext, what: &EffectTarget) -> Vec<EntityId> {
    match what {
        EffectTarget::Targets(slot) => ctx.slot(*slot).filter_map(|t| t.as_object()).collect(),
        EffectTarget::ThisObject => game.entity(ctx.source).map(|_| vec![ctx.source]).unwrap_or_default(),
        EffectTarget::AttachedObject => game
            .entity(ctx.source)
            .and_then(|e| e.get::<AttachedTo>())
            .map(|a| vec![a.0])
            .unwrap_or_default(),
        EffectTarget::TriggerSubject => ctx.trigger_subject.into_iter().collect(),
        EffectTarget::AllMatching(filter) => projection.matching(game, filter, &ctx.filter_context()),
        EffectTarget::Player(_) => Vec::new(),
    }
}

/// Damage recipients: objects and players
fn recipients(game: &GameState, projection: &Projection, ctx: &EffectContext, to: &EffectTarget) -> Vec<Target> {
    match to {
        EffectTarget::Targets(slot) => ctx.slot(*slot).collect(),
        EffectTarget::Player(who) => players(game, projection, ctx, *who).into_iter().map(Target::Player).collect(),
        other => objects(game, projection, ctx, other).into_iter().map(Target::Object).collect(),
    }
}

fn amount(game: &GameState, projection: &Projection, ctx: &EffectContext, amount: &Amount) -> u32 {
    let value = match amount {
        Amount::Fixed(n) => *n,
        Amount::X => ctx.x_value as i32,
        Amount::ChosenNumber => ctx.chosen_number.unwrap_or(0) as i32,
        Amount::CountMatching(filter) => projection.matching(game, filter, &ctx.filter_context()).len() as i32,
        Amount::SourcePower => projection
            .power(ctx.source)
            .or_else(|| game.raw_characteristics(ctx.source).and_then(|c| c.power))
            .unwrap_or(0),
        Amount::CardsInHand(who) => players(game, projection, ctx, *who)
            .into_iter()
            .map(|p| game.hand(p).len() as i32)
            .sum(),
    };
    value.max(0) as u32
}

fn condition_holds(game: &GameState, projection: &Projection, ctx: &EffectContext, condition: &Condition) -> bool {
    match condition {
        Condition::YouControl(filter) => projection
            .matching(game, filter, &ctx.filter_context())
            .iter()
            .any(|id| projection.controller(*id) == Some(ctx.controller)),
        Condition::OpponentControls(filter) => projection
            .matching(game, filter, &ctx.filter_context())
            .iter()
            .any(|id| projection.controller(*id).is_some_and(|c| c != ctx.controller)),
        Condition::LifeAtMost(n) => game.player(ctx.controller).is_ok_and(|p| p.life <= *n),
        Condition::TargetStillLegal(slot) => ctx.slot(*slot).next().is_some(),
    }
}

// ---- leaves ----

fn execute(game: &mut GameState, cx: &mut EngineContext, frame: &mut EffectFrame, effect: Effect) -> Step {
    let projection = Projection::compute(game, cx.registry);
    let ctx = &frame.ctx;

    match effect {
        Effect::Sequence(effects) => {
            for effect in effects.into_iter().rev() {
                frame.work.push_front(effect);
            }
        }
        Effect::DealDamage { amount: n, to } => {
            let n = amount(game, &projection, ctx, &n);
            let assignments = recipients(game, &projection, ctx, &to)
                .into_iter()
                .map(|target| (ctx.source, target, n))
                .collect();
            replacement::deal_damage_simultaneously(game, cx, assignments, false);
        }
        Effect::DivideDamage { amount: n, slot } => {
            let total = amount(game, &projection, ctx, &n);
            let targets: Vec<Target> = ctx.slot(slot).collect();
            match targets.as_slice() {
                [] => {}
                [only] => {
                    replacement::deal_damage(game, cx, ctx.source, *only, total, false);
                }
                _ if total < targets.len() as u32 => {
                    // Not enough damage to give each target one; split what there is in order
                    let assignments = targets.iter().take(total as usize).map(|t| (ctx.source, *t, 1)).collect();
                    replacement::deal_damage_simultaneously(game, cx, assignments, false);
                }
                _ => {
                    return Step::ask(
                        ctx.controller,
                        DecisionKind::Distribute { total, recipients: targets, min_each: 1 },
                        format!("Divide {} damage", total),
                        AwaitingChoice::Divide,
                    )
                }
            }
        }
        Effect::GainLife { amount: n, player } => {
            let n = amount(game, &projection, ctx, &n);
            for p in players(game, &projection, ctx, player) {
                replacement::gain_life(game, cx, p, n);
            }
        }
        Effect::LoseLife { amount: n, player } => {
            let n = amount(game, &projection, ctx, &n);
            for p in players(game, &projection, ctx, player) {
                if n > 0 {
                    if let Ok(target) = game.player_mut(p) {
                        target.lose_life(n as i32);
                        cx.emit(GameEvent::LifeLost { player: p, amount: n });
                    }
                }
            }
        }
        Effect::DrawCards { count, player } => {
            let n = amount(game, &projection, ctx, &count);
            for p in players(game, &projection, ctx, player) {
                replacement::draw_cards(game, cx, p, n);
            }
        }
        Effect::Discard { count, player } => {
            let who = players(game, &projection, ctx, player);
            if who.len() > 1 {
                split_per_player(frame, who, |p| Effect::Discard { count: count.clone(), player: PlayerRef::Player(p) });
                return Step::Done;
            }
            let Some(&p) = who.first() else { return Step::Done };
            let hand = game.hand(p);
            let n = (amount(game, &projection, ctx, &count) as usize).min(hand.len());
            if n == hand.len() {
                discard(game, cx, p, &hand);
            } else if n > 0 {
                return Step::ask(
                    p,
                    DecisionKind::SelectCards { candidates: hand, min: n, max: n },
                    format!("Discard {} card(s)", n),
                    AwaitingChoice::Discard { player: p },
                );
            }
        }
        Effect::Mill { count, player } => {
            let n = amount(game, &projection, ctx, &count) as usize;
            for p in players(game, &projection, ctx, player) {
                let top = game.zones(p).map(|z| z.library.top_n(n)).unwrap_or_default();
                for card in top {
                    replacement::move_object(game, cx, card, Zone::Graveyard);
                }
            }
        }
        Effect::Destroy { what } => {
            for id in objects(game, &projection, ctx, &what) {
                if game.is_on_battlefield(id) && !projection.has_keyword(id, &Keyword::Indestructible) {
                    replacement::move_object(game, cx, id, Zone::Graveyard);
                }
            }
        }
        Effect::Exile { what } => {
            for id in objects(game, &projection, ctx, &what) {
                replacement::move_object(game, cx, id, Zone::Exile);
            }
        }
        Effect::ReturnToHand { what } => {
            for id in objects(game, &projection, ctx, &what) {
                replacement::move_object(game, cx, id, Zone::Hand);
            }
        }
        Effect::Sacrifice { player, filter, count } => {
            let who = players(game, &projection, ctx, player);
            if who.len() > 1 {
                split_per_player(frame, who, |p| Effect::Sacrifice {
                    player: PlayerRef::Player(p),
                    filter: filter.clone(),
                    count: count.clone(),
                });
                return Step::Done;
            }
            let Some(&p) = who.first() else { return Step::Done };
            let candidates = sacrifice_candidates(game, &projection, p, ctx.source, &filter);
            let n = (amount(game, &projection, ctx, &count) as usize).min(candidates.len());
            if n == candidates.len() {
                sacrifice(game, cx, p, &candidates);
            } else if n > 0 {
                return Step::ask(
                    p,
                    DecisionKind::SelectCards { candidates, min: n, max: n },
                    format!("Sacrifice {} permanent(s)", n),
                    AwaitingChoice::Sacrifice { player: p },
                );
            }
        }
        Effect::Tap { what } => {
            for id in objects(game, &projection, ctx, &what) {
                if let Some(entity) = game.entity_mut(id).filter(|e| !e.is_tapped()) {
                    entity.insert(Tapped);
                    cx.emit(GameEvent::Tapped { entity: id });
                }
            }
        }
        Effect::Untap { what } => {
            for id in objects(game, &projection, ctx, &what) {
                if let Some(entity) = game.entity_mut(id) {
                    if entity.remove::<Tapped>().is_some() {
                        cx.emit(GameEvent::Untapped { entity: id });
                    }
                }
            }
        }
        Effect::AddCounters { what, counter, count } => {
            let n = amount(game, &projection, ctx, &count);
            for id in objects(game, &projection, ctx, &what) {
                replacement::put_counters(game, cx, id, counter.clone(), n);
            }
        }
        Effect::RemoveCounters { what, counter, count } => {
            let n = amount(game, &projection, ctx, &count);
            for id in objects(game, &projection, ctx, &what) {
                remove_counters(game, cx, id, &counter, n);
            }
        }
        Effect::AddPoison { player, count } => {
            let n = amount(game, &projection, ctx, &count);
            for p in players(game, &projection, ctx, player) {
                if n > 0 {
                    if let Ok(target) = game.player_mut(p) {
                        target.poison += n;
                        cx.emit(GameEvent::PoisonAdded { player: p, amount: n });
                    }
                }
            }
        }
        Effect::Pump { what, power, toughness } => {
            let affected = creatures_only(&projection, objects(game, &projection, ctx, &what));
            layers::add_floating(
                game,
                ctx.source,
                ctx.controller,
                affected,
                Modification::ModifyPowerToughness(power, toughness),
                Duration::UntilEndOfTurn,
            );
        }
        Effect::GrantKeyword { what, keyword, duration } => {
            let affected = objects(game, &projection, ctx, &what)
                .into_iter()
                .filter(|id| game.is_on_battlefield(*id))
                .collect();
            layers::add_floating(
                game,
                ctx.source,
                ctx.controller,
                affected,
                Modification::AddKeywords(vec![keyword]),
                duration,
            );
        }
        Effect::GainControl { what, duration } => {
            let controller = ctx.controller;
            let source = ctx.source;
            let affected: Vec<EntityId> = objects(game, &projection, ctx, &what)
                .into_iter()
                .filter(|id| game.is_on_battlefield(*id) && projection.controller(*id) != Some(controller))
                .collect();
            layers::add_floating(
                game,
                source,
                controller,
                affected.clone(),
                Modification::SetController(controller),
                duration,
            );
            for id in affected {
                if let Some(entity) = game.entity_mut(id) {
                    entity.insert(SummoningSickness);
                }
                cx.emit(GameEvent::ControlChanged { entity: id, controller });
            }
        }
        Effect::CreateTokens { token, count, controller } => {
            let n = amount(game, &projection, ctx, &count);
            for p in players(game, &projection, ctx, controller) {
                for _ in 0..n {
                    create_token(game, cx, p, token.clone());
                }
            }
        }
        Effect::CounterSpell { what } => {
            for id in objects(game, &projection, ctx, &what) {
                counter(game, cx, id);
            }
        }
        Effect::CounterUnlessPays { what, cost } => {
            let Some(spell) = objects(game, &projection, ctx, &what).into_iter().find(|id| game.stack.contains(*id))
            else {
                return Step::Done;
            };
            let payer = game
                .entity(spell)
                .and_then(|e| e.get::<SpellOnStack>())
                .map(|s| s.caster)
                .or_else(|| game.controller_of(spell))
                .unwrap_or(ctx.controller);
            let mut engine = ManaEngine::new(payer);
            engine.update(game, &projection, cx, None);
            if !engine.can_pay(&cost) {
                counter(game, cx, spell);
                return Step::Done;
            }
            let sources = engine.sources().iter().map(|s| s.id).collect();
            return Step::ask(
                payer,
                DecisionKind::SelectManaSources { sources, cost },
                format!("Pay {} or {} is countered", cost, game.card_name(spell)),
                AwaitingChoice::PayOrCounter { spell, payer, cost },
            );
        }
        Effect::AddMana { mana, player } => {
            let who = players(game, &projection, ctx, player);
            match mana {
                ManaSpec::Fixed(colors) => {
                    for p in who {
                        add_mana(game, cx, p, &colors);
                    }
                }
                ManaSpec::ChosenColor(n) => {
                    if let Some(color) = ctx.chosen_color {
                        for p in who {
                            add_mana(game, cx, p, &vec![color; n as usize]);
                        }
                    }
                }
                ManaSpec::AnyColor(n) => {
                    if let Some(&p) = who.first() {
                        return Step::ask(
                            p,
                            DecisionKind::ChooseColor { options: Color::WUBRG.to_vec() },
                            format!("Choose a color for {} mana", n),
                            AwaitingChoice::AddManaOfColor { player: p, amount: n },
                        );
                    }
                }
            }
        }
        Effect::Scry { count } => {
            let n = amount(game, &projection, ctx, &count) as usize;
            let player = ctx.controller;
            let cards = game.zones(player).map(|z| z.library.top_n(n)).unwrap_or_default();
            if !cards.is_empty() {
                return Step::ask(
                    player,
                    DecisionKind::ReorderLibrary { cards },
                    format!("Scry {}", n),
                    AwaitingChoice::Scry { player },
                );
            }
        }
        Effect::SearchLibrary { filter, max, to, tapped } => {
            let player = ctx.controller;
            let fctx = ctx.filter_context();
            let candidates: Vec<EntityId> = game
                .zones(player)
                .map(|z| z.library.cards.clone())
                .unwrap_or_default()
                .into_iter()
                .filter(|id| game.raw_characteristics(*id).is_some_and(|c| filter.matches(&c, *id, &fctx)))
                .collect();
            if candidates.is_empty() {
                game.shuffle_library(player);
                cx.emit(GameEvent::Shuffled { player });
            } else {
                return Step::ask(
                    player,
                    DecisionKind::SearchLibrary { candidates, max },
                    format!("Search your library for up to {} card(s)", max),
                    AwaitingChoice::Search { player, to, tapped },
                );
            }
        }
        Effect::RevealAndSplit { count } => {
            let n = amount(game, &projection, ctx, &count) as usize;
            let chooser = ctx.controller;
            let cards = game.zones(chooser).map(|z| z.library.top_n(n)).unwrap_or_default();
            if !cards.is_empty() {
                let splitter = game.opponents(chooser).first().copied().unwrap_or(chooser);
                return Step::ask(
                    splitter,
                    DecisionKind::SplitPiles { cards: cards.clone() },
                    "Separate the revealed cards into two piles",
                    AwaitingChoice::SplitPiles { cards, chooser },
                );
            }
        }
        Effect::MayDo { prompt, effect } => {
            return Step::ask(ctx.controller, DecisionKind::YesNo, prompt, AwaitingChoice::MayDo(*effect));
        }
        Effect::ChooseMode { labels, modes } => {
            return Step::ask(
                ctx.controller,
                DecisionKind::ChooseMode { labels },
                "Choose a mode",
                AwaitingChoice::Mode(modes),
            );
        }
        Effect::ChooseColor { then } => {
            return Step::ask(
                ctx.controller,
                DecisionKind::ChooseColor { options: Color::WUBRG.to_vec() },
                "Choose a color",
                AwaitingChoice::Color(*then),
            );
        }
        Effect::ChooseNumber { min, max, then } => {
            return Step::ask(
                ctx.controller,
                DecisionKind::ChooseNumber { min, max },
                format!("Choose a number from {} to {}", min, max),
                AwaitingChoice::Number(*then),
            );
        }
        Effect::Conditional { condition, then, otherwise } => {
            if condition_holds(game, &projection, ctx, &condition) {
                frame.work.push_front(*then);
            } else if let Some(otherwise) = otherwise {
                frame.work.push_front(*otherwise);
            }
        }
        Effect::PreventNextDamage { to, amount } => {
            for target in recipients(game, &projection, ctx, &to) {
                replacement::add_damage_shield(game, ctx.source, target, amount);
            }
        }
        Effect::Attach { what, to } => {
            let attachment = objects(game, &projection, ctx, &what).into_iter().next();
            let host = objects(game, &projection, ctx, &to).into_iter().next();
            if let (Some(attachment), Some(host)) = (attachment, host) {
                if game.is_on_battlefield(attachment) && game.is_on_battlefield(host) && attachment != host {
                    if let Some(entity) = game.entity_mut(attachment) {
                        entity.insert(AttachedTo(host));
                    }
                    cx.emit(GameEvent::Attached { entity: attachment, to: host });
                }
            }
        }
    }
    Step::Done
}

/// Queue one copy of a per-player effect for each player, in order
fn split_per_player(frame: &mut EffectFrame, players: Vec<PlayerId>, make: impl Fn(PlayerId) -> Effect) {
    for p in players.into_iter().rev() {
        frame.work.push_front(make(p));
    }
}

fn creatures_only(projection: &Projection, ids: Vec<EntityId>) -> Vec<EntityId> {
    ids.into_iter().filter(|id| projection.is_creature(*id)).collect()
}

fn sacrifice_candidates(
    game: &GameState,
    projection: &Projection,
    player: PlayerId,
    source: EntityId,
    filter: &ObjectFilter,
) -> Vec<EntityId> {
    let ctx = FilterContext { you: player, source: Some(source) };
    projection
        .matching(game, filter, &ctx)
        .into_iter()
        .filter(|id| projection.controller(*id) == Some(player))
        .collect()
}

pub(crate) fn discard(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, cards: &[EntityId]) {
    for &card in cards {
        if game.zone_of(card) == Some(Zone::Hand) {
            replacement::move_object(game, cx, card, Zone::Graveyard);
            cx.emit(GameEvent::Discarded { player, card });
        }
    }
}

fn sacrifice(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, permanents: &[EntityId]) {
    for &id in permanents {
        if game.is_on_battlefield(id) {
            cx.logger.verbose(&format!("{} sacrifices {}", player, game.card_name(id)));
            replacement::move_object(game, cx, id, Zone::Graveyard);
        }
    }
}

fn remove_counters(game: &mut GameState, cx: &mut EngineContext, id: EntityId, counter: &CounterType, n: u32) {
    let Some(counters) = game.entity_mut(id).and_then(|e| e.get_mut::<Counters>()) else {
        return;
    };
    let removed = counters.remove(counter, n);
    if removed > 0 {
        cx.emit(GameEvent::CountersRemoved { entity: id, counter: counter.clone(), amount: removed });
    }
}

/// Counter a spell; one that already left the stack is left alone
fn counter(game: &mut GameState, cx: &mut EngineContext, spell: EntityId) {
    if let Err(e) = stack::counter_spell(game, cx, spell) {
        cx.logger.verbose(&format!("counter ignored: {}", e));
    }
}

fn add_mana(game: &mut GameState, cx: &mut EngineContext, player: PlayerId, colors: &[Color]) {
    if colors.is_empty() {
        return;
    }
    if let Ok(p) = game.player_mut(player) {
        for color in colors {
            p.mana_pool.add_color(*color);
        }
        cx.emit(GameEvent::ManaAdded { player, amount: colors.len() as u32 });
    }
}

pub fn create_token(game: &mut GameState, cx: &mut EngineContext, controller: PlayerId, token: CardData) -> EntityId {
    let id = game.create_token(controller, token);
    cx.emit(GameEvent::ZoneChanged { entity: id, from: None, to: Zone::Battlefield });
    cx.emit(GameEvent::EnteredBattlefield { entity: id, controller });
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::core::{CardData, CardScript, InMemoryRegistry, ManaAbility, ManaProductionKind};
    use crate::game::logger::GameLogger;

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", GameConfig::default());
        let p1 = game.players[0].id;
        let p2 = game.players[1].id;
        (game, p1, p2)
    }

    fn source(game: &mut GameState, owner: PlayerId) -> EntityId {
        game.create_card(owner, CardData::sorcery("Test Spell", "R"), Zone::Graveyard)
    }

    fn answer(game: &mut GameState, cx: &mut EngineContext, response: DecisionResponse) -> Flow {
        let decision = game.pending_decision.take().expect("a pending decision");
        decision.validate(&response).expect("valid response");
        let frame = game.continuations.pop().expect("a continuation");
        continuation::resume(game, cx, frame, response).expect("resumes")
    }

    #[test]
    fn test_sequence_runs_in_order() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let src = source(&mut game, p1);
        let effect = Effect::LoseLife { amount: Amount::Fixed(2), player: PlayerRef::EachOpponent }
            .then(Effect::GainLife { amount: Amount::Fixed(1), player: PlayerRef::You });
        let flow = run_effect(&mut game, &mut cx, EffectContext::new(src, p1), effect);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(game.player(p2).unwrap().life, 18);
        assert_eq!(game.player(p1).unwrap().life, 21);
    }

    #[test]
    fn test_may_do_pauses_and_resumes() {
        let (mut game, p1, _) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let src = source(&mut game, p1);
        for _ in 0..3 {
            game.create_card(p1, CardData::basic_land("Island"), Zone::Library);
        }
        let effect = Effect::MayDo { prompt: "Draw two?".into(), effect: Box::new(Effect::draw(2)) }
            .then(Effect::GainLife { amount: Amount::Fixed(3), player: PlayerRef::You });

        let flow = run_effect(&mut game, &mut cx, EffectContext::new(src, p1), effect);
        assert!(flow.is_paused());
        assert_eq!(game.player(p1).unwrap().life, 20);

        let flow = answer(&mut game, &mut cx, DecisionResponse::YesNo(true));
        assert_eq!(flow, Flow::Continue);
        assert_eq!(game.hand(p1).len(), 2);
        assert_eq!(game.player(p1).unwrap().life, 23);
        assert!(game.continuations.is_empty());
    }

    #[test]
    fn test_divide_damage_asks_for_distribution() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let src = source(&mut game, p1);
        let bears = game.create_card(p2, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let targets = vec![vec![
            ChosenTarget { target: Target::Object(bears), zone_stamp: None },
            ChosenTarget { target: Target::Player(p2), zone_stamp: None },
        ]];
        let ctx = EffectContext::new(src, p1).with_targets(targets);
        let effect = Effect::DivideDamage { amount: Amount::Fixed(5), slot: 0 };
        assert!(run_effect(&mut game, &mut cx, ctx, effect).is_paused());

        let split = vec![(Target::Object(bears), 2), (Target::Player(p2), 3)];
        let _ = answer(&mut game, &mut cx, DecisionResponse::Distribution(split));
        assert_eq!(game.player(p2).unwrap().life, 17);
        assert_eq!(game.entity(bears).unwrap().damage(), 2);
    }

    #[test]
    fn test_reveal_and_split() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let src = source(&mut game, p1);
        let cards: Vec<EntityId> = (0..3)
            .map(|_| game.create_card(p1, CardData::basic_land("Island"), Zone::Library))
            .collect();
        let effect = Effect::RevealAndSplit { count: Amount::Fixed(3) };
        assert!(run_effect(&mut game, &mut cx, EffectContext::new(src, p1), effect).is_paused());
        assert_eq!(game.pending_decision.as_ref().unwrap().player, p2);

        let flow = answer(&mut game, &mut cx, DecisionResponse::Piles(vec![cards[0]]));
        assert!(flow.is_paused());
        assert_eq!(game.pending_decision.as_ref().unwrap().player, p1);

        let _ = answer(&mut game, &mut cx, DecisionResponse::Option(1));
        assert_eq!(game.hand(p1).len(), 2);
        assert_eq!(game.zone_of(cards[0]), Some(Zone::Graveyard));
    }

    #[test]
    fn test_unpaid_counter_after_spell_left_the_stack() {
        let (mut game, p1, p2) = setup();
        let mut registry = InMemoryRegistry::new();
        registry.register(
            CardScript::with_card(CardData::basic_land("Island"))
                .with_mana_ability(ManaAbility::new(ManaProductionKind::Fixed(Color::Blue))),
        );
        let logger = GameLogger::capturing();
        let mut cx = EngineContext::new(&registry, &logger);
        let src = source(&mut game, p1);
        game.create_card(p2, CardData::basic_land("Island"), Zone::Battlefield);
        let bolt = game.create_card(p2, CardData::instant("Lightning Bolt", "R"), Zone::Hand);
        stack::push_spell(&mut game, &mut cx, bolt, p2, Vec::new(), 0).unwrap();

        let targets = vec![vec![ChosenTarget { target: Target::Object(bolt), zone_stamp: None }]];
        let ctx = EffectContext::new(src, p1).with_targets(targets);
        let effect = Effect::CounterUnlessPays { what: EffectTarget::Targets(0), cost: ManaCost::from_string("1") };
        assert!(run_effect(&mut game, &mut cx, ctx, effect).is_paused());
        assert_eq!(game.pending_decision.as_ref().unwrap().player, p2);

        // Another effect counters it while the payment is still being chosen
        stack::counter_spell(&mut game, &mut cx, bolt).unwrap();
        let countered = cx.event_count();

        let flow = answer(&mut game, &mut cx, DecisionResponse::ManaSources(Vec::new()));
        assert_eq!(flow, Flow::Continue);
        assert_eq!(game.zone_of(bolt), Some(Zone::Graveyard));
        assert_eq!(cx.event_count(), countered);
        assert!(logger.get_logs().iter().any(|entry| entry.message.starts_with("counter ignored")));
    }

    #[test]
    fn test_destroy_skips_indestructible() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let src = source(&mut game, p1);
        let bears = game.create_card(p2, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let golem = game.create_card(
            p2,
            CardData::creature("Darksteel Myr", "3", 0, 1).with_keyword(Keyword::Indestructible),
            Zone::Battlefield,
        );
        let effect = Effect::Destroy { what: EffectTarget::AllMatching(ObjectFilter::creature()) };
        let _ = run_effect(&mut game, &mut cx, EffectContext::new(src, p1), effect);
        assert_eq!(game.zone_of(bears), Some(Zone::Graveyard));
        assert_eq!(game.zone_of(golem), Some(Zone::Battlefield));
    }

    #[test]
    fn test_sacrifice_all_when_no_choice() {
        let (mut game, p1, p2) = setup();
        let registry = InMemoryRegistry::new();
        let logger = GameLogger::new();
        let mut cx = EngineContext::new(&registry, &logger);
        let src = source(&mut game, p1);
        let bears = game.create_card(p2, CardData::creature("Grizzly Bears", "1G", 2, 2), Zone::Battlefield);
        let effect = Effect::Sacrifice {
            player: PlayerRef::EachOpponent,
            filter: ObjectFilter::creature(),
            count: Amount::Fixed(1),
        };
        let flow = run_effect(&mut game, &mut cx, EffectContext::new(src, p1), effect);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(game.zone_of(bears), Some(Zone::Graveyard));
    }
}
