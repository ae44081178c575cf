//! Main game state structure
//!
//! `GameState` is a plain value: the engine clones it, works on the copy and
//! hands the copy back. Everything needed to resume a paused game, including
//! the RNG, the pending decision and the continuation stack, lives here.

use crate::config::GameConfig;
use crate::core::{
    AbilityOnStack, CardData, CardType, Characteristics, ComponentKind, Controller, Entity, EntityId, EntityStore,
    Owner, Player, PlayerId, SpellOnStack, SummoningSickness, Tapped, Timestamp, Token, ZoneStamp,
};
use crate::game::combat::CombatState;
use crate::game::continuation::Continuation;
use crate::game::decision::{DecisionKind, PendingDecision};
use crate::game::layers::{AffectedObjects, Modifier};
use crate::game::phase::TurnStructure;
use crate::game::replacement::DamageShield;
use crate::game::triggers::PendingTrigger;
use crate::zones::{CardZone, PlayerZones, Zone};
use crate::{Result, RulesError};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub config: GameConfig,
    pub entities: EntityStore<Entity>,

    /// Players in turn order
    pub players: Vec<Player>,
    /// Private zones, parallel to `players`
    pub player_zones: Vec<PlayerZones>,

    pub battlefield: CardZone,
    /// Top of the stack is the end of the vector
    pub stack: CardZone,

    pub turn: TurnStructure,
    pub combat: CombatState,

    /// Floating continuous effects created by resolved spells and abilities
    pub modifiers: Vec<Modifier>,
    pub damage_shields: Vec<DamageShield>,

    /// Triggered abilities waiting to be put on the stack
    pub pending_triggers: Vec<PendingTrigger>,

    pub pending_decision: Option<PendingDecision>,
    /// Resumption frames; the top frame belongs to the pending decision
    pub continuations: Vec<Continuation>,

    pub game_over: bool,
    pub winner: Option<PlayerId>,

    pub rng: ChaCha12Rng,

    next_timestamp: u64,
    next_decision_id: u64,
    next_trigger_id: u64,
}

impl GameState {
    pub fn new(config: GameConfig, player_names: &[&str]) -> Self {
        let players: Vec<Player> = player_names
            .iter()
            .enumerate()
            .map(|(i, name)| Player::new(PlayerId::new(i as u32), *name, config.starting_life))
            .collect();
        let player_zones = players.iter().map(|p| PlayerZones::new(p.id)).collect();
        let mut players = players;
        for player in &mut players {
            player.max_lands_per_turn = config.lands_per_turn;
        }
        let first = players.first().map(|p| p.id).unwrap_or(PlayerId::new(0));
        let rng = ChaCha12Rng::seed_from_u64(config.seed);

        GameState {
            config,
            entities: EntityStore::new(),
            players,
            player_zones,
            battlefield: CardZone::new(Zone::Battlefield, None),
            stack: CardZone::new(Zone::Stack, None),
            turn: TurnStructure::new(first),
            combat: CombatState::default(),
            modifiers: Vec::new(),
            damage_shields: Vec::new(),
            pending_triggers: Vec::new(),
            pending_decision: None,
            continuations: Vec::new(),
            game_over: false,
            winner: None,
            rng,
            next_timestamp: 1,
            next_decision_id: 1,
            next_trigger_id: 1,
        }
    }

    pub fn new_two_player(player1: &str, player2: &str, config: GameConfig) -> Self {
        Self::new(config, &[player1, player2])
    }

    // ---- counters ----

    pub fn next_timestamp(&mut self) -> u64 {
        let ts = self.next_timestamp;
        self.next_timestamp += 1;
        ts
    }

    pub fn next_decision_id(&mut self) -> u64 {
        let id = self.next_decision_id;
        self.next_decision_id += 1;
        id
    }

    pub fn next_trigger_id(&mut self) -> u64 {
        let id = self.next_trigger_id;
        self.next_trigger_id += 1;
        id
    }

    // ---- players ----

    fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or(RulesError::PlayerNotFound(id.as_u32()))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RulesError::PlayerNotFound(id.as_u32()))
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn is_in_game(&self, id: PlayerId) -> bool {
        self.player(id).map(|p| p.is_in_game()).unwrap_or(false)
    }

    /// Next player after `player` in turn order who has not lost
    pub fn next_player_in_game(&self, player: PlayerId) -> Option<PlayerId> {
        let start = self.player_index(player)?;
        let n = self.players.len();
        (1..=n)
            .map(|offset| &self.players[(start + offset) % n])
            .find(|p| p.is_in_game())
            .map(|p| p.id)
    }

    pub fn opponents(&self, player: PlayerId) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.id != player && p.is_in_game())
            .map(|p| p.id)
            .collect()
    }

    /// Players still in the game starting with the active player (APNAP order)
    pub fn apnap_order(&self) -> Vec<PlayerId> {
        let start = self.player_index(self.turn.active_player).unwrap_or(0);
        let n = self.players.len();
        (0..n)
            .map(|offset| &self.players[(start + offset) % n])
            .filter(|p| p.is_in_game())
            .map(|p| p.id)
            .collect()
    }

    pub fn players_in_game(&self) -> usize {
        self.players.iter().filter(|p| p.is_in_game()).count()
    }

    // ---- zones ----

    pub fn zones(&self, player: PlayerId) -> Result<&PlayerZones> {
        self.player_index(player)
            .map(|i| &self.player_zones[i])
            .ok_or(RulesError::PlayerNotFound(player.as_u32()))
    }

    pub fn zones_mut(&mut self, player: PlayerId) -> Result<&mut PlayerZones> {
        match self.player_index(player) {
            Some(i) => Ok(&mut self.player_zones[i]),
            None => Err(RulesError::PlayerNotFound(player.as_u32())),
        }
    }

    pub fn hand(&self, player: PlayerId) -> Vec<EntityId> {
        self.zones(player).map(|z| z.hand.cards.clone()).unwrap_or_default()
    }

    pub fn library_size(&self, player: PlayerId) -> usize {
        self.zones(player).map(|z| z.library.len()).unwrap_or(0)
    }

    pub fn zone_of(&self, id: EntityId) -> Option<Zone> {
        if self.battlefield.contains(id) {
            return Some(Zone::Battlefield);
        }
        if self.stack.contains(id) {
            return Some(Zone::Stack);
        }
        let owner = self.owner_of(id)?;
        self.zones(owner).ok()?.find(id)
    }

    pub fn is_on_battlefield(&self, id: EntityId) -> bool {
        self.battlefield.contains(id)
    }

    pub fn battlefield_ids(&self) -> Vec<EntityId> {
        self.battlefield.cards.clone()
    }

    fn zone_mut(&mut self, zone: Zone, owner: PlayerId) -> Option<&mut CardZone> {
        match zone {
            Zone::Battlefield => Some(&mut self.battlefield),
            Zone::Stack => Some(&mut self.stack),
            other => self.zones_mut(owner).ok()?.get_zone_mut(other),
        }
    }

    pub fn shuffle_library(&mut self, player: PlayerId) {
        if let Some(i) = self.player_index(player) {
            let GameState { player_zones, rng, .. } = self;
            player_zones[i].library.shuffle(rng);
        }
    }

    // ---- entities ----

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.find(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.find_mut(id)
    }

    pub fn owner_of(&self, id: EntityId) -> Option<PlayerId> {
        let entity = self.entity(id)?;
        entity
            .owner()
            .or_else(|| entity.get::<AbilityOnStack>().map(|a| a.controller))
    }

    /// Raw controller: the Controller component, else the owner
    pub fn controller_of(&self, id: EntityId) -> Option<PlayerId> {
        let entity = self.entity(id)?;
        entity.controller().or_else(|| self.owner_of(id))
    }

    pub fn card_name(&self, id: EntityId) -> String {
        self.entity(id).map(|e| e.name().to_string()).unwrap_or_default()
    }

    pub fn card(&self, id: EntityId) -> Option<&CardData> {
        self.entity(id).and_then(|e| e.card())
    }

    pub fn is_spell(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|e| e.has::<SpellOnStack>())
    }

    /// Unmodified characteristics of a card or token
    pub fn raw_characteristics(&self, id: EntityId) -> Option<Characteristics> {
        let entity = self.entity(id)?;
        let card = entity.card()?;
        let owner = entity.owner()?;
        let controller = entity.controller().unwrap_or(owner);
        let mut chars = Characteristics::from_card(card, owner, controller);
        chars.is_token = entity.is_token();
        chars.tapped = entity.is_tapped();
        Some(chars)
    }

    /// Instantiate a card owned by `owner` in the given zone (top of library)
    pub fn create_card(&mut self, owner: PlayerId, card: CardData, zone: Zone) -> EntityId {
        let id = self.entities.next_id();
        let stamp = self.next_timestamp();
        let is_creature = card.is_creature();
        let mut entity = Entity::new(id).with(card).with(Owner(owner)).with(ZoneStamp(stamp));
        if zone == Zone::Battlefield {
            entity.insert(Controller(owner));
            entity.insert(Timestamp(stamp));
            if is_creature {
                entity.insert(SummoningSickness);
            }
        }
        self.entities.insert(id, entity);
        if let Some(target) = self.zone_mut(zone, owner) {
            target.add(id);
        }
        id
    }

    /// Create a token on the battlefield under `controller`
    pub fn create_token(&mut self, controller: PlayerId, card: CardData) -> EntityId {
        let id = self.create_card(controller, card, Zone::Battlefield);
        if let Some(entity) = self.entity_mut(id) {
            entity.insert(Token);
        }
        id
    }

    /// Put an object into a zone of its owner, returning where it came from
    ///
    /// Moving is remove-then-add. Battlefield-only components are stripped when
    /// leaving the battlefield and stack payloads when leaving the stack; every
    /// move assigns a fresh zone stamp.
    pub fn move_entity(&mut self, id: EntityId, to: Zone) -> Option<Zone> {
        let controller = self.owner_of(id)?;
        self.relocate(id, to, controller, false)
    }

    pub fn put_onto_battlefield(&mut self, id: EntityId, controller: PlayerId) -> Option<Zone> {
        self.relocate(id, Zone::Battlefield, controller, false)
    }

    pub fn move_to_library_bottom(&mut self, id: EntityId) -> Option<Zone> {
        let owner = self.owner_of(id)?;
        self.relocate(id, Zone::Library, owner, true)
    }

    fn relocate(&mut self, id: EntityId, to: Zone, controller: PlayerId, bottom: bool) -> Option<Zone> {
        let owner = self.owner_of(id)?;
        let from = self.zone_of(id)?;
        if let Some(zone) = self.zone_mut(from, owner) {
            zone.remove(id);
        }

        let stamp = self.next_timestamp();
        let entity = self.entities.find_mut(id)?;
        entity.insert(ZoneStamp(stamp));
        if from == Zone::Battlefield && to != Zone::Battlefield {
            for kind in ComponentKind::BATTLEFIELD_ONLY {
                entity.remove_kind(kind);
            }
        }
        if from == Zone::Stack && to != Zone::Stack {
            for kind in ComponentKind::STACK_ONLY {
                entity.remove_kind(kind);
            }
        }
        match to {
            Zone::Battlefield => {
                entity.insert(Controller(controller));
                entity.insert(Timestamp(stamp));
                entity.remove::<Tapped>();
                if entity.card().is_some_and(|c| c.is_type(CardType::Creature)) {
                    entity.insert(SummoningSickness);
                }
            }
            Zone::Stack => {
                entity.insert(Timestamp(stamp));
            }
            _ => {
                entity.remove::<Controller>();
                entity.remove::<Timestamp>();
            }
        }

        if let Some(zone) = self.zone_mut(to, owner) {
            if bottom {
                zone.add_to_bottom(id);
            } else {
                zone.add(id);
            }
        }

        if from == Zone::Battlefield && to != Zone::Battlefield {
            self.forget_permanent(id);
        }
        Some(from)
    }

    /// Drop references to a permanent that left the battlefield
    fn forget_permanent(&mut self, id: EntityId) {
        self.combat.remove_creature(id);
        for modifier in &mut self.modifiers {
            if let AffectedObjects::Objects(objects) = &mut modifier.affected {
                objects.retain(|o| *o != id);
            }
        }
        self.modifiers
            .retain(|m| !matches!(&m.affected, AffectedObjects::Objects(objects) if objects.is_empty()));
        self.damage_shields
            .retain(|s| s.target != crate::core::Target::Object(id));
    }

    /// Remove an object from the game entirely (tokens ceasing, resolved abilities)
    pub fn remove_entity(&mut self, id: EntityId) {
        if let (Some(zone), Some(owner)) = (self.zone_of(id), self.owner_of(id)) {
            if zone == Zone::Battlefield {
                self.forget_permanent(id);
            }
            if let Some(z) = self.zone_mut(zone, owner) {
                z.remove(id);
            }
        }
        self.entities.remove(id);
    }

    /// Move the top library card to hand; flags the player on an empty library
    pub fn draw_card(&mut self, player: PlayerId) -> Option<EntityId> {
        let top = self.zones(player).ok()?.library.peek_top();
        match top {
            Some(card) => {
                self.move_entity(card, Zone::Hand);
                Some(card)
            }
            None => {
                if let Ok(p) = self.player_mut(player) {
                    p.drew_from_empty_library = true;
                }
                None
            }
        }
    }

    // ---- decisions ----

    /// Pause: record a pending decision and push the frame that will consume the answer
    pub fn request_decision(
        &mut self,
        player: PlayerId,
        kind: DecisionKind,
        source: Option<EntityId>,
        prompt: impl Into<String>,
        frame: Continuation,
    ) -> u64 {
        let id = self.next_decision_id();
        self.pending_decision = Some(PendingDecision {
            id,
            player,
            kind,
            source,
            prompt: prompt.into(),
        });
        self.continuations.push(frame);
        id
    }

    pub fn is_paused(&self) -> bool {
        self.pending_decision.is_some()
    }
}
