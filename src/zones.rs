//! Game zones
//!
//! Every object lives in exactly one zone. Per-player zones are held in
//! [`PlayerZones`]; the battlefield and stack are shared.

use crate::core::{EntityId, PlayerId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Library,
    Hand,
    Battlefield,
    Graveyard,
    Exile,
    Stack,
}

impl Zone {
    pub fn is_shared(&self) -> bool {
        matches!(self, Zone::Battlefield | Zone::Stack)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Zone::Library => "library",
            Zone::Hand => "hand",
            Zone::Battlefield => "battlefield",
            Zone::Graveyard => "graveyard",
            Zone::Exile => "exile",
            Zone::Stack => "stack",
        };
        f.write_str(name)
    }
}

/// An ordered container of object ids; the end of the vector is the "top"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardZone {
    pub zone_type: Zone,
    /// None for shared zones
    pub owner: Option<PlayerId>,
    pub cards: Vec<EntityId>,
}

impl CardZone {
    pub fn new(zone_type: Zone, owner: Option<PlayerId>) -> Self {
        CardZone {
            zone_type,
            owner,
            cards: Vec::new(),
        }
    }

    pub fn add(&mut self, id: EntityId) {
        self.cards.push(id);
    }

    /// Order-preserving removal
    pub fn remove(&mut self, id: EntityId) -> bool {
        if let Some(pos) = self.cards.iter().position(|&c| c == id) {
            self.cards.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.cards.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn draw_top(&mut self) -> Option<EntityId> {
        self.cards.pop()
    }

    pub fn peek_top(&self) -> Option<EntityId> {
        self.cards.last().copied()
    }

    /// Up to `n` ids from the top, topmost first
    pub fn top_n(&self, n: usize) -> Vec<EntityId> {
        self.cards.iter().rev().take(n).copied().collect()
    }

    pub fn add_to_bottom(&mut self, id: EntityId) {
        self.cards.insert(0, id);
    }

    pub fn shuffle(&mut self, rng: &mut impl rand::Rng) {
        use rand::seq::SliceRandom;
        self.cards.shuffle(rng);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.cards.iter()
    }
}

/// The private zones of one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerZones {
    pub library: CardZone,
    pub hand: CardZone,
    pub graveyard: CardZone,
    pub exile: CardZone,
}

impl PlayerZones {
    pub fn new(player_id: PlayerId) -> Self {
        PlayerZones {
            library: CardZone::new(Zone::Library, Some(player_id)),
            hand: CardZone::new(Zone::Hand, Some(player_id)),
            graveyard: CardZone::new(Zone::Graveyard, Some(player_id)),
            exile: CardZone::new(Zone::Exile, Some(player_id)),
        }
    }

    pub fn get_zone(&self, zone: Zone) -> Option<&CardZone> {
        match zone {
            Zone::Library => Some(&self.library),
            Zone::Hand => Some(&self.hand),
            Zone::Graveyard => Some(&self.graveyard),
            Zone::Exile => Some(&self.exile),
            Zone::Battlefield | Zone::Stack => None,
        }
    }

    pub fn get_zone_mut(&mut self, zone: Zone) -> Option<&mut CardZone> {
        match zone {
            Zone::Library => Some(&mut self.library),
            Zone::Hand => Some(&mut self.hand),
            Zone::Graveyard => Some(&mut self.graveyard),
            Zone::Exile => Some(&mut self.exile),
            Zone::Battlefield | Zone::Stack => None,
        }
    }

    /// Which of these zones holds the object, if any
    pub fn find(&self, id: EntityId) -> Option<Zone> {
        [Zone::Hand, Zone::Library, Zone::Graveyard, Zone::Exile]
            .into_iter()
            .find(|z| self.get_zone(*z).is_some_and(|cz| cz.contains(id)))
    }
}
