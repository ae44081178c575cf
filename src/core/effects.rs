//! Declarative effect trees, keywords and target requirements
//!
//! Card behavior is data: an [`Effect`] tree is interpreted by the game
//! executor. New behavior is added as a new variant plus an executor case.

use crate::core::{CardData, Color, CounterType, EntityId, ManaCost, ObjectFilter, PlayerFilter, PlayerId};
use crate::zones::Zone;
use serde::{Deserialize, Serialize};

/// Keyword abilities the engine understands
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Flying,
    Reach,
    FirstStrike,
    DoubleStrike,
    Deathtouch,
    Haste,
    Hexproof,
    Shroud,
    Indestructible,
    Lifelink,
    Menace,
    Trample,
    Vigilance,
    Defender,
    Flash,
    Protection(Color),
}

/// Rule-modifying restrictions applied in the last layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Restriction {
    CantAttack,
    CantBlock,
    CantBeBlocked,
    CantActivateAbilities,
}

/// Something that can be targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    Player(PlayerId),
    Object(EntityId),
}

impl Target {
    pub fn as_object(&self) -> Option<EntityId> {
        match self {
            Target::Object(id) => Some(*id),
            Target::Player(_) => None,
        }
    }

    pub fn as_player(&self) -> Option<PlayerId> {
        match self {
            Target::Player(id) => Some(*id),
            Target::Object(_) => None,
        }
    }
}

/// A target recorded on the stack together with the zone stamp it had when chosen
///
/// An object that changed zones since then is a new object and no longer a legal target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChosenTarget {
    pub target: Target,
    pub zone_stamp: Option<u64>,
}

/// What kind of thing a requirement may pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetKind {
    Player(PlayerFilter),
    /// A permanent on the battlefield
    Permanent(ObjectFilter),
    /// A spell on the stack
    Spell(ObjectFilter),
    /// A card in a graveyard
    CardInGraveyard(ObjectFilter),
    /// Creature, planeswalker or player
    AnyTarget,
}

/// One target slot of a spell or ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRequirement {
    pub kind: TargetKind,
    #[serde(default = "one")]
    pub min: usize,
    #[serde(default = "one")]
    pub max: usize,
}

fn one() -> usize {
    1
}

impl TargetRequirement {
    pub fn single(kind: TargetKind) -> Self {
        TargetRequirement { kind, min: 1, max: 1 }
    }

    pub fn up_to(kind: TargetKind, max: usize) -> Self {
        TargetRequirement { kind, min: 0, max }
    }

    pub fn exactly(kind: TargetKind, count: usize) -> Self {
        TargetRequirement { kind, min: count, max: count }
    }

    pub fn is_optional(&self) -> bool {
        self.min == 0
    }
}

/// A player relative to the resolving effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRef {
    You,
    EachOpponent,
    EachPlayer,
    ActivePlayer,
    /// Players chosen in target slot N
    Targets(usize),
    /// Controllers of the objects chosen in target slot N
    ControllerOfTargets(usize),
    /// A fixed player, used when an effect is split per player
    Player(PlayerId),
}

/// Objects (or players, for damage) an effect applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectTarget {
    /// Everything chosen in target slot N that is still legal
    Targets(usize),
    /// The source of the effect
    ThisObject,
    /// The permanent the source is attached to
    AttachedObject,
    /// The object that caused the trigger
    TriggerSubject,
    /// Every battlefield permanent matching the filter
    AllMatching(ObjectFilter),
    Player(PlayerRef),
}

/// A numeric quantity evaluated at resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    Fixed(i32),
    X,
    ChosenNumber,
    CountMatching(ObjectFilter),
    SourcePower,
    CardsInHand(PlayerRef),
}

impl From<i32> for Amount {
    fn from(n: i32) -> Self {
        Amount::Fixed(n)
    }
}

/// Mana produced by an effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ManaSpec {
    Fixed(Vec<Color>),
    /// `n` mana of one color chosen at resolution
    AnyColor(u8),
    /// `n` mana of the color stored by an earlier choice
    ChosenColor(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    YouControl(ObjectFilter),
    OpponentControls(ObjectFilter),
    LifeAtMost(i32),
    /// Some target in slot N is still legal
    TargetStillLegal(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duration {
    UntilEndOfTurn,
    WhileSourceOnBattlefield,
    Permanent,
}

/// Declarative effect tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Sequence(Vec<Effect>),
    DealDamage { amount: Amount, to: EffectTarget },
    /// Divide damage among the targets in a slot
    DivideDamage { amount: Amount, slot: usize },
    GainLife { amount: Amount, player: PlayerRef },
    LoseLife { amount: Amount, player: PlayerRef },
    DrawCards { count: Amount, player: PlayerRef },
    Discard { count: Amount, player: PlayerRef },
    Mill { count: Amount, player: PlayerRef },
    Destroy { what: EffectTarget },
    Exile { what: EffectTarget },
    ReturnToHand { what: EffectTarget },
    Sacrifice { player: PlayerRef, filter: ObjectFilter, count: Amount },
    Tap { what: EffectTarget },
    Untap { what: EffectTarget },
    AddCounters { what: EffectTarget, counter: CounterType, count: Amount },
    RemoveCounters { what: EffectTarget, counter: CounterType, count: Amount },
    AddPoison { player: PlayerRef, count: Amount },
    Pump { what: EffectTarget, power: i32, toughness: i32 },
    GrantKeyword { what: EffectTarget, keyword: Keyword, duration: Duration },
    GainControl { what: EffectTarget, duration: Duration },
    CreateTokens { token: CardData, count: Amount, controller: PlayerRef },
    CounterSpell { what: EffectTarget },
    CounterUnlessPays { what: EffectTarget, cost: ManaCost },
    AddMana { mana: ManaSpec, player: PlayerRef },
    Scry { count: Amount },
    SearchLibrary { filter: ObjectFilter, max: u32, to: Zone, tapped: bool },
    /// Reveal the top cards; an opponent splits them into two piles and you choose one
    RevealAndSplit { count: Amount },
    MayDo { prompt: String, effect: Box<Effect> },
    ChooseMode { labels: Vec<String>, modes: Vec<Effect> },
    ChooseColor { then: Box<Effect> },
    ChooseNumber { min: u32, max: u32, then: Box<Effect> },
    Conditional { condition: Condition, then: Box<Effect>, otherwise: Option<Box<Effect>> },
    /// Floating shield preventing the next N damage to each target
    PreventNextDamage { to: EffectTarget, amount: u32 },
    Attach { what: EffectTarget, to: EffectTarget },
}

impl Effect {
    pub fn damage(amount: i32, to: EffectTarget) -> Self {
        Effect::DealDamage { amount: Amount::Fixed(amount), to }
    }

    pub fn draw(count: i32) -> Self {
        Effect::DrawCards { count: Amount::Fixed(count), player: PlayerRef::You }
    }

    pub fn then(self, next: Effect) -> Self {
        match self {
            Effect::Sequence(mut effects) => {
                effects.push(next);
                Effect::Sequence(effects)
            }
            other => Effect::Sequence(vec![other, next]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_then_flattens_sequences() {
        let effect = Effect::draw(1).then(Effect::draw(2)).then(Effect::draw(3));
        match effect {
            Effect::Sequence(effects) => assert_eq!(effects.len(), 3),
            other => panic!("expected a sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_requirement_defaults_from_json() {
        let req: TargetRequirement = serde_json::from_str(r#"{"kind":"AnyTarget"}"#).unwrap();
        assert_eq!(req.min, 1);
        assert_eq!(req.max, 1);
        assert!(!req.is_optional());
    }
}
