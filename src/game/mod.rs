//! The rules core: game state, turn structure and every rules subsystem

pub mod actions;
pub mod auto_pass;
pub mod combat;
pub mod context;
pub mod continuation;
pub mod decision;
pub mod engine;
pub mod events;
pub mod executor;
pub mod hand_setup;
pub mod layers;
pub mod legality;
pub mod logger;
pub mod mana_engine;
pub mod mana_payment;
pub mod phase;
pub mod replacement;
pub mod sba;
pub mod snapshot;
pub mod stack;
pub mod state;
pub mod targeting;
pub mod triggers;
pub mod turn;

pub use actions::Action;
pub use auto_pass::{AutoPassManager, AutoPassMode};
pub use combat::CombatState;
pub use context::{EngineContext, Flow};
pub use continuation::Continuation;
pub use decision::{DecisionKind, DecisionResponse, PendingDecision};
pub use engine::{ExecutionResult, RulesEngine};
pub use events::GameEvent;
pub use layers::Projection;
pub use logger::{GameLogger, OutputFormat, OutputMode, VerbosityLevel};
pub use mana_engine::Payment;
pub use phase::{Phase, Step, TurnStructure};
pub use snapshot::{GameSnapshot, SnapshotError};
pub use state::GameState;
