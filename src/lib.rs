//! MTG rules engine
//!
//! A pure, deterministic rules core for a Magic-style card game: turn and
//! priority handling, the stack, state-based actions, continuous effect
//! layers, mana payment, targeting, replacement effects and resumable
//! player decisions. Card behavior is supplied as data through a
//! [`core::CardRegistry`].

pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod loader;
pub mod zones;

pub use config::GameConfig;
pub use error::{Result, RulesError};
