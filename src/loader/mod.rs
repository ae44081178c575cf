//! Card and deck loaders
//!
//! JSON card scripts (one per file) and deck lists in the `.dck` format

pub mod database;
pub mod deck;
pub mod game_init;

pub use database::{CardDatabase, LoadReport, ScriptFailure};
pub use deck::{DeckEntry, DeckList, DeckLoader};
pub use game_init::GameInitializer;
