//! Error types for the rules engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(u32),

    #[error("Player not found: {0}")]
    PlayerNotFound(u32),

    #[error("Invalid zone operation: {0}")]
    InvalidZoneOperation(String),

    #[error("Decision mismatch: {0}")]
    DecisionMismatch(String),

    #[error("Insufficient mana: {0}")]
    InsufficientMana(String),

    #[error("Invalid deck format: {0}")]
    InvalidDeckFormat(String),

    #[error("Invalid card script: {0}")]
    InvalidCardScript(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl RulesError {
    /// Shorthand for a validation failure
    pub fn invalid(reason: impl Into<String>) -> Self {
        RulesError::InvalidAction(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, RulesError>;
