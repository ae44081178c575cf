//! Per-call execution context threaded through the rules core

use crate::core::{CardRegistry, CardScript};
use crate::game::events::GameEvent;
use crate::game::logger::GameLogger;

/// Whether an operation ran to completion or stopped for a player decision
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Paused,
}

impl Flow {
    pub fn is_paused(&self) -> bool {
        matches!(self, Flow::Paused)
    }
}

/// Card registry, logger and the events emitted so far in this call
pub struct EngineContext<'a> {
    pub registry: &'a dyn CardRegistry,
    pub logger: &'a GameLogger,
    pub events: Vec<GameEvent>,
    trigger_cursor: usize,
}

impl<'a> EngineContext<'a> {
    pub fn new(registry: &'a dyn CardRegistry, logger: &'a GameLogger) -> Self {
        EngineContext {
            registry,
            logger,
            events: Vec::new(),
            trigger_cursor: 0,
        }
    }

    pub fn emit(&mut self, event: GameEvent) {
        #[cfg(feature = "verbose-logging")]
        self.logger.event(&event);
        self.events.push(event);
    }

    /// Script for a card name; the returned reference outlives the context borrow
    pub fn script(&self, name: &str) -> Option<&'a CardScript> {
        let registry: &'a dyn CardRegistry = self.registry;
        registry.script(name)
    }

    /// Events not yet inspected for triggers
    pub fn unscanned_events(&mut self) -> Vec<GameEvent> {
        let fresh = self.events[self.trigger_cursor..].to_vec();
        self.trigger_cursor = self.events.len();
        fresh
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
