//! CommandService: linear undo/redo history.
//!
//! `execute` runs a command and pushes it onto the undo stack, dropping any
//! redo entries (no redo tree). `undo`/`redo` move the top command between
//! stacks after applying its inverse/forward action. A command whose action
//! fails is never moved, so the stacks always describe the document.

use log::debug;

use super::commands::{Command, EffectCommand};
use super::effect_events::EventPayload;
use super::event_bus::EventBus;
use super::project_state::ProjectStateStore;
use crate::config::{DEFAULT_HISTORY_LIMIT, EngineConfig};
use crate::error::EngineResult;

#[derive(Debug)]
pub struct CommandService {
    undo_stack: Vec<EffectCommand>,
    redo_stack: Vec<EffectCommand>,
    history_limit: usize,
    bus: EventBus,
}

impl CommandService {
    pub fn new(bus: EventBus) -> Self {
        Self::with_history_limit(bus, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(bus: EventBus, history_limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            history_limit: history_limit.max(1),
            bus,
        }
    }

    pub fn from_config(bus: EventBus, config: &EngineConfig) -> Self {
        Self::with_history_limit(bus, config.history_limit)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run `command` and record it for undo.
    ///
    /// On failure the document and both stacks are left untouched.
    pub fn execute(&mut self, store: &mut ProjectStateStore, command: impl Into<EffectCommand>) -> EngineResult<()> {
        let command = command.into();
        command.execute(store)?;
        debug!("Executed: {}", command.description());

        let description = command.description().to_string();
        self.undo_stack.push(command);
        // Limit history size
        if self.undo_stack.len() > self.history_limit {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();

        self.bus.emit(EventPayload::CommandExecuted { description, undo_depth: self.undo_stack.len() });
        Ok(())
    }

    /// Revert the most recent command. `Ok(false)` if there is nothing to undo.
    pub fn undo(&mut self, store: &mut ProjectStateStore) -> EngineResult<bool> {
        let Some(command) = self.undo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = command.undo(store) {
            self.undo_stack.push(command);
            return Err(err);
        }
        debug!("Undone: {}", command.description());

        let description = command.description().to_string();
        self.redo_stack.push(command);
        self.bus.emit(EventPayload::CommandUndone { description, undo_depth: self.undo_stack.len() });
        Ok(true)
    }

    /// Re-apply the most recently undone command. `Ok(false)` if there is none.
    pub fn redo(&mut self, store: &mut ProjectStateStore) -> EngineResult<bool> {
        let Some(command) = self.redo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = command.execute(store) {
            self.redo_stack.push(command);
            return Err(err);
        }
        debug!("Redone: {}", command.description());

        let description = command.description().to_string();
        self.undo_stack.push(command);
        self.bus.emit(EventPayload::CommandRedone { description, undo_depth: self.undo_stack.len() });
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Undo history labels, most recent first.
    pub fn undo_descriptions(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description().to_string()).collect()
    }

    /// Redo history labels, next redo first.
    pub fn redo_descriptions(&self) -> Vec<String> {
        self.redo_stack.iter().rev().map(|c| c.description().to_string()).collect()
    }

    /// Forget all history. The document is not touched.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
