//! Action handler trait + registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::{ActionKind, ActionSummary};
use crate::error::ReindexError;
use crate::handlers;
use crate::state::ReindexState;
use crate::types::PaymentToken;

/// Applies one kind of action to the reindex state.
///
/// Handlers are idempotent: applying the same summary twice leaves the state
/// as after the first application. They never fail; a summary that refers to
/// an auction or offer the state does not know is a no-op.
pub trait ActionHandler: Send + Sync {
    /// The action kind this handler applies.
    fn kind(&self) -> ActionKind;

    fn handle(&self, state: &mut ReindexState, summary: &ActionSummary, payment: &PaymentToken);
}

/// Registry of action handlers, one per [`ActionKind`].
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in handler for every kind.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for handler in handlers::all() {
            // `handlers::all` yields each kind once
            registry.handlers.insert(handler.kind(), handler);
        }
        registry
    }

    /// Register a handler. A second handler for the same kind is refused.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) -> Result<(), ReindexError> {
        let kind = handler.kind();
        if self.handlers.contains_key(&kind) {
            return Err(ReindexError::DuplicateHandler { kind });
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn get(&self, kind: ActionKind) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Kinds that have no handler registered.
    pub fn missing_kinds(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| !self.handlers.contains_key(kind))
            .collect()
    }

    /// Dispatch a summary to the handler of its kind.
    pub fn dispatch(
        &self,
        state: &mut ReindexState,
        summary: &ActionSummary,
        payment: &PaymentToken,
    ) -> Result<(), ReindexError> {
        let kind = summary.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(ReindexError::MissingHandler { kind })?;
        handler.handle(state, summary, payment);
        Ok(())
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        f.debug_struct("HandlerRegistry").field("kinds", &kinds).finish()
    }
}
