//! Conversation Engine
//!
//! In-memory registry of live conversation aggregates, keyed by id. Every
//! aggregate sits behind its own mutex, so a submission is one atomic,
//! serializable unit per conversation: of two near-simultaneous submissions
//! for the same turn, exactly one succeeds and the loser observes
//! `AlreadySubmitted`. Different conversations share no mutable state and
//! proceed in parallel. Nothing here performs I/O; the external layer loads
//! an aggregate before calling in and persists the returned snapshot after.

use crate::conversation::{Conversation, ConversationStatus, InputMode, Message, Response};
use crate::dialogue::{Language, Level};
use crate::error::EngineError;
use crate::roles::{Participant, Role};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

/// What a successful submission produced: the recorded response plus the
/// new turn pointer and status, exactly as the caller needs them to render
/// state or decide whether to prompt the next human.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub response: Response,
    pub current_turn: u32,
    pub status: ConversationStatus,
}

/// Registry of conversations currently in play.
#[derive(Default)]
pub struct ConversationEngine {
    conversations: RwLock<HashMap<Uuid, Arc<Mutex<Conversation>>>>,
}

impl ConversationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates, validates, and registers a new conversation, returning a
    /// snapshot for the caller to persist.
    pub fn create(
        &self,
        scenario: String,
        language: Language,
        level: Level,
        participants: Vec<Participant>,
        messages: Vec<Message>,
    ) -> Result<Conversation, EngineError> {
        let conversation = Conversation::new(scenario, language, level, participants, messages)?;
        self.insert(conversation.clone());
        Ok(conversation)
    }

    /// Registers an aggregate, e.g. one reloaded by the persistence layer.
    /// Replaces any previously registered aggregate with the same id.
    pub fn insert(&self, conversation: Conversation) -> Uuid {
        let id = conversation.id;
        self.write_map()
            .insert(id, Arc::new(Mutex::new(conversation)));
        debug!(conversation = %id, "conversation registered");
        id
    }

    /// Drops a conversation from the registry, returning its final state.
    pub fn remove(&self, id: Uuid) -> Option<Conversation> {
        self.write_map().remove(&id).map(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// A point-in-time copy of the full aggregate, for persistence or
    /// presentation.
    pub fn snapshot(&self, id: Uuid) -> Result<Conversation, EngineError> {
        let slot = self.slot(id)?;
        let conversation = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conversation.clone())
    }

    /// The role whose turn it is, or `None` once the conversation closed.
    pub fn current_speaker(&self, id: Uuid) -> Result<Option<Role>, EngineError> {
        let slot = self.slot(id)?;
        let conversation = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conversation.current_speaker())
    }

    pub fn status(&self, id: Uuid) -> Result<ConversationStatus, EngineError> {
        let slot = self.slot(id)?;
        let conversation = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conversation.status)
    }

    /// Applies one submission under the conversation's lock.
    pub fn submit_turn(
        &self,
        id: Uuid,
        turn_number: u32,
        user_id: Uuid,
        text: &str,
        input_mode: InputMode,
    ) -> Result<SubmitOutcome, EngineError> {
        let slot = self.slot(id)?;
        let mut conversation = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let response = conversation.submit_turn(turn_number, user_id, text, input_mode)?;
        Ok(SubmitOutcome {
            response,
            current_turn: conversation.current_turn,
            status: conversation.status,
        })
    }

    fn slot(&self, id: Uuid) -> Result<Arc<Mutex<Conversation>>, EngineError> {
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(EngineError::ConversationNotFound(id))
    }

    fn write_map(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Arc<Mutex<Conversation>>>> {
        self.conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
