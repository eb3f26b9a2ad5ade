//! Conversation turn and scoring engine for multiplayer language practice.
//!
//! A conversation is a fixed-length, turn-based dialogue between two to four
//! roles. Humans who joined a room fill the first roles in join order; the
//! rest are AI characters whose turns are never submitted or scored. Each
//! human turn is scored against a precomputed target phrase.
//!
//! The crate is an in-process component: it owns turn accounting, role
//! allocation, and scoring, and exposes the full [`Conversation`] aggregate
//! so an external layer can persist it after every mutation. Dialogue text
//! itself comes from a [`dialogue::DialogueGenerator`] supplied at
//! conversation creation.

pub mod config;
pub mod conversation;
pub mod dialogue;
pub mod engine;
pub mod error;
pub mod roles;
pub mod scoring;

pub use conversation::{Conversation, ConversationStatus, InputMode, Message, Response};
pub use engine::{ConversationEngine, SubmitOutcome};
pub use error::EngineError;
pub use roles::{Controller, HumanIdentity, Participant, Role, allocate_roles};
pub use scoring::{ScoreLabel, ScoreResult, score_submission};
