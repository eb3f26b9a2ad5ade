//! Role Allocation
//!
//! Assigns the fixed conversational slots A-D to the humans who joined a
//! room, in join order, and marks the remaining slots as AI characters.
//! Allocation is a pure function of (join order, max_players): the same
//! inputs always produce the same participant list.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One of the fixed conversational slots. A conversation uses the first
/// `max_players` roles in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    A,
    B,
    C,
    D,
}

impl Role {
    /// All roles, in allocation order.
    pub const ALL: [Role; 4] = [Role::A, Role::B, Role::C, Role::D];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::A => write!(f, "A"),
            Role::B => write!(f, "B"),
            Role::C => write!(f, "C"),
            Role::D => write!(f, "D"),
        }
    }
}

/// A registered user occupying a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanIdentity {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
}

/// Who controls a role: a real user, or an AI character whose turns are
/// skipped by the turn state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Controller {
    Human(HumanIdentity),
    Ai,
}

/// One role of a conversation together with its controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub role: Role,
    pub controller: Controller,
}

impl Participant {
    pub fn is_ai(&self) -> bool {
        matches!(self.controller, Controller::Ai)
    }

    /// The human behind this role, if any.
    pub fn identity(&self) -> Option<&HumanIdentity> {
        match &self.controller {
            Controller::Human(identity) => Some(identity),
            Controller::Ai => None,
        }
    }
}

/// Builds the participant list for a new conversation.
///
/// Role `k` (0-indexed into A-D) receives the `k`-th human in join order if
/// one exists, otherwise it becomes an AI character. Roles beyond
/// `max_players` do not exist.
pub fn allocate_roles(
    humans: &[HumanIdentity],
    max_players: usize,
) -> Result<Vec<Participant>, EngineError> {
    if !(2..=4).contains(&max_players) {
        return Err(EngineError::InvalidConfiguration(format!(
            "max_players must be between 2 and 4, got {max_players}"
        )));
    }
    if humans.len() > max_players {
        return Err(EngineError::InvalidConfiguration(format!(
            "{} humans joined but the room only holds {max_players}",
            humans.len()
        )));
    }

    let participants = Role::ALL[..max_players]
        .iter()
        .enumerate()
        .map(|(i, &role)| Participant {
            role,
            controller: match humans.get(i) {
                Some(identity) => Controller::Human(identity.clone()),
                None => Controller::Ai,
            },
        })
        .collect();

    Ok(participants)
}
