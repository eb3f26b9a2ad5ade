//! Conversation Aggregate & Turn State Machine
//!
//! A conversation is created once with its roles fixed and its full message
//! sequence materialised, then mutated only through [`Conversation::submit_turn`]:
//! a submission either fully applies (response recorded, turn advanced or
//! conversation closed) or fully rejects with no mutation. Turns held by AI
//! roles are never submitted or scored; they are implicitly resolved the
//! instant turn order reaches them, both at creation time and after every
//! successful submission.

use crate::dialogue::{Language, Level};
use crate::error::EngineError;
use crate::roles::{Participant, Role};
use crate::scoring::{ScoreLabel, score_submission};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

/// Which script the submission is typed in, and therefore which of the
/// turn's two texts is the canonical target to score against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Roman,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
}

/// A human's recorded answer for one turn. Created exactly once per turn
/// and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: Uuid,
    pub display_name: String,
    pub text: String,
    pub input_mode: InputMode,
    pub score: u8,
    pub label: ScoreLabel,
    pub breakdown: String,
    pub submitted_at: DateTime<Utc>,
}

/// One turn of the dialogue: the generated target line in both scripts,
/// its English translation and hint, and the response once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub turn_number: u32,
    pub speaker: Role,
    /// Romanised / Pinyin / Latin-script form of the line.
    pub roman_text: String,
    /// Native-script form (Cyrillic, Hanzi, ...). Same as `roman_text` for
    /// languages written in the Latin alphabet.
    pub native_text: String,
    pub english_text: String,
    /// One concise grammar or vocabulary tip for this line.
    pub hint: String,
    pub response: Option<Response>,
}

/// The full conversation aggregate. The external persistence layer stores
/// this verbatim after every mutation and reloads it before the next call;
/// the engine itself keeps no durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    /// The resolved scenario the dialogue was generated from.
    pub scenario: String,
    pub language: Language,
    pub level: Level,
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
    /// 1-based; `turn_count() + 1` once completed.
    pub current_turn: u32,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates a conversation from an allocated participant list and a
    /// generated message sequence.
    ///
    /// Performs the creation-time AI skip: `current_turn` starts at the
    /// first human-held turn, and a conversation with no human-held turns
    /// at all is `Completed` before anyone ever submits.
    pub fn new(
        scenario: String,
        language: Language,
        level: Level,
        participants: Vec<Participant>,
        messages: Vec<Message>,
    ) -> Result<Self, EngineError> {
        let mut roles = HashSet::new();
        for participant in &participants {
            if !roles.insert(participant.role) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "role {} is assigned twice",
                    participant.role
                )));
            }
        }

        if messages.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "message sequence is empty".to_string(),
            ));
        }
        for (i, message) in messages.iter().enumerate() {
            let expected = i as u32 + 1;
            if message.turn_number != expected {
                return Err(EngineError::InvalidConfiguration(format!(
                    "message at position {i} has turn number {}, expected {expected}",
                    message.turn_number
                )));
            }
            if !roles.contains(&message.speaker) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "turn {} is spoken by unassigned role {}",
                    message.turn_number, message.speaker
                )));
            }
        }

        let turn_count = messages.len() as u32;
        let (current_turn, status) = match Self::next_human_turn(&messages, &participants, 0) {
            Some(turn) => (turn, ConversationStatus::Active),
            None => (turn_count + 1, ConversationStatus::Completed),
        };

        let conversation = Self {
            id: Uuid::new_v4(),
            scenario,
            language,
            level,
            participants,
            messages,
            current_turn,
            status,
            created_at: Utc::now(),
        };
        info!(
            conversation = %conversation.id,
            turns = turn_count,
            current_turn = conversation.current_turn,
            status = ?conversation.status,
            "conversation created"
        );
        Ok(conversation)
    }

    pub fn turn_count(&self) -> u32 {
        self.messages.len() as u32
    }

    pub fn is_completed(&self) -> bool {
        self.status == ConversationStatus::Completed
    }

    /// The role that owns the current turn, or `None` once completed.
    pub fn current_speaker(&self) -> Option<Role> {
        if self.is_completed() {
            return None;
        }
        self.messages
            .get(self.current_turn as usize - 1)
            .map(|m| m.speaker)
    }

    pub fn participant(&self, role: Role) -> Option<&Participant> {
        self.participants.iter().find(|p| p.role == role)
    }

    /// The role held by the given user, if they are part of this conversation.
    pub fn role_of(&self, user_id: Uuid) -> Option<Role> {
        self.participants
            .iter()
            .find(|p| p.identity().is_some_and(|h| h.user_id == user_id))
            .map(|p| p.role)
    }

    /// Validates and applies one submission for the current turn.
    ///
    /// On success the response is recorded, the turn pointer moves past any
    /// immediately following AI-held turns, and the conversation closes when
    /// no further human-held turn remains. The `(current_turn, status)` pair
    /// is computed in one step; no intermediate state is ever observable.
    pub fn submit_turn(
        &mut self,
        turn_number: u32,
        user_id: Uuid,
        text: &str,
        input_mode: InputMode,
    ) -> Result<Response, EngineError> {
        if self.is_completed() {
            return Err(EngineError::ConversationCompleted);
        }

        let wrong_turn = EngineError::WrongTurn {
            expected: self.current_turn,
            got: turn_number,
        };
        let index = match turn_number.checked_sub(1) {
            Some(i) if (i as usize) < self.messages.len() => i as usize,
            _ => return Err(wrong_turn),
        };
        // Checked before the current-turn comparison so the loser of a
        // duplicate-submission race observes AlreadySubmitted, not a
        // misleading WrongTurn for a turn that just closed.
        if self.messages[index].response.is_some() {
            return Err(EngineError::AlreadySubmitted(turn_number));
        }
        if turn_number != self.current_turn {
            return Err(wrong_turn);
        }

        let message = &self.messages[index];
        let speaker = message.speaker;
        let identity = self
            .participant(speaker)
            .and_then(|p| p.identity())
            .ok_or_else(|| {
                EngineError::RoleMismatch(format!("turn {turn_number} is held by AI role {speaker}"))
            })?;
        if identity.user_id != user_id {
            return Err(EngineError::RoleMismatch(format!(
                "turn {turn_number} belongs to role {speaker}"
            )));
        }

        let target = match input_mode {
            InputMode::Roman => &message.roman_text,
            InputMode::Native => &message.native_text,
        };
        let scored = score_submission(text, target);

        let response = Response {
            user_id,
            display_name: identity.display_name.clone(),
            text: text.to_string(),
            input_mode,
            score: scored.score,
            label: scored.label,
            breakdown: scored.breakdown,
            submitted_at: Utc::now(),
        };

        self.messages[index].response = Some(response.clone());
        let (current_turn, status) =
            match Self::next_human_turn(&self.messages, &self.participants, turn_number) {
                Some(next) => (next, ConversationStatus::Active),
                None => (self.turn_count() + 1, ConversationStatus::Completed),
            };
        self.current_turn = current_turn;
        self.status = status;

        info!(
            conversation = %self.id,
            turn = turn_number,
            score = response.score,
            next_turn = self.current_turn,
            status = ?self.status,
            "turn submitted"
        );
        Ok(response)
    }

    /// First turn after `after` held by a human role, in turn order.
    /// Pure over the message sequence and participant list.
    fn next_human_turn(
        messages: &[Message],
        participants: &[Participant],
        after: u32,
    ) -> Option<u32> {
        let human_roles: HashSet<Role> = participants
            .iter()
            .filter(|p| !p.is_ai())
            .map(|p| p.role)
            .collect();
        messages
            .iter()
            .find(|m| m.turn_number > after && human_roles.contains(&m.speaker))
            .map(|m| m.turn_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{Controller, HumanIdentity, allocate_roles};

    fn identity(name: &str) -> HumanIdentity {
        HumanIdentity {
            user_id: Uuid::new_v4(),
            username: name.to_string(),
            display_name: name.to_string(),
        }
    }

    fn script(speakers: &[Role]) -> Vec<Message> {
        speakers
            .iter()
            .enumerate()
            .map(|(i, &speaker)| Message {
                turn_number: i as u32 + 1,
                speaker,
                roman_text: format!("privet nomer {}", i + 1),
                native_text: format!("привет номер {}", i + 1),
                english_text: format!("hello number {}", i + 1),
                hint: "privet = hello".to_string(),
                response: None,
            })
            .collect()
    }

    fn conversation(participants: Vec<Participant>, speakers: &[Role]) -> Conversation {
        Conversation::new(
            "Two strangers introduce themselves at a bus stop.".to_string(),
            Language::Russian,
            Level::A1,
            participants,
            script(speakers),
        )
        .unwrap()
    }

    fn submit(conv: &mut Conversation, turn: u32, user: Uuid) -> Result<Response, EngineError> {
        let text = format!("privet nomer {turn}");
        conv.submit_turn(turn, user, &text, InputMode::Roman)
    }

    #[test]
    fn starts_on_first_human_turn() {
        let humans = vec![identity("ana"), identity("bo")];
        let participants = allocate_roles(&humans, 2).unwrap();
        let conv = conversation(participants, &[Role::A, Role::B, Role::A, Role::B]);

        assert_eq!(conv.status, ConversationStatus::Active);
        assert_eq!(conv.current_turn, 1);
        assert_eq!(conv.current_speaker(), Some(Role::A));
    }

    #[test]
    fn leading_ai_turns_are_skipped_at_creation() {
        let participants = vec![
            Participant {
                role: Role::A,
                controller: Controller::Ai,
            },
            Participant {
                role: Role::B,
                controller: Controller::Human(identity("bo")),
            },
        ];
        let conv = conversation(participants, &[Role::A, Role::B, Role::A, Role::B]);

        assert_eq!(conv.current_turn, 2);
        assert_eq!(conv.current_speaker(), Some(Role::B));
    }

    #[test]
    fn all_ai_conversation_completes_immediately() {
        let participants = allocate_roles(&[], 2).unwrap();
        let conv = conversation(participants, &[Role::A, Role::B, Role::A, Role::B]);

        assert_eq!(conv.status, ConversationStatus::Completed);
        assert_eq!(conv.current_turn, 5);
        assert_eq!(conv.current_speaker(), None);
    }

    #[test]
    fn ai_turns_are_skipped_after_each_submission() {
        let ana = identity("ana");
        let user = ana.user_id;
        let participants = allocate_roles(&[ana], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B, Role::A, Role::B]);

        submit(&mut conv, 1, user).unwrap();
        assert_eq!(conv.current_turn, 3);
        assert_eq!(conv.status, ConversationStatus::Active);

        submit(&mut conv, 3, user).unwrap();
        // Turn 4 is AI-held, so nothing remains to fill.
        assert_eq!(conv.status, ConversationStatus::Completed);
        assert_eq!(conv.current_turn, 5);
        assert_eq!(conv.current_speaker(), None);
    }

    #[test]
    fn wrong_turn_is_rejected_without_mutation() {
        let ana = identity("ana");
        let user = ana.user_id;
        let participants = allocate_roles(&[ana], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B]);
        let before = conv.clone();

        let err = submit(&mut conv, 2, user).unwrap_err();
        assert!(matches!(err, EngineError::WrongTurn { expected: 1, got: 2 }));
        let err = submit(&mut conv, 0, user).unwrap_err();
        assert!(matches!(err, EngineError::WrongTurn { expected: 1, got: 0 }));
        let err = submit(&mut conv, 99, user).unwrap_err();
        assert!(matches!(err, EngineError::WrongTurn { expected: 1, got: 99 }));

        assert_eq!(conv, before);
    }

    #[test]
    fn only_the_current_speaker_may_submit() {
        let ana = identity("ana");
        let bo = identity("bo");
        let intruder = bo.user_id;
        let outsider = Uuid::new_v4();
        let participants = allocate_roles(&[ana, bo], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B]);

        // Turn 1 belongs to role A (ana); bo and a non-member are both rejected.
        let err = submit(&mut conv, 1, intruder).unwrap_err();
        assert!(matches!(err, EngineError::RoleMismatch(_)));
        let err = submit(&mut conv, 1, outsider).unwrap_err();
        assert!(matches!(err, EngineError::RoleMismatch(_)));
        assert!(conv.messages[0].response.is_none());
    }

    #[test]
    fn duplicate_submission_is_rejected_as_already_submitted() {
        let ana = identity("ana");
        let bo = identity("bo");
        let ana_id = ana.user_id;
        let participants = allocate_roles(&[ana, bo], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B]);

        submit(&mut conv, 1, ana_id).unwrap();
        let err = submit(&mut conv, 1, ana_id).unwrap_err();
        assert!(matches!(err, EngineError::AlreadySubmitted(1)));
    }

    #[test]
    fn completion_happens_exactly_once() {
        let ana = identity("ana");
        let bo = identity("bo");
        let ana_id = ana.user_id;
        let bo_id = bo.user_id;
        let participants = allocate_roles(&[ana, bo], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B]);

        submit(&mut conv, 1, ana_id).unwrap();
        assert_eq!(conv.status, ConversationStatus::Active);
        submit(&mut conv, 2, bo_id).unwrap();
        assert_eq!(conv.status, ConversationStatus::Completed);
        assert_eq!(conv.current_turn, 3);

        let err = submit(&mut conv, 3, ana_id).unwrap_err();
        assert!(matches!(err, EngineError::ConversationCompleted));
    }

    #[test]
    fn exact_submission_scores_perfect_and_is_recorded() {
        let ana = identity("ana");
        let user = ana.user_id;
        let participants = allocate_roles(&[ana], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B]);

        let response = conv
            .submit_turn(1, user, "Privet, nomer 1!", InputMode::Roman)
            .unwrap();
        assert_eq!(response.score, 100);
        assert_eq!(response.label, ScoreLabel::Perfect);
        assert_eq!(response.display_name, "ana");
        assert_eq!(conv.messages[0].response.as_ref().unwrap(), &response);
    }

    #[test]
    fn native_input_mode_scores_against_native_text() {
        let ana = identity("ana");
        let user = ana.user_id;
        let participants = allocate_roles(&[ana], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B]);

        let response = conv
            .submit_turn(1, user, "Привет, номер 1", InputMode::Native)
            .unwrap();
        assert_eq!(response.score, 100);
        assert_eq!(response.input_mode, InputMode::Native);
    }

    #[test]
    fn rejects_gapped_turn_numbering() {
        let participants = allocate_roles(&[identity("ana")], 2).unwrap();
        let mut messages = script(&[Role::A, Role::B]);
        messages[1].turn_number = 3;

        let err = Conversation::new(
            "scenario".to_string(),
            Language::Russian,
            Level::A1,
            participants,
            messages,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_speaker_without_participant() {
        let participants = allocate_roles(&[identity("ana")], 2).unwrap();
        let err = Conversation::new(
            "scenario".to_string(),
            Language::Russian,
            Level::A1,
            participants,
            script(&[Role::A, Role::D]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_empty_message_sequence() {
        let participants = allocate_roles(&[identity("ana")], 2).unwrap();
        let err = Conversation::new(
            "scenario".to_string(),
            Language::Russian,
            Level::A1,
            participants,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[test]
    fn aggregate_survives_a_persistence_round_trip() {
        let ana = identity("ana");
        let user = ana.user_id;
        let participants = allocate_roles(&[ana], 2).unwrap();
        let mut conv = conversation(participants, &[Role::A, Role::B, Role::A, Role::B]);
        submit(&mut conv, 1, user).unwrap();

        let json = serde_json::to_string(&conv).unwrap();
        let restored: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, conv);
        assert_eq!(restored.current_turn, 3);
    }

    #[test]
    fn role_of_maps_users_to_their_roles() {
        let ana = identity("ana");
        let bo = identity("bo");
        let ana_id = ana.user_id;
        let bo_id = bo.user_id;
        let participants = allocate_roles(&[ana, bo], 3).unwrap();
        let conv = conversation(participants, &[Role::A, Role::B, Role::C]);

        assert_eq!(conv.role_of(ana_id), Some(Role::A));
        assert_eq!(conv.role_of(bo_id), Some(Role::B));
        assert_eq!(conv.role_of(Uuid::new_v4()), None);
    }
}
