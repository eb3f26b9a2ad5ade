//! Dialogue Generation Service
//!
//! This module provides the seam through which a conversation's full message
//! sequence is produced before the turn state machine ever runs. The
//! [`DialogueGenerator`] trait lets the system swap between an LLM-backed
//! generator and a deterministic mock; the engine itself never generates or
//! translates text.

use crate::conversation::Message;
use crate::roles::{Participant, Role};
use anyhow::{Context, Result, bail};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Languages the generator knows how to prompt for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Russian,
    Chinese,
    Swedish,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Russian => write!(f, "Russian"),
            Language::Chinese => write!(f, "Chinese"),
            Language::Swedish => write!(f, "Swedish"),
        }
    }
}

/// CEFR proficiency level of the generated dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::A1 => write!(f, "A1"),
            Level::A2 => write!(f, "A2"),
            Level::B1 => write!(f, "B1"),
            Level::B2 => write!(f, "B2"),
            Level::C1 => write!(f, "C1"),
            Level::C2 => write!(f, "C2"),
        }
    }
}

/// Script instructions per language, so roman_text and native_text come
/// back in the right writing systems.
fn language_note(language: Language) -> &'static str {
    match language {
        Language::Russian => {
            "Write native_text in standard Cyrillic script. \
             Write roman_text as a faithful transliteration using standard Latin characters."
        }
        Language::Chinese => {
            "Write native_text in simplified Chinese characters. \
             Write roman_text in Pinyin WITH tone marks (e.g. nǐ hǎo, māo). No characters in roman_text."
        }
        Language::Swedish => {
            "Swedish uses the Latin alphabet. roman_text and native_text should be identical \
             (both the standard Swedish orthography)."
        }
    }
}

fn level_description(level: Level) -> &'static str {
    match level {
        Level::A1 => {
            "absolute beginner — very short sentences, present tense, basic greetings and nouns only"
        }
        Level::A2 => "elementary — simple everyday phrases, basic past tense, limited vocabulary",
        Level::B1 => "intermediate — handles most everyday situations, some complex sentences",
        Level::B2 => "upper-intermediate — fluent in most situations, wider vocabulary, some idioms",
        Level::C1 => "advanced — nuanced expression, idiomatic language, complex grammar structures",
        Level::C2 => "mastery — near-native, sophisticated vocabulary and style",
    }
}

/// Fallback scenario used when the room creator leaves the prompt blank.
fn default_scenario(language: Language, level: Level) -> &'static str {
    match (language, level) {
        (Language::Russian, Level::A1) => "Two strangers introduce themselves at a bus stop.",
        (Language::Russian, Level::A2) => "Two friends decide what to have for lunch.",
        (Language::Russian, Level::B1) => "Two colleagues discuss their weekend plans.",
        (Language::Russian, Level::B2) => "Two friends debate city life versus countryside living.",
        (Language::Russian, Level::C1) => {
            "Two people discuss the influence of social media on modern society."
        }
        (Language::Russian, Level::C2) => {
            "Two authors debate the role of literature in shaping national identity."
        }
        (Language::Chinese, Level::A1) => {
            "Two classmates greet each other on the first day of school."
        }
        (Language::Chinese, Level::A2) => "Two people order food at a small restaurant.",
        (Language::Chinese, Level::B1) => "Two friends plan a short trip together.",
        (Language::Chinese, Level::B2) => "Two colleagues discuss a challenging project at work.",
        (Language::Chinese, Level::C1) => {
            "Two people debate the pros and cons of rapid urbanisation."
        }
        (Language::Chinese, Level::C2) => {
            "Two scholars discuss Chinese philosophy and its modern relevance."
        }
        (Language::Swedish, Level::A1) => "Two neighbours meet for the first time.",
        (Language::Swedish, Level::A2) => "Two friends talk about their hobbies.",
        (Language::Swedish, Level::B1) => {
            "Two people discuss Swedish weather and outdoor activities."
        }
        (Language::Swedish, Level::B2) => {
            "Two colleagues talk about work-life balance in Sweden."
        }
        (Language::Swedish, Level::C1) => "Two friends discuss the Swedish welfare system.",
        (Language::Swedish, Level::C2) => {
            "Two journalists debate the role of the press in a democracy."
        }
    }
}

fn resolve_scenario(language: Language, level: Level, prompt: Option<&str>) -> String {
    match prompt.map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ => default_scenario(language, level).to_string(),
    }
}

/// Builds the generation prompt: role descriptions, an exact round-robin
/// turn plan, level and script constraints, and a strict JSON-only contract.
fn build_prompt(
    language: Language,
    level: Level,
    scenario: &str,
    participants: &[Participant],
    turn_count: u32,
) -> String {
    let roles_block = participants
        .iter()
        .map(|p| match p.identity() {
            Some(identity) => format!("  Role {}: {}", p.role, identity.display_name),
            None => format!("  Role {}: AI character (invent a fitting persona)", p.role),
        })
        .collect::<Vec<_>>()
        .join("\n");

    let turn_plan = (0..turn_count as usize)
        .map(|i| {
            let role = participants[i % participants.len()].role;
            format!("Turn {}→{}", i + 1, role)
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a language learning conversation generator.

Generate a realistic, natural conversation in {language} between the following roles:

{roles_block}

Scenario: "{scenario}"
Language: {language}
Level: {level} ({level_desc})

Turn assignment (follow exactly):
{turn_plan}

Requirements:
- Exactly {turn_count} turns, numbered 1 to {turn_count}.
- Each turn follows the assignment above — do not deviate.
- Lines must be appropriate for the {level} level.
- {lang_note}
- english_text is a natural English translation of the line.
- hint is one concise grammar or vocabulary tip relevant to that specific line (max 15 words).
- The conversation must flow naturally and stay on the scenario throughout.

Return ONLY a valid JSON array — no markdown, no explanation, nothing else:
[
  {{
    "turn_number": 1,
    "speaker": "<role letter A/B/C/D>",
    "roman_text": "<line in roman/latin script>",
    "native_text": "<line in native script>",
    "english_text": "<English translation>",
    "hint": "<grammar or vocab tip>"
  }},
  ...
]"#,
        level_desc = level_description(level),
        lang_note = language_note(language),
    )
}

/// One turn as the model returns it.
#[derive(Debug, Deserialize)]
struct RawTurn {
    turn_number: u32,
    speaker: Role,
    roman_text: String,
    native_text: String,
    english_text: String,
    hint: String,
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parses and validates the model output into the message sequence the
/// state machine will run on: exact turn count, sequential numbering, and
/// speakers drawn from the assigned roles.
fn parse_messages(
    raw: &str,
    participants: &[Participant],
    turn_count: u32,
) -> Result<Vec<Message>> {
    let turns: Vec<RawTurn> = serde_json::from_str(strip_fences(raw))
        .context("dialogue response is not a JSON array of turns")?;

    if turns.len() as u32 != turn_count {
        bail!("expected {turn_count} turns from the model, got {}", turns.len());
    }

    let mut messages = Vec::with_capacity(turns.len());
    for (i, turn) in turns.into_iter().enumerate() {
        let expected = i as u32 + 1;
        if turn.turn_number != expected {
            bail!("turn at position {i} is numbered {}, expected {expected}", turn.turn_number);
        }
        if !participants.iter().any(|p| p.role == turn.speaker) {
            bail!("turn {} is spoken by unassigned role {}", turn.turn_number, turn.speaker);
        }
        messages.push(Message {
            turn_number: turn.turn_number,
            speaker: turn.speaker,
            roman_text: turn.roman_text,
            native_text: turn.native_text,
            english_text: turn.english_text,
            hint: turn.hint,
            response: None,
        });
    }
    Ok(messages)
}

/// Defines the contract for any service that can generate a dialogue.
///
/// Returns the resolved scenario together with the full ordered message
/// sequence; the sequence is immutable once the conversation is created.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn generate(
        &self,
        language: Language,
        level: Level,
        participants: &[Participant],
        scenario: Option<&str>,
        turn_count: u32,
    ) -> Result<(String, Vec<Message>)>;
}

/// An implementation of `DialogueGenerator` that uses an OpenAI-compatible
/// chat API.
pub struct LlmDialogueGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl LlmDialogueGenerator {
    /// Creates a new LLM-backed dialogue generator.
    ///
    /// # Arguments
    ///
    /// * `config` - OpenAI API configuration (API key, base URL, etc.).
    /// * `model` - Model identifier to use for generation (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl DialogueGenerator for LlmDialogueGenerator {
    async fn generate(
        &self,
        language: Language,
        level: Level,
        participants: &[Participant],
        scenario: Option<&str>,
        turn_count: u32,
    ) -> Result<(String, Vec<Message>)> {
        if participants.is_empty() {
            bail!("cannot generate a dialogue without participants");
        }
        let scenario = resolve_scenario(language, level, scenario);
        let prompt = build_prompt(language, level, &scenario, participants, turn_count);

        info!(model = %self.model, %language, %level, turn_count, "generating dialogue");

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content("You are a language learning conversation generator.")
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        let text = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .as_ref()
            .context("No content in LLM response")?;

        let messages = parse_messages(text, participants, turn_count)?;
        Ok((scenario, messages))
    }
}

/// A mock `DialogueGenerator` for development and integration testing.
///
/// Produces a predictable round-robin script without external dependencies
/// or API costs.
pub struct MockDialogueGenerator;

#[async_trait]
impl DialogueGenerator for MockDialogueGenerator {
    async fn generate(
        &self,
        language: Language,
        level: Level,
        participants: &[Participant],
        scenario: Option<&str>,
        turn_count: u32,
    ) -> Result<(String, Vec<Message>)> {
        if participants.is_empty() {
            bail!("cannot generate a dialogue without participants");
        }
        let scenario = resolve_scenario(language, level, scenario);
        let messages = (1..=turn_count)
            .map(|n| {
                let speaker = participants[(n as usize - 1) % participants.len()].role;
                Message {
                    turn_number: n,
                    speaker,
                    roman_text: format!("mock line {n} for role {speaker}"),
                    native_text: format!("mock line {n} for role {speaker}"),
                    english_text: format!("Mock line {n} for role {speaker}."),
                    hint: "This is a mock hint.".to_string(),
                    response: None,
                }
            })
            .collect();
        Ok((scenario, messages))
    }
}
