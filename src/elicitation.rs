use std::sync::Arc;

use serde::Serialize;

use crate::gateway::{ChatMessage, ChatModel, GatewayError};
use crate::session::{Message, Role};

/// System instructions framing every ordinary dialogue turn.
pub const ELICITATION_SYSTEM_PROMPT: &str = "You are an expert Requirements Engineering Assistant with deep knowledge of software requirements elicitation, IEEE-830 standards, and the Volere requirements template.

Your role is to help stakeholders articulate their software requirements through natural, adaptive conversation. Follow these principles:

1. **Active Listening**: Carefully analyze each response to understand the stakeholder's needs
2. **Adaptive Questioning**: Ask follow-up questions to clarify vague or incomplete information
3. **4W Analysis**: Ensure you understand WHO, WHAT, WHEN, and WHERE for each requirement
4. **Ambiguity Detection**: Identify unclear statements and ask for clarification
5. **Completeness Checking**: Proactively identify missing information

When eliciting requirements:
- Start by understanding the project context and goals
- Ask open-ended questions to encourage detailed responses
- Break down complex ideas into specific, testable requirements
- Distinguish between functional and non-functional requirements
- Validate understanding by summarizing what you've learned

Be conversational, professional, and patient. Guide the stakeholder through the elicitation process step by step.";

/// Fixed IEEE-830 output template for document generation. Always sent
/// verbatim; the returned document is accepted without validation.
pub const SPECIFICATION_GENERATION_PROMPT: &str = "Based on the conversation history provided, generate a Software Requirements Specification (SRS) document following the IEEE-830 standard structure.

Structure your output as follows:

# SOFTWARE REQUIREMENTS SPECIFICATION

## 1. INTRODUCTION
### 1.1 Purpose
[Describe the purpose of this SRS and its intended audience]

### 1.2 Scope
[Define the scope of the software system, including main features and benefits]

### 1.3 Definitions, Acronyms, and Abbreviations
[List any technical terms, acronyms, or abbreviations used]

### 1.4 Overview
[Provide an overview of the rest of the document]

## 2. OVERALL DESCRIPTION
### 2.1 Product Perspective
[Describe how the system fits into the larger context]

### 2.2 Product Functions
[Summarize the major functions the software will perform]

### 2.3 User Characteristics
[Describe the intended users and their characteristics]

### 2.4 Constraints
[List any limitations or constraints]

### 2.5 Assumptions and Dependencies
[State any assumptions made and external dependencies]

## 3. FUNCTIONAL REQUIREMENTS
[List all functional requirements identified during elicitation]
Format: FR-X: [Requirement description]

## 4. NON-FUNCTIONAL REQUIREMENTS
### 4.1 Performance Requirements
[List performance-related requirements]

### 4.2 Security Requirements
[List security-related requirements]

### 4.3 Usability Requirements
[List usability-related requirements]

### 4.4 Other Non-Functional Requirements
[List any other non-functional requirements]

## 5. APPENDICES
[Include any additional information, diagrams, or references]

---
Extract specific requirements from the conversation and organize them clearly. Be precise and avoid ambiguity.";

const WRITER_SYSTEM_PROMPT: &str =
    "You are a technical writer specializing in software requirements specifications.";

const TURN_TEMPERATURE: f32 = 0.7;
const DOCUMENT_TEMPERATURE: f32 = 0.3;

/// Single vague words that make a requirement untestable.
const VAGUE_WORDS: [&str; 18] = [
    "fast",
    "slow",
    "quick",
    "efficient",
    "user-friendly",
    "easy",
    "simple",
    "reliable",
    "robust",
    "scalable",
    "flexible",
    "intuitive",
    "appropriate",
    "adequate",
    "reasonable",
    "normal",
    "usual",
    "typical",
];

/// Hedging phrases that weaken a stated obligation.
const WEAK_PHRASES: [&str; 7] = [
    "if possible",
    "as appropriate",
    "as needed",
    "if required",
    "when necessary",
    "to the extent possible",
    "where applicable",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AmbiguityKind {
    #[serde(rename = "vague term")]
    VagueTerm,
    #[serde(rename = "weak phrase")]
    WeakPhrase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguityFinding {
    pub kind: AmbiguityKind,
    pub term: &'static str,
}

/// Case-insensitive substring scan against the fixed term lists. Matching
/// is containment, not word-boundary: "fast" also matches inside "fasten".
pub fn detect_ambiguity(text: &str) -> Vec<AmbiguityFinding> {
    let lower = text.to_lowercase();
    let mut findings = Vec::new();
    for word in VAGUE_WORDS {
        if lower.contains(word) {
            findings.push(AmbiguityFinding { kind: AmbiguityKind::VagueTerm, term: word });
        }
    }
    for phrase in WEAK_PHRASES {
        if lower.contains(phrase) {
            findings.push(AmbiguityFinding { kind: AmbiguityKind::WeakPhrase, term: phrase });
        }
    }
    findings
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FourWPrompts {
    pub who: String,
    pub what: String,
    pub when: String,
    #[serde(rename = "where")]
    pub where_: String,
}

/// Four fixed question templates with the requirement interpolated. Purely
/// templated; no analysis is performed.
pub fn four_w_prompts(requirement: &str) -> FourWPrompts {
    FourWPrompts {
        who: format!("WHO: Who will use this feature or be affected by '{requirement}'?"),
        what: format!("WHAT: What specific actions or data are involved in '{requirement}'?"),
        when: format!("WHEN: When should '{requirement}' occur or be available?"),
        where_: format!("WHERE: Where in the system will '{requirement}' be implemented?"),
    }
}

pub struct ElicitationEngine {
    model: Arc<dyn ChatModel>,
}

impl ElicitationEngine {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Runs one dialogue turn. The caller must have appended `user_text` to
    /// the stored history already: the trailing entry is dropped here and
    /// `user_text` is re-appended as the current turn, so the model sees the
    /// exchange exactly once.
    pub async fn turn(
        &self,
        user_text: &str,
        history: &[Message],
    ) -> Result<String, GatewayError> {
        let prior = &history[..history.len().saturating_sub(1)];
        let mut messages =
            Vec::with_capacity(prior.len() + 2);
        messages.push(ChatMessage::new(Role::System, ELICITATION_SYSTEM_PROMPT));
        messages.extend(
            prior
                .iter()
                .map(|m| ChatMessage::new(m.role, m.content.clone())),
        );
        messages.push(ChatMessage::new(Role::User, user_text));
        self.model.complete(&messages, TURN_TEMPERATURE).await
    }

    /// Generates the SRS document from the full history. Output is returned
    /// verbatim, no structural validation.
    pub async fn generate_document(&self, history: &[Message]) -> Result<String, GatewayError> {
        let transcript = flatten_history(history);
        let prompt = format!(
            "{SPECIFICATION_GENERATION_PROMPT}\n\n## CONVERSATION HISTORY:\n\n{transcript}\n\nNow generate the complete SRS document:"
        );
        let messages = vec![
            ChatMessage::new(Role::System, WRITER_SYSTEM_PROMPT),
            ChatMessage::new(Role::User, prompt),
        ];
        self.model.complete(&messages, DOCUMENT_TEMPERATURE).await
    }
}

/// Renders each message as `ROLE: content`, blocks separated by blank lines.
fn flatten_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call and answers with a canned reply, or echoes the
    /// final prompt when no reply is set.
    struct RecordingModel {
        reply: Option<String>,
        calls: Mutex<Vec<(Vec<ChatMessage>, f32)>>,
    }

    impl RecordingModel {
        fn canned(reply: &str) -> Self {
            Self { reply: Some(reply.into()), calls: Mutex::new(Vec::new()) }
        }

        fn echoing() -> Self {
            Self { reply: None, calls: Mutex::new(Vec::new()) }
        }

        fn last_call(&self) -> (Vec<ChatMessage>, f32) {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            temperature: f32,
        ) -> Result<String, GatewayError> {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), temperature));
            Ok(self
                .reply
                .clone()
                .unwrap_or_else(|| messages.last().unwrap().content.clone()))
        }
    }

    fn history(entries: &[(Role, &str)]) -> Vec<Message> {
        entries
            .iter()
            .map(|(role, content)| Message::new(*role, *content))
            .collect()
    }

    #[tokio::test]
    async fn turn_replays_history_without_duplicating_current_message() {
        let model = Arc::new(RecordingModel::canned("who will use it?"));
        let engine = ElicitationEngine::new(model.clone());
        let log = history(&[
            (Role::User, "we need a booking system"),
            (Role::Assistant, "tell me more"),
            (Role::User, "staff book rooms weekly"),
        ]);

        let reply = engine.turn("staff book rooms weekly", &log).await.unwrap();
        assert_eq!(reply, "who will use it?");

        let (sent, temperature) = model.last_call();
        assert_eq!(temperature, 0.7);
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content, "we need a booking system");
        assert_eq!(sent[2].content, "tell me more");
        assert_eq!(sent[3].role, Role::User);
        assert_eq!(sent[3].content, "staff book rooms weekly");
    }

    #[tokio::test]
    async fn turn_with_single_message_sends_system_plus_current() {
        let model = Arc::new(RecordingModel::canned("hello"));
        let engine = ElicitationEngine::new(model.clone());
        let log = history(&[(Role::User, "hi")]);

        engine.turn("hi", &log).await.unwrap();
        let (sent, _) = model.last_call();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content, "hi");
    }

    #[tokio::test]
    async fn generate_document_embeds_template_and_transcript() {
        let model = Arc::new(RecordingModel::echoing());
        let engine = ElicitationEngine::new(model.clone());
        let log = history(&[
            (Role::User, "the system tracks orders"),
            (Role::Assistant, "how many users?"),
        ]);

        let doc = engine.generate_document(&log).await.unwrap();
        assert!(!doc.is_empty());
        assert!(doc.contains("FUNCTIONAL REQUIREMENTS"));
        assert!(doc.contains("USER: the system tracks orders"));
        assert!(doc.contains("ASSISTANT: how many users?"));
        assert!(doc.contains("## CONVERSATION HISTORY:"));

        let (sent, temperature) = model.last_call();
        assert_eq!(temperature, 0.3);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
    }

    #[test]
    fn flatten_history_separates_blocks_with_blank_lines() {
        let log = history(&[(Role::User, "a"), (Role::Assistant, "b")]);
        assert_eq!(flatten_history(&log), "USER: a\n\nASSISTANT: b");
    }

    #[test]
    fn ambiguity_scan_flags_vague_terms() {
        let findings = detect_ambiguity("This should be fast and user-friendly");
        let terms: Vec<_> = findings.iter().map(|f| f.term).collect();
        assert!(terms.contains(&"fast"));
        assert!(terms.contains(&"user-friendly"));
        assert!(findings.iter().all(|f| f.kind == AmbiguityKind::VagueTerm));
    }

    #[test]
    fn ambiguity_scan_passes_precise_text() {
        assert!(detect_ambiguity("The system shall log all transactions").is_empty());
    }

    #[test]
    fn ambiguity_scan_flags_weak_phrases_case_insensitively() {
        let findings = detect_ambiguity("Notify admins WHEN NECESSARY.");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, AmbiguityKind::WeakPhrase);
        assert_eq!(findings[0].term, "when necessary");
    }

    #[test]
    fn ambiguity_scan_matches_substrings_by_design() {
        // Containment matching: "fast" inside "fasten" is a known false positive.
        let findings = detect_ambiguity("The belt must fasten securely");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].term, "fast");
    }

    #[test]
    fn four_w_prompts_interpolate_requirement() {
        let q = four_w_prompts("export reports");
        assert!(q.who.starts_with("WHO:"));
        assert!(q.what.starts_with("WHAT:"));
        assert!(q.when.starts_with("WHEN:"));
        assert!(q.where_.starts_with("WHERE:"));
        for text in [&q.who, &q.what, &q.when, &q.where_] {
            assert!(text.contains("'export reports'"));
        }
    }

    #[test]
    fn ambiguity_kind_serializes_with_spaced_labels() {
        let finding = AmbiguityFinding { kind: AmbiguityKind::VagueTerm, term: "fast" };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "vague term");
        assert_eq!(json["term"], "fast");
    }
}
