//! Linear field-collection state machine.
//!
//! Each inbound message fills the first unset field, then the machine asks for
//! the next one. Once every field is set it either completes straight away
//! ([`CompletionPolicy::Reject`]) or walks through a review loop where single
//! fields can be corrected ([`CompletionPolicy::EditLoop`]). After completion
//! no further message re-enters the filling logic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a raw message is normalized before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed, case kept.
    Text,
    /// Trimmed and lower-cased.
    Lowercase,
    /// Split on commas and "and", lower-cased, empty items dropped.
    List,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(
        key: &'static str,
        label: &'static str,
        prompt: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            key,
            label,
            prompt,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::List(items) if items.is_empty() => write!(f, "none"),
            FieldValue::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Complete as soon as the last field is filled.
    Reject,
    /// Offer per-field corrections before completing.
    EditLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Reviewing,
    Editing(usize),
    Done,
}

/// What the owner of the flow should do with a message's outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeStep {
    /// Ask the user this.
    Prompt(String),
    /// Read back the collected fields and ask about corrections.
    Review(String),
    /// Every field is set and confirmed; run the terminal action now.
    Complete,
    /// The flow is already finished; the message was ignored.
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct IntakeFlow {
    fields: Vec<FieldSpec>,
    values: Vec<Option<FieldValue>>,
    phase: Phase,
    policy: CompletionPolicy,
    done_message: String,
}

const EMPTY_LIST_WORDS: &[&str] = &["none", "no", "nothing", "nope", "no thanks"];
const FINISHED_PHRASES: &[&str] = &["that's all", "thats all", "looks good", "all good"];
const FINISHED_WORDS: &[&str] = &["no", "nope", "nothing", "done"];

impl IntakeFlow {
    pub fn new(fields: Vec<FieldSpec>, policy: CompletionPolicy, done_message: &str) -> Self {
        let values = vec![None; fields.len()];
        Self {
            fields,
            values,
            phase: Phase::Collecting,
            policy,
            done_message: done_message.to_string(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// The prompt for the first unset field, if any.
    pub fn current_prompt(&self) -> Option<&'static str> {
        self.next_unset().map(|idx| self.fields[idx].prompt)
    }

    pub fn value(&self, key: &str) -> Option<&FieldValue> {
        let idx = self.fields.iter().position(|f| f.key == key)?;
        self.values[idx].as_ref()
    }

    pub fn text(&self, key: &str) -> String {
        match self.value(key) {
            Some(FieldValue::Text(text)) => text.clone(),
            Some(list @ FieldValue::List(_)) => list.to_string(),
            None => String::new(),
        }
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        match self.value(key) {
            Some(FieldValue::List(items)) => items.clone(),
            Some(FieldValue::Text(text)) => vec![text.clone()],
            None => Vec::new(),
        }
    }

    /// Collected fields as `label: value` pairs, in declared order.
    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .zip(&self.values)
            .filter_map(|(spec, value)| value.as_ref().map(|v| format!("{}: {}", spec.label, v)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Clears every field and starts collecting from the top.
    pub fn restart(&mut self) {
        self.values = vec![None; self.fields.len()];
        self.phase = Phase::Collecting;
    }

    pub fn handle(&mut self, message: &str) -> IntakeStep {
        match self.phase {
            Phase::Collecting => self.collect(message),
            Phase::Reviewing => self.review(message),
            Phase::Editing(idx) => self.edit(idx, message),
            Phase::Done => IntakeStep::Rejected(self.done_message.clone()),
        }
    }

    fn next_unset(&self) -> Option<usize> {
        self.values.iter().position(Option::is_none)
    }

    fn collect(&mut self, message: &str) -> IntakeStep {
        let Some(idx) = self.next_unset() else {
            return self.finish_collecting();
        };
        match normalize(self.fields[idx].kind, message) {
            Some(value) => self.values[idx] = Some(value),
            None => return IntakeStep::Prompt(self.fields[idx].prompt.to_string()),
        }
        match self.next_unset() {
            Some(next) => IntakeStep::Prompt(self.fields[next].prompt.to_string()),
            None => self.finish_collecting(),
        }
    }

    fn finish_collecting(&mut self) -> IntakeStep {
        match self.policy {
            CompletionPolicy::Reject => {
                self.phase = Phase::Done;
                IntakeStep::Complete
            }
            CompletionPolicy::EditLoop => {
                self.phase = Phase::Reviewing;
                IntakeStep::Review(format!(
                    "Here's what I have: {}. Would you like to change anything?",
                    self.summary()
                ))
            }
        }
    }

    fn review(&mut self, message: &str) -> IntakeStep {
        let said = message.trim().to_lowercase();
        if let Some(idx) = self.fields.iter().position(|f| {
            said.contains(&f.label.to_lowercase()) || said.contains(&f.key.replace('_', " "))
        }) {
            self.phase = Phase::Editing(idx);
            return IntakeStep::Prompt(format!(
                "Sure, what should the {} be?",
                self.fields[idx].label
            ));
        }
        if is_finished(&said) {
            self.phase = Phase::Done;
            return IntakeStep::Complete;
        }
        let labels: Vec<&str> = self.fields.iter().map(|f| f.label).collect();
        IntakeStep::Prompt(format!(
            "Which detail would you like to change? You can say {}, or no if everything looks right.",
            labels.join(", ")
        ))
    }

    fn edit(&mut self, idx: usize, message: &str) -> IntakeStep {
        let spec = &self.fields[idx];
        let Some(value) = normalize(spec.kind, message) else {
            return IntakeStep::Prompt(format!("Sorry, what should the {} be?", spec.label));
        };
        let label = spec.label;
        self.values[idx] = Some(value);
        self.phase = Phase::Reviewing;
        IntakeStep::Review(format!(
            "Updated the {}. Now I have: {}. Anything else to change?",
            label,
            self.summary()
        ))
    }
}

fn normalize(kind: FieldKind, message: &str) -> Option<FieldValue> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = match kind {
        FieldKind::Text => FieldValue::Text(trimmed.to_string()),
        FieldKind::Lowercase => FieldValue::Text(trimmed.to_lowercase()),
        FieldKind::List => {
            let lowered = trimmed.to_lowercase();
            let bare = lowered.trim_end_matches(['.', '!']);
            if EMPTY_LIST_WORDS.contains(&bare) {
                FieldValue::List(Vec::new())
            } else {
                FieldValue::List(
                    bare.replace(" and ", ",")
                        .split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            }
        }
    };
    Some(value)
}

fn is_finished(said: &str) -> bool {
    let bare = said.trim_end_matches(['.', '!']);
    if FINISHED_PHRASES.iter().any(|p| bare.contains(p)) {
        return true;
    }
    bare.split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .is_some_and(|first| FINISHED_WORDS.contains(&first))
}
