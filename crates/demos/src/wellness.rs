//! Daily wellness check-in.
//!
//! Scripted: mood, energy, stress and goals are asked in order, then the
//! entry is appended to `wellness_log.json`. The greeting looks back at the
//! previous entry when there is one.

use async_trait::async_trait;
use chrono::Local;
use parley_core::Result;
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::intake::{CompletionPolicy, FieldKind, FieldSpec, IntakeFlow, IntakeStep};
use parley_core::store::JsonLog;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::info;

const DONE_MESSAGE: &str =
    "We've already finished today's check-in. Take care, and I'll talk to you tomorrow.";

fn fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("mood", "mood", "How are you feeling today?", FieldKind::Text),
        FieldSpec::new(
            "energy",
            "energy",
            "How's your energy level right now?",
            FieldKind::Text,
        ),
        FieldSpec::new(
            "stress",
            "stress",
            "Is anything stressing you out at the moment?",
            FieldKind::Text,
        ),
        FieldSpec::new(
            "goals",
            "goals",
            "What are one to three things you'd like to get done today?",
            FieldKind::List,
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessEntry {
    pub timestamp: String,
    pub mood: String,
    pub energy: String,
    pub stress: String,
    pub goals: Vec<String>,
    pub summary: String,
}

pub struct WellnessCheckIn {
    flow: IntakeFlow,
    log: JsonLog<WellnessEntry>,
}

impl WellnessCheckIn {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            flow: IntakeFlow::new(fields(), CompletionPolicy::Reject, DONE_MESSAGE),
            log: JsonLog::new(data_dir.join("wellness_log.json")),
        }
    }

    fn record(&mut self) -> Result<String> {
        let goals = self.flow.list("goals");
        let goals_text = if goals.is_empty() {
            "no set goals, which is fine too".to_string()
        } else {
            goals.join(", ")
        };
        let summary = format!(
            "Feeling {}, energy {}, stress: {}. Goals: {}.",
            self.flow.text("mood"),
            self.flow.text("energy"),
            self.flow.text("stress"),
            goals_text
        );
        let entry = WellnessEntry {
            timestamp: Local::now().to_rfc3339(),
            mood: self.flow.text("mood"),
            energy: self.flow.text("energy"),
            stress: self.flow.text("stress"),
            goals,
            summary: summary.clone(),
        };
        let count = self.log.append(entry)?;
        info!(entries = count, "Wellness entry saved");
        Ok(format!(
            "Thanks for checking in. Here's your recap: {} Remember to take small breaks today. \
             Does that sound right?",
            summary
        ))
    }
}

#[async_trait]
impl Conversation for WellnessCheckIn {
    fn demo(&self) -> &'static str {
        "wellness"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::Scripted
    }

    fn instructions(&self) -> String {
        String::new()
    }

    async fn opening(&mut self) -> Result<String> {
        let first = self.flow.current_prompt().unwrap_or_default();
        Ok(match self.log.last()? {
            Some(previous) => format!(
                "Welcome back! Last time you said you were feeling {} with {} energy. {}",
                previous.mood, previous.energy, first
            ),
            None => format!("Hi, I'm your wellness companion. {}", first),
        })
    }

    async fn respond(&mut self, message: &str) -> Result<String> {
        match self.flow.handle(message) {
            IntakeStep::Prompt(text) | IntakeStep::Review(text) | IntakeStep::Rejected(text) => {
                Ok(text)
            }
            IntakeStep::Complete => self.record(),
        }
    }

    fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("done".into(), json!(self.flow.is_done()));
        if let Some(mood) = self.flow.value("mood") {
            meta.insert("mood".into(), json!(mood));
        }
        meta
    }

    fn is_finished(&self) -> bool {
        self.flow.is_done()
    }
}
