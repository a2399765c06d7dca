//! Sales development rep that answers product questions from an FAQ and
//! collects a lead, one field per message.

use async_trait::async_trait;
use chrono::Local;
use parley_core::Result;
use parley_core::catalog::{Catalog, Named};
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::intake::{CompletionPolicy, FieldKind, FieldSpec, IntakeFlow, IntakeStep};
use parley_core::store::JsonLog;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::info;

pub const COMPANY: &str = "Lumen Analytics";

const DONE_MESSAGE: &str = "I've already passed your details to our team. \
Someone will reach out soon. Thanks again for your time!";

const QUESTION_WORDS: &[&str] = &[
    "what", "how", "who", "why", "when", "where", "which", "do", "does", "is", "are", "can",
    "could", "will", "should",
];

fn fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name", "name", "To get started, may I have your name?", FieldKind::Text),
        FieldSpec::new("company", "company", "Which company are you with?", FieldKind::Text),
        FieldSpec::new("role", "role", "What's your role there?", FieldKind::Text),
        FieldSpec::new(
            "email",
            "email",
            "What's the best email to reach you?",
            FieldKind::Lowercase,
        ),
        FieldSpec::new(
            "use_case",
            "use case",
            "What would you like to use Lumen for?",
            FieldKind::Text,
        ),
        FieldSpec::new(
            "team_size",
            "team size",
            "Roughly how big is the team that would use it?",
            FieldKind::Text,
        ),
        FieldSpec::new(
            "timeline",
            "timeline",
            "And what's your timeline for getting started?",
            FieldKind::Text,
        ),
    ]
}

/// One FAQ entry from `faq.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Named for FaqEntry {
    fn name(&self) -> &str {
        &self.question
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub company: String,
    pub role: String,
    pub email: String,
    pub use_case: String,
    pub team_size: String,
    pub timeline: String,
    pub captured_at: String,
}

/// A trailing `?` always marks a question. A leading question word only does
/// when the FAQ can answer it, so answers like "Will" or "is about 20" still
/// fill the current field.
pub fn is_question(message: &str, answerable: bool) -> bool {
    let lowered = message.trim().to_lowercase();
    lowered.ends_with('?')
        || (answerable
            && lowered
                .split_whitespace()
                .next()
                .is_some_and(|first| QUESTION_WORDS.contains(&first)))
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

pub struct SdrAgent {
    faq: Catalog<FaqEntry>,
    flow: IntakeFlow,
    leads: JsonLog<Lead>,
    questions_answered: usize,
}

impl SdrAgent {
    pub fn new(faq: Catalog<FaqEntry>, leads: JsonLog<Lead>) -> Self {
        Self {
            faq,
            flow: IntakeFlow::new(fields(), CompletionPolicy::Reject, DONE_MESSAGE),
            leads,
            questions_answered: 0,
        }
    }

    pub fn open(content_dir: &Path, data_dir: &Path) -> Result<Self> {
        let faq = Catalog::load(content_dir.join("faq.json"))?;
        Ok(Self::new(faq, JsonLog::new(data_dir.join("leads.json"))))
    }

    /// Picks the FAQ entry sharing the most keywords with `message`.
    ///
    /// Falls back to the catalog's name lookup when no keyword matches.
    pub fn answer(&self, message: &str) -> Option<&FaqEntry> {
        let said = words(message);
        let best = self
            .faq
            .all()
            .iter()
            .map(|entry| {
                let hits = entry
                    .keywords
                    .iter()
                    .filter(|k| {
                        let k = k.to_lowercase();
                        said.iter().any(|w| *w == k)
                            || (k.contains(' ') && message.to_lowercase().contains(&k))
                    })
                    .count();
                (hits, entry)
            })
            .filter(|(hits, _)| *hits > 0)
            .fold(None::<(usize, &FaqEntry)>, |best, (hits, entry)| match best {
                Some((top, _)) if top >= hits => best,
                _ => Some((hits, entry)),
            });
        best.map(|(_, entry)| entry)
            .or_else(|| self.faq.lookup(message.trim().trim_end_matches('?')))
    }

    fn capture(&mut self) -> Result<String> {
        let lead = Lead {
            name: self.flow.text("name"),
            company: self.flow.text("company"),
            role: self.flow.text("role"),
            email: self.flow.text("email"),
            use_case: self.flow.text("use_case"),
            team_size: self.flow.text("team_size"),
            timeline: self.flow.text("timeline"),
            captured_at: Local::now().to_rfc3339(),
        };
        let count = self.leads.append(lead.clone())?;
        info!(company = %lead.company, leads = count, "Lead captured");
        Ok(format!(
            "Thanks, {}! To recap: you're the {} at {}, looking to use {} for {}, with a team of {} \
             and a timeline of {}. I'll send details to {} and someone from our team will follow up.",
            lead.name,
            lead.role,
            lead.company,
            COMPANY,
            lead.use_case,
            lead.team_size,
            lead.timeline,
            lead.email
        ))
    }
}

#[async_trait]
impl Conversation for SdrAgent {
    fn demo(&self) -> &'static str {
        "sdr"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::Scripted
    }

    fn instructions(&self) -> String {
        String::new()
    }

    async fn opening(&mut self) -> Result<String> {
        Ok(format!(
            "Hi, I'm Ava from {}. I'm happy to answer any questions about the product. {}",
            COMPANY,
            self.flow.current_prompt().unwrap_or_default()
        ))
    }

    async fn respond(&mut self, message: &str) -> Result<String> {
        if !self.flow.is_done() {
            let answer = self.answer(message).map(|entry| entry.answer.clone());
            if is_question(message, answer.is_some()) {
                let prompt = self.flow.current_prompt().unwrap_or_default();
                return Ok(match answer {
                    Some(answer) => {
                        self.questions_answered += 1;
                        format!("{} {}", answer, prompt)
                    }
                    None => format!(
                        "That's a great question. I don't have that detail handy, but our team \
                         can cover it on a follow-up. {}",
                        prompt
                    ),
                });
            }
        }
        match self.flow.handle(message) {
            IntakeStep::Prompt(text) | IntakeStep::Review(text) | IntakeStep::Rejected(text) => {
                Ok(text)
            }
            IntakeStep::Complete => self.capture(),
        }
    }

    fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        let collected = self
            .flow
            .fields()
            .iter()
            .filter(|f| self.flow.value(f.key).is_some())
            .count();
        meta.insert("fields_collected".into(), json!(collected));
        meta.insert("fields_total".into(), json!(self.flow.fields().len()));
        meta.insert("questions_answered".into(), json!(self.questions_answered));
        meta
    }

    fn is_finished(&self) -> bool {
        self.flow.is_done()
    }
}
