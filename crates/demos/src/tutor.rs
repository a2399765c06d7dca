//! Active-recall tutoring coach.
//!
//! Three modes share one concept list: `learn` (the agent explains),
//! `quiz` (the agent asks) and `teach_back` (the learner explains and the
//! agent grades what was covered). Coverage is tracked per concept against
//! three criteria and saved to `tutor_progress.json`.

use async_trait::async_trait;
use chrono::Local;
use parley_core::Result;
use parley_core::catalog::{Catalog, Named};
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::store::JsonDocument;
use parley_core::tools::{NoArgs, ToolDefinition, ToolOutput, ToolRegistry};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const INSTRUCTIONS: &str = "You are a warm, encouraging tutor who uses active recall. \
Start by calling list_concepts and asking what the learner wants to work on and in which mode: learn, quiz or \
teach_back. Call set_mode whenever the learner picks or switches a mode or concept.
In learn mode, use explain_concept and check understanding. In quiz mode, use quiz_question, then judge the answer \
yourself. In teach_back mode, let the learner explain and judge whether they covered the definition, the mechanism \
and a concrete example; call update_concept_status for each criterion you hear. Use get_progress when asked how \
they are doing. Keep each reply to a few spoken sentences.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub sample_question: String,
}

impl Named for Concept {
    fn name(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TutorMode {
    #[default]
    Learn,
    Quiz,
    TeachBack,
}

impl fmt::Display for TutorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TutorMode::Learn => "learn",
            TutorMode::Quiz => "quiz",
            TutorMode::TeachBack => "teach_back",
        };
        write!(f, "{}", label)
    }
}

/// Coverage of one concept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptProgress {
    pub has_definition: bool,
    pub has_mechanism: bool,
    pub has_example: bool,
    #[serde(default)]
    pub times_quizzed: u32,
}

impl ConceptProgress {
    /// A concept is mastered once all three criteria are covered.
    pub fn is_mastered(&self) -> bool {
        self.has_definition && self.has_mechanism && self.has_example
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TutorProgress {
    pub mode: TutorMode,
    pub current_concept: Option<String>,
    pub concepts: BTreeMap<String, ConceptProgress>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetModeArgs {
    pub mode: TutorMode,
    /// Concept id or title.
    pub concept: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ConceptArgs {
    /// Concept id or title. Defaults to the current concept.
    #[serde(default)]
    pub concept: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateConceptStatusArgs {
    /// Concept id or title.
    pub concept: String,
    #[schemars(description = "The criterion to update: 'definition', 'mechanism', or 'example'")]
    pub criterion: String,
    #[schemars(description = "The new status: true if covered, false if not")]
    pub is_covered: bool,
}

pub struct TutorCoach {
    concepts: Catalog<Concept>,
    progress: TutorProgress,
    document: JsonDocument<TutorProgress>,
    tools: Arc<ToolRegistry<TutorCoach>>,
}

impl TutorCoach {
    pub fn new(concepts: Catalog<Concept>, document: JsonDocument<TutorProgress>) -> Result<Self> {
        let progress = document.load()?.unwrap_or_default();
        Ok(Self {
            concepts,
            progress,
            document,
            tools: Arc::new(Self::registry()),
        })
    }

    pub fn open(content_dir: &Path, data_dir: &Path) -> Result<Self> {
        let concepts = Catalog::load(content_dir.join("concepts.json"))?;
        Self::new(concepts, JsonDocument::new(data_dir.join("tutor_progress.json")))
    }

    pub fn progress(&self) -> &TutorProgress {
        &self.progress
    }

    pub(crate) fn registry() -> ToolRegistry<Self> {
        ToolRegistry::new()
            .register(
                "list_concepts",
                "List the concepts available to study.",
                |t: &mut TutorCoach, _: NoArgs| Box::pin(async move { Ok(t.list_concepts()) }),
            )
            .register(
                "set_mode",
                "Switch the learning mode (learn, quiz, teach_back) and concept.",
                |t: &mut TutorCoach, a: SetModeArgs| Box::pin(async move { t.set_mode(a) }),
            )
            .register(
                "explain_concept",
                "Get the explanation of a concept.",
                |t: &mut TutorCoach, a: ConceptArgs| {
                    Box::pin(async move { Ok(t.explain_concept(a)) })
                },
            )
            .register(
                "quiz_question",
                "Get a quiz question for a concept.",
                |t: &mut TutorCoach, a: ConceptArgs| Box::pin(async move { t.quiz_question(a) }),
            )
            .register(
                "update_concept_status",
                "Mark whether the learner covered a criterion (definition, mechanism or example) of a concept.",
                |t: &mut TutorCoach, a: UpdateConceptStatusArgs| {
                    Box::pin(async move { t.update_concept_status(a) })
                },
            )
            .register(
                "get_progress",
                "Get the learner's progress across all concepts.",
                |t: &mut TutorCoach, _: NoArgs| Box::pin(async move { Ok(t.get_progress()) }),
            )
    }

    /// Finds a concept by exact id first, then by title.
    fn find(&self, query: &str) -> Option<&Concept> {
        let query = query.trim();
        self.concepts
            .all()
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(query))
            .or_else(|| self.concepts.lookup(query))
    }

    fn resolve(&self, requested: Option<&str>) -> Option<Concept> {
        requested
            .or(self.progress.current_concept.as_deref())
            .and_then(|q| self.find(q))
            .cloned()
    }

    fn save(&mut self) -> Result<()> {
        self.progress.updated_at = Some(Local::now().to_rfc3339());
        self.document.save(&self.progress)
    }

    fn titles(&self) -> String {
        self.concepts
            .all()
            .iter()
            .map(|c| c.title.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn list_concepts(&self) -> ToolOutput {
        format!(
            "We can work on: {}. Which one would you like, and do you want to learn, take a quiz, or teach it back to me?",
            self.titles()
        )
        .into()
    }

    fn set_mode(&mut self, args: SetModeArgs) -> Result<ToolOutput> {
        let Some(concept) = self.find(&args.concept).cloned() else {
            return Ok(format!(
                "I don't have a concept called {}. We can work on: {}.",
                args.concept,
                self.titles()
            )
            .into());
        };
        self.progress.mode = args.mode;
        self.progress.current_concept = Some(concept.id.clone());
        self.progress.concepts.entry(concept.id.clone()).or_default();
        self.save()?;
        info!(mode = %args.mode, concept = %concept.id, "Tutor mode set");

        let text = match args.mode {
            TutorMode::Learn => format!(
                "Let's learn {}. {} What part would you like to dig into?",
                concept.title, concept.summary
            ),
            TutorMode::Quiz => format!(
                "Quiz time on {}. {}",
                concept.title, concept.sample_question
            ),
            TutorMode::TeachBack => format!(
                "Your turn to teach me {}. Explain what it is, how it works, and give me an example.",
                concept.title
            ),
        };
        Ok(text.into())
    }

    fn explain_concept(&self, args: ConceptArgs) -> ToolOutput {
        match self.resolve(args.concept.as_deref()) {
            Some(concept) => format!(
                "{}: {} Does that make sense, or should I go deeper?",
                concept.title, concept.summary
            )
            .into(),
            None => self.pick_concept_first(),
        }
    }

    fn quiz_question(&mut self, args: ConceptArgs) -> Result<ToolOutput> {
        let Some(concept) = self.resolve(args.concept.as_deref()) else {
            return Ok(self.pick_concept_first());
        };
        let entry = self.progress.concepts.entry(concept.id.clone()).or_default();
        entry.times_quizzed += 1;
        self.save()?;
        Ok(format!("Here's your question on {}: {}", concept.title, concept.sample_question).into())
    }

    fn update_concept_status(&mut self, args: UpdateConceptStatusArgs) -> Result<ToolOutput> {
        let Some(concept) = self.find(&args.concept).cloned() else {
            return Ok(format!(
                "I don't have a concept called {}. We can work on: {}.",
                args.concept,
                self.titles()
            )
            .into());
        };
        let progress = self.progress.concepts.entry(concept.id.clone()).or_default();
        let was_mastered = progress.is_mastered();
        match args.criterion.trim().to_lowercase().as_str() {
            "definition" => progress.has_definition = args.is_covered,
            "mechanism" => progress.has_mechanism = args.is_covered,
            "example" => progress.has_example = args.is_covered,
            _ => {
                return Ok(format!(
                    "Invalid criterion '{}'. Use definition, mechanism or example.",
                    args.criterion
                )
                .into());
            }
        }
        let mastered = progress.is_mastered();
        self.save()?;
        info!(
            concept = %concept.id,
            criterion = %args.criterion,
            is_covered = args.is_covered,
            "Concept status updated"
        );

        let text = if mastered && !was_mastered {
            format!(
                "OK. {} is now mastered: definition, mechanism and example are all covered.",
                concept.title
            )
        } else {
            format!(
                "OK. Updated {} for {}.",
                args.criterion.trim().to_lowercase(),
                concept.title
            )
        };
        Ok(text.into())
    }

    fn get_progress(&self) -> ToolOutput {
        let concepts: Vec<Value> = self
            .concepts
            .all()
            .iter()
            .map(|c| {
                let p = self.progress.concepts.get(&c.id).cloned().unwrap_or_default();
                json!({
                    "id": c.id,
                    "title": c.title,
                    "definition": p.has_definition,
                    "mechanism": p.has_mechanism,
                    "example": p.has_example,
                    "times_quizzed": p.times_quizzed,
                    "mastered": p.is_mastered(),
                })
            })
            .collect();
        let mastered = concepts.iter().filter(|c| c["mastered"] == true).count();
        ToolOutput::Json(json!({
            "mode": self.progress.mode,
            "current_concept": self.progress.current_concept,
            "mastered": mastered,
            "total": concepts.len(),
            "concepts": concepts,
        }))
    }

    fn pick_concept_first(&self) -> ToolOutput {
        format!(
            "Which concept should we start with? We can work on: {}.",
            self.titles()
        )
        .into()
    }
}

#[async_trait]
impl Conversation for TutorCoach {
    fn demo(&self) -> &'static str {
        "tutor"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::ToolCalling
    }

    fn instructions(&self) -> String {
        format!("{}\nAvailable concepts: {}.", INSTRUCTIONS, self.titles())
    }

    async fn opening(&mut self) -> Result<String> {
        Ok(format!(
            "Hi! I'm your study coach. We can learn, quiz, or you can teach a concept back to me. \
             Today's topics are {}. Where would you like to start?",
            self.titles()
        ))
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    async fn call_tool(&mut self, name: &str, args: Value) -> Result<ToolOutput> {
        let tools = Arc::clone(&self.tools);
        tools.dispatch(self, name, args).await
    }

    fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("mode".into(), json!(self.progress.mode));
        if let Some(id) = &self.progress.current_concept {
            meta.insert("concept".into(), json!(id));
        }
        let mastered = self
            .progress
            .concepts
            .values()
            .filter(|p| p.is_mastered())
            .count();
        meta.insert("mastered".into(), json!(mastered));
        meta
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.save()
    }
}
