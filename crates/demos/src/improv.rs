//! Improv game-show host.
//!
//! The host runs a fixed number of rounds. Each round hands the player a
//! scenario, waits for their scene and records the host's reaction; the
//! finished show is appended to `improv_shows.json`.

use async_trait::async_trait;
use chrono::Local;
use parley_core::Result;
use parley_core::catalog::{Catalog, Named};
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::store::JsonLog;
use parley_core::tools::{NoArgs, ToolDefinition, ToolOutput, ToolRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const MAX_ROUNDS: usize = 3;

const INSTRUCTIONS: &str = "You are the high-energy host of a voice improv game show. \
First ask for the player's name and call set_player_name. Then call next_scenario to start each round and read \
the scenario aloud. Let the player perform; when they finish, react honestly in one or two sentences (mix praise \
with playful critique, never mean) and call record_reaction with your reaction. After the last round, or if the \
player wants to stop, call end_show and read the summary. Keep it lively and short.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    pub setup: String,
}

impl Named for Scenario {
    fn name(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub scenario: String,
    pub reaction: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowPhase {
    Intro,
    AwaitingImprov,
    Reacting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRecord {
    pub player_name: String,
    pub max_rounds: usize,
    pub rounds: Vec<Round>,
    pub ended_at: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlayerNameArgs {
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReactionArgs {
    /// Your spoken reaction to the player's scene.
    pub reaction: String,
}

pub struct ImprovHost {
    scenarios: Catalog<Scenario>,
    shows: JsonLog<ShowRecord>,
    player_name: Option<String>,
    max_rounds: usize,
    rounds: Vec<Round>,
    phase: ShowPhase,
    rng: StdRng,
    tools: Arc<ToolRegistry<ImprovHost>>,
}

impl ImprovHost {
    pub fn new(scenarios: Catalog<Scenario>, shows: JsonLog<ShowRecord>) -> Self {
        Self {
            scenarios,
            shows,
            player_name: None,
            max_rounds: MAX_ROUNDS,
            rounds: Vec::new(),
            phase: ShowPhase::Intro,
            rng: StdRng::from_os_rng(),
            tools: Arc::new(Self::registry()),
        }
    }

    pub fn open(content_dir: &Path, data_dir: &Path) -> Result<Self> {
        let scenarios = Catalog::load(content_dir.join("scenarios.json"))?;
        Ok(Self::new(
            scenarios,
            JsonLog::new(data_dir.join("improv_shows.json")),
        ))
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn phase(&self) -> ShowPhase {
        self.phase
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub(crate) fn registry() -> ToolRegistry<Self> {
        ToolRegistry::new()
            .register(
                "set_player_name",
                "Remember the contestant's name.",
                |h: &mut ImprovHost, a: PlayerNameArgs| {
                    Box::pin(async move { Ok(h.set_player_name(a)) })
                },
            )
            .register(
                "next_scenario",
                "Start the next round and get its scenario.",
                |h: &mut ImprovHost, _: NoArgs| Box::pin(async move { Ok(h.next_scenario()) }),
            )
            .register(
                "record_reaction",
                "Record your reaction to the scene the player just performed.",
                |h: &mut ImprovHost, a: ReactionArgs| {
                    Box::pin(async move { Ok(h.record_reaction(a)) })
                },
            )
            .register(
                "end_show",
                "End the show and get a summary of every round.",
                |h: &mut ImprovHost, _: NoArgs| Box::pin(async move { h.end_show() }),
            )
    }

    fn player(&self) -> &str {
        self.player_name.as_deref().unwrap_or("contestant")
    }

    fn set_player_name(&mut self, args: PlayerNameArgs) -> ToolOutput {
        let name = args.name.trim();
        if name.is_empty() {
            return "I didn't catch a name. What should I call you?".into();
        }
        self.player_name = Some(name.to_string());
        info!(player = %name, "Player joined");
        format!(
            "Welcome to the stage, {}! We'll play {} rounds. Ready for your first scene?",
            name, self.max_rounds
        )
        .into()
    }

    fn next_scenario(&mut self) -> ToolOutput {
        match self.phase {
            ShowPhase::Done => return "The show is over. Thanks for playing!".into(),
            ShowPhase::AwaitingImprov => {
                let current = self.rounds.last().map(|r| r.scenario.as_str()).unwrap_or("");
                return format!(
                    "We're still in the middle of \"{}\". Perform the scene first, then I'll react.",
                    current
                )
                .into();
            }
            ShowPhase::Intro | ShowPhase::Reacting => {}
        }
        if self.rounds.len() >= self.max_rounds {
            return format!(
                "That's all {} rounds! Let's wrap up the show.",
                self.max_rounds
            )
            .into();
        }

        let unused: Vec<&Scenario> = self
            .scenarios
            .all()
            .iter()
            .filter(|s| !self.rounds.iter().any(|r| r.scenario == s.title))
            .collect();
        let pool: Vec<&Scenario> = if unused.is_empty() {
            self.scenarios.all().iter().collect()
        } else {
            unused
        };
        if pool.is_empty() {
            return "I'm out of scenarios! Let's wrap up the show.".into();
        }
        let scenario = pool[self.rng.random_range(0..pool.len())].clone();

        self.rounds.push(Round {
            scenario: scenario.title.clone(),
            reaction: None,
        });
        self.phase = ShowPhase::AwaitingImprov;
        info!(round = self.rounds.len(), scenario = %scenario.title, "Round started");
        format!(
            "Round {} of {}: {}. {} Whenever you're ready, {}, take it away!",
            self.rounds.len(),
            self.max_rounds,
            scenario.title,
            scenario.setup,
            self.player()
        )
        .into()
    }

    fn record_reaction(&mut self, args: ReactionArgs) -> ToolOutput {
        if self.phase != ShowPhase::AwaitingImprov {
            return "There's no scene to react to yet. Start a round with the next scenario.".into();
        }
        let Some(round) = self.rounds.last_mut() else {
            return "There's no scene to react to yet. Start a round with the next scenario.".into();
        };
        round.reaction = Some(args.reaction.trim().to_string());
        self.phase = ShowPhase::Reacting;

        let played = self.rounds.len();
        if played >= self.max_rounds {
            "Reaction noted. That was the final round! Time to end the show.".into()
        } else {
            format!(
                "Reaction noted. {} of {} rounds done. Ready for the next scene?",
                played, self.max_rounds
            )
            .into()
        }
    }

    fn end_show(&mut self) -> Result<ToolOutput> {
        if self.phase == ShowPhase::Done {
            return Ok("The show is already over. Thanks for playing!".into());
        }
        let record = ShowRecord {
            player_name: self.player().to_string(),
            max_rounds: self.max_rounds,
            rounds: self.rounds.clone(),
            ended_at: Local::now().to_rfc3339(),
        };
        self.shows.append(record)?;
        self.phase = ShowPhase::Done;
        info!(player = %self.player(), rounds = self.rounds.len(), "Show ended");

        if self.rounds.is_empty() {
            return Ok(format!(
                "That's a wrap before we even started, {}! Come back any time.",
                self.player()
            )
            .into());
        }
        let recap = self
            .rounds
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "round {}, {}: {}",
                    i + 1,
                    r.scenario,
                    r.reaction.as_deref().unwrap_or("no reaction recorded")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        Ok(format!(
            "That's a wrap, {}! You played {} scenes. {}. Thanks for playing!",
            self.player(),
            self.rounds.len(),
            recap
        )
        .into())
    }
}

#[async_trait]
impl Conversation for ImprovHost {
    fn demo(&self) -> &'static str {
        "improv"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::ToolCalling
    }

    fn instructions(&self) -> String {
        INSTRUCTIONS.to_string()
    }

    async fn opening(&mut self) -> Result<String> {
        Ok("Welcome to Improv Battle, the show where you make it up as you go! \
            Before we begin, what's your name?"
            .to_string())
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
        meta.insert("phase".into(), json!(self.phase));
        meta.insert("round".into(), json!(self.rounds.len()));
        meta.insert("max_rounds".into(), json!(self.max_rounds));
        if let Some(name) = &self.player_name {
            meta.insert("player".into(), json!(name));
        }
        meta
    }

    fn is_finished(&self) -> bool {
        self.phase == ShowPhase::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn host(dir: &tempfile::TempDir) -> ImprovHost {
        fs::write(
            dir.path().join("scenarios.json"),
            r#"[
                {"title": "The Last Barista", "setup": "You run the only coffee shop left on Mars."},
                {"title": "Wrong Wedding", "setup": "You give a heartfelt toast at the wrong wedding."},
                {"title": "Time-Travel Tourist", "setup": "You ask a medieval guard for Wi-Fi."},
                {"title": "Robot Job Interview", "setup": "You interview a toaster for a senior role."}
            ]"#,
        )
        .unwrap();
        ImprovHost::open(dir.path(), dir.path())
            .unwrap()
            .with_rng(StdRng::seed_from_u64(42))
    }

    async fn play_round(h: &mut ImprovHost, reaction: &str) -> String {
        h.call_tool("next_scenario", Value::Null).await.unwrap();
        h.call_tool("record_reaction", json!({ "reaction": reaction }))
            .await
            .unwrap()
            .text()
    }

    #[tokio::test]
    async fn test_full_show() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = host(&dir);
        h.call_tool("set_player_name", json!({ "name": "Kai" }))
            .await
            .unwrap();

        play_round(&mut h, "Bold choices!").await;
        play_round(&mut h, "A little slow, but great ending.").await;
        let last = play_round(&mut h, "Fantastic energy.").await;
        assert!(last.contains("final round"));

        let out = h.call_tool("next_scenario", Value::Null).await.unwrap();
        assert!(out.text().contains("That's all 3 rounds"));
        assert_eq!(h.rounds().len(), 3);

        let mut titles: Vec<&str> = h.rounds().iter().map(|r| r.scenario.as_str()).collect();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), 3);

        let out = h.call_tool("end_show", Value::Null).await.unwrap();
        assert!(out.text().starts_with("That's a wrap, Kai!"));
        assert!(h.is_finished());

        let shows = JsonLog::<ShowRecord>::new(dir.path().join("improv_shows.json"))
            .load_all()
            .unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(
            shows[0].rounds[1].reaction.as_deref(),
            Some("A little slow, but great ending.")
        );
    }

    #[tokio::test]
    async fn test_round_order_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = host(&dir);

        let out = h
            .call_tool("record_reaction", json!({ "reaction": "Nice" }))
            .await
            .unwrap();
        assert!(out.text().contains("no scene to react to"));

        h.call_tool("next_scenario", Value::Null).await.unwrap();
        assert_eq!(h.phase(), ShowPhase::AwaitingImprov);
        let out = h.call_tool("next_scenario", Value::Null).await.unwrap();
        assert!(out.text().contains("still in the middle"));
        assert_eq!(h.rounds().len(), 1);
    }

    #[tokio::test]
    async fn test_end_show_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = host(&dir);
        h.call_tool("end_show", Value::Null).await.unwrap();
        let out = h.call_tool("end_show", Value::Null).await.unwrap();
        assert!(out.text().contains("already over"));

        let shows = JsonLog::<ShowRecord>::new(dir.path().join("improv_shows.json"))
            .load_all()
            .unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].player_name, "contestant");
    }
}
