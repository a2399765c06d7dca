pub mod coffee;
pub mod config;
pub mod fraud;
pub mod game_master;
pub mod grocery;
pub mod improv;
pub mod sdr;
pub mod tutor;
pub mod wellness;

use anyhow::Context;
use chrono::{DateTime, Local};
use config::Config;
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::tools::ToolDefinition;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Every demo this crate can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKind {
    Fraud,
    GameMaster,
    Grocery,
    Coffee,
    Sdr,
    Improv,
    Wellness,
    Tutor,
}

impl DemoKind {
    pub fn all() -> [DemoKind; 8] {
        [
            DemoKind::Fraud,
            DemoKind::GameMaster,
            DemoKind::Grocery,
            DemoKind::Coffee,
            DemoKind::Sdr,
            DemoKind::Improv,
            DemoKind::Wellness,
            DemoKind::Tutor,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DemoKind::Fraud => "fraud",
            DemoKind::GameMaster => "game_master",
            DemoKind::Grocery => "grocery",
            DemoKind::Coffee => "coffee",
            DemoKind::Sdr => "sdr",
            DemoKind::Improv => "improv",
            DemoKind::Wellness => "wellness",
            DemoKind::Tutor => "tutor",
        }
    }

    pub fn mode(&self) -> TurnMode {
        match self {
            DemoKind::Coffee | DemoKind::Sdr | DemoKind::Wellness => TurnMode::Scripted,
            _ => TurnMode::ToolCalling,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DemoKind::Fraud => "Bank fraud alert: verify the customer and confirm a flagged transaction.",
            DemoKind::GameMaster => "Fantasy adventure narrated by a game master who tracks your health and inventory.",
            DemoKind::Grocery => "Grocery ordering with a cart, recipes and order history.",
            DemoKind::Coffee => "Coffee-shop barista that takes an order field by field.",
            DemoKind::Sdr => "Sales rep that answers product questions and captures a lead.",
            DemoKind::Improv => "Improv game show with three scenario rounds.",
            DemoKind::Wellness => "Daily wellness check-in covering mood, energy, stress and goals.",
            DemoKind::Tutor => "Tutoring coach with learn, quiz and teach-back modes.",
        }
    }
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DemoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        DemoKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = DemoKind::all().iter().map(|k| k.as_str()).collect();
                format!("unknown demo '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// Where demos read their content and write their data.
#[derive(Debug, Clone)]
pub struct DemoContext {
    pub data_dir: PathBuf,
    pub content_dir: PathBuf,
    pub fraud_db_path: PathBuf,
}

impl From<&Config> for DemoContext {
    fn from(config: &Config) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            content_dir: config.content_dir.clone(),
            fraud_db_path: config.fraud_db_path.clone(),
        }
    }
}

/// Builds a fresh session of the given demo, loading its content up front.
pub async fn open_demo(kind: DemoKind, ctx: &DemoContext) -> anyhow::Result<Box<dyn Conversation>> {
    let data = ctx.data_dir.as_path();
    let content = ctx.content_dir.as_path();
    let conversation: Box<dyn Conversation> = match kind {
        DemoKind::Fraud => Box::new(fraud::FraudSession::open(&ctx.fraud_db_path).await?),
        DemoKind::GameMaster => Box::new(game_master::GameMaster::open(data)?),
        DemoKind::Grocery => Box::new(grocery::GroceryAssistant::open(content, data)?),
        DemoKind::Coffee => Box::new(coffee::CoffeeBot::new(data)),
        DemoKind::Sdr => Box::new(sdr::SdrAgent::open(content, data)?),
        DemoKind::Improv => Box::new(improv::ImprovHost::open(content, data)?),
        DemoKind::Wellness => Box::new(wellness::WellnessCheckIn::new(data)),
        DemoKind::Tutor => Box::new(tutor::TutorCoach::open(content, data)?),
    };
    Ok(conversation)
}

/// Tools a demo advertises to the model, without opening a session.
///
/// Scripted demos have none.
pub fn tool_definitions(kind: DemoKind) -> Vec<ToolDefinition> {
    match kind {
        DemoKind::Fraud => fraud::FraudSession::registry().definitions(),
        DemoKind::GameMaster => game_master::GameMaster::registry().definitions(),
        DemoKind::Grocery => grocery::GroceryAssistant::registry().definitions(),
        DemoKind::Improv => improv::ImprovHost::registry().definitions(),
        DemoKind::Tutor => tutor::TutorCoach::registry().definitions(),
        DemoKind::Coffee | DemoKind::Sdr | DemoKind::Wellness => Vec::new(),
    }
}

/// Creates the fraud database and inserts the sample case if it is missing.
pub async fn init_fraud_db(ctx: &DemoContext) -> anyhow::Result<bool> {
    let store = fraud::FraudStore::connect(&ctx.fraud_db_path)
        .await
        .with_context(|| format!("Failed to initialize {}", ctx.fraud_db_path.display()))?;
    store.seed_sample().await
}

/// Order identifier: `ORD-` and the local timestamp down to milliseconds.
pub fn order_id(now: DateTime<Local>) -> String {
    now.format("ORD-%Y%m%d%H%M%S%3f").to_string()
}
