//! Coffee-shop barista bot.
//!
//! Scripted: it walks through the order fields one message at a time, reads
//! the order back for corrections, and appends it to `coffee_orders.json`.

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
    "Your order is already in and being made! Say \"new order\" if you'd like another drink.";

fn fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(
            "drink_type",
            "drink",
            "What drink can I get started for you? We have lattes, cappuccinos, americanos, mochas and cold brew.",
            FieldKind::Lowercase,
        ),
        FieldSpec::new(
            "size",
            "size",
            "Great choice! What size would you like: small, medium or large?",
            FieldKind::Lowercase,
        ),
        FieldSpec::new(
            "milk",
            "milk",
            "What kind of milk? Whole, skim, oat, almond, or none?",
            FieldKind::Lowercase,
        ),
        FieldSpec::new(
            "extras",
            "extras",
            "Any extras, like an extra shot, vanilla syrup or whipped cream? Say none if not.",
            FieldKind::List,
        ),
        FieldSpec::new(
            "name",
            "name",
            "And what name should I put on the cup?",
            FieldKind::Text,
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoffeeOrder {
    pub id: String,
    pub drink_type: String,
    pub size: String,
    pub milk: String,
    pub extras: Vec<String>,
    pub name: String,
    pub placed_at: String,
    pub status: String,
}

pub struct CoffeeBot {
    flow: IntakeFlow,
    orders: JsonLog<CoffeeOrder>,
    last_order: Option<CoffeeOrder>,
}

impl CoffeeBot {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            flow: IntakeFlow::new(fields(), CompletionPolicy::EditLoop, DONE_MESSAGE),
            orders: JsonLog::new(data_dir.join("coffee_orders.json")),
            last_order: None,
        }
    }

    pub fn last_order(&self) -> Option<&CoffeeOrder> {
        self.last_order.as_ref()
    }

    fn place(&mut self) -> Result<String> {
        let now = Local::now();
        let order = CoffeeOrder {
            id: crate::order_id(now),
            drink_type: self.flow.text("drink_type"),
            size: self.flow.text("size"),
            milk: self.flow.text("milk"),
            extras: self.flow.list("extras"),
            name: self.flow.text("name"),
            placed_at: now.to_rfc3339(),
            status: "placed".to_string(),
        };
        self.orders.append(order.clone())?;
        info!(order_id = %order.id, drink = %order.drink_type, "Coffee order placed");

        let extras = if order.extras.is_empty() {
            String::new()
        } else {
            format!(" with {}", order.extras.join(", "))
        };
        let reply = format!(
            "Perfect! One {} {} with {} milk{} for {}. Your order number is {}. It'll be ready shortly!",
            order.size, order.drink_type, order.milk, extras, order.name, order.id
        );
        self.last_order = Some(order);
        Ok(reply)
    }
}

#[async_trait]
impl Conversation for CoffeeBot {
    fn demo(&self) -> &'static str {
        "coffee"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::Scripted
    }

    fn instructions(&self) -> String {
        String::new()
    }

    async fn opening(&mut self) -> Result<String> {
        let first = self.flow.current_prompt().unwrap_or_default();
        Ok(format!("Hi, welcome to the coffee bar! {}", first))
    }

    async fn respond(&mut self, message: &str) -> Result<String> {
        if self.flow.is_done() && message.to_lowercase().contains("new order") {
            self.flow.restart();
            self.last_order = None;
            return Ok(self.flow.current_prompt().unwrap_or_default().to_string());
        }
        match self.flow.handle(message) {
            IntakeStep::Prompt(text) | IntakeStep::Review(text) | IntakeStep::Rejected(text) => {
                Ok(text)
            }
            IntakeStep::Complete => self.place(),
        }
    }

    fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("phase".into(), json!(format!("{:?}", self.flow.phase())));
        for spec in self.flow.fields() {
            if let Some(value) = self.flow.value(spec.key) {
                meta.insert(spec.key.into(), json!(value));
            }
        }
        if let Some(order) = &self.last_order {
            meta.insert("order_id".into(), json!(order.id));
        }
        meta
    }

    fn is_finished(&self) -> bool {
        self.flow.is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::intake::Phase;

    fn saved(dir: &tempfile::TempDir) -> Vec<CoffeeOrder> {
        JsonLog::<CoffeeOrder>::new(dir.path().join("coffee_orders.json"))
            .load_all()
            .unwrap()
    }

    async fn fill(bot: &mut CoffeeBot) -> String {
        let mut last = String::new();
        for msg in ["Oat Latte", "Large", "oat", "vanilla and an extra shot", "Priya"] {
            last = bot.respond(msg).await.unwrap();
        }
        last
    }

    #[tokio::test]
    async fn test_review_then_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = CoffeeBot::new(dir.path());
        assert!(bot.opening().await.unwrap().contains("What drink"));

        let review = fill(&mut bot).await;
        assert!(review.starts_with("Here's what I have: drink: oat latte, size: large"));
        assert!(saved(&dir).is_empty());

        let reply = bot.respond("No, that's all").await.unwrap();
        assert!(
            reply.contains("One large oat latte with oat milk with vanilla, an extra shot for Priya")
        );
        assert!(bot.is_finished());

        let orders = saved(&dir);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].extras, vec!["vanilla", "an extra shot"]);
        assert_eq!(orders[0].status, "placed");
        assert_eq!(bot.last_order(), Some(&orders[0]));
    }

    #[tokio::test]
    async fn test_edit_branch_overwrites_one_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = CoffeeBot::new(dir.path());
        fill(&mut bot).await;

        let reply = bot.respond("actually change the size").await.unwrap();
        assert_eq!(reply, "Sure, what should the size be?");
        let reply = bot.respond("medium").await.unwrap();
        assert!(reply.starts_with("Updated the size."));
        assert_eq!(bot.flow.phase(), Phase::Reviewing);

        bot.respond("done").await.unwrap();
        assert_eq!(saved(&dir)[0].size, "medium");
    }

    #[tokio::test]
    async fn test_completed_order_is_not_refilled() {
        let dir = tempfile::tempdir().unwrap();
        let mut bot = CoffeeBot::new(dir.path());
        fill(&mut bot).await;
        bot.respond("looks good").await.unwrap();

        let reply = bot.respond("mocha").await.unwrap();
        assert_eq!(reply, DONE_MESSAGE);
        assert_eq!(saved(&dir).len(), 1);
        assert_eq!(bot.flow.text("drink_type"), "oat latte");

        let reply = bot.respond("new order please").await.unwrap();
        assert!(reply.contains("What drink"));
        assert!(!bot.is_finished());
        assert_eq!(bot.meta().get("drink_type"), None);
    }
}
