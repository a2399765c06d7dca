//! Voice game master for a short fantasy adventure.
//!
//! The whole game lives in one [`GameState`] document that is rewritten to
//! `game_state.json` after every mutating tool.

use async_trait::async_trait;
use chrono::Local;
use parley_core::Result;
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::store::JsonDocument;
use parley_core::tools::{NoArgs, ToolDefinition, ToolOutput, ToolRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const START_LOCATION: &str = "The Dark Forest Entrance";
pub const MAX_HEALTH: i64 = 100;
const PROMPT: &str = "What do you do?";

const INSTRUCTIONS: &str = "You are an engaging, dramatic Game Master running a fantasy adventure in Eldergrove, \
an enchanted forest of ancient ruins and magical creatures. The player seeks the legendary Crystal of Lumina.
Describe scenes vividly but briefly (2-4 sentences), voice the NPCs, and give choices real consequences.
Use the tools to track health, inventory, locations, NPCs, dice rolls and major decisions, and call \
advance_turn after each player action. Reference past events for continuity. \
Always end with \"What do you do?\".";

const OPENING_SCENE: &str = "You stand at the mossy threshold of the Dark Forest. Mist curls between ancient trunks \
and a faint blue glow shimmers beneath the roots, the first whisper of the Crystal's power. The path ahead splits: \
one route descends toward a ruined watchtower, another winds into a shadowed hollow. What do you do?";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub description: String,
    pub acquired_at_turn: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub health: i64,
    pub inventory: Vec<InventoryItem>,
    pub current_location: String,
    pub quest_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    pub description: String,
    pub disposition: String,
    pub met_at_location: String,
    pub met_at_turn: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub turn: u32,
    pub event: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub locations_visited: Vec<String>,
    pub npcs_met: Vec<Npc>,
    pub key_events: Vec<KeyEvent>,
    pub discovered_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub turn: u32,
    pub decision: String,
    pub impact: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryProgress {
    pub turn_count: u32,
    pub major_decisions: Vec<Decision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub player: Player,
    pub world: World,
    pub story_progress: StoryProgress,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            player: Player {
                name: "Adventurer".to_string(),
                health: MAX_HEALTH,
                inventory: Vec::new(),
                current_location: START_LOCATION.to_string(),
                quest_status: "active".to_string(),
            },
            world: World {
                locations_visited: vec![START_LOCATION.to_string()],
                npcs_met: Vec::new(),
                key_events: Vec::new(),
                discovered_items: Vec::new(),
            },
            story_progress: StoryProgress {
                turn_count: 0,
                major_decisions: Vec::new(),
            },
        }
    }
}

impl GameState {
    fn log_event(&mut self, event: String) {
        info!(turn = self.story_progress.turn_count, %event, "Event logged");
        self.world.key_events.push(KeyEvent {
            turn: self.story_progress.turn_count,
            event,
            timestamp: Local::now().to_rfc3339(),
        });
    }

    pub fn inventory_names(&self) -> Vec<String> {
        self.player.inventory.iter().map(|i| i.name.clone()).collect()
    }
}

/// Result band of a d20 check.
pub fn d20_outcome(roll: u32) -> &'static str {
    match roll {
        15.. => "CRITICAL SUCCESS",
        10..=14 => "Success",
        5..=9 => "Partial Success",
        _ => "Failure",
    }
}

/// Parses `"d20"`, `"D6"` and the like into the number of faces.
pub fn parse_die(dice_type: &str) -> Option<u32> {
    let faces = dice_type.trim().to_lowercase();
    let faces = faces.strip_prefix('d').unwrap_or(&faces);
    faces.parse::<u32>().ok().filter(|&n| n > 0)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HealthArgs {
    /// Negative for damage, positive for healing.
    pub health_change: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddItemArgs {
    pub item_name: String,
    pub item_description: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveItemArgs {
    pub item_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LocationArgs {
    pub new_location: String,
    pub location_description: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NpcArgs {
    pub npc_name: String,
    pub npc_description: String,
    /// e.g. friendly, hostile, wary.
    pub disposition: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DiceArgs {
    /// Die to roll, such as "d20" or "d6".
    pub dice_type: String,
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DecisionArgs {
    pub decision_description: String,
    pub impact: String,
}

pub struct GameMaster {
    state: GameState,
    document: JsonDocument<GameState>,
    rng: StdRng,
    tools: Arc<ToolRegistry<GameMaster>>,
}

impl GameMaster {
    /// Resumes from `game_state.json` under `data_dir` if present, else starts fresh.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let document = JsonDocument::new(data_dir.join("game_state.json"));
        let state = match document.load()? {
            Some(state) => {
                info!(path = %document.path().display(), "Loaded existing game state");
                state
            }
            None => {
                info!("Starting new game");
                GameState::default()
            }
        };
        Ok(Self {
            state,
            document,
            rng: StdRng::from_os_rng(),
            tools: Arc::new(Self::registry()),
        })
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub(crate) fn registry() -> ToolRegistry<Self> {
        ToolRegistry::new()
            .register(
                "update_player_health",
                "Update the player's health when they take damage or heal.",
                |g: &mut GameMaster, a: HealthArgs| {
                    Box::pin(async move { g.update_player_health(a) })
                },
            )
            .register(
                "add_to_inventory",
                "Add an item to the player's inventory.",
                |g: &mut GameMaster, a: AddItemArgs| Box::pin(async move { g.add_to_inventory(a) }),
            )
            .register(
                "remove_from_inventory",
                "Remove an item from the player's inventory.",
                |g: &mut GameMaster, a: RemoveItemArgs| {
                    Box::pin(async move { g.remove_from_inventory(a) })
                },
            )
            .register(
                "change_location",
                "Move the player to a new location.",
                |g: &mut GameMaster, a: LocationArgs| Box::pin(async move { g.change_location(a) }),
            )
            .register(
                "meet_npc",
                "Record meeting a new NPC.",
                |g: &mut GameMaster, a: NpcArgs| Box::pin(async move { g.meet_npc(a) }),
            )
            .register(
                "roll_dice",
                "Roll dice for a skill check or random event.",
                |g: &mut GameMaster, a: DiceArgs| Box::pin(async move { g.roll_dice(a) }),
            )
            .register(
                "check_inventory",
                "Show the player's current inventory.",
                |g: &mut GameMaster, _: NoArgs| Box::pin(async move { Ok(g.check_inventory()) }),
            )
            .register(
                "check_status",
                "Show the player's current status and game progress.",
                |g: &mut GameMaster, _: NoArgs| Box::pin(async move { Ok(g.check_status()) }),
            )
            .register(
                "record_decision",
                "Record a major player decision.",
                |g: &mut GameMaster, a: DecisionArgs| Box::pin(async move { g.record_decision(a) }),
            )
            .register(
                "advance_turn",
                "Advance the turn counter. Call this after each player action.",
                |g: &mut GameMaster, _: NoArgs| Box::pin(async move { g.advance_turn() }),
            )
            .register(
                "restart_game",
                "Restart the game from the beginning.",
                |g: &mut GameMaster, _: NoArgs| Box::pin(async move { g.restart_game() }),
            )
    }

    fn save(&self) -> Result<()> {
        self.document.save(&self.state)?;
        info!(path = %self.document.path().display(), "Game state saved");
        Ok(())
    }

    fn update_player_health(&mut self, args: HealthArgs) -> Result<ToolOutput> {
        let old = self.state.player.health;
        let new = old.saturating_add(args.health_change).clamp(0, MAX_HEALTH);
        self.state.player.health = new;
        self.state.log_event(format!(
            "Player health changed from {} to {}: {}",
            old, new, args.reason
        ));
        self.save()?;

        let text = if args.health_change < 0 {
            format!(
                "You take {} damage from {}! Health: {}/{}. {}",
                args.health_change.unsigned_abs(),
                args.reason,
                new,
                MAX_HEALTH,
                PROMPT
            )
        } else {
            format!(
                "You heal {} health from {}! Health: {}/{}. {}",
                args.health_change, args.reason, new, MAX_HEALTH, PROMPT
            )
        };
        Ok(text.into())
    }

    fn add_to_inventory(&mut self, args: AddItemArgs) -> Result<ToolOutput> {
        self.state.player.inventory.push(InventoryItem {
            name: args.item_name.clone(),
            description: args.item_description,
            acquired_at_turn: self.state.story_progress.turn_count,
        });
        self.state.world.discovered_items.push(args.item_name.clone());
        self.state
            .log_event(format!("Player acquired: {}", args.item_name));
        self.save()?;
        Ok(format!(
            "Added {} to inventory! You now have {} items. {}",
            args.item_name,
            self.state.player.inventory.len(),
            PROMPT
        )
        .into())
    }

    fn remove_from_inventory(&mut self, args: RemoveItemArgs) -> Result<ToolOutput> {
        let wanted = args.item_name.trim().to_lowercase();
        let inventory = &mut self.state.player.inventory;
        let Some(index) = inventory.iter().position(|i| i.name.to_lowercase() == wanted) else {
            return Ok(format!("Item {} not found in inventory. {}", args.item_name, PROMPT).into());
        };
        inventory.remove(index);
        self.state
            .log_event(format!("Player used/lost: {}", args.item_name));
        self.save()?;
        Ok(format!("Removed {} from inventory. {}", args.item_name, PROMPT).into())
    }

    fn change_location(&mut self, args: LocationArgs) -> Result<ToolOutput> {
        let old = std::mem::replace(
            &mut self.state.player.current_location,
            args.new_location.clone(),
        );
        if !self.state.world.locations_visited.contains(&args.new_location) {
            self.state
                .world
                .locations_visited
                .push(args.new_location.clone());
        }
        self.state.log_event(format!(
            "Player moved from {} to {}",
            old, args.new_location
        ));
        self.save()?;
        Ok(format!(
            "You've moved from {} to {}. {} {}",
            old, args.new_location, args.location_description, PROMPT
        )
        .into())
    }

    fn meet_npc(&mut self, args: NpcArgs) -> Result<ToolOutput> {
        self.state.world.npcs_met.push(Npc {
            name: args.npc_name.clone(),
            description: args.npc_description,
            disposition: args.disposition.clone(),
            met_at_location: self.state.player.current_location.clone(),
            met_at_turn: self.state.story_progress.turn_count,
        });
        self.state.log_event(format!(
            "Player met {} ({})",
            args.npc_name, args.disposition
        ));
        self.save()?;
        Ok(format!(
            "You've encountered {}. They seem {}. {}",
            args.npc_name, args.disposition, PROMPT
        )
        .into())
    }

    fn roll_dice(&mut self, args: DiceArgs) -> Result<ToolOutput> {
        let Some(faces) = parse_die(&args.dice_type) else {
            return Ok(format!(
                "I can't roll \"{}\". Name a die like d6 or d20. {}",
                args.dice_type, PROMPT
            )
            .into());
        };
        let roll = self.rng.random_range(1..=faces);
        self.state.log_event(format!(
            "Dice roll: {} = {} for {}",
            args.dice_type, roll, args.reason
        ));
        self.save()?;

        let outcome = if faces == 20 {
            d20_outcome(roll)
        } else {
            "Roll complete"
        };
        Ok(format!(
            "Rolling {} for {}... Result: {} ({}). {}",
            args.dice_type, args.reason, roll, outcome, PROMPT
        )
        .into())
    }

    fn check_inventory(&self) -> ToolOutput {
        let inventory = &self.state.player.inventory;
        if inventory.is_empty() {
            return format!(
                "Your inventory is empty. You carry nothing but your wits and courage. {}",
                PROMPT
            )
            .into();
        }
        let items = inventory
            .iter()
            .map(|i| format!("- {}: {}", i.name, i.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Your inventory ({} items):\n{}\n{}",
            inventory.len(),
            items,
            PROMPT
        )
        .into()
    }

    fn check_status(&self) -> ToolOutput {
        let player = &self.state.player;
        let world = &self.state.world;
        ToolOutput::Json(json!({
            "name": player.name,
            "health": player.health,
            "max_health": MAX_HEALTH,
            "location": player.current_location,
            "quest_status": player.quest_status,
            "inventory_count": player.inventory.len(),
            "locations_visited": world.locations_visited.len(),
            "npcs_met": world.npcs_met.len(),
            "turn": self.state.story_progress.turn_count,
            "prompt": PROMPT,
        }))
    }

    fn record_decision(&mut self, args: DecisionArgs) -> Result<ToolOutput> {
        self.state.story_progress.major_decisions.push(Decision {
            turn: self.state.story_progress.turn_count,
            decision: args.decision_description.clone(),
            impact: args.impact.clone(),
            location: self.state.player.current_location.clone(),
        });
        self.state.log_event(format!(
            "Major decision: {}",
            args.decision_description
        ));
        self.save()?;
        Ok(format!(
            "Decision recorded: {}. {} {}",
            args.decision_description, args.impact, PROMPT
        )
        .into())
    }

    fn advance_turn(&mut self) -> Result<ToolOutput> {
        self.state.story_progress.turn_count += 1;
        self.save()?;
        let turn = self.state.story_progress.turn_count;
        info!(turn, "Turn advanced");
        Ok(format!("Turn {}. {}", turn, PROMPT).into())
    }

    fn restart_game(&mut self) -> Result<ToolOutput> {
        self.state = GameState::default();
        self.save()?;
        info!("Game state reset");
        Ok(format!(
            "Game restarted! You stand once again at the entrance to the Dark Forest, ready for a new adventure. {}",
            PROMPT
        )
        .into())
    }
}

#[async_trait]
impl Conversation for GameMaster {
    fn demo(&self) -> &'static str {
        "game_master"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::ToolCalling
    }

    fn instructions(&self) -> String {
        INSTRUCTIONS.to_string()
    }

    async fn opening(&mut self) -> Result<String> {
        self.state.story_progress.turn_count += 1;
        self.save()?;
        info!(
            location = %self.state.player.current_location,
            health = self.state.player.health,
            "Game master ready"
        );
        Ok(OPENING_SCENE.to_string())
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
        meta.insert("health".into(), json!(self.state.player.health));
        meta.insert("location".into(), json!(self.state.player.current_location));
        meta.insert("turn".into(), json!(self.state.story_progress.turn_count));
        meta.insert("inventory".into(), json!(self.state.inventory_names()));
        meta
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(dir: &tempfile::TempDir) -> GameMaster {
        GameMaster::open(dir.path())
            .unwrap()
            .with_rng(StdRng::seed_from_u64(7))
    }

    fn reload(dir: &tempfile::TempDir) -> GameState {
        JsonDocument::<GameState>::new(dir.path().join("game_state.json"))
            .load()
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_opening_counts_as_first_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut gm = game(&dir);
        let scene = gm.opening().await.unwrap();
        assert!(scene.ends_with(PROMPT));
        assert_eq!(reload(&dir).story_progress.turn_count, 1);
    }

    #[tokio::test]
    async fn test_health_is_clamped_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut gm = game(&dir);

        let out = gm
            .call_tool(
                "update_player_health",
                json!({ "health_change": -130, "reason": "a falling tree" }),
            )
            .await
            .unwrap();
        assert_eq!(
            out.text(),
            "You take 130 damage from a falling tree! Health: 0/100. What do you do?"
        );
        gm.call_tool(
            "update_player_health",
            json!({ "health_change": 500, "reason": "a healing spring" }),
        )
        .await
        .unwrap();

        let saved = reload(&dir);
        assert_eq!(saved.player.health, 100);
        assert_eq!(saved.world.key_events.len(), 2);
    }

    #[tokio::test]
    async fn test_extreme_health_changes_saturate() {
        let dir = tempfile::tempdir().unwrap();
        let mut gm = game(&dir);

        gm.call_tool(
            "update_player_health",
            json!({ "health_change": i64::MAX, "reason": "a phoenix feather" }),
        )
        .await
        .unwrap();
        assert_eq!(gm.state().player.health, MAX_HEALTH);

        let out = gm
            .call_tool(
                "update_player_health",
                json!({ "health_change": i64::MIN, "reason": "the void" }),
            )
            .await
            .unwrap();
        assert!(out.text().contains("Health: 0/100"));
        assert_eq!(reload(&dir).player.health, 0);
    }

    #[tokio::test]
    async fn test_inventory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut gm = game(&dir);
        for (name, desc) in [("Rusty Key", "opens something"), ("Torch", "lights the way")] {
            gm.call_tool(
                "add_to_inventory",
                json!({ "item_name": name, "item_description": desc }),
            )
            .await
            .unwrap();
        }

        let out = gm
            .call_tool("remove_from_inventory", json!({ "item_name": "rusty key" }))
            .await
            .unwrap();
        assert!(out.text().starts_with("Removed rusty key"));
        let out = gm
            .call_tool("remove_from_inventory", json!({ "item_name": "Sword" }))
            .await
            .unwrap();
        assert!(out.text().contains("not found"));

        let saved = reload(&dir);
        assert_eq!(saved, *gm.state());
        assert_eq!(saved.inventory_names(), vec!["Torch"]);
        assert_eq!(saved.world.discovered_items, vec!["Rusty Key", "Torch"]);
        assert_eq!(gm.meta()["inventory"], json!(["Torch"]));
    }

    #[tokio::test]
    async fn test_locations_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let mut gm = game(&dir);
        for place in ["Ruined Watchtower", START_LOCATION, "Ruined Watchtower"] {
            gm.call_tool(
                "change_location",
                json!({ "new_location": place, "location_description": "It is quiet." }),
            )
            .await
            .unwrap();
        }
        assert_eq!(
            gm.state().world.locations_visited,
            vec![START_LOCATION, "Ruined Watchtower"]
        );
        assert_eq!(gm.state().player.current_location, "Ruined Watchtower");
    }

    #[tokio::test]
    async fn test_dice() {
        let dir = tempfile::tempdir().unwrap();
        let mut gm = game(&dir);

        let out = gm
            .call_tool("roll_dice", json!({ "dice_type": "d6", "reason": "luck" }))
            .await
            .unwrap();
        assert!(out.text().contains("(Roll complete)"));

        let out = gm
            .call_tool("roll_dice", json!({ "dice_type": "banana", "reason": "luck" }))
            .await
            .unwrap();
        assert!(out.text().starts_with("I can't roll"));

        assert_eq!(d20_outcome(20), "CRITICAL SUCCESS");
        assert_eq!(d20_outcome(15), "CRITICAL SUCCESS");
        assert_eq!(d20_outcome(10), "Success");
        assert_eq!(d20_outcome(5), "Partial Success");
        assert_eq!(d20_outcome(1), "Failure");
        assert_eq!(parse_die("D20"), Some(20));
        assert_eq!(parse_die("d0"), None);
    }

    #[tokio::test]
    async fn test_status_snapshot_and_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut gm = game(&dir);
        gm.call_tool("advance_turn", Value::Null).await.unwrap();
        gm.call_tool(
            "meet_npc",
            json!({ "npc_name": "Mira", "npc_description": "a hermit", "disposition": "wary" }),
        )
        .await
        .unwrap();

        let status = gm.call_tool("check_status", Value::Null).await.unwrap();
        let ToolOutput::Json(status) = status else {
            panic!("check_status should return JSON");
        };
        assert_eq!(status["turn"], 1);
        assert_eq!(status["npcs_met"], 1);

        gm.call_tool("restart_game", Value::Null).await.unwrap();
        assert_eq!(reload(&dir), GameState::default());
    }

    #[tokio::test]
    async fn test_resumes_saved_game() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut gm = game(&dir);
            gm.call_tool(
                "record_decision",
                json!({
                    "decision_description": "Spared the wolf",
                    "impact": "The pack remembers."
                }),
            )
            .await
            .unwrap();
            gm.shutdown().await.unwrap();
        }
        let gm = game(&dir);
        assert_eq!(gm.state().story_progress.major_decisions.len(), 1);
    }
}
