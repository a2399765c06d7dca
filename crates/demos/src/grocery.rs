//! Grocery ordering assistant.
//!
//! Items come from `catalog.json`, recipes from `recipes.json`; placed
//! orders are appended to `orders.json`.

use async_trait::async_trait;
use chrono::Local;
use parley_core::Result;
use parley_core::cart::{Cart, CartLine, MAX_LINE_QUANTITY, QuantityRejection};
use parley_core::catalog::{Catalog, CatalogEntry, Named};
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::store::JsonLog;
use parley_core::tools::{NoArgs, ToolDefinition, ToolOutput, ToolRegistry};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const HISTORY_LIMIT: usize = 3;

const INSTRUCTIONS: &str = "You are a friendly grocery ordering assistant for a neighbourhood store. \
Help the customer build a cart from the store catalog using the tools. Quantities must be positive whole numbers.
When the customer asks for ingredients for a dish, call add_recipe first. If the recipe is unknown, use your \
own knowledge to decide the ingredients and add them one by one with add_to_cart, then offer to save the recipe \
with save_recipe. Read the cart back with show_cart before placing the order, and ask for the customer's name \
for the order. Keep replies short and conversational.";

/// A named list of ingredients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<String>,
}

impl Named for Recipe {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A placed order as written to `orders.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub customer_name: Option<String>,
    pub items: Vec<CartLine>,
    pub total: f64,
    pub placed_at: String,
    pub status: String,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddToCartArgs {
    /// Item name as the customer said it.
    pub item: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveArgs {
    pub item: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateQuantityArgs {
    pub item: String,
    /// New quantity; must be greater than zero.
    pub quantity: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddRecipeArgs {
    pub recipe: String,
    #[serde(default = "one")]
    pub servings: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlaceOrderArgs {
    #[serde(default)]
    pub customer_name: Option<String>,
}

pub struct GroceryAssistant {
    catalog: Catalog<CatalogEntry>,
    recipes: Catalog<Recipe>,
    cart: Cart,
    orders: JsonLog<OrderRecord>,
    last_order: Option<String>,
    tools: Arc<ToolRegistry<GroceryAssistant>>,
}

impl GroceryAssistant {
    pub fn new(
        catalog: Catalog<CatalogEntry>,
        recipes: Catalog<Recipe>,
        orders: JsonLog<OrderRecord>,
    ) -> Self {
        Self {
            catalog,
            recipes,
            cart: Cart::new(),
            orders,
            last_order: None,
            tools: Arc::new(Self::registry()),
        }
    }

    /// Loads the catalog and recipe book. Either file missing is fatal.
    pub fn open(content_dir: &Path, data_dir: &Path) -> Result<Self> {
        let catalog = Catalog::load(content_dir.join("catalog.json"))?;
        let recipes = Catalog::load(content_dir.join("recipes.json"))?;
        let orders = JsonLog::new(data_dir.join("orders.json"));
        Ok(Self::new(catalog, recipes, orders))
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub(crate) fn registry() -> ToolRegistry<Self> {
        ToolRegistry::new()
            .register(
                "add_to_cart",
                "Add a catalog item to the cart.",
                |g: &mut GroceryAssistant, a: AddToCartArgs| {
                    Box::pin(async move { Ok(g.add_to_cart(a)) })
                },
            )
            .register(
                "remove_from_cart",
                "Remove an item from the cart entirely.",
                |g: &mut GroceryAssistant, a: RemoveArgs| {
                    Box::pin(async move { Ok(g.remove_from_cart(a)) })
                },
            )
            .register(
                "update_quantity",
                "Change the quantity of an item already in the cart.",
                |g: &mut GroceryAssistant, a: UpdateQuantityArgs| {
                    Box::pin(async move { Ok(g.update_quantity(a)) })
                },
            )
            .register(
                "show_cart",
                "Read back the cart contents and total.",
                |g: &mut GroceryAssistant, _: NoArgs| Box::pin(async move { Ok(g.show_cart()) }),
            )
            .register(
                "add_recipe",
                "Add every catalog ingredient of a known recipe to the cart.",
                |g: &mut GroceryAssistant, a: AddRecipeArgs| {
                    Box::pin(async move { Ok(g.add_recipe(a)) })
                },
            )
            .register(
                "save_recipe",
                "Save a new recipe to the recipe book.",
                |g: &mut GroceryAssistant, a: Recipe| Box::pin(async move { g.save_recipe(a) }),
            )
            .register(
                "place_order",
                "Place the order for everything in the cart.",
                |g: &mut GroceryAssistant, a: PlaceOrderArgs| {
                    Box::pin(async move { g.place_order(a) })
                },
            )
            .register(
                "order_history",
                "Summarize the most recent orders.",
                |g: &mut GroceryAssistant, _: NoArgs| Box::pin(async move { g.order_history() }),
            )
    }

    fn add_to_cart(&mut self, args: AddToCartArgs) -> ToolOutput {
        if args.quantity <= 0 {
            return format!(
                "I can only add a positive quantity, and {} isn't one. How many would you like?",
                args.quantity
            )
            .into();
        }
        let Some(entry) = self.catalog.lookup(&args.item) else {
            return format!(
                "Sorry, I couldn't find {} in our catalog. Would you like something else?",
                args.item
            )
            .into();
        };
        let quantity = u32::try_from(args.quantity).unwrap_or(u32::MAX);
        match self.cart.add(entry, quantity) {
            Ok(line) => {
                info!(item = %line.name, quantity = line.quantity, "Added to cart");
                format!(
                    "Added {} x {} to your cart. You now have {} of them. Anything else?",
                    quantity, line.name, line.quantity
                )
                .into()
            }
            Err(_) => format!(
                "I can only put up to {} of {} in one order. How many would you like?",
                MAX_LINE_QUANTITY, entry.name
            )
            .into(),
        }
    }

    fn remove_from_cart(&mut self, args: RemoveArgs) -> ToolOutput {
        match self.cart.remove(&args.item) {
            Some(line) => format!(
                "Removed {} from your cart. Anything else?",
                line.name
            )
            .into(),
            None => format!(
                "{} isn't in your cart. Would you like to hear what is?",
                args.item
            )
            .into(),
        }
    }

    fn update_quantity(&mut self, args: UpdateQuantityArgs) -> ToolOutput {
        match self.cart.update_quantity(&args.item, args.quantity) {
            Ok(line) => format!(
                "Updated {} to {}. Anything else?",
                line.name, line.quantity
            )
            .into(),
            Err(QuantityRejection::NotPositive(q)) => format!(
                "The quantity has to be at least 1, not {}. If you want it gone, I can remove it instead.",
                q
            )
            .into(),
            Err(QuantityRejection::NotInCart(item)) => format!(
                "{} isn't in your cart yet. Should I add it?",
                item
            )
            .into(),
            Err(QuantityRejection::TooMany(max)) => format!(
                "I can only put up to {} of one item in an order. What quantity should I use?",
                max
            )
            .into(),
        }
    }

    fn show_cart(&self) -> ToolOutput {
        if self.cart.is_empty() {
            return "Your cart is empty. What would you like to add?".into();
        }
        format!(
            "Here's your cart:\n{}\nWould you like to place the order?",
            self.cart.render()
        )
        .into()
    }

    fn add_recipe(&mut self, args: AddRecipeArgs) -> ToolOutput {
        let Ok(servings) = u32::try_from(args.servings.max(1)) else {
            return "How many servings would you like?".into();
        };
        let Some(recipe) = self.recipes.lookup(&args.recipe) else {
            return format!(
                "I don't have a recipe for {} yet. Tell me what goes in it and I'll add the items.",
                args.recipe
            )
            .into();
        };

        let mut added = Vec::new();
        let mut missing = Vec::new();
        let mut capped = Vec::new();
        for ingredient in &recipe.ingredients {
            match self.catalog.lookup(ingredient) {
                Some(entry) => match self.cart.add(entry, servings) {
                    Ok(_) => added.push(entry.name.clone()),
                    Err(_) => capped.push(entry.name.clone()),
                },
                None => missing.push(ingredient.clone()),
            }
        }
        info!(recipe = %recipe.name, added = added.len(), missing = missing.len(), "Recipe added");

        let mut text = if !capped.is_empty() && added.is_empty() {
            format!("I couldn't add anything for {}.", recipe.name)
        } else if added.is_empty() {
            format!("None of the ingredients for {} are in stock.", recipe.name)
        } else {
            format!(
                "For {} I added {} to your cart.",
                recipe.name,
                added.join(", ")
            )
        };
        if !missing.is_empty() {
            text.push_str(&format!(" We don't carry {}.", missing.join(", ")));
        }
        if !capped.is_empty() {
            text.push_str(&format!(
                " I couldn't add more {}, since one order holds at most {} of an item.",
                capped.join(", "),
                MAX_LINE_QUANTITY
            ));
        }
        text.push_str(" Anything else?");
        text.into()
    }

    fn save_recipe(&mut self, recipe: Recipe) -> Result<ToolOutput> {
        let ingredients: Vec<String> = recipe
            .ingredients
            .iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if recipe.name.trim().is_empty() || ingredients.is_empty() {
            return Ok("A recipe needs a name and at least one ingredient. What should I save?".into());
        }
        let name = recipe.name.trim().to_string();
        let count = ingredients.len();
        self.recipes.append(Recipe {
            name: name.clone(),
            ingredients,
        })?;
        info!(recipe = %name, count, "Recipe saved");
        Ok(format!(
            "Saved {} with {} ingredients. Want me to add them to your cart?",
            name, count
        )
        .into())
    }

    fn place_order(&mut self, args: PlaceOrderArgs) -> Result<ToolOutput> {
        if self.cart.is_empty() {
            return Ok("Your cart is empty, so there's nothing to order yet. What would you like?".into());
        }
        let now = Local::now();
        let total = self.cart.total();
        let record = OrderRecord {
            id: crate::order_id(now),
            customer_name: args
                .customer_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            items: self.cart.take(),
            total,
            placed_at: now.to_rfc3339(),
            status: "placed".to_string(),
        };
        let id = record.id.clone();
        self.orders.append(record)?;
        info!(order_id = %id, total, "Order placed");
        self.last_order = Some(id.clone());
        Ok(format!(
            "Your order {} is placed. The total is ${:.2}. Is there anything else I can help with?",
            id, total
        )
        .into())
    }

    fn order_history(&self) -> Result<ToolOutput> {
        let orders = self.orders.load_all()?;
        if orders.is_empty() {
            return Ok("You haven't placed any orders yet. Shall we start one?".into());
        }
        let recent = orders
            .iter()
            .rev()
            .take(HISTORY_LIMIT)
            .map(|o| {
                format!(
                    "{} with {} items for ${:.2}",
                    o.id,
                    o.items.iter().map(|l| u64::from(l.quantity)).sum::<u64>(),
                    o.total
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        Ok(format!("Your recent orders: {}. Anything else?", recent).into())
    }
}

#[async_trait]
impl Conversation for GroceryAssistant {
    fn demo(&self) -> &'static str {
        "grocery"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::ToolCalling
    }

    fn instructions(&self) -> String {
        let categories: Vec<&str> = {
            let mut seen: Vec<&str> = Vec::new();
            for entry in self.catalog.all() {
                if !seen.contains(&entry.category.as_str()) {
                    seen.push(&entry.category);
                }
            }
            seen
        };
        format!("{}\nThe store carries: {}.", INSTRUCTIONS, categories.join(", "))
    }

    async fn opening(&mut self) -> Result<String> {
        Ok("Hi! I can help you order groceries or get everything you need for a recipe. \
            What can I get you today?"
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
        meta.insert("cart_items".into(), json!(self.cart.lines().len()));
        meta.insert("cart_total".into(), json!(self.cart.total()));
        if let Some(id) = &self.last_order {
            meta.insert("last_order".into(), json!(id));
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_content(dir: &Path) {
        fs::write(
            dir.join("catalog.json"),
            r#"[
                {"id": "bread-1", "name": "Whole Wheat Bread", "category": "bakery", "price": 3.49},
                {"id": "pb-1", "name": "Peanut Butter", "category": "pantry", "price": 4.99},
                {"id": "jam-1", "name": "Strawberry Jam", "category": "pantry", "price": 3.75},
                {"id": "milk-1", "name": "Whole Milk", "category": "dairy", "price": 2.49}
            ]"#,
        )
        .unwrap();
        fs::write(
            dir.join("recipes.json"),
            r#"[{"name": "peanut butter sandwich", "ingredients": ["bread", "peanut butter", "jelly"]}]"#,
        )
        .unwrap();
    }

    fn assistant(dir: &tempfile::TempDir) -> GroceryAssistant {
        write_content(dir.path());
        GroceryAssistant::open(dir.path(), &dir.path().join("data")).unwrap()
    }

    fn orders(dir: &tempfile::TempDir) -> Vec<OrderRecord> {
        JsonLog::<OrderRecord>::new(dir.path().join("data/orders.json"))
            .load_all()
            .unwrap()
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GroceryAssistant::open(dir.path(), dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_readding_increments_and_remove_drops_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = assistant(&dir);
        g.call_tool("add_to_cart", json!({ "item": "milk" })).await.unwrap();
        let out = g
            .call_tool("add_to_cart", json!({ "item": "MILK", "quantity": 2 }))
            .await
            .unwrap();
        assert!(out.text().contains("You now have 3"));
        assert_eq!(g.cart().lines().len(), 1);

        g.call_tool("remove_from_cart", json!({ "item": "milk" }))
            .await
            .unwrap();
        assert!(g.cart().is_empty());

        let out = g
            .call_tool("remove_from_cart", json!({ "item": "milk" }))
            .await
            .unwrap();
        assert!(out.text().contains("isn't in your cart"));
    }

    #[tokio::test]
    async fn test_non_positive_quantity_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = assistant(&dir);
        g.call_tool("add_to_cart", json!({ "item": "jam", "quantity": 2 }))
            .await
            .unwrap();
        for bad in [0, -4] {
            let out = g
                .call_tool("update_quantity", json!({ "item": "jam", "quantity": bad }))
                .await
                .unwrap();
            assert!(out.text().contains("at least 1"));
        }
        assert_eq!(g.cart().lines()[0].quantity, 2);

        let out = g
            .call_tool("add_to_cart", json!({ "item": "jam", "quantity": -1 }))
            .await
            .unwrap();
        assert!(out.text().contains("positive quantity"));
    }

    #[tokio::test]
    async fn test_huge_quantities_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = assistant(&dir);
        let out = g
            .call_tool("add_to_cart", json!({ "item": "milk", "quantity": 4294967295u64 }))
            .await
            .unwrap();
        assert!(out.text().contains("up to 999"));
        assert!(g.cart().is_empty());

        g.call_tool("add_to_cart", json!({ "item": "milk", "quantity": 998 }))
            .await
            .unwrap();
        let out = g
            .call_tool("add_to_cart", json!({ "item": "milk", "quantity": 2 }))
            .await
            .unwrap();
        assert!(out.text().contains("up to 999"));
        assert_eq!(g.cart().lines()[0].quantity, 998);

        let out = g
            .call_tool("update_quantity", json!({ "item": "milk", "quantity": i64::MAX }))
            .await
            .unwrap();
        assert!(out.text().contains("up to 999"));

        let args = json!({ "recipe": "peanut butter sandwich", "servings": 5000 });
        let out = g
            .call_tool("add_recipe", args)
            .await
            .unwrap();
        assert!(out.text().contains("I couldn't add more Whole Wheat Bread, Peanut Butter"));
        assert_eq!(g.cart().lines().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_checkout_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = assistant(&dir);
        let out = g.call_tool("place_order", json!({})).await.unwrap();
        assert!(out.text().contains("cart is empty"));
        assert!(!dir.path().join("data/orders.json").exists());
    }

    #[tokio::test]
    async fn test_checkout_totals_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = assistant(&dir);
        g.call_tool("add_to_cart", json!({ "item": "bread", "quantity": 2 }))
            .await
            .unwrap();
        g.call_tool("add_to_cart", json!({ "item": "peanut", "quantity": 1 }))
            .await
            .unwrap();

        let out = g
            .call_tool("place_order", json!({ "customer_name": " Asha " }))
            .await
            .unwrap();
        assert!(out.text().contains("$11.97"));
        assert!(g.cart().is_empty());

        let saved = orders(&dir);
        assert_eq!(saved.len(), 1);
        assert!(saved[0].id.starts_with("ORD-"));
        assert_eq!(saved[0].total, 11.97);
        assert_eq!(saved[0].customer_name.as_deref(), Some("Asha"));
        assert_eq!(saved[0].items[0].name, "Whole Wheat Bread");
        assert_eq!(saved[0].status, "placed");

        let out = g.call_tool("order_history", Value::Null).await.unwrap();
        assert!(out.text().contains(&saved[0].id));
    }

    #[tokio::test]
    async fn test_recipe_adds_found_ingredients() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = assistant(&dir);
        let out = g
            .call_tool(
                "add_recipe",
                json!({ "recipe": "Peanut Butter Sandwich", "servings": 2 }),
            )
            .await
            .unwrap();
        assert!(out.text().contains("We don't carry jelly"));
        let quantities: Vec<u32> = g.cart().lines().iter().map(|l| l.quantity).collect();
        assert_eq!(quantities, vec![2, 2]);

        let out = g
            .call_tool("add_recipe", json!({ "recipe": "lasagna" }))
            .await
            .unwrap();
        assert!(out.text().contains("don't have a recipe"));
    }

    #[tokio::test]
    async fn test_saved_recipe_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = assistant(&dir);
        g.call_tool(
            "save_recipe",
            json!({ "name": "cereal", "ingredients": ["milk", " granola "] }),
        )
        .await
        .unwrap();

        let reloaded: Catalog<Recipe> = Catalog::load(dir.path().join("recipes.json")).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.lookup("cereal").unwrap().ingredients,
            vec!["milk", "granola"]
        );
    }
}
