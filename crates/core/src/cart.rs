use crate::catalog::{CatalogEntry, MatchPolicy, SubstringMatch};
use serde::{Deserialize, Serialize};

/// One line of a cart, unique per catalog id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl CartLine {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Why a quantity change was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantityRejection {
    NotPositive(i64),
    NotInCart(String),
    /// The line would exceed [`MAX_LINE_QUANTITY`].
    TooMany(u32),
}

/// Rounds a currency amount to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Session-scoped shopping cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds `quantity` of `entry`. Re-adding an item bumps its quantity.
    ///
    /// The cart is left untouched when the line would go past
    /// [`MAX_LINE_QUANTITY`].
    pub fn add(
        &mut self,
        entry: &CatalogEntry,
        quantity: u32,
    ) -> Result<&CartLine, QuantityRejection> {
        if quantity == 0 {
            return Err(QuantityRejection::NotPositive(0));
        }
        let existing = self.lines.iter().position(|l| l.id == entry.id);
        let current = existing.map_or(0, |idx| self.lines[idx].quantity);
        let wanted = current
            .checked_add(quantity)
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(QuantityRejection::TooMany(MAX_LINE_QUANTITY))?;
        let idx = match existing {
            Some(idx) => {
                self.lines[idx].quantity = wanted;
                idx
            }
            None => {
                self.lines.push(CartLine {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    quantity,
                    unit_price: entry.price,
                });
                self.lines.len() - 1
            }
        };
        Ok(&self.lines[idx])
    }

    fn find(&self, query: &str) -> Option<usize> {
        let names: Vec<&str> = self.lines.iter().map(|l| l.name.as_str()).collect();
        SubstringMatch.select(query, &names)
    }

    /// Removes the first line matching `query`, whatever its quantity.
    pub fn remove(&mut self, query: &str) -> Option<CartLine> {
        self.find(query).map(|idx| self.lines.remove(idx))
    }

    /// Sets the quantity of the first line matching `query`.
    pub fn update_quantity(
        &mut self,
        query: &str,
        quantity: i64,
    ) -> Result<&CartLine, QuantityRejection> {
        if quantity <= 0 {
            return Err(QuantityRejection::NotPositive(quantity));
        }
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(QuantityRejection::TooMany(MAX_LINE_QUANTITY))?;
        let idx = self
            .find(query)
            .ok_or_else(|| QuantityRejection::NotInCart(query.to_string()))?;
        self.lines[idx].quantity = quantity;
        Ok(&self.lines[idx])
    }

    /// Exact sum of unit price × quantity, rounded to 2 decimals.
    pub fn total(&self) -> f64 {
        round_cents(self.lines.iter().fold(0.0, |acc, l| acc + l.subtotal()))
    }

    /// Line-itemized rendering with a total.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&format!(
                "- {} x {} @ ${:.2} = ${:.2}\n",
                line.quantity,
                line.name,
                line.unit_price,
                round_cents(line.subtotal())
            ));
        }
        out.push_str(&format!("Total: ${:.2}", self.total()));
        out
    }

    /// Empties the cart and hands back its lines.
    pub fn take(&mut self) -> Vec<CartLine> {
        std::mem::take(&mut self.lines)
    }
}
