// Shopping list: every ingredient across the viewer's cart, amounts summed per ingredient

use sqlx::FromRow;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::{
    database::RecipeDatabase,
    error::AppResult,
    infrastructure::ViewerContext,
    models::IngredientId,
};

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
struct CartLine {
    ingredient_id: IngredientId,
    name: String,
    measurement_unit: String,
    amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingList {
    pub recipes: Vec<String>,
    pub items: Vec<ShoppingItem>,
}

impl ShoppingList {
    /// Group lines by ingredient and sum their amounts; items come out ordered by name then unit
    pub fn aggregate<I>(recipes: Vec<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = (IngredientId, String, String, i64)>,
    {
        let mut totals: HashMap<IngredientId, ShoppingItem> = HashMap::new();
        for (ingredient_id, name, measurement_unit, amount) in lines {
            totals
                .entry(ingredient_id)
                .and_modify(|item| item.total_amount += amount)
                .or_insert(ShoppingItem {
                    ingredient_id,
                    name,
                    measurement_unit,
                    total_amount: amount,
                });
        }

        let mut items: Vec<ShoppingItem> = totals.into_values().collect();
        items.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
                .then_with(|| a.ingredient_id.cmp(&b.ingredient_id))
        });

        Self { recipes, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Plain-text download body:
    ///
    /// ```text
    /// Shopping list
    /// Recipes: Borscht, Pancakes
    ///
    /// Salt (g) — 15
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::from("Shopping list\n");
        if self.recipes.is_empty() {
            return out;
        }

        let _ = writeln!(out, "Recipes: {}", self.recipes.join(", "));
        out.push('\n');
        for item in &self.items {
            let _ = writeln!(
                out,
                "{} ({}) — {}",
                item.name, item.measurement_unit, item.total_amount
            );
        }
        out
    }
}

#[derive(Clone)]
pub struct ShoppingListService {
    db: Arc<RecipeDatabase>,
}

impl ShoppingListService {
    pub fn new(db: Arc<RecipeDatabase>) -> Self {
        Self { db }
    }

    pub async fn build(&self, vc: &ViewerContext) -> AppResult<ShoppingList> {
        let user_id = vc.require_user()?;
        let pool = &self.db.pool;

        let recipes: Vec<String> = sqlx::query_scalar(
            "SELECT r.name FROM shopping_cart c JOIN recipes r ON r.id = c.recipe_id
             WHERE c.user_id = ? ORDER BY r.name, r.id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let lines = sqlx::query_as::<_, CartLine>(
            "SELECT i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
             FROM shopping_cart c
             JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
             JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE c.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let list = ShoppingList::aggregate(
            recipes,
            lines
                .into_iter()
                .map(|l| (l.ingredient_id, l.name, l.measurement_unit, l.amount)),
        );

        tracing::info!(
            user_id,
            recipes = list.recipes.len(),
            items = list.items.len(),
            "built shopping list"
        );
        Ok(list)
    }
}
