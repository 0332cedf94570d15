pub mod engine;
mod facts;
pub mod heuristics;

pub use engine::{IngredientPortion, MacroTotals, Per100g};
pub use facts::{NutritionFactsStore, PgNutritionFactsStore};
