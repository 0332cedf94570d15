mod catalog;
pub mod engine;
pub mod variants;

pub use catalog::{CandidateIngredient, PgRecipeCatalog, RecipeCandidate, RecipeCatalog};
pub use engine::{build_week, WeekInputs};
