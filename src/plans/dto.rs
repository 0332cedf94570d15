use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::nutrition::MacroTotals;
use crate::profile::{MealType, Weekday};

/// Energy/macro summary block. Spanish field names are the wire contract the
/// clients already speak.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub tmb: f64,
    pub tdee: f64,
    pub kcal_objetivo: f64,
    pub deficit_superavit_kcal: f64,
    pub ritmo_peso_kg_sem: f64,
    pub proteinas_g: f64,
    pub grasas_g: f64,
    pub carbohidratos_g: f64,
}

impl Summary {
    /// Negative targets from a confused model are clamped; the signed fields
    /// (deficit/surplus, weekly rate) keep their sign.
    pub fn sanitize(&mut self) {
        self.tmb = self.tmb.max(0.0);
        self.tdee = self.tdee.max(0.0);
        self.kcal_objetivo = self.kcal_objetivo.max(0.0);
        self.proteinas_g = self.proteinas_g.max(0.0);
        self.grasas_g = self.grasas_g.max(0.0);
        self.carbohidratos_g = self.carbohidratos_g.max(0.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealIngredient {
    pub alimento: String,
    pub gramos: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealItem {
    pub tipo: MealType,
    pub nombre: String,
    pub porciones: f64,
    pub ingredientes: Vec<MealIngredient>,
    #[serde(default)]
    pub macros: MacroTotals,
    /// Protein share apportioned from the daily target; only the weekly
    /// rotation fills this in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proteina_objetivo_g: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub day: Weekday,
    pub active: bool,
    pub meals: Vec<MealItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealsBlock {
    pub items: Vec<MealItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<BTreeMap<String, Vec<MealItem>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semana: Vec<WeeklyScheduleEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationBlock {
    pub litros: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeverageItem {
    pub nombre: String,
    pub indicacion: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeveragesBlock {
    pub items: Vec<BeverageItem>,
}

/// What the cache persists per user. `hash` ties the entry to the profile
/// state it was generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPlan {
    pub advice: String,
    pub summary: Summary,
    pub meals: MealsBlock,
    pub hydration: HydrationBlock,
    pub beverages: BeveragesBlock,
    pub hash: String,
    pub model: String,
    pub generated_ms: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    pub force_long: bool,
    pub ensure_full: bool,
    pub invalidate: bool,
    pub prefetch: bool,
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub advice: String,
    pub summary: Summary,
    pub meals: MealsBlock,
    pub hydration: HydrationBlock,
    pub beverages: BeveragesBlock,
    pub model: String,
    pub took_ms: i64,
    pub fallback: bool,
}

impl PlanResponse {
    pub fn from_cached(plan: CachedPlan, took_ms: i64) -> Self {
        let fallback = plan.model.starts_with("local");
        Self {
            advice: plan.advice,
            summary: plan.summary,
            meals: plan.meals,
            hydration: plan.hydration,
            beverages: plan.beverages,
            model: plan.model,
            took_ms,
            fallback,
        }
    }
}

/// Service-level outcome of a generate call; handlers map this onto HTTP.
#[derive(Debug)]
pub enum GenerateOutcome {
    Plan(PlanResponse),
    Started,
    Pending,
}
