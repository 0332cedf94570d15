use time::Date;

use super::dto::{
    BeverageItem, BeveragesBlock, HydrationBlock, MealIngredient, MealItem, MealsBlock, Summary,
};
use crate::nutrition::{self, IngredientPortion};
use crate::profile::{ActivityLevel, ChangeSpeed, Goal, MealType, Sex, UserProfileSnapshot};
use crate::rotation::engine::protein_weights;

/// Mifflin-St Jeor resting energy expenditure.
pub fn bmr(sex: Sex, weight_kg: f64, height_cm: f64, age_years: i32) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age_years);
    match sex {
        Sex::M => base + 5.0,
        Sex::F => base - 161.0,
    }
}

pub fn activity_factor(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::Light => 1.3,
        ActivityLevel::Moderate => 1.45,
        ActivityLevel::High => 1.6,
        ActivityLevel::Athlete => 1.75,
    }
}

/// Daily calorie adjustment: negative deficit for fat loss, positive surplus
/// for muscle gain, zero for maintenance.
pub fn goal_adjustment(goal: Goal, speed: ChangeSpeed) -> f64 {
    match (goal, speed) {
        (Goal::Maintain, _) => 0.0,
        (Goal::LoseFat, ChangeSpeed::Slow) => -250.0,
        (Goal::LoseFat, ChangeSpeed::Default) => -400.0,
        (Goal::LoseFat, ChangeSpeed::Fast) => -550.0,
        (Goal::GainMuscle, ChangeSpeed::Slow) => 200.0,
        (Goal::GainMuscle, ChangeSpeed::Default) => 300.0,
        (Goal::GainMuscle, ChangeSpeed::Fast) => 450.0,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Summary numbers from profile arithmetic alone.
pub fn compute_summary(
    snapshot: &UserProfileSnapshot,
    protein_target_g: f64,
    today: Date,
) -> Summary {
    let tmb = bmr(
        snapshot.sex,
        snapshot.weight_kg,
        snapshot.height_cm,
        snapshot.age_years(today),
    )
    .round();
    let tdee = (tmb * activity_factor(snapshot.activity_level)).round();
    let adjustment = goal_adjustment(snapshot.goal, snapshot.change_speed);
    let kcal_objetivo = (tdee + adjustment).max(0.0).round();
    let grasas_g = round1(kcal_objetivo * 0.25 / 9.0);
    let carb_kcal = kcal_objetivo - protein_target_g * 4.0 - grasas_g * 9.0;
    Summary {
        tmb,
        tdee,
        kcal_objetivo,
        deficit_superavit_kcal: adjustment,
        // 7700 kcal per kg of body mass.
        ritmo_peso_kg_sem: round1(adjustment * 7.0 / 7700.0),
        proteinas_g: round1(protein_target_g),
        grasas_g,
        carbohidratos_g: round1((carb_kcal / 4.0).max(0.0)),
    }
}

fn preferred(snapshot: &UserProfileSnapshot, category: &str, fallback: &str) -> String {
    snapshot
        .preferred_foods
        .get(category)
        .and_then(|foods| foods.first())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

/// A plain meal for one slot, assembled from the user's saved foods and
/// sized so its protein lands near the apportioned share.
pub fn basic_meal(
    snapshot: &UserProfileSnapshot,
    meal_type: MealType,
    protein_share_g: f64,
) -> MealItem {
    let protein_food = preferred(snapshot, "proteinas", "pechuga de pollo");
    let carb_food = preferred(snapshot, "carbohidratos", "arroz");
    let veg_food = preferred(snapshot, "verduras", "ensalada");

    // Lean protein sources run ~25-31g per 100g; 3.5 g/100g covers the rest.
    let protein_grams = (protein_share_g / 0.28 * 10.0).round() / 10.0;
    let carb_grams = if meal_type.is_snack() { 40.0 } else { 120.0 };
    let veg_grams = if meal_type.is_snack() { 0.0 } else { 150.0 };

    let mut ingredientes = vec![
        MealIngredient {
            alimento: protein_food,
            gramos: protein_grams.clamp(0.0, 400.0),
        },
        MealIngredient {
            alimento: carb_food,
            gramos: carb_grams,
        },
    ];
    if veg_grams > 0.0 {
        ingredientes.push(MealIngredient {
            alimento: veg_food,
            gramos: veg_grams,
        });
    }

    let portions: Vec<IngredientPortion> = ingredientes
        .iter()
        .map(|i| IngredientPortion {
            name: i.alimento.clone(),
            grams: i.gramos,
            stored: None,
        })
        .collect();
    let macros = nutrition::engine::compute(1.0, &portions);
    let nombre = format!(
        "{} — {}",
        meal_type.label().replace('_', " "),
        ingredientes[0].alimento
    );

    MealItem {
        tipo: meal_type,
        nombre,
        porciones: 1.0,
        ingredientes,
        macros,
        proteina_objetivo_g: Some(round1(protein_share_g)),
    }
}

pub struct LocalPlan {
    pub advice: String,
    pub summary: Summary,
    pub meals: MealsBlock,
    pub hydration: HydrationBlock,
    pub beverages: BeveragesBlock,
}

/// Provider-free plan generation: pure arithmetic over the snapshot plus
/// table lookups. Terminal fallback for every failure path; cannot fail.
pub fn generate(snapshot: &UserProfileSnapshot, today: Date) -> LocalPlan {
    let protein_target = snapshot.resolved_protein_target();
    let summary = compute_summary(snapshot, protein_target, today);

    let weights = protein_weights(&snapshot.meal_types);
    let items: Vec<MealItem> = snapshot
        .meal_types
        .iter()
        .zip(weights.iter())
        .map(|(meal_type, weight)| basic_meal(snapshot, *meal_type, protein_target * weight))
        .collect();

    let hydration = HydrationBlock {
        litros: round1(snapshot.weight_kg * 0.035),
    };
    let beverages = BeveragesBlock {
        items: vec![
            BeverageItem {
                nombre: "Agua".into(),
                indicacion: format!("{} L repartidos durante el día", hydration.litros),
            },
            BeverageItem {
                nombre: "Café o té sin azúcar".into(),
                indicacion: "Hasta 2-3 tazas al día".into(),
            },
        ],
    };

    let advice = format!(
        "Plan orientativo calculado a partir de tu perfil. Tu gasto basal es de \
         {:.0} kcal y tu gasto total estimado de {:.0} kcal; el objetivo diario \
         queda en {:.0} kcal con {:.0} g de proteína. Reparte las comidas en \
         los horarios que ya tienes configurados, prioriza alimentos poco \
         procesados y bebe {:.1} L de agua al día. Ajusta las raciones según tu \
         hambre real y revisa tu peso una vez por semana.",
        summary.tmb, summary.tdee, summary.kcal_objetivo, summary.proteinas_g, hydration.litros,
    );

    LocalPlan {
        advice,
        summary,
        meals: MealsBlock {
            items,
            variants: None,
            semana: Vec::new(),
        },
        hydration,
        beverages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Weekday;
    use std::collections::BTreeMap;
    use time::macros::date;
    use uuid::Uuid;

    fn snapshot() -> UserProfileSnapshot {
        UserProfileSnapshot {
            user_id: Uuid::new_v4(),
            sex: Sex::M,
            birth_date: date!(1995 - 01 - 10),
            height_cm: 180.0,
            weight_kg: 80.0,
            goal: Goal::LoseFat,
            activity_level: ActivityLevel::Moderate,
            change_speed: ChangeSpeed::Default,
            country: "ES".into(),
            meal_types: vec![MealType::Desayuno, MealType::Almuerzo, MealType::Cena],
            diet_days: Weekday::ALL.to_vec(),
            preferred_foods: BTreeMap::new(),
            allowed_ingredient_ids: vec![],
            protein_target_g: None,
        }
    }

    #[test]
    fn reference_scenario_numbers() {
        // M, 80 kg, 180 cm, 30 years, moderate, lose_fat at default speed.
        let s = snapshot();
        let today = date!(2025 - 01 - 10);
        let summary = compute_summary(&s, s.resolved_protein_target(), today);
        assert_eq!(summary.tmb, 1780.0);
        assert_eq!(summary.tdee, 2581.0);
        assert!(summary.kcal_objetivo >= 2581.0 - 500.0);
        assert!(summary.kcal_objetivo <= 2581.0 - 350.0);
        assert!(summary.ritmo_peso_kg_sem < 0.0);
    }

    #[test]
    fn female_bmr_uses_its_own_constant() {
        assert_eq!(bmr(Sex::F, 60.0, 165.0, 30), 600.0 + 1031.25 - 150.0 - 161.0);
    }

    #[test]
    fn maintenance_has_no_adjustment_and_zero_rate() {
        let mut s = snapshot();
        s.goal = Goal::Maintain;
        let summary = compute_summary(&s, 140.0, date!(2025 - 01 - 10));
        assert_eq!(summary.deficit_superavit_kcal, 0.0);
        assert_eq!(summary.ritmo_peso_kg_sem, 0.0);
        assert_eq!(summary.kcal_objetivo, summary.tdee);
    }

    #[test]
    fn generated_meals_match_enabled_types_in_order() {
        let s = snapshot();
        let plan = generate(&s, date!(2025 - 01 - 10));
        let tipos: Vec<MealType> = plan.meals.items.iter().map(|m| m.tipo).collect();
        assert_eq!(
            tipos,
            vec![MealType::Desayuno, MealType::Almuerzo, MealType::Cena]
        );
        for meal in &plan.meals.items {
            assert!(meal.macros.kcal > 0.0);
            assert!(!meal.ingredientes.is_empty());
        }
    }

    #[test]
    fn macro_split_is_internally_consistent() {
        let s = snapshot();
        let summary = compute_summary(&s, 144.0, date!(2025 - 01 - 10));
        let kcal_from_macros =
            summary.proteinas_g * 4.0 + summary.grasas_g * 9.0 + summary.carbohidratos_g * 4.0;
        assert!((kcal_from_macros - summary.kcal_objetivo).abs() < 10.0);
    }

    #[test]
    fn hydration_tracks_body_weight() {
        let s = snapshot();
        let plan = generate(&s, date!(2025 - 01 - 10));
        assert_eq!(plan.hydration.litros, 2.8);
        assert!(!plan.beverages.items.is_empty());
        assert!(!plan.advice.is_empty());
    }
}
