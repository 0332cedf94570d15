use time::Date;

use crate::profile::{Goal, UserProfileSnapshot};

pub const SUMMARY_LABEL: &str = "JSON_SUMMARY";
pub const MEALS_LABEL: &str = "JSON_MEALS";
pub const HYDRATION_LABEL: &str = "JSON_HYDRATION";
pub const BEVERAGES_LABEL: &str = "JSON_BEVERAGES";

fn goal_phrase(goal: Goal) -> &'static str {
    match goal {
        Goal::LoseFat => "perder grasa corporal",
        Goal::Maintain => "mantener su peso",
        Goal::GainMuscle => "ganar masa muscular",
    }
}

fn profile_block(snapshot: &UserProfileSnapshot, protein_target_g: f64, today: Date) -> String {
    let meals: Vec<&str> = snapshot.meal_types.iter().map(|t| t.label()).collect();
    let foods = serde_json::to_string(&snapshot.preferred_foods).unwrap_or_else(|_| "{}".into());
    format!(
        "Perfil: sexo {:?}, {} años, {} cm, {} kg, actividad {:?}, objetivo: {}, país {}.\n\
         Comidas habilitadas, en orden: {}.\n\
         Objetivo diario de proteína: {} g (fijo, no lo cambies).\n\
         Alimentos preferidos por categoría: {}.",
        snapshot.sex,
        snapshot.age_years(today),
        snapshot.height_cm,
        snapshot.weight_kg,
        snapshot.activity_level,
        goal_phrase(snapshot.goal),
        snapshot.country,
        meals.join(", "),
        protein_target_g,
        foods,
    )
}

fn blocks_contract() -> String {
    format!(
        "Tras el texto, emite exactamente estos bloques, cada uno como \
         `ETIQUETA:` seguida de un objeto JSON:\n\
         {SUMMARY_LABEL}: {{tmb, tdee, kcal_objetivo, deficit_superavit_kcal, \
         ritmo_peso_kg_sem, proteinas_g, grasas_g, carbohidratos_g}}\n\
         {MEALS_LABEL}: {{\"items\": [{{\"tipo\", \"nombre\", \"porciones\", \
         \"ingredientes\": [{{\"alimento\", \"gramos\"}}]}}]}}\n\
         {HYDRATION_LABEL}: {{\"litros\"}}\n\
         {BEVERAGES_LABEL}: {{\"items\": [{{\"nombre\", \"indicacion\"}}]}}"
    )
}

/// Full prompt: narrative advice plus all structured blocks.
pub fn full_prompt(snapshot: &UserProfileSnapshot, protein_target_g: f64, today: Date) -> String {
    format!(
        "Eres un nutricionista. Redacta un plan de alimentación personalizado \
         en español: consejos prácticos, estructura de comidas y raciones.\n\
         {}\n{}",
        profile_block(snapshot, protein_target_g, today),
        blocks_contract(),
    )
}

/// Reduced prompt for the last provider tier: structured blocks only.
pub fn reduced_prompt(
    snapshot: &UserProfileSnapshot,
    protein_target_g: f64,
    today: Date,
) -> String {
    format!(
        "Responde SOLO con JSON conciso, sin prosa.\n{}\n{}",
        profile_block(snapshot, protein_target_g, today),
        blocks_contract(),
    )
}

/// Booster instructions appended when a first pass came back short and the
/// caller asked for a complete plan.
pub fn booster_prompt(snapshot: &UserProfileSnapshot, protein_target_g: f64, today: Date) -> String {
    format!(
        "{}\nIMPORTANTE: la respuesta anterior quedó incompleta. Escribe el \
         plan narrativo completo (mínimo 300 palabras) y TODOS los bloques \
         JSON, sin omitir ninguno.",
        full_prompt(snapshot, protein_target_g, today),
    )
}
