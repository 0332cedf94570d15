use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::nutrition::heuristics::{classify, FoodCategory};
use crate::nutrition::{self, IngredientPortion};
use crate::plans::dto::MealItem;

fn category_key(cat: FoodCategory) -> Option<&'static str> {
    match cat {
        FoodCategory::Protein => Some("proteinas"),
        FoodCategory::Carb => Some("carbohidratos"),
        FoodCategory::Fat => Some("grasas"),
        FoodCategory::Produce => Some("verduras"),
        FoodCategory::Other => None,
    }
}

/// Swap candidates for one ingredient: same-category foods from the user's
/// preferences first, then same-category ingredients of sibling meals of the
/// same type. The ingredient itself is never a candidate.
fn substitutes_for(
    name: &str,
    preferred_foods: &BTreeMap<String, Vec<String>>,
    siblings: &[MealItem],
) -> Vec<String> {
    let cat = classify(name);
    let mut out: Vec<String> = Vec::new();
    if let Some(key) = category_key(cat) {
        if let Some(foods) = preferred_foods.get(key) {
            out.extend(foods.iter().cloned());
        }
    }
    for meal in siblings {
        for ing in &meal.ingredientes {
            if classify(&ing.alimento) == cat {
                out.push(ing.alimento.clone());
            }
        }
    }
    out.retain(|s| !s.eq_ignore_ascii_case(name));
    out.dedup();
    out
}

fn rename_from_ingredients(meal: &MealItem) -> String {
    let mut names: Vec<&str> = meal
        .ingredientes
        .iter()
        .map(|i| i.alimento.as_str())
        .collect();
    names.truncate(3);
    match names.len() {
        0 => meal.nombre.clone(),
        1 => capitalize(names[0]),
        2 => format!("{} con {}", capitalize(names[0]), names[1]),
        _ => format!("{} con {} y {}", capitalize(names[0]), names[1], names[2]),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Synthesize extra variants of `base` by rotating category-matched
/// ingredient substitutions, until `needed` distinct meals exist (base
/// included). Used when a provider or catalog pool is smaller than the
/// rotation groups require. Falls short only when no substitutes exist.
pub fn synthesize_variants(
    base: &MealItem,
    siblings: &[MealItem],
    preferred_foods: &BTreeMap<String, Vec<String>>,
    needed: usize,
    seed: u64,
) -> Vec<MealItem> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut variants: Vec<MealItem> = vec![base.clone()];

    for round in 1..needed.max(1) {
        let mut variant = base.clone();
        let mut changed = false;
        for ing in variant.ingredientes.iter_mut() {
            let mut subs = substitutes_for(&ing.alimento, preferred_foods, siblings);
            if subs.is_empty() {
                continue;
            }
            subs.shuffle(&mut rng);
            // Rotate through the substitute list so successive variants
            // differ from each other, not only from the base.
            let pick = subs[(round - 1) % subs.len()].clone();
            ing.alimento = pick;
            changed = true;
        }
        if !changed {
            break;
        }
        let portions: Vec<IngredientPortion> = variant
            .ingredientes
            .iter()
            .map(|i| IngredientPortion {
                name: i.alimento.clone(),
                grams: i.gramos,
                stored: None,
            })
            .collect();
        variant.macros = nutrition::engine::compute(variant.porciones, &portions);
        variant.nombre = rename_from_ingredients(&variant);
        if variants.iter().any(|v| v.nombre == variant.nombre) {
            continue;
        }
        variants.push(variant);
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::dto::MealIngredient;
    use crate::profile::MealType;

    fn meal(name: &str, ingredients: &[(&str, f64)]) -> MealItem {
        MealItem {
            tipo: MealType::Almuerzo,
            nombre: name.into(),
            porciones: 1.0,
            ingredientes: ingredients
                .iter()
                .map(|(n, g)| MealIngredient {
                    alimento: (*n).into(),
                    gramos: *g,
                })
                .collect(),
            macros: Default::default(),
            proteina_objetivo_g: None,
        }
    }

    fn prefs() -> BTreeMap<String, Vec<String>> {
        let mut m = BTreeMap::new();
        m.insert(
            "proteinas".to_string(),
            vec!["salmón".to_string(), "ternera".to_string()],
        );
        m.insert("carbohidratos".to_string(), vec!["quinoa".to_string()]);
        m
    }

    #[test]
    fn substitution_stays_within_category() {
        let base = meal("Pollo con arroz", &[("pollo", 150.0), ("arroz", 100.0)]);
        let variants = synthesize_variants(&base, &[], &prefs(), 3, 7);
        assert!(variants.len() >= 2);
        for v in &variants[1..] {
            let protein = &v.ingredientes[0].alimento;
            assert!(
                ["salmón", "ternera"].contains(&protein.as_str()),
                "unexpected protein swap: {protein}"
            );
            assert_eq!(v.ingredientes[1].alimento, "quinoa");
        }
    }

    #[test]
    fn synthesized_variants_get_recomputed_macros_and_names() {
        let base = meal("Pollo con arroz", &[("pollo", 150.0), ("arroz", 100.0)]);
        let variants = synthesize_variants(&base, &[], &prefs(), 2, 1);
        let v = &variants[1];
        assert_ne!(v.nombre, base.nombre);
        assert!(v.nombre.to_lowercase().contains("con"));
        assert!(v.macros.kcal > 0.0);
    }

    #[test]
    fn no_substitutes_means_no_extra_variants() {
        let base = meal("Misterio", &[("xylotl", 100.0)]);
        let variants = synthesize_variants(&base, &[], &BTreeMap::new(), 4, 9);
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn sibling_ingredients_feed_the_substitute_pool() {
        let base = meal("Pollo solo", &[("pollo", 150.0)]);
        let sibling = meal("Atún plancha", &[("atún", 140.0)]);
        let variants =
            synthesize_variants(&base, std::slice::from_ref(&sibling), &BTreeMap::new(), 2, 3);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[1].ingredientes[0].alimento, "atún");
    }
}
