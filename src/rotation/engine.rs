use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::catalog::RecipeCandidate;
use crate::nutrition::{self, IngredientPortion};
use crate::plans::dto::{MealIngredient, MealItem, WeeklyScheduleEntry};
use crate::profile::{MealType, Weekday};

/// Seed derivation is load-bearing: the same (user, meal type, ISO week)
/// must shuffle identically across processes and releases.
pub fn rotation_seed(user_id: Uuid, meal_type: MealType, iso_week: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(meal_type.label().as_bytes());
    hasher.update(b"|");
    hasher.update(iso_week.to_string().as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().expect("sha256 yields 32 bytes"))
}

/// Seeded permutation of the ranked pool, deduplicated by recipe id, capped
/// at the 7 distinct entries a week can use.
pub fn shuffled_pool(mut pool: Vec<RecipeCandidate>, seed: u64) -> Vec<RecipeCandidate> {
    let mut rng = StdRng::seed_from_u64(seed);
    pool.shuffle(&mut rng);
    let mut seen: Vec<Uuid> = Vec::new();
    pool.retain(|c| {
        if seen.contains(&c.id) {
            false
        } else {
            seen.push(c.id);
            true
        }
    });
    pool.truncate(7);
    pool
}

/// Pool index per rotation group 0..=3. Groups 0-2 wrap by pool size; Sunday
/// prefers any entry the other groups did not take before wrapping.
pub fn variant_indices(pool_len: usize) -> [usize; 4] {
    if pool_len == 0 {
        return [0; 4];
    }
    let g0 = 0 % pool_len;
    let g1 = 1 % pool_len;
    let g2 = 2 % pool_len;
    let mut g3 = 3 % pool_len;
    if pool_len < 4 {
        if let Some(unused) = (0..pool_len).find(|i| *i != g0 && *i != g1 && *i != g2) {
            g3 = unused;
        }
    }
    [g0, g1, g2, g3]
}

fn candidate_to_meal(candidate: &RecipeCandidate, meal_type: MealType) -> MealItem {
    let portions: Vec<IngredientPortion> = candidate
        .ingredientes
        .iter()
        .map(|i| IngredientPortion {
            name: i.nombre.clone(),
            grams: i.gramos,
            stored: None,
        })
        .collect();
    MealItem {
        tipo: meal_type,
        nombre: candidate.nombre.clone(),
        porciones: 1.0,
        ingredientes: candidate
            .ingredientes
            .iter()
            .map(|i| MealIngredient {
                alimento: i.nombre.clone(),
                gramos: i.gramos,
            })
            .collect(),
        macros: nutrition::engine::compute(1.0, &portions),
        proteina_objetivo_g: None,
    }
}

/// Per-meal share of the daily protein target. Fixed category weights,
/// renormalized over the meal types actually present.
pub fn protein_weights(present: &[MealType]) -> Vec<f64> {
    let snack_count = present.iter().filter(|t| t.is_snack()).count();
    let raw: Vec<f64> = present
        .iter()
        .map(|t| match t {
            MealType::Desayuno => 0.25,
            MealType::Almuerzo => 0.35,
            MealType::Cena => 0.30,
            _ => 0.10 / snack_count.max(1) as f64,
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        return vec![0.0; present.len()];
    }
    raw.into_iter().map(|w| w / sum).collect()
}

pub struct WeekInputs<'a> {
    pub user_id: Uuid,
    pub iso_week: u32,
    pub meal_types: &'a [MealType],
    pub diet_days: &'a [Weekday],
    pub daily_protein_g: f64,
}

/// Assign recipe variants to the 7 days of the week, per meal type.
/// Deterministic for identical inputs; never consults the text provider.
pub fn build_week(
    inputs: &WeekInputs<'_>,
    pools: &BTreeMap<MealType, Vec<RecipeCandidate>>,
) -> Vec<WeeklyScheduleEntry> {
    let weights = protein_weights(inputs.meal_types);

    // Shuffle once per meal type, then index per day via rotation groups.
    let mut week_pools: BTreeMap<MealType, Vec<RecipeCandidate>> = BTreeMap::new();
    for meal_type in inputs.meal_types {
        let pool = pools.get(meal_type).cloned().unwrap_or_default();
        let seed = rotation_seed(inputs.user_id, *meal_type, inputs.iso_week);
        week_pools.insert(*meal_type, shuffled_pool(pool, seed));
    }

    Weekday::ALL
        .iter()
        .map(|day| {
            if !inputs.diet_days.contains(day) {
                return WeeklyScheduleEntry {
                    day: *day,
                    active: false,
                    meals: Vec::new(),
                };
            }
            let group = day.rotation_group();
            let meals = inputs
                .meal_types
                .iter()
                .zip(weights.iter())
                .filter_map(|(meal_type, weight)| {
                    let pool = &week_pools[meal_type];
                    if pool.is_empty() {
                        return None;
                    }
                    let idx = variant_indices(pool.len())[group];
                    let mut meal = candidate_to_meal(&pool[idx], *meal_type);
                    meal.proteina_objetivo_g =
                        Some((inputs.daily_protein_g * weight * 10.0).round() / 10.0);
                    Some(meal)
                })
                .collect();
            WeeklyScheduleEntry {
                day: *day,
                active: true,
                meals,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, kcal: f64) -> RecipeCandidate {
        RecipeCandidate {
            id: Uuid::new_v4(),
            nombre: name.into(),
            kcal_estimadas: kcal,
            match_count: 0,
            ingredientes: vec![super::super::catalog::CandidateIngredient {
                nombre: "pollo".into(),
                gramos: 150.0,
            }],
        }
    }

    fn pool(n: usize) -> Vec<RecipeCandidate> {
        (0..n)
            .map(|i| candidate(&format!("receta {i}"), 400.0 + i as f64))
            .collect()
    }

    fn inputs<'a>(
        user_id: &'a Uuid,
        meal_types: &'a [MealType],
        diet_days: &'a [Weekday],
    ) -> WeekInputs<'a> {
        WeekInputs {
            user_id: *user_id,
            iso_week: 12,
            meal_types,
            diet_days,
            daily_protein_g: 140.0,
        }
    }

    #[test]
    fn identical_inputs_shuffle_identically() {
        let p = pool(6);
        let user = Uuid::new_v4();
        let seed = rotation_seed(user, MealType::Almuerzo, 12);
        let a = shuffled_pool(p.clone(), seed);
        let b = shuffled_pool(p, seed);
        let names_a: Vec<&str> = a.iter().map(|c| c.nombre.as_str()).collect();
        let names_b: Vec<&str> = b.iter().map(|c| c.nombre.as_str()).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn changing_week_changes_the_shuffle_for_some_week() {
        let p = pool(7);
        let user = Uuid::new_v4();
        let base = shuffled_pool(p.clone(), rotation_seed(user, MealType::Cena, 1));
        let base_names: Vec<String> = base.iter().map(|c| c.nombre.clone()).collect();
        let changed = (2..20).any(|week| {
            let other = shuffled_pool(p.clone(), rotation_seed(user, MealType::Cena, week));
            other
                .iter()
                .map(|c| c.nombre.clone())
                .collect::<Vec<_>>()
                != base_names
        });
        assert!(changed, "18 consecutive weeks shuffled identically");
    }

    #[test]
    fn shuffle_dedupes_by_recipe_id() {
        let mut p = pool(3);
        p.push(p[0].clone());
        let out = shuffled_pool(p, 42);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn sunday_wraps_when_small_pools_leave_nothing_unused() {
        // Groups 0..2 consume a pool of 3 entirely, so Sunday wraps to 0;
        // with 4+ entries it takes its own index.
        assert_eq!(variant_indices(3), [0, 1, 2, 0]);
        assert_eq!(variant_indices(2), [0, 1, 0, 1]);
        assert_eq!(variant_indices(1), [0, 0, 0, 0]);
        assert_eq!(variant_indices(5), [0, 1, 2, 3]);
    }

    #[test]
    fn inactive_days_are_emitted_empty() {
        let user = Uuid::new_v4();
        let meal_types = [MealType::Desayuno, MealType::Cena];
        let diet_days = [Weekday::Mon, Weekday::Wed, Weekday::Fri];
        let mut pools = BTreeMap::new();
        pools.insert(MealType::Desayuno, pool(4));
        pools.insert(MealType::Cena, pool(4));
        let week = build_week(&inputs(&user, &meal_types, &diet_days), &pools);
        assert_eq!(week.len(), 7);
        let tue = week.iter().find(|e| e.day == Weekday::Tue).unwrap();
        assert!(!tue.active);
        assert!(tue.meals.is_empty());
        let mon = week.iter().find(|e| e.day == Weekday::Mon).unwrap();
        assert!(mon.active);
        assert_eq!(mon.meals.len(), 2);
        assert_eq!(mon.meals[0].tipo, MealType::Desayuno);
        assert_eq!(mon.meals[1].tipo, MealType::Cena);
    }

    #[test]
    fn build_week_is_deterministic() {
        let user = Uuid::new_v4();
        let meal_types = [MealType::Desayuno, MealType::Almuerzo, MealType::Cena];
        let mut pools = BTreeMap::new();
        for t in meal_types {
            pools.insert(t, pool(6));
        }
        let i = inputs(&user, &meal_types, &Weekday::ALL);
        let a = build_week(&i, &pools);
        let b = build_week(&i, &pools);
        for (ea, eb) in a.iter().zip(b.iter()) {
            let na: Vec<&str> = ea.meals.iter().map(|m| m.nombre.as_str()).collect();
            let nb: Vec<&str> = eb.meals.iter().map(|m| m.nombre.as_str()).collect();
            assert_eq!(na, nb);
        }
    }

    #[test]
    fn protein_weights_renormalize_over_present_meals() {
        let w = protein_weights(&[MealType::Desayuno, MealType::Almuerzo, MealType::Cena]);
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        // 0.25 / 0.90, 0.35 / 0.90, 0.30 / 0.90
        assert!((w[0] - 0.2777).abs() < 1e-3);
        assert!((w[1] - 0.3888).abs() < 1e-3);

        let with_snacks = protein_weights(&[
            MealType::Desayuno,
            MealType::SnackManana,
            MealType::Almuerzo,
            MealType::SnackTarde,
            MealType::Cena,
        ]);
        let sum: f64 = with_snacks.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((with_snacks[1] - with_snacks[3]).abs() < 1e-9);
    }
}
