use serde::{Deserialize, Serialize};

use super::heuristics;

/// Nutrition facts per 100 grams of an ingredient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Per100g {
    pub kcal: f64,
    pub proteinas: f64,
    pub grasas: f64,
    pub carbohidratos: f64,
}

impl Per100g {
    pub fn scale(&self, factor: f64) -> Per100g {
        Per100g {
            kcal: self.kcal * factor,
            proteinas: self.proteinas * factor,
            grasas: self.grasas * factor,
            carbohidratos: self.carbohidratos * factor,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.kcal == 0.0 && self.proteinas == 0.0 && self.grasas == 0.0 && self.carbohidratos == 0.0
    }
}

/// Totals for a meal or a plan. kcal is a whole number, the rest carry one
/// decimal place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub kcal: f64,
    pub proteinas: f64,
    pub grasas: f64,
    pub carbohidratos: f64,
}

/// One ingredient line as the orchestrator hands it in: stored facts already
/// resolved (or not) through the nutrition-facts store.
#[derive(Debug, Clone)]
pub struct IngredientPortion {
    pub name: String,
    pub grams: f64,
    pub stored: Option<Per100g>,
}

/// Stored component values below this fraction of the heuristic estimate are
/// treated as suspect (incomplete DB rows) and replaced by the larger value.
/// Inherited behavior; do not tune.
pub const STORED_VS_HEURISTIC_MIN_RATIO: f64 = 0.70;

fn reconcile_component(stored: f64, heuristic: f64) -> f64 {
    if stored < STORED_VS_HEURISTIC_MIN_RATIO * heuristic {
        stored.max(heuristic)
    } else {
        stored
    }
}

fn reconcile(stored: Option<Per100g>, heuristic: Option<Per100g>) -> Per100g {
    let heuristic = heuristic.unwrap_or_default();
    match stored {
        None => heuristic,
        Some(s) if s.is_zero() => heuristic,
        Some(s) => Per100g {
            kcal: reconcile_component(s.kcal, heuristic.kcal),
            proteinas: reconcile_component(s.proteinas, heuristic.proteinas),
            grasas: reconcile_component(s.grasas, heuristic.grasas),
            carbohidratos: reconcile_component(s.carbohidratos, heuristic.carbohidratos),
        },
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Compute macro totals for `servings` portions of an ingredient list.
/// Pure arithmetic: stored facts and heuristic estimates are reconciled per
/// component, scaled by grams, summed, and multiplied by servings.
pub fn compute(servings: f64, items: &[IngredientPortion]) -> MacroTotals {
    let mut total = Per100g::default();
    for item in items {
        let grams = item.grams.max(0.0);
        let per_100g = reconcile(item.stored, heuristics::estimate(&item.name));
        let scaled = per_100g.scale(grams / 100.0);
        total.kcal += scaled.kcal;
        total.proteinas += scaled.proteinas;
        total.grasas += scaled.grasas;
        total.carbohidratos += scaled.carbohidratos;
    }
    let servings = servings.max(0.0);
    MacroTotals {
        kcal: (total.kcal * servings).round().max(0.0),
        proteinas: round1(total.proteinas * servings).max(0.0),
        grasas: round1(total.grasas * servings).max(0.0),
        carbohidratos: round1(total.carbohidratos * servings).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portion(name: &str, grams: f64, stored: Option<Per100g>) -> IngredientPortion {
        IngredientPortion {
            name: name.into(),
            grams,
            stored,
        }
    }

    #[test]
    fn scaling_by_grams_is_linear() {
        let base = vec![portion("pollo", 100.0, None), portion("arroz", 80.0, None)];
        let tripled = vec![portion("pollo", 300.0, None), portion("arroz", 240.0, None)];
        let a = compute(1.0, &base);
        let b = compute(1.0, &tripled);
        assert!((b.kcal - a.kcal * 3.0).abs() <= 2.0);
        assert!((b.proteinas - a.proteinas * 3.0).abs() <= 0.3);
    }

    #[test]
    fn suspiciously_low_stored_kcal_falls_back_to_heuristic() {
        // DB row says 10 kcal for chicken; heuristic table says 165.
        let items = vec![portion(
            "pollo",
            100.0,
            Some(Per100g {
                kcal: 10.0,
                proteinas: 31.0,
                grasas: 3.6,
                carbohidratos: 0.0,
            }),
        )];
        assert_eq!(compute(1.0, &items).kcal, 165.0);
    }

    #[test]
    fn stored_value_above_threshold_is_kept() {
        // 160 >= 0.70 * 165, stored wins even though it is below the estimate.
        let items = vec![portion(
            "pollo",
            100.0,
            Some(Per100g {
                kcal: 160.0,
                proteinas: 31.0,
                grasas: 3.6,
                carbohidratos: 0.0,
            }),
        )];
        assert_eq!(compute(1.0, &items).kcal, 160.0);
    }

    #[test]
    fn stored_larger_than_heuristic_is_never_discarded() {
        let items = vec![portion(
            "pollo frito",
            100.0,
            Some(Per100g {
                kcal: 290.0,
                proteinas: 25.0,
                grasas: 18.0,
                carbohidratos: 5.0,
            }),
        )];
        assert_eq!(compute(1.0, &items).kcal, 290.0);
    }

    #[test]
    fn all_zero_stored_row_uses_heuristic_wholesale() {
        let items = vec![portion("arroz", 100.0, Some(Per100g::default()))];
        assert_eq!(compute(1.0, &items).kcal, 130.0);
    }

    #[test]
    fn servings_multiply_totals() {
        let items = vec![portion("arroz", 100.0, None)];
        let one = compute(1.0, &items);
        let two = compute(2.0, &items);
        assert_eq!(two.kcal, one.kcal * 2.0);
    }

    #[test]
    fn unknown_ingredient_without_facts_contributes_nothing() {
        let items = vec![portion("xylotl", 100.0, None)];
        assert_eq!(compute(1.0, &items), MacroTotals::default());
    }

    #[test]
    fn negative_grams_clamped_to_zero() {
        let items = vec![portion("arroz", -50.0, None)];
        assert_eq!(compute(1.0, &items).kcal, 0.0);
    }
}
