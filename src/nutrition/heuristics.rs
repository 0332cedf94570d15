use lazy_static::lazy_static;
use regex::Regex;

use super::engine::Per100g;

/// One heuristic rule: a food-name pattern and reference facts per 100g.
pub struct HeuristicRule {
    pub pattern: Regex,
    pub per_100g: Per100g,
}

fn rule(pattern: &str, kcal: f64, proteinas: f64, grasas: f64, carbohidratos: f64) -> HeuristicRule {
    HeuristicRule {
        pattern: Regex::new(pattern).expect("heuristic pattern is valid"),
        per_100g: Per100g {
            kcal,
            proteinas,
            grasas,
            carbohidratos,
        },
    }
}

lazy_static! {
    /// Ordered, first match wins. Specific classes come before broad ones so
    /// "aceite de oliva" hits oils rather than vegetables.
    pub static ref HEURISTIC_RULES: Vec<HeuristicRule> = vec![
        // Lean poultry and white fish
        rule(
            r"(?i)pollo|pavo|merluza|bacalao|lenguado|tilapia|chicken|turkey|cod|hake",
            165.0, 31.0, 3.6, 0.0,
        ),
        // Oily fish
        rule(r"(?i)salm[oó]n|at[uú]n|sardina|caballa|trucha|salmon|tuna|mackerel", 200.0, 22.0, 12.0, 0.0),
        // Red meat
        rule(r"(?i)ternera|res|cerdo|cordero|lomo|beef|pork|lamb", 250.0, 26.0, 15.0, 0.0),
        // Eggs
        rule(r"(?i)huevo|egg", 155.0, 13.0, 11.0, 1.1),
        // Cooked grains and pasta
        rule(r"(?i)arroz|pasta|quinoa|cusc[uú]s|avena|rice|oat|couscous", 130.0, 2.7, 0.9, 28.0),
        // Bread and tortillas
        rule(r"(?i)pan|tortilla|arepa|bread", 265.0, 9.0, 3.2, 49.0),
        // Starchy roots
        rule(r"(?i)papa|patata|batata|boniato|yuca|camote|potato|cassava", 86.0, 1.6, 0.1, 20.0),
        // Legumes (cooked)
        rule(r"(?i)lenteja|garbanzo|frijol|jud[ií]a|alubia|haba|lentil|chickpea|bean", 120.0, 8.0, 0.6, 20.0),
        // Dairy
        rule(r"(?i)yogur|queso|leche|reques[oó]n|kefir|yogurt|cheese|milk", 90.0, 6.0, 4.0, 6.0),
        // Nuts, seeds and oils
        rule(r"(?i)nuez|almendra|man[ií]|cacahuete|semilla|aceite|mantequilla|nut|almond|peanut|seed|oil|butter", 600.0, 15.0, 55.0, 15.0),
        // Avocado
        rule(r"(?i)aguacate|palta|avocado", 160.0, 2.0, 15.0, 9.0),
        // Fruit
        rule(
            r"(?i)manzana|banan[ao]|pl[aá]tano|naranja|pera|fresa|mango|pi[nñ]a|uva|kiwi|fruta|apple|banana|orange|berry|fruit",
            60.0, 0.7, 0.2, 15.0,
        ),
        // Vegetables (broad, keep last among foods)
        rule(
            r"(?i)br[oó]coli|espinaca|lechuga|tomate|zanahoria|calabac[ií]n|pepino|pimiento|cebolla|coliflor|verdura|ensalada|broccoli|spinach|lettuce|tomato|carrot|vegetable|salad",
            35.0, 2.0, 0.3, 6.0,
        ),
    ];
}

/// Reference facts for a food name, or `None` when no class matches.
pub fn estimate(name: &str) -> Option<Per100g> {
    HEURISTIC_RULES
        .iter()
        .find(|r| r.pattern.is_match(name))
        .map(|r| r.per_100g)
}

/// Coarse macro category used by variant synthesis to swap like for like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodCategory {
    Protein,
    Carb,
    Fat,
    Produce,
    Other,
}

pub fn classify(name: &str) -> FoodCategory {
    match estimate(name) {
        None => FoodCategory::Other,
        Some(f) => {
            let kcal = f.kcal.max(1.0);
            let protein_kcal = f.proteinas * 4.0;
            let fat_kcal = f.grasas * 9.0;
            let carb_kcal = f.carbohidratos * 4.0;
            if f.kcal <= 70.0 && protein_kcal < 20.0 {
                FoodCategory::Produce
            } else if protein_kcal / kcal >= 0.4 {
                FoodCategory::Protein
            } else if fat_kcal / kcal >= 0.5 {
                FoodCategory::Fat
            } else if carb_kcal / kcal >= 0.5 {
                FoodCategory::Carb
            } else {
                FoodCategory::Other
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lean_poultry_matches_before_vegetables() {
        let f = estimate("Pechuga de pollo").expect("rule match");
        assert_eq!(f.kcal, 165.0);
    }

    #[test]
    fn olive_oil_hits_oils_not_produce() {
        let f = estimate("aceite de oliva").expect("rule match");
        assert!(f.kcal > 500.0);
        assert_eq!(classify("aceite de oliva"), FoodCategory::Fat);
    }

    #[test]
    fn unknown_food_has_no_estimate() {
        assert!(estimate("xylotl").is_none());
        assert_eq!(classify("xylotl"), FoodCategory::Other);
    }

    #[test]
    fn categories_cover_the_usual_suspects() {
        assert_eq!(classify("arroz integral"), FoodCategory::Carb);
        assert_eq!(classify("salmón"), FoodCategory::Protein);
        assert_eq!(classify("brócoli"), FoodCategory::Produce);
    }
}
