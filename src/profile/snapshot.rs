use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    LoseFat,
    Maintain,
    GainMuscle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    High,
    Athlete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSpeed {
    Slow,
    Default,
    Fast,
}

/// Meal slots as the mobile clients name them. `Snack` is the legacy
/// undivided slot; newer profiles use the morning/afternoon split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MealType {
    Desayuno,
    #[serde(rename = "Snack_manana")]
    SnackManana,
    Almuerzo,
    #[serde(rename = "Snack_tarde")]
    SnackTarde,
    Cena,
    Snack,
}

impl MealType {
    pub fn label(self) -> &'static str {
        match self {
            MealType::Desayuno => "Desayuno",
            MealType::SnackManana => "Snack_manana",
            MealType::Almuerzo => "Almuerzo",
            MealType::SnackTarde => "Snack_tarde",
            MealType::Cena => "Cena",
            MealType::Snack => "Snack",
        }
    }

    pub fn is_snack(self) -> bool {
        matches!(
            self,
            MealType::Snack | MealType::SnackManana | MealType::SnackTarde
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Fixed rotation grouping: Mon/Thu share variant 0, Tue/Fri variant 1,
    /// Wed/Sat variant 2, Sunday gets its own slot.
    pub fn rotation_group(self) -> usize {
        match self {
            Weekday::Mon | Weekday::Thu => 0,
            Weekday::Tue | Weekday::Fri => 1,
            Weekday::Wed | Weekday::Sat => 2,
            Weekday::Sun => 3,
        }
    }
}

/// Read-only view of a user's profile and plan preferences, supplied fresh on
/// every request by the profile store. The generation core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileSnapshot {
    pub user_id: Uuid,
    pub sex: Sex,
    pub birth_date: Date,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal: Goal,
    pub activity_level: ActivityLevel,
    pub change_speed: ChangeSpeed,
    pub country: String,
    /// Enabled meal slots, in the order the user wants them served.
    pub meal_types: Vec<MealType>,
    /// Days the user follows the plan; the rest are emitted inactive.
    pub diet_days: Vec<Weekday>,
    /// Preferred foods keyed by category ("proteinas", "carbohidratos", ...).
    pub preferred_foods: BTreeMap<String, Vec<String>>,
    /// Ids of catalog ingredients the user allows in recipes.
    pub allowed_ingredient_ids: Vec<Uuid>,
    /// Explicit daily protein target, when the user fixed one.
    pub protein_target_g: Option<f64>,
}

impl UserProfileSnapshot {
    pub fn age_years(&self, today: Date) -> i32 {
        let mut age = today.year() - self.birth_date.year();
        // Calendar comparison, not day-of-year: ordinals shift across leap
        // years and would miscount exact birthdays.
        let birthday = (u8::from(self.birth_date.month()), self.birth_date.day());
        if (u8::from(today.month()), today.day()) < birthday {
            age -= 1;
        }
        age.max(0)
    }

    /// Daily protein target in grams: the user's declared value wins, else a
    /// goal-dependent grams-per-kg default.
    pub fn resolved_protein_target(&self) -> f64 {
        if let Some(p) = self.protein_target_g {
            if p > 0.0 {
                return p;
            }
        }
        let per_kg = match self.goal {
            Goal::LoseFat => 1.8,
            Goal::Maintain => 1.6,
            Goal::GainMuscle => 2.0,
        };
        (self.weight_kg * per_kg * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn snapshot() -> UserProfileSnapshot {
        UserProfileSnapshot {
            user_id: Uuid::new_v4(),
            sex: Sex::M,
            birth_date: date!(1995 - 06 - 15),
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
    fn age_accounts_for_birthday_not_yet_reached() {
        let s = snapshot();
        assert_eq!(s.age_years(date!(2025 - 06 - 14)), 29);
        assert_eq!(s.age_years(date!(2025 - 06 - 16)), 30);
    }

    #[test]
    fn age_is_exact_on_birthdays_across_leap_years() {
        // Born in a leap year: Aug 26 is ordinal 239 in 1996 but 238 in
        // 2026, so an ordinal comparison would call this 29.
        let mut s = snapshot();
        s.birth_date = date!(1996 - 08 - 26);
        assert_eq!(s.age_years(date!(2026 - 08 - 26)), 30);
        assert_eq!(s.age_years(date!(2026 - 08 - 25)), 29);
        assert_eq!(s.age_years(date!(2026 - 08 - 27)), 30);
    }

    #[test]
    fn declared_protein_target_wins() {
        let mut s = snapshot();
        s.protein_target_g = Some(150.0);
        assert_eq!(s.resolved_protein_target(), 150.0);
        s.protein_target_g = None;
        assert_eq!(s.resolved_protein_target(), 144.0); // 80kg * 1.8
    }

    #[test]
    fn meal_type_serde_uses_client_labels() {
        let json = serde_json::to_string(&MealType::SnackManana).unwrap();
        assert_eq!(json, "\"Snack_manana\"");
        let back: MealType = serde_json::from_str("\"Desayuno\"").unwrap();
        assert_eq!(back, MealType::Desayuno);
    }

    #[test]
    fn rotation_groups_match_fixed_mapping() {
        assert_eq!(Weekday::Mon.rotation_group(), 0);
        assert_eq!(Weekday::Thu.rotation_group(), 0);
        assert_eq!(Weekday::Tue.rotation_group(), 1);
        assert_eq!(Weekday::Fri.rotation_group(), 1);
        assert_eq!(Weekday::Wed.rotation_group(), 2);
        assert_eq!(Weekday::Sat.rotation_group(), 2);
        assert_eq!(Weekday::Sun.rotation_group(), 3);
    }
}
