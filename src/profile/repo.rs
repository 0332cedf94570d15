use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::Date;
use uuid::Uuid;

use super::snapshot::UserProfileSnapshot;

/// Read-only collaborator supplying the profile snapshot that feeds hashing,
/// prompts and the local fallback. Owned by the onboarding service; this core
/// only reads it.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn snapshot(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfileSnapshot>>;
}

pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: Uuid,
    sex: String,
    birth_date: Date,
    height_cm: f64,
    weight_kg: f64,
    goal: String,
    activity_level: String,
    change_speed: String,
    country: String,
    meal_types: serde_json::Value,
    diet_days: serde_json::Value,
    preferred_foods: serde_json::Value,
    allowed_ingredient_ids: serde_json::Value,
    protein_target_g: Option<f64>,
}

impl ProfileRow {
    fn into_snapshot(self) -> anyhow::Result<UserProfileSnapshot> {
        Ok(UserProfileSnapshot {
            user_id: self.user_id,
            sex: serde_json::from_value(serde_json::Value::String(self.sex))?,
            birth_date: self.birth_date,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            goal: serde_json::from_value(serde_json::Value::String(self.goal))?,
            activity_level: serde_json::from_value(serde_json::Value::String(
                self.activity_level,
            ))?,
            change_speed: serde_json::from_value(serde_json::Value::String(self.change_speed))?,
            country: self.country,
            meal_types: serde_json::from_value(self.meal_types)?,
            diet_days: serde_json::from_value(self.diet_days)?,
            preferred_foods: serde_json::from_value(self.preferred_foods)?,
            allowed_ingredient_ids: serde_json::from_value(self.allowed_ingredient_ids)?,
            protein_target_g: self.protein_target_g,
        })
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn snapshot(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfileSnapshot>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, sex, birth_date, height_cm, weight_kg, goal,
                   activity_level, change_speed, country, meal_types, diet_days,
                   preferred_foods, allowed_ingredient_ids, protein_target_g
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(ProfileRow::into_snapshot).transpose()
    }
}
