use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::profile::MealType;

/// Catalog recipe candidate, pre-ranked by the store: ingredient-match count
/// against the user's allowed ingredients descending, estimated kcal
/// ascending as tiebreak.
#[derive(Debug, Clone)]
pub struct RecipeCandidate {
    pub id: Uuid,
    pub nombre: String,
    pub kcal_estimadas: f64,
    pub match_count: i64,
    pub ingredientes: Vec<CandidateIngredient>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CandidateIngredient {
    pub nombre: String,
    pub gramos: f64,
}

#[async_trait]
pub trait RecipeCatalog: Send + Sync {
    async fn search_by_type_and_allowed(
        &self,
        meal_type: MealType,
        allowed_ingredient_ids: &[Uuid],
        limit: i64,
    ) -> anyhow::Result<Vec<RecipeCandidate>>;
}

pub struct PgRecipeCatalog {
    db: PgPool,
}

impl PgRecipeCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    nombre: String,
    kcal_estimadas: f64,
    match_count: i64,
    ingredientes: serde_json::Value,
}

#[async_trait]
impl RecipeCatalog for PgRecipeCatalog {
    async fn search_by_type_and_allowed(
        &self,
        meal_type: MealType,
        allowed_ingredient_ids: &[Uuid],
        limit: i64,
    ) -> anyhow::Result<Vec<RecipeCandidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT r.id, r.nombre, r.kcal_estimadas,
                   COUNT(ri.ingredient_id) FILTER (WHERE ri.ingredient_id = ANY($2)) AS match_count,
                   COALESCE(
                       jsonb_agg(jsonb_build_object('nombre', i.nombre, 'gramos', ri.gramos))
                           FILTER (WHERE i.id IS NOT NULL),
                       '[]'::jsonb
                   ) AS ingredientes
            FROM recipes r
            LEFT JOIN recipe_ingredients ri ON ri.recipe_id = r.id
            LEFT JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE r.meal_type = $1
            GROUP BY r.id, r.nombre, r.kcal_estimadas
            ORDER BY match_count DESC, r.kcal_estimadas ASC
            LIMIT $3
            "#,
        )
        .bind(meal_type.label())
        .bind(allowed_ingredient_ids)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(RecipeCandidate {
                    id: row.id,
                    nombre: row.nombre,
                    kcal_estimadas: row.kcal_estimadas,
                    match_count: row.match_count,
                    ingredientes: serde_json::from_value(row.ingredientes)?,
                })
            })
            .collect()
    }
}
