use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use super::engine::Per100g;

/// Collaborator: per-100g nutrition facts for catalog ingredients. Rows can
/// be missing or partially filled; the macro engine reconciles that.
#[async_trait]
pub trait NutritionFactsStore: Send + Sync {
    async fn lookup(&self, ingredient_name: &str) -> anyhow::Result<Option<Per100g>>;
}

pub struct PgNutritionFactsStore {
    db: PgPool,
}

impl PgNutritionFactsStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct FactsRow {
    kcal: Option<f64>,
    proteinas: Option<f64>,
    grasas: Option<f64>,
    carbohidratos: Option<f64>,
}

#[async_trait]
impl NutritionFactsStore for PgNutritionFactsStore {
    async fn lookup(&self, ingredient_name: &str) -> anyhow::Result<Option<Per100g>> {
        let row = sqlx::query_as::<_, FactsRow>(
            r#"
            SELECT kcal, proteinas, grasas, carbohidratos
            FROM ingredients
            WHERE lower(nombre) = lower($1)
            LIMIT 1
            "#,
        )
        .bind(ingredient_name)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| Per100g {
            kcal: r.kcal.unwrap_or(0.0),
            proteinas: r.proteinas.unwrap_or(0.0),
            grasas: r.grasas.unwrap_or(0.0),
            carbohidratos: r.carbohidratos.unwrap_or(0.0),
        }))
    }
}
