use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use super::dto::CachedPlan;

lazy_static! {
    /// Advice text older builds stored while a plan was still generating.
    /// Such rows must never be served as a cache hit.
    static ref LEGACY_PLACEHOLDER: Regex =
        Regex::new(r"(?i)^\s*tu plan se está (preparando|generando)").expect("valid regex");
}

/// A stored plan is usable only if it matches the current profile hash and
/// actually carries content.
pub fn is_valid(plan: &CachedPlan, expected_hash: &str) -> bool {
    plan.hash == expected_hash
        && plan.summary.kcal_objetivo > 0.0
        && !plan.meals.items.is_empty()
        && !LEGACY_PLACEHOLDER.is_match(&plan.advice)
}

/// Content-addressed plan store. `get` applies the validity invariant, so a
/// hash match alone is never enough. Writes are last-writer-wins; all
/// content is re-derivable.
#[async_trait]
pub trait PlanCache: Send + Sync {
    async fn get(&self, user_id: Uuid, hash: &str) -> anyhow::Result<Option<CachedPlan>>;
    async fn put(&self, user_id: Uuid, plan: &CachedPlan) -> anyhow::Result<()>;
    async fn invalidate(&self, user_id: Uuid) -> anyhow::Result<()>;
}

pub struct PgPlanCache {
    db: PgPool,
}

impl PgPlanCache {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct PlanRow {
    payload: serde_json::Value,
}

#[async_trait]
impl PlanCache for PgPlanCache {
    async fn get(&self, user_id: Uuid, hash: &str) -> anyhow::Result<Option<CachedPlan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"SELECT payload FROM plan_cache WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let plan: CachedPlan = match serde_json::from_value(row.payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, %user_id, "discarding undecodable cached plan");
                return Ok(None);
            }
        };
        if is_valid(&plan, hash) {
            Ok(Some(plan))
        } else {
            Ok(None)
        }
    }

    async fn put(&self, user_id: Uuid, plan: &CachedPlan) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plan_cache (user_id, hash, payload, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id)
            DO UPDATE SET hash = EXCLUDED.hash,
                          payload = EXCLUDED.payload,
                          updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(&plan.hash)
        .bind(serde_json::to_value(plan)?)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn invalidate(&self, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM plan_cache WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/// In-memory cache for tests and single-process development.
#[derive(Default)]
pub struct MemoryPlanCache {
    inner: Mutex<HashMap<Uuid, CachedPlan>>,
}

#[async_trait]
impl PlanCache for MemoryPlanCache {
    async fn get(&self, user_id: Uuid, hash: &str) -> anyhow::Result<Option<CachedPlan>> {
        let inner = self.inner.lock().expect("cache lock");
        Ok(inner
            .get(&user_id)
            .filter(|plan| is_valid(plan, hash))
            .cloned())
    }

    async fn put(&self, user_id: Uuid, plan: &CachedPlan) -> anyhow::Result<()> {
        self.inner
            .lock()
            .expect("cache lock")
            .insert(user_id, plan.clone());
        Ok(())
    }

    async fn invalidate(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.inner.lock().expect("cache lock").remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::dto::{MealsBlock, Summary};
    use time::OffsetDateTime;

    fn plan(hash: &str, advice: &str) -> CachedPlan {
        CachedPlan {
            advice: advice.into(),
            summary: Summary {
                kcal_objetivo: 2200.0,
                ..Default::default()
            },
            meals: MealsBlock {
                items: vec![serde_json::from_value(serde_json::json!({
                    "tipo": "Cena",
                    "nombre": "Merluza con verduras",
                    "porciones": 1.0,
                    "ingredientes": []
                }))
                .unwrap()],
                ..Default::default()
            },
            hydration: Default::default(),
            beverages: Default::default(),
            hash: hash.into(),
            model: "gpt-test".into(),
            generated_ms: 1200,
            ts: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn hash_mismatch_is_a_miss() {
        let cache = MemoryPlanCache::default();
        let user = Uuid::new_v4();
        cache.put(user, &plan("abc", "Buen plan")).await.unwrap();
        assert!(cache.get(user, "abc").await.unwrap().is_some());
        assert!(cache.get(user, "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn legacy_placeholder_is_a_miss_even_on_hash_match() {
        let cache = MemoryPlanCache::default();
        let user = Uuid::new_v4();
        cache
            .put(user, &plan("abc", "Tu plan se está preparando..."))
            .await
            .unwrap();
        assert!(cache.get(user, "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_meals_are_a_miss() {
        let cache = MemoryPlanCache::default();
        let user = Uuid::new_v4();
        let mut p = plan("abc", "Buen plan");
        p.meals.items.clear();
        cache.put(user, &p).await.unwrap();
        assert!(cache.get(user, "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_the_entry() {
        let cache = MemoryPlanCache::default();
        let user = Uuid::new_v4();
        cache.put(user, &plan("abc", "Buen plan")).await.unwrap();
        cache.invalidate(user).await.unwrap();
        assert!(cache.get(user, "abc").await.unwrap().is_none());
    }
}
