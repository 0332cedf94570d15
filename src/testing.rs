//! Fake collaborators for unit tests and local development.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::nutrition::{NutritionFactsStore, Per100g};
use crate::profile::{MealType, ProfileStore, UserProfileSnapshot};
use crate::provider::{ProviderError, TextProvider};
use crate::rotation::{RecipeCandidate, RecipeCatalog};

pub struct NoProfiles;

#[async_trait]
impl ProfileStore for NoProfiles {
    async fn snapshot(&self, _user_id: Uuid) -> anyhow::Result<Option<UserProfileSnapshot>> {
        Ok(None)
    }
}

pub struct FixedProfile(pub UserProfileSnapshot);

#[async_trait]
impl ProfileStore for FixedProfile {
    async fn snapshot(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfileSnapshot>> {
        // Real stores return the queried user's snapshot; keep that
        // invariant so cache keys derived from either id agree.
        let mut snap = self.0.clone();
        snap.user_id = user_id;
        Ok(Some(snap))
    }
}

pub struct NoFacts;

#[async_trait]
impl NutritionFactsStore for NoFacts {
    async fn lookup(&self, _ingredient_name: &str) -> anyhow::Result<Option<Per100g>> {
        Ok(None)
    }
}

pub struct EmptyCatalog;

#[async_trait]
impl RecipeCatalog for EmptyCatalog {
    async fn search_by_type_and_allowed(
        &self,
        _meal_type: MealType,
        _allowed_ingredient_ids: &[Uuid],
        _limit: i64,
    ) -> anyhow::Result<Vec<RecipeCandidate>> {
        Ok(Vec::new())
    }
}

/// Provider that replays a scripted list of responses, one per call, then
/// reports itself unavailable. Counts calls so single-flight tests can
/// assert how much work actually ran.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub calls: Mutex<u32>,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Every response additionally takes `delay` to arrive; lets tests drive
    /// the timeout race.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().expect("calls lock")
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    async fn complete(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        *self.calls.lock().expect("calls lock") += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Unavailable("script exhausted".into())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
