use std::collections::BTreeMap;
use std::time::Instant;

use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{
    BeveragesBlock, CachedPlan, GenerateOptions, GenerateOutcome, HydrationBlock, MealItem,
    MealsBlock, PlanResponse, Summary,
};
use super::{extractor, fallback, hasher, prompts};
use crate::errors::GenerationError;
use crate::nutrition::{engine as macro_engine, IngredientPortion};
use crate::profile::UserProfileSnapshot;
use crate::rotation::{self, engine::protein_weights, engine::rotation_seed, variants, WeekInputs};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Fast,
    Long,
    Reduced,
    Local,
}

impl Tier {
    fn label(self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Long => "long",
            Tier::Reduced => "reduced",
            Tier::Local => "local",
        }
    }
}

/// Usable output of one tier, before repair and enforcement.
struct Extracted {
    tier: Tier,
    advice: String,
    summary: Summary,
    meals: Vec<MealItem>,
    hydration: Option<HydrationBlock>,
    beverages: Option<BeveragesBlock>,
}

/// Entry point behind `POST /plans/generate`. See the module tests for the
/// contract: cache hit short-circuits, tiers fall through, single-flight per
/// user, prefetch + watchdog, strict mode surfaces IncompleteOutput.
pub async fn generate(
    state: &AppState,
    user_id: Uuid,
    opts: GenerateOptions,
) -> Result<GenerateOutcome, GenerationError> {
    let started = Instant::now();
    let snapshot = state
        .profiles
        .snapshot(user_id)
        .await
        .map_err(GenerationError::Internal)?
        .ok_or(GenerationError::ProfileNotFound)?;
    let protein_target = snapshot.resolved_protein_target();
    let hash = hasher::plan_hash(&snapshot, protein_target);

    if opts.invalidate {
        if let Err(e) = state.plan_cache.invalidate(user_id).await {
            warn!(error = %e, %user_id, "cache invalidation failed");
        }
    }

    if !opts.force_long && !opts.invalidate {
        match state.plan_cache.get(user_id, &hash).await {
            Ok(Some(plan)) => {
                return Ok(GenerateOutcome::Plan(PlanResponse::from_cached(
                    plan,
                    started.elapsed().as_millis() as i64,
                )));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, %user_id, "cache read failed; regenerating"),
        }
    }

    if opts.prefetch {
        let Some(job_id) = state.jobs.try_begin(user_id) else {
            return Ok(GenerateOutcome::Pending);
        };
        spawn_prefetch(state.clone(), snapshot, hash, opts, user_id, job_id);
        return Ok(GenerateOutcome::Started);
    }

    // force_long bypasses single-flight: an explicit regenerate runs even if
    // a background job holds the slot.
    let claimed = state.jobs.try_begin(user_id);
    if claimed.is_none() && !opts.force_long {
        return Ok(GenerateOutcome::Pending);
    }

    let result = run_to_completion(state, &snapshot, &hash, opts, started).await;
    if let Some(job_id) = claimed {
        state.jobs.finish(user_id, job_id);
    }
    result.map(GenerateOutcome::Plan)
}

fn spawn_prefetch(
    state: AppState,
    snapshot: UserProfileSnapshot,
    hash: String,
    opts: GenerateOptions,
    user_id: Uuid,
    job_id: u64,
) {
    let budget = state.config.generation.watchdog_budget();

    // Watchdog: if this job still holds the slot when the budget runs out,
    // cache a minimal local plan and free it so pollers stop seeing Pending.
    {
        let state = state.clone();
        let snapshot = snapshot.clone();
        let hash = hash.clone();
        tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            if !state.jobs.holds(user_id, job_id) {
                return;
            }
            warn!(%user_id, "prefetch watchdog fired; caching local fallback");
            let plan = local_plan(&snapshot, &hash, 0);
            if let Err(e) = state.plan_cache.put(user_id, &plan).await {
                warn!(error = %e, %user_id, "watchdog cache write failed");
            }
            state.jobs.finish(user_id, job_id);
        });
    }

    tokio::spawn(async move {
        let started = Instant::now();
        match run_to_completion(&state, &snapshot, &hash, opts, started).await {
            Ok(_) => info!(%user_id, "prefetch job completed"),
            Err(e) => warn!(error = %e, %user_id, "prefetch job failed"),
        }
        state.jobs.finish(user_id, job_id);
    });
}

/// Minimal provider-free plan, used by the watchdog when a prefetch job
/// overruns its budget.
fn local_plan(snapshot: &UserProfileSnapshot, hash: &str, generated_ms: i64) -> CachedPlan {
    let today = OffsetDateTime::now_utc().date();
    let local = fallback::generate(snapshot, today);
    CachedPlan {
        advice: local.advice,
        summary: local.summary,
        meals: local.meals,
        hydration: local.hydration,
        beverages: local.beverages,
        hash: hash.to_string(),
        model: "local".to_string(),
        generated_ms,
        ts: OffsetDateTime::now_utc(),
    }
}

/// Drive the tier chain, the optional booster retry, repair, and the cache
/// write. Only `IncompleteOutput` (strict mode) escapes.
async fn run_to_completion(
    state: &AppState,
    snapshot: &UserProfileSnapshot,
    hash: &str,
    opts: GenerateOptions,
    started: Instant,
) -> Result<PlanResponse, GenerationError> {
    let today = OffsetDateTime::now_utc().date();
    let protein_target = snapshot.resolved_protein_target();

    let mut extracted = run_chain(state, snapshot, protein_target, today, opts).await?;

    if opts.ensure_full && needs_booster(&extracted) {
        if let Some(better) = booster_retry(state, snapshot, protein_target, today).await {
            if better.advice.len() > extracted.advice.len() {
                extracted = better;
            }
        }
    }

    let tier = extracted.tier;
    let plan = finalize(state, snapshot, extracted, hash, protein_target, today, started).await;

    if let Err(e) = state.plan_cache.put(snapshot.user_id, &plan).await {
        warn!(error = %e, user_id = %snapshot.user_id, "cache write failed; serving uncached");
    }

    info!(
        user_id = %snapshot.user_id,
        tier = tier.label(),
        took_ms = plan.generated_ms,
        "plan generated"
    );
    Ok(PlanResponse::from_cached(
        plan,
        started.elapsed().as_millis() as i64,
    ))
}

/// Tiered attempt chain. Provider timeouts, provider errors and malformed
/// output are absorbed and the next tier runs. The local tier terminates the
/// chain unless strict mode forbids serving synthesized content.
async fn run_chain(
    state: &AppState,
    snapshot: &UserProfileSnapshot,
    protein_target: f64,
    today: Date,
    opts: GenerateOptions,
) -> Result<Extracted, GenerationError> {
    let cfg = &state.config.generation;
    let mut tiers: Vec<Tier> = Vec::new();
    if opts.force_long {
        tiers.push(Tier::Long);
        tiers.push(Tier::Fast);
    } else {
        tiers.push(Tier::Fast);
        if !cfg.fast_mode {
            tiers.push(Tier::Long);
        }
    }
    tiers.push(Tier::Reduced);

    for tier in tiers {
        let attempt = match call_tier(state, tier, snapshot, protein_target, today).await {
            Ok(text) => parse_output(tier, &text).ok_or(GenerationError::MalformedOutput),
            Err(e) => Err(e),
        };
        match attempt {
            Ok(extracted) => return Ok(extracted),
            Err(e) if e.is_absorbable() => {
                warn!(tier = tier.label(), error = %e, "tier failed; falling through");
            }
            Err(e) => return Err(e),
        }
    }

    if opts.strict {
        return Err(GenerationError::IncompleteOutput);
    }

    let local = fallback::generate(snapshot, today);
    Ok(Extracted {
        tier: Tier::Local,
        advice: local.advice,
        summary: local.summary,
        meals: local.meals.items,
        hydration: Some(local.hydration),
        beverages: Some(local.beverages),
    })
}

async fn call_tier(
    state: &AppState,
    tier: Tier,
    snapshot: &UserProfileSnapshot,
    protein_target: f64,
    today: Date,
) -> Result<String, GenerationError> {
    let cfg = &state.config.generation;
    let (prompt, timeout) = match tier {
        Tier::Fast => (
            prompts::full_prompt(snapshot, protein_target, today),
            cfg.fast_timeout(),
        ),
        Tier::Long => (
            prompts::full_prompt(snapshot, protein_target, today),
            cfg.long_timeout(),
        ),
        Tier::Reduced => (
            prompts::reduced_prompt(snapshot, protein_target, today),
            cfg.reduced_timeout(),
        ),
        Tier::Local => unreachable!("local tier never calls the provider"),
    };

    // Race the provider against the tier budget; a late result is dropped.
    match tokio::time::timeout(
        timeout,
        state
            .provider
            .complete(&prompt, cfg.max_tokens, cfg.temperature),
    )
    .await
    {
        Err(_) => Err(GenerationError::ProviderTimeout(timeout)),
        Ok(Err(e)) => Err(GenerationError::Provider(e)),
        Ok(Ok(text)) => Ok(text),
    }
}

/// A tier succeeds once both the summary and a non-empty meal list parse.
fn parse_output(tier: Tier, text: &str) -> Option<Extracted> {
    let summary_v = extractor::extract(prompts::SUMMARY_LABEL, text)?;
    let meals_v = extractor::extract(prompts::MEALS_LABEL, text)?;

    let meals: Vec<MealItem> = meals_v
        .get("items")?
        .as_array()?
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();
    if meals.is_empty() {
        return None;
    }

    let summary: Summary = serde_json::from_value(summary_v).unwrap_or_default();
    let hydration = extractor::extract(prompts::HYDRATION_LABEL, text)
        .and_then(|v| serde_json::from_value(v).ok());
    let beverages = extractor::extract(prompts::BEVERAGES_LABEL, text)
        .and_then(|v| serde_json::from_value(v).ok());

    Some(Extracted {
        tier,
        advice: advice_from(text),
        summary,
        meals,
        hydration,
        beverages,
    })
}

/// Prose before the first block marker; the whole text when there is none.
fn advice_from(text: &str) -> String {
    let labels = [
        prompts::SUMMARY_LABEL,
        prompts::MEALS_LABEL,
        prompts::HYDRATION_LABEL,
        prompts::BEVERAGES_LABEL,
    ];
    let cut = labels
        .iter()
        .filter_map(|l| text.find(&format!("{l}:")))
        .min()
        .unwrap_or(text.len());
    text[..cut].trim().to_string()
}

const SHORT_ADVICE_CHARS: usize = 400;

fn needs_booster(extracted: &Extracted) -> bool {
    matches!(extracted.tier, Tier::Reduced | Tier::Local)
        || extracted.advice.len() < SHORT_ADVICE_CHARS
}

/// One additional patient attempt with richer instructions. Best effort:
/// failure keeps the result already in hand.
async fn booster_retry(
    state: &AppState,
    snapshot: &UserProfileSnapshot,
    protein_target: f64,
    today: Date,
) -> Option<Extracted> {
    let cfg = &state.config.generation;
    let prompt = prompts::booster_prompt(snapshot, protein_target, today);
    let result = tokio::time::timeout(
        cfg.long_timeout(),
        state
            .provider
            .complete(&prompt, cfg.max_tokens, cfg.temperature),
    )
    .await;
    match result {
        Ok(Ok(text)) => parse_output(Tier::Long, &text),
        Ok(Err(e)) => {
            warn!(error = %e, "booster retry failed");
            None
        }
        Err(_) => {
            warn!("booster retry timed out");
            None
        }
    }
}

/// Repair, enforce and assemble the cacheable plan.
async fn finalize(
    state: &AppState,
    snapshot: &UserProfileSnapshot,
    extracted: Extracted,
    hash: &str,
    protein_target: f64,
    today: Date,
    started: Instant,
) -> CachedPlan {
    let mut summary = extracted.summary;
    if summary.kcal_objetivo <= 0.0 {
        // The model skipped or mangled the numbers; recompute them all.
        warn!(user_id = %snapshot.user_id, "repaired summary from profile arithmetic");
        summary = fallback::compute_summary(snapshot, protein_target, today);
    }
    if snapshot.protein_target_g.is_some() {
        summary.proteinas_g = protein_target;
    }
    summary.sanitize();

    let items = enforce_meal_types(state, snapshot, extracted.meals, protein_target).await;

    let iso_week = u32::from(today.iso_week());
    let mut pools = BTreeMap::new();
    for meal_type in &snapshot.meal_types {
        match state
            .recipe_catalog
            .search_by_type_and_allowed(*meal_type, &snapshot.allowed_ingredient_ids, 12)
            .await
        {
            Ok(pool) => {
                pools.insert(*meal_type, pool);
            }
            Err(e) => warn!(error = %e, meal_type = meal_type.label(), "catalog search failed"),
        }
    }
    let semana = rotation::build_week(
        &WeekInputs {
            user_id: snapshot.user_id,
            iso_week,
            meal_types: &snapshot.meal_types,
            diet_days: &snapshot.diet_days,
            daily_protein_g: summary.proteinas_g,
        },
        &pools,
    );

    // Meal types whose catalog pool cannot fill the rotation groups get
    // synthesized variants from ingredient substitution instead.
    let mut variant_map = BTreeMap::new();
    for meal_type in &snapshot.meal_types {
        let pool_len = pools.get(meal_type).map_or(0, Vec::len);
        if pool_len >= 4 {
            continue;
        }
        let Some(base) = items.iter().find(|m| m.tipo == *meal_type) else {
            continue;
        };
        let seed = rotation_seed(snapshot.user_id, *meal_type, iso_week);
        let synthesized =
            variants::synthesize_variants(base, &items, &snapshot.preferred_foods, 4, seed);
        if synthesized.len() > 1 {
            variant_map.insert(meal_type.label().to_string(), synthesized);
        }
    }

    let hydration = extracted.hydration.unwrap_or_else(|| HydrationBlock {
        litros: (snapshot.weight_kg * 0.035 * 10.0).round() / 10.0,
    });
    let beverages = extracted.beverages.unwrap_or_default();

    let advice = if extracted.advice.is_empty() {
        fallback::generate(snapshot, today).advice
    } else {
        extracted.advice
    };

    let model = match extracted.tier {
        Tier::Local => "local".to_string(),
        tier => format!("{}:{}", tier.label(), state.provider.model_name()),
    };

    CachedPlan {
        advice,
        summary,
        meals: MealsBlock {
            items,
            variants: if variant_map.is_empty() {
                None
            } else {
                Some(variant_map)
            },
            semana,
        },
        hydration,
        beverages,
        hash: hash.to_string(),
        model,
        generated_ms: started.elapsed().as_millis() as i64,
        ts: OffsetDateTime::now_utc(),
    }
}

/// The final meal list carries exactly the user's enabled meal types, in the
/// user's order. Missing slots are synthesized from saved foods; extra or
/// duplicate model output is dropped. Macros are always recomputed.
async fn enforce_meal_types(
    state: &AppState,
    snapshot: &UserProfileSnapshot,
    mut extracted: Vec<MealItem>,
    protein_target: f64,
) -> Vec<MealItem> {
    let weights = protein_weights(&snapshot.meal_types);
    let mut out = Vec::with_capacity(snapshot.meal_types.len());
    for (meal_type, weight) in snapshot.meal_types.iter().zip(weights.iter()) {
        let mut meal = match extracted.iter().position(|m| m.tipo == *meal_type) {
            Some(i) => extracted.remove(i),
            None => {
                warn!(
                    user_id = %snapshot.user_id,
                    meal_type = meal_type.label(),
                    "synthesized missing meal"
                );
                fallback::basic_meal(snapshot, *meal_type, protein_target * weight)
            }
        };
        repair_macros(state, &mut meal).await;
        out.push(meal);
    }
    out
}

/// Macros are derived, never authored: recompute from the ingredient list,
/// reconciling stored facts with the heuristic table.
async fn repair_macros(state: &AppState, meal: &mut MealItem) {
    let mut portions = Vec::with_capacity(meal.ingredientes.len());
    for ing in &mut meal.ingredientes {
        ing.gramos = ing.gramos.max(0.0);
        let stored = match state.nutrition_facts.lookup(&ing.alimento).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(error = %e, alimento = %ing.alimento, "facts lookup failed");
                None
            }
        };
        portions.push(IngredientPortion {
            name: ing.alimento.clone(),
            grams: ing.gramos,
            stored,
        });
    }
    let computed = macro_engine::compute(meal.porciones.max(0.0), &portions);
    if meal.macros != Default::default() && meal.macros != computed {
        warn!(nombre = %meal.nombre, "repaired authored meal macros");
    }
    meal.macros = computed;
}
