use std::time::Duration;

use serde::Deserialize;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Tier A: full prompt, short timeout.
    pub fast_timeout_ms: u64,
    /// Tier B: full prompt, patient timeout.
    pub long_timeout_ms: u64,
    /// Tier C: reduced prompt, short timeout.
    pub reduced_timeout_ms: u64,
    /// Prefetch watchdog wall-clock budget.
    pub watchdog_budget_ms: u64,
    /// Skip the patient tier entirely (cheap deployments).
    pub fast_mode: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationConfig {
    pub fn fast_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_timeout_ms)
    }
    pub fn long_timeout(&self) -> Duration {
        Duration::from_millis(self.long_timeout_ms)
    }
    pub fn reduced_timeout(&self) -> Duration {
        Duration::from_millis(self.reduced_timeout_ms)
    }
    pub fn watchdog_budget(&self) -> Duration {
        Duration::from_millis(self.watchdog_budget_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub generation: GenerationConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let generation = GenerationConfig {
            fast_timeout_ms: env_u64("GEN_FAST_TIMEOUT_MS", 8_000),
            long_timeout_ms: env_u64("GEN_LONG_TIMEOUT_MS", 30_000),
            reduced_timeout_ms: env_u64("GEN_REDUCED_TIMEOUT_MS", 8_000),
            watchdog_budget_ms: env_u64("GEN_WATCHDOG_BUDGET_MS", 45_000),
            fast_mode: std::env::var("GEN_FAST_MODE")
                .map(|v| v == "1" || v == "true")
                .unwrap_or(false),
            max_tokens: env_u64("GEN_MAX_TOKENS", 1_800) as u32,
            temperature: std::env::var("GEN_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
        };
        Ok(Self {
            database_url,
            generation,
        })
    }
}
