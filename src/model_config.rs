use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::edge::EdgeThresholds;
use crate::innings_sim::InningsModel;
use crate::live::LiveModel;

const CACHE_DIR: &str = "matchpredictor";
pub const CONFIG_PATH_ENV: &str = "MATCHPREDICTOR_CONFIG";

/// Every tunable constant of the model. Missing keys in a config file fall back to the
/// calibrated defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Runs added to the first-innings mean per unit of dew risk under lights.
    pub dew_runs_first_innings: f64,
    /// Runs added to the chase mean per unit of dew risk under lights.
    pub dew_runs_chase: f64,
    pub batter_absence_run_penalty: f64,
    pub bowler_absence_wicket_boost: f64,
    /// Reported (not sampled) innings spread as a fraction of the target mean.
    pub reported_std_fraction: f64,
    pub trials: usize,
    pub seed: u64,
    pub innings: InningsModel,
    pub live: LiveModel,
    pub edge: EdgeThresholds,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dew_runs_first_innings: 8.0,
            dew_runs_chase: 6.0,
            batter_absence_run_penalty: 12.0,
            bowler_absence_wicket_boost: 0.08,
            reported_std_fraction: 0.12,
            trials: 10_000,
            seed: 42,
            innings: InningsModel::default(),
            live: LiveModel::default(),
            edge: EdgeThresholds::default(),
        }
    }
}

impl ModelConfig {
    /// Resolve the effective configuration: explicit path, then `MATCHPREDICTOR_CONFIG`, then
    /// built-in defaults, with `MP_*` environment overrides applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_PATH_ENV).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from));

        let mut cfg = match path {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("read model config {}", path.display()))?;
                let cfg = Self::from_json_str(&raw)
                    .with_context(|| format!("parse model config {}", path.display()))?;
                debug!(path = %path.display(), "loaded model config");
                cfg
            }
            None => Self::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw.trim()).context("invalid model config json")
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(trials) = env_parse::<usize>("MP_TRIALS") {
            self.trials = trials.max(1);
        }
        if let Some(seed) = env_parse::<u64>("MP_SEED") {
            self.seed = seed;
        }
        if let Some(min_edge) = env_parse::<f64>("MP_MIN_EDGE") {
            self.edge.min_edge_percent = min_edge;
        }
        if let Some(strong_edge) = env_parse::<f64>("MP_STRONG_EDGE") {
            self.edge.strong_edge_percent = strong_edge;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<T>().ok())
}

/// Loads `.env.local` then `.env` so binaries pick up `MP_*` and `RUST_LOG` settings.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

/// Write JSON next to `path` and swap it into place.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}
