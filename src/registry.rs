use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::model_config::{app_cache_dir, write_json_atomic};

const REGISTRY_FILE: &str = "registries.json";

/// Aggregate first-innings statistics for one ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VenueStats {
    pub avg_first_innings_runs: f64,
    pub avg_powerplay_runs: f64,
    /// Fraction of matches won by the side batting second.
    pub chase_advantage: f64,
    pub dew_risk: f64,
}

impl VenueStats {
    pub const fn fallback() -> Self {
        Self {
            avg_first_innings_runs: 162.0,
            avg_powerplay_runs: 50.0,
            chase_advantage: 0.50,
            dew_risk: 0.40,
        }
    }
}

impl Default for VenueStats {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Result of a registry lookup. `Fallback` carries the documented default for a miss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<T> {
    Known(T),
    Fallback(T),
}

impl<T: Copy> Lookup<T> {
    pub fn value(&self) -> T {
        match self {
            Lookup::Known(v) | Lookup::Fallback(v) => *v,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Lookup::Known(_))
    }
}

pub trait VenueRegistry {
    fn resolve(&self, venue: &str) -> Lookup<VenueStats>;
}

pub trait TossBoostRegistry {
    /// Win-probability boost for the side that wins the toss and fields.
    fn resolve(&self, venue: &str) -> Lookup<f64>;
}

pub trait StageMultipliers {
    fn resolve(&self, stage: &str) -> Lookup<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueTable {
    pub venues: HashMap<String, VenueStats>,
    #[serde(default)]
    pub fallback: VenueStats,
}

impl VenueRegistry for VenueTable {
    fn resolve(&self, venue: &str) -> Lookup<VenueStats> {
        match self.venues.get(venue) {
            Some(stats) => Lookup::Known(*stats),
            None => Lookup::Fallback(self.fallback),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TossBoostTable {
    pub boosts: HashMap<String, f64>,
    #[serde(default = "default_toss_boost")]
    pub default_boost: f64,
}

fn default_toss_boost() -> f64 {
    0.05
}

impl TossBoostRegistry for TossBoostTable {
    fn resolve(&self, venue: &str) -> Lookup<f64> {
        match self.boosts.get(venue) {
            Some(boost) => Lookup::Known(*boost),
            None => Lookup::Fallback(self.default_boost),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTable {
    pub multipliers: HashMap<String, f64>,
    #[serde(default = "default_stage_multiplier")]
    pub default_multiplier: f64,
}

fn default_stage_multiplier() -> f64 {
    1.0
}

impl StageMultipliers for StageTable {
    fn resolve(&self, stage: &str) -> Lookup<f64> {
        match self.multipliers.get(stage) {
            Some(m) => Lookup::Known(*m),
            None => Lookup::Fallback(self.default_multiplier),
        }
    }
}

/// The three lookup tables, persisted together as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registries {
    pub venues: VenueTable,
    pub toss: TossBoostTable,
    pub stages: StageTable,
}

static BUILTIN: Lazy<Registries> = Lazy::new(builtin_tables);

impl Registries {
    /// IPL tables derived from 1169 Cricsheet matches.
    pub fn builtin() -> &'static Registries {
        &BUILTIN
    }

    pub fn default_path() -> Option<PathBuf> {
        app_cache_dir().map(|dir| dir.join(REGISTRY_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read registries {}", path.display()))?;
        serde_json::from_str(raw.trim())
            .with_context(|| format!("parse registries {}", path.display()))
    }

    /// Calibrated tables from the cache dir when present, otherwise the built-in set.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        match path {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::builtin().clone()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self).context("save registries")
    }
}

fn builtin_tables() -> Registries {
    // (venue, avg first innings, avg powerplay, chase advantage, dew risk)
    let venues: &[(&str, f64, f64, f64, f64)] = &[
        ("Wankhede Stadium, Mumbai", 177.0, 54.0, 0.591, 0.85),
        ("Wankhede Stadium", 166.0, 51.0, 0.510, 0.85),
        ("Eden Gardens, Kolkata", 197.0, 57.0, 0.389, 0.80),
        ("Eden Gardens", 160.0, 49.0, 0.633, 0.80),
        ("M Chinnaswamy Stadium", 168.0, 52.0, 0.544, 0.40),
        ("M Chinnaswamy Stadium, Bengaluru", 168.0, 52.0, 0.474, 0.40),
        ("M.Chinnaswamy Stadium", 168.0, 52.0, 0.500, 0.40),
        ("Feroz Shah Kotla", 162.0, 50.0, 0.559, 0.50),
        ("Arun Jaitley Stadium, Delhi", 200.0, 58.0, 0.444, 0.50),
        ("MA Chidambaram Stadium, Chepauk", 166.0, 48.0, 0.382, 0.30),
        ("MA Chidambaram Stadium, Chepauk, Chennai", 164.0, 48.0, 0.385, 0.30),
        ("Rajiv Gandhi International Stadium, Uppal", 156.0, 48.0, 0.217, 0.60),
        ("Rajiv Gandhi International Stadium, Uppal, Hyderabad", 156.0, 48.0, 0.545, 0.60),
        ("Rajiv Gandhi International Stadium", 156.0, 48.0, 0.300, 0.60),
        ("Narendra Modi Stadium, Ahmedabad", 187.0, 55.0, 0.481, 0.35),
        ("Punjab Cricket Association Stadium, Mohali", 163.0, 51.0, 0.524, 0.45),
        ("Sawai Mansingh Stadium", 158.0, 49.0, 0.678, 0.45),
        ("Maharashtra Cricket Association Stadium", 166.0, 51.0, 0.650, 0.50),
        ("Dr DY Patil Sports Academy, Mumbai", 171.0, 53.0, 0.529, 0.75),
        ("Dubai International Cricket Stadium", 164.0, 50.0, 0.407, 0.20),
        ("Sharjah Cricket Stadium", 159.0, 49.0, 0.650, 0.15),
        ("Sheikh Zayed Stadium", 159.0, 49.0, 0.429, 0.15),
        ("Brabourne Stadium, Mumbai", 162.0, 50.0, 0.500, 0.75),
        (
            "Bharat Ratna Shri Atal Bihari Vajpayee Ekana Cricket Stadium, Lucknow",
            175.0,
            54.0,
            0.625,
            0.55,
        ),
        ("Subrata Roy Sahara Stadium", 160.0, 50.0, 0.600, 0.45),
    ];

    // field_win_rate - 0.50 per ground
    let toss: &[(&str, f64)] = &[
        ("Sawai Mansingh Stadium", 0.179),
        ("Sharjah Cricket Stadium", 0.150),
        ("Maharashtra Cricket Association Stadium", 0.150),
        ("Eden Gardens", 0.132),
        ("Bharat Ratna Shri Atal Bihari Vajpayee Ekana Cricket Stadium, Lucknow", 0.125),
        ("Dr DY Patil Sports Academy, Mumbai", 0.100),
        ("Wankhede Stadium, Mumbai", 0.091),
        ("Feroz Shah Kotla", 0.059),
        ("M Chinnaswamy Stadium", 0.044),
        ("Punjab Cricket Association Stadium, Mohali", 0.024),
        ("MA Chidambaram Stadium, Chepauk, Chennai", 0.024),
        ("Wankhede Stadium", 0.010),
        ("Narendra Modi Stadium, Ahmedabad", -0.019),
        ("M Chinnaswamy Stadium, Bengaluru", -0.026),
        ("Rajiv Gandhi International Stadium, Uppal", -0.038),
        ("Arun Jaitley Stadium, Delhi", -0.056),
        ("Dubai International Cricket Stadium", -0.093),
        ("Eden Gardens, Kolkata", -0.111),
        ("Rajiv Gandhi International Stadium, Uppal, Hyderabad", 0.045),
    ];

    let stages: &[(&str, f64)] = &[
        ("league_early", 1.05),
        ("league_mid", 1.00),
        ("league_late", 0.97),
        ("qualifier", 0.96),
        ("eliminator", 0.95),
        ("final", 0.94),
    ];

    Registries {
        venues: VenueTable {
            venues: venues
                .iter()
                .map(|(name, runs, pp, chase, dew)| {
                    (
                        (*name).to_string(),
                        VenueStats {
                            avg_first_innings_runs: *runs,
                            avg_powerplay_runs: *pp,
                            chase_advantage: *chase,
                            dew_risk: *dew,
                        },
                    )
                })
                .collect(),
            fallback: VenueStats::fallback(),
        },
        toss: TossBoostTable {
            boosts: toss.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            default_boost: default_toss_boost(),
        },
        stages: StageTable {
            multipliers: stages.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
            default_multiplier: default_stage_multiplier(),
        },
    }
}
