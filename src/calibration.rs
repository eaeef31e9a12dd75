//! Derive venue, toss and session tables from stored Cricsheet history.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cricsheet::{DeliveryRecord, MatchRecord};
use crate::innings_sim::{CHECKPOINT_OVERS, POWERPLAY_OVERS};
use crate::registry::{Registries, TossBoostRegistry, VenueRegistry, VenueStats};

/// Matches needed before a ground's own numbers fully replace the prior.
pub const FULL_WEIGHT_MATCHES: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionStat {
    pub mean_runs: f64,
    pub std_runs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueCalibration {
    pub venue: String,
    /// Matches with first-innings ball data.
    pub sample_matches: usize,
    /// Decided matches used for the chase and toss rates.
    pub decided_matches: usize,
    pub first_innings_mean: f64,
    pub first_innings_std: f64,
    pub powerplay_mean: f64,
    pub chase_advantage: f64,
    pub toss_field_boost: f64,
    pub sessions: BTreeMap<u8, SessionStat>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub venues: Vec<VenueCalibration>,
}

impl CalibrationReport {
    pub fn venue(&self, name: &str) -> Option<&VenueCalibration> {
        self.venues.iter().find(|v| v.venue == name)
    }

    /// Fold the calibrated numbers into `base`. Dew risk cannot be read off ball data, so each
    /// ground keeps the value `base` resolves for it.
    pub fn to_registries(&self, base: &Registries) -> Registries {
        let mut out = base.clone();
        for v in &self.venues {
            let prior = base.venues.resolve(&v.venue).value();
            out.venues.venues.insert(
                v.venue.clone(),
                VenueStats {
                    avg_first_innings_runs: round1(v.first_innings_mean),
                    avg_powerplay_runs: round1(v.powerplay_mean),
                    chase_advantage: round3(v.chase_advantage),
                    dew_risk: prior.dew_risk,
                },
            );
            out.toss.boosts.insert(v.venue.clone(), round3(v.toss_field_boost));
        }
        out
    }
}

#[derive(Default)]
struct VenueAccum {
    first_innings_totals: Vec<f64>,
    checkpoint_totals: BTreeMap<u8, Vec<f64>>,
    decided: usize,
    chase_wins: usize,
    field_decided: usize,
    field_toss_wins: usize,
}

/// Per-venue calibration. `first_innings` should hold innings-1 deliveries only; others are
/// ignored. Venues are returned busiest first, then by name.
pub fn calibrate(
    matches: &[MatchRecord],
    first_innings: &[DeliveryRecord],
    priors: &Registries,
) -> CalibrationReport {
    let mut by_match: HashMap<&str, Vec<&DeliveryRecord>> = HashMap::new();
    for d in first_innings.iter().filter(|d| d.innings == 1) {
        by_match.entry(d.match_id.as_str()).or_default().push(d);
    }

    let mut venues: HashMap<&str, VenueAccum> = HashMap::new();
    for m in matches {
        let acc = venues.entry(m.venue.as_str()).or_default();

        if let Some(balls) = by_match.get(m.match_id.as_str()) {
            let total: u32 = balls.iter().map(|d| d.runs_total).sum();
            acc.first_innings_totals.push(f64::from(total));
            for cp in CHECKPOINT_OVERS {
                let runs: u32 = balls
                    .iter()
                    .filter(|d| d.over <= cp)
                    .map(|d| d.runs_total)
                    .sum();
                acc.checkpoint_totals.entry(cp).or_default().push(f64::from(runs));
            }
        }

        if m.has_winner() {
            acc.decided += 1;
            if m.win_by_wickets > 0 {
                acc.chase_wins += 1;
            }
            if m.toss_decision == "field" {
                acc.field_decided += 1;
                if m.toss_winner == m.winner {
                    acc.field_toss_wins += 1;
                }
            }
        }
    }

    let mut out = venues
        .into_iter()
        .map(|(venue, acc)| summarize(venue, &acc, priors))
        .collect::<Vec<_>>();
    out.sort_by(|a, b| {
        b.sample_matches
            .cmp(&a.sample_matches)
            .then_with(|| a.venue.cmp(&b.venue))
    });
    CalibrationReport { venues: out }
}

fn summarize(venue: &str, acc: &VenueAccum, priors: &Registries) -> VenueCalibration {
    let prior = priors.venues.resolve(venue).value();
    let prior_toss = priors.toss.resolve(venue).value();

    let n = acc.first_innings_totals.len();
    let w_runs = shrink_weight(n);
    let (raw_mean, raw_std) = sample_mean_std(&acc.first_innings_totals);
    let raw_pp = acc
        .checkpoint_totals
        .get(&(POWERPLAY_OVERS as u8))
        .map(|v| sample_mean_std(v).0)
        .unwrap_or(prior.avg_powerplay_runs);

    let w_chase = shrink_weight(acc.decided);
    let raw_chase = ratio(acc.chase_wins, acc.decided).unwrap_or(prior.chase_advantage);
    let w_toss = shrink_weight(acc.field_decided);
    let raw_toss = ratio(acc.field_toss_wins, acc.field_decided)
        .map(|rate| rate - 0.5)
        .unwrap_or(prior_toss);

    let sessions = acc
        .checkpoint_totals
        .iter()
        .map(|(cp, totals)| {
            let (mean_runs, std_runs) = sample_mean_std(totals);
            (*cp, SessionStat { mean_runs, std_runs })
        })
        .collect();

    VenueCalibration {
        venue: venue.to_string(),
        sample_matches: n,
        decided_matches: acc.decided,
        first_innings_mean: blend(prior.avg_first_innings_runs, raw_mean, w_runs),
        first_innings_std: raw_std,
        powerplay_mean: blend(prior.avg_powerplay_runs, raw_pp, w_runs),
        chase_advantage: blend(prior.chase_advantage, raw_chase, w_chase),
        toss_field_boost: blend(prior_toss, raw_toss, w_toss),
        sessions,
    }
}

/// 0 with no data, 1 at `FULL_WEIGHT_MATCHES` or more.
pub fn shrink_weight(n: usize) -> f64 {
    ((n as f64) / FULL_WEIGHT_MATCHES).clamp(0.0, 1.0)
}

fn blend(prior: f64, observed: f64, w: f64) -> f64 {
    (1.0 - w) * prior + w * observed
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// Mean and sample (n - 1) standard deviation.
fn sample_mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
