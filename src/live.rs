//! In-play projection of the rest of a first innings, over by over.
//!
//! Unlike the pre-match engine this model does end the innings at ten wickets.

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::edge::{EdgeThresholds, EvSignal, OddsTable, SESSION_RUNS_MARKET, evaluate_quote};
use crate::innings_sim::{BALLS_PER_OVER, CHECKPOINT_OVERS, INNINGS_BALLS, INNINGS_OVERS, TrialStreams};
use crate::match_sim::{LineProbability, SessionLines, mean_std, share_above};

const LIVE_STREAM: u32 = 7;
const ALL_OUT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveModel {
    pub powerplay_run_rate: f64,
    pub middle_run_rate: f64,
    pub death_run_rate: f64,
    /// Weight on the current run rate when blending with the phase rate.
    pub current_rate_weight: f64,
    /// Run rate assumed before the first ball.
    pub opening_run_rate: f64,
    pub run_rate_penalty_per_wicket: f64,
    pub min_run_rate: f64,
    pub over_runs_std: f64,
    pub max_over_runs: u32,
    pub base_wicket_prob: f64,
    pub wicket_prob_per_wicket: f64,
}

impl Default for LiveModel {
    fn default() -> Self {
        Self {
            powerplay_run_rate: 9.0,
            middle_run_rate: 7.5,
            death_run_rate: 10.5,
            current_rate_weight: 0.3,
            opening_run_rate: 8.0,
            run_rate_penalty_per_wicket: 0.045,
            min_run_rate: 4.0,
            over_runs_std: 2.8,
            max_over_runs: 36,
            base_wicket_prob: 0.10,
            wicket_prob_per_wicket: 0.008,
        }
    }
}

impl LiveModel {
    fn phase_rate(&self, over_index: usize) -> f64 {
        if over_index < 6 {
            self.powerplay_run_rate
        } else if over_index < 15 {
            self.middle_run_rate
        } else {
            self.death_run_rate
        }
    }
}

/// Score after a given number of legal deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveState {
    pub runs: u32,
    pub wickets: u32,
    pub balls: u32,
}

impl LiveState {
    pub fn new(runs: u32, wickets: u32, balls: u32) -> Result<Self> {
        if wickets > ALL_OUT {
            return Err(anyhow!("wickets must be 0-10, got {wickets}"));
        }
        if balls as usize > INNINGS_BALLS {
            return Err(anyhow!("balls must be 0-{INNINGS_BALLS}, got {balls}"));
        }
        Ok(Self {
            runs,
            wickets,
            balls,
        })
    }

    /// Parse `"54/1"` and `"6.2"` (overs.balls) into a state.
    pub fn parse(score: &str, overs: &str) -> Result<Self> {
        let score = score.trim();
        let (runs, wickets) = match score.split_once('/') {
            Some((r, w)) => (r, w),
            None => (score, "0"),
        };
        let runs = runs
            .trim()
            .parse::<u32>()
            .with_context(|| format!("invalid runs in '{score}'"))?;
        let wickets = wickets
            .trim()
            .parse::<u32>()
            .with_context(|| format!("invalid wickets in '{score}'"))?;
        Self::new(runs, wickets, parse_overs(overs)?)
    }

    pub fn completed_overs(&self) -> usize {
        self.balls as usize / BALLS_PER_OVER
    }

    pub fn run_rate(&self) -> Option<f64> {
        (self.balls > 0).then(|| f64::from(self.runs) / f64::from(self.balls) * BALLS_PER_OVER as f64)
    }
}

/// `"6.2"` means six overs and two balls.
pub fn parse_overs(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    let (whole, part) = match raw.split_once('.') {
        Some((w, p)) => (w, p),
        None => (raw, "0"),
    };
    let whole = whole
        .parse::<u32>()
        .with_context(|| format!("invalid overs '{raw}'"))?;
    let part = if part.is_empty() {
        0
    } else {
        part.parse::<u32>()
            .with_context(|| format!("invalid overs '{raw}'"))?
    };
    if part >= BALLS_PER_OVER as u32 {
        return Err(anyhow!("invalid overs '{raw}': ball part must be 0-5"));
    }
    Ok(whole * BALLS_PER_OVER as u32 + part)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointProjection {
    pub over: u8,
    pub mean_runs: f64,
    pub std_runs: f64,
    pub lines: Vec<LineProbability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveProjection {
    pub state: LiveState,
    /// Checkpoints not yet reached, in order.
    pub checkpoints: Vec<CheckpointProjection>,
    pub final_mean: f64,
    pub final_median: f64,
    pub final_p10: f64,
    pub final_p90: f64,
    pub trials: usize,
}

impl LiveProjection {
    pub fn checkpoint(&self, over: u8) -> Option<&CheckpointProjection> {
        self.checkpoints.iter().find(|c| c.over == over)
    }
}

/// Simulate `trials` completions of the innings from `state`.
pub fn project(
    state: LiveState,
    lines: &SessionLines,
    model: &LiveModel,
    trials: usize,
    seed: u64,
) -> LiveProjection {
    let trials = trials.max(1);
    let streams = TrialStreams::new(seed, LIVE_STREAM);
    let paths = (0..trials)
        .into_par_iter()
        .map(|trial| {
            let mut rng = streams.rng(trial);
            complete_innings(&mut rng, state, model)
        })
        .collect::<Vec<_>>();

    let mut checkpoints = Vec::new();
    for (idx, over) in CHECKPOINT_OVERS.iter().enumerate() {
        if usize::from(*over) * BALLS_PER_OVER <= state.balls as usize {
            continue;
        }
        let scores = paths.iter().map(|p| p[idx]).collect::<Vec<_>>();
        let (mean_runs, std_runs) = mean_std(&scores);
        let lines = lines
            .get(over)
            .map(|ls| {
                ls.iter()
                    .map(|line| LineProbability {
                        line: *line,
                        prob_over: share_above(&scores, *line),
                    })
                    .collect()
            })
            .unwrap_or_default();
        checkpoints.push(CheckpointProjection {
            over: *over,
            mean_runs,
            std_runs,
            lines,
        });
    }

    let mut finals = paths
        .iter()
        .map(|p| f64::from(p[CHECKPOINT_OVERS.len() - 1]))
        .collect::<Vec<_>>();
    finals.sort_by(f64::total_cmp);
    let final_mean = finals.iter().sum::<f64>() / finals.len() as f64;

    LiveProjection {
        state,
        checkpoints,
        final_mean,
        final_median: percentile(&finals, 50.0),
        final_p10: percentile(&finals, 10.0),
        final_p90: percentile(&finals, 90.0),
        trials,
    }
}

/// Score at each checkpoint for one simulated completion.
fn complete_innings<R: Rng>(
    rng: &mut R,
    state: LiveState,
    model: &LiveModel,
) -> [u32; CHECKPOINT_OVERS.len()] {
    let current_rr = state.run_rate().unwrap_or(model.opening_run_rate);
    let mut score = state.runs;
    let mut wickets = state.wickets;
    let mut by_over = [state.runs; INNINGS_OVERS + 1];

    let first_over = state.completed_overs();
    let balls_into_over = state.balls as usize % BALLS_PER_OVER;
    for over in first_over..INNINGS_OVERS {
        if wickets < ALL_OUT {
            let blend = current_rr * model.current_rate_weight
                + model.phase_rate(over) * (1.0 - model.current_rate_weight);
            let wicket_factor = 1.0 - f64::from(wickets) * model.run_rate_penalty_per_wicket;
            // the rest of a part-played over carries that share of both runs and wicket risk
            let share = if over == first_over && balls_into_over > 0 {
                (BALLS_PER_OVER - balls_into_over) as f64 / BALLS_PER_OVER as f64
            } else {
                1.0
            };
            let expected = (blend * wicket_factor).max(model.min_run_rate) * share;
            let z: f64 = rng.sample(StandardNormal);
            let drawn = expected + model.over_runs_std * z;
            let over_runs = (drawn.max(0.0) as u32).min(model.max_over_runs);

            let wicket_prob = ((model.base_wicket_prob
                + f64::from(wickets) * model.wicket_prob_per_wicket)
                * share)
                .clamp(0.0, 1.0);
            if rng.gen_bool(wicket_prob) {
                wickets += 1;
            }
            // runs from the over that ends the innings are not kept
            if wickets < ALL_OUT {
                score += over_runs;
            }
        }
        by_over[over + 1] = score;
    }

    let mut out = [0u32; CHECKPOINT_OVERS.len()];
    for (idx, over) in CHECKPOINT_OVERS.iter().enumerate() {
        out[idx] = by_over[usize::from(*over)];
    }
    out
}

/// Linear-interpolated percentile over sorted values.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Session-line signals for the checkpoints still ahead.
pub fn session_edges(
    projection: &LiveProjection,
    odds: &OddsTable,
    thresholds: &EdgeThresholds,
) -> Vec<EvSignal> {
    let mut out = Vec::new();
    for cp in &projection.checkpoints {
        let Some(quotes) = odds.session_runs.get(&cp.over) else {
            continue;
        };
        for line in &cp.lines {
            for (direction, prob, quote) in [
                ("Over", line.prob_over, quotes.over),
                ("Under", 1.0 - line.prob_over, quotes.under),
            ] {
                let Some(quote) = quote.filter(|q| *q > 1.0) else {
                    continue;
                };
                let selection = format!("Runs {direction} {} at {} overs", line.line, cp.over);
                let reasoning = format!(
                    "Live {}/{}: model {:.1}% vs implied {:.1}%",
                    projection.state.runs,
                    projection.state.wickets,
                    prob * 100.0,
                    100.0 / quote
                );
                if let Some(sig) =
                    evaluate_quote(SESSION_RUNS_MARKET, &selection, prob, quote, reasoning, thresholds)
                {
                    out.push(sig);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overs_notation_counts_balls() {
        assert_eq!(parse_overs("6.0").unwrap(), 36);
        assert_eq!(parse_overs("6.2").unwrap(), 38);
        assert_eq!(parse_overs("10").unwrap(), 60);
        assert!(parse_overs("6.6").is_err());
        assert!(parse_overs("six").is_err());
    }

    #[test]
    fn parses_score_strings() {
        let s = LiveState::parse("54/1", "6.0").unwrap();
        assert_eq!((s.runs, s.wickets, s.balls), (54, 1, 36));
        assert_eq!(s.run_rate(), Some(9.0));
        assert!(LiveState::parse("54/11", "6.0").is_err());
        assert!(LiveState::parse("54/1", "20.1").is_err());
        assert_eq!(LiveState::parse("12", "1.3").unwrap().wickets, 0);
    }

    #[test]
    fn passed_checkpoints_are_dropped() {
        let state = LiveState::new(54, 1, 36).unwrap();
        let proj = project(state, &SessionLines::new(), &LiveModel::default(), 400, 3);
        let overs = proj.checkpoints.iter().map(|c| c.over).collect::<Vec<_>>();
        assert_eq!(overs, vec![10, 15, 20]);
        assert!(proj.final_mean > 54.0);
        assert!(proj.final_p10 <= proj.final_median && proj.final_median <= proj.final_p90);
    }

    #[test]
    fn all_out_stops_scoring() {
        let state = LiveState::new(80, 10, 72).unwrap();
        let proj = project(state, &SessionLines::new(), &LiveModel::default(), 50, 1);
        assert_eq!(proj.final_mean, 80.0);
        assert_eq!(proj.final_p90, 80.0);
    }

    #[test]
    fn tenth_wicket_over_keeps_no_runs() {
        let model = LiveModel {
            base_wicket_prob: 1.0,
            ..LiveModel::default()
        };
        let state = LiveState::new(120, 9, 90).unwrap();
        let proj = project(state, &SessionLines::new(), &model, 200, 4);
        assert_eq!(proj.final_mean, 120.0);
        assert_eq!(proj.final_p90, 120.0);
    }

    #[test]
    fn part_played_over_scales_wicket_risk() {
        let model = LiveModel {
            base_wicket_prob: 1.0,
            ..LiveModel::default()
        };
        // half an over left, so the tenth wicket falls there only half the time
        let state = LiveState::new(120, 9, 93).unwrap();
        let proj = project(state, &SessionLines::new(), &model, 400, 4);
        assert!(proj.final_p90 > 120.0);
        assert!(proj.final_mean < 120.0 + 6.0);
    }

    #[test]
    fn projection_is_reproducible() {
        let state = LiveState::new(30, 0, 24).unwrap();
        let mut lines = SessionLines::new();
        lines.insert(6, vec![47.0, 51.0]);
        let a = project(state, &lines, &LiveModel::default(), 500, 99);
        let b = project(state, &lines, &LiveModel::default(), 500, 99);
        assert_eq!(a, b);
        let six = a.checkpoint(6).expect("over 6 ahead");
        assert!(six.lines[0].prob_over >= six.lines[1].prob_over);
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 50.0), 2.5);
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
    }
}
