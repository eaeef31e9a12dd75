use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::MatchContext;
use crate::error::PairingError;
use crate::innings_sim::{
    CHECKPOINT_OVERS, InningsSamples, InningsSimulator, InningsTarget, SeedMode, TrialStreams,
};
use crate::model_config::ModelConfig;

const FIRST_INNINGS_STREAM: u32 = 1;
const SECOND_INNINGS_STREAM: u32 = 2;

/// Caller-supplied session lines per checkpoint over, in quoting order.
pub type SessionLines = BTreeMap<u8, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineProbability {
    pub line: f64,
    /// Share of trials strictly above the line.
    pub prob_over: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub over: u8,
    pub mean_runs: f64,
    pub std_runs: f64,
    pub lines: Vec<LineProbability>,
}

impl SessionResult {
    pub fn prob_over(&self, line: f64) -> Option<f64> {
        self.lines
            .iter()
            .find(|l| l.line == line)
            .map(|l| l.prob_over)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub team_batting_first: String,
    pub team_batting_second: String,
    pub win_prob_batting_first: f64,
    pub win_prob_batting_second: f64,
    pub innings1_target: f64,
    /// Heuristic spread (a fixed fraction of the target), reported only.
    pub innings1_model_std: f64,
    pub innings1_mean: f64,
    pub innings1_std: f64,
    pub innings2_target: f64,
    pub innings2_model_std: f64,
    pub innings2_mean: f64,
    pub innings2_std: f64,
    pub sessions: Vec<SessionResult>,
    pub trials: usize,
    pub seed: u64,
}

impl SimulationResult {
    pub fn session(&self, over: u8) -> Option<&SessionResult> {
        self.sessions.iter().find(|s| s.over == over)
    }
}

/// First- and second-innings targets for a context.
pub fn innings_targets(ctx: &MatchContext, config: &ModelConfig) -> (InningsTarget, InningsTarget) {
    let first_mean = ctx.first_innings_mean();

    let dew_boost = if ctx.match_time.under_lights() {
        ctx.dew_risk * config.dew_runs_chase
    } else {
        0.0
    };
    let toss_boost = if ctx.toss_winner_bats_second() {
        ctx.toss_win_prob_boost * first_mean
    } else {
        0.0
    };
    // chase_advantage sits around 0.5, so doubling centres the multiplier on 1.0
    let second_mean = first_mean * ctx.venue_chase_advantage * 2.0 + dew_boost + toss_boost;

    (
        InningsTarget {
            mean_total: first_mean,
            powerplay_mean: ctx.venue_avg_powerplay,
            wicket_rate_boost: ctx.wicket_adjustment,
        },
        // Absences only weaken the side they belong to, so the chase carries no wicket boost.
        InningsTarget {
            mean_total: second_mean,
            powerplay_mean: ctx.venue_avg_powerplay,
            wicket_rate_boost: 0.0,
        },
    )
}

/// Share of trial pairs the chasing side wins (ties go to the chase). Index `i` of each slice
/// must come from trial `i` of the same run; the two innings are independent samples, not a
/// joint model.
pub fn paired_chase_win_probability(first: &[u32], second: &[u32]) -> Result<f64, PairingError> {
    if first.len() != second.len() {
        return Err(PairingError::LengthMismatch {
            first: first.len(),
            second: second.len(),
        });
    }
    if first.is_empty() {
        return Err(PairingError::Empty);
    }
    let wins = first
        .iter()
        .zip(second)
        .filter(|(batting_first, chasing)| chasing >= batting_first)
        .count();
    Ok(wins as f64 / first.len() as f64)
}

/// Both populations hold `trials` entries. A pairing failure is reported as NaN rather than a
/// made-up probability, which no quote can clear as an edge.
fn chase_share(first: &[u32], second: &[u32]) -> f64 {
    match paired_chase_win_probability(first, second) {
        Ok(p) => p,
        Err(err) => {
            warn!(%err, "innings populations could not be paired");
            f64::NAN
        }
    }
}

pub struct MatchSimulator {
    innings: InningsSimulator,
    config: ModelConfig,
}

impl MatchSimulator {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            innings: InningsSimulator::new(config.innings),
            config,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn simulate_match(
        &self,
        ctx: &MatchContext,
        lines: &SessionLines,
        trials: usize,
        seed: SeedMode,
    ) -> SimulationResult {
        let trials = trials.max(1);
        let seed = seed.resolve();
        let (first_target, second_target) = innings_targets(ctx, &self.config);

        debug!(
            trials,
            seed,
            first_target = first_target.mean_total,
            second_target = second_target.mean_total,
            "simulating match"
        );

        let first = self.innings.simulate(
            trials,
            &first_target,
            TrialStreams::new(seed, FIRST_INNINGS_STREAM),
        );
        let second = self.innings.simulate(
            trials,
            &second_target,
            TrialStreams::new(seed, SECOND_INNINGS_STREAM),
        );

        let win_prob_batting_second = chase_share(&first.final_scores, &second.final_scores);
        let win_prob_batting_first = 1.0 - win_prob_batting_second;

        let (innings1_mean, innings1_std) = mean_std(&first.final_scores);
        let (innings2_mean, innings2_std) = mean_std(&second.final_scores);

        SimulationResult {
            team_batting_first: ctx.team_batting_first.clone(),
            team_batting_second: ctx.team_batting_second.clone(),
            win_prob_batting_first,
            win_prob_batting_second,
            innings1_target: first_target.mean_total,
            innings1_model_std: first_target.mean_total * self.config.reported_std_fraction,
            innings1_mean,
            innings1_std,
            innings2_target: second_target.mean_total,
            innings2_model_std: second_target.mean_total * self.config.reported_std_fraction,
            innings2_mean,
            innings2_std,
            sessions: session_results(&first, lines),
            trials,
            seed,
        }
    }
}

impl Default for MatchSimulator {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

/// Convenience wrapper over the default model constants.
pub fn simulate_match(
    ctx: &MatchContext,
    lines: &SessionLines,
    trials: usize,
    seed: SeedMode,
) -> SimulationResult {
    MatchSimulator::default().simulate_match(ctx, lines, trials, seed)
}

fn session_results(first: &InningsSamples, lines: &SessionLines) -> Vec<SessionResult> {
    let mut out = Vec::with_capacity(CHECKPOINT_OVERS.len());
    for over in CHECKPOINT_OVERS {
        let Some(scores) = first.at_over(over) else {
            continue;
        };
        let (mean_runs, std_runs) = mean_std(scores);
        let lines = lines
            .get(&over)
            .map(|ls| {
                ls.iter()
                    .map(|line| LineProbability {
                        line: *line,
                        prob_over: share_above(scores, *line),
                    })
                    .collect()
            })
            .unwrap_or_default();
        out.push(SessionResult {
            over,
            mean_runs,
            std_runs,
            lines,
        });
    }
    out
}

pub(crate) fn share_above(scores: &[u32], line: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let above = scores.iter().filter(|s| f64::from(**s) > line).count();
    above as f64 / scores.len() as f64
}

/// Population mean and standard deviation.
pub(crate) fn mean_std(values: &[u32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|v| f64::from(*v)).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| (f64::from(*v) - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}
