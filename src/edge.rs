use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OddsError;
use crate::match_sim::SimulationResult;

pub const MIN_EDGE_PERCENT: f64 = 4.0;
pub const STRONG_EDGE_PERCENT: f64 = 8.0;
pub const EV_STAKE: f64 = 1000.0;

pub const MATCH_WINNER_MARKET: &str = "Match Winner";
pub const SESSION_RUNS_MARKET: &str = "Session Runs";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeThresholds {
    pub min_edge_percent: f64,
    pub strong_edge_percent: f64,
    /// Stake the EV figure is quoted against.
    pub stake: f64,
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        Self {
            min_edge_percent: MIN_EDGE_PERCENT,
            strong_edge_percent: STRONG_EDGE_PERCENT,
            stake: EV_STAKE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Moderate,
    Strong,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strength::Moderate => f.write_str("moderate"),
            Strength::Strong => f.write_str("strong"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvSignal {
    pub market: String,
    pub selection: String,
    pub model_prob: f64,
    pub implied_prob: f64,
    /// Percentage points.
    pub edge_percent: f64,
    pub decimal_odds: f64,
    pub ev_per_1000: f64,
    pub strength: Strength,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEdgeReport {
    pub match_label: String,
    pub signals: Vec<EvSignal>,
    pub summary: String,
}

impl MarketEdgeReport {
    pub fn count(&self, strength: Strength) -> usize {
        self.signals.iter().filter(|s| s.strength == strength).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchWinnerOdds {
    #[serde(default, alias = "team_batting_first")]
    pub batting_first: Option<f64>,
    #[serde(default, alias = "team_batting_second")]
    pub batting_second: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OverUnderOdds {
    #[serde(default)]
    pub over: Option<f64>,
    #[serde(default)]
    pub under: Option<f64>,
}

/// One bookmaker snapshot. Missing entries mean "not quoted".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OddsTable {
    #[serde(default)]
    pub match_winner: MatchWinnerOdds,
    #[serde(default)]
    pub session_runs: BTreeMap<u8, OverUnderOdds>,
}

pub fn decimal_to_implied(odds: f64) -> Result<f64, OddsError> {
    if !(odds > 1.0) || !odds.is_finite() {
        return Err(OddsError::InvalidOdds(odds));
    }
    Ok(1.0 / odds)
}

pub fn implied_to_decimal(prob: f64) -> Result<f64, OddsError> {
    if !(prob > 0.0 && prob < 1.0) {
        return Err(OddsError::InvalidProbability(prob));
    }
    Ok(1.0 / prob)
}

fn usable(odds: Option<f64>) -> Option<f64> {
    odds.filter(|o| *o > 1.0)
}

/// Price one selection. `None` when the edge is below the minimum threshold or the quote is
/// unusable.
pub fn evaluate_quote(
    market: &str,
    selection: &str,
    model_prob: f64,
    decimal_odds: f64,
    reasoning: String,
    thresholds: &EdgeThresholds,
) -> Option<EvSignal> {
    let implied_prob = decimal_to_implied(decimal_odds).ok()?;
    let edge_percent = (model_prob - implied_prob) * 100.0;
    if !(edge_percent >= thresholds.min_edge_percent) {
        return None;
    }
    let stake = thresholds.stake;
    let ev_per_1000 = model_prob * (decimal_odds - 1.0) * stake - (1.0 - model_prob) * stake;
    let strength = if edge_percent >= thresholds.strong_edge_percent {
        Strength::Strong
    } else {
        Strength::Moderate
    };
    Some(EvSignal {
        market: market.to_string(),
        selection: selection.to_string(),
        model_prob,
        implied_prob,
        edge_percent,
        decimal_odds,
        ev_per_1000,
        strength,
        reasoning,
    })
}

/// Compare the simulation against one odds snapshot. Signals follow market order (match winner,
/// then sessions by checkpoint, lines as supplied) rather than edge size.
pub fn detect(
    result: &SimulationResult,
    match_label: &str,
    odds: &OddsTable,
    thresholds: &EdgeThresholds,
) -> MarketEdgeReport {
    let mut signals = Vec::new();

    let sides = [
        (
            &result.team_batting_first,
            result.win_prob_batting_first,
            odds.match_winner.batting_first,
        ),
        (
            &result.team_batting_second,
            result.win_prob_batting_second,
            odds.match_winner.batting_second,
        ),
    ];
    for (team, prob, quote) in sides {
        let Some(quote) = usable(quote) else {
            continue;
        };
        let market = format!("{MATCH_WINNER_MARKET} - {team}");
        let reasoning = format!("Model gives {team} {:.1}% win prob.", prob * 100.0);
        if let Some(sig) = evaluate_quote(&market, team, prob, quote, reasoning, thresholds) {
            signals.push(sig);
        }
    }

    for session in &result.sessions {
        let Some(quotes) = odds.session_runs.get(&session.over) else {
            continue;
        };
        for line in &session.lines {
            let directions = [
                ("Over", line.prob_over, quotes.over),
                ("Under", 1.0 - line.prob_over, quotes.under),
            ];
            for (direction, prob, quote) in directions {
                let Some(quote) = usable(quote) else {
                    continue;
                };
                let selection = format!("Runs {direction} {} at {} overs", line.line, session.over);
                let reasoning = format!(
                    "Model: {:.1}% vs implied {:.1}%",
                    prob * 100.0,
                    100.0 / quote
                );
                if let Some(sig) = evaluate_quote(
                    SESSION_RUNS_MARKET,
                    &selection,
                    prob,
                    quote,
                    reasoning,
                    thresholds,
                ) {
                    signals.push(sig);
                }
            }
        }
    }

    let summary = summarize(match_label, &signals);
    info!("{summary}");
    MarketEdgeReport {
        match_label: match_label.to_string(),
        signals,
        summary,
    }
}

/// `detect` with the standard 4 / 8 point thresholds.
pub fn detect_ev(result: &SimulationResult, match_label: &str, odds: &OddsTable) -> MarketEdgeReport {
    detect(result, match_label, odds, &EdgeThresholds::default())
}

fn summarize(match_label: &str, signals: &[EvSignal]) -> String {
    if signals.is_empty() {
        return format!("No +EV signals for {match_label}.");
    }
    let strong = signals.iter().filter(|s| s.strength == Strength::Strong).count();
    let moderate = signals.len() - strong;
    format!("{strong} strong, {moderate} moderate EV signals for {match_label}.")
}
