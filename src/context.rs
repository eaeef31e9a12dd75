use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model_config::ModelConfig;
use crate::registry::{Registries, StageMultipliers, TossBoostRegistry, VenueRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TossDecision {
    Bat,
    Field,
}

impl FromStr for TossDecision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bat" => Ok(TossDecision::Bat),
            "field" | "bowl" => Ok(TossDecision::Field),
            other => Err(anyhow!("unknown toss decision '{other}' (expected bat|field)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchTime {
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "day-night")]
    DayNight,
    #[serde(rename = "night")]
    Night,
}

impl MatchTime {
    pub fn under_lights(self) -> bool {
        matches!(self, MatchTime::DayNight | MatchTime::Night)
    }
}

impl FromStr for MatchTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "afternoon" => Ok(MatchTime::Day),
            "day-night" | "daynight" | "day_night" => Ok(MatchTime::DayNight),
            "night" | "evening" => Ok(MatchTime::Night),
            other => Err(anyhow!("unknown match time '{other}' (expected day|day-night|night)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRole {
    #[serde(rename = "batter")]
    Batter,
    #[serde(rename = "bowler")]
    Bowler,
    #[serde(rename = "allrounder")]
    Allrounder,
    #[serde(rename = "wk-batter")]
    WicketKeeperBatter,
}

impl PlayerRole {
    pub fn bats(self) -> bool {
        matches!(
            self,
            PlayerRole::Batter | PlayerRole::Allrounder | PlayerRole::WicketKeeperBatter
        )
    }

    pub fn bowls(self) -> bool {
        matches!(self, PlayerRole::Bowler | PlayerRole::Allrounder)
    }
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlayerRole::Batter => "batter",
            PlayerRole::Bowler => "bowler",
            PlayerRole::Allrounder => "allrounder",
            PlayerRole::WicketKeeperBatter => "wk-batter",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAbsence {
    pub name: String,
    pub role: PlayerRole,
    pub team: String,
}

impl PlayerAbsence {
    pub fn new(name: impl Into<String>, role: PlayerRole, team: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            team: team.into(),
        }
    }
}

/// Raw inputs for one fixture, before any lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSetup {
    pub venue: String,
    pub team_batting_first: String,
    pub team_batting_second: String,
    pub toss_winner: String,
    pub toss_decision: TossDecision,
    pub match_time: MatchTime,
    pub tournament_stage: String,
    #[serde(default)]
    pub absent_players: Vec<PlayerAbsence>,
}

/// Where the run and wicket deltas came from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdjustmentBreakdown {
    pub dew_runs: f64,
    pub stage_runs: f64,
    pub roster_runs: f64,
    pub roster_wickets: f64,
    /// Manual overrides applied after the build step.
    pub manual_runs: f64,
    pub manual_wickets: f64,
}

/// Modelling inputs for one match. Adjustments are additive deltas on the venue baselines.
/// Overrides go through the `with_*` methods, which return a fresh value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    pub venue: String,
    pub venue_known: bool,
    pub team_batting_first: String,
    pub team_batting_second: String,
    pub toss_winner: String,
    pub toss_decision: TossDecision,
    pub match_time: MatchTime,
    pub tournament_stage: String,
    pub absent_players: Vec<PlayerAbsence>,
    pub venue_avg_runs: f64,
    pub venue_avg_powerplay: f64,
    pub venue_chase_advantage: f64,
    pub dew_risk: f64,
    pub toss_win_prob_boost: f64,
    pub stage_run_multiplier: f64,
    pub run_adjustment: f64,
    pub wicket_adjustment: f64,
    pub breakdown: AdjustmentBreakdown,
}

impl MatchContext {
    /// Mean first-innings total the simulator targets.
    pub fn first_innings_mean(&self) -> f64 {
        self.venue_avg_runs + self.run_adjustment
    }

    pub fn toss_winner_bats_second(&self) -> bool {
        self.toss_winner == self.team_batting_second
    }

    /// Replace the venue baseline. The stage contribution is rescaled to the new baseline so
    /// the multiplier keeps its meaning.
    pub fn with_venue_avg_runs(&self, venue_avg_runs: f64) -> Self {
        let stage_runs = venue_avg_runs * (self.stage_run_multiplier - 1.0);
        let mut next = self.clone();
        next.run_adjustment += stage_runs - self.breakdown.stage_runs;
        next.breakdown.stage_runs = stage_runs;
        next.venue_avg_runs = venue_avg_runs;
        next
    }

    pub fn with_extra_runs(&self, runs: f64) -> Self {
        let mut next = self.clone();
        next.run_adjustment += runs;
        next.breakdown.manual_runs += runs;
        next
    }

    pub fn with_extra_wicket_rate(&self, delta: f64) -> Self {
        let mut next = self.clone();
        next.wicket_adjustment += delta;
        next.breakdown.manual_wickets += delta;
        next
    }

    pub fn with_powerplay_mean(&self, runs: f64) -> Self {
        Self {
            venue_avg_powerplay: runs,
            ..self.clone()
        }
    }

    pub fn with_chase_advantage(&self, fraction: f64) -> Self {
        Self {
            venue_chase_advantage: fraction.clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}

/// Resolves a `MatchSetup` against injected lookup tables.
pub struct ContextBuilder<'a> {
    venues: &'a dyn VenueRegistry,
    toss: &'a dyn TossBoostRegistry,
    stages: &'a dyn StageMultipliers,
    config: &'a ModelConfig,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        venues: &'a dyn VenueRegistry,
        toss: &'a dyn TossBoostRegistry,
        stages: &'a dyn StageMultipliers,
        config: &'a ModelConfig,
    ) -> Self {
        Self {
            venues,
            toss,
            stages,
            config,
        }
    }

    pub fn from_registries(registries: &'a Registries, config: &'a ModelConfig) -> Self {
        Self::new(
            &registries.venues,
            &registries.toss,
            &registries.stages,
            config,
        )
    }

    pub fn build(&self, setup: &MatchSetup) -> MatchContext {
        let venue = self.venues.resolve(&setup.venue);
        if !venue.is_known() {
            warn!(venue = %setup.venue, "venue not in registry, using default baselines");
        }
        let stats = venue.value();

        let toss_win_prob_boost = match setup.toss_decision {
            TossDecision::Field => self.toss.resolve(&setup.venue).value(),
            TossDecision::Bat => 0.0,
        };

        let mut breakdown = AdjustmentBreakdown::default();
        if setup.match_time.under_lights() {
            breakdown.dew_runs = stats.dew_risk * self.config.dew_runs_first_innings;
        }

        let stage = self.stages.resolve(&setup.tournament_stage);
        if !stage.is_known() {
            debug!(stage = %setup.tournament_stage, "unknown tournament stage, multiplier 1.0");
        }
        let stage_run_multiplier = stage.value();
        breakdown.stage_runs = stats.avg_first_innings_runs * (stage_run_multiplier - 1.0);

        for player in &setup.absent_players {
            if player.role.bats() {
                breakdown.roster_runs -= self.config.batter_absence_run_penalty;
            }
            if player.role.bowls() {
                breakdown.roster_wickets += self.config.bowler_absence_wicket_boost;
            }
        }

        let run_adjustment = breakdown.dew_runs + breakdown.stage_runs + breakdown.roster_runs;
        let wicket_adjustment = breakdown.roster_wickets;

        MatchContext {
            venue: setup.venue.clone(),
            venue_known: venue.is_known(),
            team_batting_first: setup.team_batting_first.clone(),
            team_batting_second: setup.team_batting_second.clone(),
            toss_winner: setup.toss_winner.clone(),
            toss_decision: setup.toss_decision,
            match_time: setup.match_time,
            tournament_stage: setup.tournament_stage.clone(),
            absent_players: setup.absent_players.clone(),
            venue_avg_runs: stats.avg_first_innings_runs,
            venue_avg_powerplay: stats.avg_powerplay_runs,
            venue_chase_advantage: stats.chase_advantage,
            dew_risk: stats.dew_risk,
            toss_win_prob_boost,
            stage_run_multiplier,
            run_adjustment,
            wicket_adjustment,
            breakdown,
        }
    }
}

/// Builds against the built-in tables and default constants.
pub fn build_match_context(setup: &MatchSetup) -> MatchContext {
    let config = ModelConfig::default();
    ContextBuilder::from_registries(Registries::builtin(), &config).build(setup)
}
