//! Player profiles and playing-XI analysis. The batting-first XI's net contribution feeds the
//! first-innings run target.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{MatchContext, PlayerRole};
use crate::model_config::{app_cache_dir, write_json_atomic};

const PROFILES_FILE: &str = "player_profiles.json";

/// Most recent innings first.
pub const FORM_WEIGHTS: [f64; 5] = [2.0, 1.5, 1.2, 1.0, 0.8];
/// Form index for a player with no recent scores (usually a bowler).
pub const NO_FORM_INDEX: f64 = 20.0;
pub const IN_FORM_ABOVE: f64 = 35.0;
pub const OUT_OF_FORM_BELOW: f64 = 18.0;
const TOP_ORDER: usize = 6;
const DANGER_PLAYERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub team: String,
    pub role: PlayerRole,
    /// T20 batting average.
    pub avg: f64,
    /// T20 strike rate.
    pub sr: f64,
    /// Last scores, most recent first.
    #[serde(default)]
    pub form: Vec<u32>,
    /// Runs above or below the team baseline this player adds.
    pub contribution: f64,
}

impl PlayerProfile {
    pub fn form_index(&self) -> f64 {
        form_index(&self.form)
    }
}

/// Weighted mean of up to five recent scores, rounded to one decimal.
pub fn form_index(scores: &[u32]) -> f64 {
    if scores.is_empty() {
        return NO_FORM_INDEX;
    }
    let (sum, weight) = scores
        .iter()
        .zip(FORM_WEIGHTS)
        .fold((0.0, 0.0), |(sum, weight), (&s, w)| {
            (sum + f64::from(s) * w, weight + w)
        });
    round1(sum / weight)
}

/// Profiles keyed by the player's scorecard name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfiles {
    #[serde(default)]
    pub players: BTreeMap<String, PlayerProfile>,
}

impl PlayerProfiles {
    pub fn default_path() -> Option<PathBuf> {
        app_cache_dir().map(|dir| dir.join(PROFILES_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read player profiles {}", path.display()))?;
        serde_json::from_str(raw.trim())
            .with_context(|| format!("parse player profiles {}", path.display()))
    }

    /// Explicit path, else the cache file when it exists.
    pub fn load_optional(path: Option<&Path>) -> Result<Option<Self>> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        match path {
            Some(path) if path.exists() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self).context("save player profiles")
    }

    pub fn get(&self, name: &str) -> Option<&PlayerProfile> {
        self.players.get(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedPlayer {
    pub name: String,
    pub avg: f64,
    pub sr: f64,
    pub form_index: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XiAnalysis {
    /// Summed contribution of every profiled player, rounded to one decimal.
    pub net_runs: f64,
    /// Mean form index of the top order; 0 when the XI has no profiled batters.
    pub avg_form: f64,
    /// Up to six batting players by average.
    pub top_order: Vec<RatedPlayer>,
    /// The two players in the best form across the XI.
    pub danger: Vec<RatedPlayer>,
    pub in_form: Vec<String>,
    pub out_of_form: Vec<String>,
    /// Names with no profile.
    pub missing: Vec<String>,
}

pub fn analyze_xi<S: AsRef<str>>(xi: &[S], profiles: &PlayerProfiles) -> XiAnalysis {
    let mut known = Vec::new();
    let mut missing = Vec::new();
    for name in xi {
        let name = name.as_ref();
        match profiles.get(name) {
            Some(p) => known.push(rate(name, p)),
            None => missing.push(name.to_string()),
        }
    }

    let net_runs = round1(
        xi.iter()
            .filter_map(|name| profiles.get(name.as_ref()))
            .map(|p| p.contribution)
            .sum(),
    );

    let mut top_order = xi
        .iter()
        .filter_map(|name| {
            let p = profiles.get(name.as_ref())?;
            p.role.bats().then(|| rate(name.as_ref(), p))
        })
        .collect::<Vec<_>>();
    top_order.sort_by(|a, b| b.avg.total_cmp(&a.avg));
    top_order.truncate(TOP_ORDER);

    let avg_form = if top_order.is_empty() {
        0.0
    } else {
        round1(top_order.iter().map(|p| p.form_index).sum::<f64>() / top_order.len() as f64)
    };

    let mut danger = known;
    danger.sort_by(|a, b| b.form_index.total_cmp(&a.form_index));
    danger.truncate(DANGER_PLAYERS);

    let in_form = top_order
        .iter()
        .filter(|p| p.form_index > IN_FORM_ABOVE)
        .map(|p| p.name.clone())
        .collect();
    let out_of_form = top_order
        .iter()
        .filter(|p| p.form_index < OUT_OF_FORM_BELOW)
        .map(|p| p.name.clone())
        .collect();

    if !missing.is_empty() {
        debug!(missing = missing.len(), "players without a profile");
    }

    XiAnalysis {
        net_runs,
        avg_form,
        top_order,
        danger,
        in_form,
        out_of_form,
        missing,
    }
}

/// Adds the batting-first XI's net runs to the first-innings target.
pub fn apply_xi_adjustment(ctx: &MatchContext, batting_first: &XiAnalysis) -> MatchContext {
    ctx.with_extra_runs(batting_first.net_runs)
}

fn rate(name: &str, p: &PlayerProfile) -> RatedPlayer {
    RatedPlayer {
        name: name.to_string(),
        avg: p.avg,
        sr: p.sr,
        form_index: p.form_index(),
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MatchSetup, MatchTime, TossDecision, build_match_context};

    fn profile(role: PlayerRole, avg: f64, form: &[u32], contribution: f64) -> PlayerProfile {
        PlayerProfile {
            team: "ZIM".to_string(),
            role,
            avg,
            sr: 130.0,
            form: form.to_vec(),
            contribution,
        }
    }

    fn profiles() -> PlayerProfiles {
        let mut players = BTreeMap::new();
        players.insert("Opener".to_string(), profile(PlayerRole::Batter, 28.0, &[52, 31, 18, 44, 27], 3.8));
        players.insert("Keeper".to_string(), profile(PlayerRole::WicketKeeperBatter, 15.0, &[12, 8, 19, 6, 14], -1.2));
        players.insert("Skipper".to_string(), profile(PlayerRole::Allrounder, 34.4, &[44, 28, 61, 18, 35], 5.1));
        players.insert("Quick".to_string(), profile(PlayerRole::Bowler, 8.0, &[], -3.5));
        PlayerProfiles { players }
    }

    #[test]
    fn form_weights_recent_scores_more() {
        // (52*2 + 31*1.5 + 18*1.2 + 44 + 27*0.8) / 6.5
        assert_eq!(form_index(&[52, 31, 18, 44, 27]), 36.6);
        assert_eq!(form_index(&[40]), 40.0);
        // (10*2 + 40*1.5) / 3.5
        assert_eq!(form_index(&[10, 40]), 22.9);
        assert_eq!(form_index(&[]), NO_FORM_INDEX);
    }

    #[test]
    fn scores_past_the_fifth_are_ignored() {
        assert_eq!(form_index(&[20, 20, 20, 20, 20, 90]), 20.0);
    }

    #[test]
    fn xi_analysis_splits_form_and_missing() {
        let xi = ["Keeper", "Opener", "Skipper", "Quick", "Unknown"];
        let a = analyze_xi(&xi, &profiles());
        assert_eq!(a.net_runs, 4.2);
        assert_eq!(a.missing, vec!["Unknown".to_string()]);
        let top = a.top_order.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(top, vec!["Skipper", "Opener", "Keeper"]);
        assert_eq!(a.in_form, vec!["Skipper".to_string(), "Opener".to_string()]);
        assert_eq!(a.out_of_form, vec!["Keeper".to_string()]);
        assert_eq!(a.danger.len(), 2);
        assert_eq!(a.danger[0].name, "Skipper");
        let expected = ((form_index(&[44, 28, 61, 18, 35]) + 36.6 + form_index(&[12, 8, 19, 6, 14])) / 3.0
            * 10.0)
            .round()
            / 10.0;
        assert_eq!(a.avg_form, expected);
    }

    #[test]
    fn empty_xi_has_no_form() {
        let a = analyze_xi::<&str>(&[], &profiles());
        assert_eq!(a, XiAnalysis::default());
    }

    #[test]
    fn xi_adjustment_reaches_the_first_innings_mean() {
        let ctx = build_match_context(&MatchSetup {
            venue: "Wankhede Stadium, Mumbai".to_string(),
            team_batting_first: "Zimbabwe".to_string(),
            team_batting_second: "West Indies".to_string(),
            toss_winner: "West Indies".to_string(),
            toss_decision: TossDecision::Field,
            match_time: MatchTime::Night,
            tournament_stage: "qualifier".to_string(),
            absent_players: Vec::new(),
        });
        let a = analyze_xi(&["Opener", "Skipper"], &profiles());
        let adjusted = apply_xi_adjustment(&ctx, &a);
        assert!((adjusted.first_innings_mean() - (ctx.first_innings_mean() + 8.9)).abs() < 1e-9);
        assert_eq!(adjusted.breakdown.manual_runs, 8.9);
        assert_eq!(ctx.breakdown.manual_runs, 0.0);
    }

    #[test]
    fn profiles_round_trip_through_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("profiles.json");
        profiles().save(&path).expect("save");
        assert_eq!(PlayerProfiles::load(&path).expect("load"), profiles());
        assert!(PlayerProfiles::load_optional(Some(&dir.path().join("none.json"))).expect("ok").is_none());
    }
}
