//! Cricsheet JSON match files: one `MatchRecord` per file plus one `DeliveryRecord` per ball.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub date: String,
    pub season: String,
    pub venue: String,
    pub team1: String,
    pub team2: String,
    pub toss_winner: String,
    pub toss_decision: String,
    /// Winning team, or the result text ("tie", "no result") when nobody won.
    pub winner: String,
    pub win_by_runs: u32,
    pub win_by_wickets: u32,
}

impl MatchRecord {
    pub fn has_winner(&self) -> bool {
        !self.winner.is_empty() && (self.winner == self.team1 || self.winner == self.team2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub match_id: String,
    pub innings: u8,
    pub batting_team: String,
    /// 1-based.
    pub over: u8,
    /// 1-based position within the over, extras included.
    pub ball: u8,
    pub batter: String,
    pub bowler: String,
    pub runs_batter: u32,
    pub runs_extras: u32,
    pub runs_total: u32,
    pub is_wicket: bool,
    pub wicket_kind: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedArchive {
    pub matches: Vec<MatchRecord>,
    pub deliveries: Vec<DeliveryRecord>,
    /// `file: reason` for each file that could not be parsed.
    pub skipped: Vec<String>,
}

pub fn parse_match_file(path: &Path) -> Result<(MatchRecord, Vec<DeliveryRecord>)> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let match_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("no file stem for {}", path.display()))?;
    parse_match_str(match_id, &raw)
}

pub fn parse_match_str(match_id: &str, raw: &str) -> Result<(MatchRecord, Vec<DeliveryRecord>)> {
    let value = serde_json::from_str::<Value>(raw.trim()).context("invalid cricsheet json")?;
    let info = value
        .get("info")
        .ok_or_else(|| anyhow!("missing info block"))?;

    let teams = info
        .get("teams")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(as_string).collect::<Vec<_>>())
        .unwrap_or_default();
    let toss = info.get("toss");
    let outcome = info.get("outcome");
    let by = outcome.and_then(|o| o.get("by"));

    let record = MatchRecord {
        match_id: match_id.to_string(),
        date: info
            .get("dates")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(as_string)
            .unwrap_or_default(),
        season: info.get("season").and_then(as_string).unwrap_or_default(),
        venue: info
            .get("venue")
            .and_then(as_string)
            .unwrap_or_else(|| "Unknown".to_string()),
        team1: teams.first().cloned().unwrap_or_default(),
        team2: teams.get(1).cloned().unwrap_or_default(),
        toss_winner: toss
            .and_then(|t| t.get("winner"))
            .and_then(as_string)
            .unwrap_or_default(),
        toss_decision: toss
            .and_then(|t| t.get("decision"))
            .and_then(as_string)
            .unwrap_or_default(),
        winner: outcome
            .and_then(|o| o.get("winner").or_else(|| o.get("result")))
            .and_then(as_string)
            .unwrap_or_default(),
        win_by_runs: by
            .and_then(|b| b.get("runs"))
            .and_then(as_u32_any)
            .unwrap_or(0),
        win_by_wickets: by
            .and_then(|b| b.get("wickets"))
            .and_then(as_u32_any)
            .unwrap_or(0),
    };

    let mut deliveries = Vec::new();
    let innings = value
        .get("innings")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (inn_idx, innings) in innings.iter().enumerate() {
        let batting_team = innings.get("team").and_then(as_string).unwrap_or_default();
        let overs = innings
            .get("overs")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for over in overs {
            let over_num = over.get("over").and_then(as_u32_any).unwrap_or(0);
            let balls = over
                .get("deliveries")
                .and_then(|v| v.as_array())
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (ball_idx, delivery) in balls.iter().enumerate() {
                let runs = delivery.get("runs");
                let run = |key: &str| runs.and_then(|r| r.get(key)).and_then(as_u32_any).unwrap_or(0);
                let wickets = delivery
                    .get("wickets")
                    .and_then(|v| v.as_array())
                    .filter(|arr| !arr.is_empty());
                deliveries.push(DeliveryRecord {
                    match_id: match_id.to_string(),
                    innings: u8::try_from(inn_idx + 1).unwrap_or(u8::MAX),
                    batting_team: batting_team.clone(),
                    over: u8::try_from(over_num + 1).unwrap_or(u8::MAX),
                    ball: u8::try_from(ball_idx + 1).unwrap_or(u8::MAX),
                    batter: delivery.get("batter").and_then(as_string).unwrap_or_default(),
                    bowler: delivery.get("bowler").and_then(as_string).unwrap_or_default(),
                    runs_batter: run("batter"),
                    runs_extras: run("extras"),
                    runs_total: run("total"),
                    is_wicket: wickets.is_some(),
                    wicket_kind: wickets
                        .and_then(|arr| arr.first())
                        .and_then(|w| w.get("kind"))
                        .and_then(as_string)
                        .unwrap_or_default(),
                });
            }
        }
    }

    Ok((record, deliveries))
}

/// Parse every `*.json` in `dir`, in file-name order. Unreadable files are skipped and logged.
pub fn load_dir(dir: &Path) -> Result<ParsedArchive> {
    let mut files = fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    files.sort();
    if files.is_empty() {
        return Err(anyhow!("no JSON match files in {}", dir.display()));
    }

    let mut archive = ParsedArchive::default();
    for path in &files {
        match parse_match_file(path) {
            Ok((record, deliveries)) => {
                archive.matches.push(record);
                archive.deliveries.extend(deliveries);
            }
            Err(err) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                warn!(file = %name, "skipping match file: {err:#}");
                archive.skipped.push(format!("{name}: {err:#}"));
            }
        }
    }

    if archive.matches.is_empty() {
        return Err(anyhow!(
            "none of the {} files in {} could be parsed",
            files.len(),
            dir.display()
        ));
    }
    info!(
        matches = archive.matches.len(),
        deliveries = archive.deliveries.len(),
        skipped = archive.skipped.len(),
        "parsed cricsheet archive"
    );
    Ok(archive)
}

fn as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_u32_any(v: &Value) -> Option<u32> {
    let n = match v.as_u64() {
        Some(n) => n,
        None => v.as_str()?.trim().parse::<u64>().ok()?,
    };
    u32::try_from(n).ok()
}
