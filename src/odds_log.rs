//! In-play odds snapshots stored in SQLite, plus the price patterns checked on each one.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::model_config::app_cache_dir;

/// Prices inside this band are flagged as a short-price zone.
pub const SHORT_PRICE_MIN: f64 = 1.01;
pub const SHORT_PRICE_MAX: f64 = 1.06;
/// Favourite price below which early-innings dominance is flagged.
pub const EARLY_FAVOURITE_MAX: f64 = 1.07;
/// Favourite drift, relative to the opening price, that counts as a wobble.
pub const DRIFT_RATIO: f64 = 1.10;
/// Fewer snapshots than this and a match is left out of the drift check.
pub const MIN_DRIFT_SNAPSHOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattingSide {
    Fav,
    Nonfav,
}

impl FromStr for BattingSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fav" | "favourite" => Ok(BattingSide::Fav),
            "nonfav" | "non-fav" | "underdog" => Ok(BattingSide::Nonfav),
            other => Err(anyhow!("unknown batting side '{other}' (use fav or nonfav)")),
        }
    }
}

impl fmt::Display for BattingSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattingSide::Fav => f.write_str("fav"),
            BattingSide::Nonfav => f.write_str("nonfav"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub date: String,
    pub match_label: String,
    pub venue: String,
    pub innings: u8,
    /// Completed overs; 0 is the pre-match row.
    pub over: u8,
    pub score: u32,
    pub wickets: u32,
    pub fav_team: String,
    pub fav_odds: f64,
    pub nonfav_odds: f64,
    pub who_batting: Option<BattingSide>,
    pub notes: String,
}

impl OddsSnapshot {
    /// Runs per over, 0 before the first over.
    pub fn run_rate(&self) -> f64 {
        if self.over == 0 {
            return 0.0;
        }
        (f64::from(self.score) / f64::from(self.over) * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFlag {
    FavouriteShortPrice,
    UnderdogShortPrice,
    FieldingFavouriteEarly,
    BattingFavouriteEarly,
    FavouriteFlip,
}

impl PatternFlag {
    pub const ALL: [PatternFlag; 5] = [
        PatternFlag::FavouriteShortPrice,
        PatternFlag::UnderdogShortPrice,
        PatternFlag::FieldingFavouriteEarly,
        PatternFlag::BattingFavouriteEarly,
        PatternFlag::FavouriteFlip,
    ];
}

impl fmt::Display for PatternFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PatternFlag::FavouriteShortPrice => "favourite inside the 1.01-1.06 short-price zone",
            PatternFlag::UnderdogShortPrice => "non-favourite inside the 1.01-1.06 short-price zone",
            PatternFlag::FieldingFavouriteEarly => "fielding favourite under 1.07 at over 3",
            PatternFlag::BattingFavouriteEarly => "batting favourite under 1.07 at over 1",
            PatternFlag::FavouriteFlip => "pre-match favourite now priced above the other side",
        };
        f.write_str(text)
    }
}

pub fn pattern_flags(s: &OddsSnapshot) -> Vec<PatternFlag> {
    let short = |o: f64| (SHORT_PRICE_MIN..=SHORT_PRICE_MAX).contains(&o);
    let mut flags = Vec::new();
    if short(s.fav_odds) {
        flags.push(PatternFlag::FavouriteShortPrice);
    }
    if short(s.nonfav_odds) {
        flags.push(PatternFlag::UnderdogShortPrice);
    }
    if s.over == 3
        && s.innings == 1
        && s.fav_odds < EARLY_FAVOURITE_MAX
        && s.who_batting == Some(BattingSide::Nonfav)
    {
        flags.push(PatternFlag::FieldingFavouriteEarly);
    }
    if s.over == 1 && s.fav_odds < EARLY_FAVOURITE_MAX && s.who_batting == Some(BattingSide::Fav) {
        flags.push(PatternFlag::BattingFavouriteEarly);
    }
    if s.fav_odds > s.nonfav_odds && s.over != 0 {
        flags.push(PatternFlag::FavouriteFlip);
    }
    flags
}

/// Parse the quick-entry form `"54/1 1.45 2.65"`.
pub fn parse_quick_entry(raw: &str) -> Result<(u32, u32, f64, f64)> {
    let parts = raw.split_whitespace().collect::<Vec<_>>();
    let [score, fav, nonfav, ..] = parts.as_slice() else {
        return Err(anyhow!("expected 'score/wkts fav_odds nonfav_odds', got '{raw}'"));
    };
    let (runs, wkts) = score.split_once('/').unwrap_or((*score, "0"));
    let runs = runs.parse::<u32>().with_context(|| format!("invalid score '{score}'"))?;
    let wkts = wkts.parse::<u32>().with_context(|| format!("invalid wickets '{score}'"))?;
    let fav = fav.parse::<f64>().with_context(|| format!("invalid odds '{fav}'"))?;
    let nonfav = nonfav
        .parse::<f64>()
        .with_context(|| format!("invalid odds '{nonfav}'"))?;
    Ok((runs, wkts, fav, nonfav))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("odds_log.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS odds_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            match_label TEXT NOT NULL,
            venue TEXT NOT NULL,
            innings INTEGER NOT NULL,
            over INTEGER NOT NULL,
            score INTEGER NOT NULL,
            wickets INTEGER NOT NULL,
            rr REAL NOT NULL,
            fav_team TEXT NOT NULL,
            fav_odds REAL NOT NULL,
            nonfav_odds REAL NOT NULL,
            who_batting TEXT NULL,
            notes TEXT NOT NULL,
            flags_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_odds_log_match ON odds_log(match_label, date);
        "#,
    )
    .context("create odds log schema")?;
    Ok(conn)
}

/// Store one snapshot and return the flags it raised.
pub fn append(conn: &Connection, s: &OddsSnapshot) -> Result<Vec<PatternFlag>> {
    let flags = pattern_flags(s);
    let flags_json = serde_json::to_string(&flags).context("serialize pattern flags")?;
    conn.execute(
        r#"
        INSERT INTO odds_log (
            date, match_label, venue, innings, over, score, wickets, rr,
            fav_team, fav_odds, nonfav_odds, who_batting, notes, flags_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
        params![
            s.date,
            s.match_label,
            s.venue,
            i64::from(s.innings),
            i64::from(s.over),
            i64::from(s.score),
            i64::from(s.wickets),
            s.run_rate(),
            s.fav_team,
            s.fav_odds,
            s.nonfav_odds,
            s.who_batting.map(|b| b.to_string()),
            s.notes,
            flags_json,
        ],
    )
    .context("insert odds snapshot")?;
    Ok(flags)
}

const SNAPSHOT_COLUMNS: &str = r#"
    SELECT date, match_label, venue, innings, over, score, wickets,
           fav_team, fav_odds, nonfav_odds, who_batting, notes
    FROM odds_log
"#;

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<OddsSnapshot> {
    let who: Option<String> = row.get(10)?;
    Ok(OddsSnapshot {
        date: row.get(0)?,
        match_label: row.get(1)?,
        venue: row.get(2)?,
        innings: row.get::<_, u8>(3)?,
        over: row.get::<_, u8>(4)?,
        score: row.get::<_, u32>(5)?,
        wickets: row.get::<_, u32>(6)?,
        fav_team: row.get(7)?,
        fav_odds: row.get(8)?,
        nonfav_odds: row.get(9)?,
        who_batting: who.and_then(|w| w.parse().ok()),
        notes: row.get(11)?,
    })
}

/// Snapshots for one match in the order they were logged.
pub fn load_match(conn: &Connection, match_label: &str) -> Result<Vec<OddsSnapshot>> {
    let sql = format!("{SNAPSHOT_COLUMNS} WHERE match_label = ?1 ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql).context("prepare odds log query")?;
    let rows = stmt
        .query_map(params![match_label], snapshot_from_row)
        .context("query odds log")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode odds row")?);
    }
    Ok(out)
}

/// Every snapshot in the log, oldest first.
pub fn load_all(conn: &Connection) -> Result<Vec<OddsSnapshot>> {
    let sql = format!("{SNAPSHOT_COLUMNS} ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql).context("prepare odds log query")?;
    let rows = stmt
        .query_map([], snapshot_from_row)
        .context("query odds log")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode odds row")?);
    }
    Ok(out)
}

/// Pattern counts across every logged match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSummary {
    pub matches: usize,
    pub entries: usize,
    /// One entry per flag, in `PatternFlag::ALL` order.
    pub counts: Vec<(PatternFlag, usize)>,
    /// Snapshots where the fielding favourite was under 1.07 at over 3.
    pub fielding_favourite_early: Vec<OddsSnapshot>,
    /// Matches where the favourite drifted 10% or more from its opening price and then came back in.
    pub drift_recoveries: Vec<String>,
}

impl PatternSummary {
    pub fn count(&self, flag: PatternFlag) -> usize {
        self.counts
            .iter()
            .find(|(f, _)| *f == flag)
            .map_or(0, |(_, n)| *n)
    }
}

pub fn pattern_summary(snapshots: &[OddsSnapshot]) -> PatternSummary {
    let mut counts = PatternFlag::ALL.map(|flag| (flag, 0usize));
    let mut fielding_favourite_early = Vec::new();
    let mut by_match: BTreeMap<&str, Vec<&OddsSnapshot>> = BTreeMap::new();

    for s in snapshots {
        for flag in pattern_flags(s) {
            if let Some((_, n)) = counts.iter_mut().find(|(f, _)| *f == flag) {
                *n += 1;
            }
            if flag == PatternFlag::FieldingFavouriteEarly {
                fielding_favourite_early.push(s.clone());
            }
        }
        by_match.entry(s.match_label.as_str()).or_default().push(s);
    }

    let drift_recoveries = by_match
        .iter_mut()
        .filter(|(_, rows)| rows.len() >= MIN_DRIFT_SNAPSHOTS)
        .filter_map(|(label, rows)| {
            rows.sort_by_key(|s| (s.innings, s.over));
            drifted_then_recovered(rows).then(|| label.to_string())
        })
        .collect();

    PatternSummary {
        matches: by_match.len(),
        entries: snapshots.len(),
        counts: counts.to_vec(),
        fielding_favourite_early,
        drift_recoveries,
    }
}

/// Peak favourite price at least `DRIFT_RATIO` times the opening price, with a shorter price
/// logged after the peak.
fn drifted_then_recovered(rows: &[&OddsSnapshot]) -> bool {
    let Some(opening) = rows.first().map(|s| s.fav_odds) else {
        return false;
    };
    let Some((peak_idx, peak)) = rows
        .iter()
        .map(|s| s.fav_odds)
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, o)| match best {
            Some((_, b)) if b >= o => best,
            _ => Some((i, o)),
        })
    else {
        return false;
    };
    peak >= opening * DRIFT_RATIO && rows[peak_idx + 1..].iter().any(|s| s.fav_odds < peak)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(innings: u8, over: u8, fav: f64, nonfav: f64, who: Option<BattingSide>) -> OddsSnapshot {
        OddsSnapshot {
            date: "2026-04-10".to_string(),
            match_label: "CSK vs MI".to_string(),
            venue: "Wankhede Stadium".to_string(),
            innings,
            over,
            score: 54,
            wickets: 1,
            fav_team: "MI".to_string(),
            fav_odds: fav,
            nonfav_odds: nonfav,
            who_batting: who,
            notes: String::new(),
        }
    }

    #[test]
    fn short_price_band_is_inclusive() {
        assert_eq!(
            pattern_flags(&snap(2, 15, 1.06, 9.0, None)),
            vec![PatternFlag::FavouriteShortPrice]
        );
        assert!(pattern_flags(&snap(2, 15, 1.07, 9.0, None)).is_empty());
        assert!(pattern_flags(&snap(2, 15, 5.0, 1.01, None)).contains(&PatternFlag::UnderdogShortPrice));
    }

    #[test]
    fn early_favourite_flags_depend_on_who_bats() {
        let fielding = pattern_flags(&snap(1, 3, 1.065, 9.0, Some(BattingSide::Nonfav)));
        assert!(fielding.contains(&PatternFlag::FieldingFavouriteEarly));
        let not_inns1 = pattern_flags(&snap(2, 3, 1.065, 9.0, Some(BattingSide::Nonfav)));
        assert!(!not_inns1.contains(&PatternFlag::FieldingFavouriteEarly));
        let batting = pattern_flags(&snap(1, 1, 1.065, 9.0, Some(BattingSide::Fav)));
        assert!(batting.contains(&PatternFlag::BattingFavouriteEarly));
    }

    #[test]
    fn flip_ignores_the_pre_match_row() {
        assert!(pattern_flags(&snap(1, 0, 2.2, 1.7, None)).is_empty());
        assert_eq!(pattern_flags(&snap(1, 6, 2.2, 1.7, None)), vec![PatternFlag::FavouriteFlip]);
    }

    #[test]
    fn quick_entry_parses() {
        assert_eq!(parse_quick_entry("54/1 1.45 2.65").unwrap(), (54, 1, 1.45, 2.65));
        assert_eq!(parse_quick_entry("12 1.9 1.9").unwrap(), (12, 0, 1.9, 1.9));
        assert!(parse_quick_entry("54/1 1.45").is_err());
        assert!(parse_quick_entry("x/1 1.45 2.0").is_err());
    }

    #[test]
    fn run_rate_is_rounded() {
        let mut s = snap(1, 6, 1.5, 2.5, None);
        s.score = 55;
        assert_eq!(s.run_rate(), 9.17);
        assert_eq!(snap(1, 0, 1.5, 2.5, None).run_rate(), 0.0);
    }

    #[test]
    fn log_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_db(&dir.path().join("odds.sqlite")).expect("open db");
        let rows = [
            snap(1, 0, 1.6, 2.4, None),
            snap(1, 3, 1.05, 9.0, Some(BattingSide::Nonfav)),
        ];
        for row in &rows {
            append(&conn, row).expect("append");
        }
        let flags = append(&conn, &snap(1, 6, 2.1, 1.8, Some(BattingSide::Fav))).expect("append");
        assert_eq!(flags, vec![PatternFlag::FavouriteFlip]);
        let loaded = load_match(&conn, "CSK vs MI").expect("load");
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1], rows[1]);
        assert_eq!(load_all(&conn).expect("load all").len(), 3);
    }

    #[test]
    fn drift_needs_a_later_shorter_price() {
        let rows = [
            snap(1, 0, 1.6, 2.4, None),
            snap(1, 2, 1.9, 2.0, None),
            snap(1, 4, 1.7, 2.2, None),
        ];
        let refs = rows.iter().collect::<Vec<_>>();
        assert!(drifted_then_recovered(&refs));
        assert!(!drifted_then_recovered(&refs[..2]));
        let small = [snap(1, 0, 1.6, 2.4, None), snap(1, 2, 1.7, 2.2, None), snap(1, 4, 1.5, 2.6, None)];
        assert!(!drifted_then_recovered(&small.iter().collect::<Vec<_>>()));
    }
}
