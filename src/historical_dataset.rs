use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::cricsheet::{DeliveryRecord, MatchRecord, ParsedArchive};
use crate::model_config::app_cache_dir;

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub matches_upserted: usize,
    pub deliveries_upserted: usize,
    pub files_skipped: usize,
    pub latest_date: Option<String>,
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("historical_matches.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            season TEXT NOT NULL,
            venue TEXT NOT NULL,
            team1 TEXT NOT NULL,
            team2 TEXT NOT NULL,
            toss_winner TEXT NOT NULL,
            toss_decision TEXT NOT NULL,
            winner TEXT NOT NULL,
            win_by_runs INTEGER NOT NULL,
            win_by_wickets INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_venue ON matches(venue);
        CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season);

        CREATE TABLE IF NOT EXISTS deliveries (
            match_id TEXT NOT NULL,
            innings INTEGER NOT NULL,
            over INTEGER NOT NULL,
            ball INTEGER NOT NULL,
            batting_team TEXT NOT NULL,
            batter TEXT NOT NULL,
            bowler TEXT NOT NULL,
            runs_batter INTEGER NOT NULL,
            runs_extras INTEGER NOT NULL,
            runs_total INTEGER NOT NULL,
            is_wicket INTEGER NOT NULL,
            wicket_kind TEXT NOT NULL,
            PRIMARY KEY (match_id, innings, over, ball)
        );
        CREATE INDEX IF NOT EXISTS idx_deliveries_match ON deliveries(match_id, innings);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            matches_upserted INTEGER NOT NULL,
            deliveries_upserted INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Store a parsed archive. Re-ingesting the same files updates rows in place.
pub fn ingest_archive(
    conn: &mut Connection,
    db_path: PathBuf,
    source: &str,
    archive: &ParsedArchive,
) -> Result<IngestSummary> {
    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source, matches_upserted, deliveries_upserted, errors_json)
         VALUES (?1, NULL, ?2, 0, 0, '[]')",
        params![started_at, source],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let tx = conn.transaction().context("begin ingest transaction")?;
    for m in &archive.matches {
        upsert_match(&tx, m)?;
    }
    for d in &archive.deliveries {
        upsert_delivery(&tx, d)?;
    }
    tx.commit().context("commit ingest transaction")?;

    let finished_at = Utc::now().to_rfc3339();
    let errors_json = serde_json::to_string(&archive.skipped).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, matches_upserted = ?2, deliveries_upserted = ?3, errors_json = ?4
         WHERE run_id = ?5",
        params![
            finished_at,
            archive.matches.len() as i64,
            archive.deliveries.len() as i64,
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;

    let latest_date = conn
        .query_row("SELECT MAX(date) FROM matches", [], |row| {
            row.get::<_, Option<String>>(0)
        })
        .context("query latest date")?;

    Ok(IngestSummary {
        db_path,
        matches_upserted: archive.matches.len(),
        deliveries_upserted: archive.deliveries.len(),
        files_skipped: archive.skipped.len(),
        latest_date,
    })
}

pub fn load_matches(conn: &Connection) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, date, season, venue, team1, team2,
                toss_winner, toss_decision, winner, win_by_runs, win_by_wickets
            FROM matches
            ORDER BY date ASC, match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(MatchRecord {
                match_id: row.get(0)?,
                date: row.get(1)?,
                season: row.get(2)?,
                venue: row.get(3)?,
                team1: row.get(4)?,
                team2: row.get(5)?,
                toss_winner: row.get(6)?,
                toss_decision: row.get(7)?,
                winner: row.get(8)?,
                win_by_runs: row.get::<_, u32>(9)?,
                win_by_wickets: row.get::<_, u32>(10)?,
            })
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

/// Deliveries of one innings number across all matches, in ball order.
pub fn load_deliveries(conn: &Connection, innings: u8) -> Result<Vec<DeliveryRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, innings, batting_team, over, ball, batter, bowler,
                runs_batter, runs_extras, runs_total, is_wicket, wicket_kind
            FROM deliveries
            WHERE innings = ?1
            ORDER BY match_id ASC, over ASC, ball ASC
            "#,
        )
        .context("prepare load deliveries query")?;

    let rows = stmt
        .query_map(params![i64::from(innings)], |row| {
            Ok(DeliveryRecord {
                match_id: row.get(0)?,
                innings: row.get::<_, u8>(1)?,
                batting_team: row.get(2)?,
                over: row.get::<_, u8>(3)?,
                ball: row.get::<_, u8>(4)?,
                batter: row.get(5)?,
                bowler: row.get(6)?,
                runs_batter: row.get::<_, u32>(7)?,
                runs_extras: row.get::<_, u32>(8)?,
                runs_total: row.get::<_, u32>(9)?,
                is_wicket: row.get::<_, i64>(10)? != 0,
                wicket_kind: row.get(11)?,
            })
        })
        .context("query load deliveries")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode delivery row")?);
    }
    Ok(out)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    let sql = match table {
        "matches" => "SELECT COUNT(*) FROM matches",
        "deliveries" => "SELECT COUNT(*) FROM deliveries",
        "ingest_runs" => "SELECT COUNT(*) FROM ingest_runs",
        other => anyhow::bail!("unknown table {other}"),
    };
    conn.query_row(sql, [], |row| row.get::<_, u64>(0))
        .with_context(|| format!("count {table}"))
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &MatchRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (
            match_id, date, season, venue, team1, team2,
            toss_winner, toss_decision, winner, win_by_runs, win_by_wickets, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(match_id) DO UPDATE SET
            date = excluded.date,
            season = excluded.season,
            venue = excluded.venue,
            team1 = excluded.team1,
            team2 = excluded.team2,
            toss_winner = excluded.toss_winner,
            toss_decision = excluded.toss_decision,
            winner = excluded.winner,
            win_by_runs = excluded.win_by_runs,
            win_by_wickets = excluded.win_by_wickets,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id,
            m.date,
            m.season,
            m.venue,
            m.team1,
            m.team2,
            m.toss_winner,
            m.toss_decision,
            m.winner,
            i64::from(m.win_by_runs),
            i64::from(m.win_by_wickets),
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;
    Ok(())
}

fn upsert_delivery(tx: &rusqlite::Transaction<'_>, d: &DeliveryRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO deliveries (
            match_id, innings, over, ball, batting_team, batter, bowler,
            runs_batter, runs_extras, runs_total, is_wicket, wicket_kind
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(match_id, innings, over, ball) DO UPDATE SET
            batting_team = excluded.batting_team,
            batter = excluded.batter,
            bowler = excluded.bowler,
            runs_batter = excluded.runs_batter,
            runs_extras = excluded.runs_extras,
            runs_total = excluded.runs_total,
            is_wicket = excluded.is_wicket,
            wicket_kind = excluded.wicket_kind
        "#,
        params![
            d.match_id,
            i64::from(d.innings),
            i64::from(d.over),
            i64::from(d.ball),
            d.batting_team,
            d.batter,
            d.bowler,
            i64::from(d.runs_batter),
            i64::from(d.runs_extras),
            i64::from(d.runs_total),
            bool_to_i64(d.is_wicket),
            d.wicket_kind,
        ],
    )
    .context("upsert delivery")?;
    Ok(())
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
