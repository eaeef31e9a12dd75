use std::path::PathBuf;

use matchpredictor::calibration::{FULL_WEIGHT_MATCHES, calibrate};
use matchpredictor::context::{ContextBuilder, MatchSetup, MatchTime, TossDecision};
use matchpredictor::cricsheet;
use matchpredictor::historical_dataset;
use matchpredictor::model_config::ModelConfig;
use matchpredictor::registry::{Registries, VenueRegistry};

fn cricsheet_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("cricsheet");
    path
}

#[test]
fn directory_load_skips_malformed_files() {
    let archive = cricsheet::load_dir(&cricsheet_dir()).expect("fixtures parse");
    assert_eq!(archive.matches.len(), 2);
    assert_eq!(archive.skipped.len(), 1);
    assert!(archive.skipped[0].starts_with("1003.json"));
    assert_eq!(archive.matches[0].match_id, "1001");
    assert_eq!(archive.matches[0].winner, "Beta");
    assert_eq!(archive.matches[1].win_by_runs, 15);

    let first = archive
        .deliveries
        .iter()
        .filter(|d| d.match_id == "1001" && d.innings == 1)
        .collect::<Vec<_>>();
    assert_eq!(first.len(), 120);
    assert_eq!(first.iter().map(|d| d.runs_total).sum::<u32>(), 159);
    assert_eq!(first.iter().filter(|d| d.is_wicket).count(), 2);
    assert_eq!(first.last().map(|d| (d.over, d.ball)), Some((20, 6)));
}

#[test]
fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(cricsheet::load_dir(dir.path()).is_err());
    std::fs::write(dir.path().join("broken.json"), "{").expect("write");
    assert!(cricsheet::load_dir(dir.path()).is_err());
}

#[test]
fn ingest_then_calibrate_round_trip() {
    let archive = cricsheet::load_dir(&cricsheet_dir()).expect("fixtures parse");
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("history.sqlite");
    let mut conn = historical_dataset::open_db(&db_path).expect("open db");
    let summary = historical_dataset::ingest_archive(&mut conn, db_path.clone(), "fixtures", &archive)
        .expect("ingest");
    assert_eq!(summary.matches_upserted, 2);
    assert_eq!(summary.deliveries_upserted, archive.deliveries.len());
    assert_eq!(summary.latest_date.as_deref(), Some("2024-04-08"));

    let matches = historical_dataset::load_matches(&conn).expect("load matches");
    let first = historical_dataset::load_deliveries(&conn, 1).expect("load deliveries");
    assert_eq!(first.len(), 240);

    let priors = Registries::builtin();
    let report = calibrate(&matches, &first, priors);
    let ground = report.venue("Test Ground").expect("calibrated venue");
    assert_eq!(ground.sample_matches, 2);
    assert_eq!(ground.decided_matches, 2);
    let w = 2.0 / FULL_WEIGHT_MATCHES;
    let expected_mean = (1.0 - w) * 162.0 + w * 170.5;
    assert!((ground.first_innings_mean - expected_mean).abs() < 1e-9);
    assert!((ground.chase_advantage - 0.5).abs() < 1e-9);
    // one field-first toss, and its winner won
    assert!(ground.toss_field_boost > 0.05);
    assert_eq!(ground.sessions[&6].mean_runs, 50.0);
    assert_eq!(ground.sessions[&20].mean_runs, 170.5);

    let registries = report.to_registries(priors);
    let out = dir.path().join("registries.json");
    registries.save(&out).expect("save registries");
    let loaded = Registries::load(&out).expect("load registries");
    assert!(loaded.venues.resolve("Test Ground").is_known());

    let config = ModelConfig::default();
    let ctx = ContextBuilder::from_registries(&loaded, &config).build(&MatchSetup {
        venue: "Test Ground".to_string(),
        team_batting_first: "Alpha".to_string(),
        team_batting_second: "Beta".to_string(),
        toss_winner: "Beta".to_string(),
        toss_decision: TossDecision::Field,
        match_time: MatchTime::Day,
        tournament_stage: "league_mid".to_string(),
        absent_players: Vec::new(),
    });
    assert!(ctx.venue_known);
    assert_eq!(ctx.venue_avg_runs, (expected_mean * 10.0).round() / 10.0);
    assert_eq!(ctx.dew_risk, 0.40);
}
