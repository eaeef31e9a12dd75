use matchpredictor::context::{MatchSetup, MatchTime, TossDecision, build_match_context};
use matchpredictor::edge::{MatchWinnerOdds, OddsTable, detect_ev};
use matchpredictor::innings_sim::SeedMode;
use matchpredictor::match_sim::{SessionLines, simulate_match};
use matchpredictor::report_export::export_report;

#[test]
fn workbook_is_written_with_every_row() {
    let setup = MatchSetup {
        venue: "Narendra Modi Stadium, Ahmedabad".to_string(),
        team_batting_first: "Gujarat Titans".to_string(),
        team_batting_second: "Lucknow Super Giants".to_string(),
        toss_winner: "Lucknow Super Giants".to_string(),
        toss_decision: TossDecision::Field,
        match_time: MatchTime::Night,
        tournament_stage: "qualifier".to_string(),
        absent_players: Vec::new(),
    };
    let mut lines = SessionLines::new();
    lines.insert(6, vec![52.5, 55.5]);
    lines.insert(20, vec![180.5]);
    let result = simulate_match(&build_match_context(&setup), &lines, 1_000, SeedMode::Fixed(4));
    let odds = OddsTable {
        match_winner: MatchWinnerOdds {
            batting_first: Some(4.0),
            batting_second: Some(4.0),
        },
        ..OddsTable::default()
    };
    let report = detect_ev(&result, "GT vs LSG", &odds);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.xlsx");
    let summary = export_report(&path, &result, &report).expect("export");

    assert_eq!(summary.sessions, 4);
    // two lines at over 6, one at 20, and a bare row each for 10 and 15
    assert_eq!(summary.lines, 5);
    assert_eq!(summary.signals, report.signals.len());
    let meta = std::fs::metadata(&path).expect("workbook exists");
    assert!(meta.len() > 0);
}
