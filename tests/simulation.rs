use std::fs;
use std::path::PathBuf;

use matchpredictor::context::{MatchContext, MatchSetup, MatchTime, TossDecision, build_match_context};
use matchpredictor::innings_sim::{CHECKPOINT_OVERS, SeedMode};
use matchpredictor::match_sim::{MatchSimulator, SessionLines, innings_targets, simulate_match};
use matchpredictor::model_config::ModelConfig;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_match() -> (MatchSetup, SessionLines) {
    let value: serde_json::Value =
        serde_json::from_str(&read_fixture("match_wankhede.json")).expect("fixture is json");
    let setup = serde_json::from_value(value["setup"].clone()).expect("setup parses");
    let lines = serde_json::from_value(value["lines"].clone()).expect("lines parse");
    (setup, lines)
}

fn plain_setup(venue: &str) -> MatchSetup {
    MatchSetup {
        venue: venue.to_string(),
        team_batting_first: "Royal Challengers".to_string(),
        team_batting_second: "Kolkata Knight Riders".to_string(),
        toss_winner: "Royal Challengers".to_string(),
        toss_decision: TossDecision::Bat,
        match_time: MatchTime::Day,
        tournament_stage: "league_mid".to_string(),
        absent_players: Vec::new(),
    }
}

#[test]
fn win_probabilities_are_exact_complements() {
    let (setup, lines) = fixture_match();
    let contexts: Vec<MatchContext> = vec![
        build_match_context(&setup),
        build_match_context(&plain_setup("Eden Gardens, Kolkata")),
        build_match_context(&plain_setup("Somewhere New")),
    ];
    for (idx, ctx) in contexts.iter().enumerate() {
        let r = simulate_match(ctx, &lines, 3_000, SeedMode::Fixed(idx as u64 + 1));
        assert_eq!(r.win_prob_batting_first + r.win_prob_batting_second, 1.0);
        assert!(r.win_prob_batting_first > 0.0 && r.win_prob_batting_first < 1.0);
        assert!(r.win_prob_batting_second > 0.0 && r.win_prob_batting_second < 1.0);
    }
}

#[test]
fn session_means_never_decrease() {
    let (setup, lines) = fixture_match();
    let ctx = build_match_context(&setup);
    let r = simulate_match(&ctx, &lines, 4_000, SeedMode::Fixed(11));
    let overs = r.sessions.iter().map(|s| s.over).collect::<Vec<_>>();
    assert_eq!(overs, CHECKPOINT_OVERS.to_vec());
    for pair in r.sessions.windows(2) {
        assert!(pair[1].mean_runs >= pair[0].mean_runs);
    }
    assert_eq!(r.session(20).expect("over 20").mean_runs, r.innings1_mean);
}

#[test]
fn fixed_seed_is_bit_identical() {
    let (setup, lines) = fixture_match();
    let ctx = build_match_context(&setup);
    let a = simulate_match(&ctx, &lines, 2_500, SeedMode::Fixed(42));
    let b = simulate_match(&ctx, &lines, 2_500, SeedMode::Fixed(42));
    assert_eq!(a, b);
    assert_eq!(a.seed, 42);

    let c = simulate_match(&ctx, &lines, 2_500, SeedMode::Fixed(43));
    assert_ne!(a.sessions, c.sessions);
}

#[test]
fn line_probabilities_follow_the_line() {
    let (setup, lines) = fixture_match();
    let ctx = build_match_context(&setup);
    let r = simulate_match(&ctx, &lines, 3_000, SeedMode::Fixed(5));
    let six = r.session(6).expect("over 6 session");
    assert_eq!(six.lines.len(), 2);
    let low = six.prob_over(47.5).expect("line quoted");
    let high = six.prob_over(51.5).expect("line quoted");
    assert!(low >= high);
    assert!(r.session(10).expect("over 10").prob_over(1000.0).is_none());
    // over 15 has a line, over 10 a single one
    assert_eq!(r.session(15).expect("over 15").lines.len(), 1);
}

#[test]
fn zero_trials_still_simulates_once() {
    let ctx = build_match_context(&plain_setup("Eden Gardens, Kolkata"));
    let r = simulate_match(&ctx, &SessionLines::new(), 0, SeedMode::Fixed(1));
    assert_eq!(r.trials, 1);
    assert_eq!(r.win_prob_batting_first + r.win_prob_batting_second, 1.0);
    assert!(r.sessions.iter().all(|s| s.lines.is_empty()));
}

#[test]
fn chase_target_reflects_lights_and_toss() {
    let config = ModelConfig::default();
    let (setup, _) = fixture_match();
    let ctx = build_match_context(&setup);
    let (first, second) = innings_targets(&ctx, &config);
    assert_eq!(first.mean_total, ctx.first_innings_mean());
    // Mumbai Indians won the toss and chase: dew plus the toss boost on top of the venue split
    let expected = first.mean_total * ctx.venue_chase_advantage * 2.0
        + ctx.dew_risk * config.dew_runs_chase
        + ctx.toss_win_prob_boost * first.mean_total;
    assert!((second.mean_total - expected).abs() < 1e-9);
    assert_eq!(second.wicket_rate_boost, 0.0);

    let day = build_match_context(&plain_setup("Eden Gardens, Kolkata"));
    let (first, second) = innings_targets(&day, &config);
    assert!((second.mean_total - first.mean_total * day.venue_chase_advantage * 2.0).abs() < 1e-9);
}

#[test]
fn reported_spread_is_a_fraction_of_target() {
    let ctx = build_match_context(&plain_setup("Eden Gardens, Kolkata"));
    let sim = MatchSimulator::default();
    let r = sim.simulate_match(&ctx, &SessionLines::new(), 500, SeedMode::Fixed(3));
    assert!((r.innings1_model_std - r.innings1_target * 0.12).abs() < 1e-9);
    assert!(r.innings1_std > 0.0);
}

#[test]
fn higher_venue_baseline_raises_first_innings() {
    let base = build_match_context(&plain_setup("Eden Gardens, Kolkata"));
    let boosted = base.with_venue_avg_runs(base.venue_avg_runs + 30.0);
    let lines = SessionLines::new();
    let a = simulate_match(&base, &lines, 3_000, SeedMode::Fixed(8));
    let b = simulate_match(&boosted, &lines, 3_000, SeedMode::Fixed(8));
    assert!(b.innings1_mean > a.innings1_mean);
    assert!(b.win_prob_batting_first > a.win_prob_batting_first);
}
