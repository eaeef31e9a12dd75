use std::collections::HashMap;

use matchpredictor::context::{
    ContextBuilder, MatchSetup, MatchTime, PlayerAbsence, PlayerRole, TossDecision,
    build_match_context,
};
use matchpredictor::model_config::ModelConfig;
use matchpredictor::registry::{
    Registries, StageTable, TossBoostTable, VenueStats, VenueTable,
};

fn setup(venue: &str, decision: TossDecision, time: MatchTime) -> MatchSetup {
    MatchSetup {
        venue: venue.to_string(),
        team_batting_first: "Sunrisers Hyderabad".to_string(),
        team_batting_second: "Rajasthan Royals".to_string(),
        toss_winner: "Rajasthan Royals".to_string(),
        toss_decision: decision,
        match_time: time,
        tournament_stage: "league_mid".to_string(),
        absent_players: Vec::new(),
    }
}

#[test]
fn unknown_venue_at_night_gets_default_dew_only() {
    let ctx = build_match_context(&setup("Unlisted Park", TossDecision::Bat, MatchTime::Night));
    assert!(!ctx.venue_known);
    assert_eq!(ctx.venue_avg_runs, 162.0);
    assert_eq!(ctx.dew_risk, 0.40);
    assert_eq!(ctx.stage_run_multiplier, 1.0);
    assert_eq!(ctx.run_adjustment, 3.2);
    assert_eq!(ctx.breakdown.stage_runs, 0.0);
    assert_eq!(ctx.breakdown.roster_runs, 0.0);
    assert_eq!(ctx.wicket_adjustment, 0.0);
}

#[test]
fn day_matches_carry_no_dew() {
    let ctx = build_match_context(&setup("Unlisted Park", TossDecision::Bat, MatchTime::Day));
    assert_eq!(ctx.run_adjustment, 0.0);
    let dn = build_match_context(&setup("Unlisted Park", TossDecision::Bat, MatchTime::DayNight));
    assert_eq!(dn.run_adjustment, 3.2);
}

#[test]
fn absences_move_the_right_adjustment() {
    let base = setup("Sawai Mansingh Stadium", TossDecision::Field, MatchTime::Night);
    let without = build_match_context(&base);

    let mut batter = base.clone();
    batter.absent_players.push(PlayerAbsence::new(
        "Top Order",
        PlayerRole::Batter,
        "Sunrisers Hyderabad",
    ));
    let with_batter = build_match_context(&batter);
    assert!(with_batter.run_adjustment < without.run_adjustment);
    assert_eq!(with_batter.wicket_adjustment, without.wicket_adjustment);

    let mut bowler = base.clone();
    bowler.absent_players.push(PlayerAbsence::new(
        "Strike Bowler",
        PlayerRole::Bowler,
        "Rajasthan Royals",
    ));
    let with_bowler = build_match_context(&bowler);
    assert!(with_bowler.wicket_adjustment > without.wicket_adjustment);
    assert_eq!(with_bowler.run_adjustment, without.run_adjustment);

    let mut allrounder = base;
    allrounder.absent_players.push(PlayerAbsence::new(
        "Utility",
        PlayerRole::Allrounder,
        "Sunrisers Hyderabad",
    ));
    let with_allrounder = build_match_context(&allrounder);
    assert!(with_allrounder.run_adjustment < without.run_adjustment);
    assert!(with_allrounder.wicket_adjustment > without.wicket_adjustment);
}

#[test]
fn toss_boost_only_applies_when_fielding() {
    let bat = build_match_context(&setup("Sawai Mansingh Stadium", TossDecision::Bat, MatchTime::Night));
    assert_eq!(bat.toss_win_prob_boost, 0.0);
    let field =
        build_match_context(&setup("Sawai Mansingh Stadium", TossDecision::Field, MatchTime::Night));
    assert!(field.toss_win_prob_boost > 0.0);
    assert_eq!(field.toss_win_prob_boost, 0.179);
}

#[test]
fn overrides_return_new_values() {
    let ctx = build_match_context(&setup("Eden Gardens", TossDecision::Field, MatchTime::Night));
    let bumped = ctx.with_extra_runs(10.0).with_extra_wicket_rate(0.02);
    assert_eq!(bumped.run_adjustment, ctx.run_adjustment + 10.0);
    assert_eq!(bumped.breakdown.manual_runs, 10.0);
    assert_eq!(bumped.wicket_adjustment, 0.02);
    // the original is untouched
    assert_eq!(ctx.breakdown.manual_runs, 0.0);
    assert_eq!(ctx.wicket_adjustment, 0.0);

    let capped = ctx.with_chase_advantage(1.4);
    assert_eq!(capped.venue_chase_advantage, 1.0);
    assert_eq!(ctx.with_powerplay_mean(60.0).venue_avg_powerplay, 60.0);
}

#[test]
fn injected_tables_replace_the_builtin_ones() {
    let mut venues = HashMap::new();
    venues.insert(
        "Fixture Oval".to_string(),
        VenueStats {
            avg_first_innings_runs: 150.0,
            avg_powerplay_runs: 45.0,
            chase_advantage: 0.6,
            dew_risk: 1.0,
        },
    );
    let mut boosts = HashMap::new();
    boosts.insert("Fixture Oval".to_string(), 0.2);
    let mut multipliers = HashMap::new();
    multipliers.insert("final".to_string(), 0.9);
    let registries = Registries {
        venues: VenueTable {
            venues,
            fallback: VenueStats::fallback(),
        },
        toss: TossBoostTable {
            boosts,
            default_boost: 0.0,
        },
        stages: StageTable {
            multipliers,
            default_multiplier: 1.0,
        },
    };
    let config = ModelConfig::default();
    let builder = ContextBuilder::from_registries(&registries, &config);

    let mut s = setup("Fixture Oval", TossDecision::Field, MatchTime::Night);
    s.tournament_stage = "final".to_string();
    let ctx = builder.build(&s);
    assert!(ctx.venue_known);
    assert_eq!(ctx.toss_win_prob_boost, 0.2);
    assert_eq!(ctx.breakdown.dew_runs, 8.0);
    assert!((ctx.breakdown.stage_runs - -15.0).abs() < 1e-9);
    assert!((ctx.first_innings_mean() - 143.0).abs() < 1e-9);

    // An entry present in the builtin set is unknown to the fixture tables.
    let other = builder.build(&setup("Eden Gardens", TossDecision::Field, MatchTime::Day));
    assert!(!other.venue_known);
    assert_eq!(other.toss_win_prob_boost, 0.0);
}

#[test]
fn setup_json_uses_lowercase_tags() {
    let raw = r#"{
        "venue": "Eden Gardens",
        "team_batting_first": "A",
        "team_batting_second": "B",
        "toss_winner": "B",
        "toss_decision": "field",
        "match_time": "day-night",
        "tournament_stage": "qualifier",
        "absent_players": [{"name": "K", "role": "wk-batter", "team": "A"}]
    }"#;
    let s: MatchSetup = serde_json::from_str(raw).expect("setup parses");
    assert_eq!(s.match_time, MatchTime::DayNight);
    assert_eq!(s.absent_players[0].role, PlayerRole::WicketKeeperBatter);
    let ctx = build_match_context(&s);
    assert_eq!(ctx.stage_run_multiplier, 0.96);
    assert!(ctx.breakdown.roster_runs < 0.0);
}
