use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

use matchpredictor::context::{ContextBuilder, MatchContext, MatchSetup};
use matchpredictor::edge::{self, MarketEdgeReport, OddsTable};
use matchpredictor::innings_sim::SeedMode;
use matchpredictor::lineup::{self, PlayerProfiles, XiAnalysis};
use matchpredictor::logging::init_logging;
use matchpredictor::match_sim::{MatchSimulator, SessionLines, SimulationResult};
use matchpredictor::model_config::{ModelConfig, load_dotenv};
use matchpredictor::registry::Registries;
use matchpredictor::report_export::export_report;

#[derive(Parser, Debug)]
#[command(name = "matchpredictor", about = "T20 match simulation and +EV detection")]
struct Args {
    /// JSON file with `setup`, optional `lines`, `odds` and `lineups`.
    match_file: PathBuf,

    /// Model constants (JSON). Missing keys keep their defaults.
    #[arg(long, env = "MATCHPREDICTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Venue/toss/stage tables. Defaults to the calibrated cache file, then the built-in set.
    #[arg(long)]
    registries: Option<PathBuf>,

    /// Player profiles (JSON) used to rate the playing XIs. Defaults to the cache file.
    #[arg(long, env = "MP_PLAYER_PROFILES")]
    profiles: Option<PathBuf>,

    #[arg(long)]
    trials: Option<usize>,

    #[arg(long, conflicts_with = "entropy")]
    seed: Option<u64>,

    /// Seed from the OS instead of a fixed value.
    #[arg(long)]
    entropy: bool,

    /// Extra first-innings runs applied on top of the built context.
    #[arg(long, allow_hyphen_values = true)]
    extra_runs: Option<f64>,

    /// Write an .xlsx report here.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print the result and signals as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Deserialize)]
struct MatchFile {
    setup: MatchSetup,
    #[serde(default)]
    lines: SessionLines,
    #[serde(default)]
    odds: OddsTable,
    #[serde(default)]
    lineups: Option<Lineups>,
}

#[derive(Debug, Deserialize)]
struct Lineups {
    batting_first: Vec<String>,
    #[serde(default)]
    batting_second: Vec<String>,
}

fn main() -> Result<()> {
    load_dotenv();
    init_logging();
    let args = Args::parse();

    let config = ModelConfig::load(args.config.as_deref())?;
    let registries = Registries::load_or_builtin(args.registries.as_deref())?;

    let raw = fs::read_to_string(&args.match_file)
        .with_context(|| format!("read match file {}", args.match_file.display()))?;
    let file: MatchFile = serde_json::from_str(raw.trim())
        .with_context(|| format!("parse match file {}", args.match_file.display()))?;

    let mut ctx = ContextBuilder::from_registries(&registries, &config).build(&file.setup);
    let mut xis = Vec::new();
    if let Some(lineups) = &file.lineups {
        match PlayerProfiles::load_optional(args.profiles.as_deref())? {
            Some(profiles) => {
                let first = lineup::analyze_xi(&lineups.batting_first, &profiles);
                let second = lineup::analyze_xi(&lineups.batting_second, &profiles);
                ctx = lineup::apply_xi_adjustment(&ctx, &first);
                xis.push((ctx.team_batting_first.clone(), first));
                xis.push((ctx.team_batting_second.clone(), second));
            }
            None => warn!("lineups given but no player profiles found, skipping XI adjustment"),
        }
    }
    if let Some(runs) = args.extra_runs {
        ctx = ctx.with_extra_runs(runs);
    }

    let trials = args.trials.unwrap_or(config.trials);
    let seed = if args.entropy {
        SeedMode::Entropy
    } else {
        SeedMode::Fixed(args.seed.unwrap_or(config.seed))
    };

    let label = format!("{} vs {}", ctx.team_batting_first, ctx.team_batting_second);
    info!(%label, venue = %ctx.venue, trials, "running simulation");
    let simulator = MatchSimulator::new(config.clone());
    let result = simulator.simulate_match(&ctx, &file.lines, trials, seed);
    let report = edge::detect(&result, &label, &file.odds, &config.edge);

    if args.json {
        let out = serde_json::json!({
            "context": ctx,
            "lineups": xis,
            "result": result,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&out).context("serialize output")?);
    } else {
        print_context(&ctx);
        for (team, xi) in &xis {
            print_xi(team, xi);
        }
        print_result(&result);
        print_report(&report);
    }

    if let Some(path) = args.export.as_deref() {
        let summary = export_report(path, &result, &report)?;
        println!(
            "Exported {} session rows and {} signals to {}",
            summary.lines,
            summary.signals,
            path.display()
        );
    }
    Ok(())
}

fn print_context(ctx: &MatchContext) {
    println!("{} vs {} at {}", ctx.team_batting_first, ctx.team_batting_second, ctx.venue);
    if !ctx.venue_known {
        println!("  (venue not in registry, default baselines used)");
    }
    println!(
        "  venue avg {:.0}, powerplay {:.0}, chase advantage {:.1}%, dew risk {:.2}",
        ctx.venue_avg_runs,
        ctx.venue_avg_powerplay,
        ctx.venue_chase_advantage * 100.0,
        ctx.dew_risk
    );
    let b = &ctx.breakdown;
    println!(
        "  run adj {:+.1} (dew {:+.1}, stage {:+.1}, roster {:+.1}, manual {:+.1}), wicket adj {:+.3}",
        ctx.run_adjustment, b.dew_runs, b.stage_runs, b.roster_runs, b.manual_runs, ctx.wicket_adjustment
    );
}

fn print_xi(team: &str, xi: &XiAnalysis) {
    println!("  {team} XI: net {:+.1} runs, top-order form {:.1}", xi.net_runs, xi.avg_form);
    for p in &xi.danger {
        println!(
            "    danger: {:<22} avg {:.0} sr {:.0} form {:.0}",
            p.name, p.avg, p.sr, p.form_index
        );
    }
    if !xi.in_form.is_empty() {
        println!("    in form: {}", xi.in_form.join(", "));
    }
    if !xi.out_of_form.is_empty() {
        println!("    out of form: {}", xi.out_of_form.join(", "));
    }
    if !xi.missing.is_empty() {
        println!("    no profile: {}", xi.missing.join(", "));
    }
}

fn print_result(r: &SimulationResult) {
    println!();
    println!("Win probability ({} trials, seed {})", r.trials, r.seed);
    println!("  {:<28} {:>6.1}%", r.team_batting_first, r.win_prob_batting_first * 100.0);
    println!("  {:<28} {:>6.1}%", r.team_batting_second, r.win_prob_batting_second * 100.0);
    println!(
        "Innings 1: target {:.1} (±{:.1}), simulated {:.1} ± {:.1}",
        r.innings1_target, r.innings1_model_std, r.innings1_mean, r.innings1_std
    );
    println!(
        "Innings 2: target {:.1} (±{:.1}), simulated {:.1} ± {:.1}",
        r.innings2_target, r.innings2_model_std, r.innings2_mean, r.innings2_std
    );
    println!();
    println!("Sessions (first innings)");
    for s in &r.sessions {
        println!("  over {:>2}: {:>6.1} ± {:.1}", s.over, s.mean_runs, s.std_runs);
        for line in &s.lines {
            println!(
                "           line {:>6.1}: over {:>5.1}%  under {:>5.1}%",
                line.line,
                line.prob_over * 100.0,
                (1.0 - line.prob_over) * 100.0
            );
        }
    }
}

fn print_report(report: &MarketEdgeReport) {
    println!();
    println!("{}", report.summary);
    for s in &report.signals {
        println!(
            "  [{}] {} / {} @ {:.2}: edge {:+.1} pts, EV {:+.0} per 1000",
            s.strength, s.market, s.selection, s.decimal_odds, s.edge_percent, s.ev_per_1000
        );
        println!("      {}", s.reasoning);
    }
}
