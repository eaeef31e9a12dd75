use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use matchpredictor::edge::{OddsTable, OverUnderOdds};
use matchpredictor::live::{LiveState, project, session_edges};
use matchpredictor::logging::init_logging_simple;
use matchpredictor::match_sim::SessionLines;
use matchpredictor::model_config::{ModelConfig, load_dotenv};

/// Project the rest of a live first innings from the current score.
#[derive(Parser, Debug)]
#[command(name = "live_checkpoint")]
struct Args {
    /// Current score, e.g. `54/1`.
    score: String,

    /// Overs bowled in `O.B` form, e.g. `6.2`.
    overs: String,

    /// Session line as `over:line`, repeatable (e.g. `--line 10:84.5`).
    #[arg(long = "line", value_parser = parse_line)]
    lines: Vec<(u8, f64)>,

    /// Over/under quote as `over:over_odds:under_odds`, repeatable.
    #[arg(long = "odds", value_parser = parse_odds)]
    odds: Vec<(u8, f64, f64)>,

    /// Odds table JSON (same shape as the `odds` block of a match file).
    #[arg(long, conflicts_with = "odds")]
    odds_file: Option<PathBuf>,

    #[arg(long, env = "MATCHPREDICTOR_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    trials: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    load_dotenv();
    init_logging_simple();
    let args = Args::parse();

    let config = ModelConfig::load(args.config.as_deref())?;
    let state = LiveState::parse(&args.score, &args.overs)?;

    let mut lines = SessionLines::new();
    for (over, line) in &args.lines {
        lines.entry(*over).or_default().push(*line);
    }

    let odds = match &args.odds_file {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read odds file {}", path.display()))?;
            serde_json::from_str::<OddsTable>(raw.trim())
                .with_context(|| format!("parse odds file {}", path.display()))?
        }
        None => {
            let mut table = OddsTable::default();
            for (over, over_odds, under_odds) in &args.odds {
                table.session_runs.insert(
                    *over,
                    OverUnderOdds {
                        over: Some(*over_odds),
                        under: Some(*under_odds),
                    },
                );
            }
            table
        }
    };

    let trials = args.trials.unwrap_or(config.trials);
    let seed = args.seed.unwrap_or(config.seed);
    let projection = project(state, &lines, &config.live, trials, seed);

    println!(
        "Live: {}/{} after {} balls ({} trials)",
        state.runs, state.wickets, state.balls, projection.trials
    );
    for cp in &projection.checkpoints {
        println!("  over {:>2}: {:>6.1} ± {:.1}", cp.over, cp.mean_runs, cp.std_runs);
        for line in &cp.lines {
            println!(
                "           line {:>6.1}: over {:>5.1}%  under {:>5.1}%",
                line.line,
                line.prob_over * 100.0,
                (1.0 - line.prob_over) * 100.0
            );
        }
    }
    println!(
        "Final: mean {:.1}, median {:.1}, p10 {:.1}, p90 {:.1}",
        projection.final_mean, projection.final_median, projection.final_p10, projection.final_p90
    );

    let signals = session_edges(&projection, &odds, &config.edge);
    if signals.is_empty() {
        println!("No +EV session signals.");
    }
    for s in &signals {
        println!(
            "  [{}] {} @ {:.2}: edge {:+.1} pts, EV {:+.0} per 1000",
            s.strength, s.selection, s.decimal_odds, s.edge_percent, s.ev_per_1000
        );
    }
    Ok(())
}

fn parse_line(raw: &str) -> Result<(u8, f64), String> {
    let (over, line) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected over:line, got '{raw}'"))?;
    let over = over.trim().parse::<u8>().map_err(|e| e.to_string())?;
    let line = line.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok((over, line))
}

fn parse_odds(raw: &str) -> Result<(u8, f64, f64), String> {
    let parts = raw.split(':').map(str::trim).collect::<Vec<_>>();
    let [over, over_odds, under_odds] = parts.as_slice() else {
        return Err(format!("expected over:over_odds:under_odds, got '{raw}'"));
    };
    Ok((
        over.parse::<u8>().map_err(|e| e.to_string())?,
        over_odds.parse::<f64>().map_err(|e| e.to_string())?,
        under_odds.parse::<f64>().map_err(|e| e.to_string())?,
    ))
}
