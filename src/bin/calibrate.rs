use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchpredictor::calibration::calibrate;
use matchpredictor::historical_dataset;
use matchpredictor::logging::init_logging_simple;
use matchpredictor::model_config::load_dotenv;
use matchpredictor::registry::Registries;

fn main() -> Result<()> {
    load_dotenv();
    init_logging_simple();

    let db_path = parse_arg("--db")
        .map(PathBuf::from)
        .or_else(historical_dataset::default_db_path)
        .context("unable to resolve sqlite path")?;
    let out_path = parse_arg("--out")
        .map(PathBuf::from)
        .or_else(Registries::default_path)
        .context("unable to resolve registry output path")?;
    let top = parse_arg("--top")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(10);

    let conn = historical_dataset::open_db(&db_path)?;
    let matches = historical_dataset::load_matches(&conn)?;
    if matches.is_empty() {
        return Err(anyhow!(
            "no matches in {}; run hist_ingest first",
            db_path.display()
        ));
    }
    let first_innings = historical_dataset::load_deliveries(&conn, 1)?;

    let base = Registries::builtin();
    let report = calibrate(&matches, &first_innings, base);
    let registries = report.to_registries(base);
    registries.save(&out_path)?;

    println!(
        "Calibrated {} venues from {} matches",
        report.venues.len(),
        matches.len()
    );
    println!("Registries: {}", out_path.display());
    println!();
    println!(
        "{:<48} {:>5} {:>7} {:>6} {:>6} {:>7}",
        "venue", "n", "avg", "pp", "chase", "toss"
    );
    for v in report.venues.iter().take(top) {
        println!(
            "{:<48} {:>5} {:>7.1} {:>6.1} {:>6.3} {:>+7.3}",
            truncate(&v.venue, 48),
            v.sample_matches,
            v.first_innings_mean,
            v.powerplay_mean,
            v.chase_advantage,
            v.toss_field_boost
        );
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = s.chars().take(max.saturating_sub(1)).collect::<String>();
    out.push('…');
    out
}

fn parse_arg(flag: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
