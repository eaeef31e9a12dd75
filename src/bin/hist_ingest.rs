use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchpredictor::logging::init_logging_simple;
use matchpredictor::model_config::load_dotenv;
use matchpredictor::{cricsheet, historical_dataset};

fn main() -> Result<()> {
    load_dotenv();
    init_logging_simple();

    let dir = parse_path_arg("--dir")
        .or_else(|| std::env::var("MP_CRICSHEET_DIR").ok().map(PathBuf::from))
        .ok_or_else(|| anyhow!("pass --dir <cricsheet json dir> or set MP_CRICSHEET_DIR"))?;

    let db_path = parse_path_arg("--db")
        .or_else(historical_dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    let archive = cricsheet::load_dir(&dir)?;
    let mut conn = historical_dataset::open_db(&db_path)?;
    let summary = historical_dataset::ingest_archive(
        &mut conn,
        db_path.clone(),
        &dir.display().to_string(),
        &archive,
    )?;

    println!("Historical ingest complete");
    println!("DB: {}", summary.db_path.display());
    println!("Matches upserted: {}", summary.matches_upserted);
    println!("Deliveries upserted: {}", summary.deliveries_upserted);
    println!(
        "Latest match: {}",
        summary.latest_date.as_deref().unwrap_or("n/a")
    );
    if summary.files_skipped > 0 {
        println!("Skipped files: {}", summary.files_skipped);
        for err in archive.skipped.iter().take(6) {
            println!("   - {err}");
        }
    }

    Ok(())
}

fn parse_path_arg(flag: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
