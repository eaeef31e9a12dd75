use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use matchpredictor::logging::init_logging_simple;
use matchpredictor::model_config::load_dotenv;
use matchpredictor::odds_log::{self, BattingSide, OddsSnapshot, PatternFlag};

/// Log in-play odds snapshots and flag known price patterns.
#[derive(Parser, Debug)]
#[command(name = "odds_log")]
struct Args {
    #[arg(long, env = "MP_ODDS_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append one snapshot, e.g. `add "CSK vs MI" "54/1 1.45 2.65" --over 6`.
    Add {
        match_label: String,
        /// `score/wkts fav_odds nonfav_odds`.
        entry: String,
        #[arg(long, default_value_t = 0)]
        over: u8,
        #[arg(long, default_value_t = 1)]
        innings: u8,
        #[arg(long, default_value = "")]
        venue: String,
        #[arg(long, default_value = "")]
        fav_team: String,
        /// `fav` or `nonfav`.
        #[arg(long)]
        batting: Option<BattingSide>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Print every snapshot logged for a match with its flags.
    Show { match_label: String },
    /// Pattern counts across every logged match.
    Analyze,
}

fn main() -> Result<()> {
    load_dotenv();
    init_logging_simple();
    let args = Args::parse();

    let db_path = args
        .db
        .or_else(odds_log::default_db_path)
        .context("unable to resolve odds log path")?;
    let conn = odds_log::open_db(&db_path)?;

    match args.command {
        Command::Add {
            match_label,
            entry,
            over,
            innings,
            venue,
            fav_team,
            batting,
            notes,
        } => {
            let (runs, wickets, fav_odds, nonfav_odds) = odds_log::parse_quick_entry(&entry)?;
            let snapshot = OddsSnapshot {
                date: Local::now().format("%Y-%m-%d").to_string(),
                match_label,
                venue,
                innings,
                over,
                score: runs,
                wickets,
                fav_team,
                fav_odds,
                nonfav_odds,
                who_batting: batting,
                notes,
            };
            let flags = odds_log::append(&conn, &snapshot)?;
            println!(
                "Logged {} over {} ({}/{}, rr {:.2})",
                snapshot.match_label,
                snapshot.over,
                snapshot.score,
                snapshot.wickets,
                snapshot.run_rate()
            );
            for flag in flags {
                println!("  ! {flag}");
            }
        }
        Command::Show { match_label } => {
            let rows = odds_log::load_match(&conn, &match_label)?;
            if rows.is_empty() {
                println!("No snapshots for {match_label}");
            }
            for row in &rows {
                let flags = odds_log::pattern_flags(row)
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                println!(
                    "inns {} ov {:>2} {:>3}/{} fav {:.2} nonfav {:.2} {}",
                    row.innings,
                    row.over,
                    row.score,
                    row.wickets,
                    row.fav_odds,
                    row.nonfav_odds,
                    flags.join("; ")
                );
            }
        }
        Command::Analyze => {
            let rows = odds_log::load_all(&conn)?;
            if rows.is_empty() {
                println!("No snapshots logged yet");
                return Ok(());
            }
            let summary = odds_log::pattern_summary(&rows);
            println!("Matches logged: {}", summary.matches);
            println!("Total entries:  {}", summary.entries);
            println!();
            for (flag, n) in &summary.counts {
                println!("  {n:>4}  {flag}");
            }
            let early = summary.count(PatternFlag::FieldingFavouriteEarly);
            if early > 0 {
                println!();
                println!("Fielding favourite under 1.07 at over 3:");
                for s in &summary.fielding_favourite_early {
                    println!(
                        "  {:<24} {} fav {:.2} at {}/{}",
                        s.match_label, s.date, s.fav_odds, s.score, s.wickets
                    );
                }
            }
            println!();
            println!(
                "Favourite drifted {:.0}%+ then recovered: {}",
                (odds_log::DRIFT_RATIO - 1.0) * 100.0,
                summary.drift_recoveries.len()
            );
            for label in summary.drift_recoveries.iter().take(5) {
                println!("  {label}");
            }
        }
    }
    Ok(())
}
