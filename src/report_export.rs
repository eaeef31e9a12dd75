use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::edge::MarketEdgeReport;
use crate::match_sim::SimulationResult;

pub struct ExportSummary {
    pub sessions: usize,
    pub lines: usize,
    pub signals: usize,
}

/// Write the simulation and its signals to an `.xlsx` workbook with Summary, Sessions and
/// Signals sheets.
pub fn export_report(
    path: &Path,
    result: &SimulationResult,
    report: &MarketEdgeReport,
) -> Result<ExportSummary> {
    let summary_rows = summary_rows(result, report);
    let session_rows = session_rows(result);
    let signal_rows = signal_rows(report);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Sessions")?;
        write_rows(sheet, &session_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Signals")?;
        write_rows(sheet, &signal_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportSummary {
        sessions: result.sessions.len(),
        lines: session_rows.len().saturating_sub(1),
        signals: report.signals.len(),
    })
}

fn summary_rows(result: &SimulationResult, report: &MarketEdgeReport) -> Vec<Vec<String>> {
    let kv = |k: &str, v: String| vec![k.to_string(), v];
    vec![
        kv("Match", report.match_label.clone()),
        kv("Batting first", result.team_batting_first.clone()),
        kv("Batting second", result.team_batting_second.clone()),
        kv("Win prob (batting first)", pct(result.win_prob_batting_first)),
        kv("Win prob (batting second)", pct(result.win_prob_batting_second)),
        kv("Innings 1 target", format!("{:.1}", result.innings1_target)),
        kv("Innings 1 simulated", format!("{:.1} ± {:.1}", result.innings1_mean, result.innings1_std)),
        kv("Innings 2 target", format!("{:.1}", result.innings2_target)),
        kv("Innings 2 simulated", format!("{:.1} ± {:.1}", result.innings2_mean, result.innings2_std)),
        kv("Trials", result.trials.to_string()),
        kv("Seed", result.seed.to_string()),
        kv("Signals", report.summary.clone()),
    ]
}

fn session_rows(result: &SimulationResult) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Over".to_string(),
        "Mean runs".to_string(),
        "Std runs".to_string(),
        "Line".to_string(),
        "P(over)".to_string(),
        "P(under)".to_string(),
    ]];
    for s in &result.sessions {
        if s.lines.is_empty() {
            rows.push(vec![
                s.over.to_string(),
                format!("{:.1}", s.mean_runs),
                format!("{:.1}", s.std_runs),
                String::new(),
                String::new(),
                String::new(),
            ]);
            continue;
        }
        for line in &s.lines {
            rows.push(vec![
                s.over.to_string(),
                format!("{:.1}", s.mean_runs),
                format!("{:.1}", s.std_runs),
                line.line.to_string(),
                pct(line.prob_over),
                pct(1.0 - line.prob_over),
            ]);
        }
    }
    rows
}

fn signal_rows(report: &MarketEdgeReport) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Market".to_string(),
        "Selection".to_string(),
        "Odds".to_string(),
        "Model %".to_string(),
        "Implied %".to_string(),
        "Edge (pts)".to_string(),
        "EV / 1000".to_string(),
        "Strength".to_string(),
        "Reasoning".to_string(),
    ]];
    for s in &report.signals {
        rows.push(vec![
            s.market.clone(),
            s.selection.clone(),
            format!("{:.2}", s.decimal_odds),
            pct(s.model_prob),
            pct(s.implied_prob),
            format!("{:.2}", s.edge_percent),
            format!("{:.2}", s.ev_per_1000),
            s.strength.to_string(),
            s.reasoning.clone(),
        ]);
    }
    rows
}

fn pct(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
