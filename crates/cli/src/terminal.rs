use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use chargewatch_compute::TrainingReport;
use chargewatch_monitor::RunSummary;

/// Color scheme for one-shot command output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Cyan;
    const OK: Color = Color::Green;
    const WARN: Color = Color::Yellow;
    const DIM: Color = Color::DarkGrey;
}

/// Print the banner shown before a command runs.
pub fn print_banner(command: &str, detail: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        SetForegroundColor(Colors::HEADER),
        Print("chargewatch"),
        ResetColor,
        Print(format!(" {command}\n")),
        SetForegroundColor(Colors::DIM),
        Print(format!("{detail}\n")),
        ResetColor,
    )?;
    stdout.flush()?;
    Ok(())
}

pub fn print_generated(rows: usize, path: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        SetForegroundColor(Colors::OK),
        Print("Generated "),
        ResetColor,
        Print(format!("{rows} healthy readings -> {path}\n")),
    )?;
    Ok(())
}

pub fn print_training_report(report: &TrainingReport) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        SetForegroundColor(Colors::OK),
        Print("Model trained "),
        ResetColor,
        Print(format!(
            "on {} rows ({} trees, threshold {:.3}) -> {}\n",
            report.rows,
            report.n_estimators,
            report.threshold,
            report.model_path.display()
        )),
        SetForegroundColor(Colors::DIM),
        Print(format!(
            "{:.1}% of training rows score as anomalous\n",
            report.training_anomaly_rate * 100.0
        )),
        ResetColor,
    )?;
    Ok(())
}

pub fn print_run_summary(summary: &RunSummary) -> Result<()> {
    let mut stdout = io::stdout();
    let (label, color) = if summary.interrupted {
        ("Interrupted", Colors::WARN)
    } else {
        ("Finished", Colors::OK)
    };
    execute!(
        stdout,
        Print("\n"),
        SetForegroundColor(color),
        Print(label),
        ResetColor,
        Print(format!(
            " after {} cycles: {} anomalies, {} failed ticket requests\n",
            summary.cycles, summary.anomalies, summary.ticket_failures
        )),
    )?;
    Ok(())
}
