//! Table output formatting for CLI commands
//!
//! Renders run summaries and persisted records with comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::application::{RunStatus, RunSummary};
use crate::infrastructure::sink::StoredRecord;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per run of a batch
    pub fn format_runs(&self, runs: &[RunSummary]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Run", "Status", "Total gas", "Winners"]));

        for run in runs {
            let total = run
                .total_gas
                .map_or_else(|| "-".to_string(), |g| g.to_string());
            let winners = if run.winners.is_empty() {
                "-".to_string()
            } else {
                run.winners
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            };
            table.add_row(vec![
                Cell::new(&run.name),
                self.status_cell(&run.status),
                Cell::new(total),
                Cell::new(winners),
            ]);
        }

        table.to_string()
    }

    /// One row per record found in the output directory
    pub fn format_records(&self, records: &[StoredRecord]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "Run", "l", "n", "m", "k", "Scores", "Off-chain", "revPerc", "Selected", "Rejected",
            "Total gas",
        ]));

        for record in records {
            let p = &record.params;
            let selected = if p.selection_completed { "yes" } else { "no" };
            let selected_cell = if self.use_colors {
                Cell::new(selected).fg(if p.selection_completed {
                    Color::Green
                } else {
                    Color::Red
                })
            } else {
                Cell::new(selected)
            };
            table.add_row(vec![
                Cell::new(&record.name),
                Cell::new(p.l),
                Cell::new(p.n),
                Cell::new(p.m),
                Cell::new(p.k),
                Cell::new(p.scores_mode),
                Cell::new(p.off_chain),
                Cell::new(p.rev_perc),
                selected_cell,
                Cell::new(p.rejected_reveals.len()),
                Cell::new(record.total_gas),
            ]);
        }

        table.to_string()
    }

    fn status_cell(&self, status: &RunStatus) -> Cell {
        let (text, color) = match status {
            RunStatus::Completed {
                selection_completed: true,
            } => ("✓ completed".to_string(), Color::Green),
            RunStatus::Completed {
                selection_completed: false,
            } => ("! selection failed".to_string(), Color::Yellow),
            RunStatus::Aborted { phase, .. } => (format!("✗ aborted ({phase})"), Color::Red),
            RunStatus::Skipped => ("○ skipped".to_string(), Color::DarkGrey),
        };
        if self.use_colors {
            Cell::new(text).fg(color)
        } else {
            Cell::new(text)
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width as u16);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ExperimentParams, Phase, RecordParams};

    fn summary(name: &str, status: RunStatus) -> RunSummary {
        RunSummary {
            name: name.to_string(),
            params: ExperimentParams::default(),
            status,
            total_gas: Some(42),
            winners: vec![1, 3],
        }
    }

    #[test]
    fn test_format_runs_lists_every_status() {
        let formatter = TableFormatter::with_config(false, Some(120));
        let out = formatter.format_runs(&[
            summary(
                "ok",
                RunStatus::Completed {
                    selection_completed: true,
                },
            ),
            summary(
                "bad",
                RunStatus::Aborted {
                    phase: Phase::Submission,
                    error: "rejected".to_string(),
                },
            ),
        ]);
        assert!(out.contains("completed"));
        assert!(out.contains("aborted (submission)"));
        assert!(out.contains("1,3"));
    }

    #[test]
    fn test_format_records_counts_rejected_reveals() {
        let mut params = RecordParams::new(&ExperimentParams::default(), true);
        params.rejected_reveals = vec![2, 5, 6];
        let formatter = TableFormatter::with_config(false, Some(200));
        let out = formatter.format_records(&[StoredRecord {
            name: "run_x".to_string(),
            params,
            total_gas: 987_654,
        }]);
        assert!(out.contains("Rejected"));
        assert!(out.contains("run_x"));
        assert!(out.contains("987654"));
    }
}
