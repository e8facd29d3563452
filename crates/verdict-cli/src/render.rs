//! Plain-text rendering of results, agreement and save state.

use std::fmt::Write;

use verdict_core::{AgreementSnapshot, CriterionCell, SaveState, VerifierResult};

const LABEL_WIDTH: usize = 28;

/// One line per arrived verifier.
pub fn result_line(seq: usize, result: &VerifierResult) -> String {
    let mut line = format!(
        "[{seq}] {:<width$} {:<7} ({})",
        result.label(),
        result.verdict().as_str(),
        result.slot.color,
        width = LABEL_WIDTH
    );
    if !result.parsed_ok() {
        let reason = result
            .verification_error
            .as_deref()
            .unwrap_or("unparseable verifier output");
        let _ = write!(line, " parse failed: {reason}");
    }
    line
}

pub fn agreement_line(snapshot: &AgreementSnapshot) -> String {
    let rate = snapshot
        .agreement_rate
        .map(|r| format!("{r}%"))
        .unwrap_or_else(|| "n/a".to_string());
    let majority = match (snapshot.agreement_rate, snapshot.majority) {
        (None, _) => "n/a",
        (Some(_), None) => "tie",
        (Some(_), Some(v)) => v.as_str(),
    };
    format!(
        "pass={} fail={} pending={} agreement={} majority={}",
        snapshot.pass, snapshot.fail, snapshot.pending, rate, majority
    )
}

fn cell(cell: CriterionCell) -> &'static str {
    match cell {
        CriterionCell::Pending => "...",
        CriterionCell::Reported(Some(true)) => "yes",
        CriterionCell::Reported(Some(false)) => "no",
        CriterionCell::Reported(None) => "-",
    }
}

/// Criteria x verifiers table.
pub fn matrix(snapshot: &AgreementSnapshot) -> String {
    let matrix = &snapshot.matrix;
    if matrix.columns.is_empty() {
        return "no verifier results\n".to_string();
    }

    let criterion_width = matrix
        .rows
        .iter()
        .map(|r| r.criterion.label().len())
        .max()
        .unwrap_or(0);
    let widths: Vec<usize> = matrix
        .columns
        .iter()
        .map(|c| c.label.len().max(3))
        .collect();

    let mut out = String::new();
    let _ = write!(out, "{:<criterion_width$}", "");
    for (column, width) in matrix.columns.iter().zip(&widths) {
        let _ = write!(out, "  {:<width$}", column.label, width = *width);
    }
    out.push('\n');

    for row in &matrix.rows {
        let _ = write!(out, "{:<criterion_width$}", row.criterion.label());
        for (c, width) in row.cells.iter().zip(&widths) {
            let _ = write!(out, "  {:<width$}", cell(*c), width = *width);
        }
        out.push('\n');
    }
    out
}

pub fn save_line(state: &SaveState) -> String {
    match state {
        SaveState::Idle => "results not saved".to_string(),
        SaveState::Saving => "saving results...".to_string(),
        SaveState::Saved => "results saved".to_string(),
        SaveState::Error(message) => format!("save failed: {message}"),
    }
}
