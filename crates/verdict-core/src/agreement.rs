//! Live agreement statistics over a (possibly partial) result list.
//!
//! Everything here is a pure function of the slice it is given. The session
//! recomputes the snapshot from scratch after every append instead of
//! patching it, so a snapshot always describes some prefix of the stream.

use serde::Serialize;

use crate::domain::{Criterion, Verdict, VerifierDescriptor, VerifierResult};

/// One cell of the per-criterion truth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum CriterionCell {
    /// The verifier has not reported a judgement object yet.
    Pending,
    /// The judgement is in; `None` means it left this criterion out.
    Reported(Option<bool>),
}

/// A column header of the truth table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifierColumn {
    pub label: String,
    pub index: usize,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriterionRow {
    pub criterion: Criterion,
    pub cells: Vec<CriterionCell>,
}

/// Criteria × verifiers truth table. Columns follow result arrival order,
/// then any configured verifiers that have not reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CriterionMatrix {
    pub columns: Vec<VerifierColumn>,
    pub rows: Vec<CriterionRow>,
}

impl CriterionMatrix {
    pub fn cell(&self, criterion: Criterion, column: usize) -> Option<CriterionCell> {
        self.rows
            .iter()
            .find(|r| r.criterion == criterion)
            .and_then(|r| r.cells.get(column).copied())
    }
}

/// Derived display statistics. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgreementSnapshot {
    pub pass: usize,
    pub fail: usize,
    pub pending: usize,
    /// Percentage of determined verdicts matching the majority, rounded
    /// half-up. `None` until at least two verdicts are determined.
    pub agreement_rate: Option<u8>,
    /// `None` on a tie or while the rate is undefined.
    pub majority: Option<Verdict>,
    pub matrix: CriterionMatrix,
}

impl AgreementSnapshot {
    pub fn determined(&self) -> usize {
        self.pass + self.fail
    }

    pub fn is_unanimous(&self) -> bool {
        self.agreement_rate == Some(100)
    }
}

/// Compute the snapshot for `results`.
pub fn snapshot(results: &[VerifierResult]) -> AgreementSnapshot {
    snapshot_with_roster(results, &[])
}

/// Like [`snapshot`], but also lays out a pending column for every
/// configured verifier that has not reported yet.
pub fn snapshot_with_roster(
    results: &[VerifierResult],
    roster: &[VerifierDescriptor],
) -> AgreementSnapshot {
    let (mut pass, mut fail, mut pending) = (0, 0, 0);
    for result in results {
        match result.verdict() {
            Verdict::Pass => pass += 1,
            Verdict::Fail => fail += 1,
            Verdict::Pending => pending += 1,
        }
    }

    let (agreement_rate, majority) = rate(pass, fail);

    AgreementSnapshot {
        pass,
        fail,
        pending,
        agreement_rate,
        majority,
        matrix: matrix(results, roster),
    }
}

fn rate(pass: usize, fail: usize) -> (Option<u8>, Option<Verdict>) {
    let total = pass + fail;
    if total < 2 {
        return (None, None);
    }
    let top = pass.max(fail);
    // round(top / total * 100) with half-up rounding, in integers.
    let pct = (top * 200 + total) / (total * 2);
    let majority = match pass.cmp(&fail) {
        std::cmp::Ordering::Greater => Some(Verdict::Pass),
        std::cmp::Ordering::Less => Some(Verdict::Fail),
        std::cmp::Ordering::Equal => None,
    };
    (Some(pct as u8), majority)
}

fn matrix(results: &[VerifierResult], roster: &[VerifierDescriptor]) -> CriterionMatrix {
    let mut columns: Vec<VerifierColumn> = results
        .iter()
        .map(|r| VerifierColumn {
            label: r.label().to_string(),
            index: r.slot.index,
            color: r.slot.color,
        })
        .collect();
    let reported = results.len();

    for (index, descriptor) in roster.iter().enumerate() {
        if results.iter().any(|r| descriptor.matches(r)) {
            continue;
        }
        let slot = crate::domain::VerifierSlot::for_index(index);
        columns.push(VerifierColumn {
            label: descriptor.label().to_string(),
            index: slot.index,
            color: slot.color,
        });
    }
    let waiting = columns.len() - reported;

    let rows = Criterion::ALL
        .iter()
        .map(|&criterion| {
            let mut cells: Vec<CriterionCell> = results
                .iter()
                .map(|r| match r.judgement() {
                    Some(j) => CriterionCell::Reported(j.criterion(criterion)),
                    None => CriterionCell::Pending,
                })
                .collect();
            cells.extend(std::iter::repeat(CriterionCell::Pending).take(waiting));
            CriterionRow { criterion, cells }
        })
        .collect();

    CriterionMatrix { columns, rows }
}
