//! Per-step result records.
//!
//! Each completed step of a job produces exactly one record. Records are
//! append-only: nothing in the pipeline updates or deletes them.

use analyzer_core::analysis::CriteriaKind;
use analyzer_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Kind-specific payload of one result record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultOutcome {
    /// The step failed a pass/fail criterion; `message` explains why.
    Pass { message: String },
    Score { score: f64, message: String },
    Tagging { color: Option<String>, message: String },
    Curation,
}

impl ResultOutcome {
    pub fn kind(&self) -> CriteriaKind {
        match self {
            Self::Pass { .. } => CriteriaKind::Pass,
            Self::Score { .. } => CriteriaKind::Score,
            Self::Tagging { .. } => CriteriaKind::Tagging,
            Self::Curation => CriteriaKind::Curation,
        }
    }
}

/// A record about to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewResultRecord {
    pub job_id: JobId,
    pub step_index: i32,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub outcome: ResultOutcome,
}

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: i64,
    pub job_id: JobId,
    pub step_index: i32,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub outcome: ResultOutcome,
    pub created_at: Timestamp,
}

/// Common row shape selected from every result table.
///
/// Columns that a table does not carry are selected as `NULL`.
#[derive(Debug, Clone, FromRow)]
pub struct ResultRow {
    pub id: i64,
    pub project_criteria_id: String,
    pub step_index: i32,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub score: Option<f64>,
    pub color: Option<String>,
    pub message: Option<String>,
    pub created_at: Timestamp,
}

impl ResultRow {
    /// Map a raw row to a record of the given kind.
    pub fn into_record(self, kind: CriteriaKind) -> ResultRecord {
        let message = self.message.unwrap_or_default();
        let outcome = match kind {
            CriteriaKind::Pass => ResultOutcome::Pass { message },
            CriteriaKind::Score => ResultOutcome::Score {
                score: self.score.unwrap_or_default(),
                message,
            },
            CriteriaKind::Tagging => ResultOutcome::Tagging {
                color: self.color,
                message,
            },
            CriteriaKind::Curation => ResultOutcome::Curation,
        };

        ResultRecord {
            id: self.id,
            job_id: JobId::new(self.project_criteria_id),
            step_index: self.step_index,
            window_start: self.window_start,
            window_end: self.window_end,
            outcome,
            created_at: self.created_at,
        }
    }
}
