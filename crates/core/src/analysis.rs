//! Analysis job lifecycle and criteria vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job_events::{
    MSG_CURATION_COMPLETED, MSG_NEW_CURATION_RESULT, MSG_NEW_PASS_EVAL_RESULT,
    MSG_NEW_SCORE_EVAL_RESULT, MSG_NEW_TAGGING_RESULT, MSG_PASS_EVAL_COMPLETED,
    MSG_SCORE_EVAL_COMPLETED, MSG_TAGGING_COMPLETED,
};

/// Lifecycle of one job between activations.
///
/// A job with no entry at all is "not running"; that is deliberately not
/// the same thing as [`JobLifecycleState::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobLifecycleState {
    Running,
    Paused,
    Stopped,
}

/// Which analysis a project-criteria association runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriteriaKind {
    Pass,
    Score,
    Tagging,
    Curation,
}

impl CriteriaKind {
    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Score => "SCORE",
            Self::Tagging => "TAGGING",
            Self::Curation => "CURATION",
        }
    }

    /// Message pushed after each persisted step.
    pub fn result_message(self) -> &'static str {
        match self {
            Self::Pass => MSG_NEW_PASS_EVAL_RESULT,
            Self::Score => MSG_NEW_SCORE_EVAL_RESULT,
            Self::Tagging => MSG_NEW_TAGGING_RESULT,
            Self::Curation => MSG_NEW_CURATION_RESULT,
        }
    }

    /// Message pushed when an activation runs to its last step.
    pub fn completed_message(self) -> &'static str {
        match self {
            Self::Pass => MSG_PASS_EVAL_COMPLETED,
            Self::Score => MSG_SCORE_EVAL_COMPLETED,
            Self::Tagging => MSG_TAGGING_COMPLETED,
            Self::Curation => MSG_CURATION_COMPLETED,
        }
    }

    /// The analysis domain whose scheduler runs this kind.
    pub fn domain(self) -> AnalysisDomain {
        match self {
            Self::Pass | Self::Score | Self::Tagging => AnalysisDomain::Evaluation,
            Self::Curation => AnalysisDomain::Curation,
        }
    }
}

impl fmt::Display for CriteriaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CriteriaKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Self::Pass),
            "SCORE" => Ok(Self::Score),
            "TAGGING" => Ok(Self::Tagging),
            "CURATION" => Ok(Self::Curation),
            other => Err(CoreError::Validation(format!(
                "Unknown criteria kind '{other}'"
            ))),
        }
    }
}

/// An independent instance of the job pipeline with its own endpoint,
/// scheduler and state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDomain {
    Evaluation,
    Curation,
}

impl AnalysisDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::Curation => "curation",
        }
    }
}

impl fmt::Display for AnalysisDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisDomain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evaluation" => Ok(Self::Evaluation),
            "curation" => Ok(Self::Curation),
            other => Err(CoreError::Validation(format!(
                "Unknown analysis domain '{other}'"
            ))),
        }
    }
}

/// Status of a visualization project driven by the external generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisualizationStatus {
    Pending,
    Progressing,
    Complete,
}

impl VisualizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Progressing => "PROGRESSING",
            Self::Complete => "COMPLETE",
        }
    }
}

impl FromStr for VisualizationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROGRESSING" => Ok(Self::Progressing),
            "COMPLETE" => Ok(Self::Complete),
            other => Err(CoreError::Validation(format!(
                "Unknown visualization status '{other}'"
            ))),
        }
    }
}
