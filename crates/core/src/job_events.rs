//! Outbound message names pushed to live sessions.
//!
//! Used by the job executor when it reports a new per-step result or a
//! natural completion, and by the command router for rejected frames.

/// A failing pass/fail evaluation step was recorded.
pub const MSG_NEW_PASS_EVAL_RESULT: &str = "NEW_PASS_EVAL_RESULT";

/// A score evaluation step was recorded.
pub const MSG_NEW_SCORE_EVAL_RESULT: &str = "NEW_SCORE_EVAL_RESULT";

/// A tagging step was recorded.
pub const MSG_NEW_TAGGING_RESULT: &str = "NEW_TAGGING_RESULT";

/// A curation step was recorded.
pub const MSG_NEW_CURATION_RESULT: &str = "NEW_CURATION_RESULT";

/// Pass/fail evaluation ran to its last step.
pub const MSG_PASS_EVAL_COMPLETED: &str = "PASS_EVAL_COMPLETED";

/// Score evaluation ran to its last step.
pub const MSG_SCORE_EVAL_COMPLETED: &str = "SCORE_EVAL_COMPLETED";

/// Tagging ran to its last step.
pub const MSG_TAGGING_COMPLETED: &str = "TAGGING_COMPLETED";

/// Curation ran to its last step.
pub const MSG_CURATION_COMPLETED: &str = "CURATION_COMPLETED";

/// An inbound control frame could not be decoded.
pub const MSG_INVALID_COMMAND: &str = "INVALID_COMMAND";
