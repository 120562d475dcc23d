//! Topic filters and the topic names used by the visualization bridge.
//!
//! Filters follow MQTT rules: levels are separated by `/`, `+` matches
//! exactly one level and `#` (only as the last level) matches any number
//! of remaining levels, including none.

use analyzer_core::types::{JobId, UserId};

/// Subscription covering every backend-bound visualization message
/// (`visualization/backend/{kind}/{userId}/{jobId}`).
pub const VISUALIZATION_BACKEND_FILTER: &str = "visualization/backend/+/+/+";

/// Number of levels in a backend-bound visualization topic.
pub const VISUALIZATION_BACKEND_LEVELS: usize = 5;

/// Topic the frontend listens on for one visualization job.
pub fn frontend_progress(user_id: &UserId, job_id: &JobId) -> String {
    format!("visualization/frontend/progress/{user_id}/{job_id}")
}

/// Cross-subsystem channel announcing a finished visualization to a user.
pub fn global_visualization_complete(user_id: &UserId) -> String {
    format!("global/user/{user_id}/visualization/complete")
}

/// Check that a filter is well formed.
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    levels.iter().enumerate().all(|(i, level)| match *level {
        "#" => i == last,
        "+" => true,
        other => !other.contains('#') && !other.contains('+'),
    })
}

/// Whether `topic` is matched by `filter`.
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
