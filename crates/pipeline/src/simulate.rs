//! Stand-in for the real analysis work of one step.

use analyzer_core::analysis::CriteriaKind;
use analyzer_db::models::criteria::JobContext;
use analyzer_db::models::result::ResultOutcome;
use rand::Rng;

/// Pass/fail criterion that never fails.
pub const ALWAYS_PASS_CRITERIA: &str = "crt1";

/// Outcome of one step, or `None` when the step produces no record.
pub fn step_outcome<R: Rng>(context: &JobContext, rng: &mut R) -> Option<ResultOutcome> {
    match context.kind {
        CriteriaKind::Pass if context.criteria_name == ALWAYS_PASS_CRITERIA => None,
        CriteriaKind::Pass => Some(ResultOutcome::Pass {
            message: narrative(rng),
        }),
        CriteriaKind::Score => Some(ResultOutcome::Score {
            score: round2(rng.random::<f64>() * 100.0 + 1.0),
            message: narrative(rng),
        }),
        CriteriaKind::Tagging => Some(ResultOutcome::Tagging {
            color: context.tag_color.clone(),
            message: format!("{} violation", context.criteria_name),
        }),
        CriteriaKind::Curation => Some(ResultOutcome::Curation),
    }
}

fn narrative<R: Rng>(rng: &mut R) -> String {
    let speed = round2(rng.random_range(50.0..101.0));
    let ttc = round2(rng.random_range(0.0..2.0));
    format!("Speed: {speed} km/h, TTC: {ttc} s")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use analyzer_core::types::{JobId, UserId};
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn context(kind: CriteriaKind, name: &str) -> JobContext {
        JobContext {
            job_id: JobId::from("pc-1"),
            project_id: "p-1".into(),
            owner_user_id: UserId::from("alice"),
            criteria_name: name.into(),
            kind,
            tag_color: Some("#ff0000".into()),
        }
    }

    #[test]
    fn always_pass_criterion_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            step_outcome(&context(CriteriaKind::Pass, ALWAYS_PASS_CRITERIA), &mut rng),
            None
        );
    }

    #[test]
    fn pass_failure_describes_speed_and_ttc() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_matches!(
            step_outcome(&context(CriteriaKind::Pass, "lane-keep"), &mut rng),
            Some(ResultOutcome::Pass { message })
                if message.starts_with("Speed: ") && message.contains("km/h, TTC: ")
        );
    }

    #[test]
    fn score_is_within_range_with_two_decimals() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let Some(ResultOutcome::Score { score, .. }) =
                step_outcome(&context(CriteriaKind::Score, "ttc"), &mut rng)
            else {
                panic!("score criterion must produce a score");
            };
            assert!((1.0..=101.0).contains(&score), "score {score} out of range");
            assert!(((score * 100.0).round() - score * 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn tagging_uses_criteria_colour_and_name() {
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(
            step_outcome(&context(CriteriaKind::Tagging, "hard-brake"), &mut rng),
            Some(ResultOutcome::Tagging {
                color: Some("#ff0000".into()),
                message: "hard-brake violation".into(),
            })
        );
    }
}
