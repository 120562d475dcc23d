//! Per-domain pipeline settings.

use std::str::FromStr;
use std::time::Duration;

use analyzer_core::analysis::AnalysisDomain;
use chrono::TimeDelta;
use rand::Rng;

/// How many steps one activation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBudget {
    Fixed(usize),
    /// Uniform draw in `0..upper_exclusive`, made once per activation.
    Random { upper_exclusive: usize },
}

impl StepBudget {
    pub fn draw(self) -> usize {
        match self {
            Self::Fixed(n) => n,
            Self::Random { upper_exclusive: 0 } => 0,
            Self::Random { upper_exclusive } => rand::rng().random_range(0..upper_exclusive),
        }
    }
}

/// Settings for one analysis domain.
#[derive(Debug, Clone)]
pub struct DomainSettings {
    pub domain: AnalysisDomain,
    /// Simulated work per step.
    pub step_delay: Duration,
    pub budget: StepBudget,
    /// Length of the `[start, end)` window each record covers.
    pub window: TimeDelta,
}

impl DomainSettings {
    pub fn evaluation() -> Self {
        Self {
            domain: AnalysisDomain::Evaluation,
            step_delay: Duration::from_millis(1000),
            budget: StepBudget::Random { upper_exclusive: 10 },
            window: TimeDelta::minutes(10),
        }
    }

    pub fn curation() -> Self {
        Self {
            domain: AnalysisDomain::Curation,
            step_delay: Duration::from_millis(200),
            budget: StepBudget::Fixed(10),
            window: TimeDelta::minutes(10),
        }
    }
}

/// Settings for both domains, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub evaluation: DomainSettings,
    pub curation: DomainSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            evaluation: DomainSettings::evaluation(),
            curation: DomainSettings::curation(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `EVALUATION_STEP_DELAY_MS` | `1000`  |
    /// | `EVALUATION_MAX_STEPS`     | `10`    |
    /// | `CURATION_STEP_DELAY_MS`   | `200`   |
    /// | `CURATION_STEPS`           | `10`    |
    /// | `RESULT_WINDOW_MINUTES`    | `10`    |
    ///
    /// Panics on unparsable values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let window = TimeDelta::minutes(env_or("RESULT_WINDOW_MINUTES", 10i64));

        let evaluation = DomainSettings {
            step_delay: Duration::from_millis(env_or("EVALUATION_STEP_DELAY_MS", 1000u64)),
            budget: StepBudget::Random {
                upper_exclusive: env_or("EVALUATION_MAX_STEPS", 10usize),
            },
            window,
            ..DomainSettings::evaluation()
        };

        let curation = DomainSettings {
            step_delay: Duration::from_millis(env_or("CURATION_STEP_DELAY_MS", 200u64)),
            budget: StepBudget::Fixed(env_or("CURATION_STEPS", 10usize)),
            window,
            ..DomainSettings::curation()
        };

        Self {
            evaluation,
            curation,
        }
    }

    pub fn for_domain(&self, domain: AnalysisDomain) -> &DomainSettings {
        match domain {
            AnalysisDomain::Evaluation => &self.evaluation,
            AnalysisDomain::Curation => &self.curation,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid number: {e}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_budget_is_constant() {
        assert_eq!(StepBudget::Fixed(7).draw(), 7);
    }

    #[test]
    fn random_budget_stays_below_bound() {
        for _ in 0..200 {
            assert!(StepBudget::Random { upper_exclusive: 10 }.draw() < 10);
        }
    }

    #[test]
    fn empty_random_range_draws_zero() {
        assert_eq!(StepBudget::Random { upper_exclusive: 0 }.draw(), 0);
    }

    #[test]
    fn defaults_match_domains() {
        let config = PipelineConfig::default();
        assert_eq!(config.for_domain(AnalysisDomain::Curation).budget, StepBudget::Fixed(10));
        assert_eq!(
            config.for_domain(AnalysisDomain::Evaluation).step_delay,
            Duration::from_secs(1)
        );
        assert_eq!(config.evaluation.window, TimeDelta::minutes(10));
    }
}
