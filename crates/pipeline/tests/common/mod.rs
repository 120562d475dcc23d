#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analyzer_core::analysis::{AnalysisDomain, CriteriaKind, JobLifecycleState};
use analyzer_core::types::{JobId, UserId};
use analyzer_db::models::criteria::JobContext;
use analyzer_db::MemoryStore;
use analyzer_pipeline::{
    DomainSettings, JobController, JobExecutor, JobScheduler, JobStateStore, ProgressEvent,
    ProgressNotifier, StepBudget,
};
use async_trait::async_trait;
use chrono::TimeDelta;

pub type Hook = Box<dyn Fn(&JobStateStore, &ProgressEvent) + Send + Sync>;

/// Records every event and runs an optional hook synchronously, so tests can
/// flip a job's state at an exact step.
pub struct RecordingNotifier {
    states: Arc<JobStateStore>,
    events: Mutex<Vec<(UserId, ProgressEvent)>>,
    hook: Option<Hook>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(UserId, ProgressEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages_for(&self, job_id: &JobId) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(_, e)| &e.job_id == job_id)
            .map(|(_, e)| e.message)
            .collect()
    }
}

#[async_trait]
impl ProgressNotifier for RecordingNotifier {
    async fn notify(&self, user_id: &UserId, event: &ProgressEvent) -> bool {
        self.events
            .lock()
            .unwrap()
            .push((user_id.clone(), event.clone()));
        if let Some(hook) = &self.hook {
            hook(&self.states, event);
        }
        true
    }
}

/// One domain pipeline over a [`MemoryStore`], wired by hand so the
/// notifier can reach the state store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub states: Arc<JobStateStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub executor: Arc<JobExecutor>,
    pub scheduler: Arc<JobScheduler>,
    pub controller: JobController,
}

impl Harness {
    pub fn new(settings: DomainSettings) -> Self {
        Self::build(settings, None)
    }

    pub fn with_hook(
        settings: DomainSettings,
        hook: impl Fn(&JobStateStore, &ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        Self::build(settings, Some(Box::new(hook)))
    }

    fn build(settings: DomainSettings, hook: Option<Hook>) -> Self {
        let domain = settings.domain;
        let store = Arc::new(MemoryStore::new());
        let states = Arc::new(JobStateStore::new());
        let notifier = Arc::new(RecordingNotifier {
            states: Arc::clone(&states),
            events: Mutex::new(Vec::new()),
            hook,
        });
        let executor = Arc::new(JobExecutor::new(
            settings,
            store.clone(),
            Arc::clone(&states),
            notifier.clone(),
        ));
        let scheduler = Arc::new(JobScheduler::new(domain, Arc::clone(&executor)));
        let controller = JobController::new(Arc::clone(&states), Arc::clone(&scheduler));

        Self {
            store,
            states,
            notifier,
            executor,
            scheduler,
            controller,
        }
    }

    pub async fn add_job(&self, id: &str, owner: &str, kind: CriteriaKind, name: &str) -> JobId {
        let job_id = JobId::from(id);
        self.store
            .insert_job_context(JobContext {
                job_id: job_id.clone(),
                project_id: "project-1".into(),
                owner_user_id: UserId::from(owner),
                criteria_name: name.into(),
                kind,
                tag_color: Some("#00ff00".into()),
            })
            .await;
        job_id
    }
}

pub fn settings(domain: AnalysisDomain, budget: StepBudget) -> DomainSettings {
    DomainSettings {
        domain,
        step_delay: Duration::from_millis(1),
        budget,
        window: TimeDelta::minutes(10),
    }
}

pub fn evaluation(steps: usize) -> DomainSettings {
    settings(AnalysisDomain::Evaluation, StepBudget::Fixed(steps))
}

pub fn curation(steps: usize) -> DomainSettings {
    settings(AnalysisDomain::Curation, StepBudget::Fixed(steps))
}

/// Hook that moves the job to `state` right after its `n`th result event.
pub fn transition_after(
    n: usize,
    state: JobLifecycleState,
) -> impl Fn(&JobStateStore, &ProgressEvent) + Send + Sync + 'static {
    let seen = AtomicUsize::new(0);
    move |states, event| {
        if event.message.starts_with("NEW_") && seen.fetch_add(1, Ordering::SeqCst) + 1 == n {
            states.set_state(&event.job_id, state);
        }
    }
}
