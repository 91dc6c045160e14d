//! Test double for [`LifecycleReporter`] that records every event.
//!
//! Besides the raw event list the recorder keeps a running balance per
//! [`ResourceKind`], so suites can assert that each acquisition was
//! matched by a release.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::errors::StartupError;
use crate::lifecycle::{LifecycleReporter, ResourceKind, TeardownStep};
use crate::stage::{ExitOutcome, Stage};

/// Lifecycle events captured during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    StageEntered(Stage),
    StageFailed { stage: Stage, message: String },
    Acquired(ResourceKind, usize),
    Released(ResourceKind, usize),
    Teardown { step: TeardownStep, performed: bool },
    Completed { code: i32, location: Option<Stage> },
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }

    /// Stages in the order they were entered, `Shutdown` included.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::StageEntered(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<(Stage, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::StageFailed { stage, message } => Some((stage, message)),
                _ => None,
            })
            .collect()
    }

    /// Teardown steps as visited.
    #[must_use]
    pub fn teardown(&self) -> Vec<(TeardownStep, bool)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::Teardown { step, performed } => Some((step, performed)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn performed_steps(&self) -> Vec<TeardownStep> {
        self.teardown()
            .into_iter()
            .filter_map(|(step, performed)| performed.then_some(step))
            .collect()
    }

    #[must_use]
    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, LifecycleEvent::Completed { .. }))
            .count()
    }

    /// Total acquired per kind.
    #[must_use]
    pub fn acquired(&self) -> BTreeMap<ResourceKind, usize> {
        let mut totals = BTreeMap::new();
        for event in self.events() {
            if let LifecycleEvent::Acquired(kind, count) = event {
                *totals.entry(kind).or_insert(0) += count;
            }
        }
        totals
    }

    /// Acquired minus released per kind, omitting kinds that balance out.
    #[must_use]
    pub fn outstanding(&self) -> BTreeMap<ResourceKind, i64> {
        let mut balance: BTreeMap<ResourceKind, i64> = BTreeMap::new();
        for event in self.events() {
            let (kind, delta) = match event {
                LifecycleEvent::Acquired(kind, count) => (kind, count_as_i64(count)),
                LifecycleEvent::Released(kind, count) => (kind, -count_as_i64(count)),
                _ => continue,
            };
            *balance.entry(kind).or_insert(0) += delta;
        }
        balance.retain(|_, net| *net != 0);
        balance
    }
}

fn count_as_i64(count: usize) -> i64 {
    i64::try_from(count).expect("resource count fits in i64")
}

impl LifecycleReporter for RecordingReporter {
    fn stage_entered(&self, stage: Stage) {
        self.record(LifecycleEvent::StageEntered(stage));
    }

    fn stage_failed(&self, stage: Stage, error: &StartupError) {
        self.record(LifecycleEvent::StageFailed {
            stage,
            message: error.to_string(),
        });
    }

    fn resource_acquired(&self, kind: ResourceKind, count: usize) {
        self.record(LifecycleEvent::Acquired(kind, count));
    }

    fn resource_released(&self, kind: ResourceKind, count: usize) {
        self.record(LifecycleEvent::Released(kind, count));
    }

    fn teardown_step(&self, step: TeardownStep, performed: bool) {
        self.record(LifecycleEvent::Teardown { step, performed });
    }

    fn shutdown_completed(&self, outcome: &ExitOutcome) {
        self.record(LifecycleEvent::Completed {
            code: outcome.code(),
            location: outcome.location(),
        });
    }
}
