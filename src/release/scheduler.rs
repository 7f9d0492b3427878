// ABOUTME: Runs every locked plan concurrently and aggregates the outcomes.
// ABOUTME: One task per plan; no failure cancels a sibling.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::backend::StoreError;

use super::executor::{ReleaseExecutor, ReleaseOutcome};
use super::lock::LockedPlan;

/// Outcomes of an executed batch, in plan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub outcomes: Vec<ReleaseOutcome>,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Execute all locked plans in parallel and wait for every one of them.
///
/// A persistence error from any task is returned only after all tasks have
/// finished. A panicking task is re-raised after the others complete.
pub async fn run_all(
    executor: Arc<ReleaseExecutor>,
    locked: Vec<LockedPlan>,
) -> Result<BatchSummary, StoreError> {
    let total = locked.len();
    let mut tasks = JoinSet::new();
    for (index, plan) in locked.into_iter().enumerate() {
        let executor = Arc::clone(&executor);
        tasks.spawn(async move { (index, executor.execute(plan).await) });
    }
    tracing::debug!("started {} release tasks", total);

    let mut outcomes = Vec::with_capacity(total);
    let mut store_error = None;
    let mut join_failure = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(outcome))) => outcomes.push((index, outcome)),
            Ok((_, Err(e))) => {
                store_error.get_or_insert(e);
            }
            Err(e) => {
                join_failure.get_or_insert(e);
            }
        }
    }

    if let Some(e) = join_failure {
        match e.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            Err(e) => panic!("release task did not complete: {e}"),
        }
    }
    if let Some(e) = store_error {
        return Err(e);
    }

    outcomes.sort_by_key(|(index, _)| *index);
    Ok(BatchSummary {
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
    })
}
