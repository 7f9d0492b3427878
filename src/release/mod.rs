// ABOUTME: Release orchestration: plan, select, lock, execute.
// ABOUTME: Two-tier locking keeps validation short and releases parallel.

mod diff;
mod error;
mod executor;
mod lock;
mod plan;
mod planner;
mod presenter;
mod scheduler;

pub use diff::{InputChange, diff_inputs, format_inputs};
pub use error::{PlanError, ReleaseError, ServicePlanError};
pub use executor::{ReleaseExecutor, ReleaseOutcome};
pub use lock::{
    AbandonReason, AbandonedPlan, LockCoordinator, LockHandle, LockOutcome, LockSettings,
    LockedPlan,
};
pub use plan::{DeployPlan, PromotePlan, ReleasePlan};
pub use planner::{PlanBatch, PlanBuilder};
pub use presenter::{AutoApprove, ConsolePresenter, PlanPresenter, SelectionContext};
pub use scheduler::{BatchSummary, run_all};
